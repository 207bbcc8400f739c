use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workspace role. The only input to authorization besides ownership and assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
    Approver,
    Auditor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Approver => "approver",
            Role::Auditor => "auditor",
        }
    }

    /// Parse an optional form value; blank means "use the default".
    pub fn parse_or_default(raw: Option<&str>) -> Result<Role, String> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Role::default()),
            Some(value) => value.parse(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            "approver" => Ok(Role::Approver),
            "auditor" => Ok(Role::Auditor),
            _ => Err("Invalid role.".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Name for display, falling back to email, then a placeholder.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| "Unknown member".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
}

/// Admin edit of a membership. `None` role leaves the role unchanged;
/// name and title are always overwritten (blank clears).
#[derive(Debug, Clone, Default)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub title: Option<String>,
    pub role: Option<Role>,
}
