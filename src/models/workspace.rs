use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::member::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// One of the caller's workspace memberships, ordered by `joined_at`.
#[derive(Debug, Clone, Serialize)]
pub struct Membership {
    pub workspace: Workspace,
    pub member_id: Uuid,
    pub role: Role,
    pub is_default: bool,
    pub joined_at: DateTime<Utc>,
}

/// Resolve the active workspace: the preferred one if the user belongs to it,
/// else the default membership, else the earliest.
pub fn pick_active(memberships: &[Membership], preferred: Option<Uuid>) -> Option<&Membership> {
    preferred
        .and_then(|id| memberships.iter().find(|m| m.workspace.id == id))
        .or_else(|| memberships.iter().find(|m| m.is_default))
        .or_else(|| memberships.iter().min_by_key(|m| m.joined_at))
}
