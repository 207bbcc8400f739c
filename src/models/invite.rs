use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::member::Role;

#[derive(Debug, Clone, Serialize)]
pub struct Invite {
    pub token: Uuid,
    pub workspace_id: Uuid,
    pub email: String,
    pub role: Role,
    pub title: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invite {
    pub fn is_pending(&self) -> bool {
        self.accepted_at.is_none()
    }

    pub fn matches_email(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}

#[derive(Debug, Clone)]
pub struct NewInvite {
    pub workspace_id: Uuid,
    pub email: String,
    pub role: Role,
    pub title: Option<String>,
    pub created_by: Uuid,
}

/// Result of the atomic accept step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteAcceptance {
    Accepted { workspace_id: Uuid },
    AlreadyAccepted,
    AlreadyMember,
    NotFound,
}
