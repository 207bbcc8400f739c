//! Persistence seam.
//!
//! The approval engine and member directory talk to a [`Store`]. Plain reads
//! and single-row writes map one-to-one onto statements; the `apply_*` and
//! `create_*` units bundle several rows (a change, its audit events and the
//! decision status it settles to) and must be applied all-or-nothing.
//!
//! `PgStore` is the production implementation; `MemoryStore` backs the tests
//! and the database-less development mode.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::{Event, NewEvent};
use crate::models::comment::Comment;
use crate::models::decision::{
    Assignment, AssignmentStatus, Decision, DecisionFields, DecisionPage, DecisionQuery, DecisionStatus,
};
use crate::models::invite::{Invite, InviteAcceptance, NewInvite};
use crate::models::link::{Link, LinkDiff, LinkInput};
use crate::models::member::{Member, MemberUpdate, NewMember};
use crate::models::user::User;
use crate::models::workspace::{Membership, Workspace};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug)]
pub enum StoreError {
    Db(sqlx::Error),
    Migrate(sqlx::migrate::MigrateError),
    /// A uniqueness constraint rejected the write.
    Duplicate(String),
    /// A stored value could not be decoded.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Db(e) => write!(f, "{e}"),
            StoreError::Migrate(e) => write!(f, "Migration error: {e}"),
            StoreError::Duplicate(what) => write!(f, "Duplicate {what}"),
            StoreError::Corrupt(msg) => write!(f, "Corrupt record: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let what = db.constraint().unwrap_or("record").to_string();
                return StoreError::Duplicate(what);
            }
        }
        StoreError::Db(e)
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migrate(e)
    }
}

/// A decision with its initial approvers, links and `created` event.
#[derive(Debug, Clone)]
pub struct NewDecision {
    pub decision: Decision,
    pub approvers: Vec<Uuid>,
    pub links: Vec<LinkInput>,
    pub event: NewEvent,
}

/// Folds an assignment set into a decision status. Units that change
/// assignments apply it before they commit and persist a terminal result.
pub type StatusRule = fn(&[AssignmentStatus]) -> DecisionStatus;

/// The assignment set after a unit of work and the status it settled to.
#[derive(Debug, Clone)]
pub struct Settled {
    pub assignments: Vec<Assignment>,
    pub status: DecisionStatus,
    /// True when this unit moved the decision out of pending.
    pub finalized: bool,
}

/// Everything an edit writes. Applied only while the decision is still pending.
#[derive(Debug, Clone)]
pub struct EditWrite {
    pub decision_id: Uuid,
    pub fields: Option<DecisionFields>,
    pub updated_at: DateTime<Utc>,
    pub add_approvers: Vec<Uuid>,
    pub remove_approvers: Vec<Uuid>,
    pub links: LinkDiff,
    pub events: Vec<NewEvent>,
    pub settle: StatusRule,
}

#[derive(Debug, Clone)]
pub enum EditApplied {
    Applied(Settled),
    NotPending(DecisionStatus),
    NotFound,
}

/// One approver's vote and the event recording it.
#[derive(Debug, Clone)]
pub struct VoteWrite {
    pub decision_id: Uuid,
    pub approver_user_id: Uuid,
    pub outcome: AssignmentStatus,
    pub decided_at: DateTime<Utc>,
    pub event: NewEvent,
    pub settle: StatusRule,
}

#[derive(Debug, Clone)]
pub enum VoteApplied {
    /// The guarded update hit the row.
    Recorded(Settled),
    DecisionNotFound,
    DecisionNotPending(DecisionStatus),
    /// The guarded update matched nothing because the row is no longer pending.
    AlreadyVoted(AssignmentStatus),
    /// The guarded update matched nothing because there is no row.
    NotAssigned,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- accounts ---
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    // --- workspaces ---
    /// Create the workspace and the caller's admin membership together.
    async fn create_workspace_with_admin(&self, workspace: &Workspace, admin: &NewMember) -> Result<(), StoreError>;
    async fn memberships_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, StoreError>;
    async fn set_default_workspace(&self, user_id: Uuid, workspace_id: Uuid) -> Result<bool, StoreError>;

    // --- members ---
    async fn find_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<Member>, StoreError>;
    async fn find_member_by_id(&self, workspace_id: Uuid, member_id: Uuid) -> Result<Option<Member>, StoreError>;
    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<Member>, StoreError>;
    async fn insert_member(&self, member: &NewMember) -> Result<Member, StoreError>;
    async fn update_member(&self, workspace_id: Uuid, member_id: Uuid, update: &MemberUpdate) -> Result<Option<Member>, StoreError>;
    async fn update_profile(&self, workspace_id: Uuid, user_id: Uuid, name: &str, title: &str) -> Result<bool, StoreError>;
    async fn delete_member(&self, workspace_id: Uuid, member_id: Uuid) -> Result<bool, StoreError>;

    // --- invites ---
    async fn insert_invite(&self, invite: &NewInvite) -> Result<Invite, StoreError>;
    async fn find_invite(&self, token: Uuid) -> Result<Option<Invite>, StoreError>;
    /// Mark the invite accepted (only if still open) and add the membership.
    async fn accept_invite(&self, token: Uuid, member: &NewMember) -> Result<InviteAcceptance, StoreError>;

    // --- decisions ---
    async fn find_decision(&self, id: Uuid) -> Result<Option<Decision>, StoreError>;
    async fn list_decisions(&self, query: &DecisionQuery) -> Result<DecisionPage, StoreError>;
    async fn list_assignments(&self, decision_id: Uuid) -> Result<Vec<Assignment>, StoreError>;
    async fn list_links(&self, decision_id: Uuid) -> Result<Vec<Link>, StoreError>;
    async fn list_events(&self, decision_id: Uuid) -> Result<Vec<Event>, StoreError>;
    async fn list_comments(&self, decision_id: Uuid) -> Result<Vec<Comment>, StoreError>;

    async fn create_decision(&self, new: &NewDecision) -> Result<(), StoreError>;
    async fn apply_edit(&self, edit: &EditWrite) -> Result<EditApplied, StoreError>;
    async fn apply_vote(&self, vote: &VoteWrite) -> Result<VoteApplied, StoreError>;
    /// Compare-and-set `pending -> status`. Returns whether a row changed.
    async fn finalize_status(&self, decision_id: Uuid, status: DecisionStatus, at: DateTime<Utc>) -> Result<bool, StoreError>;
    async fn add_comment(&self, comment: &Comment, event: &NewEvent) -> Result<(), StoreError>;
}
