mod decisions;
mod members;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{EditApplied, EditWrite, NewDecision, Store, StoreError, VoteApplied, VoteWrite};
use crate::audit::{Event, NewEvent};
use crate::models::comment::Comment;
use crate::models::decision::{Assignment, Decision, DecisionPage, DecisionQuery, DecisionStatus};
use crate::models::invite::{Invite, InviteAcceptance, NewInvite};
use crate::models::link::Link;
use crate::models::member::{Member, MemberUpdate, NewMember};
use crate::models::user::User;
use crate::models::workspace::{Membership, Workspace};

/// Postgres-backed store. Multi-row units run in one transaction each.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Decode a TEXT enum column, reporting the table it came from.
fn parse_column<T>(raw: &str, table: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse()
        .map_err(|e: String| StoreError::Corrupt(format!("{table}: {e}")))
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        members::create_user(&self.pool, user).await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        members::find_user(&self.pool, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        members::find_user_by_email(&self.pool, email).await
    }

    async fn create_workspace_with_admin(&self, workspace: &Workspace, admin: &NewMember) -> Result<(), StoreError> {
        members::create_workspace_with_admin(&self.pool, workspace, admin).await
    }

    async fn memberships_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        members::memberships_for_user(&self.pool, user_id).await
    }

    async fn set_default_workspace(&self, user_id: Uuid, workspace_id: Uuid) -> Result<bool, StoreError> {
        members::set_default_workspace(&self.pool, user_id, workspace_id).await
    }

    async fn find_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<Member>, StoreError> {
        members::find_member(&self.pool, workspace_id, user_id).await
    }

    async fn find_member_by_id(&self, workspace_id: Uuid, member_id: Uuid) -> Result<Option<Member>, StoreError> {
        members::find_member_by_id(&self.pool, workspace_id, member_id).await
    }

    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<Member>, StoreError> {
        members::list_members(&self.pool, workspace_id).await
    }

    async fn insert_member(&self, member: &NewMember) -> Result<Member, StoreError> {
        members::insert_member(&self.pool, member).await
    }

    async fn update_member(&self, workspace_id: Uuid, member_id: Uuid, update: &MemberUpdate) -> Result<Option<Member>, StoreError> {
        members::update_member(&self.pool, workspace_id, member_id, update).await
    }

    async fn update_profile(&self, workspace_id: Uuid, user_id: Uuid, name: &str, title: &str) -> Result<bool, StoreError> {
        members::update_profile(&self.pool, workspace_id, user_id, name, title).await
    }

    async fn delete_member(&self, workspace_id: Uuid, member_id: Uuid) -> Result<bool, StoreError> {
        members::delete_member(&self.pool, workspace_id, member_id).await
    }

    async fn insert_invite(&self, invite: &NewInvite) -> Result<Invite, StoreError> {
        members::insert_invite(&self.pool, invite).await
    }

    async fn find_invite(&self, token: Uuid) -> Result<Option<Invite>, StoreError> {
        members::find_invite(&self.pool, token).await
    }

    async fn accept_invite(&self, token: Uuid, member: &NewMember) -> Result<InviteAcceptance, StoreError> {
        members::accept_invite(&self.pool, token, member).await
    }

    async fn find_decision(&self, id: Uuid) -> Result<Option<Decision>, StoreError> {
        decisions::find_decision(&self.pool, id).await
    }

    async fn list_decisions(&self, query: &DecisionQuery) -> Result<DecisionPage, StoreError> {
        decisions::list_decisions(&self.pool, query).await
    }

    async fn list_assignments(&self, decision_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        decisions::list_assignments(&self.pool, decision_id).await
    }

    async fn list_links(&self, decision_id: Uuid) -> Result<Vec<Link>, StoreError> {
        decisions::list_links(&self.pool, decision_id).await
    }

    async fn list_events(&self, decision_id: Uuid) -> Result<Vec<Event>, StoreError> {
        decisions::list_events(&self.pool, decision_id).await
    }

    async fn list_comments(&self, decision_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        decisions::list_comments(&self.pool, decision_id).await
    }

    async fn create_decision(&self, new: &NewDecision) -> Result<(), StoreError> {
        decisions::create_decision(&self.pool, new).await
    }

    async fn apply_edit(&self, edit: &EditWrite) -> Result<EditApplied, StoreError> {
        decisions::apply_edit(&self.pool, edit).await
    }

    async fn apply_vote(&self, vote: &VoteWrite) -> Result<VoteApplied, StoreError> {
        decisions::apply_vote(&self.pool, vote).await
    }

    async fn finalize_status(&self, decision_id: Uuid, status: DecisionStatus, at: DateTime<Utc>) -> Result<bool, StoreError> {
        decisions::finalize_status(&self.pool, decision_id, status, at).await
    }

    async fn add_comment(&self, comment: &Comment, event: &NewEvent) -> Result<(), StoreError> {
        decisions::add_comment(&self.pool, comment, event).await
    }
}
