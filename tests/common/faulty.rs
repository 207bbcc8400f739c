//! A `Store` wrapper whose writes and reads can be made to fail on demand.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use decisionlog::audit::{Event, NewEvent};
use decisionlog::models::comment::Comment;
use decisionlog::models::decision::{Assignment, Decision, DecisionPage, DecisionQuery, DecisionStatus};
use decisionlog::models::invite::{Invite, InviteAcceptance, NewInvite};
use decisionlog::models::link::Link;
use decisionlog::models::member::{Member, MemberUpdate, NewMember};
use decisionlog::models::user::User;
use decisionlog::models::workspace::{Membership, Workspace};
use decisionlog::store::{
    EditApplied, EditWrite, MemoryStore, NewDecision, Store, StoreError, VoteApplied, VoteWrite,
};

#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_event_writes: AtomicBool,
    fail_member_lists: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every unit that appends audit events, before it touches a row.
    pub fn fail_event_writes(&self, fail: bool) {
        self.fail_event_writes.store(fail, Ordering::SeqCst);
    }

    /// Reject `list_members`, the read behind every notification recipient list.
    pub fn fail_member_lists(&self, fail: bool) {
        self.fail_member_lists.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Corrupt(format!("{what} rejected")))
        } else {
            Ok(())
        }
    }

    fn check_events(&self) -> Result<(), StoreError> {
        Self::check(&self.fail_event_writes, "decision_events insert")
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.create_user(user).await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_user_by_email(email).await
    }

    async fn create_workspace_with_admin(&self, workspace: &Workspace, admin: &NewMember) -> Result<(), StoreError> {
        self.inner.create_workspace_with_admin(workspace, admin).await
    }

    async fn memberships_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        self.inner.memberships_for_user(user_id).await
    }

    async fn set_default_workspace(&self, user_id: Uuid, workspace_id: Uuid) -> Result<bool, StoreError> {
        self.inner.set_default_workspace(user_id, workspace_id).await
    }

    async fn find_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<Member>, StoreError> {
        self.inner.find_member(workspace_id, user_id).await
    }

    async fn find_member_by_id(&self, workspace_id: Uuid, member_id: Uuid) -> Result<Option<Member>, StoreError> {
        self.inner.find_member_by_id(workspace_id, member_id).await
    }

    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<Member>, StoreError> {
        Self::check(&self.fail_member_lists, "workspace_members select")?;
        self.inner.list_members(workspace_id).await
    }

    async fn insert_member(&self, member: &NewMember) -> Result<Member, StoreError> {
        self.inner.insert_member(member).await
    }

    async fn update_member(&self, workspace_id: Uuid, member_id: Uuid, update: &MemberUpdate) -> Result<Option<Member>, StoreError> {
        self.inner.update_member(workspace_id, member_id, update).await
    }

    async fn update_profile(&self, workspace_id: Uuid, user_id: Uuid, name: &str, title: &str) -> Result<bool, StoreError> {
        self.inner.update_profile(workspace_id, user_id, name, title).await
    }

    async fn delete_member(&self, workspace_id: Uuid, member_id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_member(workspace_id, member_id).await
    }

    async fn insert_invite(&self, invite: &NewInvite) -> Result<Invite, StoreError> {
        self.inner.insert_invite(invite).await
    }

    async fn find_invite(&self, token: Uuid) -> Result<Option<Invite>, StoreError> {
        self.inner.find_invite(token).await
    }

    async fn accept_invite(&self, token: Uuid, member: &NewMember) -> Result<InviteAcceptance, StoreError> {
        self.inner.accept_invite(token, member).await
    }

    async fn find_decision(&self, id: Uuid) -> Result<Option<Decision>, StoreError> {
        self.inner.find_decision(id).await
    }

    async fn list_decisions(&self, query: &DecisionQuery) -> Result<DecisionPage, StoreError> {
        self.inner.list_decisions(query).await
    }

    async fn list_assignments(&self, decision_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        self.inner.list_assignments(decision_id).await
    }

    async fn list_links(&self, decision_id: Uuid) -> Result<Vec<Link>, StoreError> {
        self.inner.list_links(decision_id).await
    }

    async fn list_events(&self, decision_id: Uuid) -> Result<Vec<Event>, StoreError> {
        self.inner.list_events(decision_id).await
    }

    async fn list_comments(&self, decision_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        self.inner.list_comments(decision_id).await
    }

    async fn create_decision(&self, new: &NewDecision) -> Result<(), StoreError> {
        self.check_events()?;
        self.inner.create_decision(new).await
    }

    async fn apply_edit(&self, edit: &EditWrite) -> Result<EditApplied, StoreError> {
        if !edit.events.is_empty() {
            self.check_events()?;
        }
        self.inner.apply_edit(edit).await
    }

    async fn apply_vote(&self, vote: &VoteWrite) -> Result<VoteApplied, StoreError> {
        self.check_events()?;
        self.inner.apply_vote(vote).await
    }

    async fn finalize_status(&self, decision_id: Uuid, status: DecisionStatus, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.inner.finalize_status(decision_id, status, at).await
    }

    async fn add_comment(&self, comment: &Comment, event: &NewEvent) -> Result<(), StoreError> {
        self.check_events()?;
        self.inner.add_comment(comment, event).await
    }
}
