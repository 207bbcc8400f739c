//! In-process store.
//!
//! All tables sit behind one async mutex, so every trait call is a single
//! atomic step, the same guarantee a Postgres transaction gives `PgStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{EditApplied, EditWrite, NewDecision, Settled, StatusRule, Store, StoreError, VoteApplied, VoteWrite};
use crate::audit::{Event, NewEvent};
use crate::models::comment::Comment;
use crate::models::decision::{
    Assignment, AssignmentStatus, Decision, DecisionPage, DecisionQuery, DecisionStatus,
};
use crate::models::invite::{Invite, InviteAcceptance, NewInvite};
use crate::models::link::Link;
use crate::models::member::{Member, MemberUpdate, NewMember};
use crate::models::user::User;
use crate::models::workspace::{Membership, Workspace};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    workspaces: Vec<Workspace>,
    members: Vec<Member>,
    invites: Vec<Invite>,
    decisions: Vec<Decision>,
    assignments: Vec<Assignment>,
    events: Vec<Event>,
    comments: Vec<Comment>,
    links: Vec<Link>,
    next_seq: i64,
}

impl Tables {
    fn append_events(&mut self, events: &[NewEvent]) {
        for e in events {
            self.next_seq += 1;
            self.events.push(Event {
                id: e.id,
                seq: self.next_seq,
                decision_id: e.decision_id,
                kind: e.kind.clone(),
                actor_user_id: e.actor_user_id,
                created_at: e.created_at,
            });
        }
    }

    fn assignments_for(&self, decision_id: Uuid) -> Vec<Assignment> {
        self.assignments
            .iter()
            .filter(|a| a.decision_id == decision_id)
            .cloned()
            .collect()
    }

    /// Fold the decision's assignments and persist a terminal result.
    fn settle(&mut self, decision_id: Uuid, rule: StatusRule, at: DateTime<Utc>) -> Settled {
        let assignments = self.assignments_for(decision_id);
        let statuses: Vec<AssignmentStatus> = assignments.iter().map(|a| a.status).collect();
        let folded = rule(&statuses);
        let Some(decision) = self.decisions.iter_mut().find(|d| d.id == decision_id) else {
            return Settled {
                assignments,
                status: folded,
                finalized: false,
            };
        };
        let finalized = decision.status == DecisionStatus::Pending && folded != DecisionStatus::Pending;
        if finalized {
            decision.status = folded;
            decision.updated_at = at;
        }
        Settled {
            assignments,
            status: decision.status,
            finalized,
        }
    }

    fn member_insert(&mut self, member: &NewMember, is_default: bool, at: DateTime<Utc>) -> Result<Member, StoreError> {
        if self
            .members
            .iter()
            .any(|m| m.workspace_id == member.workspace_id && m.user_id == member.user_id)
        {
            return Err(StoreError::Duplicate("workspace_members_workspace_id_user_id_key".to_string()));
        }
        let row = Member {
            id: Uuid::new_v4(),
            workspace_id: member.workspace_id,
            user_id: member.user_id,
            role: member.role,
            name: member.name.clone(),
            title: member.title.clone(),
            email: member.email.clone(),
            is_default,
            created_at: at,
        };
        self.members.push(row.clone());
        Ok(row)
    }

    fn first_membership(&self, user_id: Uuid) -> bool {
        !self.members.iter().any(|m| m.user_id == user_id)
    }

    fn search_matches(&self, decision: &Decision, needle: &str) -> bool {
        let hit = |s: &str| s.to_lowercase().contains(needle);
        if hit(&decision.title) || hit(&decision.summary) || hit(&decision.context) {
            return true;
        }
        let people: Vec<Uuid> = std::iter::once(decision.owner_user_id)
            .chain(
                self.assignments
                    .iter()
                    .filter(|a| a.decision_id == decision.id)
                    .map(|a| a.approver_user_id),
            )
            .collect();
        let member_hit = self.members.iter().any(|m| {
            m.workspace_id == decision.workspace_id
                && people.contains(&m.user_id)
                && [&m.name, &m.email, &m.title]
                    .iter()
                    .any(|field| field.as_deref().is_some_and(hit))
        });
        member_hit
            || self
                .links
                .iter()
                .any(|l| l.decision_id == decision.id && (hit(&l.label) || hit(&l.url)))
    }
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            tables: Mutex::new(Tables::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Duplicate("users_email_key".to_string()));
        }
        t.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.email.eq_ignore_ascii_case(email.trim())).cloned())
    }

    async fn create_workspace_with_admin(&self, workspace: &Workspace, admin: &NewMember) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let is_default = t.first_membership(admin.user_id);
        t.workspaces.push(workspace.clone());
        t.member_insert(admin, is_default, Utc::now())?;
        Ok(())
    }

    async fn memberships_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        let t = self.tables.lock().await;
        let mut list: Vec<Membership> = t
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                t.workspaces
                    .iter()
                    .find(|w| w.id == m.workspace_id)
                    .map(|w| Membership {
                        workspace: w.clone(),
                        member_id: m.id,
                        role: m.role,
                        is_default: m.is_default,
                        joined_at: m.created_at,
                    })
            })
            .collect();
        list.sort_by_key(|m| m.joined_at);
        Ok(list)
    }

    async fn set_default_workspace(&self, user_id: Uuid, workspace_id: Uuid) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        if !t
            .members
            .iter()
            .any(|m| m.user_id == user_id && m.workspace_id == workspace_id)
        {
            return Ok(false);
        }
        for m in t.members.iter_mut().filter(|m| m.user_id == user_id) {
            m.is_default = m.workspace_id == workspace_id;
        }
        Ok(true)
    }

    async fn find_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<Member>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.members
            .iter()
            .find(|m| m.workspace_id == workspace_id && m.user_id == user_id)
            .cloned())
    }

    async fn find_member_by_id(&self, workspace_id: Uuid, member_id: Uuid) -> Result<Option<Member>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.members
            .iter()
            .find(|m| m.workspace_id == workspace_id && m.id == member_id)
            .cloned())
    }

    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<Member>, StoreError> {
        let t = self.tables.lock().await;
        let mut members: Vec<Member> = t
            .members
            .iter()
            .filter(|m| m.workspace_id == workspace_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.created_at);
        Ok(members)
    }

    async fn insert_member(&self, member: &NewMember) -> Result<Member, StoreError> {
        let mut t = self.tables.lock().await;
        let is_default = t.first_membership(member.user_id);
        t.member_insert(member, is_default, Utc::now())
    }

    async fn update_member(&self, workspace_id: Uuid, member_id: Uuid, update: &MemberUpdate) -> Result<Option<Member>, StoreError> {
        let mut t = self.tables.lock().await;
        let Some(m) = t
            .members
            .iter_mut()
            .find(|m| m.workspace_id == workspace_id && m.id == member_id)
        else {
            return Ok(None);
        };
        m.name = update.name.clone();
        m.title = update.title.clone();
        if let Some(role) = update.role {
            m.role = role;
        }
        Ok(Some(m.clone()))
    }

    async fn update_profile(&self, workspace_id: Uuid, user_id: Uuid, name: &str, title: &str) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        match t
            .members
            .iter_mut()
            .find(|m| m.workspace_id == workspace_id && m.user_id == user_id)
        {
            Some(m) => {
                m.name = Some(name.to_string());
                m.title = Some(title.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_member(&self, workspace_id: Uuid, member_id: Uuid) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        let before = t.members.len();
        t.members
            .retain(|m| !(m.workspace_id == workspace_id && m.id == member_id));
        Ok(t.members.len() < before)
    }

    async fn insert_invite(&self, invite: &NewInvite) -> Result<Invite, StoreError> {
        let mut t = self.tables.lock().await;
        let row = Invite {
            token: Uuid::new_v4(),
            workspace_id: invite.workspace_id,
            email: invite.email.clone(),
            role: invite.role,
            title: invite.title.clone(),
            created_by: invite.created_by,
            created_at: Utc::now(),
            accepted_at: None,
        };
        t.invites.push(row.clone());
        Ok(row)
    }

    async fn find_invite(&self, token: Uuid) -> Result<Option<Invite>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.invites.iter().find(|i| i.token == token).cloned())
    }

    async fn accept_invite(&self, token: Uuid, member: &NewMember) -> Result<InviteAcceptance, StoreError> {
        let mut t = self.tables.lock().await;
        let Some(index) = t.invites.iter().position(|i| i.token == token) else {
            return Ok(InviteAcceptance::NotFound);
        };
        if t.invites[index].accepted_at.is_some() {
            return Ok(InviteAcceptance::AlreadyAccepted);
        }
        let workspace_id = t.invites[index].workspace_id;
        if t
            .members
            .iter()
            .any(|m| m.workspace_id == workspace_id && m.user_id == member.user_id)
        {
            return Ok(InviteAcceptance::AlreadyMember);
        }
        let is_default = t.first_membership(member.user_id);
        let now = Utc::now();
        t.member_insert(member, is_default, now)?;
        t.invites[index].accepted_at = Some(now);
        Ok(InviteAcceptance::Accepted { workspace_id })
    }

    async fn find_decision(&self, id: Uuid) -> Result<Option<Decision>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.decisions.iter().find(|d| d.id == id).cloned())
    }

    async fn list_decisions(&self, query: &DecisionQuery) -> Result<DecisionPage, StoreError> {
        let t = self.tables.lock().await;
        let assigned = |user: Uuid, decision: Uuid| {
            t.assignments
                .iter()
                .any(|a| a.decision_id == decision && a.approver_user_id == user)
        };
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matching: Vec<Decision> = t
            .decisions
            .iter()
            .filter(|d| d.workspace_id == query.workspace_id)
            .filter(|d| match query.visible_to {
                Some(user) => d.owner_user_id == user || assigned(user, d.id),
                None => true,
            })
            .filter(|d| query.assigned_to.is_none_or(|user| assigned(user, d.id)))
            .filter(|d| query.status.matches(d.status))
            .filter(|d| needle.as_deref().is_none_or(|n| t.search_matches(d, n)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let decisions = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .collect();
        Ok(DecisionPage::new(decisions, query.page.max(1), query.per_page, total))
    }

    async fn list_assignments(&self, decision_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.assignments_for(decision_id))
    }

    async fn list_links(&self, decision_id: Uuid) -> Result<Vec<Link>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.links.iter().filter(|l| l.decision_id == decision_id).cloned().collect())
    }

    async fn list_events(&self, decision_id: Uuid) -> Result<Vec<Event>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.events.iter().filter(|e| e.decision_id == decision_id).cloned().collect())
    }

    async fn list_comments(&self, decision_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.comments.iter().filter(|c| c.decision_id == decision_id).cloned().collect())
    }

    async fn create_decision(&self, new: &NewDecision) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let decision_id = new.decision.id;
        t.decisions.push(new.decision.clone());
        for approver in &new.approvers {
            t.assignments.push(Assignment {
                id: Uuid::new_v4(),
                decision_id,
                approver_user_id: *approver,
                status: AssignmentStatus::Pending,
                decided_at: None,
            });
        }
        for link in &new.links {
            t.links.push(Link {
                id: Uuid::new_v4(),
                decision_id,
                label: link.label.clone(),
                url: link.url.clone(),
            });
        }
        t.append_events(std::slice::from_ref(&new.event));
        Ok(())
    }

    async fn apply_edit(&self, edit: &EditWrite) -> Result<EditApplied, StoreError> {
        let mut t = self.tables.lock().await;
        let Some(current) = t.decisions.iter().find(|d| d.id == edit.decision_id) else {
            return Ok(EditApplied::NotFound);
        };
        if current.status != DecisionStatus::Pending {
            return Ok(EditApplied::NotPending(current.status));
        }
        let id = edit.decision_id;
        t.assignments
            .retain(|a| !(a.decision_id == id && edit.remove_approvers.contains(&a.approver_user_id)));
        for approver in &edit.add_approvers {
            t.assignments.push(Assignment {
                id: Uuid::new_v4(),
                decision_id: id,
                approver_user_id: *approver,
                status: AssignmentStatus::Pending,
                decided_at: None,
            });
        }

        t.links
            .retain(|l| !(l.decision_id == id && edit.links.delete.contains(&l.url)));
        for link in &edit.links.relabel {
            if let Some(row) = t
                .links
                .iter_mut()
                .find(|l| l.decision_id == id && l.url == link.url)
            {
                row.label = link.label.clone();
            }
        }
        for link in &edit.links.insert {
            t.links.push(Link {
                id: Uuid::new_v4(),
                decision_id: id,
                label: link.label.clone(),
                url: link.url.clone(),
            });
        }

        if let Some(decision) = t.decisions.iter_mut().find(|d| d.id == id) {
            if let Some(fields) = &edit.fields {
                decision.title = fields.title.clone();
                decision.summary = fields.summary.clone();
                decision.context = fields.context.clone();
            }
            decision.updated_at = edit.updated_at;
        }

        t.append_events(&edit.events);
        Ok(EditApplied::Applied(t.settle(id, edit.settle, edit.updated_at)))
    }

    async fn apply_vote(&self, vote: &VoteWrite) -> Result<VoteApplied, StoreError> {
        let mut t = self.tables.lock().await;
        let Some(decision) = t.decisions.iter().find(|d| d.id == vote.decision_id) else {
            return Ok(VoteApplied::DecisionNotFound);
        };
        if decision.status != DecisionStatus::Pending {
            return Ok(VoteApplied::DecisionNotPending(decision.status));
        }

        let Some(row) = t
            .assignments
            .iter_mut()
            .find(|a| a.decision_id == vote.decision_id && a.approver_user_id == vote.approver_user_id)
        else {
            return Ok(VoteApplied::NotAssigned);
        };
        if row.status != AssignmentStatus::Pending {
            return Ok(VoteApplied::AlreadyVoted(row.status));
        }
        row.status = vote.outcome;
        row.decided_at = Some(vote.decided_at);

        t.append_events(std::slice::from_ref(&vote.event));
        Ok(VoteApplied::Recorded(t.settle(vote.decision_id, vote.settle, vote.decided_at)))
    }

    async fn finalize_status(&self, decision_id: Uuid, status: DecisionStatus, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        match t
            .decisions
            .iter_mut()
            .find(|d| d.id == decision_id && d.status == DecisionStatus::Pending)
        {
            Some(decision) if status != DecisionStatus::Pending => {
                decision.status = status;
                decision.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn add_comment(&self, comment: &Comment, event: &NewEvent) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        t.comments.push(comment.clone());
        t.append_events(std::slice::from_ref(event));
        Ok(())
    }
}
