use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::ApprovalEngine;
use crate::audit::{self, Event, EventOrder, TimelineEntry};
use crate::errors::CoreError;
use crate::models::decision::{
    AssignmentStatus, Decision, DecisionPage, DecisionQuery, DecisionStatus, PAGE_SIZE, StatusFilter,
};
use crate::models::link::{Link, format_links};
use crate::models::member::Role;
use crate::policy::{self, DecisionPermissions};

/// One approver as shown on the detail page.
#[derive(Debug, Clone, Serialize)]
pub struct ApproverView {
    pub user_id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub email: Option<String>,
    pub status: AssignmentStatus,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionDetail {
    pub decision: Decision,
    pub owner_name: String,
    pub approvers: Vec<ApproverView>,
    pub links: Vec<Link>,
    /// Links in the editable `Label | URL` form.
    pub links_text: String,
    pub timeline: Vec<TimelineEntry>,
    pub permissions: DecisionPermissions,
}

/// Dashboard filters as submitted.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: StatusFilter,
    pub search: Option<String>,
    pub assigned_only: bool,
    pub page: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionSummary {
    pub decision: Decision,
    pub owner_name: String,
    pub pending_approvers: Vec<String>,
    pub awaiting_my_vote: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionList {
    pub items: Vec<DecisionSummary>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub can_create: bool,
}

impl ApprovalEngine {
    async fn viewer_role(&self, decision: &Decision, viewer: Uuid) -> Result<Role, CoreError> {
        let role = self.directory.role_of(decision.workspace_id, viewer).await?;
        match role {
            Some(r) if policy::can_view(role) => Ok(r),
            _ => Err(CoreError::authorization("You do not have access to this decision.")),
        }
    }

    pub async fn decision_detail(&self, decision_id: Uuid, viewer: Uuid) -> Result<DecisionDetail, CoreError> {
        let decision = self.load(decision_id).await?;
        let role = self.viewer_role(&decision, viewer).await?;

        let members = self.directory.members_by_user(decision.workspace_id).await?;
        let assignments = self.store.list_assignments(decision_id).await?;
        let links = self.store.list_links(decision_id).await?;
        let events = self.store.list_events(decision_id).await?;
        let comments = self.store.list_comments(decision_id).await?;

        let mine = assignments
            .iter()
            .find(|a| a.approver_user_id == viewer)
            .map(|a| a.status);
        let permissions = DecisionPermissions::evaluate(
            Some(role),
            decision.owner_user_id == viewer,
            decision.status,
            mine,
        );

        let approvers = assignments
            .iter()
            .map(|a| {
                let member = members.get(&a.approver_user_id);
                ApproverView {
                    user_id: a.approver_user_id,
                    name: super::display_name(&members, a.approver_user_id),
                    title: member.and_then(|m| m.title.clone()),
                    email: member.and_then(|m| m.email.clone()),
                    status: a.status,
                    decided_at: a.decided_at,
                }
            })
            .collect();

        Ok(DecisionDetail {
            owner_name: super::display_name(&members, decision.owner_user_id),
            links_text: format_links(&links),
            decision,
            approvers,
            links,
            timeline: audit::timeline(events, comments),
            permissions,
        })
    }

    /// The audit log of one decision in the requested order.
    pub async fn events(&self, decision_id: Uuid, viewer: Uuid, order: EventOrder) -> Result<Vec<Event>, CoreError> {
        let decision = self.load(decision_id).await?;
        self.viewer_role(&decision, viewer).await?;
        let events = self.store.list_events(decision_id).await?;
        Ok(audit::ordered(events, order))
    }

    /// Dashboard listing. Admins and auditors see the whole workspace; others
    /// see what they own or are assigned to.
    pub async fn list_decisions(&self, workspace_id: Uuid, viewer: Uuid, filter: &ListFilter) -> Result<DecisionList, CoreError> {
        let role = self.directory.role_of(workspace_id, viewer).await?;
        if !policy::can_view(role) {
            return Err(CoreError::authorization("You are not a member of this workspace."));
        }

        let query = DecisionQuery {
            workspace_id,
            visible_to: (!policy::sees_all_decisions(role)).then_some(viewer),
            assigned_to: filter.assigned_only.then_some(viewer),
            status: filter.status,
            search: filter.search.clone(),
            page: filter.page.max(1),
            per_page: PAGE_SIZE,
        };
        let DecisionPage {
            decisions,
            page,
            per_page,
            total_count,
            total_pages,
        } = self.store.list_decisions(&query).await?;

        let members = self.directory.members_by_user(workspace_id).await?;
        let mut items = Vec::with_capacity(decisions.len());
        for decision in decisions {
            let assignments = self.store.list_assignments(decision.id).await?;
            let pending: Vec<_> = assignments
                .iter()
                .filter(|a| a.status == AssignmentStatus::Pending)
                .collect();
            let awaiting_my_vote = decision.status == DecisionStatus::Pending
                && pending.iter().any(|a| a.approver_user_id == viewer);
            items.push(DecisionSummary {
                owner_name: super::display_name(&members, decision.owner_user_id),
                pending_approvers: pending
                    .iter()
                    .map(|a| super::display_name(&members, a.approver_user_id))
                    .collect(),
                awaiting_my_vote,
                decision,
            });
        }

        Ok(DecisionList {
            items,
            page,
            per_page,
            total_count,
            total_pages,
            can_create: policy::can_create_decision(role),
        })
    }
}
