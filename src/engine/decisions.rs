use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{ApprovalEngine, DecisionForm, Outcome, display_name, participants};
use crate::audit::{EventKind, NewEvent};
use crate::errors::CoreError;
use crate::models::comment::Comment;
use crate::models::decision::{ApproverDiff, Decision, DecisionStatus, settle_assignments};
use crate::models::link::LinkDiff;
use crate::notify::{NotificationReport, emails};
use crate::policy;
use crate::store::{EditApplied, EditWrite, NewDecision, Settled};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditReceipt {
    /// False for a no-op edit; nothing was written.
    pub changed: bool,
    pub status: DecisionStatus,
}

impl ApprovalEngine {
    pub(crate) async fn load(&self, decision_id: Uuid) -> Result<Decision, CoreError> {
        self.store
            .find_decision(decision_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Decision not found."))
    }

    /// Start a pending decision owned by the caller, with its approvers and links.
    pub async fn create_decision(
        &self,
        workspace_id: Uuid,
        caller: Uuid,
        form: &DecisionForm,
    ) -> Result<Outcome<Uuid>, CoreError> {
        let role = self.directory.role_of(workspace_id, caller).await?;
        if !policy::can_create_decision(role) {
            return Err(CoreError::authorization("You do not have permission to create decisions."));
        }
        let valid = form.validate()?;
        let members = self.directory.members_by_user(workspace_id).await?;
        Self::check_approvers(&members, &valid.approvers)?;

        let now = Utc::now();
        let decision = Decision {
            id: Uuid::new_v4(),
            workspace_id,
            title: valid.fields.title,
            summary: valid.fields.summary,
            context: valid.fields.context,
            status: DecisionStatus::Pending,
            owner_user_id: caller,
            created_at: now,
            updated_at: now,
        };
        let event = NewEvent::new(
            decision.id,
            caller,
            EventKind::Created {
                approvers: valid.approvers.clone(),
            },
            now,
        );
        self.store
            .create_decision(&NewDecision {
                decision: decision.clone(),
                approvers: valid.approvers.clone(),
                links: valid.links,
                event,
            })
            .await?;
        log::info!("Decision {} created in workspace {workspace_id} by {caller}", decision.id);

        let subject = emails::Subject::new(&self.site_url, decision.id, &decision.title);
        let owner = display_name(&members, caller);
        let notifications = self
            .send(&members, &valid.approvers, |to| {
                emails::approval_request(to, &subject, &owner, &decision.summary)
            })
            .await;

        Ok(Outcome {
            value: decision.id,
            notifications,
        })
    }

    /// Replace fields, approver set and links of a pending decision.
    ///
    /// Each non-empty category of change appends exactly one event; an edit
    /// that changes nothing writes nothing.
    pub async fn edit_decision(
        &self,
        decision_id: Uuid,
        caller: Uuid,
        form: &DecisionForm,
    ) -> Result<Outcome<EditReceipt>, CoreError> {
        let decision = self.load(decision_id).await?;
        let role = self.directory.role_of(decision.workspace_id, caller).await?;
        if !policy::can_view(role) {
            return Err(CoreError::authorization("You do not have access to this decision."));
        }
        if decision.status != DecisionStatus::Pending {
            return Err(CoreError::conflict("Only pending decisions can be edited."));
        }
        if !policy::can_edit_decision(role, decision.owner_user_id == caller, decision.status) {
            return Err(CoreError::authorization("Only the owner or an admin can edit this decision."));
        }

        let valid = form.validate()?;
        let members = self.directory.members_by_user(decision.workspace_id).await?;
        let assignments = self.store.list_assignments(decision_id).await?;
        let current: Vec<Uuid> = assignments.iter().map(|a| a.approver_user_id).collect();
        // Approvers who left the workspace may stay; only new ones must be members.
        let approver_diff = ApproverDiff::between(&current, &valid.approvers);
        Self::check_approvers(&members, &approver_diff.to_add)?;

        let existing_links = self.store.list_links(decision_id).await?;
        let link_diff = LinkDiff::between(&existing_links, &valid.links);
        let changes = decision.fields().changes_to(&valid.fields);

        let now = Utc::now();
        let mut events = Vec::new();
        if !changes.is_empty() {
            events.push(NewEvent::new(decision_id, caller, EventKind::Edited { changes: changes.clone() }, now));
        }
        if !approver_diff.is_empty() {
            events.push(NewEvent::new(
                decision_id,
                caller,
                EventKind::ApproversUpdated {
                    added: approver_diff.to_add.clone(),
                    removed: approver_diff.to_remove.clone(),
                },
                now,
            ));
        }
        if !link_diff.is_empty() {
            events.push(NewEvent::new(
                decision_id,
                caller,
                EventKind::LinksUpdated {
                    added: link_diff.insert.iter().map(|l| l.url.clone()).collect(),
                    removed: link_diff.delete.clone(),
                    updated: link_diff.relabel.iter().map(|l| l.url.clone()).collect(),
                },
                now,
            ));
        }
        if events.is_empty() {
            return Ok(Outcome {
                value: EditReceipt {
                    changed: false,
                    status: decision.status,
                },
                notifications: NotificationReport::default(),
            });
        }

        let write = EditWrite {
            decision_id,
            fields: (!changes.is_empty()).then(|| valid.fields.clone()),
            updated_at: now,
            add_approvers: approver_diff.to_add.clone(),
            remove_approvers: approver_diff.to_remove.clone(),
            links: link_diff,
            events,
            settle: settle_assignments,
        };
        let Settled {
            assignments,
            status,
            finalized,
        } = match self.store.apply_edit(&write).await? {
            EditApplied::Applied(settled) => settled,
            EditApplied::NotPending(_) => return Err(CoreError::conflict("Only pending decisions can be edited.")),
            EditApplied::NotFound => return Err(CoreError::not_found("Decision not found.")),
        };
        log::info!("Decision {decision_id} edited by {caller}");
        if finalized {
            log::info!("Decision {decision_id} finalised as {status}");
        }

        let title = if changes.contains_key("title") { &valid.fields.title } else { &decision.title };
        let subject = emails::Subject::new(&self.site_url, decision_id, title);

        let mut notifications = self
            .send(&members, &approver_diff.to_add, |to| emails::approver_added(to, &subject))
            .await;
        notifications.merge(
            self.send(&members, &approver_diff.to_remove, |to| emails::approver_removed(to, &subject))
                .await,
        );

        // Removing the last pending approver can settle the decision.
        if finalized {
            let recipients = participants(
                decision.owner_user_id,
                assignments.iter().map(|a| a.approver_user_id),
                caller,
            );
            notifications.merge(
                self.send(&members, &recipients, |to| emails::final_status(to, &subject, status))
                    .await,
            );
        }

        Ok(Outcome {
            value: EditReceipt { changed: true, status },
            notifications,
        })
    }

    /// Comments are allowed in every decision status.
    pub async fn add_comment(&self, decision_id: Uuid, caller: Uuid, body: &str) -> Result<Outcome<Uuid>, CoreError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(CoreError::validation("Comment cannot be empty."));
        }
        let decision = self.load(decision_id).await?;
        let role = self.directory.role_of(decision.workspace_id, caller).await?;
        if !policy::can_comment(role) {
            return Err(CoreError::authorization("You do not have permission to comment on this decision."));
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            decision_id,
            user_id: caller,
            body: body.to_string(),
            created_at: now,
        };
        let event = NewEvent::new(decision_id, caller, EventKind::Comment { comment_id: comment.id }, now);

        // Everything the emails need is read first; nothing after the write can fail it.
        let members = self.directory.members_by_user(decision.workspace_id).await?;
        let assignments = self.store.list_assignments(decision_id).await?;
        self.store.add_comment(&comment, &event).await?;
        log::info!("Comment {} added to decision {decision_id}", comment.id);

        let recipients = participants(
            decision.owner_user_id,
            assignments.iter().map(|a| a.approver_user_id),
            caller,
        );
        let subject = emails::Subject::new(&self.site_url, decision_id, &decision.title);
        let author = display_name(&members, caller);
        let notifications = self
            .send(&members, &recipients, |to| emails::new_comment(to, &subject, &author, body))
            .await;

        Ok(Outcome {
            value: comment.id,
            notifications,
        })
    }
}
