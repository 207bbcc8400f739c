use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{ApprovalEngine, Outcome, display_name, participants};
use crate::audit::{EventKind, NewEvent};
use crate::errors::CoreError;
use crate::models::decision::{AssignmentStatus, DecisionStatus, Vote, settle_assignments};
use crate::models::member::Role;
use crate::notify::emails;
use crate::policy;
use crate::store::{Settled, VoteApplied, VoteWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    pub vote: Vote,
    /// Decision status after the vote.
    pub status: DecisionStatus,
    /// True when this vote moved the decision out of pending.
    pub finalized: bool,
}

fn already_voted() -> CoreError {
    CoreError::conflict("You have already voted on this decision.")
}

fn not_pending() -> CoreError {
    CoreError::conflict("Only pending decisions can be approved/rejected.")
}

fn not_assigned() -> CoreError {
    CoreError::authorization("You are not assigned to this decision.")
}

impl ApprovalEngine {
    /// Record one approver's vote and settle the decision status.
    ///
    /// The store applies the assignment update only while the row is still
    /// pending and folds the assignment set in the same unit, so of two racing
    /// votes exactly one is recorded and no vote lands after the decision closed.
    /// A pending assignment authorizes the vote even if its holder has since
    /// left the workspace.
    pub async fn cast_vote(&self, decision_id: Uuid, caller: Uuid, action: &str) -> Result<Outcome<VoteReceipt>, CoreError> {
        let vote: Vote = action.parse().map_err(CoreError::Validation)?;
        let decision = self.load(decision_id).await?;
        let role = self.directory.role_of(decision.workspace_id, caller).await?;
        if role == Some(Role::Auditor) {
            return Err(CoreError::authorization("Auditors cannot vote on decisions."));
        }
        if decision.status != DecisionStatus::Pending {
            return Err(not_pending());
        }

        let assignments = self.store.list_assignments(decision_id).await?;
        let mine = assignments
            .iter()
            .find(|a| a.approver_user_id == caller)
            .map(|a| a.status);
        if !policy::can_vote(role, mine) {
            return Err(match (mine, role) {
                (Some(_), _) => already_voted(),
                (None, None) => CoreError::authorization("You do not have access to this decision."),
                (None, Some(_)) => not_assigned(),
            });
        }
        let members = self.directory.members_by_user(decision.workspace_id).await?;

        let now = Utc::now();
        let kind = match vote {
            Vote::Approve => EventKind::Approved {},
            Vote::Reject => EventKind::Rejected {},
        };
        let write = VoteWrite {
            decision_id,
            approver_user_id: caller,
            outcome: vote.outcome(),
            decided_at: now,
            event: NewEvent::new(decision_id, caller, kind, now),
            settle: settle_assignments,
        };
        let settled = match self.store.apply_vote(&write).await? {
            VoteApplied::Recorded(settled) => settled,
            VoteApplied::DecisionNotFound => return Err(CoreError::not_found("Decision not found.")),
            VoteApplied::DecisionNotPending(_) => return Err(not_pending()),
            VoteApplied::AlreadyVoted(_) => return Err(already_voted()),
            VoteApplied::NotAssigned => return Err(not_assigned()),
        };
        log::info!("Vote {:?} recorded on decision {decision_id} by {caller}", vote);
        let Settled {
            assignments,
            status,
            finalized,
        } = settled;
        if finalized {
            log::info!("Decision {decision_id} finalised as {status}");
        }

        let recipients = participants(
            decision.owner_user_id,
            assignments.iter().map(|a| a.approver_user_id),
            caller,
        );
        let subject = emails::Subject::new(&self.site_url, decision_id, &decision.title);
        let voter = display_name(&members, caller);
        let mut notifications = self
            .send(&members, &recipients, |to| emails::vote_cast(to, &subject, &voter, vote))
            .await;
        if finalized {
            notifications.merge(
                self.send(&members, &recipients, |to| emails::final_status(to, &subject, status))
                    .await,
            );
        }

        Ok(Outcome {
            value: VoteReceipt { vote, status, finalized },
            notifications,
        })
    }

    /// Re-derive a decision's status from its current assignments and persist
    /// it if it became terminal. Safe to call any number of times.
    pub async fn recompute_status(&self, decision_id: Uuid) -> Result<DecisionStatus, CoreError> {
        let decision = self.load(decision_id).await?;
        let assignments = self.store.list_assignments(decision_id).await?;
        let statuses: Vec<AssignmentStatus> = assignments.iter().map(|a| a.status).collect();
        let folded = settle_assignments(&statuses);
        if folded == DecisionStatus::Pending {
            return Ok(decision.status);
        }
        if self.store.finalize_status(decision_id, folded, Utc::now()).await? {
            log::info!("Decision {decision_id} finalised as {folded}");
            return Ok(folded);
        }
        Ok(self.load(decision_id).await?.status)
    }
}
