//! Approval Engine.
//!
//! Owns every mutation of a decision. Each operation follows the same shape:
//!
//! 1. resolve the caller's role through the [`MemberDirectory`] and ask
//!    [`crate::policy`] (fail closed);
//! 2. read everything the emails will need;
//! 3. hand one atomic unit of work to the [`Store`]: the change, its audit
//!    events, and the fold of the resulting assignment set into a decision
//!    status, persisted if it became terminal;
//! 4. send emails and return them as a [`NotificationReport`] beside the result.
//!
//! Nothing after step 3 returns an error, so a committed change is always
//! reported as a success and a delivery failure can never undo it.

mod decisions;
mod views;
mod votes;

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::directory::MemberDirectory;
use crate::errors::CoreError;
use crate::models::decision::{DecisionFields, dedup_approvers};
use crate::models::link::{LinkInput, MAX_LINKS_TEXT, parse_links};
use crate::models::member::Member;
use crate::notify::{self, Email, NotificationReport, Notifier, NotifyError};
use crate::store::Store;
use crate::validate;

pub use views::{ApproverView, DecisionDetail, DecisionList, DecisionSummary, ListFilter};
pub use votes::VoteReceipt;
pub use decisions::EditReceipt;

/// A committed result plus what happened to its emails.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub notifications: NotificationReport,
}

impl<T> Outcome<T> {
    /// Warning for the caller when some emails were not delivered.
    pub fn warning(&self) -> Option<String> {
        self.notifications.summary()
    }
}

/// Raw create/edit form values.
#[derive(Debug, Clone, Default)]
pub struct DecisionForm {
    pub title: String,
    pub summary: String,
    pub context: String,
    pub links: Option<String>,
    pub approvers: Vec<String>,
}

/// A form that passed validation.
#[derive(Debug, Clone)]
pub(crate) struct ValidDecision {
    pub fields: DecisionFields,
    pub links: Vec<LinkInput>,
    pub approvers: Vec<Uuid>,
}

impl DecisionForm {
    pub(crate) fn validate(&self) -> Result<ValidDecision, CoreError> {
        let links_text = self.links.as_deref().unwrap_or("").trim();
        if let Some(err) = validate::first_error([
            validate::validate_min_len(&self.title, "Title", 2),
            validate::validate_min_len(&self.summary, "Summary", 2),
            validate::validate_min_len(&self.context, "Context", 10),
            validate::validate_optional(links_text, "Links", MAX_LINKS_TEXT),
        ]) {
            return Err(CoreError::Validation(err));
        }

        let links = parse_links(links_text).map_err(CoreError::Validation)?;
        let approvers = self
            .approvers
            .iter()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| validate::parse_uuid(raw, "Invalid approver."))
            .collect::<Result<Vec<_>, _>>()
            .map_err(CoreError::Validation)?;

        Ok(ValidDecision {
            fields: DecisionFields {
                title: self.title.trim().to_string(),
                summary: self.summary.trim().to_string(),
                context: self.context.trim().to_string(),
            },
            links,
            approvers: dedup_approvers(&approvers),
        })
    }
}

#[derive(Clone)]
pub struct ApprovalEngine {
    store: Arc<dyn Store>,
    directory: MemberDirectory,
    notifier: Arc<dyn Notifier>,
    site_url: String,
}

impl ApprovalEngine {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, site_url: impl Into<String>) -> Self {
        ApprovalEngine {
            directory: MemberDirectory::new(store.clone()),
            store,
            notifier,
            site_url: site_url.into(),
        }
    }

    pub fn directory(&self) -> &MemberDirectory {
        &self.directory
    }

    /// Every approver must belong to the decision's workspace.
    fn check_approvers(members: &HashMap<Uuid, Member>, approvers: &[Uuid]) -> Result<(), CoreError> {
        if approvers.iter().all(|id| members.contains_key(id)) {
            Ok(())
        } else {
            Err(CoreError::validation("Approvers must be members of this workspace."))
        }
    }

    /// Render one email per recipient that has an address on file.
    fn compose<F>(members: &HashMap<Uuid, Member>, recipients: &[Uuid], build: F) -> (Vec<Email>, NotificationReport)
    where
        F: Fn(&str) -> Result<Email, NotifyError>,
    {
        let mut emails = Vec::new();
        let mut report = NotificationReport::default();
        for user_id in recipients {
            let Some(to) = members.get(user_id).and_then(|m| m.email.as_deref()) else {
                continue;
            };
            match build(to) {
                Ok(email) => emails.push(email),
                Err(error) => report.failures.push(notify::DeliveryFailure {
                    to: to.to_string(),
                    error,
                }),
            }
        }
        (emails, report)
    }

    async fn send<F>(&self, members: &HashMap<Uuid, Member>, recipients: &[Uuid], build: F) -> NotificationReport
    where
        F: Fn(&str) -> Result<Email, NotifyError>,
    {
        let (emails, mut report) = Self::compose(members, recipients, build);
        report.merge(notify::dispatch(self.notifier.as_ref(), emails).await);
        report
    }
}

/// Owner plus every assignee, minus `actor`, without repeats.
fn participants(owner: Uuid, assignees: impl IntoIterator<Item = Uuid>, actor: Uuid) -> Vec<Uuid> {
    let mut out = Vec::new();
    for id in std::iter::once(owner).chain(assignees) {
        if id != actor && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

fn display_name(members: &HashMap<Uuid, Member>, user_id: Uuid) -> String {
    members
        .get(&user_id)
        .map(Member::display_name)
        .unwrap_or_else(|| "A former member".to_string())
}
