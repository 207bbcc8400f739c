use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::FieldChange;

/// Overall state of a decision. `Pending` is the only mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Pending => "pending",
            DecisionStatus::Approved => "approved",
            DecisionStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DecisionStatus::Pending)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DecisionStatus::Pending),
            "approved" => Ok(DecisionStatus::Approved),
            "rejected" => Ok(DecisionStatus::Rejected),
            other => Err(format!("Unknown decision status: {other}")),
        }
    }
}

/// State of a single approver assignment. Moves out of `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Approved => "approved",
            AssignmentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AssignmentStatus::Pending),
            "approved" => Ok(AssignmentStatus::Approved),
            "rejected" => Ok(AssignmentStatus::Rejected),
            other => Err(format!("Unknown approval status: {other}")),
        }
    }
}

/// The action an approver submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Approve,
    Reject,
}

impl Vote {
    /// Assignment status the vote moves the approver's row into.
    pub fn outcome(&self) -> AssignmentStatus {
        match self {
            Vote::Approve => AssignmentStatus::Approved,
            Vote::Reject => AssignmentStatus::Rejected,
        }
    }
}

impl FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "approve" => Ok(Vote::Approve),
            "reject" => Ok(Vote::Reject),
            _ => Err("Invalid action.".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub summary: String,
    pub context: String,
    pub status: DecisionStatus,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Decision {
    pub fn fields(&self) -> DecisionFields {
        DecisionFields {
            title: self.title.clone(),
            summary: self.summary.clone(),
            context: self.context.clone(),
        }
    }
}

/// The mutable text fields of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionFields {
    pub title: String,
    pub summary: String,
    pub context: String,
}

impl DecisionFields {
    /// Per-field before/after map. Unchanged fields are omitted.
    pub fn changes_to(&self, next: &DecisionFields) -> BTreeMap<String, FieldChange> {
        let mut changes = BTreeMap::new();
        let pairs = [
            ("title", &self.title, &next.title),
            ("summary", &self.summary, &next.summary),
            ("context", &self.context, &next.context),
        ];
        for (name, from, to) in pairs {
            if from != to {
                changes.insert(
                    name.to_string(),
                    FieldChange {
                        from: Some(from.clone()),
                        to: Some(to.clone()),
                    },
                );
            }
        }
        changes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub decision_id: Uuid,
    pub approver_user_id: Uuid,
    pub status: AssignmentStatus,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Fold assignment statuses into the decision status.
///
/// Any rejection rejects. Unanimous approval over a non-empty set approves.
/// Everything else, including the empty set, stays pending.
pub fn aggregate_status<I>(statuses: I) -> DecisionStatus
where
    I: IntoIterator<Item = AssignmentStatus>,
{
    let mut seen_any = false;
    let mut all_approved = true;
    for status in statuses {
        seen_any = true;
        match status {
            AssignmentStatus::Rejected => return DecisionStatus::Rejected,
            AssignmentStatus::Pending => all_approved = false,
            AssignmentStatus::Approved => {}
        }
    }
    if seen_any && all_approved {
        DecisionStatus::Approved
    } else {
        DecisionStatus::Pending
    }
}

/// [`aggregate_status`] over a slice, applied by the store inside each unit
/// that changes assignments.
pub fn settle_assignments(statuses: &[AssignmentStatus]) -> DecisionStatus {
    aggregate_status(statuses.iter().copied())
}

/// Set difference between the current and requested approver lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApproverDiff {
    pub to_add: Vec<Uuid>,
    pub to_remove: Vec<Uuid>,
}

impl ApproverDiff {
    pub fn between(existing: &[Uuid], requested: &[Uuid]) -> Self {
        let existing_set: HashSet<&Uuid> = existing.iter().collect();
        let requested_set: HashSet<&Uuid> = requested.iter().collect();

        let mut to_add = Vec::new();
        for id in requested {
            if !existing_set.contains(id) && !to_add.contains(id) {
                to_add.push(*id);
            }
        }
        let to_remove = existing
            .iter()
            .filter(|id| !requested_set.contains(id))
            .copied()
            .collect();

        ApproverDiff { to_add, to_remove }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Collapse repeated approver ids, keeping first-seen order.
pub fn dedup_approvers(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(**id)).copied().collect()
}

/// Dashboard status tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(DecisionStatus),
}

impl StatusFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("pending") => StatusFilter::Only(DecisionStatus::Pending),
            Some("approved") => StatusFilter::Only(DecisionStatus::Approved),
            Some("rejected") => StatusFilter::Only(DecisionStatus::Rejected),
            _ => StatusFilter::All,
        }
    }

    pub fn matches(&self, status: DecisionStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

pub const PAGE_SIZE: i64 = 10;

/// Listing request, already narrowed by the caller's visibility.
#[derive(Debug, Clone)]
pub struct DecisionQuery {
    pub workspace_id: Uuid,
    /// Restrict to decisions this user owns or is assigned to.
    pub visible_to: Option<Uuid>,
    /// Restrict to decisions this user is assigned to.
    pub assigned_to: Option<Uuid>,
    pub status: StatusFilter,
    pub search: Option<String>,
    pub page: i64,
    pub per_page: i64,
}

impl DecisionQuery {
    /// Rows to skip. Saturates, so an absurd page number reads as past the end.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionPage {
    pub decisions: Vec<Decision>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

impl DecisionPage {
    pub fn new(decisions: Vec<Decision>, page: i64, per_page: i64, total_count: i64) -> Self {
        let total_pages = (total_count.saturating_add(per_page - 1) / per_page.max(1)).max(1);
        DecisionPage {
            decisions,
            page,
            per_page,
            total_count,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AssignmentStatus::*;

    #[test]
    fn empty_assignment_set_stays_pending() {
        assert_eq!(aggregate_status(Vec::new()), DecisionStatus::Pending);
    }

    #[test]
    fn unanimous_approval_approves() {
        assert_eq!(aggregate_status([Approved, Approved]), DecisionStatus::Approved);
    }

    #[test]
    fn single_rejection_is_absorbing() {
        assert_eq!(aggregate_status([Approved, Rejected, Pending]), DecisionStatus::Rejected);
        assert_eq!(aggregate_status([Pending, Rejected]), DecisionStatus::Rejected);
    }

    #[test]
    fn partial_approval_stays_pending() {
        assert_eq!(aggregate_status([Approved, Pending]), DecisionStatus::Pending);
    }

    #[test]
    fn aggregation_ignores_order() {
        let a = aggregate_status([Pending, Approved, Rejected]);
        let b = aggregate_status([Rejected, Pending, Approved]);
        assert_eq!(a, b);
    }

    #[test]
    fn approver_diff_computes_both_sides() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let diff = ApproverDiff::between(&[a, b], &[b, c, c]);
        assert_eq!(diff.to_add, vec![c]);
        assert_eq!(diff.to_remove, vec![a]);
    }

    #[test]
    fn approver_diff_same_set_is_empty() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(ApproverDiff::between(&[a, b], &[b, a]).is_empty());
    }

    #[test]
    fn field_changes_only_lists_edits() {
        let before = DecisionFields {
            title: "Adopt Rust".into(),
            summary: "Use Rust for services".into(),
            context: "Long context for the decision".into(),
        };
        let mut after = before.clone();
        after.title = "Adopt Rust everywhere".into();
        let changes = before.changes_to(&after);
        assert_eq!(changes.len(), 1);
        let title = &changes["title"];
        assert_eq!(title.from.as_deref(), Some("Adopt Rust"));
        assert_eq!(title.to.as_deref(), Some("Adopt Rust everywhere"));
    }

    #[test]
    fn vote_parsing_rejects_unknown_actions() {
        assert_eq!("approve".parse::<Vote>(), Ok(Vote::Approve));
        assert_eq!("reject".parse::<Vote>(), Ok(Vote::Reject));
        assert_eq!("abstain".parse::<Vote>(), Err("Invalid action.".to_string()));
    }

    #[test]
    fn offset_saturates_on_huge_pages() {
        let mut query = DecisionQuery {
            workspace_id: Uuid::new_v4(),
            visible_to: None,
            assigned_to: None,
            status: StatusFilter::All,
            search: None,
            page: 3,
            per_page: PAGE_SIZE,
        };
        assert_eq!(query.offset(), 20);
        query.page = i64::MAX;
        assert_eq!(query.offset(), i64::MAX);
        query.page = -4;
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn page_count_is_never_zero() {
        assert_eq!(DecisionPage::new(vec![], 1, 10, 0).total_pages, 1);
        assert_eq!(DecisionPage::new(vec![], 1, 10, 21).total_pages, 3);
    }
}
