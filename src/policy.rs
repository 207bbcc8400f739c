//! Access policy.
//!
//! Pure functions of (role, ownership, decision status, assignment). Every
//! mutating operation consults these before touching the store, and every
//! check fails closed: a caller without a membership is denied everything
//! except voting on an assignment they still hold.

use serde::Serialize;
use uuid::Uuid;

use crate::models::decision::{AssignmentStatus, DecisionStatus};
use crate::models::member::Role;

/// Only admins and members start decisions; the creator becomes the owner.
pub fn can_create_decision(role: Option<Role>) -> bool {
    matches!(role, Some(Role::Admin) | Some(Role::Member))
}

/// Pending decisions only, by their owner or a workspace admin.
pub fn can_edit_decision(role: Option<Role>, is_owner: bool, status: DecisionStatus) -> bool {
    if status != DecisionStatus::Pending {
        return false;
    }
    match role {
        Some(Role::Auditor) | None => false,
        Some(Role::Admin) => true,
        Some(_) => is_owner,
    }
}

/// Holding a pending assignment is the authorization to vote. The workspace
/// role does not matter, and a former member keeps their assignment, but
/// auditors are read-only.
pub fn can_vote(role: Option<Role>, assignment: Option<AssignmentStatus>) -> bool {
    role != Some(Role::Auditor) && assignment == Some(AssignmentStatus::Pending)
}

/// Comments are allowed in any decision status, for every non-auditor member.
pub fn can_comment(role: Option<Role>) -> bool {
    matches!(role, Some(r) if r != Role::Auditor)
}

pub fn can_view(role: Option<Role>) -> bool {
    role.is_some()
}

/// Invite, add, update and remove members.
pub fn can_manage_members(role: Option<Role>) -> bool {
    role == Some(Role::Admin)
}

/// Admins may remove anyone but themselves.
pub fn can_remove_member(role: Option<Role>, caller_id: Uuid, target_user_id: Uuid) -> bool {
    can_manage_members(role) && caller_id != target_user_id
}

/// Admins and auditors see every decision in the workspace listing; everyone
/// else sees what they own or are assigned to.
pub fn sees_all_decisions(role: Option<Role>) -> bool {
    matches!(role, Some(Role::Admin) | Some(Role::Auditor))
}

/// What a viewer may do with one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecisionPermissions {
    pub can_create: bool,
    pub can_edit: bool,
    pub can_approve: bool,
    pub can_comment: bool,
    pub can_view: bool,
}

impl DecisionPermissions {
    pub fn evaluate(
        role: Option<Role>,
        is_owner: bool,
        status: DecisionStatus,
        assignment: Option<AssignmentStatus>,
    ) -> Self {
        DecisionPermissions {
            can_create: can_create_decision(role),
            can_edit: can_edit_decision(role, is_owner, status),
            can_approve: status == DecisionStatus::Pending && can_vote(role, assignment),
            can_comment: can_comment(role),
            can_view: can_view(role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 4] = [Role::Admin, Role::Member, Role::Approver, Role::Auditor];

    #[test]
    fn create_is_limited_to_admins_and_members() {
        assert!(can_create_decision(Some(Role::Admin)));
        assert!(can_create_decision(Some(Role::Member)));
        assert!(!can_create_decision(Some(Role::Approver)));
        assert!(!can_create_decision(Some(Role::Auditor)));
        assert!(!can_create_decision(None));
    }

    #[test]
    fn edit_requires_pending_status() {
        for role in ALL_ROLES {
            assert!(!can_edit_decision(Some(role), true, DecisionStatus::Approved));
            assert!(!can_edit_decision(Some(role), true, DecisionStatus::Rejected));
        }
    }

    #[test]
    fn edit_requires_owner_or_admin() {
        let pending = DecisionStatus::Pending;
        assert!(can_edit_decision(Some(Role::Admin), false, pending));
        assert!(can_edit_decision(Some(Role::Member), true, pending));
        assert!(!can_edit_decision(Some(Role::Member), false, pending));
        assert!(!can_edit_decision(Some(Role::Approver), false, pending));
        assert!(!can_edit_decision(Some(Role::Auditor), true, pending));
        assert!(!can_edit_decision(None, true, pending));
    }

    #[test]
    fn vote_follows_assignment_not_role() {
        for role in [Role::Admin, Role::Member, Role::Approver] {
            assert!(can_vote(Some(role), Some(AssignmentStatus::Pending)));
            assert!(!can_vote(Some(role), Some(AssignmentStatus::Approved)));
            assert!(!can_vote(Some(role), None));
        }
        assert!(!can_vote(Some(Role::Auditor), Some(AssignmentStatus::Pending)));
        assert!(can_vote(None, Some(AssignmentStatus::Pending)));
        assert!(!can_vote(None, None));
    }

    #[test]
    fn member_management_is_admin_only_and_never_self_removal() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(can_manage_members(Some(Role::Admin)));
        assert!(!can_manage_members(Some(Role::Member)));
        assert!(can_remove_member(Some(Role::Admin), me, other));
        assert!(!can_remove_member(Some(Role::Admin), me, me));
        assert!(!can_remove_member(Some(Role::Member), me, other));
    }

    #[test]
    fn auditor_is_read_only() {
        let p = DecisionPermissions::evaluate(
            Some(Role::Auditor),
            true,
            DecisionStatus::Pending,
            Some(AssignmentStatus::Pending),
        );
        assert_eq!(
            p,
            DecisionPermissions {
                can_create: false,
                can_edit: false,
                can_approve: false,
                can_comment: false,
                can_view: true,
            }
        );
    }

    #[test]
    fn terminal_decision_cannot_be_approved_even_with_pending_row() {
        let p = DecisionPermissions::evaluate(
            Some(Role::Approver),
            false,
            DecisionStatus::Rejected,
            Some(AssignmentStatus::Pending),
        );
        assert!(!p.can_approve);
        assert!(p.can_view);
    }

    #[test]
    fn non_members_get_nothing() {
        let p = DecisionPermissions::evaluate(None, true, DecisionStatus::Pending, Some(AssignmentStatus::Pending));
        assert!(!p.can_view && !p.can_edit && !p.can_approve && !p.can_comment && !p.can_create);
    }
}
