//! Member Directory.
//!
//! Resolves a user to their role and display identity inside a workspace, and
//! owns the workspace/member/invite record management around it. Every admin
//! operation checks `policy::can_manage_members` before touching the store.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::invite::{Invite, InviteAcceptance, NewInvite};
use crate::models::member::{Member, MemberUpdate, NewMember, Role};
use crate::models::user::Identity;
use crate::models::workspace::{self, Membership, Workspace};
use crate::policy;
use crate::store::{Store, StoreError};
use crate::validate::{self, MAX_OPTIONAL_LEN};

/// Fields of the add-member and invite forms.
#[derive(Debug, Clone, Default)]
pub struct MemberInput {
    pub email: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub role: Option<String>,
}

#[derive(Clone)]
pub struct MemberDirectory {
    store: Arc<dyn Store>,
}

impl MemberDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        MemberDirectory { store }
    }

    // --- lookups ---

    pub async fn member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<Member>, CoreError> {
        Ok(self.store.find_member(workspace_id, user_id).await?)
    }

    /// The caller's role, or `None` for non-members.
    pub async fn role_of(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<Role>, CoreError> {
        Ok(self.member(workspace_id, user_id).await?.map(|m| m.role))
    }

    pub async fn members(&self, workspace_id: Uuid) -> Result<Vec<Member>, CoreError> {
        Ok(self.store.list_members(workspace_id).await?)
    }

    /// Members keyed by user id, for display lookups.
    pub async fn members_by_user(&self, workspace_id: Uuid) -> Result<HashMap<Uuid, Member>, CoreError> {
        Ok(self
            .members(workspace_id)
            .await?
            .into_iter()
            .map(|m| (m.user_id, m))
            .collect())
    }

    /// Members list, visible to any member of the workspace.
    pub async fn list_members(&self, workspace_id: Uuid, caller: Uuid) -> Result<Vec<Member>, CoreError> {
        let role = self.role_of(workspace_id, caller).await?;
        if !policy::can_view(role) {
            return Err(CoreError::authorization("You are not a member of this workspace."));
        }
        self.members(workspace_id).await
    }

    // --- workspaces ---

    pub async fn memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, CoreError> {
        Ok(self.store.memberships_for_user(user_id).await?)
    }

    /// Cookie workspace if the user belongs to it, else default, else earliest.
    pub async fn active_workspace(&self, user_id: Uuid, preferred: Option<Uuid>) -> Result<Option<Membership>, CoreError> {
        let memberships = self.memberships(user_id).await?;
        Ok(workspace::pick_active(&memberships, preferred).cloned())
    }

    pub async fn create_workspace(
        &self,
        caller: &Identity,
        name: &str,
        description: Option<&str>,
    ) -> Result<Uuid, CoreError> {
        let description = validate::optional_text(description);
        if let Some(err) = validate::first_error([
            validate::validate_min_len(name, "Workspace name", 2),
            validate::validate_optional(description.as_deref().unwrap_or(""), "Description", MAX_OPTIONAL_LEN),
        ]) {
            return Err(CoreError::Validation(err));
        }

        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            description,
        };
        let admin = NewMember {
            workspace_id: workspace.id,
            user_id: caller.user_id,
            role: Role::Admin,
            name: None,
            title: None,
            email: Some(caller.email.clone()),
        };
        self.store.create_workspace_with_admin(&workspace, &admin).await?;
        log::info!("Workspace {} created by {}", workspace.id, caller.user_id);
        Ok(workspace.id)
    }

    pub async fn switch_workspace(&self, user_id: Uuid, workspace_id: Uuid) -> Result<Membership, CoreError> {
        self.memberships(user_id)
            .await?
            .into_iter()
            .find(|m| m.workspace.id == workspace_id)
            .ok_or_else(|| CoreError::authorization("You do not have access to that workspace."))
    }

    pub async fn set_default_workspace(&self, user_id: Uuid, workspace_id: Uuid) -> Result<(), CoreError> {
        if self.store.set_default_workspace(user_id, workspace_id).await? {
            Ok(())
        } else {
            Err(CoreError::authorization("You do not have access to that workspace."))
        }
    }

    // --- members (admin) ---

    async fn require_admin(&self, workspace_id: Uuid, caller: Uuid) -> Result<Role, CoreError> {
        let role = self.role_of(workspace_id, caller).await?;
        match role {
            Some(r) if policy::can_manage_members(role) => Ok(r),
            _ => Err(CoreError::authorization("Only admins can manage members.")),
        }
    }

    pub async fn add_member_by_email(
        &self,
        workspace_id: Uuid,
        caller: Uuid,
        input: &MemberInput,
    ) -> Result<Member, CoreError> {
        self.require_admin(workspace_id, caller).await?;
        let (name, title, role) = check_member_input(input)?;

        let user = self
            .store
            .find_user_by_email(&input.email)
            .await?
            .ok_or_else(|| CoreError::validation("No user found with that email."))?;

        let new = NewMember {
            workspace_id,
            user_id: user.id,
            role,
            name,
            title,
            email: Some(user.email.clone()),
        };
        match self.store.insert_member(&new).await {
            Ok(member) => {
                log::info!("Member {} added to workspace {workspace_id}", member.user_id);
                Ok(member)
            }
            Err(StoreError::Duplicate(_)) => Err(CoreError::conflict("That user is already a member of this workspace.")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_invite(
        &self,
        workspace_id: Uuid,
        caller: Uuid,
        input: &MemberInput,
    ) -> Result<Invite, CoreError> {
        self.require_admin(workspace_id, caller).await?;
        let (_, title, role) = check_member_input(input)?;

        let invite = self
            .store
            .insert_invite(&NewInvite {
                workspace_id,
                email: input.email.trim().to_string(),
                role,
                title,
                created_by: caller,
            })
            .await?;
        log::info!("Invite created for workspace {workspace_id}");
        Ok(invite)
    }

    pub async fn invite(&self, token: Uuid) -> Result<Invite, CoreError> {
        self.store
            .find_invite(token)
            .await?
            .ok_or_else(|| CoreError::not_found("Invite not found."))
    }

    /// Join the invite's workspace. Returns the workspace id.
    pub async fn accept_invite(
        &self,
        token: Uuid,
        caller: &Identity,
        name: Option<&str>,
        title: Option<&str>,
    ) -> Result<Uuid, CoreError> {
        let invite = self.invite(token).await?;
        if !invite.is_pending() {
            return Err(CoreError::conflict("This invite has already been accepted."));
        }
        if !invite.matches_email(&caller.email) {
            return Err(CoreError::authorization("This invite was sent to a different email address."));
        }

        let name = validate::optional_text(name);
        let title = validate::optional_text(title).or(invite.title.clone());
        if let Some(err) = validate::first_error([
            validate::validate_optional(name.as_deref().unwrap_or(""), "Name", MAX_OPTIONAL_LEN),
            validate::validate_optional(title.as_deref().unwrap_or(""), "Title", MAX_OPTIONAL_LEN),
        ]) {
            return Err(CoreError::Validation(err));
        }

        let member = NewMember {
            workspace_id: invite.workspace_id,
            user_id: caller.user_id,
            role: invite.role,
            name,
            title,
            email: Some(caller.email.clone()),
        };
        match self.store.accept_invite(token, &member).await? {
            InviteAcceptance::Accepted { workspace_id } => {
                log::info!("Invite accepted: user {} joined workspace {workspace_id}", caller.user_id);
                Ok(workspace_id)
            }
            InviteAcceptance::AlreadyAccepted => Err(CoreError::conflict("This invite has already been accepted.")),
            InviteAcceptance::AlreadyMember => Err(CoreError::conflict("You are already a member of this workspace.")),
            InviteAcceptance::NotFound => Err(CoreError::not_found("Invite not found.")),
        }
    }

    /// Blank name/title clear the field; a blank role leaves it unchanged.
    pub async fn update_member(
        &self,
        workspace_id: Uuid,
        caller: Uuid,
        member_id: Uuid,
        name: Option<&str>,
        title: Option<&str>,
        role: Option<&str>,
    ) -> Result<Member, CoreError> {
        self.require_admin(workspace_id, caller).await?;

        let name = validate::optional_text(name);
        let title = validate::optional_text(title);
        if let Some(err) = validate::first_error([
            validate::validate_optional(name.as_deref().unwrap_or(""), "Name", MAX_OPTIONAL_LEN),
            validate::validate_optional(title.as_deref().unwrap_or(""), "Title", MAX_OPTIONAL_LEN),
        ]) {
            return Err(CoreError::Validation(err));
        }
        let role = match validate::optional_text(role) {
            Some(raw) => Some(raw.parse::<Role>().map_err(CoreError::Validation)?),
            None => None,
        };

        self.store
            .update_member(workspace_id, member_id, &MemberUpdate { name, title, role })
            .await?
            .ok_or_else(|| CoreError::not_found("Member not found in this workspace."))
    }

    /// Remove a membership. Past assignments and events stay as they are.
    pub async fn remove_member(
        &self,
        workspace_id: Uuid,
        caller: Uuid,
        member_id: Uuid,
        confirm_text: &str,
        confirm_checked: bool,
    ) -> Result<(), CoreError> {
        if !confirm_text.trim().eq_ignore_ascii_case("REMOVE") || !confirm_checked {
            return Err(CoreError::validation(
                "Please confirm removal by typing REMOVE and checking the box.",
            ));
        }
        let role = self.require_admin(workspace_id, caller).await?;

        let target = self
            .store
            .find_member_by_id(workspace_id, member_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Member not found in this workspace."))?;

        if !policy::can_remove_member(Some(role), caller, target.user_id) {
            return Err(CoreError::authorization("You cannot remove yourself. Use another admin."));
        }

        if !self.store.delete_member(workspace_id, member_id).await? {
            return Err(CoreError::not_found("Member not found in this workspace."));
        }
        log::info!("Member {} removed from workspace {workspace_id} by {caller}", target.user_id);
        Ok(())
    }

    /// The caller edits their own display name and title.
    pub async fn update_profile(&self, workspace_id: Uuid, caller: Uuid, name: &str, title: &str) -> Result<(), CoreError> {
        if let Some(err) = validate::first_error([
            validate::validate_min_len(name, "Name", 2),
            validate::validate_min_len(title, "Title", 2),
        ]) {
            return Err(CoreError::Validation(err));
        }
        if self
            .store
            .update_profile(workspace_id, caller, name.trim(), title.trim())
            .await?
        {
            Ok(())
        } else {
            Err(CoreError::authorization("You are not a member of this workspace."))
        }
    }
}

/// Shared checks of the add-member and invite forms.
fn check_member_input(input: &MemberInput) -> Result<(Option<String>, Option<String>, Role), CoreError> {
    let name = validate::optional_text(input.name.as_deref());
    let title = validate::optional_text(input.title.as_deref());
    if let Some(err) = validate::first_error([
        validate::validate_email(&input.email),
        validate::validate_optional(name.as_deref().unwrap_or(""), "Name", MAX_OPTIONAL_LEN),
        validate::validate_optional(title.as_deref().unwrap_or(""), "Title", MAX_OPTIONAL_LEN),
    ]) {
        return Err(CoreError::Validation(err));
    }
    let role = Role::parse_or_default(input.role.as_deref()).map_err(CoreError::Validation)?;
    Ok((name, title, role))
}
