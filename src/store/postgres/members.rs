use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::parse_column;
use crate::models::invite::{Invite, InviteAcceptance, NewInvite};
use crate::models::member::{Member, MemberUpdate, NewMember};
use crate::models::user::User;
use crate::models::workspace::{Membership, Workspace};
use crate::store::StoreError;

const SELECT_MEMBER: &str = "\
    SELECT id, workspace_id, user_id, role, member_name, member_title, member_email, \
           is_default, created_at \
    FROM workspace_members";

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    workspace_id: Uuid,
    user_id: Uuid,
    role: String,
    member_name: Option<String>,
    member_title: Option<String>,
    member_email: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl MemberRow {
    fn into_member(self) -> Result<Member, StoreError> {
        Ok(Member {
            id: self.id,
            workspace_id: self.workspace_id,
            user_id: self.user_id,
            role: parse_column(&self.role, "workspace_members")?,
            name: self.member_name,
            title: self.member_title,
            email: self.member_email,
            is_default: self.is_default,
            created_at: self.created_at,
        })
    }
}

// --- accounts ---

pub async fn create_user(pool: &PgPool, user: &User) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES ($1, $2, $3, $4)")
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            created_at: r.created_at,
        }
    }
}

pub async fn find_user(pool: &PgPool, id: Uuid) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, password_hash, created_at FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(User::from))
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, password_hash, created_at FROM users WHERE lower(email) = lower($1)",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(User::from))
}

// --- workspaces ---

/// Insert a membership. It becomes the user's default if it is their first.
async fn insert_member_row(conn: &mut PgConnection, member: &NewMember) -> Result<Member, StoreError> {
    let row = sqlx::query_as::<_, MemberRow>(
        "INSERT INTO workspace_members \
             (id, workspace_id, user_id, role, member_name, member_title, member_email, is_default) \
         SELECT $1, $2, $3, $4, $5, $6, $7, \
                NOT EXISTS (SELECT 1 FROM workspace_members WHERE user_id = $3) \
         RETURNING id, workspace_id, user_id, role, member_name, member_title, member_email, \
                   is_default, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(member.workspace_id)
    .bind(member.user_id)
    .bind(member.role.as_str())
    .bind(&member.name)
    .bind(&member.title)
    .bind(&member.email)
    .fetch_one(&mut *conn)
    .await?;
    row.into_member()
}

pub async fn create_workspace_with_admin(
    pool: &PgPool,
    workspace: &Workspace,
    admin: &NewMember,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    sqlx::query("INSERT INTO workspaces (id, name, description) VALUES ($1, $2, $3)")
        .bind(workspace.id)
        .bind(&workspace.name)
        .bind(&workspace.description)
        .execute(&mut *tx)
        .await?;
    insert_member_row(&mut tx, admin).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn memberships_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Membership>, StoreError> {
    #[derive(sqlx::FromRow)]
    struct Row {
        workspace_id: Uuid,
        name: String,
        description: Option<String>,
        member_id: Uuid,
        role: String,
        is_default: bool,
        joined_at: DateTime<Utc>,
    }

    let rows = sqlx::query_as::<_, Row>(
        "SELECT w.id AS workspace_id, w.name, w.description, \
                m.id AS member_id, m.role, m.is_default, m.created_at AS joined_at \
         FROM workspace_members m \
         JOIN workspaces w ON w.id = m.workspace_id \
         WHERE m.user_id = $1 \
         ORDER BY m.created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(Membership {
                workspace: Workspace {
                    id: r.workspace_id,
                    name: r.name,
                    description: r.description,
                },
                member_id: r.member_id,
                role: parse_column(&r.role, "workspace_members")?,
                is_default: r.is_default,
                joined_at: r.joined_at,
            })
        })
        .collect()
}

pub async fn set_default_workspace(pool: &PgPool, user_id: Uuid, workspace_id: Uuid) -> Result<bool, StoreError> {
    let mut tx = pool.begin().await?;
    let exists: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM workspace_members WHERE user_id = $1 AND workspace_id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(workspace_id)
    .fetch_optional(&mut *tx)
    .await?;
    if exists.is_none() {
        return Ok(false);
    }
    sqlx::query("UPDATE workspace_members SET is_default = (workspace_id = $2) WHERE user_id = $1")
        .bind(user_id)
        .bind(workspace_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(true)
}

// --- members ---

pub async fn find_member(pool: &PgPool, workspace_id: Uuid, user_id: Uuid) -> Result<Option<Member>, StoreError> {
    let row = sqlx::query_as::<_, MemberRow>(&format!(
        "{SELECT_MEMBER} WHERE workspace_id = $1 AND user_id = $2"
    ))
    .bind(workspace_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    row.map(MemberRow::into_member).transpose()
}

pub async fn find_member_by_id(pool: &PgPool, workspace_id: Uuid, member_id: Uuid) -> Result<Option<Member>, StoreError> {
    let row = sqlx::query_as::<_, MemberRow>(&format!(
        "{SELECT_MEMBER} WHERE workspace_id = $1 AND id = $2"
    ))
    .bind(workspace_id)
    .bind(member_id)
    .fetch_optional(pool)
    .await?;
    row.map(MemberRow::into_member).transpose()
}

pub async fn list_members(pool: &PgPool, workspace_id: Uuid) -> Result<Vec<Member>, StoreError> {
    let rows = sqlx::query_as::<_, MemberRow>(&format!(
        "{SELECT_MEMBER} WHERE workspace_id = $1 ORDER BY created_at"
    ))
    .bind(workspace_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(MemberRow::into_member).collect()
}

pub async fn insert_member(pool: &PgPool, member: &NewMember) -> Result<Member, StoreError> {
    let mut conn = pool.acquire().await?;
    insert_member_row(&mut conn, member).await
}

pub async fn update_member(
    pool: &PgPool,
    workspace_id: Uuid,
    member_id: Uuid,
    update: &MemberUpdate,
) -> Result<Option<Member>, StoreError> {
    let row = sqlx::query_as::<_, MemberRow>(
        "UPDATE workspace_members \
         SET member_name = $3, member_title = $4, role = COALESCE($5, role) \
         WHERE workspace_id = $1 AND id = $2 \
         RETURNING id, workspace_id, user_id, role, member_name, member_title, member_email, \
                   is_default, created_at",
    )
    .bind(workspace_id)
    .bind(member_id)
    .bind(&update.name)
    .bind(&update.title)
    .bind(update.role.map(|r| r.as_str()))
    .fetch_optional(pool)
    .await?;
    row.map(MemberRow::into_member).transpose()
}

pub async fn update_profile(
    pool: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
    name: &str,
    title: &str,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE workspace_members SET member_name = $3, member_title = $4 \
         WHERE workspace_id = $1 AND user_id = $2",
    )
    .bind(workspace_id)
    .bind(user_id)
    .bind(name)
    .bind(title)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_member(pool: &PgPool, workspace_id: Uuid, member_id: Uuid) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM workspace_members WHERE workspace_id = $1 AND id = $2")
        .bind(workspace_id)
        .bind(member_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// --- invites ---

#[derive(sqlx::FromRow)]
struct InviteRow {
    token: Uuid,
    workspace_id: Uuid,
    email: String,
    role: String,
    member_title: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
}

impl InviteRow {
    fn into_invite(self) -> Result<Invite, StoreError> {
        Ok(Invite {
            token: self.token,
            workspace_id: self.workspace_id,
            email: self.email,
            role: parse_column(&self.role, "workspace_invites")?,
            title: self.member_title,
            created_by: self.created_by,
            created_at: self.created_at,
            accepted_at: self.accepted_at,
        })
    }
}

pub async fn insert_invite(pool: &PgPool, invite: &NewInvite) -> Result<Invite, StoreError> {
    let row = sqlx::query_as::<_, InviteRow>(
        "INSERT INTO workspace_invites (token, workspace_id, email, role, member_title, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING token, workspace_id, email, role, member_title, created_by, created_at, accepted_at",
    )
    .bind(Uuid::new_v4())
    .bind(invite.workspace_id)
    .bind(&invite.email)
    .bind(invite.role.as_str())
    .bind(&invite.title)
    .bind(invite.created_by)
    .fetch_one(pool)
    .await?;
    row.into_invite()
}

pub async fn find_invite(pool: &PgPool, token: Uuid) -> Result<Option<Invite>, StoreError> {
    let row = sqlx::query_as::<_, InviteRow>(
        "SELECT token, workspace_id, email, role, member_title, created_by, created_at, accepted_at \
         FROM workspace_invites WHERE token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    row.map(InviteRow::into_invite).transpose()
}

pub async fn accept_invite(pool: &PgPool, token: Uuid, member: &NewMember) -> Result<InviteAcceptance, StoreError> {
    let mut tx = pool.begin().await?;

    let invite: Option<(Uuid, Option<DateTime<Utc>>)> = sqlx::query_as(
        "SELECT workspace_id, accepted_at FROM workspace_invites WHERE token = $1 FOR UPDATE",
    )
    .bind(token)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((workspace_id, accepted_at)) = invite else {
        return Ok(InviteAcceptance::NotFound);
    };
    if accepted_at.is_some() {
        return Ok(InviteAcceptance::AlreadyAccepted);
    }

    let existing: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
    )
    .bind(workspace_id)
    .bind(member.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Ok(InviteAcceptance::AlreadyMember);
    }

    insert_member_row(&mut tx, member).await?;
    sqlx::query(
        "UPDATE workspace_invites SET accepted_at = now(), accepted_by = $2 WHERE token = $1",
    )
    .bind(token)
    .bind(member.user_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(InviteAcceptance::Accepted { workspace_id })
}
