use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use super::{Notice, form_failure, redirect, redirect_with, view_failure, workspace_context};
use crate::AppState;
use crate::auth::csrf;
use crate::directory::MemberInput;
use crate::errors::AppError;
use crate::policy;
use crate::validate;

const BACK: &str = "/settings/members";

#[derive(Deserialize)]
pub struct MemberForm {
    pub email: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub role: Option<String>,
    pub csrf_token: String,
}

impl MemberForm {
    fn input(&self) -> MemberInput {
        MemberInput {
            email: self.email.clone(),
            name: self.name.clone(),
            title: self.title.clone(),
            role: self.role.clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateMemberForm {
    pub member_id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub role: Option<String>,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct RemoveMemberForm {
    pub member_id: String,
    #[serde(default)]
    pub confirm_text: String,
    pub confirm: Option<String>,
    pub csrf_token: String,
}

pub async fn list(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    notice: web::Query<Notice>,
) -> Result<HttpResponse, AppError> {
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };
    let members = match state.directory().list_members(ctx.workspace_id(), ctx.user_id()).await {
        Ok(members) => members,
        Err(err) => return view_failure(err),
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "csrf_token": csrf::get_or_create_token(&session),
        "workspace": ctx.membership.workspace,
        "members": members,
        "can_manage": policy::can_manage_members(Some(ctx.membership.role)),
        "current_user_id": ctx.user_id(),
        "error": notice.error,
        "warning": notice.warning,
    })))
}

pub async fn add(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<MemberForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };
    match state
        .directory()
        .add_member_by_email(ctx.workspace_id(), ctx.user_id(), &form.input())
        .await
    {
        Ok(_) => Ok(redirect(BACK)),
        Err(err) => Ok(form_failure(BACK, err)),
    }
}

pub async fn invite(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<MemberForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };
    match state
        .directory()
        .create_invite(ctx.workspace_id(), ctx.user_id(), &form.input())
        .await
    {
        // The admin shares the link; the token is the only credential.
        Ok(invite) => Ok(redirect_with(BACK, "invite", &format!("/invites/{}", invite.token))),
        Err(err) => Ok(form_failure(BACK, err)),
    }
}

pub async fn update(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<UpdateMemberForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };
    let member_id = match validate::parse_uuid(&form.member_id, "Member not found in this workspace.") {
        Ok(id) => id,
        Err(msg) => return Ok(redirect_with(BACK, "error", &msg)),
    };
    match state
        .directory()
        .update_member(
            ctx.workspace_id(),
            ctx.user_id(),
            member_id,
            form.name.as_deref(),
            form.title.as_deref(),
            form.role.as_deref(),
        )
        .await
    {
        Ok(_) => Ok(redirect(BACK)),
        Err(err) => Ok(form_failure(BACK, err)),
    }
}

pub async fn remove(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<RemoveMemberForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };
    let member_id = match validate::parse_uuid(&form.member_id, "Member not found in this workspace.") {
        Ok(id) => id,
        Err(msg) => return Ok(redirect_with(BACK, "error", &msg)),
    };
    let checked = matches!(form.confirm.as_deref(), Some("on" | "true" | "1" | "yes"));
    match state
        .directory()
        .remove_member(ctx.workspace_id(), ctx.user_id(), member_id, &form.confirm_text, checked)
        .await
    {
        Ok(()) => Ok(redirect(BACK)),
        Err(err) => Ok(form_failure(BACK, err)),
    }
}
