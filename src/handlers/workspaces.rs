use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use super::{
    Notice, form_failure, lookup_failure, redirect, redirect_with, workspace_context, workspace_cookie,
};
use crate::AppState;
use crate::auth::{csrf, session};
use crate::errors::AppError;
use crate::validate;

const BACK: &str = "/settings/workspaces";

#[derive(Deserialize)]
pub struct WorkspaceForm {
    pub name: String,
    pub description: Option<String>,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct WorkspaceIdForm {
    pub workspace_id: String,
    pub csrf_token: String,
}

fn parse_workspace_id(raw: &str) -> Result<Uuid, String> {
    validate::parse_uuid(raw, "You do not have access to that workspace.")
}

/// Shown until the user belongs to a workspace.
pub async fn onboarding_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    notice: web::Query<Notice>,
) -> Result<HttpResponse, AppError> {
    if workspace_context(&state, &req, &session).await?.is_some() {
        return Ok(redirect("/"));
    }
    let identity = session::get_identity(&session)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "csrf_token": csrf::get_or_create_token(&session),
        "email": identity.email,
        "error": notice.error,
    })))
}

async fn create_and_enter(
    state: &AppState,
    session: &Session,
    form: &WorkspaceForm,
    back: &str,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(session, &form.csrf_token)?;
    let identity = session::get_identity(session)?;
    match state
        .directory()
        .create_workspace(&identity, &form.name, form.description.as_deref())
        .await
    {
        Ok(workspace_id) => Ok(HttpResponse::SeeOther()
            .insert_header(("Location", "/"))
            .cookie(workspace_cookie(workspace_id))
            .finish()),
        Err(err) => Ok(form_failure(back, err)),
    }
}

pub async fn onboarding_submit(
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<WorkspaceForm>,
) -> Result<HttpResponse, AppError> {
    create_and_enter(&state, &session, &form, "/onboarding").await
}

pub async fn create(
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<WorkspaceForm>,
) -> Result<HttpResponse, AppError> {
    create_and_enter(&state, &session, &form, BACK).await
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
    let memberships = state
        .directory()
        .memberships(ctx.user_id())
        .await
        .map_err(lookup_failure)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "csrf_token": csrf::get_or_create_token(&session),
        "active_workspace_id": ctx.workspace_id(),
        "memberships": memberships,
        "error": notice.error,
    })))
}

pub async fn switch(
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<WorkspaceIdForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let identity = session::get_identity(&session)?;
    let workspace_id = match parse_workspace_id(&form.workspace_id) {
        Ok(id) => id,
        Err(msg) => return Ok(redirect_with(BACK, "error", &msg)),
    };
    match state.directory().switch_workspace(identity.user_id, workspace_id).await {
        Ok(membership) => Ok(HttpResponse::SeeOther()
            .insert_header(("Location", "/"))
            .cookie(workspace_cookie(membership.workspace.id))
            .finish()),
        Err(err) => Ok(form_failure(BACK, err)),
    }
}

pub async fn set_default(
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<WorkspaceIdForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let identity = session::get_identity(&session)?;
    let workspace_id = match parse_workspace_id(&form.workspace_id) {
        Ok(id) => id,
        Err(msg) => return Ok(redirect_with(BACK, "error", &msg)),
    };
    match state.directory().set_default_workspace(identity.user_id, workspace_id).await {
        Ok(()) => {
            session::set_flash(&session, "Default workspace updated.");
            Ok(redirect(BACK))
        }
        Err(err) => Ok(form_failure(BACK, err)),
    }
}
