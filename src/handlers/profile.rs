use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use super::{Notice, form_failure, lookup_failure, redirect, workspace_context};
use crate::AppState;
use crate::auth::{csrf, session};
use crate::errors::AppError;

const BACK: &str = "/settings/profile";

#[derive(Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub title: String,
    pub csrf_token: String,
}

pub async fn form(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    notice: web::Query<Notice>,
) -> Result<HttpResponse, AppError> {
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };
    let member = state
        .directory()
        .member(ctx.workspace_id(), ctx.user_id())
        .await
        .map_err(lookup_failure)?
        .ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "csrf_token": csrf::get_or_create_token(&session),
        "workspace": ctx.membership.workspace,
        "email": ctx.identity.email,
        "name": member.name,
        "title": member.title,
        "flash": session::take_flash(&session),
        "error": notice.error,
    })))
}

pub async fn submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<ProfileForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };
    match state
        .directory()
        .update_profile(ctx.workspace_id(), ctx.user_id(), &form.name, &form.title)
        .await
    {
        Ok(()) => {
            session::set_flash(&session, "Profile updated.");
            Ok(redirect(BACK))
        }
        Err(err) => Ok(form_failure(BACK, err)),
    }
}
