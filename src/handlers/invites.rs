use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use super::{Notice, form_failure, view_failure, workspace_cookie};
use crate::AppState;
use crate::auth::{csrf, session};
use crate::errors::AppError;

#[derive(Deserialize)]
pub struct AcceptForm {
    pub name: Option<String>,
    pub title: Option<String>,
    pub csrf_token: String,
}

pub async fn show(
    state: web::Data<AppState>,
    session: Session,
    path: web::Path<Uuid>,
    notice: web::Query<Notice>,
) -> Result<HttpResponse, AppError> {
    let identity = session::get_identity(&session)?;
    let invite = match state.directory().invite(path.into_inner()).await {
        Ok(invite) => invite,
        Err(err) => return view_failure(err),
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "csrf_token": csrf::get_or_create_token(&session),
        "invite": {
            "workspace_id": invite.workspace_id,
            "email": invite.email,
            "role": invite.role,
            "title": invite.title,
            "pending": invite.is_pending(),
        },
        "email_matches": invite.matches_email(&identity.email),
        "error": notice.error,
    })))
}

pub async fn accept(
    state: web::Data<AppState>,
    session: Session,
    path: web::Path<Uuid>,
    form: web::Form<AcceptForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let identity = session::get_identity(&session)?;
    let token = path.into_inner();
    match state
        .directory()
        .accept_invite(token, &identity, form.name.as_deref(), form.title.as_deref())
        .await
    {
        Ok(workspace_id) => Ok(HttpResponse::SeeOther()
            .insert_header(("Location", "/"))
            .cookie(workspace_cookie(workspace_id))
            .finish()),
        Err(err) => Ok(form_failure(&format!("/invites/{token}"), err)),
    }
}
