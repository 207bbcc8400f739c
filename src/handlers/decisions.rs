use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use super::forms::FormFields;
use super::{Notice, form_failure, lookup_failure, redirect, redirect_after, view_failure, workspace_context};
use crate::AppState;
use crate::audit::EventOrder;
use crate::auth::{csrf, session};
use crate::engine::{DecisionForm, ListFilter};
use crate::errors::AppError;
use crate::models::decision::StatusFilter;
use crate::policy;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub assigned: Option<String>,
    pub page: Option<i64>,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl DashboardQuery {
    fn filter(&self) -> ListFilter {
        ListFilter {
            status: StatusFilter::parse(self.status.as_deref()),
            search: self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()).map(str::to_string),
            assigned_only: matches!(self.assigned.as_deref(), Some("1" | "true" | "on")),
            page: self.page.unwrap_or(1),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub order: Option<String>,
}

fn decision_form(form: &FormFields) -> DecisionForm {
    DecisionForm {
        title: form.text("title").to_string(),
        summary: form.text("summary").to_string(),
        context: form.text("context").to_string(),
        links: form.get("links").map(str::to_string),
        approvers: form.all("approvers"),
    }
}

pub async fn dashboard(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse, AppError> {
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };
    let list = match state
        .engine
        .list_decisions(ctx.workspace_id(), ctx.user_id(), &query.filter())
        .await
    {
        Ok(list) => list,
        Err(err) => return view_failure(err),
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "csrf_token": csrf::get_or_create_token(&session),
        "workspace": ctx.membership.workspace,
        "role": ctx.membership.role,
        "decisions": list,
        "status": query.status,
        "q": query.q,
        "error": query.error,
        "warning": query.warning,
        "flash": session::take_flash(&session),
    })))
}

pub async fn new_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    notice: web::Query<Notice>,
) -> Result<HttpResponse, AppError> {
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };
    if !policy::can_create_decision(Some(ctx.membership.role)) {
        return Ok(super::redirect_with("/", "error", "You do not have permission to create decisions."));
    }
    let members = state.directory().members(ctx.workspace_id()).await.map_err(lookup_failure)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "csrf_token": csrf::get_or_create_token(&session),
        "workspace": ctx.membership.workspace,
        "members": members,
        "error": notice.error,
    })))
}

pub async fn create(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<Vec<(String, String)>>,
) -> Result<HttpResponse, AppError> {
    let form = FormFields::from(form.into_inner());
    csrf::validate_csrf(&session, form.csrf_token())?;
    let Some(ctx) = workspace_context(&state, &req, &session).await? else {
        return Ok(redirect("/onboarding"));
    };

    match state
        .engine
        .create_decision(ctx.workspace_id(), ctx.user_id(), &decision_form(&form))
        .await
    {
        Ok(outcome) => Ok(redirect_after(&format!("/decisions/{}", outcome.value), outcome.warning())),
        Err(err) => Ok(form_failure("/decisions/new", err)),
    }
}

pub async fn detail(
    state: web::Data<AppState>,
    session: Session,
    path: web::Path<Uuid>,
    notice: web::Query<Notice>,
) -> Result<HttpResponse, AppError> {
    let identity = session::get_identity(&session)?;
    let decision_id = path.into_inner();
    match state.engine.decision_detail(decision_id, identity.user_id).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "csrf_token": csrf::get_or_create_token(&session),
            "detail": detail,
            "error": notice.error,
            "warning": notice.warning,
        }))),
        Err(err) => view_failure(err),
    }
}

pub async fn edit_page(
    state: web::Data<AppState>,
    session: Session,
    path: web::Path<Uuid>,
    notice: web::Query<Notice>,
) -> Result<HttpResponse, AppError> {
    let identity = session::get_identity(&session)?;
    let decision_id = path.into_inner();
    let detail = match state.engine.decision_detail(decision_id, identity.user_id).await {
        Ok(detail) => detail,
        Err(err) => return view_failure(err),
    };
    if !detail.permissions.can_edit {
        return Ok(super::redirect_with(
            &format!("/decisions/{decision_id}"),
            "error",
            "Only the owner or an admin can edit pending decisions.",
        ));
    }
    let members = state
        .directory()
        .members(detail.decision.workspace_id)
        .await
        .map_err(lookup_failure)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "csrf_token": csrf::get_or_create_token(&session),
        "decision": detail.decision,
        "approvers": detail.approvers,
        "links_text": detail.links_text,
        "members": members,
        "error": notice.error,
    })))
}

pub async fn edit(
    state: web::Data<AppState>,
    session: Session,
    path: web::Path<Uuid>,
    form: web::Form<Vec<(String, String)>>,
) -> Result<HttpResponse, AppError> {
    let form = FormFields::from(form.into_inner());
    csrf::validate_csrf(&session, form.csrf_token())?;
    let identity = session::get_identity(&session)?;
    let decision_id = path.into_inner();

    match state
        .engine
        .edit_decision(decision_id, identity.user_id, &decision_form(&form))
        .await
    {
        Ok(outcome) => Ok(redirect_after(&format!("/decisions/{decision_id}"), outcome.warning())),
        Err(err) => Ok(form_failure(&format!("/decisions/{decision_id}/edit"), err)),
    }
}

pub async fn vote(
    state: web::Data<AppState>,
    session: Session,
    path: web::Path<Uuid>,
    form: web::Form<Vec<(String, String)>>,
) -> Result<HttpResponse, AppError> {
    let form = FormFields::from(form.into_inner());
    csrf::validate_csrf(&session, form.csrf_token())?;
    let identity = session::get_identity(&session)?;
    let decision_id = path.into_inner();
    let back = format!("/decisions/{decision_id}");

    match state.engine.cast_vote(decision_id, identity.user_id, form.text("action")).await {
        Ok(outcome) => Ok(redirect_after(&back, outcome.warning())),
        Err(err) => Ok(form_failure(&back, err)),
    }
}

pub async fn comment(
    state: web::Data<AppState>,
    session: Session,
    path: web::Path<Uuid>,
    form: web::Form<Vec<(String, String)>>,
) -> Result<HttpResponse, AppError> {
    let form = FormFields::from(form.into_inner());
    csrf::validate_csrf(&session, form.csrf_token())?;
    let identity = session::get_identity(&session)?;
    let decision_id = path.into_inner();
    let back = format!("/decisions/{decision_id}");

    match state.engine.add_comment(decision_id, identity.user_id, form.text("body")).await {
        Ok(outcome) => Ok(redirect_after(&back, outcome.warning())),
        Err(err) => Ok(form_failure(&back, err)),
    }
}

pub async fn events(
    state: web::Data<AppState>,
    session: Session,
    path: web::Path<Uuid>,
    query: web::Query<EventsQuery>,
) -> Result<HttpResponse, AppError> {
    let identity = session::get_identity(&session)?;
    let order = EventOrder::parse(query.order.as_deref());
    match state.engine.events(path.into_inner(), identity.user_id, order).await {
        Ok(events) => Ok(HttpResponse::Ok().json(serde_json::json!({ "events": events }))),
        Err(err) => view_failure(err),
    }
}
