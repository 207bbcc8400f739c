use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use super::{Notice, form_failure, redirect, redirect_with};
use crate::AppState;
use crate::auth::{accounts, csrf, password, rate_limit::RateLimiter, session};
use crate::errors::AppError;

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

fn credentials_page(session: &Session, notice: Notice) -> Result<HttpResponse, AppError> {
    if session::get_user_id(session).is_some() {
        return Ok(redirect("/"));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "csrf_token": csrf::get_or_create_token(session),
        "error": notice.error,
        "flash": session::take_flash(session),
    })))
}

pub async fn sign_in_page(session: Session, notice: web::Query<Notice>) -> Result<HttpResponse, AppError> {
    credentials_page(&session, notice.into_inner())
}

pub async fn sign_up_page(session: Session, notice: web::Query<Notice>) -> Result<HttpResponse, AppError> {
    credentials_page(&session, notice.into_inner())
}

pub async fn sign_in_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<CredentialsForm>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    // Rate-limit check BEFORE any store access
    let ip = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
    if limiter.is_blocked(ip) {
        log::warn!("Sign-in blocked for {ip}: too many failures");
        return Ok(redirect_with(
            "/sign-in",
            "error",
            "Too many failed sign-in attempts. Please try again later.",
        ));
    }

    match accounts::authenticate(state.store.as_ref(), &form.email, &form.password).await {
        Ok(identity) => {
            limiter.clear(ip);
            session::sign_in(&session, &identity)?;
            log::info!("User {} signed in", identity.user_id);
            Ok(redirect("/"))
        }
        Err(err) => {
            limiter.record_failure(ip);
            Ok(form_failure("/sign-in", err))
        }
    }
}

pub async fn sign_up_submit(
    state: web::Data<AppState>,
    session: Session,
    form: web::Form<CredentialsForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    if let Err(err) = accounts::validate_sign_up(&form.email, &form.password) {
        return Ok(form_failure("/sign-up", err));
    }
    let hash = password::hash_password(&form.password).map_err(AppError::Hash)?;

    match accounts::create_account(state.store.as_ref(), &form.email, hash).await {
        Ok(identity) => {
            session::sign_in(&session, &identity)?;
            Ok(redirect("/onboarding"))
        }
        Err(err) => Ok(form_failure("/sign-up", err)),
    }
}

pub async fn sign_out(session: Session, form: web::Form<CsrfOnly>) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    session.purge();
    Ok(redirect("/sign-in"))
}
