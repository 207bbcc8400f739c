//! HTTP surface.
//!
//! Form POSTs answer with a 303 to the page they came from. Expected outcomes
//! of the core, store failures included, travel as `?error=`; committed
//! changes whose emails failed travel as `?warning=`. Only session, CSRF and
//! hashing failures become an `AppError` on a form POST. GET pages are JSON
//! views.

pub mod auth;
pub mod decisions;
pub mod forms;
pub mod invites;
pub mod members;
pub mod profile;
pub mod workspaces;

use actix_session::Session;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{HttpRequest, HttpResponse, middleware::from_fn, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::require_auth;
use crate::auth::session;
use crate::errors::{AppError, CoreError};
use crate::models::user::Identity;
use crate::models::workspace::Membership;

pub const WORKSPACE_COOKIE: &str = "workspace_id";

/// `?error=` / `?warning=` echoed by every JSON view.
#[derive(Debug, Default, Deserialize)]
pub struct Notice {
    pub error: Option<String>,
    pub warning: Option<String>,
}

pub(crate) fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .finish()
}

/// Redirect to `path` carrying one urlencoded message.
pub(crate) fn redirect_with(path: &str, key: &str, message: &str) -> HttpResponse {
    let query = serde_urlencoded::to_string([(key, message)]).unwrap_or_default();
    let sep = if path.contains('?') { '&' } else { '?' };
    redirect(&format!("{path}{sep}{query}"))
}

/// Redirect to `path`, with `?warning=` when some emails were not delivered.
pub(crate) fn redirect_after(path: &str, warning: Option<String>) -> HttpResponse {
    match warning {
        Some(w) => redirect_with(path, "warning", &w),
        None => redirect(path),
    }
}

/// Every core failure goes back to `path` as `?error=`. Store failures carry
/// their message verbatim; `From<StoreError>` already logged them.
pub(crate) fn form_failure(path: &str, err: CoreError) -> HttpResponse {
    redirect_with(path, "error", &err.user_message())
}

/// Status-coded JSON error for GET views.
pub(crate) fn view_failure(err: CoreError) -> Result<HttpResponse, AppError> {
    let body = serde_json::json!({ "error": err.user_message() });
    match err {
        CoreError::Store(e) => Err(AppError::Store(e)),
        CoreError::NotFound(_) => Ok(HttpResponse::NotFound().json(body)),
        CoreError::Authorization(_) => Ok(HttpResponse::Forbidden().json(body)),
        CoreError::Validation(_) => Ok(HttpResponse::BadRequest().json(body)),
        CoreError::Conflict(_) => Ok(HttpResponse::Conflict().json(body)),
    }
}

/// For reads that only fail in the store.
pub(crate) fn lookup_failure(err: CoreError) -> AppError {
    match err {
        CoreError::Store(e) => AppError::Store(e),
        _ => AppError::NotFound,
    }
}

pub(crate) fn workspace_cookie(workspace_id: Uuid) -> Cookie<'static> {
    Cookie::build(WORKSPACE_COOKIE, workspace_id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

fn preferred_workspace(req: &HttpRequest) -> Option<Uuid> {
    req.cookie(WORKSPACE_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

/// The signed-in user and their active workspace membership.
pub(crate) struct WorkspaceContext {
    pub identity: Identity,
    pub membership: Membership,
}

impl WorkspaceContext {
    pub fn workspace_id(&self) -> Uuid {
        self.membership.workspace.id
    }

    pub fn user_id(&self) -> Uuid {
        self.identity.user_id
    }
}

/// `None` when the user has no workspace yet and belongs on `/onboarding`.
pub(crate) async fn workspace_context(
    state: &AppState,
    req: &HttpRequest,
    session: &Session,
) -> Result<Option<WorkspaceContext>, AppError> {
    let identity = session::get_identity(session)?;
    let membership = state
        .directory()
        .active_workspace(identity.user_id, preferred_workspace(req))
        .await
        .map_err(lookup_failure)?;
    Ok(membership.map(|membership| WorkspaceContext { identity, membership }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/sign-in", web::get().to(auth::sign_in_page))
        .route("/sign-in", web::post().to(auth::sign_in_submit))
        .route("/sign-up", web::get().to(auth::sign_up_page))
        .route("/sign-up", web::post().to(auth::sign_up_submit))
        .service(
            web::scope("")
                .wrap(from_fn(require_auth))
                .route("/", web::get().to(decisions::dashboard))
                .route("/sign-out", web::post().to(auth::sign_out))
                .route("/onboarding", web::get().to(workspaces::onboarding_page))
                .route("/onboarding", web::post().to(workspaces::onboarding_submit))
                // /decisions/new BEFORE /decisions/{id}
                .route("/decisions/new", web::get().to(decisions::new_page))
                .route("/decisions", web::post().to(decisions::create))
                .route("/decisions/{id}", web::get().to(decisions::detail))
                .route("/decisions/{id}/edit", web::get().to(decisions::edit_page))
                .route("/decisions/{id}/edit", web::post().to(decisions::edit))
                .route("/decisions/{id}/vote", web::post().to(decisions::vote))
                .route("/decisions/{id}/comments", web::post().to(decisions::comment))
                .route("/decisions/{id}/events", web::get().to(decisions::events))
                .route("/settings/members", web::get().to(members::list))
                .route("/settings/members/add", web::post().to(members::add))
                .route("/settings/members/invite", web::post().to(members::invite))
                .route("/settings/members/update", web::post().to(members::update))
                .route("/settings/members/remove", web::post().to(members::remove))
                .route("/settings/workspaces", web::get().to(workspaces::list))
                .route("/settings/workspaces/switch", web::post().to(workspaces::switch))
                .route("/settings/workspaces/create", web::post().to(workspaces::create))
                .route("/settings/workspaces/default", web::post().to(workspaces::set_default))
                .route("/settings/profile", web::get().to(profile::form))
                .route("/settings/profile", web::post().to(profile::submit))
                .route("/invites/{token}", web::get().to(invites::show))
                .route("/invites/{token}/accept", web::post().to(invites::accept)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(resp: &HttpResponse) -> String {
        resp.headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn messages_are_urlencoded() {
        let resp = redirect_with("/decisions/1", "error", "Only pending decisions can be edited.");
        assert_eq!(
            location(&resp),
            "/decisions/1?error=Only+pending+decisions+can+be+edited."
        );
        let resp = redirect_with("/?status=pending", "warning", "a&b");
        assert_eq!(location(&resp), "/?status=pending&warning=a%26b");
    }

    #[test]
    fn store_failures_redirect_with_their_message() {
        let err = CoreError::Store(crate::store::StoreError::Corrupt("x".into()));
        assert_eq!(location(&form_failure("/", err)), "/?error=Corrupt+record%3A+x");
        let resp = form_failure("/", CoreError::conflict("nope"));
        assert_eq!(location(&resp), "/?error=nope");
    }
}
