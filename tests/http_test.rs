//! HTTP surface tests — auth redirects, CSRF, and one full form round trip.

mod common;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{App, test, web};

use decisionlog::auth::rate_limit::RateLimiter;
use decisionlog::handlers;
use common::*;

/// Cookies carried between requests, newest value wins.
#[derive(Default)]
struct Jar(Vec<Cookie<'static>>);

impl Jar {
    fn absorb<B>(&mut self, resp: &ServiceResponse<B>) {
        for cookie in resp.response().cookies() {
            let cookie = cookie.into_owned();
            self.0.retain(|c| c.name() != cookie.name());
            self.0.push(cookie);
        }
    }

    fn apply(&self, mut req: test::TestRequest) -> test::TestRequest {
        for cookie in &self.0 {
            req = req.cookie(cookie.clone());
        }
        req
    }
}

fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get("Location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(web::Data::new($state))
                .app_data(web::Data::new(RateLimiter::new()))
                .configure(handlers::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn test_protected_routes_redirect_to_sign_in() {
    let f = fixture().await;
    let app = app!(f.state.clone());

    for uri in ["/", "/decisions/new", "/settings/members"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&resp), "/sign-in");
    }
}

#[actix_web::test]
async fn test_forms_require_csrf_token() {
    let f = fixture().await;
    let app = app!(f.state.clone());

    let req = test::TestRequest::post()
        .uri("/sign-in")
        .set_form([("email", "admin@example.com"), ("password", TEST_PASSWORD), ("csrf_token", "forged")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_sign_up_onboard_and_create_decision() {
    let f = fixture().await;
    let app = app!(f.state.clone());
    let mut jar = Jar::default();

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sign-up").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    jar.absorb(&resp);
    let page: serde_json::Value = test::read_body_json(resp).await;
    let csrf = page["csrf_token"].as_str().unwrap().to_string();

    let req = jar
        .apply(test::TestRequest::post().uri("/sign-up"))
        .set_form([("email", "new@example.com"), ("password", TEST_PASSWORD), ("csrf_token", csrf.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/onboarding");
    jar.absorb(&resp);

    // no workspace yet: the dashboard sends us to onboarding
    let resp = test::call_service(&app, jar.apply(test::TestRequest::get().uri("/")).to_request()).await;
    assert_eq!(location(&resp), "/onboarding");

    let req = jar
        .apply(test::TestRequest::post().uri("/onboarding"))
        .set_form([("name", "Research"), ("csrf_token", csrf.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/");
    jar.absorb(&resp);

    let req = jar
        .apply(test::TestRequest::post().uri("/decisions"))
        .set_form([
            ("title", "Buy a GPU"),
            ("summary", "For training"),
            ("context", "Models take days on CPUs."),
            ("links", "Quote | https://example.com/quote"),
            ("csrf_token", csrf.as_str()),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let detail_uri = location(&resp);
    assert!(detail_uri.starts_with("/decisions/"), "{detail_uri}");

    let resp = test::call_service(&app, jar.apply(test::TestRequest::get().uri(&detail_uri)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let detail: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(detail["detail"]["decision"]["status"], "pending");
    assert_eq!(detail["detail"]["links_text"], "Quote | https://example.com/quote");
    assert_eq!(detail["detail"]["permissions"]["can_edit"], true);

    // the creator is not an approver, so voting bounces back with the message
    let req = jar
        .apply(test::TestRequest::post().uri(&format!("{detail_uri}/vote")))
        .set_form([("action", "approve"), ("csrf_token", csrf.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        location(&resp),
        format!("{detail_uri}?error=You+are+not+assigned+to+this+decision.")
    );
}

#[actix_web::test]
async fn test_validation_errors_redirect_with_message() {
    let f = fixture().await;
    let app = app!(f.state.clone());
    let mut jar = Jar::default();

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sign-up").to_request()).await;
    jar.absorb(&resp);
    let page: serde_json::Value = test::read_body_json(resp).await;
    let csrf = page["csrf_token"].as_str().unwrap().to_string();

    let req = jar
        .apply(test::TestRequest::post().uri("/sign-up"))
        .set_form([("email", "not-an-email"), ("password", TEST_PASSWORD), ("csrf_token", csrf.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/sign-up?error=Enter+a+valid+email+address.");

    let req = jar
        .apply(test::TestRequest::post().uri("/sign-in"))
        .set_form([("email", "admin@example.com"), ("password", "wrong"), ("csrf_token", csrf.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/sign-in?error=Invalid+email+or+password.");
}

#[actix_web::test]
async fn test_store_failure_redirects_with_its_message() {
    let f = fixture().await;
    let app = app!(f.state.clone());
    let mut jar = Jar::default();

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sign-up").to_request()).await;
    jar.absorb(&resp);
    let page: serde_json::Value = test::read_body_json(resp).await;
    let csrf = page["csrf_token"].as_str().unwrap().to_string();

    let req = jar
        .apply(test::TestRequest::post().uri("/sign-up"))
        .set_form([("email", "dana@example.com"), ("password", TEST_PASSWORD), ("csrf_token", csrf.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    jar.absorb(&resp);
    let req = jar
        .apply(test::TestRequest::post().uri("/onboarding"))
        .set_form([("name", "Research"), ("csrf_token", csrf.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/");
    jar.absorb(&resp);

    f.store.fail_event_writes(true);
    let req = jar
        .apply(test::TestRequest::post().uri("/decisions"))
        .set_form([
            ("title", "Buy a GPU"),
            ("summary", "For training"),
            ("context", "Models take days on CPUs."),
            ("csrf_token", csrf.as_str()),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&resp),
        "/decisions/new?error=Corrupt+record%3A+decision_events+insert+rejected"
    );
}

#[actix_web::test]
async fn test_huge_page_number_is_not_an_error() {
    let f = fixture().await;
    let app = app!(f.state.clone());
    let mut jar = Jar::default();

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sign-up").to_request()).await;
    jar.absorb(&resp);
    let page: serde_json::Value = test::read_body_json(resp).await;
    let csrf = page["csrf_token"].as_str().unwrap().to_string();

    for (uri, form) in [
        ("/sign-up", vec![("email", "erin@example.com"), ("password", TEST_PASSWORD)]),
        ("/onboarding", vec![("name", "Research")]),
    ] {
        let mut form = form;
        form.push(("csrf_token", csrf.as_str()));
        let resp = test::call_service(&app, jar.apply(test::TestRequest::post().uri(uri)).set_form(form).to_request()).await;
        jar.absorb(&resp);
    }

    let uri = format!("/?page={}", i64::MAX);
    let resp = test::call_service(&app, jar.apply(test::TestRequest::get().uri(&uri)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
