use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};

use decisionlog::AppState;
use decisionlog::auth::rate_limit::RateLimiter;
use decisionlog::config::Config;
use decisionlog::notify::relay::RelayMailer;
use decisionlog::notify::{DisabledNotifier, Notifier};
use decisionlog::store::{MemoryStore, PgStore, Store};
use decisionlog::{db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = Config::from_env().expect("Invalid configuration");

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("Failed to connect to database");
            db::run_migrations(&pool).await.expect("Failed to run migrations");
            Arc::new(PgStore::new(pool))
        }
        None => {
            log::warn!("No DATABASE_URL set, using in-memory store (data lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.mail {
        Some(mail) => Arc::new(RelayMailer::new(mail).expect("Failed to build mail relay client")),
        None => {
            log::warn!("Mail relay not configured, notifications disabled");
            Arc::new(DisabledNotifier)
        }
    };

    // Session key: SESSION_KEY keeps sessions valid across restarts
    let secret_key = match config.session_key.as_deref() {
        Some(val) if val.len() >= 64 => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(val.as_bytes())
        }
        Some(val) => {
            log::warn!("SESSION_KEY too short ({} bytes, need 64+), generating random key", val.len());
            Key::generate()
        }
        None => {
            log::warn!("No SESSION_KEY set, generating random key (sessions lost on restart)");
            Key::generate()
        }
    };

    let state = web::Data::new(AppState::new(store, notifier, config.site_url.clone()));
    let limiter = web::Data::new(RateLimiter::new());
    let cookie_secure = config.cookie_secure;

    log::info!("Starting server at http://{}", config.bind_addr);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
            .cookie_secure(cookie_secure)
            .cookie_http_only(true)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(limiter.clone())
            .configure(handlers::configure)
            // Default 404 handler (must be registered last)
            .default_service(web::to(|| async {
                actix_web::HttpResponse::NotFound().json(serde_json::json!({ "error": "Not Found" }))
            }))
    })
    .bind(config.bind_addr)?
    .run()
    .await
}
