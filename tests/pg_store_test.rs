//! Postgres store tests. Skipped unless `TEST_DATABASE_URL` is set.
//!
//! Each test migrates a private schema so runs never see each other's rows.

mod common;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use decisionlog::AppState;
use decisionlog::audit::EventOrder;
use decisionlog::db;
use decisionlog::engine::ListFilter;
use decisionlog::errors::CoreError;
use decisionlog::models::decision::DecisionStatus;
use decisionlog::models::member::Role;
use decisionlog::notify::outbox::MemoryOutbox;
use decisionlog::store::{PgStore, Store};
use common::*;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let schema = format!("test_{}", Uuid::new_v4().simple());

    let admin = PgPool::connect(&url).await.expect("Failed to connect to TEST_DATABASE_URL");
    admin
        .execute(format!("CREATE SCHEMA {schema}").as_str())
        .await
        .expect("Failed to create test schema");

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .after_connect(move |conn, _meta| {
            let schema = schema.clone();
            Box::pin(async move {
                conn.execute(format!("SET search_path TO {schema}").as_str()).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .expect("Failed to connect test pool");
    db::run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

struct PgFixture {
    pool: PgPool,
    state: AppState,
    workspace_id: Uuid,
    owner: decisionlog::models::user::Identity,
    alice: decisionlog::models::user::Identity,
    bob: decisionlog::models::user::Identity,
}

async fn pg_fixture() -> Option<PgFixture> {
    let pool = test_pool().await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let state = AppState::new(store.clone(), Arc::new(MemoryOutbox::new()), SITE_URL);

    let owner = register(store.as_ref(), "owner@example.com").await;
    let alice = register(store.as_ref(), "alice@example.com").await;
    let bob = register(store.as_ref(), "bob@example.com").await;
    let workspace_id = state
        .directory()
        .create_workspace(&owner, "Platform", None)
        .await
        .expect("Failed to create workspace");
    join(store.as_ref(), workspace_id, &alice, Role::Approver, "Alice").await;
    join(store.as_ref(), workspace_id, &bob, Role::Approver, "Bob").await;

    Some(PgFixture {
        pool,
        state,
        workspace_id,
        owner,
        alice,
        bob,
    })
}

impl PgFixture {
    async fn decision(&self) -> Uuid {
        let form = decisionlog::engine::DecisionForm {
            title: "Adopt Rust".into(),
            summary: "Move services".into(),
            context: "The current stack is hard to operate.".into(),
            links: Some("RFC | https://example.com/rfc".into()),
            approvers: vec![self.alice.user_id.to_string(), self.bob.user_id.to_string()],
        };
        self.state
            .engine
            .create_decision(self.workspace_id, self.owner.user_id, &form)
            .await
            .expect("Failed to create decision")
            .value
    }
}

#[tokio::test]
async fn test_pg_vote_flow_and_listing() {
    let Some(f) = pg_fixture().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let id = f.decision().await;

    f.state.engine.cast_vote(id, f.alice.user_id, "approve").await.unwrap();
    let outcome = f.state.engine.cast_vote(id, f.bob.user_id, "approve").await.unwrap();
    assert_eq!(outcome.value.status, DecisionStatus::Approved);

    let events = f.state.engine.events(id, f.owner.user_id, EventOrder::Oldest).await.unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.kind.type_name()).collect();
    assert_eq!(kinds, vec!["created", "approved", "approved"]);

    let filter = ListFilter {
        search: Some("example.com/rfc".into()),
        ..ListFilter::default()
    };
    let list = f
        .state
        .engine
        .list_decisions(f.workspace_id, f.owner.user_id, &filter)
        .await
        .unwrap();
    assert_eq!(list.total_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_racing_votes_record_one() {
    let Some(f) = pg_fixture().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let id = f.decision().await;

    let (a, b) = tokio::join!(
        f.state.engine.cast_vote(id, f.alice.user_id, "approve"),
        f.state.engine.cast_vote(id, f.alice.user_id, "reject"),
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(CoreError::Conflict(_))));

    let events = f.state.engine.events(id, f.owner.user_id, EventOrder::Oldest).await.unwrap();
    assert_eq!(events.iter().filter(|e| e.kind.is_vote()).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_no_vote_lands_after_rejection() {
    let Some(f) = pg_fixture().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let carol = register(f.state.store.as_ref(), "carol@example.com").await;
    join(f.state.store.as_ref(), f.workspace_id, &carol, Role::Approver, "Carol").await;
    let form = decisionlog::engine::DecisionForm {
        title: "Adopt Rust".into(),
        summary: "Move services".into(),
        context: "The current stack is hard to operate.".into(),
        links: None,
        approvers: [&f.alice, &f.bob, &carol].iter().map(|i| i.user_id.to_string()).collect(),
    };
    let id = f
        .state
        .engine
        .create_decision(f.workspace_id, f.owner.user_id, &form)
        .await
        .unwrap()
        .value;

    let (reject, approve, late) = tokio::join!(
        f.state.engine.cast_vote(id, f.alice.user_id, "reject"),
        f.state.engine.cast_vote(id, f.bob.user_id, "approve"),
        f.state.engine.cast_vote(id, carol.user_id, "approve"),
    );
    assert_eq!(reject.unwrap().value.status, DecisionStatus::Rejected);
    for other in [approve, late] {
        if let Err(err) = other {
            assert!(matches!(err, CoreError::Conflict(_)), "{err:?}");
        }
    }

    let decision = f.state.store.find_decision(id).await.unwrap().unwrap();
    assert_eq!(decision.status, DecisionStatus::Rejected);
    // commit order, which timestamps taken before the row lock need not follow
    let mut events = f.state.engine.events(id, f.owner.user_id, EventOrder::Oldest).await.unwrap();
    events.sort_by_key(|e| e.seq);
    let closed_at = events.iter().position(|e| e.kind.type_name() == "rejected").unwrap();
    assert!(events[closed_at + 1..].iter().all(|e| !e.kind.is_vote()));
}

#[tokio::test]
async fn test_pg_events_are_append_only() {
    let Some(f) = pg_fixture().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let id = f.decision().await;

    let update = sqlx::query("UPDATE decision_events SET actor_user_id = NULL WHERE decision_id = $1")
        .bind(id)
        .execute(&f.pool)
        .await;
    assert!(update.is_err());
    let delete = sqlx::query("DELETE FROM decision_events WHERE decision_id = $1")
        .bind(id)
        .execute(&f.pool)
        .await;
    assert!(delete.is_err());
}
