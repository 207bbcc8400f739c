//! Shared test infrastructure.
//!
//! Every test gets a fresh in-memory store (wrapped in [`FaultyStore`] so
//! failures can be injected) and a recording outbox, seeded
//! with one workspace and a cast of members:
//!
//! - `admin`   — admin, created the workspace
//! - `owner`   — member, owns the decisions tests create
//! - `alice`, `bob` — approvers
//! - `auditor` — auditor
//! - `outsider` — registered, but not a member

#![allow(dead_code)]

mod faulty;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use decisionlog::AppState;
use decisionlog::directory::MemberDirectory;
use decisionlog::engine::{ApprovalEngine, DecisionForm};
use decisionlog::models::member::{NewMember, Role};
use decisionlog::models::user::{Identity, User};
use decisionlog::notify::outbox::MemoryOutbox;
use decisionlog::store::Store;

pub use faulty::FaultyStore;

pub const SITE_URL: &str = "http://decisions.test";
pub const TEST_PASSWORD: &str = "password123";

pub struct Fixture {
    pub store: Arc<FaultyStore>,
    pub outbox: Arc<MemoryOutbox>,
    pub state: AppState,
    pub workspace_id: Uuid,
    pub admin: Identity,
    pub owner: Identity,
    pub alice: Identity,
    pub bob: Identity,
    pub auditor: Identity,
    pub outsider: Identity,
}

impl Fixture {
    pub fn engine(&self) -> &ApprovalEngine {
        &self.state.engine
    }

    pub fn directory(&self) -> &MemberDirectory {
        self.state.directory()
    }

    /// A valid create/edit form naming `approvers`.
    pub fn form(&self, title: &str, approvers: &[&Identity]) -> DecisionForm {
        DecisionForm {
            title: title.to_string(),
            summary: "Short summary".to_string(),
            context: "Enough context to pass validation.".to_string(),
            links: None,
            approvers: approvers.iter().map(|i| i.user_id.to_string()).collect(),
        }
    }

    /// Create a decision owned by `owner` and clear the outbox.
    pub async fn decision(&self, approvers: &[&Identity]) -> Uuid {
        let outcome = self
            .engine()
            .create_decision(self.workspace_id, self.owner.user_id, &self.form("Adopt Rust", approvers))
            .await
            .expect("Failed to create decision");
        self.outbox.clear();
        outcome.value
    }
}

/// Register a user directly in the store. The hash is a placeholder; tests
/// that sign in go through `auth::accounts` instead.
pub async fn register(store: &dyn Store, email: &str) -> Identity {
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "unused".to_string(),
        created_at: Utc::now(),
    };
    store.create_user(&user).await.expect("Failed to create user");
    Identity {
        user_id: user.id,
        email: user.email,
    }
}

pub async fn join(store: &dyn Store, workspace_id: Uuid, who: &Identity, role: Role, name: &str) {
    store
        .insert_member(&NewMember {
            workspace_id,
            user_id: who.user_id,
            role,
            name: Some(name.to_string()),
            title: None,
            email: Some(who.email.clone()),
        })
        .await
        .expect("Failed to add member");
}

pub async fn fixture() -> Fixture {
    let store = Arc::new(FaultyStore::new());
    let outbox = Arc::new(MemoryOutbox::new());
    let state = AppState::new(store.clone(), outbox.clone(), SITE_URL);

    let admin = register(store.as_ref(), "admin@example.com").await;
    let workspace_id = state
        .directory()
        .create_workspace(&admin, "Platform", Some("Platform team decisions"))
        .await
        .expect("Failed to create workspace");

    let owner = register(store.as_ref(), "owner@example.com").await;
    let alice = register(store.as_ref(), "alice@example.com").await;
    let bob = register(store.as_ref(), "bob@example.com").await;
    let auditor = register(store.as_ref(), "auditor@example.com").await;
    let outsider = register(store.as_ref(), "outsider@example.com").await;

    join(store.as_ref(), workspace_id, &owner, Role::Member, "Olivia Owner").await;
    join(store.as_ref(), workspace_id, &alice, Role::Approver, "Alice").await;
    join(store.as_ref(), workspace_id, &bob, Role::Approver, "Bob").await;
    join(store.as_ref(), workspace_id, &auditor, Role::Auditor, "Audrey").await;

    Fixture {
        store,
        outbox,
        state,
        workspace_id,
        admin,
        owner,
        alice,
        bob,
        auditor,
        outsider,
    }
}
