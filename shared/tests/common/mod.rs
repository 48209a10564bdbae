//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use userdocs_shared::gateway::GatewaySettings;
use userdocs_shared::memory::MemoryUserRepository;
use userdocs_shared::pagination::PaginationSettings;
use userdocs_shared::service::UserService;
use userdocs_shared::types::{CreateUserRequest, UpdateUserRequest, User};
use userdocs_shared::{AppState, Result, UserError, UserId, UserRepository};

/// Wraps a repository and counts every call that reaches it
pub struct CountingRepository {
    inner: Arc<dyn UserRepository>,
    calls: AtomicUsize,
}

impl CountingRepository {
    pub fn new(inner: Arc<dyn UserRepository>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepository for CountingRepository {
    async fn get(&self, id: &UserId) -> Result<User> {
        self.hit();
        self.inner.get(id).await
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<User>, u64)> {
        self.hit();
        self.inner.list(offset, limit).await
    }

    async fn create(&self, input: CreateUserRequest) -> Result<User> {
        self.hit();
        self.inner.create(input).await
    }

    async fn update(&self, id: &UserId, patch: UpdateUserRequest) -> Result<User> {
        self.hit();
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &UserId) -> Result<()> {
        self.hit();
        self.inner.delete(id).await
    }

    async fn health_check(&self) -> Result<()> {
        self.hit();
        self.inner.health_check().await
    }
}

/// A store that is down: every call fails with a driver-style error
pub struct UnavailableRepository;

#[async_trait]
impl UserRepository for UnavailableRepository {
    async fn get(&self, _id: &UserId) -> Result<User> {
        Err(unavailable())
    }

    async fn list(&self, _offset: u64, _limit: u64) -> Result<(Vec<User>, u64)> {
        Err(unavailable())
    }

    async fn create(&self, _input: CreateUserRequest) -> Result<User> {
        Err(unavailable())
    }

    async fn update(&self, _id: &UserId, _patch: UpdateUserRequest) -> Result<User> {
        Err(unavailable())
    }

    async fn delete(&self, _id: &UserId) -> Result<()> {
        Err(unavailable())
    }

    async fn health_check(&self) -> Result<()> {
        Err(unavailable())
    }
}

fn unavailable() -> UserError {
    UserError::store("dispatch failure: connection refused (os error 111) at 10.0.0.7:8000")
}

/// A store that answers pings slower than any sane deadline
pub struct SlowRepository(pub Duration);

#[async_trait]
impl UserRepository for SlowRepository {
    async fn get(&self, _id: &UserId) -> Result<User> {
        tokio::time::sleep(self.0).await;
        Err(UserError::NotFound)
    }

    async fn list(&self, _offset: u64, _limit: u64) -> Result<(Vec<User>, u64)> {
        tokio::time::sleep(self.0).await;
        Ok((Vec::new(), 0))
    }

    async fn create(&self, _input: CreateUserRequest) -> Result<User> {
        tokio::time::sleep(self.0).await;
        Err(unavailable())
    }

    async fn update(&self, _id: &UserId, _patch: UpdateUserRequest) -> Result<User> {
        tokio::time::sleep(self.0).await;
        Err(UserError::NotFound)
    }

    async fn delete(&self, _id: &UserId) -> Result<()> {
        tokio::time::sleep(self.0).await;
        Err(UserError::NotFound)
    }

    async fn health_check(&self) -> Result<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

pub fn gateway_settings() -> GatewaySettings {
    GatewaySettings {
        request_timeout: Duration::from_secs(15),
        fallback_user_id: UserId::decode(fixtures::FALLBACK_USER_ID).unwrap(),
        strict_routes: false,
    }
}

/// App state over an empty in-memory store wrapped in a call counter
pub fn counted_state() -> (Arc<AppState>, Arc<CountingRepository>) {
    let repo = Arc::new(CountingRepository::new(Arc::new(MemoryUserRepository::new())));
    let state = state_with(repo.clone(), gateway_settings());
    (state, repo)
}

pub fn state_with(repo: Arc<dyn UserRepository>, gateway: GatewaySettings) -> Arc<AppState> {
    AppState::new(UserService::new(repo, PaginationSettings::default()), gateway)
}

pub mod fixtures {
    pub const FALLBACK_USER_ID: &str = "5ce930b307a444000179a4e0";
    pub const UNKNOWN_USER_ID: &str = "65a1f0c2e4b0a1b2c3d4e5f6";

    pub fn new_user() -> serde_json::Value {
        serde_json::json!({
            "first": "A",
            "last": "B",
            "email": "a@b.com",
            "age": 5
        })
    }
}
