//! In-memory user store for local development and tests

use crate::error::{Result, UserError};
use crate::ids::UserId;
use crate::types::{self, CreateUserRequest, UpdateUserRequest, User};
use crate::users::UserRepository;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Users keyed by id; ObjectIds sort by creation time, so iteration order
/// approximates insertion order
#[derive(Default, Clone)]
pub struct MemoryUserRepository {
    users: Arc<RwLock<BTreeMap<UserId, User>>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn get(&self, id: &UserId) -> Result<User> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(UserError::NotFound)
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<User>, u64)> {
        let users = self.users.read().await;
        let total = users.len() as u64;
        let page = users
            .values()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn create(&self, input: CreateUserRequest) -> Result<User> {
        let user = input.into_user(UserId::generate(), types::now())?;
        self.users.write().await.insert(user.id, user.clone());
        tracing::debug!("User created in memory: {}", user.id);
        Ok(user)
    }

    async fn update(&self, id: &UserId, patch: UpdateUserRequest) -> Result<User> {
        patch.validate()?;
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or(UserError::NotFound)?;
        patch.apply(user, types::now());
        Ok(user.clone())
    }

    async fn delete(&self, id: &UserId) -> Result<()> {
        self.users
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or(UserError::NotFound)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
