use crate::error::Result;
use crate::ids::UserId;
use crate::types::{CreateUserRequest, UpdateUserRequest, User};
use async_trait::async_trait;

/// Access to the user collection.
///
/// Every call is one round-trip to the backing store; nothing is cached and
/// failures are not retried here.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch one user, `UserError::NotFound` if no document matches
    async fn get(&self, id: &UserId) -> Result<User>;

    /// Skip `offset` users in store order and return the next `limit`, along
    /// with the size of the whole collection
    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<User>, u64)>;

    /// Validate and insert a new user with a fresh id and timestamps
    async fn create(&self, input: CreateUserRequest) -> Result<User>;

    /// Merge the provided fields, refresh `updated_at` and return the result
    async fn update(&self, id: &UserId, patch: UpdateUserRequest) -> Result<User>;

    /// Remove the document; `UserError::NotFound` when nothing matched
    async fn delete(&self, id: &UserId) -> Result<()>;

    /// Lightweight liveness probe against the store
    async fn health_check(&self) -> Result<()>;
}
