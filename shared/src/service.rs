use crate::error::{Result, UserError};
use crate::ids::UserId;
use crate::pagination::PaginationSettings;
use crate::responses::{respond, ApiResponse, Outcome};
use crate::types::UserPage;
use crate::users::UserRepository;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A decoded request, independent of the transport it arrived on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    GetUser { id: String },
    ListUsers { page: Option<String>, limit: Option<String> },
    CreateUser { body: Vec<u8> },
    UpdateUser { id: String, body: Vec<u8> },
    DeleteUser { id: String },
    Health,
    Ping,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetUser { .. } => "get_user",
            Operation::ListUsers { .. } => "list_users",
            Operation::CreateUser { .. } => "create_user",
            Operation::UpdateUser { .. } => "update_user",
            Operation::DeleteUser { .. } => "delete_user",
            Operation::Health => "health",
            Operation::Ping => "ping",
        }
    }

    /// Raw identifier the request targets, if any
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            Operation::GetUser { id }
            | Operation::UpdateUser { id, .. }
            | Operation::DeleteUser { id } => Some(id),
            _ => None,
        }
    }
}

/// The operation set both transport bindings dispatch into
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    pagination: PaginationSettings,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, pagination: PaginationSettings) -> Self {
        Self { users, pagination }
    }

    pub async fn handle(&self, operation: Operation) -> ApiResponse {
        let result = self.execute(&operation).await;
        respond(&operation, result)
    }

    async fn execute(&self, operation: &Operation) -> Result<Outcome> {
        match operation {
            Operation::GetUser { id } => {
                let id = UserId::decode(id)?;
                Ok(Outcome::User(self.users.get(&id).await?))
            }
            Operation::ListUsers { page, limit } => {
                let window = self.pagination.paginate(page.as_deref(), limit.as_deref());
                let (data, total_count) = self.users.list(window.offset, window.limit).await?;
                Ok(Outcome::Page(UserPage {
                    data,
                    page: window.page,
                    limit: window.limit,
                    total_count,
                }))
            }
            Operation::CreateUser { body } => {
                let input = parse_body(body)?;
                Ok(Outcome::User(self.users.create(input).await?))
            }
            Operation::UpdateUser { id, body } => {
                let id = UserId::decode(id)?;
                let patch = parse_body(body)?;
                Ok(Outcome::User(self.users.update(&id, patch).await?))
            }
            Operation::DeleteUser { id } => {
                let id = UserId::decode(id)?;
                self.users.delete(&id).await?;
                Ok(Outcome::Deleted)
            }
            Operation::Health => {
                self.users.health_check().await?;
                Ok(Outcome::Healthy)
            }
            Operation::Ping => Ok(Outcome::Pong),
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(UserError::Validation("request body is required".to_string()));
    }
    serde_json::from_slice(body)
        .map_err(|e| UserError::Validation(format!("invalid request body: {}", e)))
}
