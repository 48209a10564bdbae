use crate::error::UserError;
use crate::service::Operation;
use crate::types::{User, UserPage};
use http::StatusCode;
use serde_json::{json, Value};

/// Successful results of an operation
#[derive(Debug)]
pub enum Outcome {
    User(User),
    Page(UserPage),
    Deleted,
    Healthy,
    Pong,
}

/// Transport-neutral response: a status and an optional JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    /// Body encoded for the wire, empty string when there is none
    pub fn body_string(&self) -> String {
        self.body
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_default()
    }
}

/// Map an operation's result onto a status and payload.
///
/// Store failures are logged with the operation and identifier; clients only
/// ever see a generic message.
pub fn respond(operation: &Operation, result: Result<Outcome, UserError>) -> ApiResponse {
    match result {
        Ok(outcome) => success(outcome),
        Err(err) => failure(operation, err),
    }
}

fn success(outcome: Outcome) -> ApiResponse {
    match outcome {
        Outcome::User(user) => ApiResponse::json(StatusCode::OK, json!({ "data": user })),
        Outcome::Page(page) => match serde_json::to_value(&page) {
            Ok(body) => ApiResponse::json(StatusCode::OK, body),
            Err(e) => {
                tracing::error!("Failed to encode user page: {}", e);
                ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        },
        Outcome::Deleted => ApiResponse::empty(StatusCode::NO_CONTENT),
        Outcome::Healthy => ApiResponse::json(StatusCode::OK, json!({ "message": "ok" })),
        Outcome::Pong => ApiResponse::json(StatusCode::OK, json!({ "message": "pong" })),
    }
}

fn failure(operation: &Operation, err: UserError) -> ApiResponse {
    match err {
        UserError::InvalidIdentifier => ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid ID"),
        UserError::Validation(msg) => ApiResponse::error(StatusCode::BAD_REQUEST, &msg),
        UserError::NotFound => ApiResponse::error(StatusCode::NOT_FOUND, "User not found"),
        UserError::Store(detail) => {
            tracing::error!(
                operation = operation.name(),
                id = operation.resource_id().unwrap_or("-"),
                "Store error: {}",
                detail
            );
            ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
