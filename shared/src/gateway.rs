//! API Gateway proxy binding: one event in, one response out per invocation.

use crate::ids::UserId;
use crate::responses::ApiResponse;
use crate::service::Operation;
use crate::AppState;
use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use aws_lambda_events::encodings::Body;
use base64::Engine;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use lambda_runtime::{Error, LambdaEvent};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Deadline for the whole decode, dispatch and encode sequence
    pub request_timeout: Duration,
    /// User served when no route matches, unless `strict_routes` is set
    pub fallback_user_id: UserId,
    pub strict_routes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    User,
    Health,
    Ping,
}

/// Lambda entry point
pub async fn function_handler(
    event: LambdaEvent<ApiGatewayProxyRequest>,
    state: Arc<AppState>,
) -> Result<ApiGatewayProxyResponse, Error> {
    Ok(handle_event(event.payload, &state).await)
}

pub async fn handle_event(event: ApiGatewayProxyRequest, state: &AppState) -> ApiGatewayProxyResponse {
    let path = event.path.clone().unwrap_or_default();
    tracing::info!(
        "Gateway invoked - Method: {} Path: {}",
        event.http_method,
        path
    );

    let deadline = state.gateway.request_timeout;
    match tokio::time::timeout(deadline, dispatch(event, state)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(
                "Request to {} exceeded deadline of {}ms",
                path,
                deadline.as_millis()
            );
            encode(ApiResponse::error(
                StatusCode::GATEWAY_TIMEOUT,
                "Request timed out",
            ))
        }
    }
}

async fn dispatch(event: ApiGatewayProxyRequest, state: &AppState) -> ApiGatewayProxyResponse {
    if event.http_method == Method::OPTIONS {
        return preflight();
    }

    let response = match decode(event, &state.gateway) {
        Ok(operation) => state.service.handle(operation).await,
        Err(response) => response,
    };
    encode(response)
}

/// Exact match on the request path; the `/user/{id}` resource template is
/// accepted for proxy integrations where the path carries the id
fn route(event: &ApiGatewayProxyRequest) -> Option<Route> {
    [event.path.as_deref(), event.resource.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|candidate| match candidate {
            "/user" | "/user/{id}" => Some(Route::User),
            "/health" => Some(Route::Health),
            "/ping" => Some(Route::Ping),
            _ => None,
        })
}

fn decode(event: ApiGatewayProxyRequest, settings: &GatewaySettings) -> Result<Operation, ApiResponse> {
    let Some(route) = route(&event) else {
        if settings.strict_routes {
            return Err(ApiResponse::error(StatusCode::NOT_FOUND, "Not found"));
        }
        tracing::warn!(
            "No route for {:?}, serving fallback user {}",
            event.path,
            settings.fallback_user_id
        );
        return Ok(Operation::GetUser {
            id: settings.fallback_user_id.encode(),
        });
    };

    let method = event.http_method.clone();
    let id = event.path_parameters.get("id").cloned();

    match (route, method) {
        (Route::Ping, Method::GET) => Ok(Operation::Ping),
        (Route::Health, Method::GET) => Ok(Operation::Health),
        (Route::User, Method::GET) => Ok(match id {
            Some(id) => Operation::GetUser { id },
            None => Operation::ListUsers {
                page: event.query_string_parameters.first("page").map(str::to_string),
                limit: event.query_string_parameters.first("limit").map(str::to_string),
            },
        }),
        (Route::User, Method::POST) => Ok(Operation::CreateUser {
            body: body_bytes(&event)?,
        }),
        (Route::User, Method::PUT) => Ok(Operation::UpdateUser {
            id: id.unwrap_or_default(),
            body: body_bytes(&event)?,
        }),
        (Route::User, Method::DELETE) => Ok(Operation::DeleteUser {
            id: id.unwrap_or_default(),
        }),
        _ => Err(ApiResponse::error(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        )),
    }
}

fn body_bytes(event: &ApiGatewayProxyRequest) -> Result<Vec<u8>, ApiResponse> {
    let Some(body) = event.body.as_deref() else {
        return Ok(Vec::new());
    };
    if event.is_base64_encoded {
        base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|_| ApiResponse::error(StatusCode::BAD_REQUEST, "invalid request body encoding"))
    } else {
        Ok(body.as_bytes().to_vec())
    }
}

fn encode(response: ApiResponse) -> ApiGatewayProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    let body = response.body.as_ref().map(|json| {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Body::Text(json.to_string())
    });

    ApiGatewayProxyResponse {
        status_code: i64::from(response.status.as_u16()),
        headers,
        body,
        ..Default::default()
    }
}

fn preflight() -> ApiGatewayProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,PUT,DELETE,OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type,Authorization"),
    );

    ApiGatewayProxyResponse {
        status_code: i64::from(StatusCode::OK.as_u16()),
        headers,
        ..Default::default()
    }
}
