//! Long-running HTTP binding
use crate::responses::ApiResponse;
use crate::service::Operation;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use url::form_urlencoded;

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/user",
            get(list_users).post(create_user).fallback(method_not_allowed),
        )
        .route(
            "/user/:id",
            get(get_user)
                .put(update_user)
                .delete(delete_user)
                .fallback(method_not_allowed),
        )
        .route("/health", get(health).fallback(method_not_allowed))
        .route("/ping", get(ping).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM
pub async fn serve(state: Arc<AppState>, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("app is listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// GET /user/:id
async fn get_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResponse {
    state.service.handle(Operation::GetUser { id }).await
}

/// GET /user?page=&limit=
async fn list_users(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> ApiResponse {
    let query = query.unwrap_or_default();
    state
        .service
        .handle(Operation::ListUsers {
            page: first_param(&query, "page"),
            limit: first_param(&query, "limit"),
        })
        .await
}

/// First value of `key` in a raw query string; repeated keys are not an error
fn first_param(query: &str, key: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

/// POST /user
async fn create_user(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResponse {
    state
        .service
        .handle(Operation::CreateUser { body: body.to_vec() })
        .await
}

/// PUT /user/:id
async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResponse {
    state
        .service
        .handle(Operation::UpdateUser {
            id,
            body: body.to_vec(),
        })
        .await
}

/// DELETE /user/:id
async fn delete_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResponse {
    state.service.handle(Operation::DeleteUser { id }).await
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> ApiResponse {
    state.service.handle(Operation::Health).await
}

/// GET /ping
async fn ping(State(state): State<Arc<AppState>>) -> ApiResponse {
    state.service.handle(Operation::Ping).await
}

async fn not_found() -> ApiResponse {
    ApiResponse::error(StatusCode::NOT_FOUND, "Not found")
}

async fn method_not_allowed() -> ApiResponse {
    ApiResponse::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}
