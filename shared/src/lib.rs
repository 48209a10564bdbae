pub mod config;
pub mod dynamo;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod memory;
pub mod pagination;
pub mod responses;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
pub mod users;

use gateway::GatewaySettings;
use service::UserService;
use std::sync::Arc;

pub use error::{Result, UserError};
pub use ids::UserId;
pub use users::UserRepository;

/// Shared application state, built once per process and handed to either binding
pub struct AppState {
    pub service: UserService,
    pub gateway: GatewaySettings,
}

impl AppState {
    pub fn new(service: UserService, gateway: GatewaySettings) -> Arc<Self> {
        Arc::new(Self { service, gateway })
    }
}
