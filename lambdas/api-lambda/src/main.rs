use lambda_runtime::{run, service_fn, LambdaEvent};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use userdocs_shared::config::{AppConfig, BindingMode};
use userdocs_shared::service::UserService;
use userdocs_shared::{gateway, server, store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let lambda = std::env::var_os(userdocs_shared::config::LAMBDA_FUNCTION_NAME).is_some();
    init_tracing(lambda);

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    // Connect once per process; warm Lambda invocations reuse it
    let users = store::connect(&config.store_uri, config.store_timeouts).await;
    tracing::info!("User store ready: {}", config.store_uri);

    let state = AppState::new(
        UserService::new(users, config.pagination),
        config.gateway.clone(),
    );

    match config.mode {
        BindingMode::Server => {
            server::serve(state, config.port).await?;
        }
        BindingMode::Gateway => {
            tracing::info!("Starting gateway handler");
            run(service_fn(move |event: LambdaEvent<_>| {
                let state = Arc::clone(&state);
                async move { gateway::function_handler(event, state).await }
            }))
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    Ok(())
}

fn init_tracing(lambda: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if lambda {
        // CloudWatch already stamps each line
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
