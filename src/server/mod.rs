// HTTP server
// Exposes the development loop as a streaming job

mod handlers;
mod middleware;

pub use handlers::{generate, health_check, index, ApiError, GenerateRequest};
pub use middleware::{rate_limit, RateLimiter};

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::crew::DevelopmentLoop;
use crate::providers::create_provider;

/// How often idle rate-limit buckets are swept.
const RATE_LIMIT_SWEEP: Duration = Duration::from_secs(300);

/// Shared handler state
pub struct AppState {
    pub runner: Arc<DevelopmentLoop>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(runner: DevelopmentLoop, config: Config) -> Self {
        Self {
            runner: Arc::new(runner),
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    router_with_limiter(state, None)
}

fn router_with_limiter(state: Arc<AppState>, limiter: Option<RateLimiter>) -> Router {
    let generate_route = Router::new().route("/generate", post(handlers::generate));
    let generate_route = match limiter {
        Some(limiter) => generate_route
            .route_layer(axum::middleware::from_fn_with_state(limiter, rate_limit)),
        None => generate_route,
    };

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .merge(generate_route)
        .layer(DefaultBodyLimit::max(state.config.server.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router for `config`, including the rate limiter when enabled.
pub fn build_app(state: Arc<AppState>) -> (Router, Option<RateLimiter>) {
    let limiter = RateLimiter::from_config(&state.config.server);
    (router_with_limiter(state, limiter.clone()), limiter)
}

/// Run the HTTP server until the process is stopped.
pub async fn serve(config: Config) -> Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.server.bind_address))?;

    let provider = create_provider(&config.provider)?;
    let runner = DevelopmentLoop::from_config(provider, &config);
    let state = Arc::new(AppState::new(runner, config));

    let (app, limiter) = build_app(state);
    if let Some(limiter) = limiter {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RATE_LIMIT_SWEEP);
            loop {
                ticker.tick().await;
                limiter.forget_idle(RATE_LIMIT_SWEEP);
            }
        });
    }

    tracing::info!("Starting crewloop server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
