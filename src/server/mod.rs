//! Server initialization and routing

use crate::api;
use crate::config::{Config, DEV_JWT_SECRET};
use crate::error::ApiError;
use crate::jwt::JwtManager;
use crate::middleware::{
    rate_limit, Authenticate, Decode, RateLimit, RateLimiter, RequestLog, SchemaRegistry,
    ValidatePayload,
};
use crate::pipeline::{pipeline_middleware, BoxedStage, Pipeline, RouteTable};
use crate::repository::{InMemoryCardRepository, InMemoryUserRepository};
use crate::service::{AccountService, CardService};
use crate::state::HasServices;
use crate::telemetry;
use anyhow::Result;
use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_repo: Arc<InMemoryUserRepository>,
    pub account_service: Arc<AccountService<InMemoryUserRepository>>,
    pub card_service: Arc<CardService<InMemoryCardRepository>>,
    pub jwt_manager: JwtManager,
}

impl AppState {
    /// Wire services over fresh in-memory stores
    pub fn new(config: Config) -> Self {
        let jwt_manager = JwtManager::new(config.jwt.clone());
        let user_repo = Arc::new(InMemoryUserRepository::new());
        let card_repo = Arc::new(InMemoryCardRepository::new());

        Self {
            account_service: Arc::new(AccountService::new(user_repo.clone(), jwt_manager.clone())),
            card_service: Arc::new(CardService::new(card_repo)),
            user_repo,
            jwt_manager,
            config: Arc::new(config),
        }
    }
}

impl HasServices for AppState {
    type UserRepo = InMemoryUserRepository;
    type CardRepo = InMemoryCardRepository;

    fn config(&self) -> &Config {
        &self.config
    }

    fn account_service(&self) -> &AccountService<Self::UserRepo> {
        &self.account_service
    }

    fn card_service(&self) -> &CardService<Self::CardRepo> {
        &self.card_service
    }

    fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    fn user_repo(&self) -> Arc<Self::UserRepo> {
        self.user_repo.clone()
    }
}

/// Run the HTTP server (and the metrics listener when configured)
pub async fn run(config: Config, metrics: Option<PrometheusHandle>) -> Result<()> {
    if !config.production && config.jwt.secret == DEV_JWT_SECRET {
        warn!("JWT_SECRET is not set; signing credentials with the development secret");
    }

    let http_addr = config.http_addr();
    let sweep_every = Duration::from_secs(config.rate_limit.sweep_interval_secs.max(1));
    let rate_limit_enabled = config.rate_limit.enabled;
    let metrics_addr = config.telemetry.metrics_addr.clone();

    let state = AppState::new(config);
    let limiter = Arc::new(RateLimiter::from_config(&state.config.rate_limit));
    if rate_limit_enabled {
        rate_limit::spawn_sweeper(limiter.clone(), sweep_every);
    }

    let pipeline = Arc::new(build_pipeline(&state, limiter));
    info!(stages = ?pipeline.stage_names(), "Request pipeline assembled");
    let app = build_router(state, pipeline);

    if let (Some(addr), Some(handle)) = (metrics_addr, metrics) {
        tokio::spawn(async move {
            if let Err(e) = telemetry::metrics::serve(addr, handle).await {
                tracing::error!(error = %e, "Metrics listener stopped");
            }
        });
    }

    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Assemble the standard stage list over the state's services
pub fn build_pipeline<S: HasServices>(state: &S, limiter: Arc<RateLimiter>) -> Pipeline {
    let config = state.config();
    let stages: Vec<BoxedStage> = vec![
        Arc::new(RateLimit::new(limiter, &config.rate_limit)),
        Arc::new(Decode::new(config.body.clone())),
        Arc::new(RequestLog),
        Arc::new(Authenticate::new(
            state.jwt_manager().clone(),
            state.user_repo(),
        )),
        Arc::new(ValidatePayload::new(SchemaRegistry::standard())),
    ];
    Pipeline::new(
        config.security_headers.clone(),
        RouteTable::standard(),
        stages,
    )
}

/// Build the HTTP router with generic state type
///
/// The pipeline wraps every route and the fallback, so unknown paths are
/// rate limited and authenticated like any other request.
pub fn build_router<S: HasServices>(state: S, pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        // Public
        .route("/signup", post(api::auth::signup::<S>))
        .route("/signin", post(api::auth::signin::<S>))
        // Session
        .route("/signout", post(api::auth::signout::<S>))
        // Users
        .route("/users", get(api::user::list::<S>))
        .route(
            "/users/me",
            get(api::user::me::<S>).patch(api::user::update_me::<S>),
        )
        .route("/users/me/avatar", patch(api::user::update_avatar::<S>))
        .route("/users/{id}", get(api::user::get::<S>))
        // Cards
        .route(
            "/cards",
            get(api::card::list::<S>).post(api::card::create::<S>),
        )
        .route("/cards/{id}", axum::routing::delete(api::card::delete::<S>))
        .route(
            "/cards/{id}/likes",
            put(api::card::like::<S>).delete(api::card::unlike::<S>),
        )
        .route("/crash-test", get(api::crash_test))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(pipeline, pipeline_middleware))
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("no route".to_string())
}

/// A handler panic becomes an internal fault carried to the error tail
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::internal(format!("handler panicked: {detail}")).into_response()
}
