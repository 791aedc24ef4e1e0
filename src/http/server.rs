//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, limits, timeout, headers)
//! - Apply reloaded configuration to the running service
//! - Start the admin listener when enabled
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::config::ProxyConfig;
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::predict::PredictionService;
use crate::security::{apply_security_headers, rate_limit_middleware, RateLimiter};
use crate::upstream::SetupError;

const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub config: Arc<ArcSwap<ProxyConfig>>,
    pub started_at: Instant,
}

/// HTTP server for the prediction proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
    limiter: Arc<RateLimiter>,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, SetupError> {
        let service = Arc::new(PredictionService::from_config(&config)?);
        let state = AppState {
            service,
            config: Arc::new(ArcSwap::from_pointee(config.clone())),
            started_at: Instant::now(),
        };
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let router = Self::build_router(&config, state.clone(), limiter.clone());

        Ok(Self {
            router,
            state,
            limiter,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState, limiter: Arc<RateLimiter>) -> Router {
        let limited = Router::new()
            .route("/predict", post(handlers::predict))
            .route("/predict/batch", post(handlers::predict_batch))
            .route("/train", post(handlers::train))
            .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));

        let open = Router::new()
            .route("/ml-status", get(handlers::ml_status))
            .route("/model/info", get(handlers::model_info))
            .route("/health", get(handlers::health))
            .route("/health/live", get(handlers::live))
            .route("/health/ready", get(handlers::ready));

        let router = limited
            .merge(open)
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = request.headers().request_id().unwrap_or("-"),
                    )
                }),
            )
            .layer(set_request_id_layer());

        apply_security_headers(router, &config.security)
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the startup config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            ml_service = %self.state.service.settings().client.base_url(),
            "HTTP server starting"
        );

        let service = self.state.service.clone();
        let store = self.state.config.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                match service.apply_config(&new_config) {
                    Ok(()) => {
                        tracing::info!(
                            ml_service = %new_config.upstream.base_url,
                            failure_threshold = new_config.breaker.failure_threshold,
                            "Configuration applied"
                        );
                        store.store(Arc::new(new_config));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected reloaded configuration");
                    }
                }
            }
        });

        let limiter = self.limiter.clone();
        let mut prune_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => limiter.prune(),
                    _ = prune_shutdown.recv() => break,
                }
            }
        });

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");

            let admin = setup_admin_router(self.state.clone());
            let mut admin_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let result = axum::serve(admin_listener, admin)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Admin server failed");
                }
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
