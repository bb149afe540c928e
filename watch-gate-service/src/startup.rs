//! Application startup and lifecycle management.
//!
//! The service runs two things side by side: the chat update dispatcher and a
//! small HTTP server (OAuth redirect landing, health, metrics).

use crate::config::WatchGateConfig;
use crate::dispatcher::Dispatcher;
use crate::handlers::{
    health_check, metrics_endpoint, oauth_callback, readiness_check, CommandHandler,
};
use crate::services::{
    AccessEngine, ChallengeBuilder, Clock, ContentCatalog, ContentLookup, GoogleMembershipVerifier,
    GrantStore, MembershipVerifier, ScrapedCatalog, SystemClock, UserThrottle,
};
use crate::transport::{ChatTransport, TelegramTransport};
use axum::{middleware, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: CommandHandler,
    pub transport: Arc<dyn ChatTransport>,
    pub store: Arc<GrantStore>,
    pub throttle: UserThrottle,
    pub clock: Arc<dyn Clock>,
}

/// External collaborators. Tests swap in mocks; production builds them from
/// configuration.
pub struct Components {
    pub store: Arc<GrantStore>,
    pub verifier: Arc<dyn MembershipVerifier>,
    pub catalog: Arc<dyn ContentCatalog>,
    pub transport: Arc<dyn ChatTransport>,
    pub clock: Arc<dyn Clock>,
}

impl Components {
    pub async fn from_config(config: &WatchGateConfig) -> Result<Self, AppError> {
        let timeout = config.runtime.http_timeout();

        let store = GrantStore::open_file(config.store.path.clone())
            .await
            .map_err(|e| {
                tracing::error!(path = %config.store.path.display(), "Failed to load grant store: {}", e);
                AppError::StorageError(anyhow::anyhow!(e))
            })?;

        let verifier = GoogleMembershipVerifier::new(
            config.oauth.clone(),
            config.membership.clone(),
            timeout,
        )
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("HTTP client: {}", e)))?;

        let catalog = ScrapedCatalog::new(&config.catalog, timeout)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let transport = TelegramTransport::new(&config.telegram, timeout)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("HTTP client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            verifier: Arc::new(verifier),
            catalog: Arc::new(catalog),
            transport: Arc::new(transport),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
    dispatcher: Dispatcher,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: WatchGateConfig) -> Result<Self, AppError> {
        let components = Components::from_config(&config).await?;
        Self::build_with(config, components).await
    }

    /// Build around caller-supplied collaborators.
    pub async fn build_with(
        config: WatchGateConfig,
        components: Components,
    ) -> Result<Self, AppError> {
        let challenge = ChallengeBuilder::new(&config.oauth)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("OAUTH_AUTHORIZE_URL: {}", e)))?;

        let engine = Arc::new(AccessEngine::new(
            components.store.clone(),
            components.verifier,
            challenge,
            components.clock.clone(),
        ));
        let handler = CommandHandler::new(engine, ContentLookup::new(components.catalog));

        // Chat messages and redirect landings draw on the same per-user quota.
        let throttle = UserThrottle::per_minute(config.runtime.user_rate_limit_per_min);
        let dispatcher = Dispatcher::new(
            components.transport.clone(),
            handler.clone(),
            throttle.clone(),
            config.runtime.max_in_flight,
        );

        let state = AppState {
            handler,
            transport: components.transport,
            store: components.store,
            throttle,
            clock: components.clock,
        };

        // Bind HTTP listener (port 0 = random port for testing)
        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Watch gate service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state,
            dispatcher,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn store(&self) -> Arc<GrantStore> {
        self.state.store.clone()
    }

    /// Run until Ctrl-C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the HTTP server and the update dispatcher until `shutdown`
    /// resolves, then stop both gracefully.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown.await;
            let _ = stop_tx.send(true);
        });

        let router = router(self.state);
        let listener = self.http_listener;
        let server_stop = wait_for_stop(stop_rx.clone());
        let server = async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(server_stop)
                .await
        };
        let dispatcher = self.dispatcher.run(wait_for_stop(stop_rx));

        let (served, ()) = tokio::join!(server, dispatcher);
        served.map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            e
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/oauth/callback", get(oauth_callback))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn wait_for_stop(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
