//! HTTP surface for Mosaic
//!
//! Assembles the axum router over a [`FanoutServer`] with identity,
//! tracing and optional CORS layers.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod cors;
mod error;
mod health;
mod identity;
mod routes;

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use mosaic_config::Config;
use mosaic_fanout::{FanoutServer, FanoutServerBuilder};
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// Fails when a provider, the object store or the generation log
    /// cannot be initialized.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let fanout = FanoutServerBuilder::new(&config)
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize generation server: {e}"))?;

        Ok(Self::with_fanout(&config, Arc::new(fanout)))
    }

    /// Assemble the router around an existing fan-out server
    pub fn with_fanout(config: &Config, fanout: Arc<FanoutServer>) -> Self {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let mut app = Router::new();

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        app = app.merge(routes::router().with_state(fanout));

        let identity = config.server.identity.clone();
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            let identity = identity.clone();
            async move { identity::identity_middleware(identity, req, next).await }
        }));

        app = app.layer(TraceLayer::new_for_http());

        if let Some(ref cors_config) = config.server.cors {
            app = app.layer(cors::cors_layer(cors_config));
        }

        Self {
            router: app,
            listen_address,
        }
    }

    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered. In-flight
    /// fan-outs keep running in the background until the runtime stops.
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
