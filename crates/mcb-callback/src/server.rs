use axum::{extract::DefaultBodyLimit, routing, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{self, AppState};
use crate::config::ServerConfig;
use crate::handler::CallbackHandler;
use crate::keystore::KeyStore;
use crate::metrics::CallbackMetrics;
use crate::policy::DecisionPolicy;

pub struct CallbackServer {
    config: ServerConfig,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
}

impl CallbackServer {
    pub fn new(config: ServerConfig, keys: KeyStore) -> anyhow::Result<Self> {
        let policy = DecisionPolicy::new(config.random_reject);
        Self::with_policy(config, keys, policy)
    }

    pub fn with_policy(
        config: ServerConfig,
        keys: KeyStore,
        policy: DecisionPolicy,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let handler = Arc::new(CallbackHandler::new(Arc::new(keys), policy));
        let metrics = Arc::new(CallbackMetrics::new()?);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            state: AppState { handler, metrics },
            shutdown_tx,
        })
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/check", routing::post(api::post_check))
            .route("/rawdata_signature", routing::post(api::post_rawdata_signature))
            .route("/health", routing::get(api::get_health))
            .route("/metrics", routing::get(api::get_metrics))
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        let local_addr: SocketAddr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            random_reject = self.config.random_reject,
            "mcb-callback listening (HTTP)"
        );

        let shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(Self::shutdown_signal(shutdown_rx))
            .await?;

        info!("mcb-callback stopped");
        Ok(())
    }

    async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
        #[cfg(unix)]
        let mut sigterm = {
            use tokio::signal::unix::{signal, SignalKind};
            signal(SignalKind::terminate()).ok()
        };

        tokio::select! {
            _ = async {
                #[cfg(unix)]
                {
                    match sigterm {
                        Some(ref mut sigterm) => { sigterm.recv().await; }
                        None => std::future::pending::<()>().await,
                    }
                }
                #[cfg(not(unix))]
                {
                    std::future::pending::<()>().await;
                }
            } => {
                info!("Received SIGTERM, starting graceful shutdown");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, starting graceful shutdown");
            }
            _ = shutdown.wait_for(|stop| *stop) => {
                info!("Shutdown requested");
            }
        }
    }

    /// Stop a running `start()`, or make the next one return as soon as it binds.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}
