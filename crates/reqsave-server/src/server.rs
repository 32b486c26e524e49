use tokio::net::TcpListener;
use tracing::info;

use crate::assemble::{build_saver, DynSaver};
use crate::capture::CaptureAdapter;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Request-saving HTTP server.
pub struct ReqSaveServer {
    config: ServerConfig,
    saver: DynSaver,
}

impl ReqSaveServer {
    /// Build the saver described by the configuration.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let saver = build_saver(&config)?;
        Ok(Self { config, saver })
    }

    /// Use a caller-built saver instead of the configured sink.
    pub fn with_saver(config: ServerConfig, saver: DynSaver) -> Self {
        Self { config, saver }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState {
            saver: self.saver.clone(),
            capture: CaptureAdapter::new(self.config.body_limit, self.config.oversize),
        })
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            body_limit = self.config.body_limit,
            "reqsave server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkConfig;

    fn memory_config() -> ServerConfig {
        ServerConfig {
            sink: SinkConfig::Memory { key: "k".into() },
            ..ServerConfig::default()
        }
    }

    #[test]
    fn server_construction() {
        let server = ReqSaveServer::new(memory_config()).unwrap();
        assert_eq!(server.config().bind_addr, "127.0.0.1:8888".parse().unwrap());
    }

    #[test]
    fn router_builds() {
        let server = ReqSaveServer::new(memory_config()).unwrap();
        let _router = server.router();
    }
}
