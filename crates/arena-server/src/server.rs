//! Listener lifecycle for the Arena server.
//!
//! Binding and serving are separate steps: [`ArenaServer::bind`] claims the
//! socket (so a port of `0` can be inspected through
//! [`ArenaServer::local_addr`]) and [`ArenaServer::run`] serves until the
//! supplied shutdown future resolves.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::router::build_router;
use crate::state::AppState;

/// Errors from binding or serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured address could not be resolved or bound.
    #[error("cannot listen on {host}:{port}: {source}")]
    Bind {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// The listener failed while accepting connections.
    #[error("server stopped with an error: {0}")]
    Serve(#[source] std::io::Error),
}

/// A bound listener with the state it will serve.
#[derive(Debug)]
pub struct ArenaServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl ArenaServer {
    /// Bind the configured address. Host names are resolved.
    pub async fn bind(config: &ServerConfig, state: Arc<AppState>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind {
                host: config.host.clone(),
                port: config.port,
                source,
            })?;
        Ok(Self { listener, state })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Serve)
    }

    /// Serve the API until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        let state = Arc::clone(&self.state);
        info!(%addr, "arena server listening");

        axum::serve(self.listener, build_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)?;

        let sessions = state.store.list().await.len();
        info!(sessions, "arena server stopped");
        Ok(())
    }
}

/// Resolves on `Ctrl-C`. Never resolves if the handler cannot be installed.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arena_rules::{RuleRegistry, RuleSettings};
    use arena_session::SessionStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::auth::StaticAuthenticator;

    fn state() -> Arc<AppState> {
        let store = SessionStore::new(RuleRegistry::standard(&RuleSettings::default()));
        Arc::new(AppState::new(store, Arc::new(StaticAuthenticator::default())))
    }

    fn local(port: u16) -> ServerConfig {
        ServerConfig {
            host: String::from("127.0.0.1"),
            port,
        }
    }

    #[tokio::test]
    async fn serves_the_banner_until_shutdown() {
        let server = ArenaServer::bind(&local(0), state()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let (stop, stopped) = oneshot::channel::<()>();
        let running = tokio::spawn(server.run(async {
            let _ = stopped.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: arena\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("Arena game server"));

        stop.send(()).unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn taken_port_is_a_bind_error() {
        let first = ArenaServer::bind(&local(0), state()).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let second = ArenaServer::bind(&local(port), state()).await;
        assert!(matches!(second, Err(ServerError::Bind { port: p, .. }) if p == port));
    }
}
