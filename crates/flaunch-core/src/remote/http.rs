//! HTTP backend.
//!
//! Routes served by a running instance:
//!
//! - `GET /ping`: liveness, always `200 OK`.
//! - `POST /`: body is an encoded entry; `400` when the envelope is rejected,
//!   `500` with the error text when the launch fails.
//! - `GET /close`: stops the instance, `200 OK` even when already stopping.

use super::{HttpConfig, Remote};
use crate::config::RemoteConfig;
use crate::entry::{Entry, EntryOptions, EntryRegistry};
use crate::{LaunchError, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

const ROUTE_PING: &str = "/ping";
const ROUTE_HANDLE: &str = "/";
const ROUTE_CLOSE: &str = "/close";

/// State shared by the route handlers of one session.
struct SessionState {
    registry: Arc<EntryRegistry>,
    stopped: CancellationToken,
}

/// Remote reachable over HTTP.
#[derive(Clone)]
pub struct HttpRemote {
    config: HttpConfig,
    registry: Arc<EntryRegistry>,
}

impl HttpRemote {
    pub fn new(config: HttpConfig, registry: Arc<EntryRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    fn url(&self, route: &str) -> String {
        format!("http://{}{}", self.config.addr, route)
    }

    /// Serve on an already bound listener until `/close` is requested.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let stopped = CancellationToken::new();
        let app = router(Arc::clone(&self.registry), stopped.clone());

        let local_addr = listener.local_addr()?;
        info!("HTTP remote listening on {}", local_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(stopped.cancelled_owned())
            .await
            .map_err(|e| LaunchError::Network {
                message: format!("HTTP server on {} failed: {}", local_addr, e),
                unreachable: false,
            })?;

        info!("HTTP remote on {} stopped", local_addr);
        Ok(())
    }

    fn client(timeout: Option<Duration>) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

fn router(registry: Arc<EntryRegistry>, stopped: CancellationToken) -> Router {
    let state = Arc::new(SessionState { registry, stopped });

    Router::new()
        .route(ROUTE_PING, get(handle_ping))
        .route(ROUTE_HANDLE, post(handle_entry))
        .route(ROUTE_CLOSE, get(handle_close))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_ping() -> StatusCode {
    StatusCode::OK
}

async fn handle_entry(State(state): State<Arc<SessionState>>, body: Bytes) -> (StatusCode, String) {
    let (entry, options) = match state.registry.decode(&body) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Rejected entry: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    debug!("Launching {:?}", entry);
    match entry.launch_remote(&options).await {
        Ok(()) => (StatusCode::OK, String::new()),
        Err(e) => {
            warn!("Launch of {:?} failed: {}", entry, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn handle_close(State(state): State<Arc<SessionState>>) -> (StatusCode, &'static str) {
    if state.stopped.is_cancelled() {
        return (StatusCode::OK, "already stopped");
    }
    info!("Close requested");
    state.stopped.cancel();
    (StatusCode::OK, "server stopped")
}

/// Fail with the status and body of any non-200 response.
async fn expect_ok(route: &str, response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status == reqwest::StatusCode::OK {
        return Ok(());
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("error while decoding body: {}", e));
    Err(LaunchError::RemoteStatus {
        route: route.to_string(),
        status: status.as_u16(),
        body,
    })
}

fn request_error(err: reqwest::Error, timeout: Duration) -> LaunchError {
    if err.is_timeout() {
        LaunchError::Timeout(timeout)
    } else {
        err.into()
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.addr)
            .await
            .map_err(|e| LaunchError::Network {
                message: format!("Unable to listen on {}: {}", self.config.addr, e),
                unreachable: false,
            })?;
        self.serve(listener).await
    }

    async fn close(&self) -> Result<()> {
        let response = Self::client(Some(RemoteConfig::CLOSE_TIMEOUT))?
            .get(self.url(ROUTE_CLOSE))
            .send()
            .await;

        match response {
            Ok(response) => expect_ok(ROUTE_CLOSE, response).await,
            Err(e) if e.is_connect() => {
                debug!("No HTTP remote running on {}", self.config.addr);
                Ok(())
            }
            Err(e) => Err(request_error(e, RemoteConfig::CLOSE_TIMEOUT)),
        }
    }

    async fn connect(&self) -> Result<()> {
        let response = Self::client(Some(RemoteConfig::CONNECT_TIMEOUT))?
            .get(self.url(ROUTE_PING))
            .send()
            .await
            .map_err(|e| request_error(e, RemoteConfig::CONNECT_TIMEOUT))?;
        expect_ok(ROUTE_PING, response).await
    }

    async fn handle_entry(&self, entry: &dyn Entry, options: &EntryOptions) -> Result<()> {
        let body = self.registry.encode(entry, options)?;
        let response = Self::client(None)?
            .post(self.url(ROUTE_HANDLE))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        expect_ok(ROUTE_HANDLE, response).await
    }
}
