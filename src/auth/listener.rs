//! Loopback HTTP endpoint that receives GitHub's redirect.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::error::AuthError;
use super::redirect::RedirectBridge;

pub const CALLBACK_PATH: &str = "/callback";

const ACCEPTED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>ghlogin</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>GitHub authorization received</h2>
<p>You can close this tab and return to the terminal.</p>
</body>
</html>"#;

const REJECTED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>ghlogin</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>Callback rejected</h2>
</body>
</html>"#;

#[derive(Clone)]
struct ListenerState {
    bridge: Arc<RedirectBridge>,
    source: String,
    local_addr: SocketAddr,
}

/// Serves `GET /callback` on `127.0.0.1` and hands every request to a
/// [`RedirectBridge`] under a fixed source identifier.
///
/// The server stops when the listener is shut down or dropped.
#[derive(Debug)]
pub struct CallbackListener {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Bind on `127.0.0.1:port`. Port `0` picks a free port.
    pub async fn bind(
        port: u16,
        bridge: Arc<RedirectBridge>,
        source: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|e| {
                AuthError::Configuration(format!(
                    "failed to bind callback listener on port {port}: {e}"
                ))
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AuthError::Configuration(format!("callback listener address: {e}")))?;

        let app = router(ListenerState {
            bridge,
            source: source.into(),
            local_addr,
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = server.await {
                tracing::warn!(error = %err, "callback listener stopped");
            }
        });
        tracing::debug!(addr = %local_addr, "callback listener started");

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Redirect URI pointing at this listener.
    pub fn callback_url(&self) -> String {
        format!("http://{}{CALLBACK_PATH}", self.local_addr)
    }

    /// Stop serving and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn router(state: ListenerState) -> Router {
    Router::new()
        .route(CALLBACK_PATH, get(handle_callback))
        .with_state(state)
}

async fn handle_callback(
    State(state): State<ListenerState>,
    uri: Uri,
) -> (StatusCode, Html<&'static str>) {
    let raw = format!("http://{}{}", state.local_addr, uri);
    let url = match Url::parse(&raw) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(error = %err, "unparsable callback request");
            return (StatusCode::BAD_REQUEST, Html(REJECTED_PAGE));
        }
    };
    if state.bridge.handle_incoming_callback(Some(&state.source), &url) {
        (StatusCode::OK, Html(ACCEPTED_PAGE))
    } else {
        (StatusCode::FORBIDDEN, Html(REJECTED_PAGE))
    }
}
