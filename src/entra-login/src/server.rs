//! Loopback HTTP listener for the browser redirect.
//!
//! Binds an ephemeral port on 127.0.0.1, serves a single callback
//! request, and hands the authorization code back to the flow. The
//! listener does not talk to the provider; the code exchange belongs to
//! the client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::Query, response::Html, routing::get};
use tokio::sync::{Mutex, oneshot};

use crate::constants::REDIRECT_PATH;
use crate::error::FlowError;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>entra-token</title></head>
<body>
    <h1>Sign-in complete</h1>
    <p>You can close this window and return to the terminal.</p>
</body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>entra-token</title></head>
<body>
    <h1>Sign-in failed</h1>
    <p>Check the terminal for details and try again.</p>
</body>
</html>"#;

/// Parameters delivered on the callback.
#[derive(Debug)]
struct CallbackParams {
    code: String,
    state: String,
}

/// One-shot redirect listener bound to an ephemeral loopback port.
pub struct RedirectListener {
    redirect_uri: String,
    result_rx: oneshot::Receiver<Result<CallbackParams, FlowError>>,
    server: tokio::task::JoinHandle<()>,
}

impl RedirectListener {
    /// Bind the listener and start serving the callback route.
    pub async fn bind() -> Result<Self, FlowError> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(FlowError::Listener)?;
        let port = listener.local_addr().map_err(FlowError::Listener)?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}{REDIRECT_PATH}");

        let (result_tx, result_rx) = oneshot::channel();
        let result_tx = Arc::new(Mutex::new(Some(result_tx)));

        let app = Router::new().route(
            REDIRECT_PATH,
            get(move |Query(params): Query<HashMap<String, String>>| {
                let result_tx = result_tx.clone();
                async move {
                    let result = parse_callback(&params);
                    let page = match &result {
                        Ok(_) => SUCCESS_PAGE,
                        Err(e) => {
                            tracing::warn!(error = %e, "Redirect callback carried an error");
                            FAILURE_PAGE
                        }
                    };
                    if let Some(tx) = result_tx.lock().await.take() {
                        let _ = tx.send(result);
                    }
                    Html(page)
                }
            }),
        );

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        tracing::debug!(redirect_uri = %redirect_uri, "Redirect listener bound");
        Ok(Self {
            redirect_uri,
            result_rx,
            server,
        })
    }

    /// The redirect URI to register in the authorize request.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the callback, validate the CSRF state, and return the
    /// authorization code. Consumes the listener; the server task is
    /// stopped on the way out.
    pub async fn wait_for_code(
        self,
        expected_state: &str,
        timeout: Duration,
    ) -> Result<String, FlowError> {
        let outcome = tokio::select! {
            result = self.result_rx => Some(result),
            _ = tokio::time::sleep(timeout) => None,
        };
        self.server.abort();

        let Some(outcome) = outcome else {
            return Err(FlowError::Timeout(timeout.as_secs()));
        };
        let params = outcome.map_err(|_| FlowError::Aborted)??;

        if !constant_time_eq(expected_state, &params.state) {
            return Err(FlowError::StateMismatch);
        }

        Ok(params.code)
    }
}

fn parse_callback(params: &HashMap<String, String>) -> Result<CallbackParams, FlowError> {
    if let Some(error) = params.get("error") {
        if error == "access_denied" {
            return Err(FlowError::Declined);
        }
        return Err(FlowError::Provider {
            error: error.clone(),
            description: params.get("error_description").cloned().unwrap_or_default(),
        });
    }

    let code = params
        .get("code")
        .ok_or(FlowError::MissingParameter("code"))?;
    let state = params
        .get("state")
        .ok_or(FlowError::MissingParameter("state"))?;

    Ok(CallbackParams {
        code: code.clone(),
        state: state.clone(),
    })
}

/// Constant-time string comparison so state validation does not leak
/// match position through timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
