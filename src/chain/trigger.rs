//! Entry points of a chain.
//!
//! A webhook trigger binds a receiver on the host and port of its url and
//! waits for exactly one matching request; the JSON body of that request is
//! the trigger's result.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::oneshot};
use tracing::{debug, info, warn};

use crate::{
    ActchainError, Result,
    chain::actions::{Exec, http_request::HttpMethod},
    runtime::Context,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Trigger {
    pub id: String,
    #[serde(default)]
    pub result_id: String,
    #[serde(default)]
    pub following_action_id: String,
    #[serde(flatten)]
    pub kind: TriggerKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerKind {
    Webhook(WebhookTrigger),
}

/// Match rule of an inbound request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WebhookTrigger {
    /// bind address and path, e.g. `http://0.0.0.0:8080/hooks/orders`
    pub url: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    /// headers the request must carry, names are case-insensitive
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// JSON the request body must contain, compared as a subset
    #[serde(default)]
    pub body: Option<Value>,
}

fn default_method() -> HttpMethod {
    HttpMethod::POST
}

impl Trigger {
    pub fn trigger_type(&self) -> &'static str {
        match self.kind {
            TriggerKind::Webhook(_) => "webhook",
        }
    }
}

#[async_trait]
impl Exec for Trigger {
    async fn exec(
        &mut self,
        ctx: &Context,
    ) -> Result<()> {
        let value = match &self.kind {
            TriggerKind::Webhook(webhook) => webhook.receive(ctx).await?,
        };

        if !self.result_id.is_empty() {
            ctx.set_result(&self.result_id, value);
        }
        Ok(())
    }

    fn result_id(&self) -> &str {
        &self.result_id
    }

    fn following_action_id(&self) -> &str {
        &self.following_action_id
    }
}

struct Receiver {
    rule: WebhookTrigger,
    path: String,
    sender: Mutex<Option<oneshot::Sender<Value>>>,
}

impl WebhookTrigger {
    /// Splits the url into the socket address to bind and the path to match.
    fn endpoint(&self) -> Result<(String, String)> {
        let url = reqwest::Url::parse(&self.url).map_err(|e| ActchainError::Trigger(format!("invalid webhook url '{}': {}", self.url, e)))?;
        let host = url.host_str().ok_or_else(|| ActchainError::Trigger(format!("webhook url '{}' has no host", self.url)))?;
        let port = url.port_or_known_default().ok_or_else(|| ActchainError::Trigger(format!("webhook url '{}' has no port", self.url)))?;

        Ok((format!("{}:{}", host, port), url.path().to_string()))
    }

    /// Serves until one request matches, then shuts the receiver down.
    async fn receive(
        &self,
        ctx: &Context,
    ) -> Result<Value> {
        let (addr, path) = self.endpoint()?;
        let listener = TcpListener::bind(&addr).await.map_err(|e| ActchainError::Trigger(format!("failed to bind webhook on {}: {}", addr, e)))?;
        info!("webhook for chain {} listening on {}{}", ctx.chain_id(), addr, path);

        let (fired_tx, fired_rx) = oneshot::channel();
        let receiver = Arc::new(Receiver {
            rule: self.clone(),
            path,
            sender: Mutex::new(Some(fired_tx)),
        });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let app = Router::new().fallback(handle).with_state(receiver);
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        let outcome = tokio::select! {
            fired = fired_rx => fired.map_err(|_| ActchainError::Trigger("webhook receiver stopped".to_string())),
            _ = ctx.wait_shutdown() => Err(ActchainError::Activation(format!("activation {} cancelled", ctx.aid()))),
        };

        let _ = stop_tx.send(());
        match server.await {
            Ok(Err(e)) => warn!("webhook server on {} failed: {}", addr, e),
            Err(e) => warn!("webhook server on {} panicked: {}", addr, e),
            Ok(Ok(())) => debug!("webhook on {} closed", addr),
        }
        outcome
    }
}

async fn handle(
    State(receiver): State<Arc<Receiver>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if uri.path() != receiver.path {
        return StatusCode::NOT_FOUND.into_response();
    }
    if method != reqwest::Method::from(receiver.rule.method) {
        return (StatusCode::METHOD_NOT_ALLOWED, format!("method {} not allowed", method)).into_response();
    }
    if !headers_match(&receiver.rule.headers, &headers) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => return (StatusCode::BAD_REQUEST, format!("invalid json body: {}", e)).into_response(),
        }
    };
    if let Some(rule) = &receiver.rule.body {
        if !contains(&value, rule) {
            return StatusCode::NOT_FOUND.into_response();
        }
    }

    // only the first match fires
    let sender = receiver.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    match sender.map(|sender| sender.send(value)) {
        Some(Ok(())) => StatusCode::OK.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn headers_match(
    rule: &HashMap<String, String>,
    headers: &HeaderMap,
) -> bool {
    rule.iter().all(|(name, expected)| headers.get(name.as_str()).and_then(|v| v.to_str().ok()).is_some_and(|v| v == expected))
}

/// Whether `value` holds every field of `rule`, recursing into objects.
fn contains(
    value: &Value,
    rule: &Value,
) -> bool {
    match (value, rule) {
        (Value::Object(value), Value::Object(rule)) => rule.iter().all(|(k, r)| value.get(k).is_some_and(|v| contains(v, r))),
        _ => value == rule,
    }
}
