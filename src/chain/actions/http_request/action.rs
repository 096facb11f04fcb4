use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    ActchainError, Result,
    chain::{
        actions::{ActionOutput, ActionRunner, ActionType, Scope},
        template,
    },
    runtime::Context,
};

use super::models::HttpMethod;

/// Sends one request and stores the response body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HttpAction {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl HttpAction {
    fn build_request(
        &self,
        ctx: &Context,
        scope: &Scope<'_>,
    ) -> Result<reqwest::RequestBuilder> {
        let url = template::resolve_template(ctx, scope.placeholders, &self.url);

        let mut headers = HeaderMap::new();
        for (key, value) in &self.headers {
            let value = template::resolve_template(ctx, scope.placeholders, value);
            headers.insert(
                key.parse::<HeaderName>().map_err(|err| ActchainError::Convert(format!("invalid header name '{}': {}", key, err)))?,
                HeaderValue::from_str(&value).map_err(|err| ActchainError::Convert(format!("invalid value for header '{}': {}", key, err)))?,
            );
        }

        let mut body = template::resolve_template(ctx, scope.placeholders, &self.body);
        if is_json(&headers) && !body.trim().is_empty() {
            body = normalize_json(&body)?;
        }

        let mut request = ctx.http().request(self.method.into(), &url).headers(headers);
        if !body.is_empty() {
            request = request.body(body);
        }
        Ok(request)
    }
}

#[async_trait]
impl ActionRunner for HttpAction {
    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["url", "method"],
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Request URL, supports [[placeholder]] and {{SECRET}} tokens"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"],
                    "description": "HTTP request method"
                },
                "headers": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "HTTP headers, values support tokens"
                },
                "body": {
                    "type": "string",
                    "description": "Request body template; re-encoded when Content-Type is application/json"
                }
            }
        })
    }

    fn action_type(&self) -> ActionType {
        ActionType::Http
    }

    async fn run(
        &mut self,
        ctx: &Context,
        scope: &Scope<'_>,
    ) -> Result<ActionOutput> {
        let request = self.build_request(ctx, scope)?;
        let res = request.send().await.map_err(|err| ActchainError::Transport(format!("http error: {}", err)))?;

        let status = res.status();
        if !status.is_success() {
            warn!("http action '{}' got status {}", scope.id, status);
        }

        let text = res.text().await.map_err(|err| ActchainError::Transport(format!("failed to read response: {}", err)))?;
        let value = match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(_) => Value::String(text),
        };
        debug!("http action '{}' finished with {}", scope.id, status);

        Ok(ActionOutput::store(value))
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
}

/// Re-encodes a JSON body, repairing raw newlines inside string literals once.
fn normalize_json(body: &str) -> Result<String> {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) => serde_json::from_str::<Value>(&escape_control_in_strings(body)).map_err(|err| ActchainError::Convert(format!("invalid json body: {}", err)))?,
    };
    Ok(serde_json::to_string(&value)?)
}

// placeholder values spliced into string literals often carry raw line breaks
fn escape_control_in_strings(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in body.chars() {
        if !in_string {
            in_string = c == '"';
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
