use std::{sync::Arc, time::Duration};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, trace, warn};

use crate::{
    ActchainError, LlmConfig, Result, SecretStore,
    common::Shutdown,
    llm::{
        ChatMessage, CompletionRequest, MAX_TOKENS_CAP, Provider,
        sse::{SseDecoder, SseFrame},
    },
};

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
/// Secret holding the azure resource domain, e.g. `myres.openai.azure.com`.
const AZURE_DOMAIN_SECRET: &str = "AZURE_OAI_DOMAIN";

const CONTENT_QUEUE_SIZE: usize = 64;

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    delta: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Receiving half of one completion.
///
/// The producer task owns both senders; whichever channel yields first decides
/// the outcome and both close when the producer exits.
pub struct Completion {
    pub content: mpsc::Receiver<String>,
    pub errors: mpsc::Receiver<ActchainError>,
}

impl Completion {
    /// Drains the completion, handing every fragment to `on_fragment`.
    ///
    /// Returns the concatenated fragments, or the first error when it arrives
    /// before any content.
    pub async fn collect(
        mut self,
        mut on_fragment: impl FnMut(&str),
    ) -> Result<String> {
        let mut text = String::new();
        let mut received = false;
        let mut errors_open = true;

        loop {
            tokio::select! {
                biased;
                fragment = self.content.recv() => match fragment {
                    Some(fragment) => {
                        on_fragment(&fragment);
                        text.push_str(&fragment);
                        received = true;
                    }
                    None => break,
                },
                err = self.errors.recv(), if errors_open => match err {
                    Some(err) if !received => return Err(err),
                    Some(err) => warn!("completion failed after content was delivered: {}", err),
                    None => errors_open = false,
                },
            }
        }

        if !received && errors_open {
            if let Some(err) = self.errors.recv().await {
                return Err(err);
            }
        }
        Ok(text)
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    provider: Provider,
    endpoint: String,
    api_key: String,
    app_name: Option<String>,
    app_url: Option<String>,
}

impl LlmClient {
    pub fn new(
        provider: Provider,
        endpoint: &str,
        api_key: &str,
        config: &LlmConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Self {
            http,
            provider,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            app_name: config.app_name.clone(),
            app_url: config.app_url.clone(),
        })
    }

    /// Resolves endpoint and API key of `provider` from the secret store.
    ///
    /// `deployment` is only used by azure, where it is part of the URL.
    pub fn for_provider(
        provider: Provider,
        deployment: &str,
        secrets: &SecretStore,
        config: &LlmConfig,
    ) -> Result<Self> {
        let endpoint = match provider {
            Provider::OpenAi => OPENAI_ENDPOINT.to_string(),
            Provider::OpenRouter => OPENROUTER_ENDPOINT.to_string(),
            Provider::Azure => format!(
                "https://{}/openai/deployments/{}/chat/completions?api-version={}",
                secrets.get(AZURE_DOMAIN_SECRET),
                deployment,
                config.azure_api_version
            ),
        };

        Self::new(provider, &endpoint, &secrets.get(provider.api_key_secret()), config)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Starts a completion on a background task.
    ///
    /// `cancel` is checked before every model attempt.
    pub fn completion(
        &self,
        request: CompletionRequest,
        cancel: Arc<Shutdown>,
    ) -> Completion {
        let (content_tx, content_rx) = mpsc::channel(CONTENT_QUEUE_SIZE);
        let (error_tx, error_rx) = mpsc::channel(1);

        let client = self.clone();
        tokio::spawn(async move {
            client.produce(request, cancel, content_tx, error_tx).await;
        });

        Completion {
            content: content_rx,
            errors: error_rx,
        }
    }

    async fn produce(
        self,
        request: CompletionRequest,
        cancel: Arc<Shutdown>,
        content: mpsc::Sender<String>,
        errors: mpsc::Sender<ActchainError>,
    ) {
        info!("starting completion with {} models against {}", request.models.len(), self.provider);

        for model in &request.models {
            if cancel.is_terminated() {
                let _ = errors.send(ActchainError::Activation("completion cancelled".to_string())).await;
                return;
            }

            let response = match self.attempt(model, &request).await {
                Ok(response) => response,
                Err(err) => {
                    warn!("model {} failed: {}", model, err);
                    continue;
                }
            };
            debug!("model {} answered", model);

            let forwarded = if request.stream {
                forward_stream(response, &content).await
            } else {
                forward_message(response, &content).await
            };
            if let Err(err) = forwarded {
                let _ = errors.send(err).await;
            }
            return;
        }

        warn!("all models failed");
        let _ = errors.send(ActchainError::Provider("all models failed".to_string())).await;
    }

    async fn attempt(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response> {
        let body = ChatCompletionBody {
            model,
            messages: &request.messages,
            stream: request.stream,
            temperature: request.temperature,
            max_tokens: request.max_tokens.min(MAX_TOKENS_CAP),
        };

        let response = self.http.post(&self.endpoint).headers(self.headers()?).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ActchainError::Provider(format!("model {} failed with status {}: {}", model, status, text)));
        }
        Ok(response)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let value = |v: &str| HeaderValue::from_str(v).map_err(|e| ActchainError::Convert(format!("invalid header value: {}", e)));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value(&format!("Bearer {}", self.api_key))?);
        headers.insert(HeaderName::from_static("api-key"), value(&self.api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if self.provider == Provider::OpenRouter {
            if let Some(url) = &self.app_url {
                headers.insert(HeaderName::from_static("http-referer"), value(url)?);
            }
            if let Some(name) = &self.app_name {
                headers.insert(HeaderName::from_static("x-title"), value(name)?);
            }
        }
        Ok(headers)
    }
}

async fn forward_message(
    response: reqwest::Response,
    content: &mpsc::Sender<String>,
) -> Result<()> {
    let response = response.json::<ChatCompletionResponse>().await.map_err(|e| ActchainError::Provider(format!("error decoding response: {}", e)))?;
    let message = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .ok_or_else(|| ActchainError::Provider("no content in response".to_string()))?;

    let _ = content.send(message.content.unwrap_or_default()).await;
    Ok(())
}

async fn forward_stream(
    response: reqwest::Response,
    content: &mpsc::Sender<String>,
) -> Result<()> {
    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| ActchainError::Transport(format!("error reading stream: {}", e)))?;
        for frame in decoder.push(&chunk) {
            if !forward_frame(frame, content).await? {
                return Ok(());
            }
        }
    }
    if let Some(frame) = decoder.finish() {
        forward_frame(frame, content).await?;
    }
    Ok(())
}

/// Returns false once the stream is over or the consumer went away.
async fn forward_frame(
    frame: SseFrame,
    content: &mpsc::Sender<String>,
) -> Result<bool> {
    let data = match frame {
        SseFrame::Done => return Ok(false),
        SseFrame::Data(data) => data,
    };
    trace!("sse frame: {}", data);

    let chunk = serde_json::from_str::<ChatCompletionResponse>(&data).map_err(|e| ActchainError::Provider(format!("malformed stream frame: {}", e)))?;
    let fragment = chunk.choices.into_iter().next().and_then(|c| c.delta).and_then(|d| d.content);
    match fragment {
        Some(fragment) if !fragment.is_empty() => Ok(content.send(fragment).await.is_ok()),
        _ => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method},
    };

    use super::LlmClient;
    use crate::{
        ActchainError, LlmConfig, SecretStore,
        common::Shutdown,
        llm::{ChatMessage, CompletionRequest, Provider},
    };

    fn request(models: &[&str]) -> CompletionRequest {
        CompletionRequest::new(models.iter().map(|m| m.to_string()).collect(), vec![ChatMessage::new("user", "hi")])
    }

    fn answer(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}))
    }

    async fn client(server: &MockServer) -> LlmClient {
        LlmClient::new(Provider::OpenAi, &format!("{}/v1/chat/completions", server.uri()), "sk-test", &LlmConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_falls_back_to_next_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(body_partial_json(json!({"model": "m1"}))).respond_with(ResponseTemplate::new(500)).expect(1).mount(&server).await;
        Mock::given(method("POST")).and(body_partial_json(json!({"model": "m2"}))).respond_with(answer("ok")).expect(1).mount(&server).await;

        let completion = client(&server).await.completion(request(&["m1", "m2"]), Arc::new(Shutdown::new()));
        assert_eq!(completion.collect(|_| {}).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_all_models_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(500).set_body_string("overloaded")).expect(2).mount(&server).await;

        let completion = client(&server).await.completion(request(&["m1", "m2"]), Arc::new(Shutdown::new()));
        let err = completion.collect(|_| {}).await.unwrap_err();
        assert_eq!(err, ActchainError::Provider("all models failed".to_string()));
        assert_eq!(err.to_string(), "all models failed");
    }

    #[tokio::test]
    async fn test_first_success_is_used_exclusively() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(body_partial_json(json!({"model": "m1"}))).respond_with(answer("first")).expect(1).mount(&server).await;
        Mock::given(method("POST")).and(body_partial_json(json!({"model": "m2"}))).respond_with(answer("second")).expect(0).mount(&server).await;

        let completion = client(&server).await.completion(request(&["m1", "m2"]), Arc::new(Shutdown::new()));
        assert_eq!(completion.collect(|_| {}).await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("api-key", "sk-test"))
            .and(body_partial_json(json!({
                "model": "m1", "stream": false, "temperature": 0.5, "max_tokens": 4000,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(answer("shaped"))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(&["m1"]);
        req.temperature = 0.5;
        req.max_tokens = 100_000;
        let completion = client(&server).await.completion(req, Arc::new(Shutdown::new()));
        assert_eq!(completion.collect(|_| {}).await.unwrap(), "shaped");
    }

    #[tokio::test]
    async fn test_streaming_fragments() {
        let server = MockServer::start().await;
        let body = [
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#,
            "data: [DONE]",
            r#"data: {"choices":[{"delta":{"content":"ignored"}}]}"#,
        ]
        .join("\n\n");
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/event-stream").set_body_string(body))
            .mount(&server)
            .await;

        let mut req = request(&["m1"]);
        req.stream = true;
        let completion = client(&server).await.completion(req, Arc::new(Shutdown::new()));

        let mut fragments = Vec::new();
        let text = completion.collect(|f| fragments.push(f.to_string())).await.unwrap();
        assert_eq!(text, "Hello");
        assert_eq!(fragments, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(answer("never")).expect(0).mount(&server).await;

        let cancel = Arc::new(Shutdown::new());
        cancel.shutdown();
        let completion = client(&server).await.completion(request(&["m1"]), cancel);
        assert!(matches!(completion.collect(|_| {}).await.unwrap_err(), ActchainError::Activation(_)));
    }

    #[tokio::test]
    async fn test_openrouter_attribution_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("http-referer", "https://example.com"))
            .and(header("x-title", "actchain"))
            .respond_with(answer("attributed"))
            .expect(1)
            .mount(&server)
            .await;

        let config = LlmConfig {
            app_name: Some("actchain".to_string()),
            app_url: Some("https://example.com".to_string()),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(Provider::OpenRouter, &server.uri(), "sk-or", &config).unwrap();
        let completion = client.completion(request(&["m1"]), Arc::new(Shutdown::new()));
        assert_eq!(completion.collect(|_| {}).await.unwrap(), "attributed");
    }

    #[test]
    fn test_provider_endpoints() {
        let secrets = SecretStore::new().with("AZURE_OAI_DOMAIN", "res.openai.azure.com").with("AZURE_API_KEY", "az");
        let config = LlmConfig::default();

        let azure = LlmClient::for_provider(Provider::Azure, "gpt4", &secrets, &config).unwrap();
        assert_eq!(azure.endpoint(), "https://res.openai.azure.com/openai/deployments/gpt4/chat/completions?api-version=2023-12-01-preview");
        assert_eq!(azure.api_key, "az");

        let openai = LlmClient::for_provider(Provider::OpenAi, "", &secrets, &config).unwrap();
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(openai.api_key, "");

        let default = LlmClient::for_provider(Provider::default(), "", &secrets, &config).unwrap();
        assert_eq!(default.provider(), Provider::OpenRouter);
        assert_eq!(default.endpoint(), "https://openrouter.ai/api/v1/chat/completions");
    }
}
