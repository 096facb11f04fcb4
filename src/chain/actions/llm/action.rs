use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    ActchainError, Result,
    chain::{
        actions::{ActionOutput, ActionRunner, ActionType, Scope},
        template,
    },
    llm::{ChatMessage, CompletionRequest, LlmClient, MAX_TOKENS_CAP, Provider},
    runtime::Context,
};

/// Asks a chat model for a completion and stores the text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LlmAction {
    #[serde(default)]
    pub provider: Provider,
    /// azure deployment, ignored by the other providers
    #[serde(default)]
    pub deployment_name: String,
    pub models: Vec<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmAction {
    fn request(
        &self,
        ctx: &Context,
        scope: &Scope<'_>,
    ) -> CompletionRequest {
        let messages = self.messages.iter().map(|m| ChatMessage::new(&m.role, &template::resolve_template(ctx, scope.placeholders, &m.content))).collect();

        let mut request = CompletionRequest::new(self.models.clone(), messages);
        request.temperature = self.temperature;
        request.stream = self.stream;
        request.max_tokens = self.max_tokens.unwrap_or(MAX_TOKENS_CAP);
        request
    }
}

#[async_trait]
impl ActionRunner for LlmAction {
    fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["models", "messages"],
            "properties": {
                "provider": {
                    "type": "string",
                    "enum": ["openai", "azure", "openrouter"],
                    "description": "Completion provider, defaults to openrouter"
                },
                "deployment_name": {
                    "type": "string",
                    "description": "Azure deployment name"
                },
                "models": {
                    "type": "array",
                    "minItems": 1,
                    "items": { "type": "string" },
                    "description": "Candidate models, tried in order"
                },
                "messages": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["role", "content"],
                        "properties": {
                            "role": { "type": "string" },
                            "content": { "type": "string" }
                        }
                    },
                    "description": "Chat messages, content supports [[placeholder]] and {{SECRET}} tokens"
                },
                "temperature": { "type": "number" },
                "stream": { "type": "boolean" },
                "max_tokens": { "type": "integer", "minimum": 1 }
            }
        })
    }

    fn action_type(&self) -> ActionType {
        ActionType::Llm
    }

    async fn run(
        &mut self,
        ctx: &Context,
        scope: &Scope<'_>,
    ) -> Result<ActionOutput> {
        let request = self.request(ctx, scope);
        let client = LlmClient::for_provider(self.provider, &self.deployment_name, ctx.secrets(), &ctx.config().llm)?;
        info!("llm action '{}' asking {} for {:?}", scope.id, self.provider, request.models);

        let stream = request.stream;
        let completion = client.completion(request, ctx.cancel_token());
        let collected = completion.collect(|fragment| {
            if stream {
                ctx.emit_log(scope.id, fragment.to_string());
            }
        });

        let text = tokio::select! {
            text = collected => text?,
            _ = ctx.wait_shutdown() => return Err(ActchainError::Activation(format!("activation {} cancelled", ctx.aid()))),
        };
        debug!("llm action '{}' received {} bytes", scope.id, text.len());

        Ok(ActionOutput::store(Value::String(text)))
    }
}
