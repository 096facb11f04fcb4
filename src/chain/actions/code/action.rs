use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ActchainError, Result,
    chain::{
        actions::{ActionOutput, ActionRunner, ActionType, Scope},
        template,
    },
    runtime::Context,
};

use super::code_executor::{CodeLanguage, JavascriptExecutor, ProcessExecutor};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CodeAction {
    pub language: CodeLanguage,
    pub source_code: String,
}

#[async_trait]
impl ActionRunner for CodeAction {
    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["language", "source_code"],
            "properties": {
                "language": {
                    "type": "string",
                    "enum": ["python", "bash", "javascript"],
                    "description": "Programming language of the code"
                },
                "source_code": {
                    "type": "string",
                    "description": "Code to execute, supports [[placeholder]] and {{SECRET}} tokens. Whatever it prints becomes the result"
                }
            }
        })
    }

    fn action_type(&self) -> ActionType {
        ActionType::Code
    }

    async fn run(
        &mut self,
        ctx: &Context,
        scope: &Scope<'_>,
    ) -> Result<ActionOutput> {
        let code = template::resolve_template(ctx, scope.placeholders, &self.source_code);

        let output = match self.language {
            CodeLanguage::Python => ProcessExecutor::execute(&ctx.config().code.python, &code).await?,
            CodeLanguage::Bash => ProcessExecutor::execute(&ctx.config().code.bash, &code).await?,
            CodeLanguage::Javascript => tokio::task::spawn_blocking(move || JavascriptExecutor::execute(&code))
                .await
                .map_err(|e| ActchainError::Script(format!("javascript task failed: {}", e)))??,
        };

        let output = output.trim_end().to_string();
        if !output.is_empty() {
            ctx.emit_log(scope.id, output.clone());
        }
        Ok(ActionOutput::store(Value::String(output)))
    }
}
