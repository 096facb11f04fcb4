pub mod branch;
pub mod code;
pub mod http_request;
pub mod llm;
pub mod loops;

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{ActchainError, Result, chain::Placeholders, runtime::Context};

pub use branch::BranchAction;
pub use code::CodeAction;
pub use http_request::HttpAction;
pub use llm::LlmAction;
pub use loops::LoopAction;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    Http,
    Llm,
    Code,
    Branch,
    Loop,
}

impl ActionType {
    /// Returns the parameter schema of the variant.
    pub fn schema(&self) -> Value {
        match self {
            ActionType::Http => HttpAction::schema(),
            ActionType::Llm => LlmAction::schema(),
            ActionType::Code => CodeAction::schema(),
            ActionType::Branch => BranchAction::schema(),
            ActionType::Loop => LoopAction::schema(),
        }
    }
}

/// Behaviour shared by every action variant.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// Returns the JSON schema the variant's parameters are validated against.
    ///
    /// # Returns
    ///
    /// Returns a [`serde_json::Value`] representing the schema of the action.
    fn schema() -> Value
    where
        Self: Sized;

    /// Returns the [`ActionType`] of the action.
    fn action_type(&self) -> ActionType;

    /// Runs the action once.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The [`Context`] of the activation.
    /// * `scope` - Identity and placeholders of the enclosing [`Action`].
    ///
    /// # Returns
    ///
    /// Returns an [`ActionOutput`] carrying the value to store and, for
    /// redirecting actions, the id of the next action.
    async fn run(
        &mut self,
        ctx: &Context,
        scope: &Scope<'_>,
    ) -> Result<ActionOutput>;
}

/// Fields of the enclosing [`Action`] a variant needs while running.
pub struct Scope<'a> {
    pub id: &'a str,
    pub placeholders: &'a Placeholders,
}

/// Output returned by an action's run method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutput {
    /// value stored under the action's result id
    pub value: Option<Value>,
    /// overrides the action's following action id
    pub next: Option<String>,
}

impl ActionOutput {
    pub fn store(value: Value) -> Self {
        Self {
            value: Some(value),
            next: None,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn redirect(next: String) -> Self {
        Self {
            value: None,
            next: Some(next),
        }
    }
}

/// Uniform execution contract of a chain step.
#[async_trait]
pub trait Exec: Send + Sync {
    /// Runs the step against `ctx`, storing its output under `result_id`.
    async fn exec(
        &mut self,
        ctx: &Context,
    ) -> Result<()>;

    /// Key under which the output is stored; empty discards it.
    fn result_id(&self) -> &str;

    /// Id of the step to run next; empty ends the walk.
    fn following_action_id(&self) -> &str;
}

/// One step of a chain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Action {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub result_id: String,
    #[serde(default)]
    pub following_action_id: String,
    #[serde(default)]
    pub placeholders: Placeholders,
    #[serde(flatten)]
    pub kind: ActionKind,
}

/// Variant parameters, discriminated by `type`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Http(HttpAction),
    Llm(LlmAction),
    Code(CodeAction),
    Branch(BranchAction),
    Loop(LoopAction),
}

impl ActionKind {
    pub fn action_type(&self) -> ActionType {
        self.runner().action_type()
    }

    fn runner(&self) -> &dyn ActionRunner {
        match self {
            ActionKind::Http(a) => a,
            ActionKind::Llm(a) => a,
            ActionKind::Code(a) => a,
            ActionKind::Branch(a) => a,
            ActionKind::Loop(a) => a,
        }
    }

    fn runner_mut(&mut self) -> &mut dyn ActionRunner {
        match self {
            ActionKind::Http(a) => a,
            ActionKind::Llm(a) => a,
            ActionKind::Code(a) => a,
            ActionKind::Branch(a) => a,
            ActionKind::Loop(a) => a,
        }
    }
}

impl Action {
    pub fn from_json(s: &str) -> Result<Self> {
        let value = serde_json::from_str::<Value>(s).map_err(|e| ActchainError::Decode(e.to_string()))?;
        Self::from_value(value)
    }

    /// Decodes an action, validating its parameters against the variant schema first.
    pub fn from_value(value: Value) -> Result<Self> {
        Self::validate(&value)?;
        serde_json::from_value::<Self>(value).map_err(|e| ActchainError::Decode(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn action_type(&self) -> ActionType {
        self.kind.action_type()
    }

    fn validate(value: &Value) -> Result<ActionType> {
        let action_type = value.get("type").and_then(Value::as_str).ok_or_else(|| ActchainError::Decode("missing action type".to_string()))?;
        let action_type = ActionType::from_str(action_type).map_err(|_| ActchainError::Decode(format!("unknown action type '{}'", action_type)))?;

        if value.get("id").and_then(Value::as_str).is_none() {
            return Err(ActchainError::Decode(format!("{} action is missing its id", action_type)));
        }
        jsonschema::validate(&action_type.schema(), value)?;

        if action_type == ActionType::Loop {
            if let Some(child) = value.get("action") {
                Self::validate(child)?;
            }
        }
        Ok(action_type)
    }
}

#[async_trait]
impl Exec for Action {
    async fn exec(
        &mut self,
        ctx: &Context,
    ) -> Result<()> {
        debug!("exec {} action '{}'", self.action_type(), self.id);
        let scope = Scope {
            id: &self.id,
            placeholders: &self.placeholders,
        };
        let output = self.kind.runner_mut().run(ctx, &scope).await?;

        match output.value {
            Some(value) if !self.result_id.is_empty() => ctx.set_result(&self.result_id, value),
            _ => {}
        }
        if let Some(next) = output.next {
            self.following_action_id = next;
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

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Action, ActionKind, ActionType};
    use crate::{ActchainError, chain::Placeholder};

    #[test]
    fn test_round_trip_every_variant() {
        let actions = vec![
            json!({
                "id": "fetch", "type": "http", "description": "get user",
                "result_id": "user", "following_action_id": "summarize",
                "method": "POST", "url": "https://api.example.com/users",
                "headers": {"Content-Type": "application/json"}, "body": "{\"id\": [[uid]]}",
                "placeholders": {"uid": {"name": "event", "path": ["user", "id"]}}
            }),
            json!({
                "id": "summarize", "type": "llm", "result_id": "summary",
                "provider": "azure", "deployment_name": "gpt4", "models": ["gpt-4o", "gpt-4o-mini"],
                "messages": [{"role": "user", "content": "summarize [[user]]"}],
                "temperature": 0.2, "stream": true, "max_tokens": 512
            }),
            json!({"id": "ask", "type": "llm", "models": ["m1"], "messages": [{"role": "user", "content": "hi"}]}),
            json!({"id": "script", "type": "code", "language": "python", "source_code": "print(1)"}),
            json!({"id": "check", "type": "branch", "condition": "[[n]] > 3", "true_action_id": "a", "false_action_id": "b"}),
            json!({
                "id": "repeat", "type": "loop", "condition": "[[n]] == 3",
                "action": {"id": "inc", "type": "code", "language": "javascript", "source_code": "console.log(1)"}
            }),
            json!({
                "id": "retry", "type": "loop", "condition": "[[answer]] == yes",
                "action": {"id": "ask", "type": "llm", "models": ["m1"], "messages": [{"role": "user", "content": "ready?"}]}
            }),
        ];

        for value in actions {
            let action = Action::from_value(value).unwrap();
            let decoded = Action::from_json(&action.to_json().unwrap()).unwrap();
            assert_eq!(action, decoded);
        }
    }

    #[test]
    fn test_decode_fields() {
        let action = Action::from_value(json!({
            "id": "fetch", "type": "http", "url": "http://x", "method": "GET",
            "placeholders": {"uid": {"name": "event", "next": {"name": "id"}}}
        }))
        .unwrap();

        assert_eq!(action.action_type(), ActionType::Http);
        assert_eq!(action.result_id, "");
        assert_eq!(action.following_action_id, "");
        assert_eq!(action.placeholders["uid"], Placeholder::new("event", &["id"]));
        assert!(matches!(action.kind, ActionKind::Http(_)));
    }

    #[test]
    fn test_unknown_type_is_decode_error() {
        let err = Action::from_value(json!({"id": "x", "type": "email"})).unwrap_err();
        assert_eq!(err, ActchainError::Decode("unknown action type 'email'".to_string()));
        assert!(matches!(Action::from_value(json!({"id": "x"})).unwrap_err(), ActchainError::Decode(_)));
    }

    #[test]
    fn test_missing_parameters_are_decode_errors() {
        let missing_url = Action::from_value(json!({"id": "x", "type": "http", "method": "GET"}));
        assert!(matches!(missing_url.unwrap_err(), ActchainError::Decode(_)));

        let bad_language = Action::from_value(json!({"id": "x", "type": "code", "language": "ruby", "source_code": ""}));
        assert!(matches!(bad_language.unwrap_err(), ActchainError::Decode(_)));

        let bad_child = Action::from_value(json!({
            "id": "l", "type": "loop", "condition": "1 == 1",
            "action": {"id": "c", "type": "branch", "true_action_id": "a", "false_action_id": "b"}
        }));
        assert!(matches!(bad_child.unwrap_err(), ActchainError::Decode(_)));

        assert!(matches!(Action::from_json("{not json").unwrap_err(), ActchainError::Decode(_)));
    }
}
