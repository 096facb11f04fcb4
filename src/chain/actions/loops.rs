use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Result,
    chain::{
        actions::{Action, ActionOutput, ActionRunner, ActionType, Exec, Scope},
        condition, template,
    },
    runtime::Context,
};

/// Runs a nested action until the stop condition holds.
///
/// The child always runs at least once and there is no iteration cap; the
/// activation's cancellation is checked before every iteration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoopAction {
    pub action: Box<Action>,
    pub condition: String,
}

#[async_trait]
impl ActionRunner for LoopAction {
    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["action", "condition"],
            "properties": {
                "action": {
                    "type": "object",
                    "required": ["id", "type"],
                    "description": "Action executed on every iteration"
                },
                "condition": {
                    "type": "string",
                    "description": "Stop condition evaluated after each iteration"
                }
            }
        })
    }

    fn action_type(&self) -> ActionType {
        ActionType::Loop
    }

    async fn run(
        &mut self,
        ctx: &Context,
        scope: &Scope<'_>,
    ) -> Result<ActionOutput> {
        let mut iteration = 0usize;
        loop {
            ctx.check_cancelled()?;
            iteration += 1;
            self.action.exec(ctx).await?;

            let condition = template::resolve_template(ctx, scope.placeholders, &self.condition);
            if condition::evaluate(&condition)? {
                debug!("loop '{}' stopped after {} iterations", scope.id, iteration);
                return Ok(ActionOutput::none());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        ActchainError, SecretStore,
        chain::actions::{Action, Exec},
        runtime::test_context,
    };

    fn counter_loop(condition: &str) -> Action {
        Action::from_value(json!({
            "id": "repeat",
            "type": "loop",
            "condition": condition,
            "following_action_id": "after",
            "placeholders": {"n": {"name": "n"}},
            "action": {
                "id": "inc",
                "type": "code",
                "language": "javascript",
                "source_code": "console.log([[n]] + 1)",
                "result_id": "n",
                "placeholders": {"n": {"name": "n"}}
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_loop_runs_until_condition() {
        let ctx = test_context(SecretStore::new());
        ctx.set_result("n", json!(0));

        let mut action = counter_loop("[[n]] == 3");
        action.exec(&ctx).await.unwrap();

        // the script output is stored as text, one increment per iteration
        assert_eq!(ctx.result("n"), Some(json!("3")));
        assert_eq!(action.following_action_id(), "after");
    }

    #[tokio::test]
    async fn test_loop_condition_error_aborts() {
        let ctx = test_context(SecretStore::new());
        ctx.set_result("n", json!(0));

        let mut action = counter_loop("[[n]] > done");
        let err = action.exec(&ctx).await.unwrap_err();
        assert!(matches!(err, ActchainError::Evaluation(_)));
        assert_eq!(ctx.result("n"), Some(json!("1")));
    }

    #[tokio::test]
    async fn test_loop_child_error_aborts() {
        let ctx = test_context(SecretStore::new());
        let mut action = Action::from_value(json!({
            "id": "repeat", "type": "loop", "condition": "1 == 1",
            "action": {"id": "boom", "type": "code", "language": "javascript", "source_code": "throw new Error('nope')"}
        }))
        .unwrap();

        let err = action.exec(&ctx).await.unwrap_err();
        assert!(matches!(err, ActchainError::Script(_)));
    }

    #[tokio::test]
    async fn test_loop_observes_cancellation() {
        let ctx = test_context(SecretStore::new());
        ctx.set_result("n", json!(0));
        ctx.abort();

        let mut action = counter_loop("[[n]] == 3");
        assert!(matches!(action.exec(&ctx).await.unwrap_err(), ActchainError::Activation(_)));
        assert_eq!(ctx.result("n"), Some(json!(0)));
    }
}
