use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Result,
    chain::{
        actions::{ActionOutput, ActionRunner, ActionType, Scope},
        condition, template,
    },
    runtime::Context,
};

/// Picks the next action from a condition; stores nothing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BranchAction {
    pub condition: String,
    #[serde(default)]
    pub true_action_id: String,
    #[serde(default)]
    pub false_action_id: String,
}

#[async_trait]
impl ActionRunner for BranchAction {
    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["condition"],
            "properties": {
                "condition": {
                    "type": "string",
                    "description": "Comparison '<left> <operator> <right>', supports [[placeholder]] and {{SECRET}} tokens"
                },
                "true_action_id": { "type": "string" },
                "false_action_id": { "type": "string" }
            }
        })
    }

    fn action_type(&self) -> ActionType {
        ActionType::Branch
    }

    async fn run(
        &mut self,
        ctx: &Context,
        scope: &Scope<'_>,
    ) -> Result<ActionOutput> {
        let condition = template::resolve_template(ctx, scope.placeholders, &self.condition);
        let taken = condition::evaluate(&condition)?;
        debug!("branch '{}': '{}' is {}", scope.id, condition, taken);

        let next = if taken {
            self.true_action_id.clone()
        } else {
            self.false_action_id.clone()
        };
        Ok(ActionOutput::redirect(next))
    }
}
