//! Chain walker.
//!
//! Starting from the trigger's successor, the walker loads each action by id,
//! runs it and follows its `following_action_id` until an action names no
//! successor. The first failing step aborts the walk.

use std::sync::Arc;

use tracing::{debug, error};

use crate::{
    ActchainError, Result,
    chain::actions::Exec,
    events::ActivationEvent,
    runtime::Context,
    store::Store,
};

pub(crate) struct Dispatcher {
    ctx: Context,
    store: Arc<Store>,
}

impl Dispatcher {
    pub fn new(
        ctx: Context,
        store: Arc<Store>,
    ) -> Self {
        Self {
            ctx,
            store,
        }
    }

    /// Walks the chain starting at `first`, returning the number of executed actions.
    pub async fn walk(
        &self,
        first: &str,
    ) -> Result<usize> {
        let mut next = first.to_string();
        let mut executed = 0;

        while !next.is_empty() {
            self.ctx.check_cancelled()?;
            next = self.step(&next).await?;
            executed += 1;
        }
        debug!("activation {} walked {} actions", self.ctx.aid(), executed);
        Ok(executed)
    }

    /// Runs one action and returns the id of its successor.
    async fn step(
        &self,
        id: &str,
    ) -> Result<String> {
        let mut action = self.store.get_action(id).map_err(|e| ActchainError::Chain(format!("failed to load action '{}': {}", id, e)))?;
        let stage = format!("{} action '{}'", action.action_type(), id);

        let ret = tokio::select! {
            ret = action.exec(&self.ctx) => ret,
            _ = self.ctx.wait_shutdown() => Err(ActchainError::Activation(format!("activation {} cancelled", self.ctx.aid()))),
        };

        match ret {
            Ok(()) => {
                self.ctx.emit(id, ActivationEvent::ActionSucceeded);
                Ok(action.following_action_id().to_string())
            }
            Err(err) => {
                let err = err.stage(&stage);
                error!("activation {}: {}", self.ctx.aid(), err);
                self.ctx.emit(id, ActivationEvent::ActionFailed(err.to_string()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::Dispatcher;
    use crate::{
        ActchainError, MemStore, SecretStore,
        chain::actions::Action,
        runtime::test_context,
        store::{DbStore, Store},
    };

    fn store(actions: Vec<serde_json::Value>) -> Arc<Store> {
        let store = Store::new();
        MemStore::new().init(&store);
        for action in actions {
            store.put_action(&Action::from_value(action).unwrap()).unwrap();
        }
        Arc::new(store)
    }

    fn js(
        id: &str,
        source: &str,
        next: &str,
    ) -> serde_json::Value {
        json!({
            "id": id, "type": "code", "language": "javascript", "result_id": id,
            "source_code": source, "following_action_id": next
        })
    }

    #[tokio::test]
    async fn test_walk_follows_links() {
        let store = store(vec![js("one", "console.log(1)", "two"), js("two", "console.log(2)", "")]);
        let ctx = test_context(SecretStore::new());

        let executed = Dispatcher::new(ctx.clone(), store).walk("one").await.unwrap();
        assert_eq!(executed, 2);
        assert_eq!(ctx.result("one"), Some(json!("1")));
        assert_eq!(ctx.result("two"), Some(json!("2")));
    }

    #[tokio::test]
    async fn test_failed_step_aborts_walk() {
        let store = store(vec![
            js("one", "console.log(1)", "two"),
            js("two", "throw new Error('boom')", "three"),
            js("three", "console.log(3)", ""),
        ]);
        let ctx = test_context(SecretStore::new());

        let err = Dispatcher::new(ctx.clone(), store).walk("one").await.unwrap_err();
        assert!(err.to_string().starts_with("failed to execute code action 'two': "));
        assert!(err.to_string().contains("boom"));
        assert_eq!(ctx.result("one"), Some(json!("1")));
        assert_eq!(ctx.result("three"), None);
    }

    #[tokio::test]
    async fn test_branch_redirects_walk() {
        let store = store(vec![
            json!({
                "id": "check", "type": "branch", "condition": "[[x]] == 1",
                "true_action_id": "a", "false_action_id": "b",
                "placeholders": {"x": {"name": "x", "path": []}}
            }),
            js("a", "console.log('A')", ""),
            js("b", "console.log('B')", ""),
        ]);
        let ctx = test_context(SecretStore::new());
        ctx.set_result("x", json!(2));

        Dispatcher::new(ctx.clone(), store).walk("check").await.unwrap();
        assert_eq!(ctx.result("a"), None);
        assert_eq!(ctx.result("b"), Some(json!("B")));
    }

    #[tokio::test]
    async fn test_unknown_action_is_fatal() {
        let store = store(vec![js("one", "console.log(1)", "ghost")]);
        let ctx = test_context(SecretStore::new());

        let err = Dispatcher::new(ctx.clone(), store).walk("one").await.unwrap_err();
        assert!(matches!(err, ActchainError::Chain(ref m) if m.contains("ghost")));
        assert_eq!(ctx.result("one"), Some(json!("1")));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let store = store(vec![js("one", "console.log(1)", "")]);
        let ctx = test_context(SecretStore::new());
        ctx.abort();

        let err = Dispatcher::new(ctx.clone(), store).walk("one").await.unwrap_err();
        assert!(matches!(err, ActchainError::Activation(_)));
        assert_eq!(ctx.result("one"), None);
    }
}
