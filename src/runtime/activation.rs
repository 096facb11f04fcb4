use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::{error, info, warn};

use crate::{
    ActchainError, ActionChain, Config, Result, SecretStore, ShareLock,
    chain::actions::Exec,
    common::{Shutdown, Vars},
    dispatcher::Dispatcher,
    events::ActivationEvent,
    runtime::{Channel, Context},
    store::Store,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
pub enum ActivationState {
    /// Created, not yet started.
    Pending,
    /// Waiting for the trigger to fire.
    Waiting,
    /// Walking the actions.
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl ActivationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivationState::Succeeded | ActivationState::Failed | ActivationState::Aborted)
    }
}

/// One run of a chain: its trigger, then the walk.
pub struct Activation {
    chain: ActionChain,
    ctx: Context,
    store: Arc<Store>,
    state: ShareLock<ActivationState>,
    error: ShareLock<Option<ActchainError>>,
    done: Shutdown,
}

impl fmt::Debug for Activation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Activation").field("id", &self.id()).field("chain_id", &self.chain_id()).field("state", &self.state()).finish()
    }
}

impl Activation {
    pub fn new(
        chain: ActionChain,
        store: Arc<Store>,
        secrets: Arc<SecretStore>,
        config: Arc<Config>,
        channel: Arc<Channel>,
    ) -> Arc<Self> {
        let ctx = Context::new(&chain.id, secrets, config, channel);
        Arc::new(Self {
            chain,
            ctx,
            store,
            state: Arc::new(RwLock::new(ActivationState::Pending)),
            error: Arc::new(RwLock::new(None)),
            done: Shutdown::new(),
        })
    }

    pub fn id(&self) -> &str {
        self.ctx.aid()
    }

    pub fn chain_id(&self) -> &str {
        &self.chain.id
    }

    pub fn state(&self) -> ActivationState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    /// The error that ended the activation, if any.
    pub fn error(&self) -> Option<ActchainError> {
        self.error.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Snapshot of the results stored so far.
    pub fn results(&self) -> Vars {
        self.ctx.results()
    }

    pub fn abort(&self) {
        self.ctx.abort();
    }

    /// Resolves once the activation reached a terminal state.
    pub async fn wait(&self) {
        self.done.wait().await
    }

    /// Runs the trigger and the walk to completion.
    pub(crate) async fn run(&self) {
        info!("activation {} of chain {} started", self.id(), self.chain.id);
        self.ctx.emit(&self.chain.trigger.id, ActivationEvent::Started);

        match self.execute().await {
            Ok(()) => {
                info!("activation {} succeeded", self.id());
                self.ctx.emit("", ActivationEvent::Succeeded);
                self.set_state(ActivationState::Succeeded);
            }
            Err(err) if self.ctx.is_cancelled() => {
                warn!("activation {} aborted: {}", self.id(), err);
                self.ctx.emit("", ActivationEvent::Aborted(err.to_string()));
                self.finish_with(ActivationState::Aborted, err);
            }
            Err(err) => {
                error!("activation {} failed: {}", self.id(), err);
                self.ctx.emit("", ActivationEvent::Failed(err.to_string()));
                self.finish_with(ActivationState::Failed, err);
            }
        }
        self.done.shutdown();
    }

    async fn execute(&self) -> Result<()> {
        self.set_state(ActivationState::Waiting);
        let mut trigger = self.chain.trigger.clone();
        trigger.exec(&self.ctx).await.map_err(|e| e.stage(&format!("{} trigger '{}'", trigger.trigger_type(), trigger.id)))?;
        self.ctx.emit(&trigger.id, ActivationEvent::TriggerFired);

        self.set_state(ActivationState::Running);
        Dispatcher::new(self.ctx.clone(), self.store.clone()).walk(trigger.following_action_id()).await?;
        Ok(())
    }

    fn set_state(
        &self,
        state: ActivationState,
    ) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn finish_with(
        &self,
        state: ActivationState,
        err: ActchainError,
    ) {
        *self.error.write().unwrap_or_else(PoisonError::into_inner) = Some(err);
        self.set_state(state);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use serde_json::json;

    use super::{Activation, ActivationState};
    use crate::{
        ActionChain, ActivationEvent, Config, MemStore, SecretStore,
        chain::actions::Action,
        runtime::{Channel, ChannelEvent, ChannelOptions},
        store::{DbStore, Store},
    };

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }

    fn setup(port: u16) -> (ActionChain, Arc<Store>) {
        let store = Store::new();
        MemStore::new().init(&store);
        store
            .put_action(
                &Action::from_value(json!({
                    "id": "greet", "type": "code", "language": "javascript", "result_id": "greeting",
                    "source_code": "console.log('hello [[who]]')",
                    "placeholders": {"who": {"name": "event", "path": ["name"]}}
                }))
                .unwrap(),
            )
            .unwrap();

        let chain = ActionChain::from_json(
            &json!({
                "id": "hello",
                "trigger": {
                    "id": "hook", "type": "webhook", "url": format!("http://127.0.0.1:{}/hello", port),
                    "result_id": "event", "following_action_id": "greet"
                }
            })
            .to_string(),
        )
        .unwrap();
        (chain, Arc::new(store))
    }

    async fn fire(
        port: u16,
        body: serde_json::Value,
    ) {
        let client = reqwest::Client::new();
        for _ in 0..100 {
            if client.post(format!("http://127.0.0.1:{}/hello", port)).json(&body).send().await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("webhook never came up");
    }

    #[tokio::test]
    async fn test_activation_runs_trigger_then_walk() {
        let port = free_port();
        let (chain, store) = setup(port);
        let channel = Arc::new(Channel::new());
        channel.listen(&tokio::runtime::Handle::current());

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_chain("hello")).unwrap().on_event(move |e| {
            seen.lock().unwrap().push(e.event.clone());
        });

        let activation = Activation::new(chain, store, Arc::new(SecretStore::new()), Arc::new(Config::default()), channel);
        assert_eq!(activation.state(), ActivationState::Pending);

        let running = activation.clone();
        tokio::spawn(async move { running.run().await });
        fire(port, json!({"name": "ada"})).await;
        tokio::time::timeout(Duration::from_secs(5), activation.wait()).await.unwrap();

        assert_eq!(activation.state(), ActivationState::Succeeded);
        assert_eq!(activation.results().value("greeting"), Some(&json!("hello ada")));
        assert!(activation.error().is_none());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let events = events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![ActivationEvent::Started, ActivationEvent::TriggerFired, ActivationEvent::ActionSucceeded, ActivationEvent::Succeeded]
        );
    }

    #[tokio::test]
    async fn test_abort_while_waiting() {
        let (chain, store) = setup(free_port());
        let activation = Activation::new(chain, store, Arc::new(SecretStore::new()), Arc::new(Config::default()), Arc::new(Channel::new()));

        let running = activation.clone();
        tokio::spawn(async move { running.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        activation.abort();
        tokio::time::timeout(Duration::from_secs(5), activation.wait()).await.unwrap();

        assert_eq!(activation.state(), ActivationState::Aborted);
        assert!(activation.is_complete());
        assert!(activation.error().unwrap().to_string().contains("cancelled"));
    }
}
