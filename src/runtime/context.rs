use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use serde_json::Value;

use crate::{
    ActchainError, Config, Result, SecretStore, ShareLock,
    common::{Shutdown, Vars},
    events::{ActivationEvent, Log, Message},
    runtime::Channel,
    utils,
};

/// Run-scoped state of one activation.
///
/// Results are written by one step at a time; the lock only guards readers on
/// other tasks (event handlers, `Activation::results`).
#[derive(Clone)]
pub struct Context {
    aid: String,
    chain_id: String,
    results: ShareLock<Vars>,
    secrets: Arc<SecretStore>,
    config: Arc<Config>,
    http: reqwest::Client,
    channel: Arc<Channel>,

    shutdown: Arc<Shutdown>,
}

impl Context {
    pub fn new(
        chain_id: &str,
        secrets: Arc<SecretStore>,
        config: Arc<Config>,
        channel: Arc<Channel>,
    ) -> Self {
        Self {
            aid: utils::longid(),
            chain_id: chain_id.to_string(),
            results: Arc::new(RwLock::new(Vars::new())),
            secrets,
            config,
            http: reqwest::Client::new(),
            channel,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn aid(&self) -> &str {
        &self.aid
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared outbound client; requests made through it have no timeout.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    pub fn result(
        &self,
        id: &str,
    ) -> Option<Value> {
        self.read_results().value(id).cloned()
    }

    pub fn set_result(
        &self,
        id: &str,
        value: Value,
    ) {
        self.results.write().unwrap_or_else(PoisonError::into_inner).set(id, value);
    }

    /// Snapshot of every stored result.
    pub fn results(&self) -> Vars {
        self.read_results().clone()
    }

    pub(crate) fn read_results(&self) -> RwLockReadGuard<'_, Vars> {
        self.results.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn emit(
        &self,
        action_id: &str,
        event: ActivationEvent,
    ) {
        self.channel.send_event(Message {
            aid: self.aid.clone(),
            chain_id: self.chain_id.clone(),
            action_id: action_id.to_string(),
            event,
        });
    }

    pub fn emit_log(
        &self,
        action_id: &str,
        content: String,
    ) {
        self.channel.send_log(Log {
            aid: self.aid.clone(),
            chain_id: self.chain_id.clone(),
            action_id: action_id.to_string(),
            content,
            timestamp: utils::time::time_millis(),
        });
    }

    /// Cancels the activation; running steps observe it at their next checkpoint.
    pub fn abort(&self) {
        self.shutdown.shutdown();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_terminated()
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ActchainError::Activation(format!("activation {} cancelled", self.aid)));
        }
        Ok(())
    }

    pub fn cancel_token(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    pub fn wait_shutdown(&self) -> impl Future<Output = ()> + Send + 'static {
        self.shutdown.wait()
    }
}

#[cfg(test)]
pub(crate) fn test_context(secrets: SecretStore) -> Context {
    Context::new("test-chain", Arc::new(secrets), Arc::new(Config::default()), Arc::new(Channel::new()))
}
