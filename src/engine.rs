//! Chain engine - the main entry point for Actchain.
//!
//! The engine manages the lifecycle of chains and their activations, including:
//! - Storing chain and action definitions
//! - Activating chains and tracking the run in flight per chain
//! - Re-arming active chains from the monitor
//! - Graceful shutdown coordination

mod monitor;

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};

use crate::{
    ActchainError, ActionChain, Config, Result, SecretStore,
    chain::actions::Action,
    common::{MemCache, Queue, Shutdown},
    runtime::{Activation, Channel},
    store::{DbStore, Store},
};

use monitor::Monitor;

/// Maximum number of in-flight activations tracked in memory.
const ACTIVATION_CACHE_SIZE: usize = 2048;
/// Size of the queue for finished activation notifications.
const ACTIVATION_DONE_QUEUE_SIZE: usize = 100;

/// Starts activations, keeping at most one in flight per chain.
struct Launcher {
    store: Arc<Store>,
    secrets: Arc<SecretStore>,
    config: Arc<Config>,
    channel: Arc<Channel>,
    /// chain id to its latest activation
    activations: MemCache<String, Arc<Activation>>,
    /// (chain id, activation id) of finished activations
    done_queue: Arc<Queue<(String, String)>>,
    runtime: Handle,
    /// held across every check-then-start and active flag change
    lock: Mutex<()>,
}

impl Launcher {
    fn new(
        store: Arc<Store>,
        secrets: Arc<SecretStore>,
        config: Arc<Config>,
        channel: Arc<Channel>,
        runtime: Handle,
    ) -> Self {
        Self {
            store,
            secrets,
            config,
            channel,
            activations: MemCache::new(ACTIVATION_CACHE_SIZE),
            done_queue: Queue::new(ACTIVATION_DONE_QUEUE_SIZE),
            runtime,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(
        &self,
        chain_id: &str,
    ) -> Option<Arc<Activation>> {
        self.activations.get(&chain_id.to_string()).filter(|a| !a.is_complete())
    }

    /// Marks the chain active and returns its activation in flight,
    /// starting one when there is none.
    fn activate(
        &self,
        id: &str,
    ) -> Result<Arc<Activation>> {
        let _guard = self.guard();
        let mut chain = self.store.get_chain(id)?;
        self.store.set_active(id, true)?;
        chain.active = true;

        if let Some(activation) = self.in_flight(id) {
            debug!("chain {} already has activation {} in flight", id, activation.id());
            return Ok(activation);
        }
        Ok(self.start(chain))
    }

    /// Starts an activation if the chain is still active and has nothing in flight.
    fn rearm(
        &self,
        id: &str,
    ) -> Result<Option<Arc<Activation>>> {
        let _guard = self.guard();
        if self.in_flight(id).is_some() {
            return Ok(None);
        }
        let chain = self.store.get_chain(id)?;
        if !chain.active {
            return Ok(None);
        }
        Ok(Some(self.start(chain)))
    }

    /// Clears the active flag and aborts the activation in flight.
    fn deactivate(
        &self,
        id: &str,
    ) -> Result<()> {
        let _guard = self.guard();
        self.store.set_active(id, false)?;
        if let Some(activation) = self.in_flight(id) {
            info!("cancelling activation {} of chain {}", activation.id(), id);
            activation.abort();
        }
        Ok(())
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let _guard = self.guard();
        if let Some(activation) = self.in_flight(id) {
            activation.abort();
        }
        self.store.delete_chain(id)
    }

    // callers hold the guard
    fn start(
        &self,
        chain: ActionChain,
    ) -> Arc<Activation> {
        let chain_id = chain.id.clone();
        let activation = Activation::new(chain, self.store.clone(), self.secrets.clone(), self.config.clone(), self.channel.clone());
        self.activations.set(chain_id.clone(), activation.clone());

        let running = activation.clone();
        let done_queue = self.done_queue.clone();
        self.runtime.spawn(async move {
            running.run().await;
            // a full queue only delays the cleanup, in_flight skips finished runs
            if let Err(err) = done_queue.send((chain_id, running.id().to_string())) {
                debug!("dropped finished notification: {}", err);
            }
        });
        activation
    }

    /// Drops the cache entry unless a newer activation replaced it.
    fn finished(
        &self,
        chain_id: &str,
        aid: &str,
    ) {
        let _guard = self.guard();
        let key = chain_id.to_string();
        if self.activations.get(&key).is_some_and(|a| a.id() == aid) {
            self.activations.remove(&key);
        }
    }
}

/// The main chain engine.
///
/// Engine is the central coordinator for Actchain, responsible for:
/// - Managing the tokio runtime for async execution
/// - Coordinating the event channel for pub/sub messaging
/// - Storing chain and action definitions
/// - Activating and deactivating chains
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().build()?;
/// engine.launch();
///
/// engine.put_action(&action)?;
/// engine.put_chain(&chain)?;
/// let activation = engine.activate(&chain.id)?;
///
/// // Shutdown when done
/// engine.shutdown();
/// ```
pub struct Engine {
    config: Arc<Config>,
    secrets: Arc<SecretStore>,
    /// Event channel for broadcasting activation events.
    channel: Arc<Channel>,
    /// Storage for chains and actions.
    store: Arc<Store>,
    launcher: Arc<Launcher>,
    /// Background sweep re-activating active chains.
    monitor: Monitor,

    /// Flag indicating if the engine is running.
    running: Arc<AtomicBool>,
    /// Tokio runtime for async task execution.
    runtime: Arc<Runtime>,
    /// Shutdown coordinator for graceful termination.
    shutdown: Arc<Shutdown>,
}

impl Engine {
    pub(crate) fn new(
        config: Config,
        runtime: Arc<Runtime>,
        secrets: SecretStore,
        db: &dyn DbStore,
    ) -> Self {
        let store = Store::new();
        db.init(&store);

        let config = Arc::new(config);
        let secrets = Arc::new(secrets);
        let store = Arc::new(store);
        let channel = Arc::new(Channel::new());
        let shutdown = Arc::new(Shutdown::new());

        let launcher = Arc::new(Launcher::new(store.clone(), secrets.clone(), config.clone(), channel.clone(), runtime.handle().clone()));
        let monitor = Monitor::new(store.clone(), launcher.clone(), config.monitor.interval(), shutdown.clone());

        Self {
            config,
            secrets,
            channel,
            store,
            launcher,
            monitor,
            running: Arc::new(AtomicBool::new(false)),
            runtime,
            shutdown,
        }
    }

    /// Starts the engine.
    ///
    /// This method:
    /// - Begins listening on the event channel
    /// - Starts the monitor sweep over active chains
    /// - Spawns a background task to forget finished activations
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }
        info!("engine launched");

        self.channel.listen(self.runtime.handle());
        self.monitor.monitor(&self.runtime);

        let launcher = self.launcher.clone();
        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some((chain_id, aid)) = launcher.done_queue.next_async() => {
                        launcher.finished(&chain_id, &aid);
                    }
                }
            }
        });
    }

    /// Gracefully shuts down the engine.
    ///
    /// This method:
    /// - Signals all background tasks to stop
    /// - Aborts all in-flight activations
    /// - Shuts down the event channel
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }
        info!("engine shutting down");

        self.shutdown.shutdown();
        for (_, activation) in self.launcher.activations.iter() {
            activation.abort();
        }
        self.channel.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Creates or replaces a chain definition.
    pub fn put_chain(
        &self,
        chain: &ActionChain,
    ) -> Result<bool> {
        self.store.put_chain(chain)
    }

    pub fn get_chain(
        &self,
        id: &str,
    ) -> Result<ActionChain> {
        self.store.get_chain(id)
    }

    pub fn list_chains(&self) -> Result<Vec<ActionChain>> {
        self.store.list_chains()
    }

    /// Deletes a chain, cancelling its activation in flight.
    pub fn delete_chain(
        &self,
        id: &str,
    ) -> Result<bool> {
        self.launcher.delete(id)
    }

    pub fn put_action(
        &self,
        action: &Action,
    ) -> Result<bool> {
        self.store.put_action(action)
    }

    pub fn get_action(
        &self,
        id: &str,
    ) -> Result<Action> {
        self.store.get_action(id)
    }

    pub fn list_actions(&self) -> Result<Vec<Action>> {
        self.store.list_actions()
    }

    pub fn delete_action(
        &self,
        id: &str,
    ) -> Result<bool> {
        self.store.delete_action(id)
    }

    /// Marks the chain active and starts an activation.
    ///
    /// When the chain already has an activation in flight, that activation
    /// is returned instead of starting a second one.
    pub fn activate(
        &self,
        id: &str,
    ) -> Result<Arc<Activation>> {
        if !self.is_running() {
            return Err(ActchainError::Engine("engine is not running".to_string()));
        }
        self.launcher.activate(id)
    }

    /// Clears the active flag and cancels the activation in flight.
    pub fn deactivate(
        &self,
        id: &str,
    ) -> Result<()> {
        self.launcher.deactivate(id)
    }

    /// The activation in flight for a chain.
    pub fn get_activation(
        &self,
        chain_id: &str,
    ) -> Option<Arc<Activation>> {
        self.launcher.in_flight(chain_id)
    }

    pub fn secrets(&self) -> Arc<SecretStore> {
        self.secrets.clone()
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    pub fn runtime(&self) -> Arc<Runtime> {
        self.runtime.clone()
    }
}
