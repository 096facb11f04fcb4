use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::{
    ActchainError, Config, Engine, Result, SecretStore,
    store::{DbStore, MemStore},
};

pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    secrets: Option<SecretStore>,
    store: Option<Box<dyn DbStore>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            rt: None,
            secrets: None,
            store: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    /// Uses `secrets` instead of loading the configured env file.
    pub fn secrets(
        mut self,
        secrets: SecretStore,
    ) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Storage backend, defaults to [`MemStore`].
    pub fn store(
        mut self,
        store: impl DbStore + 'static,
    ) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn build(self) -> Result<Engine> {
        if self.config.async_worker_thread_number == 0 {
            return Err(ActchainError::Config("async_worker_thread_number must be at least 1".to_string()));
        }

        let runtime = match self.rt {
            Some(rt) => rt,
            None => Arc::new(
                Builder::new_multi_thread()
                    .worker_threads(self.config.async_worker_thread_number.into())
                    .enable_all()
                    .build()
                    .map_err(|e| ActchainError::Engine(format!("failed to build runtime: {}", e)))?,
            ),
        };
        let secrets = match (self.secrets, &self.config.secrets.env_file) {
            (Some(secrets), _) => secrets,
            (None, Some(path)) => SecretStore::from_env_file(path)?,
            (None, None) => SecretStore::new(),
        };
        let store = self.store.unwrap_or_else(|| Box::new(MemStore::new()));

        Ok(Engine::new(self.config, runtime, secrets, store.as_ref()))
    }
}
