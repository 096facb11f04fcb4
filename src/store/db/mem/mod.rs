mod collect;

use std::sync::Arc;

use crate::store::{DbCollection, DbStore, Store, data::*};

use collect::Collect;

/// Keeps every collection in process memory; contents are lost on drop.
#[derive(Debug, Clone)]
pub struct MemStore {
    chains: Arc<Collect<Chain>>,
    actions: Arc<Collect<Action>>,
}

/// Record stored in a [`Collect`].
pub trait DbDocument: Clone + Send + Sync {
    fn id(&self) -> &str;
}

impl DbDocument for Chain {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbDocument for Action {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) {
        s.register(self.chains());
        s.register(self.actions());
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            chains: Arc::new(Collect::new("chains")),
            actions: Arc::new(Collect::new("actions")),
        }
    }

    pub fn chains(&self) -> Arc<dyn DbCollection<Item = Chain> + Send + Sync> {
        self.chains.clone()
    }

    pub fn actions(&self) -> Arc<dyn DbCollection<Item = Action> + Send + Sync> {
        self.actions.clone()
    }
}
