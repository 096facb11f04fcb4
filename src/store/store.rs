use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::trace;

use crate::{ActchainError, ActionChain, Result, ShareLock, chain::actions::Action as ActionModel, utils};

use super::{DbCollection, DbCollectionIden, StoreIden, data::*};

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

/// Registry of typed collections plus the chain and action codecs on top.
pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Result<Arc<dyn DbCollection<Item = DATA>>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        collections
            .get(&DATA::iden())
            .and_then(|collection| collection.downcast_ref::<DynDbSetRef<DATA>>())
            .map(|v| v.0.clone())
            .ok_or_else(|| ActchainError::Store(format!("fail to get collection: {}", DATA::iden().as_ref())))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DbCollectionIden + 'static,
    {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
    }

    pub fn chains(&self) -> Result<Arc<dyn DbCollection<Item = Chain>>> {
        self.collection()
    }

    pub fn actions(&self) -> Result<Arc<dyn DbCollection<Item = Action>>> {
        self.collection()
    }

    /// Creates or replaces a chain; the stored active flag is taken from `chain`.
    pub fn put_chain(
        &self,
        chain: &ActionChain,
    ) -> Result<bool> {
        trace!("store::put_chain({})", chain.id);
        if chain.id.is_empty() {
            return Err(ActchainError::Chain("missing id in chain".into()));
        }
        let chains = self.chains()?;
        let data = chain.to_json()?;
        match chains.find(&chain.id) {
            Ok(m) => chains.update(&Chain {
                id: chain.id.clone(),
                data,
                active: chain.active,
                create_time: m.create_time,
                update_time: utils::time::time_millis(),
            }),
            Err(_) => chains.create(&Chain {
                id: chain.id.clone(),
                data,
                active: chain.active,
                create_time: utils::time::time_millis(),
                update_time: 0,
            }),
        }
    }

    pub fn get_chain(
        &self,
        id: &str,
    ) -> Result<ActionChain> {
        let record = self.chains()?.find(id)?;
        decode_chain(record)
    }

    pub fn list_chains(&self) -> Result<Vec<ActionChain>> {
        self.chains()?.list()?.into_iter().map(decode_chain).collect()
    }

    /// Chains whose persisted active flag is set.
    pub fn active_chains(&self) -> Result<Vec<ActionChain>> {
        self.chains()?.list()?.into_iter().filter(|c| c.active).map(decode_chain).collect()
    }

    pub fn set_active(
        &self,
        id: &str,
        active: bool,
    ) -> Result<bool> {
        trace!("store::set_active({}, {})", id, active);
        let chains = self.chains()?;
        let mut record = chains.find(id)?;
        if record.active == active {
            return Ok(false);
        }
        record.active = active;
        record.update_time = utils::time::time_millis();
        chains.update(&record)
    }

    pub fn delete_chain(
        &self,
        id: &str,
    ) -> Result<bool> {
        self.chains()?.delete(id)
    }

    pub fn put_action(
        &self,
        action: &ActionModel,
    ) -> Result<bool> {
        trace!("store::put_action({})", action.id);
        if action.id.is_empty() {
            return Err(ActchainError::Action("missing id in action".into()));
        }
        let actions = self.actions()?;
        let data = action.to_json()?;
        match actions.find(&action.id) {
            Ok(m) => actions.update(&Action {
                id: action.id.clone(),
                data,
                create_time: m.create_time,
                update_time: utils::time::time_millis(),
            }),
            Err(_) => actions.create(&Action {
                id: action.id.clone(),
                data,
                create_time: utils::time::time_millis(),
                update_time: 0,
            }),
        }
    }

    /// Loads and decodes an action; stored payloads are validated again.
    pub fn get_action(
        &self,
        id: &str,
    ) -> Result<ActionModel> {
        let record = self.actions()?.find(id)?;
        ActionModel::from_json(&record.data)
    }

    pub fn list_actions(&self) -> Result<Vec<ActionModel>> {
        self.actions()?.list()?.iter().map(|record| ActionModel::from_json(&record.data)).collect()
    }

    pub fn delete_action(
        &self,
        id: &str,
    ) -> Result<bool> {
        self.actions()?.delete(id)
    }
}

// the record flag is authoritative over the flag inside `data`
fn decode_chain(record: Chain) -> Result<ActionChain> {
    let mut chain = ActionChain::from_json(&record.data)?;
    chain.active = record.active;
    Ok(chain)
}
