use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::trace;

use crate::{ActchainError, Result, ShareLock, store::DbCollection};

use super::DbDocument;

#[derive(Debug)]
pub struct Collect<T> {
    name: String,
    items: ShareLock<BTreeMap<String, T>>,
}

impl<T> Collect<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl<T: DbDocument> DbCollection for Collect<T> {
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        Ok(self.items.read().unwrap_or_else(PoisonError::into_inner).contains_key(id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| ActchainError::Store(format!("can't find {} record '{}'", self.name, id)))
    }

    fn list(&self) -> Result<Vec<Self::Item>> {
        Ok(self.items.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect())
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::create({})", self.name, data.id());
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if items.contains_key(data.id()) {
            return Err(ActchainError::Store(format!("{} record '{}' already exists", self.name, data.id())));
        }
        items.insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::update({})", self.name, data.id());
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        match items.get_mut(data.id()) {
            Some(item) => {
                *item = data.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("{}::delete({})", self.name, id);
        Ok(self.items.write().unwrap_or_else(PoisonError::into_inner).remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::Collect;
    use crate::store::{DbCollection, data::Action};

    fn record(
        id: &str,
        data: &str,
    ) -> Action {
        Action {
            id: id.to_string(),
            data: data.to_string(),
            create_time: 1,
            update_time: 0,
        }
    }

    #[test]
    fn test_crud() {
        let collect = Collect::<Action>::new("actions");
        assert!(collect.create(&record("b", "{}")).unwrap());
        assert!(collect.create(&record("a", "{}")).unwrap());
        assert!(collect.create(&record("a", "{}")).is_err());
        assert!(collect.exists("a").unwrap());

        assert!(collect.update(&record("a", "{\"x\":1}")).unwrap());
        assert!(!collect.update(&record("missing", "{}")).unwrap());
        assert_eq!(collect.find("a").unwrap().data, "{\"x\":1}");

        let ids: Vec<String> = collect.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);

        assert!(collect.delete("a").unwrap());
        assert!(!collect.delete("a").unwrap());
        assert!(collect.find("a").is_err());
    }
}
