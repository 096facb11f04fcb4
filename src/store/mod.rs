//! Storage layer for chain and action definitions.
//!
//! Collections are registered on a [`Store`] by a backend implementing
//! [`DbStore`]; `MemStore` keeps everything in process memory.

pub mod data;
mod db;
mod store;

use strum::AsRefStr;

use crate::Result;

pub use db::MemStore;
pub use store::Store;

/// Identifiers for different storage collections.
#[derive(Debug, Clone, AsRefStr, PartialEq, Hash, Eq)]
pub enum StoreIden {
    #[strum(serialize = "chains")]
    Chains,
    #[strum(serialize = "actions")]
    Actions,
}

/// Trait for types that can identify their storage collection.
pub trait DbCollectionIden {
    /// Returns the collection identifier for this type.
    fn iden() -> StoreIden;
}

/// Trait for database collection operations.
pub trait DbCollection: Send + Sync {
    /// The type of items stored in this collection.
    type Item;

    /// Checks if a record with the given ID exists.
    fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Finds a record by ID.
    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item>;

    /// Lists every record ordered by ID.
    fn list(&self) -> Result<Vec<Self::Item>>;

    /// Creates a new record.
    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Updates an existing record.
    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Deletes a record by ID.
    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// Trait for database store initialization.
pub trait DbStore {
    /// Registers the backend's collections with the store.
    fn init(
        &self,
        s: &Store,
    );
}
