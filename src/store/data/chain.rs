use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Chain {
    pub id: String,
    /// JSON encoding of the chain definition
    pub data: String,
    pub active: bool,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Chain {
    fn iden() -> StoreIden {
        StoreIden::Chains
    }
}
