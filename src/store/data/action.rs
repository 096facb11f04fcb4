use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Action {
    pub id: String,
    /// JSON encoding of the action, including its `type` discriminator
    pub data: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Action {
    fn iden() -> StoreIden {
        StoreIden::Actions
    }
}
