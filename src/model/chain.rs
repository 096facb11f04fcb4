use serde::{Deserialize, Serialize};

use crate::{ActchainError, Result, chain::Trigger};

/// A trigger plus the activation flag the monitor sweeps over.
///
/// The actions themselves are stored separately and linked by id, starting
/// at the trigger's `following_action_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionChain {
    pub id: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub description: String,
}

impl ActionChain {
    pub fn from_json(s: &str) -> Result<Self> {
        let chain = serde_json::from_str::<ActionChain>(s).map_err(|e| ActchainError::Decode(format!("{}", e)))?;
        if chain.id.is_empty() {
            return Err(ActchainError::Decode("missing id in chain".to_string()));
        }
        Ok(chain)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
