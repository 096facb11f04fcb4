//! # Actchain
//!
//! Actchain is an embeddable action-chain engine written in Rust.
//! A chain is one trigger followed by a linked list of actions; each action
//! names the action that runs after it, and branch/loop actions redirect the
//! walk at runtime.
//!
//! ## Core Features
//!
//! - **Webhook Triggers**: a chain waits for one matching inbound request per activation
//! - **Five Action Kinds**: HTTP, LLM (multi-provider with model fallback and streaming), code, branch, loop
//! - **Templating**: `{{SECRET}}` and `[[placeholder]]` tokens resolved against the secret store and earlier results
//! - **Event Channel**: activation events and logs broadcast to subscribers with glob filters
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use actchain::{Action, ActionChain, EngineBuilder};
//!
//! let engine = EngineBuilder::new().build()?;
//! engine.launch();
//!
//! engine.put_action(&Action::from_json(action_json)?)?;
//! let chain = ActionChain::from_json(chain_json)?;
//! engine.put_chain(&chain)?;
//! let activation = engine.activate(&chain.id)?;
//! ```

mod builder;
pub mod chain;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
mod events;
pub mod llm;
mod model;
mod runtime;
mod secrets;
mod store;
mod utils;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use chain::{
    Placeholder, Trigger, TriggerKind, WebhookTrigger,
    actions::{Action, ActionKind, ActionType, Exec},
    condition,
    template::{resolve_placeholders, resolve_secrets, resolve_template},
};
pub use common::Vars;
pub use config::{CodeConfig, Config, LlmConfig, MonitorConfig, SecretsConfig};
pub use engine::Engine;
pub use error::ActchainError;
pub use events::{ActivationEvent, Event, Log, Message};
pub use llm::{ChatMessage, Completion, CompletionRequest, LlmClient, Provider};
pub use model::*;
pub use runtime::{Activation, ActivationState, Channel, ChannelEvent, ChannelOptions, Context};
pub use secrets::SecretStore;
pub use store::{DbCollection, DbStore, MemStore, Store};

/// Result type alias for Actchain operations.
pub type Result<T> = std::result::Result<T, ActchainError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
