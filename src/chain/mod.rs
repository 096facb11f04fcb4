//! Chain building blocks: actions, the trigger, and the token and condition
//! languages they share.

pub mod actions;
pub mod condition;
mod placeholder;
pub mod template;
pub mod trigger;

pub use placeholder::{Placeholder, Placeholders};
pub use trigger::{Trigger, TriggerKind, WebhookTrigger};
