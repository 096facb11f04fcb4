mod activation;
mod channel;
mod context;

pub use activation::{Activation, ActivationState};
pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::Context;

#[cfg(test)]
pub(crate) use context::test_context;
