//! Event types for chain activations.
//!
//! Events are emitted while an activation runs to notify subscribers about
//! trigger firing, step outcomes, completion and failure. Logs carry
//! incremental output such as streamed LLM fragments and script output.

mod activation;

pub use activation::ActivationEvent;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Event message carrying the activation and action it belongs to.
#[derive(Debug, Clone)]
pub struct Message {
    /// Activation id.
    pub aid: String,
    /// Chain the activation runs.
    pub chain_id: String,
    /// Action that produced the event (empty for activation-level events).
    pub action_id: String,
    pub event: ActivationEvent,
}

/// Log line emitted during action execution.
#[derive(Debug, Clone)]
pub struct Log {
    pub aid: String,
    pub chain_id: String,
    pub action_id: String,
    pub content: String,
    /// Timestamp in milliseconds of the log entry.
    pub timestamp: i64,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}
