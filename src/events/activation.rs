use std::fmt;

/// Lifecycle events of one activation.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationEvent {
    /// The activation started waiting on its trigger.
    Started,
    /// The trigger received its matching request.
    TriggerFired,
    /// One action finished without error.
    ActionSucceeded,
    /// One action failed; the walk stops after this event.
    ActionFailed(String),
    /// The walk reached an action without a successor.
    Succeeded,
    Failed(String),
    Aborted(String),
}

impl ActivationEvent {
    pub fn str(&self) -> &str {
        match self {
            ActivationEvent::Started => "Started",
            ActivationEvent::TriggerFired => "TriggerFired",
            ActivationEvent::ActionSucceeded => "ActionSucceeded",
            ActivationEvent::ActionFailed(_) => "ActionFailed",
            ActivationEvent::Succeeded => "Succeeded",
            ActivationEvent::Failed(_) => "Failed",
            ActivationEvent::Aborted(_) => "Aborted",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ActivationEvent::Succeeded)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActivationEvent::Failed(_))
    }

    /// True for the last event an activation emits.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivationEvent::Succeeded | ActivationEvent::Failed(_) | ActivationEvent::Aborted(_))
    }
}

impl fmt::Display for ActivationEvent {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ActivationEvent::ActionFailed(msg) | ActivationEvent::Failed(msg) | ActivationEvent::Aborted(msg) => write!(f, "{}: {}", self.str(), msg),
            _ => write!(f, "{}", self.str()),
        }
    }
}
