mod action;

pub use action::LlmAction;
