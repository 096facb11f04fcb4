mod action;
mod code_executor;

pub use action::CodeAction;
pub use code_executor::CodeLanguage;
