mod action;
mod chain;

pub use action::Action;
pub use chain::Chain;
