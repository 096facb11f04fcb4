mod chain;

pub use chain::ActionChain;
