mod action;
mod models;

pub use action::HttpAction;
pub use models::HttpMethod;
