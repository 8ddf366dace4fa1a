pub mod admin;
pub mod hooks;
pub mod query;
pub mod types;

pub use admin::*;
pub use hooks::*;
pub use query::*;
