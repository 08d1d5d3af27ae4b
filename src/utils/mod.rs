pub mod config;
pub mod credential_store;

pub use config::*;
pub use credential_store::*;
