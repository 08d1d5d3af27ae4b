//! Connection helpers for Oracle and SQLite.
//!
//! A request for one or more artifact kinds (`connection`, `cursor`,
//! `engine`) is resolved into a canonical plan, credentials are looked up
//! from a named JSON store or given inline, and the matching driver opens the
//! artifacts in a fixed order.

pub mod db;
pub mod error;
pub mod logging;
pub mod utils;

pub use error::{DriverError, Error, Result};
