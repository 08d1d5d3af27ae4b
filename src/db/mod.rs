pub mod artifact;
pub mod connection;
pub mod dispatch;
pub mod driver;
pub mod oracle;
pub mod request;
pub mod schema;
pub mod sqlite;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::*;
pub use connection::*;
pub use dispatch::*;
pub use driver::*;
pub use request::*;
pub use schema::*;
pub use value::*;

pub use self::oracle::OracleDriver;
pub use self::sqlite::SqliteDriver;
