//! # Murier Backends
//!
//! The narrow database-facing surface of the data-access layer: connection
//! options (explicit, DSN or environment), a [`Connection`] facade over the
//! MySQL pool with coalesced transactions, and declared-type-directed row
//! decoding.

pub mod connection;
pub mod error;
pub mod options;
pub mod row;

pub use connection::{Connection, ExecResult};
pub use error::BackendError;
pub use options::ConnectionOptions;
pub use row::decode_column;
