//! Backend-level failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
	/// A DSN or option set that cannot describe a connection.
	#[error("invalid connection configuration: {message}")]
	Configuration { message: String },

	/// Driver errors propagate unchanged with their original message.
	#[error(transparent)]
	Database(#[from] sqlx::Error),

	/// A row value that does not decode as its declared column type.
	#[error("cannot decode column `{column}`: {message}")]
	Decode { column: String, message: String },

	/// Commit or rollback without a matching begin.
	#[error("transaction misuse: {message}")]
	TransactionState { message: String },
}
