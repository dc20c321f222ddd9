//! Migration-engine failures.

use murier_backends::BackendError;
use murier_core::exception::MetadataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
	#[error(transparent)]
	Metadata(#[from] MetadataError),

	#[error(transparent)]
	Backend(#[from] BackendError),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	/// Introspection returned a shape the comparer cannot classify.
	#[error("schema mismatch: {message}")]
	SchemaMismatch { message: String },

	/// A version string outside `^[0-9]{12}$`.
	#[error("invalid migration version `{version}`")]
	InvalidVersion { version: String },

	/// Two registered migrations share a version.
	#[error("duplicate migration version `{version}`")]
	DuplicateVersion { version: String },

	/// A history row references a migration the registry does not know.
	#[error("unknown migration `{version}`")]
	UnknownMigration { version: String },

	/// A failure while running or rolling back one migration. The rest of
	/// the sequence is aborted; earlier history rows stay intact.
	#[error("migration `{version}` failed: {cause}")]
	MigrationFailed {
		version: String,
		#[source]
		cause: Box<MigrationError>,
	},
}

impl MigrationError {
	/// Wrap a failure with the version it occurred in.
	pub fn failed(version: impl Into<String>, cause: MigrationError) -> Self {
		MigrationError::MigrationFailed {
			version: version.into(),
			cause: Box::new(cause),
		}
	}
}
