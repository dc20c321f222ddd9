//! Bookkeeping of executed migrations in `migration_history`.

use crate::error::MigrationError;
use chrono::NaiveDateTime;
use murier_backends::{BackendError, Connection};
use murier_metadata::value::ColumnValue;
use sqlx::Row;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Reserved name of the bookkeeping table.
pub const HISTORY_TABLE: &str = "migration_history";

/// One row of the bookkeeping table.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
	pub version: String,
	pub executed_at: NaiveDateTime,
	pub execution_time_ms: u64,
}

/// Reads and writes `migration_history`.
pub struct MigrationRecorder {
	connection: Arc<Connection>,
}

impl MigrationRecorder {
	pub fn new(connection: Arc<Connection>) -> Self {
		Self { connection }
	}

	/// Create the bookkeeping table when missing.
	pub async fn ensure_table(&self) -> Result<(), MigrationError> {
		let ddl = format!(
			"CREATE TABLE IF NOT EXISTS `{HISTORY_TABLE}` (\n\
			 \x20 `id` int unsigned NOT NULL AUTO_INCREMENT,\n\
			 \x20 `version` varchar(13) NOT NULL,\n\
			 \x20 `executed_at` datetime NOT NULL DEFAULT CURRENT_TIMESTAMP,\n\
			 \x20 `execution_time` int unsigned NOT NULL DEFAULT 0,\n\
			 \x20 PRIMARY KEY (`id`),\n\
			 \x20 KEY `idx_{HISTORY_TABLE}_version` (`version`)\n\
			 ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
		);
		self.connection.execute(&ddl, &[]).await?;
		Ok(())
	}

	/// All history rows in execution order.
	pub async fn records(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
		let rows = self
			.connection
			.fetch_all(
				&format!(
					"SELECT `version`, `executed_at`, `execution_time` \
					 FROM `{HISTORY_TABLE}` ORDER BY `id`"
				),
				&[],
			)
			.await?;
		rows.into_iter()
			.map(|row| {
				let version: String = row.try_get("version").map_err(decode_err)?;
				let executed_at: NaiveDateTime =
					row.try_get("executed_at").map_err(decode_err)?;
				let execution_time: u32 = row.try_get("execution_time").map_err(decode_err)?;
				Ok(MigrationRecord {
					version,
					executed_at,
					execution_time_ms: u64::from(execution_time),
				})
			})
			.collect()
	}

	/// The set of already-executed versions.
	pub async fn executed_versions(&self) -> Result<BTreeSet<String>, MigrationError> {
		Ok(self
			.records()
			.await?
			.into_iter()
			.map(|record| record.version)
			.collect())
	}

	/// The most recently executed migration, when any.
	pub async fn latest(&self) -> Result<Option<MigrationRecord>, MigrationError> {
		Ok(self.records().await?.pop())
	}

	/// Record a successful migration run.
	pub async fn insert(&self, version: &str, execution_time_ms: u64) -> Result<(), MigrationError> {
		self.connection
			.execute(
				&format!(
					"INSERT INTO `{HISTORY_TABLE}` (`version`, `execution_time`) VALUES (?, ?)"
				),
				&[
					ColumnValue::Text(version.to_string()),
					ColumnValue::UInt(execution_time_ms),
				],
			)
			.await?;
		Ok(())
	}

	/// Forget a rolled-back migration.
	pub async fn delete(&self, version: &str) -> Result<(), MigrationError> {
		self.connection
			.execute(
				&format!("DELETE FROM `{HISTORY_TABLE}` WHERE `version` = ?"),
				&[ColumnValue::Text(version.to_string())],
			)
			.await?;
		Ok(())
	}
}

fn decode_err(error: sqlx::Error) -> MigrationError {
	MigrationError::Backend(BackendError::Decode {
		column: HISTORY_TABLE.to_string(),
		message: error.to_string(),
	})
}
