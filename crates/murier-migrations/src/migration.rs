//! The migration contract and the SQL-backed implementation the generator
//! emits.

use crate::error::MigrationError;
use async_trait::async_trait;
use murier_backends::Connection;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static VERSION_PATTERN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[0-9]{12}$").unwrap_or_else(|_| unreachable!("literal pattern")));

/// Whether a version string has the `YYYYMMDDHHMM` shape.
pub fn is_valid_version(version: &str) -> bool {
	VERSION_PATTERN.is_match(version)
}

/// Collects the statement sequence of one migration step and executes it,
/// unless the run is dry. A dry run yields the exact statements a wet run
/// would execute.
pub struct SqlExecutor<'a> {
	connection: &'a Connection,
	dry_run: bool,
	statements: Vec<String>,
}

impl<'a> SqlExecutor<'a> {
	pub fn new(connection: &'a Connection, dry_run: bool) -> Self {
		Self {
			connection,
			dry_run,
			statements: Vec::new(),
		}
	}

	/// Record and (unless dry) execute one DDL/DML statement.
	pub async fn execute(&mut self, sql: &str) -> Result<(), MigrationError> {
		self.statements.push(sql.to_string());
		if self.dry_run {
			debug!(sql, "dry-run: statement recorded");
			return Ok(());
		}
		self.connection.execute(sql, &[]).await?;
		Ok(())
	}

	pub fn is_dry_run(&self) -> bool {
		self.dry_run
	}

	pub fn statements(&self) -> &[String] {
		&self.statements
	}

	pub fn into_statements(self) -> Vec<String> {
		self.statements
	}
}

/// A versioned pair of forward/backward schema transformations. The steps
/// are opaque to the engine; it invokes them in order.
#[async_trait]
pub trait Migration: Send + Sync {
	/// The lexicographic ordering key, `YYYYMMDDHHMM`.
	fn version(&self) -> &str;

	async fn up(&self, executor: &mut SqlExecutor<'_>) -> Result<(), MigrationError>;

	async fn down(&self, executor: &mut SqlExecutor<'_>) -> Result<(), MigrationError>;
}

/// A migration whose steps are fixed statement lists, as produced by the
/// generator.
pub struct SqlMigration {
	version: String,
	up: Vec<String>,
	down: Vec<String>,
}

impl SqlMigration {
	pub fn new(
		version: impl Into<String>,
		up: Vec<String>,
		down: Vec<String>,
	) -> Result<Self, MigrationError> {
		let version = version.into();
		if !is_valid_version(&version) {
			return Err(MigrationError::InvalidVersion { version });
		}
		Ok(Self { version, up, down })
	}
}

#[async_trait]
impl Migration for SqlMigration {
	fn version(&self) -> &str {
		&self.version
	}

	async fn up(&self, executor: &mut SqlExecutor<'_>) -> Result<(), MigrationError> {
		for statement in &self.up {
			executor.execute(statement).await?;
		}
		Ok(())
	}

	async fn down(&self, executor: &mut SqlExecutor<'_>) -> Result<(), MigrationError> {
		for statement in &self.down {
			executor.execute(statement).await?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

	fn lazy_connection() -> Connection {
		let options = MySqlConnectOptions::new()
			.host("127.0.0.1")
			.port(3306)
			.username("nobody")
			.database("murier_test");
		Connection::from_pool(MySqlPoolOptions::new().connect_lazy_with(options))
	}

	#[tokio::test]
	async fn dry_run_records_without_executing() {
		// The pool is lazy and never connected: a dry run must not touch it.
		let connection = lazy_connection();
		let migration = SqlMigration::new(
			"202608011230",
			vec![
				"CREATE TABLE `users` (`id` int NOT NULL)".to_string(),
				"CREATE TABLE `units` (`id` int NOT NULL)".to_string(),
			],
			vec!["DROP TABLE `users`".to_string()],
		)
		.unwrap();

		let mut executor = SqlExecutor::new(&connection, true);
		migration.up(&mut executor).await.unwrap();
		assert!(executor.is_dry_run());
		assert_eq!(
			executor.statements(),
			&[
				"CREATE TABLE `users` (`id` int NOT NULL)".to_string(),
				"CREATE TABLE `units` (`id` int NOT NULL)".to_string(),
			]
		);
	}

	#[test]
	fn version_pattern_is_twelve_digits() {
		assert!(is_valid_version("202608011230"));
		assert!(!is_valid_version("2026080112"));
		assert!(!is_valid_version("2026080112301"));
		assert!(!is_valid_version("20260801123a"));
	}

	#[test]
	fn sql_migration_rejects_bad_version() {
		assert!(SqlMigration::new("bad", vec![], vec![]).is_err());
		assert!(SqlMigration::new("202608011230", vec![], vec![]).is_ok());
	}
}
