//! The migration engine: generate, list pending, run, roll back.

use crate::comparer::SchemaComparer;
use crate::error::MigrationError;
use crate::introspector::SchemaIntrospector;
use crate::migration::{Migration, SqlExecutor, is_valid_version};
use crate::recorder::MigrationRecorder;
use crate::registry::MigrationRegistry;
use crate::renderer::DdlRenderer;
use crate::schema::DatabaseSchema;
use crate::writer::MigrationWriter;
use chrono::Utc;
use murier_backends::Connection;
use murier_metadata::registry::MetadataRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A migration produced by [`MigrationEngine::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMigration {
	pub version: String,
	pub up: Vec<String>,
	pub down: Vec<String>,
	/// Where the migration source was written, when a directory is set.
	pub path: Option<PathBuf>,
}

/// What one executed (or dry-run) migration did.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
	pub version: String,
	pub statements: Vec<String>,
	pub duration_ms: u64,
	pub dry_run: bool,
}

/// Renders schema differences into migrations, runs them in order and
/// tracks history. Every migration runs in its own transaction; a failure
/// aborts the remaining sequence and leaves earlier history rows intact.
pub struct MigrationEngine {
	connection: Arc<Connection>,
	metadata: Arc<MetadataRegistry>,
	registry: MigrationRegistry,
	recorder: MigrationRecorder,
	comparer: SchemaComparer,
	database: String,
	migrations_dir: Option<PathBuf>,
}

impl MigrationEngine {
	pub fn new(
		connection: Arc<Connection>,
		metadata: Arc<MetadataRegistry>,
		database: impl Into<String>,
	) -> Self {
		Self {
			recorder: MigrationRecorder::new(Arc::clone(&connection)),
			connection,
			metadata,
			registry: MigrationRegistry::new(),
			comparer: SchemaComparer::new(),
			database: database.into(),
			migrations_dir: None,
		}
	}

	/// Directory `generate` writes migration sources into.
	pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.migrations_dir = Some(dir.into());
		self
	}

	pub fn with_comparer(mut self, comparer: SchemaComparer) -> Self {
		self.comparer = comparer;
		self
	}

	pub fn registry(&self) -> &MigrationRegistry {
		&self.registry
	}

	pub fn registry_mut(&mut self) -> &mut MigrationRegistry {
		&mut self.registry
	}

	pub fn recorder(&self) -> &MigrationRecorder {
		&self.recorder
	}

	/// Compare declared and live schema and synthesize a migration from
	/// the difference. Returns `None` when there is nothing to do.
	///
	/// `version` is the caller's timestamp or, when absent, the current
	/// UTC time formatted as `YYYYMMDDHHMM`.
	pub async fn generate(
		&self,
		version: Option<String>,
	) -> Result<Option<GeneratedMigration>, MigrationError> {
		let declared = DatabaseSchema::from_registry(&self.metadata);
		let live = SchemaIntrospector::new(Arc::clone(&self.connection))
			.introspect(&self.database)
			.await?;
		let difference = self.comparer.compare(&declared, &live)?;
		if difference.is_empty() {
			info!("schemas match, no migration generated");
			return Ok(None);
		}

		let version = match version {
			Some(version) if is_valid_version(&version) => version,
			Some(version) => return Err(MigrationError::InvalidVersion { version }),
			None => Utc::now().format("%Y%m%d%H%M").to_string(),
		};
		let up = DdlRenderer::render_up(&difference);
		let down = DdlRenderer::render_down(&difference);

		let path = match &self.migrations_dir {
			Some(dir) => Some(MigrationWriter::write(dir, &version, &up, &down)?),
			None => None,
		};
		info!(version, statements = up.len(), "migration generated");
		Ok(Some(GeneratedMigration {
			version,
			up,
			down,
			path,
		}))
	}

	/// Registered migrations not yet present in the history table,
	/// ascending by version.
	pub async fn pending(&self) -> Result<Vec<Arc<dyn Migration>>, MigrationError> {
		self.recorder.ensure_table().await?;
		let executed = self.recorder.executed_versions().await?;
		Ok(self
			.registry
			.all()
			.into_iter()
			.filter(|migration| !executed.contains(migration.version()))
			.collect())
	}

	/// Run every pending migration in order. A failure rolls back the
	/// failing migration only and aborts the rest.
	pub async fn run(&self, dry_run: bool) -> Result<Vec<MigrationReport>, MigrationError> {
		let pending = self.pending().await?;
		let mut reports = Vec::with_capacity(pending.len());
		for migration in pending {
			let version = migration.version().to_string();
			let started = Instant::now();

			if !dry_run {
				self.connection.begin().await?;
			}
			let mut executor = SqlExecutor::new(&self.connection, dry_run);
			match migration.up(&mut executor).await {
				Ok(()) => {
					let duration_ms = started.elapsed().as_millis() as u64;
					if !dry_run {
						if let Err(cause) = self.recorder.insert(&version, duration_ms).await {
							let _ = self.connection.rollback().await;
							return Err(MigrationError::failed(version, cause));
						}
						self.connection
							.commit()
							.await
							.map_err(|e| MigrationError::failed(&version, e.into()))?;
					}
					info!(version, duration_ms, dry_run, "migration applied");
					reports.push(MigrationReport {
						version,
						statements: executor.into_statements(),
						duration_ms,
						dry_run,
					});
				}
				Err(cause) => {
					if !dry_run {
						let _ = self.connection.rollback().await;
					}
					warn!(version, error = %cause, "migration failed, aborting run");
					return Err(MigrationError::failed(version, cause));
				}
			}
		}
		Ok(reports)
	}

	/// Roll back the most recently executed migration, when any.
	pub async fn rollback(&self, dry_run: bool) -> Result<Option<MigrationReport>, MigrationError> {
		self.recorder.ensure_table().await?;
		let Some(record) = self.recorder.latest().await? else {
			info!("nothing to roll back");
			return Ok(None);
		};
		let version = record.version;
		let migration = self
			.registry
			.get(&version)
			.ok_or_else(|| MigrationError::UnknownMigration {
				version: version.clone(),
			})?;

		let started = Instant::now();
		if !dry_run {
			self.connection.begin().await?;
		}
		let mut executor = SqlExecutor::new(&self.connection, dry_run);
		match migration.down(&mut executor).await {
			Ok(()) => {
				let duration_ms = started.elapsed().as_millis() as u64;
				if !dry_run {
					if let Err(cause) = self.recorder.delete(&version).await {
						let _ = self.connection.rollback().await;
						return Err(MigrationError::failed(version, cause));
					}
					self.connection
						.commit()
						.await
						.map_err(|e| MigrationError::failed(&version, e.into()))?;
				}
				info!(version, duration_ms, dry_run, "migration rolled back");
				Ok(Some(MigrationReport {
					version,
					statements: executor.into_statements(),
					duration_ms,
					dry_run,
				}))
			}
			Err(cause) => {
				if !dry_run {
					let _ = self.connection.rollback().await;
				}
				warn!(version, error = %cause, "rollback failed");
				Err(MigrationError::failed(version, cause))
			}
		}
	}
}
