//! Writing generated migrations to source files.
//!
//! Each migration lands as `Migration{version}.rs` declaring a type of
//! the same name that implements the [`crate::migration::Migration`]
//! trait. The application registers the type at startup; the engine never
//! scans the filesystem at run time.

use crate::error::MigrationError;
use crate::migration::is_valid_version;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct MigrationWriter;

impl MigrationWriter {
	/// Render and write one migration source file. Returns its path.
	pub fn write(
		dir: &Path,
		version: &str,
		up: &[String],
		down: &[String],
	) -> Result<PathBuf, MigrationError> {
		if !is_valid_version(version) {
			return Err(MigrationError::InvalidVersion {
				version: version.to_string(),
			});
		}
		fs::create_dir_all(dir)?;
		let path = dir.join(format!("Migration{version}.rs"));
		fs::write(&path, Self::render(version, up, down))?;
		info!(path = %path.display(), "migration file written");
		Ok(path)
	}

	/// Versions of the migration files present in a directory, sorted
	/// lexicographically (ascending by version).
	pub fn list(dir: &Path) -> Result<Vec<String>, MigrationError> {
		let mut versions = Vec::new();
		for entry in fs::read_dir(dir)? {
			let entry = entry?;
			let name = entry.file_name();
			let Some(name) = name.to_str() else {
				continue;
			};
			if let Some(version) = name
				.strip_prefix("Migration")
				.and_then(|rest| rest.strip_suffix(".rs"))
			{
				if is_valid_version(version) {
					versions.push(version.to_string());
				}
			}
		}
		versions.sort();
		Ok(versions)
	}

	fn render(version: &str, up: &[String], down: &[String]) -> String {
		let mut source = String::new();
		source.push_str("//! Auto-generated migration. Review before running.\n\n");
		source.push_str("use async_trait::async_trait;\n");
		source.push_str("use murier_migrations::error::MigrationError;\n");
		source.push_str("use murier_migrations::migration::{Migration, SqlExecutor};\n\n");
		source.push_str(&format!("pub struct Migration{version};\n\n"));
		source.push_str("#[async_trait]\n");
		source.push_str(&format!("impl Migration for Migration{version} {{\n"));
		source.push_str("\tfn version(&self) -> &str {\n");
		source.push_str(&format!("\t\t\"{version}\"\n"));
		source.push_str("\t}\n\n");
		source.push_str(&Self::render_step("up", up));
		source.push('\n');
		source.push_str(&Self::render_step("down", down));
		source.push_str("}\n");
		source
	}

	fn render_step(name: &str, statements: &[String]) -> String {
		let mut step = format!(
			"\tasync fn {name}(&self, executor: &mut SqlExecutor<'_>) -> Result<(), MigrationError> {{\n"
		);
		for statement in statements {
			step.push_str(&format!(
				"\t\texecutor.execute(r#\"{statement}\"#).await?;\n"
			));
		}
		step.push_str("\t\tOk(())\n\t}\n");
		step
	}
}
