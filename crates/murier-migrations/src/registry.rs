//! Explicit registry of known migrations, built at startup.

use crate::error::MigrationError;
use crate::migration::{Migration, is_valid_version};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Version-ordered set of registered migrations.
#[derive(Default)]
pub struct MigrationRegistry {
	migrations: BTreeMap<String, Arc<dyn Migration>>,
}

impl MigrationRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register one migration. Versions must match `YYYYMMDDHHMM` and be
	/// unique.
	pub fn register(&mut self, migration: Arc<dyn Migration>) -> Result<(), MigrationError> {
		let version = migration.version().to_string();
		if !is_valid_version(&version) {
			return Err(MigrationError::InvalidVersion { version });
		}
		if self.migrations.contains_key(&version) {
			return Err(MigrationError::DuplicateVersion { version });
		}
		self.migrations.insert(version, migration);
		Ok(())
	}

	pub fn get(&self, version: &str) -> Option<Arc<dyn Migration>> {
		self.migrations.get(version).cloned()
	}

	/// All migrations, ascending by version.
	pub fn all(&self) -> Vec<Arc<dyn Migration>> {
		self.migrations.values().cloned().collect()
	}

	pub fn versions(&self) -> Vec<String> {
		self.migrations.keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.migrations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.migrations.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::migration::SqlMigration;

	fn migration(version: &str) -> Arc<dyn Migration> {
		Arc::new(SqlMigration::new(version, vec![], vec![]).unwrap())
	}

	#[test]
	fn registers_in_version_order() {
		let mut registry = MigrationRegistry::new();
		registry.register(migration("202608021200")).unwrap();
		registry.register(migration("202608011200")).unwrap();
		assert_eq!(
			registry.versions(),
			vec!["202608011200".to_string(), "202608021200".to_string()]
		);
	}

	#[test]
	fn rejects_duplicates_and_bad_versions() {
		let mut registry = MigrationRegistry::new();
		registry.register(migration("202608011200")).unwrap();
		assert!(matches!(
			registry.register(migration("202608011200")),
			Err(MigrationError::DuplicateVersion { .. })
		));
	}
}
