//! The registry of declared entities — the sole source of truth about the
//! declared schema.

use crate::entity::EntityMetadata;
use indexmap::IndexMap;
use murier_core::cache::{CacheConfig, EvictionPolicy, TaggedCache};
use murier_core::exception::MetadataError;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

static GLOBAL: OnceCell<Arc<MetadataRegistry>> = OnceCell::new();

/// Collects entity declarations and seals them into a registry.
#[derive(Debug, Default)]
pub struct MetadataRegistryBuilder {
	entities: Vec<EntityMetadata>,
}

impl MetadataRegistryBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(mut self, metadata: EntityMetadata) -> Self {
		self.entities.push(metadata);
		self
	}

	/// Seal the registry, checking cross-entity invariants:
	/// unique table names, foreign keys referencing existing columns,
	/// relation inverses existing on the target and pointing back.
	pub fn build(self) -> Result<MetadataRegistry, MetadataError> {
		let mut by_type: IndexMap<String, Arc<EntityMetadata>> = IndexMap::new();
		let mut by_table: HashMap<String, String> = HashMap::new();

		for metadata in self.entities {
			if let Some(first) = by_table.get(&metadata.table) {
				return Err(MetadataError::DuplicateTable {
					table: metadata.table.clone(),
					first: first.clone(),
					second: metadata.type_name.clone(),
				});
			}
			by_table.insert(metadata.table.clone(), metadata.type_name.clone());
			by_type.insert(metadata.type_name.clone(), Arc::new(metadata));
		}

		for metadata in by_type.values() {
			for fk in &metadata.foreign_keys {
				let target_type = by_table.get(&fk.referenced_table).ok_or_else(|| {
					MetadataError::InvalidEntity {
						type_name: metadata.type_name.clone(),
						reason: format!(
							"foreign key `{}` references undeclared table `{}`",
							fk.constraint_name(&metadata.table),
							fk.referenced_table
						),
					}
				})?;
				let target = &by_type[target_type];
				if target.column_by_name(&fk.referenced_column).is_none() {
					return Err(MetadataError::InvalidEntity {
						type_name: metadata.type_name.clone(),
						reason: format!(
							"foreign key `{}` references unknown column `{}`.`{}`",
							fk.constraint_name(&metadata.table),
							fk.referenced_table,
							fk.referenced_column
						),
					});
				}
			}

			for relation in &metadata.relations {
				let target = by_type.get(&relation.target_entity).ok_or_else(|| {
					MetadataError::InvalidRelation {
						type_name: metadata.type_name.clone(),
						property: relation.property.clone(),
						reason: format!("target entity `{}` is not declared", relation.target_entity),
					}
				})?;
				if let Some(inverse) = &relation.inverse_property {
					let back = target.relation(inverse).ok_or_else(|| {
						MetadataError::InvalidRelation {
							type_name: metadata.type_name.clone(),
							property: relation.property.clone(),
							reason: format!(
								"inverse property `{inverse}` does not exist on `{}`",
								relation.target_entity
							),
						}
					})?;
					if back.target_entity != metadata.type_name {
						return Err(MetadataError::InvalidRelation {
							type_name: metadata.type_name.clone(),
							property: relation.property.clone(),
							reason: format!(
								"inverse property `{inverse}` on `{}` targets `{}`",
								relation.target_entity, back.target_entity
							),
						});
					}
				}
			}
		}

		debug!(entities = by_type.len(), "metadata registry sealed");
		Ok(MetadataRegistry {
			by_type,
			by_table,
			derived: TaggedCache::new(CacheConfig {
				capacity: 0,
				policy: EvictionPolicy::Lru,
			}),
		})
	}
}

/// Immutable, process-wide registry of entity metadata.
pub struct MetadataRegistry {
	by_type: IndexMap<String, Arc<EntityMetadata>>,
	by_table: HashMap<String, String>,
	/// Memoized per-type derived records, tagged by type name.
	derived: TaggedCache<Arc<Vec<String>>>,
}

impl std::fmt::Debug for MetadataRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MetadataRegistry")
			.field("entities", &self.by_type.len())
			.finish()
	}
}

impl MetadataRegistry {
	pub fn builder() -> MetadataRegistryBuilder {
		MetadataRegistryBuilder::new()
	}

	/// Metadata for a registered entity type.
	pub fn get(&self, type_name: &str) -> Result<Arc<EntityMetadata>, MetadataError> {
		self.by_type
			.get(type_name)
			.cloned()
			.ok_or_else(|| MetadataError::UnknownEntity {
				type_name: type_name.to_string(),
			})
	}

	/// All declared table names, in a deterministic order.
	pub fn tables(&self) -> Vec<String> {
		let mut tables: Vec<String> = self.by_type.values().map(|m| m.table.clone()).collect();
		tables.sort();
		tables
	}

	/// Inverse lookup: the entity type mapped to a table.
	pub fn entity_for_table(&self, table: &str) -> Result<Arc<EntityMetadata>, MetadataError> {
		let type_name = self
			.by_table
			.get(table)
			.ok_or_else(|| MetadataError::UnknownEntity {
				type_name: table.to_string(),
			})?;
		self.get(type_name)
	}

	/// All registered entities, in registration order.
	pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityMetadata>> {
		self.by_type.values()
	}

	pub fn len(&self) -> usize {
		self.by_type.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_type.is_empty()
	}

	/// Tables the given type references through foreign keys, memoized.
	pub fn referenced_tables(&self, type_name: &str) -> Result<Arc<Vec<String>>, MetadataError> {
		let key = format!("referenced_tables:{type_name}");
		if let Some(hit) = self.derived.get(&key) {
			return Ok(hit);
		}
		let metadata = self.get(type_name)?;
		let tables = Arc::new(metadata.referenced_tables());
		self.derived
			.set_tagged(&key, Arc::clone(&tables), &[type_name]);
		Ok(tables)
	}

	/// Install the process-wide registry. The registry is set once; a
	/// previously installed registry wins and is returned unchanged.
	pub fn install(registry: MetadataRegistry) -> Arc<MetadataRegistry> {
		GLOBAL.get_or_init(|| Arc::new(registry)).clone()
	}

	/// The process-wide registry, when one has been installed.
	pub fn global() -> Option<Arc<MetadataRegistry>> {
		GLOBAL.get().cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::builder::EntityMetadataBuilder;
	use crate::column::ColumnMetadata;
	use crate::foreign_key::ForeignKeyMetadata;
	use crate::relation::{RelationKind, RelationMetadata};
	use crate::types::{ColumnKey, ColumnType};

	fn pk() -> ColumnMetadata {
		ColumnMetadata::new("id", "id", ColumnType::Int)
			.unsigned(true)
			.with_key(ColumnKey::Primary)
			.with_extra("auto_increment")
	}

	fn unit() -> EntityMetadata {
		EntityMetadataBuilder::new("Unit")
			.table("units_test")
			.column(pk())
			.column(ColumnMetadata::new("name", "name", ColumnType::VarChar).with_length(255))
			.build()
			.unwrap()
	}

	fn user() -> EntityMetadata {
		EntityMetadataBuilder::new("User")
			.table("users_test")
			.column(pk())
			.column(
				ColumnMetadata::new("username", "username", ColumnType::VarChar).with_length(255),
			)
			.column(
				ColumnMetadata::new("unitId", "unit_id", ColumnType::Int)
					.unsigned(true)
					.nullable(true),
			)
			.foreign_key(ForeignKeyMetadata::new("unit_id", "units_test", "id"))
			.relation(
				RelationMetadata::new("unit", RelationKind::ManyToOne, "Unit")
					.join_column("unit_id"),
			)
			.build()
			.unwrap()
	}

	#[test]
	fn get_and_inverse_lookup() {
		let registry = MetadataRegistry::builder()
			.register(unit())
			.register(user())
			.build()
			.unwrap();
		assert_eq!(registry.get("User").unwrap().table, "users_test");
		assert_eq!(
			registry.entity_for_table("units_test").unwrap().type_name,
			"Unit"
		);
		assert!(matches!(
			registry.get("Ghost"),
			Err(MetadataError::UnknownEntity { .. })
		));
	}

	#[test]
	fn tables_are_sorted() {
		let registry = MetadataRegistry::builder()
			.register(user())
			.register(unit())
			.build()
			.unwrap();
		assert_eq!(registry.tables(), vec!["units_test", "users_test"]);
	}

	#[test]
	fn rejects_duplicate_tables() {
		let clash = EntityMetadataBuilder::new("Account")
			.table("users_test")
			.column(pk())
			.build()
			.unwrap();
		let err = MetadataRegistry::builder()
			.register(user())
			.register(unit())
			.register(clash)
			.build()
			.unwrap_err();
		assert!(matches!(err, MetadataError::DuplicateTable { .. }));
	}

	#[test]
	fn rejects_dangling_foreign_key() {
		let err = MetadataRegistry::builder()
			.register(user())
			.build()
			.unwrap_err();
		assert!(matches!(err, MetadataError::InvalidEntity { .. }));
	}

	#[test]
	fn referenced_tables_is_memoized() {
		let registry = MetadataRegistry::builder()
			.register(unit())
			.register(user())
			.build()
			.unwrap();
		let first = registry.referenced_tables("User").unwrap();
		let second = registry.referenced_tables("User").unwrap();
		assert_eq!(*first, vec!["units_test".to_string()]);
		assert!(Arc::ptr_eq(&first, &second));
	}
}
