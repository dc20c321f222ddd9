//! Fluent construction of [`EntityMetadata`].
//!
//! Entity declarations are registered at startup; the builder performs the
//! per-entity structural checks (single primary key, unique column names),
//! cross-entity checks happen when the registry is sealed.

use crate::column::ColumnMetadata;
use crate::entity::EntityMetadata;
use crate::foreign_key::ForeignKeyMetadata;
use crate::index::IndexMetadata;
use crate::naming::snake_case;
use crate::relation::RelationMetadata;
use murier_core::exception::MetadataError;

/// Builder for one entity's metadata.
///
/// # Examples
///
/// ```
/// use murier_metadata::builder::EntityMetadataBuilder;
/// use murier_metadata::types::{ColumnKey, ColumnType};
/// use murier_metadata::column::ColumnMetadata;
///
/// let meta = EntityMetadataBuilder::new("User")
/// 	.column(
/// 		ColumnMetadata::new("id", "id", ColumnType::Int)
/// 			.unsigned(true)
/// 			.with_key(ColumnKey::Primary)
/// 			.with_extra("auto_increment"),
/// 	)
/// 	.column(ColumnMetadata::new("username", "username", ColumnType::VarChar).with_length(255))
/// 	.build()
/// 	.unwrap();
/// assert_eq!(meta.table, "user");
/// assert_eq!(meta.primary_key().unwrap().name, "id");
/// ```
#[derive(Debug)]
pub struct EntityMetadataBuilder {
	type_name: String,
	table: Option<String>,
	engine: String,
	charset: String,
	collation: String,
	auto_increment: Option<u64>,
	columns: Vec<ColumnMetadata>,
	indexes: Vec<IndexMetadata>,
	foreign_keys: Vec<ForeignKeyMetadata>,
	relations: Vec<RelationMetadata>,
	repository: Option<String>,
}

impl EntityMetadataBuilder {
	pub fn new(type_name: impl Into<String>) -> Self {
		Self {
			type_name: type_name.into(),
			table: None,
			engine: "InnoDB".to_string(),
			charset: "utf8mb4".to_string(),
			collation: "utf8mb4_unicode_ci".to_string(),
			auto_increment: None,
			columns: Vec::new(),
			indexes: Vec::new(),
			foreign_keys: Vec::new(),
			relations: Vec::new(),
			repository: None,
		}
	}

	pub fn table(mut self, table: impl Into<String>) -> Self {
		self.table = Some(table.into());
		self
	}

	pub fn engine(mut self, engine: impl Into<String>) -> Self {
		self.engine = engine.into();
		self
	}

	pub fn charset(mut self, charset: impl Into<String>) -> Self {
		self.charset = charset.into();
		self
	}

	pub fn collation(mut self, collation: impl Into<String>) -> Self {
		self.collation = collation.into();
		self
	}

	pub fn auto_increment_seed(mut self, seed: u64) -> Self {
		self.auto_increment = Some(seed);
		self
	}

	pub fn column(mut self, column: ColumnMetadata) -> Self {
		self.columns.push(column);
		self
	}

	pub fn index(mut self, index: IndexMetadata) -> Self {
		self.indexes.push(index);
		self
	}

	pub fn foreign_key(mut self, foreign_key: ForeignKeyMetadata) -> Self {
		self.foreign_keys.push(foreign_key);
		self
	}

	pub fn relation(mut self, relation: RelationMetadata) -> Self {
		self.relations.push(relation);
		self
	}

	pub fn repository(mut self, repository: impl Into<String>) -> Self {
		self.repository = Some(repository.into());
		self
	}

	/// Freeze the record, checking per-entity invariants.
	pub fn build(self) -> Result<EntityMetadata, MetadataError> {
		let table = self
			.table
			.unwrap_or_else(|| snake_case(&self.type_name));

		let primary_count = self.columns.iter().filter(|c| c.is_primary()).count();
		if primary_count != 1 {
			return Err(MetadataError::InvalidEntity {
				type_name: self.type_name,
				reason: format!("expected exactly one primary-key column, found {primary_count}"),
			});
		}

		for (i, column) in self.columns.iter().enumerate() {
			if self.columns[..i].iter().any(|c| c.name == column.name) {
				return Err(MetadataError::InvalidEntity {
					type_name: self.type_name,
					reason: format!("duplicate column `{}`", column.name),
				});
			}
		}

		for fk in &self.foreign_keys {
			if !self.columns.iter().any(|c| c.name == fk.column) {
				return Err(MetadataError::InvalidEntity {
					type_name: self.type_name,
					reason: format!("foreign key on unknown column `{}`", fk.column),
				});
			}
		}

		for relation in &self.relations {
			if let Some(join_column) = &relation.join_column {
				if !self.columns.iter().any(|c| &c.name == join_column) {
					return Err(MetadataError::InvalidRelation {
						type_name: self.type_name,
						property: relation.property.clone(),
						reason: format!("join column `{join_column}` is not declared"),
					});
				}
			}
		}

		Ok(EntityMetadata {
			type_name: self.type_name,
			table,
			engine: self.engine,
			charset: self.charset,
			collation: self.collation,
			auto_increment: self.auto_increment,
			columns: self.columns,
			indexes: self.indexes,
			foreign_keys: self.foreign_keys,
			relations: self.relations,
			repository: self.repository,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{ColumnKey, ColumnType};

	fn pk() -> ColumnMetadata {
		ColumnMetadata::new("id", "id", ColumnType::Int)
			.unsigned(true)
			.with_key(ColumnKey::Primary)
			.with_extra("auto_increment")
	}

	#[test]
	fn table_defaults_to_snake_case() {
		let meta = EntityMetadataBuilder::new("UserProfile")
			.column(pk())
			.build()
			.unwrap();
		assert_eq!(meta.table, "user_profile");
	}

	#[test]
	fn rejects_missing_primary_key() {
		let err = EntityMetadataBuilder::new("User")
			.column(ColumnMetadata::new("name", "name", ColumnType::VarChar))
			.build()
			.unwrap_err();
		assert!(matches!(err, MetadataError::InvalidEntity { .. }));
	}

	#[test]
	fn rejects_two_primary_keys() {
		let err = EntityMetadataBuilder::new("User")
			.column(pk())
			.column(
				ColumnMetadata::new("other", "other", ColumnType::Int).with_key(ColumnKey::Primary),
			)
			.build()
			.unwrap_err();
		assert!(matches!(err, MetadataError::InvalidEntity { .. }));
	}

	#[test]
	fn rejects_duplicate_column_names() {
		let err = EntityMetadataBuilder::new("User")
			.column(pk())
			.column(ColumnMetadata::new("a", "name", ColumnType::VarChar))
			.column(ColumnMetadata::new("b", "name", ColumnType::VarChar))
			.build()
			.unwrap_err();
		assert!(matches!(err, MetadataError::InvalidEntity { .. }));
	}

	#[test]
	fn rejects_foreign_key_on_unknown_column() {
		let err = EntityMetadataBuilder::new("User")
			.column(pk())
			.foreign_key(crate::foreign_key::ForeignKeyMetadata::new(
				"unit_id", "units", "id",
			))
			.build()
			.unwrap_err();
		assert!(matches!(err, MetadataError::InvalidEntity { .. }));
	}
}
