//! Per-entity metadata record.

use crate::column::ColumnMetadata;
use crate::foreign_key::ForeignKeyMetadata;
use crate::index::IndexMetadata;
use crate::relation::{RelationKind, RelationMetadata};

/// Everything the mapper knows about one entity type.
///
/// Built once by [`crate::builder::EntityMetadataBuilder`], validated and
/// frozen by the registry. Column order follows declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetadata {
	pub type_name: String,
	pub table: String,
	pub engine: String,
	pub charset: String,
	pub collation: String,
	pub auto_increment: Option<u64>,
	pub columns: Vec<ColumnMetadata>,
	pub indexes: Vec<IndexMetadata>,
	pub foreign_keys: Vec<ForeignKeyMetadata>,
	pub relations: Vec<RelationMetadata>,
	pub repository: Option<String>,
}

impl EntityMetadata {
	/// The single primary-key column.
	///
	/// Registry validation guarantees exactly one exists, so this only
	/// returns `None` on an unvalidated record.
	pub fn primary_key(&self) -> Option<&ColumnMetadata> {
		self.columns.iter().find(|c| c.is_primary())
	}

	pub fn column_for_property(&self, property: &str) -> Option<&ColumnMetadata> {
		self.columns.iter().find(|c| c.property == property)
	}

	pub fn column_by_name(&self, name: &str) -> Option<&ColumnMetadata> {
		self.columns.iter().find(|c| c.name == name)
	}

	pub fn property_for_column(&self, column: &str) -> Option<&str> {
		self.column_by_name(column).map(|c| c.property.as_str())
	}

	pub fn relation(&self, property: &str) -> Option<&RelationMetadata> {
		self.relations.iter().find(|r| r.property == property)
	}

	/// Relations whose owning side holds a collection.
	pub fn to_many_relations(&self) -> impl Iterator<Item = &RelationMetadata> {
		self.relations.iter().filter(|r| r.kind.is_to_many())
	}

	/// The foreign key declared on `column`, if any.
	pub fn foreign_key_for_column(&self, column: &str) -> Option<&ForeignKeyMetadata> {
		self.foreign_keys.iter().find(|fk| fk.column == column)
	}

	/// Tables this entity's rows reference through foreign keys.
	pub fn referenced_tables(&self) -> Vec<String> {
		self.foreign_keys
			.iter()
			.map(|fk| fk.referenced_table.clone())
			.collect()
	}

	/// Whether any relation on this entity needs a join table.
	pub fn has_many_to_many(&self) -> bool {
		self.relations
			.iter()
			.any(|r| r.kind == RelationKind::ManyToMany)
	}
}
