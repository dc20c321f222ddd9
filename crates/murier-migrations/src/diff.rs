//! The structural delta between a declared schema and a live schema.

use crate::schema::{ColumnSchema, ForeignKeySchema, IndexSchema, TableSchema};
use indexmap::IndexMap;

/// One field of a column that can differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnField {
	Type,
	Length,
	Nullable,
	Default,
	Unsigned,
	Extra,
}

/// A per-column modification: the full before/after schemas plus a
/// `{field: (from, to)}` map carrying only the fields that differ.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnModification {
	pub column: String,
	pub from: ColumnSchema,
	pub to: ColumnSchema,
	pub changes: IndexMap<ColumnField, (String, String)>,
}

/// All changes to one table present on both sides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDifference {
	pub table: String,
	pub columns_to_add: Vec<ColumnSchema>,
	pub columns_to_modify: Vec<ColumnModification>,
	pub columns_to_drop: Vec<ColumnSchema>,
	pub foreign_keys_to_add: Vec<ForeignKeySchema>,
	pub foreign_keys_to_drop: Vec<ForeignKeySchema>,
	pub indexes_to_add: Vec<IndexSchema>,
	pub indexes_to_drop: Vec<IndexSchema>,
}

impl TableDifference {
	pub fn new(table: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			..Self::default()
		}
	}

	pub fn is_empty(&self) -> bool {
		self.columns_to_add.is_empty()
			&& self.columns_to_modify.is_empty()
			&& self.columns_to_drop.is_empty()
			&& self.foreign_keys_to_add.is_empty()
			&& self.foreign_keys_to_drop.is_empty()
			&& self.indexes_to_add.is_empty()
			&& self.indexes_to_drop.is_empty()
	}
}

/// The full delta. Tables to create come in dependency order (referenced
/// before referencing); drops reverse it; per-table changes are ordered
/// by table name, then column name, then constraint name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDifference {
	pub tables_to_create: Vec<TableSchema>,
	pub tables_to_drop: Vec<TableSchema>,
	pub table_changes: Vec<TableDifference>,
}

impl SchemaDifference {
	pub fn is_empty(&self) -> bool {
		self.tables_to_create.is_empty()
			&& self.tables_to_drop.is_empty()
			&& self.table_changes.iter().all(TableDifference::is_empty)
	}
}
