//! Normalized schema representation, symmetric between the declared
//! metadata and the live database.

use indexmap::IndexMap;
use murier_metadata::registry::MetadataRegistry;
use murier_metadata::types::{ColumnKey, ColumnType, ReferentialRule};

/// One column as the comparer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
	pub name: String,
	pub column_type: ColumnType,
	pub length: Option<u32>,
	pub nullable: bool,
	pub unsigned: bool,
	pub default: Option<String>,
	pub key: Option<ColumnKey>,
	pub extra: Option<String>,
	/// Documentation only; never triggers a modify entry.
	pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
	pub name: String,
	pub columns: Vec<String>,
	pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySchema {
	/// Convention-derived constraint name; the comparison key.
	pub name: String,
	pub column: String,
	pub referenced_table: String,
	pub referenced_column: String,
	pub on_delete: ReferentialRule,
	pub on_update: ReferentialRule,
}

/// One table with deterministic member ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
	pub name: String,
	pub engine: Option<String>,
	pub charset: Option<String>,
	/// Documentation only; never triggers a change.
	pub collation: Option<String>,
	pub columns: IndexMap<String, ColumnSchema>,
	pub indexes: IndexMap<String, IndexSchema>,
	pub foreign_keys: IndexMap<String, ForeignKeySchema>,
}

impl TableSchema {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			engine: None,
			charset: None,
			collation: None,
			columns: IndexMap::new(),
			indexes: IndexMap::new(),
			foreign_keys: IndexMap::new(),
		}
	}

	pub fn primary_key(&self) -> Option<&ColumnSchema> {
		self.columns
			.values()
			.find(|c| c.key == Some(ColumnKey::Primary))
	}

	/// Tables referenced by this table's foreign keys.
	pub fn referenced_tables(&self) -> Vec<&str> {
		self.foreign_keys
			.values()
			.map(|fk| fk.referenced_table.as_str())
			.collect()
	}
}

/// A whole schema, tables ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSchema {
	pub tables: IndexMap<String, TableSchema>,
}

impl DatabaseSchema {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_table(&mut self, table: TableSchema) {
		self.tables.insert(table.name.clone(), table);
		self.tables.sort_keys();
	}

	/// Project the declared metadata into schema form.
	///
	/// Column-level unique/multiple key tags become named single-column
	/// indexes, matching how the live side reports them.
	pub fn from_registry(registry: &MetadataRegistry) -> Self {
		let mut schema = DatabaseSchema::new();
		for table_name in registry.tables() {
			let Ok(metadata) = registry.entity_for_table(&table_name) else {
				continue;
			};
			let mut table = TableSchema::new(&metadata.table);
			table.engine = Some(metadata.engine.clone());
			table.charset = Some(metadata.charset.clone());
			table.collation = Some(metadata.collation.clone());

			for column in &metadata.columns {
				table.columns.insert(
					column.name.clone(),
					ColumnSchema {
						name: column.name.clone(),
						column_type: column.column_type.clone(),
						length: column.length,
						nullable: column.nullable,
						unsigned: column.unsigned,
						default: column.default.clone(),
						key: column.key,
						extra: column.extra.clone(),
						comment: column.comment.clone(),
					},
				);
				match column.key {
					Some(ColumnKey::Unique) => {
						table.indexes.insert(
							column.name.clone(),
							IndexSchema {
								name: column.name.clone(),
								columns: vec![column.name.clone()],
								unique: true,
							},
						);
					}
					Some(ColumnKey::Multiple) => {
						table.indexes.insert(
							column.name.clone(),
							IndexSchema {
								name: column.name.clone(),
								columns: vec![column.name.clone()],
								unique: false,
							},
						);
					}
					_ => {}
				}
			}

			for index in &metadata.indexes {
				table.indexes.insert(
					index.name.clone(),
					IndexSchema {
						name: index.name.clone(),
						columns: index.columns.clone(),
						unique: index.unique,
					},
				);
			}

			for fk in &metadata.foreign_keys {
				let name = fk.constraint_name(&metadata.table);
				table.foreign_keys.insert(
					name.clone(),
					ForeignKeySchema {
						name,
						column: fk.column.clone(),
						referenced_table: fk.referenced_table.clone(),
						referenced_column: fk.referenced_column.clone(),
						on_delete: fk.on_delete,
						on_update: fk.on_update,
					},
				);
			}

			table.indexes.sort_keys();
			table.foreign_keys.sort_keys();
			schema.add_table(table);
		}
		schema
	}
}
