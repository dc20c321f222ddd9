//! Declared-vs-live schema comparison.

use crate::diff::{ColumnField, ColumnModification, SchemaDifference, TableDifference};
use crate::error::MigrationError;
use crate::schema::{ColumnSchema, DatabaseSchema, TableSchema};
use indexmap::IndexMap;
use murier_metadata::types::TypeFamily;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Produces a [`SchemaDifference`] between a declared and a live schema.
///
/// System bookkeeping tables from the ignore list (by default the
/// migration history table) never appear in the result.
#[derive(Debug, Clone)]
pub struct SchemaComparer {
	ignore_tables: BTreeSet<String>,
}

impl Default for SchemaComparer {
	fn default() -> Self {
		Self::new()
	}
}

impl SchemaComparer {
	pub fn new() -> Self {
		Self {
			ignore_tables: [crate::recorder::HISTORY_TABLE.to_string()]
				.into_iter()
				.collect(),
		}
	}

	pub fn with_ignored<I, S>(tables: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			ignore_tables: tables.into_iter().map(Into::into).collect(),
		}
	}

	/// Compare two schemas. The result is deterministic: tables to create
	/// in dependency order, everything else ordered by name.
	pub fn compare(
		&self,
		declared: &DatabaseSchema,
		live: &DatabaseSchema,
	) -> Result<SchemaDifference, MigrationError> {
		let mut difference = SchemaDifference::default();

		let mut declared_names: Vec<&String> = declared
			.tables
			.keys()
			.filter(|t| !self.ignore_tables.contains(*t))
			.collect();
		declared_names.sort();

		let mut creations: Vec<TableSchema> = Vec::new();
		for name in &declared_names {
			let table = &declared.tables[*name];
			match live.tables.get(*name) {
				None => creations.push(table.clone()),
				Some(live_table) => {
					let change = compare_table(table, live_table)?;
					if !change.is_empty() {
						difference.table_changes.push(change);
					}
				}
			}
		}
		difference.tables_to_create = order_by_dependency(creations)?;

		let mut live_only: Vec<&String> = live
			.tables
			.keys()
			.filter(|t| !self.ignore_tables.contains(*t) && !declared.tables.contains_key(*t))
			.collect();
		live_only.sort();
		let mut drops: Vec<TableSchema> = live_only
			.into_iter()
			.map(|name| live.tables[name].clone())
			.collect();
		// Referencing tables must drop before their targets.
		drops = order_by_dependency(drops)?;
		drops.reverse();
		difference.tables_to_drop = drops;

		debug!(
			create = difference.tables_to_create.len(),
			drop = difference.tables_to_drop.len(),
			change = difference.table_changes.len(),
			"schema compared"
		);
		Ok(difference)
	}
}

fn compare_table(
	declared: &TableSchema,
	live: &TableSchema,
) -> Result<TableDifference, MigrationError> {
	let mut change = TableDifference::new(&declared.name);

	for (name, column) in &declared.columns {
		match live.columns.get(name) {
			None => change.columns_to_add.push(column.clone()),
			Some(live_column) => {
				let deltas = column_deltas(column, live_column);
				if !deltas.is_empty() {
					change.columns_to_modify.push(ColumnModification {
						column: name.clone(),
						from: live_column.clone(),
						to: column.clone(),
						changes: deltas,
					});
				}
			}
		}
	}
	for (name, live_column) in &live.columns {
		if !declared.columns.contains_key(name) {
			change.columns_to_drop.push(live_column.clone());
		}
	}
	change.columns_to_add.sort_by(|a, b| a.name.cmp(&b.name));
	change
		.columns_to_modify
		.sort_by(|a, b| a.column.cmp(&b.column));
	change.columns_to_drop.sort_by(|a, b| a.name.cmp(&b.name));

	// Foreign keys match by convention-derived name; any difference in
	// target or rules is a drop + add, never a silent rewrite.
	let fk_names: BTreeSet<&String> = declared
		.foreign_keys
		.keys()
		.chain(live.foreign_keys.keys())
		.collect();
	for name in fk_names {
		match (declared.foreign_keys.get(name), live.foreign_keys.get(name)) {
			(Some(fk), None) => change.foreign_keys_to_add.push(fk.clone()),
			(None, Some(fk)) => change.foreign_keys_to_drop.push(fk.clone()),
			(Some(declared_fk), Some(live_fk)) if declared_fk != live_fk => {
				change.foreign_keys_to_drop.push(live_fk.clone());
				change.foreign_keys_to_add.push(declared_fk.clone());
			}
			_ => {}
		}
	}

	let index_names: BTreeSet<&String> =
		declared.indexes.keys().chain(live.indexes.keys()).collect();
	for name in index_names {
		match (declared.indexes.get(name), live.indexes.get(name)) {
			(Some(index), None) => change.indexes_to_add.push(index.clone()),
			(None, Some(index)) => change.indexes_to_drop.push(index.clone()),
			(Some(declared_index), Some(live_index)) if declared_index != live_index => {
				change.indexes_to_drop.push(live_index.clone());
				change.indexes_to_add.push(declared_index.clone());
			}
			_ => {}
		}
	}

	Ok(change)
}

/// Per-field comparison. Comment and collation never trigger an entry;
/// integer display widths are cosmetic and ignored.
fn column_deltas(
	declared: &ColumnSchema,
	live: &ColumnSchema,
) -> IndexMap<ColumnField, (String, String)> {
	let mut deltas = IndexMap::new();

	if declared.column_type != live.column_type {
		deltas.insert(
			ColumnField::Type,
			(
				live.column_type.ddl_fragment(live.length),
				declared.column_type.ddl_fragment(declared.length),
			),
		);
	}

	let length_significant = !matches!(
		declared.column_type.family(),
		TypeFamily::Integer | TypeFamily::Numeric
	);
	if length_significant && declared.length.is_some() && declared.length != live.length {
		deltas.insert(
			ColumnField::Length,
			(render_opt(live.length), render_opt(declared.length)),
		);
	}

	if declared.nullable != live.nullable {
		deltas.insert(
			ColumnField::Nullable,
			(live.nullable.to_string(), declared.nullable.to_string()),
		);
	}

	if declared.default != live.default {
		deltas.insert(
			ColumnField::Default,
			(
				live.default.clone().unwrap_or_default(),
				declared.default.clone().unwrap_or_default(),
			),
		);
	}

	if declared.unsigned != live.unsigned {
		deltas.insert(
			ColumnField::Unsigned,
			(live.unsigned.to_string(), declared.unsigned.to_string()),
		);
	}

	if normalize_extra(&declared.extra) != normalize_extra(&live.extra) {
		deltas.insert(
			ColumnField::Extra,
			(
				live.extra.clone().unwrap_or_default(),
				declared.extra.clone().unwrap_or_default(),
			),
		);
	}

	deltas
}

fn render_opt(value: Option<u32>) -> String {
	value.map(|v| v.to_string()).unwrap_or_default()
}

/// Live `EXTRA` text carries noise like `DEFAULT_GENERATED`; only the
/// auto-increment marker is structural.
fn normalize_extra(extra: &Option<String>) -> String {
	extra
		.as_deref()
		.unwrap_or("")
		.to_ascii_lowercase()
		.split_whitespace()
		.filter(|token| *token == "auto_increment")
		.collect::<Vec<_>>()
		.join(" ")
}

/// Order tables so every referenced table precedes its referencing table.
fn order_by_dependency(tables: Vec<TableSchema>) -> Result<Vec<TableSchema>, MigrationError> {
	if tables.len() <= 1 {
		return Ok(tables);
	}
	let mut graph = DiGraph::<usize, ()>::new();
	let mut nodes = HashMap::new();
	for (i, table) in tables.iter().enumerate() {
		nodes.insert(table.name.clone(), graph.add_node(i));
	}
	for table in &tables {
		for referenced in table.referenced_tables() {
			if referenced == table.name {
				continue;
			}
			if let Some(&target) = nodes.get(referenced) {
				graph.add_edge(target, nodes[&table.name], ());
			}
		}
	}
	let sorted = toposort(&graph, None).map_err(|_| MigrationError::SchemaMismatch {
		message: "cyclic foreign keys between created tables".to_string(),
	})?;
	let mut by_index: Vec<Option<TableSchema>> = tables.into_iter().map(Some).collect();
	Ok(sorted
		.into_iter()
		.filter_map(|node| by_index[graph[node]].take())
		.collect())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::{ForeignKeySchema, IndexSchema};
	use murier_metadata::types::{ColumnKey, ColumnType, ReferentialRule};

	fn int_pk() -> ColumnSchema {
		ColumnSchema {
			name: "id".to_string(),
			column_type: ColumnType::Int,
			length: None,
			nullable: false,
			unsigned: true,
			default: None,
			key: Some(ColumnKey::Primary),
			extra: Some("auto_increment".to_string()),
			comment: None,
		}
	}

	fn varchar(name: &str, length: u32) -> ColumnSchema {
		ColumnSchema {
			name: name.to_string(),
			column_type: ColumnType::VarChar,
			length: Some(length),
			nullable: false,
			unsigned: false,
			default: None,
			key: None,
			extra: None,
			comment: None,
		}
	}

	fn table(name: &str, columns: Vec<ColumnSchema>) -> TableSchema {
		let mut table = TableSchema::new(name);
		for column in columns {
			table.columns.insert(column.name.clone(), column);
		}
		table
	}

	#[test]
	fn declared_only_table_is_created() {
		let mut declared = DatabaseSchema::new();
		declared.add_table(table("users", vec![int_pk(), varchar("username", 255)]));
		let live = DatabaseSchema::new();

		let diff = SchemaComparer::new().compare(&declared, &live).unwrap();
		assert_eq!(diff.tables_to_create.len(), 1);
		assert!(diff.tables_to_drop.is_empty());
		assert!(!diff.is_empty());
	}

	#[test]
	fn created_tables_come_in_dependency_order() {
		let mut users = table("users", vec![int_pk(), varchar("username", 255)]);
		users.columns.insert(
			"unit_id".to_string(),
			ColumnSchema {
				name: "unit_id".to_string(),
				column_type: ColumnType::Int,
				length: None,
				nullable: true,
				unsigned: true,
				default: None,
				key: Some(ColumnKey::Multiple),
				extra: None,
				comment: None,
			},
		);
		users.foreign_keys.insert(
			"fk_users_unit_id_units".to_string(),
			ForeignKeySchema {
				name: "fk_users_unit_id_units".to_string(),
				column: "unit_id".to_string(),
				referenced_table: "units".to_string(),
				referenced_column: "id".to_string(),
				on_delete: ReferentialRule::Restrict,
				on_update: ReferentialRule::Restrict,
			},
		);
		let mut declared = DatabaseSchema::new();
		declared.add_table(users);
		declared.add_table(table("units", vec![int_pk(), varchar("name", 255)]));

		let diff = SchemaComparer::new()
			.compare(&declared, &DatabaseSchema::new())
			.unwrap();
		let names: Vec<&str> = diff
			.tables_to_create
			.iter()
			.map(|t| t.name.as_str())
			.collect();
		assert_eq!(names, vec!["units", "users"]);
	}

	#[test]
	fn live_only_table_is_dropped_but_history_is_ignored() {
		let declared = DatabaseSchema::new();
		let mut live = DatabaseSchema::new();
		live.add_table(table("legacy", vec![int_pk()]));
		live.add_table(table("migration_history", vec![int_pk()]));

		let diff = SchemaComparer::new().compare(&declared, &live).unwrap();
		let names: Vec<&str> = diff.tables_to_drop.iter().map(|t| t.name.as_str()).collect();
		assert_eq!(names, vec!["legacy"]);
	}

	#[test]
	fn modify_entry_carries_only_differing_fields() {
		let mut declared = DatabaseSchema::new();
		let mut declared_users = table("users", vec![int_pk(), varchar("username", 255)]);
		declared_users
			.columns
			.get_mut("username")
			.unwrap()
			.nullable = true;
		declared.add_table(declared_users);

		let mut live = DatabaseSchema::new();
		live.add_table(table("users", vec![int_pk(), varchar("username", 100)]));

		let diff = SchemaComparer::new().compare(&declared, &live).unwrap();
		assert_eq!(diff.table_changes.len(), 1);
		let modification = &diff.table_changes[0].columns_to_modify[0];
		assert_eq!(modification.column, "username");
		assert_eq!(modification.changes.len(), 2);
		assert!(modification.changes.contains_key(&ColumnField::Length));
		assert!(modification.changes.contains_key(&ColumnField::Nullable));
		assert!(!modification.changes.contains_key(&ColumnField::Type));
	}

	#[test]
	fn comment_difference_does_not_trigger_modify() {
		let mut declared = DatabaseSchema::new();
		let mut declared_users = table("users", vec![int_pk()]);
		declared_users.columns.get_mut("id").unwrap().comment = Some("pk".to_string());
		declared.add_table(declared_users);

		let mut live = DatabaseSchema::new();
		live.add_table(table("users", vec![int_pk()]));

		let diff = SchemaComparer::new().compare(&declared, &live).unwrap();
		assert!(diff.is_empty());
	}

	#[test]
	fn integer_display_width_is_cosmetic() {
		let mut declared = DatabaseSchema::new();
		declared.add_table(table("users", vec![int_pk()]));

		let mut live = DatabaseSchema::new();
		let mut live_users = table("users", vec![int_pk()]);
		live_users.columns.get_mut("id").unwrap().length = Some(11);
		live.add_table(live_users);

		let diff = SchemaComparer::new().compare(&declared, &live).unwrap();
		assert!(diff.is_empty());
	}

	#[test]
	fn changed_foreign_key_becomes_drop_and_add() {
		let fk = |on_delete| ForeignKeySchema {
			name: "fk_users_unit_id_units".to_string(),
			column: "unit_id".to_string(),
			referenced_table: "units".to_string(),
			referenced_column: "id".to_string(),
			on_delete,
			on_update: ReferentialRule::Restrict,
		};
		let mut declared_users = table("users", vec![int_pk()]);
		declared_users
			.foreign_keys
			.insert(fk(ReferentialRule::Cascade).name.clone(), fk(ReferentialRule::Cascade));
		let mut live_users = table("users", vec![int_pk()]);
		live_users
			.foreign_keys
			.insert(fk(ReferentialRule::Restrict).name.clone(), fk(ReferentialRule::Restrict));

		let mut declared = DatabaseSchema::new();
		declared.add_table(declared_users);
		let mut live = DatabaseSchema::new();
		live.add_table(live_users);
		// units exists on both sides so only the fk differs
		declared.add_table(table("units", vec![int_pk()]));
		live.add_table(table("units", vec![int_pk()]));

		let diff = SchemaComparer::new().compare(&declared, &live).unwrap();
		let change = &diff.table_changes[0];
		assert_eq!(change.foreign_keys_to_drop.len(), 1);
		assert_eq!(change.foreign_keys_to_add.len(), 1);
	}

	#[test]
	fn index_difference_is_drop_and_add() {
		let mut declared_users = table("users", vec![int_pk(), varchar("email", 255)]);
		declared_users.indexes.insert(
			"email".to_string(),
			IndexSchema {
				name: "email".to_string(),
				columns: vec!["email".to_string()],
				unique: true,
			},
		);
		let mut live_users = table("users", vec![int_pk(), varchar("email", 255)]);
		live_users.indexes.insert(
			"email".to_string(),
			IndexSchema {
				name: "email".to_string(),
				columns: vec!["email".to_string()],
				unique: false,
			},
		);

		let mut declared = DatabaseSchema::new();
		declared.add_table(declared_users);
		let mut live = DatabaseSchema::new();
		live.add_table(live_users);

		let diff = SchemaComparer::new().compare(&declared, &live).unwrap();
		let change = &diff.table_changes[0];
		assert_eq!(change.indexes_to_drop.len(), 1);
		assert_eq!(change.indexes_to_add.len(), 1);
	}
}
