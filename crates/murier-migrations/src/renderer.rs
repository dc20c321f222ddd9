//! Rendering of schema differences into MySQL DDL.
//!
//! `render_up` applies a difference; `render_down` inverts it using the
//! `from` side of every modification. Destructive statements (table and
//! column drops) carry a leading marker comment.

use crate::diff::{ColumnModification, SchemaDifference, TableDifference};
use crate::schema::{ColumnSchema, ForeignKeySchema, IndexSchema, TableSchema};

const DESTRUCTIVE_MARK: &str = "-- [destructive]";

fn quote(identifier: &str) -> String {
	format!("`{}`", identifier.replace('`', "``"))
}

/// Renders diffs to ordered statement lists.
pub struct DdlRenderer;

impl DdlRenderer {
	/// Statements that take a live schema to the declared schema.
	pub fn render_up(difference: &SchemaDifference) -> Vec<String> {
		let mut statements = Vec::new();
		for table in &difference.tables_to_create {
			statements.push(Self::create_table(table));
		}
		for change in &difference.table_changes {
			statements.extend(Self::render_table_change(change));
		}
		for table in &difference.tables_to_drop {
			statements.push(Self::drop_table(&table.name));
		}
		statements
	}

	/// The symmetric inverse: created tables drop, dropped tables are
	/// recreated from their captured schema, modifications swap sides.
	pub fn render_down(difference: &SchemaDifference) -> Vec<String> {
		let mut statements = Vec::new();
		for table in difference.tables_to_drop.iter().rev() {
			statements.push(Self::create_table(table));
		}
		for change in difference.table_changes.iter().rev() {
			statements.extend(Self::render_table_change(&invert_change(change)));
		}
		for table in difference.tables_to_create.iter().rev() {
			statements.push(Self::drop_table(&table.name));
		}
		statements
	}

	pub fn create_table(table: &TableSchema) -> String {
		let mut parts: Vec<String> = table
			.columns
			.values()
			.map(|c| format!("  {}", Self::column_ddl(c)))
			.collect();
		if let Some(pk) = table.primary_key() {
			parts.push(format!("  PRIMARY KEY ({})", quote(&pk.name)));
		}
		for index in table.indexes.values() {
			parts.push(format!("  {}", index_ddl(index)));
		}
		for fk in table.foreign_keys.values() {
			parts.push(format!("  {}", foreign_key_ddl(fk)));
		}

		let mut options = Vec::new();
		if let Some(engine) = &table.engine {
			options.push(format!("ENGINE={engine}"));
		}
		if let Some(charset) = &table.charset {
			options.push(format!("DEFAULT CHARSET={charset}"));
		}
		if let Some(collation) = &table.collation {
			options.push(format!("COLLATE={collation}"));
		}
		let options = if options.is_empty() {
			String::new()
		} else {
			format!(" {}", options.join(" "))
		};

		format!(
			"CREATE TABLE {} (\n{}\n){}",
			quote(&table.name),
			parts.join(",\n"),
			options
		)
	}

	pub fn drop_table(name: &str) -> String {
		format!(
			"{DESTRUCTIVE_MARK} drops table {name}\nDROP TABLE {}",
			quote(name)
		)
	}

	fn render_table_change(change: &TableDifference) -> Vec<String> {
		let table = quote(&change.table);
		let mut statements = Vec::new();

		// Constraint drops come first so column changes never run against
		// a live foreign key.
		for fk in &change.foreign_keys_to_drop {
			statements.push(format!(
				"ALTER TABLE {table} DROP FOREIGN KEY {}",
				quote(&fk.name)
			));
		}
		for index in &change.indexes_to_drop {
			statements.push(format!("ALTER TABLE {table} DROP INDEX {}", quote(&index.name)));
		}
		for column in &change.columns_to_add {
			statements.push(format!(
				"ALTER TABLE {table} ADD COLUMN {}",
				Self::column_ddl(column)
			));
		}
		for modification in &change.columns_to_modify {
			statements.push(format!(
				"ALTER TABLE {table} MODIFY COLUMN {}",
				Self::column_ddl(&modification.to)
			));
		}
		for column in &change.columns_to_drop {
			statements.push(format!(
				"{DESTRUCTIVE_MARK} drops column {}.{}\nALTER TABLE {table} DROP COLUMN {}",
				change.table,
				column.name,
				quote(&column.name)
			));
		}
		for index in &change.indexes_to_add {
			statements.push(format!("ALTER TABLE {table} ADD {}", index_ddl(index)));
		}
		for fk in &change.foreign_keys_to_add {
			statements.push(format!("ALTER TABLE {table} ADD {}", foreign_key_ddl(fk)));
		}
		statements
	}

	pub fn column_ddl(column: &ColumnSchema) -> String {
		let mut ddl = format!(
			"{} {}",
			quote(&column.name),
			column.column_type.ddl_fragment(column.length)
		);
		if column.unsigned {
			ddl.push_str(" unsigned");
		}
		ddl.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
		if let Some(default) = &column.default {
			if is_default_keyword(default) {
				ddl.push_str(&format!(" DEFAULT {default}"));
			} else {
				ddl.push_str(&format!(" DEFAULT '{}'", default.replace('\'', "''")));
			}
		}
		if column
			.extra
			.as_deref()
			.is_some_and(|e| e.eq_ignore_ascii_case("auto_increment"))
		{
			ddl.push_str(" AUTO_INCREMENT");
		}
		if let Some(comment) = &column.comment {
			ddl.push_str(&format!(" COMMENT '{}'", comment.replace('\'', "''")));
		}
		ddl
	}
}

fn index_ddl(index: &IndexSchema) -> String {
	let columns: Vec<String> = index.columns.iter().map(|c| quote(c)).collect();
	let kind = if index.unique { "UNIQUE KEY" } else { "KEY" };
	format!("{kind} {} ({})", quote(&index.name), columns.join(", "))
}

fn foreign_key_ddl(fk: &ForeignKeySchema) -> String {
	format!(
		"CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
		quote(&fk.name),
		quote(&fk.column),
		quote(&fk.referenced_table),
		quote(&fk.referenced_column),
		fk.on_delete.as_sql(),
		fk.on_update.as_sql()
	)
}

fn is_default_keyword(default: &str) -> bool {
	let upper = default.to_ascii_uppercase();
	upper == "CURRENT_TIMESTAMP" || upper == "NULL" || upper.starts_with("CURRENT_TIMESTAMP(")
}

/// Swap every add/drop and the two sides of each modification.
fn invert_change(change: &TableDifference) -> TableDifference {
	TableDifference {
		table: change.table.clone(),
		columns_to_add: change.columns_to_drop.clone(),
		columns_to_drop: change.columns_to_add.clone(),
		columns_to_modify: change
			.columns_to_modify
			.iter()
			.map(|m| ColumnModification {
				column: m.column.clone(),
				from: m.to.clone(),
				to: m.from.clone(),
				changes: m
					.changes
					.iter()
					.map(|(field, (from, to))| (*field, (to.clone(), from.clone())))
					.collect(),
			})
			.collect(),
		foreign_keys_to_add: change.foreign_keys_to_drop.clone(),
		foreign_keys_to_drop: change.foreign_keys_to_add.clone(),
		indexes_to_add: change.indexes_to_drop.clone(),
		indexes_to_drop: change.indexes_to_add.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use indexmap::IndexMap;
	use murier_metadata::types::{ColumnKey, ColumnType, ReferentialRule};

	fn users_table() -> TableSchema {
		let mut table = TableSchema::new("users");
		table.engine = Some("InnoDB".to_string());
		table.charset = Some("utf8mb4".to_string());
		table.columns.insert(
			"id".to_string(),
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
			},
		);
		table.columns.insert(
			"username".to_string(),
			ColumnSchema {
				name: "username".to_string(),
				column_type: ColumnType::VarChar,
				length: Some(255),
				nullable: false,
				unsigned: false,
				default: None,
				key: None,
				extra: None,
				comment: None,
			},
		);
		table
	}

	#[test]
	fn create_table_renders_columns_and_options() {
		let sql = DdlRenderer::create_table(&users_table());
		assert!(sql.starts_with("CREATE TABLE `users`"));
		assert!(sql.contains("`id` int unsigned NOT NULL AUTO_INCREMENT"));
		assert!(sql.contains("`username` varchar(255) NOT NULL"));
		assert!(sql.contains("PRIMARY KEY (`id`)"));
		assert!(sql.contains("ENGINE=InnoDB"));
		assert!(sql.contains("DEFAULT CHARSET=utf8mb4"));
	}

	#[test]
	fn up_and_down_are_symmetric_for_creation() {
		let difference = SchemaDifference {
			tables_to_create: vec![users_table()],
			..SchemaDifference::default()
		};
		let up = DdlRenderer::render_up(&difference);
		let down = DdlRenderer::render_down(&difference);
		assert_eq!(up.len(), 1);
		assert!(up[0].starts_with("CREATE TABLE"));
		assert_eq!(down.len(), 1);
		assert!(down[0].contains("DROP TABLE `users`"));
		assert!(down[0].starts_with(DESTRUCTIVE_MARK));
	}

	#[test]
	fn dropped_column_reappears_in_down_with_original_shape() {
		let dropped = ColumnSchema {
			name: "legacy_flag".to_string(),
			column_type: ColumnType::TinyInt,
			length: Some(1),
			nullable: true,
			unsigned: false,
			default: Some("0".to_string()),
			key: None,
			extra: None,
			comment: None,
		};
		let difference = SchemaDifference {
			table_changes: vec![TableDifference {
				table: "users".to_string(),
				columns_to_drop: vec![dropped],
				..TableDifference::default()
			}],
			..SchemaDifference::default()
		};

		let up = DdlRenderer::render_up(&difference);
		assert_eq!(up.len(), 1);
		assert!(up[0].starts_with(DESTRUCTIVE_MARK));
		assert!(up[0].contains("DROP COLUMN `legacy_flag`"));

		let down = DdlRenderer::render_down(&difference);
		assert_eq!(down.len(), 1);
		assert_eq!(
			down[0],
			"ALTER TABLE `users` ADD COLUMN `legacy_flag` tinyint(1) NULL DEFAULT '0'"
		);
	}

	#[test]
	fn modification_down_uses_from_side() {
		let from = ColumnSchema {
			name: "status".to_string(),
			column_type: ColumnType::VarChar,
			length: Some(16),
			nullable: false,
			unsigned: false,
			default: None,
			key: None,
			extra: None,
			comment: None,
		};
		let mut to = from.clone();
		to.length = Some(64);
		let difference = SchemaDifference {
			table_changes: vec![TableDifference {
				table: "users".to_string(),
				columns_to_modify: vec![ColumnModification {
					column: "status".to_string(),
					from,
					to,
					changes: IndexMap::new(),
				}],
				..TableDifference::default()
			}],
			..SchemaDifference::default()
		};

		let up = DdlRenderer::render_up(&difference);
		assert_eq!(
			up[0],
			"ALTER TABLE `users` MODIFY COLUMN `status` varchar(64) NOT NULL"
		);
		let down = DdlRenderer::render_down(&difference);
		assert_eq!(
			down[0],
			"ALTER TABLE `users` MODIFY COLUMN `status` varchar(16) NOT NULL"
		);
	}

	#[test]
	fn foreign_key_ddl_carries_rules() {
		let fk = ForeignKeySchema {
			name: "fk_users_unit_id_units".to_string(),
			column: "unit_id".to_string(),
			referenced_table: "units".to_string(),
			referenced_column: "id".to_string(),
			on_delete: ReferentialRule::SetNull,
			on_update: ReferentialRule::Cascade,
		};
		let sql = foreign_key_ddl(&fk);
		assert!(sql.contains("ON DELETE SET NULL"));
		assert!(sql.contains("ON UPDATE CASCADE"));
	}
}
