//! Live-schema introspection from `information_schema`.

use crate::error::MigrationError;
use crate::recorder::HISTORY_TABLE;
use crate::schema::{ColumnSchema, DatabaseSchema, ForeignKeySchema, IndexSchema, TableSchema};
use murier_backends::Connection;
use murier_metadata::types::{ColumnKey, ColumnType, ReferentialRule};
use murier_metadata::value::ColumnValue;
use sqlx::Row;
use sqlx::mysql::MySqlRow;
use std::sync::Arc;
use tracing::debug;

/// Reads the live schema of one database into the normalized
/// representation the comparer consumes. The migration bookkeeping table
/// is excluded.
pub struct SchemaIntrospector {
	connection: Arc<Connection>,
}

impl SchemaIntrospector {
	pub fn new(connection: Arc<Connection>) -> Self {
		Self { connection }
	}

	pub async fn introspect(&self, database: &str) -> Result<DatabaseSchema, MigrationError> {
		let mut schema = DatabaseSchema::new();
		let database_param = [ColumnValue::Text(database.to_string())];

		let table_rows = self
			.connection
			.fetch_all(
				"SELECT TABLE_NAME, ENGINE, TABLE_COLLATION \
				 FROM information_schema.TABLES \
				 WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' \
				 ORDER BY TABLE_NAME",
				&database_param,
			)
			.await?;
		for row in table_rows {
			let name: String = get_text(&row, "TABLE_NAME")?;
			if name == HISTORY_TABLE {
				continue;
			}
			let mut table = TableSchema::new(&name);
			table.engine = get_text_opt(&row, "ENGINE")?;
			table.collation = get_text_opt(&row, "TABLE_COLLATION")?;
			table.charset = table
				.collation
				.as_deref()
				.and_then(|c| c.split('_').next())
				.map(|c| c.to_string());
			schema.add_table(table);
		}

		let column_rows = self
			.connection
			.fetch_all(
				"SELECT TABLE_NAME, COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, \
				 COLUMN_KEY, EXTRA, COLUMN_COMMENT \
				 FROM information_schema.COLUMNS \
				 WHERE TABLE_SCHEMA = ? \
				 ORDER BY TABLE_NAME, ORDINAL_POSITION",
				&database_param,
			)
			.await?;
		for row in column_rows {
			let table_name: String = get_text(&row, "TABLE_NAME")?;
			let Some(table) = schema.tables.get_mut(&table_name) else {
				continue;
			};
			let column = read_column(&row)?;
			table.columns.insert(column.name.clone(), column);
		}

		let index_rows = self
			.connection
			.fetch_all(
				"SELECT TABLE_NAME, INDEX_NAME, CAST(NON_UNIQUE AS SIGNED) AS NON_UNIQUE, \
				 COLUMN_NAME \
				 FROM information_schema.STATISTICS \
				 WHERE TABLE_SCHEMA = ? AND INDEX_NAME <> 'PRIMARY' \
				 ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX",
				&database_param,
			)
			.await?;
		for row in index_rows {
			let table_name: String = get_text(&row, "TABLE_NAME")?;
			let Some(table) = schema.tables.get_mut(&table_name) else {
				continue;
			};
			let index_name: String = get_text(&row, "INDEX_NAME")?;
			let non_unique: i64 = row.try_get("NON_UNIQUE").map_err(|e| mismatch(&e))?;
			let column_name: String = get_text(&row, "COLUMN_NAME")?;
			table
				.indexes
				.entry(index_name.clone())
				.or_insert_with(|| IndexSchema {
					name: index_name,
					columns: Vec::new(),
					unique: non_unique == 0,
				})
				.columns
				.push(column_name);
		}

		let fk_rows = self
			.connection
			.fetch_all(
				"SELECT kcu.TABLE_NAME, kcu.CONSTRAINT_NAME, kcu.COLUMN_NAME, \
				 kcu.REFERENCED_TABLE_NAME, kcu.REFERENCED_COLUMN_NAME, \
				 rc.DELETE_RULE, rc.UPDATE_RULE \
				 FROM information_schema.KEY_COLUMN_USAGE kcu \
				 JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
				 ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA \
				 AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
				 WHERE kcu.TABLE_SCHEMA = ? AND kcu.REFERENCED_TABLE_NAME IS NOT NULL \
				 ORDER BY kcu.TABLE_NAME, kcu.CONSTRAINT_NAME",
				&database_param,
			)
			.await?;
		for row in fk_rows {
			let table_name: String = get_text(&row, "TABLE_NAME")?;
			let Some(table) = schema.tables.get_mut(&table_name) else {
				continue;
			};
			let name: String = get_text(&row, "CONSTRAINT_NAME")?;
			let on_delete = parse_rule(&get_text(&row, "DELETE_RULE")?)?;
			let on_update = parse_rule(&get_text(&row, "UPDATE_RULE")?)?;
			let fk = ForeignKeySchema {
				name: name.clone(),
				column: get_text(&row, "COLUMN_NAME")?,
				referenced_table: get_text(&row, "REFERENCED_TABLE_NAME")?,
				referenced_column: get_text(&row, "REFERENCED_COLUMN_NAME")?,
				on_delete,
				on_update,
			};
			table.foreign_keys.insert(name, fk);
		}

		// InnoDB backs each foreign key with an index of the same name
		// when none exists; those are implementation detail, not schema.
		for table in schema.tables.values_mut() {
			let fk_names: Vec<String> = table.foreign_keys.keys().cloned().collect();
			for name in fk_names {
				table.indexes.shift_remove(&name);
			}
			table.indexes.sort_keys();
			table.foreign_keys.sort_keys();
		}

		debug!(
			database,
			tables = schema.tables.len(),
			"live schema introspected"
		);
		Ok(schema)
	}
}

fn read_column(row: &MySqlRow) -> Result<ColumnSchema, MigrationError> {
	let name: String = get_text(row, "COLUMN_NAME")?;
	let raw_type: String = get_text(row, "COLUMN_TYPE")?;
	let parsed = ColumnType::parse_column_type(&raw_type).ok_or_else(|| {
		MigrationError::SchemaMismatch {
			message: format!("unclassifiable column type `{raw_type}` on `{name}`"),
		}
	})?;
	let is_nullable: String = get_text(row, "IS_NULLABLE")?;
	let key: Option<String> = get_text_opt(row, "COLUMN_KEY")?;
	let extra: Option<String> = get_text_opt(row, "EXTRA")?;
	let comment: Option<String> = get_text_opt(row, "COLUMN_COMMENT")?;
	Ok(ColumnSchema {
		name,
		column_type: parsed.ty,
		length: parsed.length,
		nullable: is_nullable.eq_ignore_ascii_case("YES"),
		unsigned: parsed.unsigned,
		default: get_text_opt(row, "COLUMN_DEFAULT")?,
		key: key.as_deref().and_then(ColumnKey::from_information_schema),
		extra: extra.filter(|e| !e.is_empty()),
		comment: comment.filter(|c| !c.is_empty()),
	})
}

fn parse_rule(raw: &str) -> Result<ReferentialRule, MigrationError> {
	ReferentialRule::from_sql(raw).ok_or_else(|| MigrationError::SchemaMismatch {
		message: format!("unclassifiable referential rule `{raw}`"),
	})
}

fn get_text(row: &MySqlRow, column: &str) -> Result<String, MigrationError> {
	row.try_get::<String, _>(column).map_err(|e| mismatch(&e))
}

fn get_text_opt(row: &MySqlRow, column: &str) -> Result<Option<String>, MigrationError> {
	row.try_get::<Option<String>, _>(column)
		.map_err(|e| mismatch(&e))
}

fn mismatch(error: &sqlx::Error) -> MigrationError {
	MigrationError::SchemaMismatch {
		message: error.to_string(),
	}
}
