//! Parameterized DML statement rendering for MySQL.
//!
//! The unit of work talks to this narrow surface only; every statement
//! carries `?` placeholders and its parameter list in order.

use murier_metadata::value::ColumnValue;

/// One renderable statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
	pub sql: String,
	pub params: Vec<ColumnValue>,
}

/// Backtick-quote an identifier.
pub fn quote(identifier: &str) -> String {
	format!("`{}`", identifier.replace('`', "``"))
}

/// Renders INSERT/UPDATE/DELETE/SELECT statements.
pub struct SqlRenderer;

impl SqlRenderer {
	pub fn insert(table: &str, columns: &[String], params: Vec<ColumnValue>) -> Statement {
		let column_list: Vec<String> = columns.iter().map(|c| quote(c)).collect();
		let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
		Statement {
			sql: format!(
				"INSERT INTO {} ({}) VALUES ({})",
				quote(table),
				column_list.join(", "),
				placeholders.join(", ")
			),
			params,
		}
	}

	pub fn update(
		table: &str,
		columns: &[String],
		mut params: Vec<ColumnValue>,
		pk_column: &str,
		pk: ColumnValue,
	) -> Statement {
		let assignments: Vec<String> = columns.iter().map(|c| format!("{} = ?", quote(c))).collect();
		params.push(pk);
		Statement {
			sql: format!(
				"UPDATE {} SET {} WHERE {} = ?",
				quote(table),
				assignments.join(", "),
				quote(pk_column)
			),
			params,
		}
	}

	pub fn delete(table: &str, pk_column: &str, pk: ColumnValue) -> Statement {
		Statement {
			sql: format!(
				"DELETE FROM {} WHERE {} = ?",
				quote(table),
				quote(pk_column)
			),
			params: vec![pk],
		}
	}

	pub fn select_by_pk(
		table: &str,
		columns: &[String],
		pk_column: &str,
		pk: ColumnValue,
	) -> Statement {
		let column_list: Vec<String> = columns.iter().map(|c| quote(c)).collect();
		Statement {
			sql: format!(
				"SELECT {} FROM {} WHERE {} = ?",
				column_list.join(", "),
				quote(table),
				quote(pk_column)
			),
			params: vec![pk],
		}
	}

	/// SELECT with equality filters joined by AND. No filters selects the
	/// whole table.
	pub fn select_where(
		table: &str,
		columns: &[String],
		filter_columns: &[String],
		params: Vec<ColumnValue>,
	) -> Statement {
		let column_list: Vec<String> = columns.iter().map(|c| quote(c)).collect();
		let mut sql = format!("SELECT {} FROM {}", column_list.join(", "), quote(table));
		if !filter_columns.is_empty() {
			let filters: Vec<String> = filter_columns
				.iter()
				.map(|c| format!("{} = ?", quote(c)))
				.collect();
			sql.push_str(" WHERE ");
			sql.push_str(&filters.join(" AND "));
		}
		Statement { sql, params }
	}

	pub fn join_insert(
		table: &str,
		owner_column: &str,
		target_column: &str,
		owner: ColumnValue,
		target: ColumnValue,
	) -> Statement {
		Statement {
			sql: format!(
				"INSERT INTO {} ({}, {}) VALUES (?, ?)",
				quote(table),
				quote(owner_column),
				quote(target_column)
			),
			params: vec![owner, target],
		}
	}

	pub fn join_delete(
		table: &str,
		owner_column: &str,
		target_column: &str,
		owner: ColumnValue,
		target: ColumnValue,
	) -> Statement {
		Statement {
			sql: format!(
				"DELETE FROM {} WHERE {} = ? AND {} = ?",
				quote(table),
				quote(owner_column),
				quote(target_column)
			),
			params: vec![owner, target],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn insert_renders_placeholders_in_order() {
		let statement = SqlRenderer::insert(
			"users_test",
			&["username".to_string(), "unit_id".to_string()],
			vec![ColumnValue::Text("Alice".into()), ColumnValue::Int(3)],
		);
		assert_eq!(
			statement.sql,
			"INSERT INTO `users_test` (`username`, `unit_id`) VALUES (?, ?)"
		);
		assert_eq!(statement.params.len(), 2);
	}

	#[test]
	fn update_appends_pk_param_last() {
		let statement = SqlRenderer::update(
			"users_test",
			&["status".to_string()],
			vec![ColumnValue::Text("banned".into())],
			"id",
			ColumnValue::Int(7),
		);
		assert_eq!(
			statement.sql,
			"UPDATE `users_test` SET `status` = ? WHERE `id` = ?"
		);
		assert_eq!(statement.params.last(), Some(&ColumnValue::Int(7)));
	}

	#[test]
	fn quoting_escapes_backticks() {
		assert_eq!(quote("weird`name"), "`weird``name`");
	}

	#[test]
	fn select_where_joins_filters_with_and() {
		let statement = SqlRenderer::select_where(
			"users_test",
			&["id".to_string(), "username".to_string()],
			&["status".to_string(), "unit_id".to_string()],
			vec![ColumnValue::Text("active".into()), ColumnValue::Int(3)],
		);
		assert_eq!(
			statement.sql,
			"SELECT `id`, `username` FROM `users_test` WHERE `status` = ? AND `unit_id` = ?"
		);
	}

	#[test]
	fn select_where_without_filters_selects_all() {
		let statement =
			SqlRenderer::select_where("users_test", &["id".to_string()], &[], Vec::new());
		assert_eq!(statement.sql, "SELECT `id` FROM `users_test`");
	}
}
