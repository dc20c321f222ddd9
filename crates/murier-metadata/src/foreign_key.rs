//! Foreign-key declaration and the constraint naming convention.

use crate::types::ReferentialRule;

/// One foreign key owned by a table.
///
/// Constraint names are never declared by hand; they derive from the
/// stable convention `fk_{table}_{column}_{referenced_table}` so declared
/// and introspected constraints can be matched by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyMetadata {
	pub column: String,
	pub referenced_table: String,
	pub referenced_column: String,
	pub on_delete: ReferentialRule,
	pub on_update: ReferentialRule,
}

impl ForeignKeyMetadata {
	pub fn new(
		column: impl Into<String>,
		referenced_table: impl Into<String>,
		referenced_column: impl Into<String>,
	) -> Self {
		Self {
			column: column.into(),
			referenced_table: referenced_table.into(),
			referenced_column: referenced_column.into(),
			on_delete: ReferentialRule::default(),
			on_update: ReferentialRule::default(),
		}
	}

	pub fn on_delete(mut self, rule: ReferentialRule) -> Self {
		self.on_delete = rule;
		self
	}

	pub fn on_update(mut self, rule: ReferentialRule) -> Self {
		self.on_update = rule;
		self
	}

	/// The convention-derived constraint name.
	pub fn constraint_name(&self, table: &str) -> String {
		format!(
			"fk_{}_{}_{}",
			table, self.column, self.referenced_table
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn constraint_name_follows_convention() {
		let fk = ForeignKeyMetadata::new("unit_id", "units_test", "id");
		assert_eq!(
			fk.constraint_name("users_test"),
			"fk_users_test_unit_id_units_test"
		);
	}
}
