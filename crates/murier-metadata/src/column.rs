//! Per-column declaration record.

use crate::types::{ColumnKey, ColumnType};

/// Immutable description of one table column.
///
/// `property` is the entity-side field the column is mapped from; `name`
/// is the column name on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
	pub property: String,
	pub name: String,
	pub column_type: ColumnType,
	pub length: Option<u32>,
	pub nullable: bool,
	pub unsigned: bool,
	pub default: Option<String>,
	pub key: Option<ColumnKey>,
	pub extra: Option<String>,
	pub comment: Option<String>,
}

impl ColumnMetadata {
	pub fn new(property: impl Into<String>, name: impl Into<String>, column_type: ColumnType) -> Self {
		Self {
			property: property.into(),
			name: name.into(),
			column_type,
			length: None,
			nullable: false,
			unsigned: false,
			default: None,
			key: None,
			extra: None,
			comment: None,
		}
	}

	pub fn with_length(mut self, length: u32) -> Self {
		self.length = Some(length);
		self
	}

	pub fn nullable(mut self, nullable: bool) -> Self {
		self.nullable = nullable;
		self
	}

	pub fn unsigned(mut self, unsigned: bool) -> Self {
		self.unsigned = unsigned;
		self
	}

	pub fn with_default(mut self, default: impl Into<String>) -> Self {
		self.default = Some(default.into());
		self
	}

	pub fn with_key(mut self, key: ColumnKey) -> Self {
		self.key = Some(key);
		self
	}

	pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
		self.extra = Some(extra.into());
		self
	}

	pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());
		self
	}

	/// Primary-key participation.
	pub fn is_primary(&self) -> bool {
		self.key == Some(ColumnKey::Primary)
	}

	/// Whether the column value is produced by the server on insert.
	pub fn is_auto_increment(&self) -> bool {
		self.extra
			.as_deref()
			.is_some_and(|e| e.eq_ignore_ascii_case("auto_increment"))
	}

	/// Declared decimal scale, when the type carries one.
	pub fn scale(&self) -> Option<u8> {
		match self.column_type {
			ColumnType::Decimal { scale, .. } => Some(scale),
			_ => None,
		}
	}

	/// tinyint(1) is the MySQL boolean idiom and converts as such.
	pub fn is_boolean(&self) -> bool {
		self.column_type == ColumnType::TinyInt && self.length == Some(1)
	}
}
