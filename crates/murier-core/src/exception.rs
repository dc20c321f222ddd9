//! Error kinds shared across the metadata and codec layers.
//!
//! Higher layers (ORM, migrations) define their own error enums and lift
//! these kinds via `#[from]`.

use thiserror::Error;

/// Failures raised while building or querying entity metadata.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
	/// The type was never registered or lacks the entity marker.
	#[error("unknown entity `{type_name}`")]
	UnknownEntity { type_name: String },

	/// Two declared entities map to the same table.
	#[error("duplicate table `{table}`: declared by both `{first}` and `{second}`")]
	DuplicateTable {
		table: String,
		first: String,
		second: String,
	},

	/// A property name that does not exist on the entity.
	#[error("unknown property `{property}` on entity `{type_name}`")]
	UnknownProperty {
		type_name: String,
		property: String,
	},

	/// A declared relation points at a property or target that does not exist.
	#[error("invalid relation `{property}` on `{type_name}`: {reason}")]
	InvalidRelation {
		type_name: String,
		property: String,
		reason: String,
	},

	/// A structurally invalid declaration (missing or duplicated primary key,
	/// dangling foreign key, duplicate column).
	#[error("invalid entity `{type_name}`: {reason}")]
	InvalidEntity { type_name: String, reason: String },
}

/// Failures raised by explicit value conversions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
	/// The value cannot be coerced to the declared column type.
	#[error("type mismatch for column `{column}`: expected {expected}, got {actual}")]
	TypeMismatch {
		column: String,
		expected: String,
		actual: String,
	},

	/// A date/datetime string that does not parse on an explicit conversion.
	#[error("invalid date format: `{value}`")]
	InvalidDateFormat { value: String },

	/// JSON that cannot be encoded or decoded.
	#[error("invalid json for column `{column}`: {cause}")]
	InvalidJson { column: String, cause: String },
}
