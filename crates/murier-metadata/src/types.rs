//! Column type vocabulary for the MySQL family.
//!
//! The set is closed: every declarable column type is a variant here, and
//! the schema introspector parses `information_schema` type text back into
//! the same vocabulary so declared and live schemas compare exactly.

use std::fmt;

/// Semantic column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
	TinyInt,
	SmallInt,
	MediumInt,
	Int,
	BigInt,
	Decimal { precision: u8, scale: u8 },
	Float,
	Double,
	Char,
	VarChar,
	TinyText,
	Text,
	MediumText,
	LongText,
	Binary,
	VarBinary,
	TinyBlob,
	Blob,
	MediumBlob,
	LongBlob,
	Date,
	Time,
	DateTime,
	Timestamp,
	Year,
	Enum { choices: Vec<String> },
	Set { choices: Vec<String> },
	Json,
	Geometry,
	Point,
	LineString,
	Polygon,
}

/// Broad conversion family, the unit the value codec dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
	Integer,
	Numeric,
	Textual,
	Binary,
	Temporal,
	Json,
	Spatial,
}

impl ColumnType {
	pub fn family(&self) -> TypeFamily {
		match self {
			ColumnType::TinyInt
			| ColumnType::SmallInt
			| ColumnType::MediumInt
			| ColumnType::Int
			| ColumnType::BigInt
			| ColumnType::Year => TypeFamily::Integer,
			ColumnType::Decimal { .. } | ColumnType::Float | ColumnType::Double => {
				TypeFamily::Numeric
			}
			ColumnType::Char
			| ColumnType::VarChar
			| ColumnType::TinyText
			| ColumnType::Text
			| ColumnType::MediumText
			| ColumnType::LongText
			| ColumnType::Time
			| ColumnType::Enum { .. }
			| ColumnType::Set { .. } => TypeFamily::Textual,
			ColumnType::Binary
			| ColumnType::VarBinary
			| ColumnType::TinyBlob
			| ColumnType::Blob
			| ColumnType::MediumBlob
			| ColumnType::LongBlob => TypeFamily::Binary,
			ColumnType::Date | ColumnType::DateTime | ColumnType::Timestamp => TypeFamily::Temporal,
			ColumnType::Json => TypeFamily::Json,
			ColumnType::Geometry
			| ColumnType::Point
			| ColumnType::LineString
			| ColumnType::Polygon => TypeFamily::Spatial,
		}
	}

	/// The bare MySQL type keyword, without length or modifiers.
	pub fn sql_keyword(&self) -> &'static str {
		match self {
			ColumnType::TinyInt => "tinyint",
			ColumnType::SmallInt => "smallint",
			ColumnType::MediumInt => "mediumint",
			ColumnType::Int => "int",
			ColumnType::BigInt => "bigint",
			ColumnType::Decimal { .. } => "decimal",
			ColumnType::Float => "float",
			ColumnType::Double => "double",
			ColumnType::Char => "char",
			ColumnType::VarChar => "varchar",
			ColumnType::TinyText => "tinytext",
			ColumnType::Text => "text",
			ColumnType::MediumText => "mediumtext",
			ColumnType::LongText => "longtext",
			ColumnType::Binary => "binary",
			ColumnType::VarBinary => "varbinary",
			ColumnType::TinyBlob => "tinyblob",
			ColumnType::Blob => "blob",
			ColumnType::MediumBlob => "mediumblob",
			ColumnType::LongBlob => "longblob",
			ColumnType::Date => "date",
			ColumnType::Time => "time",
			ColumnType::DateTime => "datetime",
			ColumnType::Timestamp => "timestamp",
			ColumnType::Year => "year",
			ColumnType::Enum { .. } => "enum",
			ColumnType::Set { .. } => "set",
			ColumnType::Json => "json",
			ColumnType::Geometry => "geometry",
			ColumnType::Point => "point",
			ColumnType::LineString => "linestring",
			ColumnType::Polygon => "polygon",
		}
	}

	/// Render the full DDL type fragment, e.g. `varchar(255)` or
	/// `decimal(10,2)` or `enum('a','b')`.
	pub fn ddl_fragment(&self, length: Option<u32>) -> String {
		match self {
			ColumnType::Decimal { precision, scale } => {
				format!("decimal({precision},{scale})")
			}
			ColumnType::Enum { choices } | ColumnType::Set { choices } => {
				let quoted: Vec<String> = choices
					.iter()
					.map(|c| format!("'{}'", c.replace('\'', "''")))
					.collect();
				format!("{}({})", self.sql_keyword(), quoted.join(","))
			}
			_ => match length {
				Some(len) => format!("{}({})", self.sql_keyword(), len),
				None => self.sql_keyword().to_string(),
			},
		}
	}

	/// Parse an `information_schema.columns.COLUMN_TYPE` value, e.g.
	/// `int(11) unsigned`, `varchar(255)`, `decimal(10,2)` or
	/// `enum('a','b')`. Returns the type, the declared length and the
	/// unsigned flag, or `None` for a shape outside the vocabulary.
	pub fn parse_column_type(raw: &str) -> Option<ParsedColumnType> {
		let lowered = raw.trim().to_ascii_lowercase();
		let unsigned = lowered.contains("unsigned");
		let head = lowered.split_whitespace().next()?;
		let (keyword, args) = match head.find('(') {
			Some(open) => {
				let close = head.rfind(')')?;
				(&head[..open], Some(&head[open + 1..close]))
			}
			None => (head, None),
		};

		let length = |args: Option<&str>| -> Option<u32> { args.and_then(|a| a.parse().ok()) };
		let ty = match keyword {
			"tinyint" => ColumnType::TinyInt,
			"smallint" => ColumnType::SmallInt,
			"mediumint" => ColumnType::MediumInt,
			"int" | "integer" => ColumnType::Int,
			"bigint" => ColumnType::BigInt,
			"decimal" | "numeric" => {
				let mut parts = args.unwrap_or("10,0").splitn(2, ',');
				let precision = parts.next()?.trim().parse().ok()?;
				let scale = parts.next().unwrap_or("0").trim().parse().ok()?;
				return Some(ParsedColumnType {
					ty: ColumnType::Decimal { precision, scale },
					length: None,
					unsigned,
				});
			}
			"float" => ColumnType::Float,
			"double" | "real" => ColumnType::Double,
			"char" => ColumnType::Char,
			"varchar" => ColumnType::VarChar,
			"tinytext" => ColumnType::TinyText,
			"text" => ColumnType::Text,
			"mediumtext" => ColumnType::MediumText,
			"longtext" => ColumnType::LongText,
			"binary" => ColumnType::Binary,
			"varbinary" => ColumnType::VarBinary,
			"tinyblob" => ColumnType::TinyBlob,
			"blob" => ColumnType::Blob,
			"mediumblob" => ColumnType::MediumBlob,
			"longblob" => ColumnType::LongBlob,
			"date" => ColumnType::Date,
			"time" => ColumnType::Time,
			"datetime" => ColumnType::DateTime,
			"timestamp" => ColumnType::Timestamp,
			"year" => ColumnType::Year,
			"enum" | "set" => {
				let choices = parse_choices(args.unwrap_or(""));
				let ty = if keyword == "enum" {
					ColumnType::Enum { choices }
				} else {
					ColumnType::Set { choices }
				};
				return Some(ParsedColumnType {
					ty,
					length: None,
					unsigned,
				});
			}
			"json" => ColumnType::Json,
			"geometry" => ColumnType::Geometry,
			"point" => ColumnType::Point,
			"linestring" => ColumnType::LineString,
			"polygon" => ColumnType::Polygon,
			_ => return None,
		};
		let length = length(args);
		Some(ParsedColumnType {
			ty,
			length,
			unsigned,
		})
	}
}

impl fmt::Display for ColumnType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.ddl_fragment(None))
	}
}

/// Result of parsing a live `COLUMN_TYPE` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedColumnType {
	pub ty: ColumnType,
	pub length: Option<u32>,
	pub unsigned: bool,
}

fn parse_choices(args: &str) -> Vec<String> {
	let mut choices = Vec::new();
	let mut current = String::new();
	let mut in_quote = false;
	let mut chars = args.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'\'' if !in_quote => in_quote = true,
			'\'' if in_quote => {
				if chars.peek() == Some(&'\'') {
					chars.next();
					current.push('\'');
				} else {
					in_quote = false;
					choices.push(std::mem::take(&mut current));
				}
			}
			_ if in_quote => current.push(c),
			_ => {}
		}
	}
	choices
}

/// Key participation tag reported per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKey {
	Primary,
	Unique,
	Multiple,
}

impl ColumnKey {
	pub fn from_information_schema(raw: &str) -> Option<ColumnKey> {
		match raw {
			"PRI" => Some(ColumnKey::Primary),
			"UNI" => Some(ColumnKey::Unique),
			"MUL" => Some(ColumnKey::Multiple),
			_ => None,
		}
	}
}

/// Referential action on a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialRule {
	Cascade,
	SetNull,
	#[default]
	Restrict,
	NoAction,
	SetDefault,
}

impl ReferentialRule {
	pub fn as_sql(&self) -> &'static str {
		match self {
			ReferentialRule::Cascade => "CASCADE",
			ReferentialRule::SetNull => "SET NULL",
			ReferentialRule::Restrict => "RESTRICT",
			ReferentialRule::NoAction => "NO ACTION",
			ReferentialRule::SetDefault => "SET DEFAULT",
		}
	}

	pub fn from_sql(raw: &str) -> Option<ReferentialRule> {
		match raw.trim().to_ascii_uppercase().as_str() {
			"CASCADE" => Some(ReferentialRule::Cascade),
			"SET NULL" => Some(ReferentialRule::SetNull),
			"RESTRICT" => Some(ReferentialRule::Restrict),
			"NO ACTION" => Some(ReferentialRule::NoAction),
			"SET DEFAULT" => Some(ReferentialRule::SetDefault),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_plain_int() {
		let parsed = ColumnType::parse_column_type("int(11)").unwrap();
		assert_eq!(parsed.ty, ColumnType::Int);
		assert_eq!(parsed.length, Some(11));
		assert!(!parsed.unsigned);
	}

	#[test]
	fn parses_unsigned_bigint() {
		let parsed = ColumnType::parse_column_type("bigint(20) unsigned").unwrap();
		assert_eq!(parsed.ty, ColumnType::BigInt);
		assert!(parsed.unsigned);
	}

	#[test]
	fn parses_decimal_precision_scale() {
		let parsed = ColumnType::parse_column_type("decimal(10,2)").unwrap();
		assert_eq!(
			parsed.ty,
			ColumnType::Decimal {
				precision: 10,
				scale: 2
			}
		);
	}

	#[test]
	fn parses_enum_choices() {
		let parsed = ColumnType::parse_column_type("enum('active','banned')").unwrap();
		assert_eq!(
			parsed.ty,
			ColumnType::Enum {
				choices: vec!["active".to_string(), "banned".to_string()]
			}
		);
	}

	#[test]
	fn parses_quoted_quote_in_choice() {
		let parsed = ColumnType::parse_column_type("enum('it''s','b')").unwrap();
		assert_eq!(
			parsed.ty,
			ColumnType::Enum {
				choices: vec!["it's".to_string(), "b".to_string()]
			}
		);
	}

	#[test]
	fn rejects_unknown_keyword() {
		assert!(ColumnType::parse_column_type("frobnicate(3)").is_none());
	}

	#[test]
	fn ddl_fragment_renders_length_and_choices() {
		assert_eq!(ColumnType::VarChar.ddl_fragment(Some(255)), "varchar(255)");
		assert_eq!(
			ColumnType::Decimal {
				precision: 8,
				scale: 3
			}
			.ddl_fragment(None),
			"decimal(8,3)"
		);
		assert_eq!(
			ColumnType::Enum {
				choices: vec!["a".to_string(), "b".to_string()]
			}
			.ddl_fragment(None),
			"enum('a','b')"
		);
	}
}
