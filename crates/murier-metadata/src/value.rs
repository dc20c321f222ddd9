//! Application-side and column-native value representations.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::fmt;

/// A value as application code holds it, before column conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	DateTime(NaiveDateTime),
	Json(serde_json::Value),
}

impl PropertyValue {
	pub fn is_null(&self) -> bool {
		matches!(self, PropertyValue::Null)
	}

	/// Short label used in error messages.
	pub fn type_label(&self) -> &'static str {
		match self {
			PropertyValue::Null => "null",
			PropertyValue::Bool(_) => "bool",
			PropertyValue::Int(_) => "int",
			PropertyValue::Float(_) => "float",
			PropertyValue::String(_) => "string",
			PropertyValue::Bytes(_) => "bytes",
			PropertyValue::DateTime(_) => "datetime",
			PropertyValue::Json(_) => "json",
		}
	}
}

impl From<bool> for PropertyValue {
	fn from(v: bool) -> Self {
		PropertyValue::Bool(v)
	}
}

impl From<i32> for PropertyValue {
	fn from(v: i32) -> Self {
		PropertyValue::Int(v as i64)
	}
}

impl From<i64> for PropertyValue {
	fn from(v: i64) -> Self {
		PropertyValue::Int(v)
	}
}

impl From<f64> for PropertyValue {
	fn from(v: f64) -> Self {
		PropertyValue::Float(v)
	}
}

impl From<&str> for PropertyValue {
	fn from(v: &str) -> Self {
		PropertyValue::String(v.to_string())
	}
}

impl From<String> for PropertyValue {
	fn from(v: String) -> Self {
		PropertyValue::String(v)
	}
}

impl From<NaiveDateTime> for PropertyValue {
	fn from(v: NaiveDateTime) -> Self {
		PropertyValue::DateTime(v)
	}
}

impl From<serde_json::Value> for PropertyValue {
	fn from(v: serde_json::Value) -> Self {
		PropertyValue::Json(v)
	}
}

impl<T> From<Option<T>> for PropertyValue
where
	T: Into<PropertyValue>,
{
	fn from(v: Option<T>) -> Self {
		match v {
			Some(v) => v.into(),
			None => PropertyValue::Null,
		}
	}
}

/// A value in column-native form, ready to bind to a statement parameter
/// or freshly decoded from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
	Null,
	Int(i64),
	UInt(u64),
	Float(f64),
	Decimal(Decimal),
	Text(String),
	Bytes(Vec<u8>),
	Date(NaiveDate),
	DateTime(NaiveDateTime),
	Time(NaiveTime),
	Json(serde_json::Value),
}

impl ColumnValue {
	pub fn is_null(&self) -> bool {
		matches!(self, ColumnValue::Null)
	}

	pub fn type_label(&self) -> &'static str {
		match self {
			ColumnValue::Null => "null",
			ColumnValue::Int(_) => "int",
			ColumnValue::UInt(_) => "uint",
			ColumnValue::Float(_) => "float",
			ColumnValue::Decimal(_) => "decimal",
			ColumnValue::Text(_) => "text",
			ColumnValue::Bytes(_) => "bytes",
			ColumnValue::Date(_) => "date",
			ColumnValue::DateTime(_) => "datetime",
			ColumnValue::Time(_) => "time",
			ColumnValue::Json(_) => "json",
		}
	}
}

impl fmt::Display for ColumnValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ColumnValue::Null => f.write_str("NULL"),
			ColumnValue::Int(v) => write!(f, "{v}"),
			ColumnValue::UInt(v) => write!(f, "{v}"),
			ColumnValue::Float(v) => write!(f, "{v}"),
			ColumnValue::Decimal(v) => write!(f, "{v}"),
			ColumnValue::Text(v) => write!(f, "{v}"),
			ColumnValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
			ColumnValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
			ColumnValue::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
			ColumnValue::Time(v) => write!(f, "{}", v.format("%H:%M:%S")),
			ColumnValue::Json(v) => write!(f, "{v}"),
		}
	}
}
