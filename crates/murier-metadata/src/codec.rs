//! Bidirectional conversion between application values and column-native
//! values, keyed by the declared column type.
//!
//! The codec is pure and stateless; converting an already-normalized value
//! again yields the same value. The one impurity the contract demands is
//! the current-time fallback for unparseable temporal values on implicit
//! reads — explicit conversions fail with [`CodecError::InvalidDateFormat`]
//! instead.

use crate::column::ColumnMetadata;
use crate::types::TypeFamily;
use crate::value::{ColumnValue, PropertyValue};
use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use murier_core::exception::CodecError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Stateless conversion routines.
pub struct ValueCodec;

impl ValueCodec {
	/// Convert an application value to its column-native form.
	pub fn to_column(
		value: &PropertyValue,
		column: &ColumnMetadata,
	) -> Result<ColumnValue, CodecError> {
		if column.is_boolean() {
			return Ok(Self::to_boolean_column(value));
		}
		match column.column_type.family() {
			TypeFamily::Integer => Ok(Self::to_integer_column(value)),
			TypeFamily::Numeric => Ok(Self::to_numeric_column(value, column)),
			TypeFamily::Textual => Self::to_textual_column(value, column),
			TypeFamily::Binary => Self::to_binary_column(value, column),
			TypeFamily::Temporal => Self::to_temporal_column(value, column),
			TypeFamily::Json => Self::to_json_column(value, column),
			TypeFamily::Spatial => Self::to_spatial_column(value, column),
		}
	}

	/// Convert a column-native value back to an application value,
	/// failing on malformed temporal text.
	pub fn from_column(
		value: &ColumnValue,
		column: &ColumnMetadata,
	) -> Result<PropertyValue, CodecError> {
		Self::from_column_inner(value, column, false)
	}

	/// Conversion used when hydrating rows: malformed temporal text falls
	/// back to the current time instead of failing.
	pub fn from_column_implicit(value: &ColumnValue, column: &ColumnMetadata) -> PropertyValue {
		Self::from_column_inner(value, column, true).unwrap_or(PropertyValue::Null)
	}

	fn to_boolean_column(value: &PropertyValue) -> ColumnValue {
		match value {
			PropertyValue::Null => ColumnValue::Null,
			PropertyValue::Bool(b) => ColumnValue::Int(i64::from(*b)),
			PropertyValue::Int(v) => ColumnValue::Int(i64::from(*v != 0)),
			PropertyValue::Float(v) => ColumnValue::Int(i64::from(*v != 0.0)),
			PropertyValue::String(s) => ColumnValue::Int(i64::from(sanitize_numeric(s) != 0.0)),
			_ => ColumnValue::Int(0),
		}
	}

	fn to_integer_column(value: &PropertyValue) -> ColumnValue {
		match value {
			PropertyValue::Null => ColumnValue::Null,
			PropertyValue::Bool(b) => ColumnValue::Int(i64::from(*b)),
			PropertyValue::Int(v) => ColumnValue::Int(*v),
			PropertyValue::Float(v) => ColumnValue::Int(*v as i64),
			PropertyValue::String(s) => ColumnValue::Int(sanitize_numeric(s) as i64),
			_ => ColumnValue::Int(0),
		}
	}

	fn to_numeric_column(value: &PropertyValue, column: &ColumnMetadata) -> ColumnValue {
		let float = match value {
			PropertyValue::Null => return ColumnValue::Null,
			PropertyValue::Bool(b) => f64::from(u8::from(*b)),
			PropertyValue::Int(v) => *v as f64,
			PropertyValue::Float(v) => *v,
			PropertyValue::String(s) => sanitize_numeric(s),
			_ => 0.0,
		};
		match column.scale() {
			Some(scale) => ColumnValue::Decimal(
				Decimal::from_f64_retain(float)
					.unwrap_or(Decimal::ZERO)
					.round_dp(u32::from(scale)),
			),
			None => ColumnValue::Float(float),
		}
	}

	fn to_textual_column(
		value: &PropertyValue,
		column: &ColumnMetadata,
	) -> Result<ColumnValue, CodecError> {
		let text = match value {
			PropertyValue::Null => String::new(),
			PropertyValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
			PropertyValue::Int(v) => v.to_string(),
			PropertyValue::Float(v) => v.to_string(),
			PropertyValue::String(s) => s.clone(),
			PropertyValue::DateTime(dt) => {
				if column.column_type == crate::types::ColumnType::Time {
					dt.format(TIME_FORMAT).to_string()
				} else {
					dt.format(DATETIME_FORMAT).to_string()
				}
			}
			PropertyValue::Json(v) => {
				serde_json::to_string(v).map_err(|e| CodecError::InvalidJson {
					column: column.name.clone(),
					cause: e.to_string(),
				})?
			}
			PropertyValue::Bytes(_) => {
				return Err(CodecError::TypeMismatch {
					column: column.name.clone(),
					expected: "scalar or serializable value".to_string(),
					actual: value.type_label().to_string(),
				});
			}
		};
		Ok(ColumnValue::Text(text))
	}

	fn to_binary_column(
		value: &PropertyValue,
		column: &ColumnMetadata,
	) -> Result<ColumnValue, CodecError> {
		match value {
			PropertyValue::Null => Ok(ColumnValue::Null),
			PropertyValue::Bytes(b) => Ok(ColumnValue::Bytes(b.clone())),
			PropertyValue::String(s) => Ok(ColumnValue::Bytes(s.clone().into_bytes())),
			_ => Err(CodecError::TypeMismatch {
				column: column.name.clone(),
				expected: "byte string".to_string(),
				actual: value.type_label().to_string(),
			}),
		}
	}

	fn to_temporal_column(
		value: &PropertyValue,
		column: &ColumnMetadata,
	) -> Result<ColumnValue, CodecError> {
		let datetime = match value {
			PropertyValue::Null => return Ok(ColumnValue::Null),
			PropertyValue::DateTime(dt) => truncate_to_second(*dt),
			PropertyValue::String(s) => parse_datetime(s).ok_or_else(|| {
				CodecError::InvalidDateFormat { value: s.clone() }
			})?,
			_ => {
				return Err(CodecError::TypeMismatch {
					column: column.name.clone(),
					expected: "datetime or datetime string".to_string(),
					actual: value.type_label().to_string(),
				});
			}
		};
		if column.column_type == crate::types::ColumnType::Date {
			Ok(ColumnValue::Date(datetime.date()))
		} else {
			Ok(ColumnValue::DateTime(datetime))
		}
	}

	fn to_json_column(
		value: &PropertyValue,
		column: &ColumnMetadata,
	) -> Result<ColumnValue, CodecError> {
		match value {
			PropertyValue::Null => Ok(ColumnValue::Null),
			PropertyValue::Json(v) => Ok(ColumnValue::Json(v.clone())),
			PropertyValue::String(s) => {
				let parsed =
					serde_json::from_str(s).map_err(|e| CodecError::InvalidJson {
						column: column.name.clone(),
						cause: e.to_string(),
					})?;
				Ok(ColumnValue::Json(parsed))
			}
			PropertyValue::Bool(b) => Ok(ColumnValue::Json(serde_json::Value::Bool(*b))),
			PropertyValue::Int(v) => Ok(ColumnValue::Json(serde_json::Value::from(*v))),
			PropertyValue::Float(v) => Ok(ColumnValue::Json(serde_json::Value::from(*v))),
			_ => Err(CodecError::TypeMismatch {
				column: column.name.clone(),
				expected: "json-encodable value".to_string(),
				actual: value.type_label().to_string(),
			}),
		}
	}

	fn to_spatial_column(
		value: &PropertyValue,
		column: &ColumnMetadata,
	) -> Result<ColumnValue, CodecError> {
		match value {
			PropertyValue::Null => Ok(ColumnValue::Null),
			PropertyValue::Bytes(b) => Ok(ColumnValue::Bytes(b.clone())),
			PropertyValue::String(s) => Ok(ColumnValue::Text(s.clone())),
			_ => Err(CodecError::TypeMismatch {
				column: column.name.clone(),
				expected: "well-known-text or well-known-binary value".to_string(),
				actual: value.type_label().to_string(),
			}),
		}
	}

	fn from_column_inner(
		value: &ColumnValue,
		column: &ColumnMetadata,
		implicit: bool,
	) -> Result<PropertyValue, CodecError> {
		if value.is_null() {
			return Ok(PropertyValue::Null);
		}
		if column.is_boolean() {
			let truthy = match value {
				ColumnValue::Int(v) => *v != 0,
				ColumnValue::UInt(v) => *v != 0,
				ColumnValue::Text(s) => sanitize_numeric(s) != 0.0,
				_ => true,
			};
			return Ok(PropertyValue::Bool(truthy));
		}
		match column.column_type.family() {
			TypeFamily::Integer => Ok(match value {
				ColumnValue::Int(v) => PropertyValue::Int(*v),
				ColumnValue::UInt(v) => PropertyValue::Int(*v as i64),
				ColumnValue::Float(v) => PropertyValue::Int(*v as i64),
				ColumnValue::Text(s) => PropertyValue::Int(sanitize_numeric(s) as i64),
				_ => PropertyValue::Int(0),
			}),
			TypeFamily::Numeric => Ok(match value {
				ColumnValue::Decimal(d) => PropertyValue::Float(d.to_f64().unwrap_or(0.0)),
				ColumnValue::Float(v) => PropertyValue::Float(*v),
				ColumnValue::Int(v) => PropertyValue::Float(*v as f64),
				ColumnValue::UInt(v) => PropertyValue::Float(*v as f64),
				ColumnValue::Text(s) => PropertyValue::Float(sanitize_numeric(s)),
				_ => PropertyValue::Float(0.0),
			}),
			TypeFamily::Textual => Ok(match value {
				ColumnValue::Text(s) => PropertyValue::String(s.clone()),
				ColumnValue::Bytes(b) => {
					PropertyValue::String(String::from_utf8_lossy(b).into_owned())
				}
				other => PropertyValue::String(other.to_string()),
			}),
			TypeFamily::Binary => Ok(match value {
				ColumnValue::Bytes(b) => PropertyValue::Bytes(b.clone()),
				ColumnValue::Text(s) => PropertyValue::Bytes(s.clone().into_bytes()),
				other => PropertyValue::Bytes(other.to_string().into_bytes()),
			}),
			TypeFamily::Temporal => match value {
				ColumnValue::DateTime(dt) => Ok(PropertyValue::DateTime(*dt)),
				ColumnValue::Date(d) => Ok(PropertyValue::DateTime(midnight(*d))),
				ColumnValue::Text(s) => match parse_datetime(s) {
					Some(dt) => Ok(PropertyValue::DateTime(dt)),
					None if implicit => Ok(PropertyValue::DateTime(now())),
					None => Err(CodecError::InvalidDateFormat { value: s.clone() }),
				},
				_ => Err(CodecError::TypeMismatch {
					column: column.name.clone(),
					expected: "datetime".to_string(),
					actual: value.type_label().to_string(),
				}),
			},
			TypeFamily::Json => Ok(match value {
				ColumnValue::Json(v) => PropertyValue::Json(v.clone()),
				ColumnValue::Text(s) => PropertyValue::Json(
					serde_json::from_str(s).unwrap_or(serde_json::Value::Array(Vec::new())),
				),
				_ => PropertyValue::Json(serde_json::Value::Array(Vec::new())),
			}),
			TypeFamily::Spatial => Ok(match value {
				ColumnValue::Bytes(b) => PropertyValue::Bytes(b.clone()),
				ColumnValue::Text(s) => PropertyValue::String(s.clone()),
				other => PropertyValue::Bytes(other.to_string().into_bytes()),
			}),
		}
	}
}

fn truncate_to_second(dt: NaiveDateTime) -> NaiveDateTime {
	dt.with_nanosecond(0).unwrap_or(dt)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
	date.and_hms_opt(0, 0, 0).unwrap_or_else(now)
}

fn now() -> NaiveDateTime {
	truncate_to_second(Utc::now().naive_utc())
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
	let trimmed = raw.trim();
	if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT) {
		return Some(dt);
	}
	NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
		.ok()
		.and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Extract the leading numeric portion of a string, PHP-style: `"12abc"`
/// reads as 12, unparseable text reads as 0.
fn sanitize_numeric(raw: &str) -> f64 {
	let trimmed = raw.trim();
	if let Ok(v) = trimmed.parse::<f64>() {
		return v;
	}
	let mut numeric = String::new();
	let mut seen_dot = false;
	for (i, c) in trimmed.char_indices() {
		match c {
			'+' | '-' if i == 0 => numeric.push(c),
			'.' if !seen_dot => {
				seen_dot = true;
				numeric.push(c);
			}
			_ if c.is_ascii_digit() => numeric.push(c),
			_ => break,
		}
	}
	numeric.parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{ColumnKey, ColumnType};

	fn column(ty: ColumnType) -> ColumnMetadata {
		ColumnMetadata::new("field", "field", ty)
	}

	#[test]
	fn integers_coerce_from_everything() {
		let col = column(ColumnType::Int);
		let cases = [
			(PropertyValue::Int(42), ColumnValue::Int(42)),
			(PropertyValue::Bool(true), ColumnValue::Int(1)),
			(PropertyValue::Float(3.9), ColumnValue::Int(3)),
			(PropertyValue::String("17".into()), ColumnValue::Int(17)),
			(PropertyValue::String("12abc".into()), ColumnValue::Int(12)),
			(PropertyValue::String("junk".into()), ColumnValue::Int(0)),
			(PropertyValue::Null, ColumnValue::Null),
			(
				PropertyValue::Json(serde_json::json!({"a": 1})),
				ColumnValue::Int(0),
			),
		];
		for (input, expected) in cases {
			assert_eq!(ValueCodec::to_column(&input, &col).unwrap(), expected);
		}
	}

	#[test]
	fn tinyint_one_maps_booleans() {
		let col = column(ColumnType::TinyInt).with_length(1);
		assert_eq!(
			ValueCodec::to_column(&PropertyValue::Bool(true), &col).unwrap(),
			ColumnValue::Int(1)
		);
		assert_eq!(
			ValueCodec::to_column(&PropertyValue::Int(7), &col).unwrap(),
			ColumnValue::Int(1)
		);
		assert_eq!(
			ValueCodec::from_column(&ColumnValue::Int(0), &col).unwrap(),
			PropertyValue::Bool(false)
		);
		assert_eq!(
			ValueCodec::from_column(&ColumnValue::Int(3), &col).unwrap(),
			PropertyValue::Bool(true)
		);
	}

	#[test]
	fn decimal_preserves_declared_scale() {
		let col = column(ColumnType::Decimal {
			precision: 10,
			scale: 2,
		});
		let value = ValueCodec::to_column(&PropertyValue::Float(3.14159), &col).unwrap();
		match value {
			ColumnValue::Decimal(d) => assert_eq!(d.to_string(), "3.14"),
			other => panic!("expected decimal, got {other:?}"),
		}
	}

	#[test]
	fn unsupported_numeric_input_yields_zero() {
		let col = column(ColumnType::Double);
		assert_eq!(
			ValueCodec::to_column(&PropertyValue::Bytes(vec![1]), &col).unwrap(),
			ColumnValue::Float(0.0)
		);
	}

	#[test]
	fn text_encodes_scalars_and_json() {
		let col = column(ColumnType::VarChar).with_length(255);
		assert_eq!(
			ValueCodec::to_column(&PropertyValue::String("Alice".into()), &col).unwrap(),
			ColumnValue::Text("Alice".into())
		);
		assert_eq!(
			ValueCodec::to_column(&PropertyValue::Null, &col).unwrap(),
			ColumnValue::Text(String::new())
		);
		assert_eq!(
			ValueCodec::to_column(&PropertyValue::Json(serde_json::json!(["a", "b"])), &col)
				.unwrap(),
			ColumnValue::Text("[\"a\",\"b\"]".into())
		);
		assert!(matches!(
			ValueCodec::to_column(&PropertyValue::Bytes(vec![0xff]), &col),
			Err(CodecError::TypeMismatch { .. })
		));
	}

	#[test]
	fn binary_passes_bytes_through() {
		let col = column(ColumnType::Blob);
		assert_eq!(
			ValueCodec::to_column(&PropertyValue::Bytes(vec![1, 2]), &col).unwrap(),
			ColumnValue::Bytes(vec![1, 2])
		);
		assert!(matches!(
			ValueCodec::to_column(&PropertyValue::Int(1), &col),
			Err(CodecError::TypeMismatch { .. })
		));
	}

	#[test]
	fn datetime_formats_and_truncates() {
		let col = column(ColumnType::DateTime);
		let dt = NaiveDate::from_ymd_opt(2026, 8, 1)
			.unwrap()
			.and_hms_nano_opt(12, 30, 45, 987_654_321)
			.unwrap();
		let value = ValueCodec::to_column(&PropertyValue::DateTime(dt), &col).unwrap();
		assert_eq!(value.to_string(), "2026-08-01 12:30:45");
	}

	#[test]
	fn datetime_parses_strings_and_rejects_garbage() {
		let col = column(ColumnType::DateTime);
		let value =
			ValueCodec::to_column(&PropertyValue::String("2026-08-01 10:00:00".into()), &col)
				.unwrap();
		assert!(matches!(value, ColumnValue::DateTime(_)));
		assert!(matches!(
			ValueCodec::to_column(&PropertyValue::String("not a date".into()), &col),
			Err(CodecError::InvalidDateFormat { .. })
		));
	}

	#[test]
	fn date_column_keeps_date_part_only() {
		let col = column(ColumnType::Date);
		let dt = NaiveDate::from_ymd_opt(2026, 8, 1)
			.unwrap()
			.and_hms_opt(23, 59, 59)
			.unwrap();
		assert_eq!(
			ValueCodec::to_column(&PropertyValue::DateTime(dt), &col).unwrap(),
			ColumnValue::Date(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap())
		);
	}

	#[test]
	fn implicit_read_falls_back_to_current_time() {
		let col = column(ColumnType::DateTime);
		let value = ValueCodec::from_column_implicit(&ColumnValue::Text("garbage".into()), &col);
		assert!(matches!(value, PropertyValue::DateTime(_)));
		assert!(matches!(
			ValueCodec::from_column(&ColumnValue::Text("garbage".into()), &col),
			Err(CodecError::InvalidDateFormat { .. })
		));
	}

	#[test]
	fn json_roundtrip_and_invalid_decode() {
		let col = column(ColumnType::Json);
		let payload = serde_json::json!({"tags": ["a", "b"]});
		let encoded =
			ValueCodec::to_column(&PropertyValue::Json(payload.clone()), &col).unwrap();
		assert_eq!(
			ValueCodec::from_column(&encoded, &col).unwrap(),
			PropertyValue::Json(payload)
		);
		assert_eq!(
			ValueCodec::from_column(&ColumnValue::Text("{broken".into()), &col).unwrap(),
			PropertyValue::Json(serde_json::json!([]))
		);
		assert!(matches!(
			ValueCodec::to_column(&PropertyValue::String("{broken".into()), &col),
			Err(CodecError::InvalidJson { .. })
		));
	}

	#[test]
	fn roundtrip_is_identity_for_normalized_values() {
		let col = column(ColumnType::VarChar).with_length(64);
		let original = PropertyValue::String("stable".into());
		let there = ValueCodec::to_column(&original, &col).unwrap();
		let back = ValueCodec::from_column(&there, &col).unwrap();
		assert_eq!(back, original);
		let there_again = ValueCodec::to_column(&back, &col).unwrap();
		assert_eq!(there, there_again);
	}
}
