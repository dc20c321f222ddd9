//! Declared-type-directed decoding of result rows into column-native values.

use crate::error::BackendError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use murier_metadata::column::ColumnMetadata;
use murier_metadata::types::{ColumnType, TypeFamily};
use murier_metadata::value::ColumnValue;
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::mysql::MySqlRow;

/// Extract one column from a row, guided by its declared metadata.
///
/// The result is in the codec's normal form, so it compares directly
/// against snapshot values.
pub fn decode_column(row: &MySqlRow, column: &ColumnMetadata) -> Result<ColumnValue, BackendError> {
	let name = column.name.as_str();
	let decode_err = |e: sqlx::Error| BackendError::Decode {
		column: name.to_string(),
		message: e.to_string(),
	};

	if column.is_boolean() {
		let value: Option<bool> = row.try_get(name).map_err(decode_err)?;
		return Ok(match value {
			Some(b) => ColumnValue::Int(i64::from(b)),
			None => ColumnValue::Null,
		});
	}

	match column.column_type.family() {
		TypeFamily::Integer => {
			if column.column_type == ColumnType::Year {
				let value: Option<u16> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, |v| ColumnValue::Int(i64::from(v))))
			} else if column.unsigned {
				let value: Option<u64> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, |v| ColumnValue::Int(v as i64)))
			} else {
				let value: Option<i64> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, ColumnValue::Int))
			}
		}
		TypeFamily::Numeric => match column.column_type {
			ColumnType::Decimal { .. } => {
				let value: Option<Decimal> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, ColumnValue::Decimal))
			}
			ColumnType::Float => {
				let value: Option<f32> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, |v| ColumnValue::Float(f64::from(v))))
			}
			_ => {
				let value: Option<f64> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, ColumnValue::Float))
			}
		},
		TypeFamily::Textual => {
			if column.column_type == ColumnType::Time {
				let value: Option<NaiveTime> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, |t| {
					ColumnValue::Text(t.format("%H:%M:%S").to_string())
				}))
			} else {
				let value: Option<String> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, ColumnValue::Text))
			}
		}
		TypeFamily::Binary | TypeFamily::Spatial => {
			let value: Option<Vec<u8>> = row.try_get(name).map_err(decode_err)?;
			Ok(value.map_or(ColumnValue::Null, ColumnValue::Bytes))
		}
		TypeFamily::Temporal => match column.column_type {
			ColumnType::Date => {
				let value: Option<NaiveDate> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, ColumnValue::Date))
			}
			ColumnType::Timestamp => {
				let value: Option<DateTime<Utc>> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, |dt| {
					ColumnValue::DateTime(dt.naive_utc())
				}))
			}
			_ => {
				let value: Option<NaiveDateTime> = row.try_get(name).map_err(decode_err)?;
				Ok(value.map_or(ColumnValue::Null, ColumnValue::DateTime))
			}
		},
		TypeFamily::Json => {
			let value: Option<serde_json::Value> = row.try_get(name).map_err(decode_err)?;
			Ok(value.map_or(ColumnValue::Null, ColumnValue::Json))
		}
	}
}
