// ABOUTME: Conversions between tiberius column data and frame values
// ABOUTME: Decodes result rows into Values and binds Values as query parameters

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{ColumnData, ColumnType, FromSql, Row, ToSql};

use super::sqlserver::SqlServerError;
use crate::models::{DType, Value};

impl ToSql for Value {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            // Untyped NULL, the server converts it to the column type
            Value::Null => ColumnData::String(None),
            Value::Bool(b) => ColumnData::Bit(Some(*b)),
            Value::Int(i) => ColumnData::I64(Some(*i)),
            Value::Float(f) => ColumnData::F64(Some(*f)),
            Value::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            Value::Binary(b) => ColumnData::Binary(Some(Cow::Borrowed(b.as_slice()))),
            Value::DateTime(dt) => dt.to_sql(),
            Value::Date(d) => d.to_sql(),
            Value::Time(t) => t.to_sql(),
        }
    }
}

/// Decode one cell
pub fn value_from_column(data: ColumnData<'static>) -> Result<Value, SqlServerError> {
    let value: Value = match data {
        ColumnData::U8(v) => v.map(i64::from).into(),
        ColumnData::I16(v) => v.map(i64::from).into(),
        ColumnData::I32(v) => v.map(i64::from).into(),
        ColumnData::I64(v) => v.into(),
        ColumnData::F32(v) => v.map(f64::from).into(),
        ColumnData::F64(v) => v.into(),
        ColumnData::Bit(v) => v.into(),
        ColumnData::String(v) => v.map(Cow::into_owned).into(),
        ColumnData::Guid(v) => v.map(|g| g.to_string()).into(),
        ColumnData::Binary(v) => v
            .map(|b| Value::Binary(b.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .map(|n| Value::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale()))))
            .unwrap_or(Value::Null),
        other => temporal_value(&other)?,
    };
    Ok(value)
}

fn temporal_value(data: &ColumnData<'static>) -> Result<Value, SqlServerError> {
    if let Ok(v) = NaiveDateTime::from_sql(data) {
        return Ok(v.map(Value::DateTime).unwrap_or(Value::Null));
    }
    if let Ok(v) = NaiveDate::from_sql(data) {
        return Ok(v.map(Value::Date).unwrap_or(Value::Null));
    }
    if let Ok(v) = NaiveTime::from_sql(data) {
        return Ok(v.map(Value::Time).unwrap_or(Value::Null));
    }
    if let Ok(v) = DateTime::<FixedOffset>::from_sql(data) {
        return Ok(v
            .map(|dt| Value::DateTime(dt.naive_utc()))
            .unwrap_or(Value::Null));
    }
    Err(SqlServerError::UnsupportedValue(format!("{:?}", data)))
}

/// Decode a whole row, keeping column order
pub fn row_values(row: Row) -> Result<Vec<Value>, SqlServerError> {
    row.into_iter().map(value_from_column).collect()
}

/// Fallback dtype for a result column that returned no rows
pub fn dtype_hint(column_type: ColumnType) -> DType {
    match column_type {
        ColumnType::Int1
        | ColumnType::Int2
        | ColumnType::Int4
        | ColumnType::Int8
        | ColumnType::Intn => DType::Int64,
        ColumnType::Float4
        | ColumnType::Float8
        | ColumnType::Floatn
        | ColumnType::Money
        | ColumnType::Money4
        | ColumnType::Decimaln
        | ColumnType::Numericn => DType::Float64,
        ColumnType::Bit | ColumnType::Bitn => DType::Bool,
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Daten
        | ColumnType::Timen
        | ColumnType::Datetime2
        | ColumnType::DatetimeOffsetn => DType::DateTime,
        ColumnType::Null => DType::Null,
        _ => DType::Object,
    }
}
