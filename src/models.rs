// ABOUTME: In-memory data model for sql-tabular
// ABOUTME: Cell values, column dtypes, and the Frame tabular structure

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Invalid SQL type: {0:?}")]
    InvalidSqlType(String),
    #[error("Schema must have at least one column")]
    EmptySchema,
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    #[error("Row {row} has {found} values, expected {expected}")]
    RowArity {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Column {column} has {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Row {row} is out of range for {height} rows")]
    RowIndex { row: usize, height: usize },
    #[error("Column {column} has unsupported dtype {dtype}")]
    UnsupportedDType { column: String, dtype: DType },
}

/// A single cell.
///
/// Serialized untagged; temporal values are written as ISO-8601 strings and
/// recognized again when read back, so a string such as `2024-05-17` loads as a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Value {
    /// Read a JSON string cell, preferring datetime, then date, then time, then text
    pub fn parse_text(s: &str) -> Value {
        if let Ok(dt) = s.parse::<NaiveDateTime>() {
            Value::DateTime(dt)
        } else if let Ok(d) = s.parse::<NaiveDate>() {
            Value::Date(d)
        } else if let Ok(t) = s.parse::<NaiveTime>() {
            Value::Time(t)
        } else {
            Value::Text(s.to_string())
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a boolean, a number, a string or an array of bytes")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v)
            .map(Value::Int)
            .unwrap_or(Value::Float(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::parse_text(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Binary(v.to_vec()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Ok(Value::Binary(bytes))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Element kind of a frame column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Object,
    DateTime,
    Null,
}

impl DType {
    /// Infer the column kind from its values.
    ///
    /// Integers widen to floats when mixed with floats or nulls; booleans and
    /// integers only keep their kind when no value is missing.
    pub fn infer<'a, I>(values: I) -> DType
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let (mut nulls, mut ints, mut floats, mut bools, mut temporal, mut other) =
            (0usize, 0usize, 0usize, 0usize, 0usize, 0usize);

        for value in values {
            match value {
                Value::Null => nulls += 1,
                Value::Int(_) => ints += 1,
                Value::Float(_) => floats += 1,
                Value::Bool(_) => bools += 1,
                Value::DateTime(_) | Value::Date(_) | Value::Time(_) => temporal += 1,
                Value::Text(_) | Value::Binary(_) => other += 1,
            }
        }

        let numbers = ints + floats;
        let non_null = numbers + bools + temporal + other;

        if non_null == 0 {
            DType::Null
        } else if ints == non_null && nulls == 0 {
            DType::Int64
        } else if numbers == non_null {
            DType::Float64
        } else if bools == non_null && nulls == 0 {
            DType::Bool
        } else if temporal == non_null {
            DType::DateTime
        } else {
            DType::Object
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::Object => "object",
            DType::DateTime => "datetime64",
            DType::Null => "null",
        };
        f.write_str(name)
    }
}

/// One named column of a frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameColumn {
    name: String,
    values: Vec<Value>,
    hint: Option<DType>,
}

impl FrameColumn {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
            hint: None,
        }
    }

    /// Attach a fallback dtype, used only while the column holds no values
    pub fn with_hint(mut self, hint: DType) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Replace one cell; the column length never changes
    pub fn set(&mut self, row: usize, value: Value) -> Result<(), ModelError> {
        let height = self.values.len();
        let cell = self
            .values
            .get_mut(row)
            .ok_or(ModelError::RowIndex { row, height })?;
        *cell = value;
        Ok(())
    }

    /// Rewrite every cell in place
    pub fn map_values<F>(&mut self, f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        let mapped: Vec<Value> = self.values.iter().map(f).collect();
        self.values = mapped;
    }

    pub fn dtype(&self) -> DType {
        match (self.values.is_empty(), self.hint) {
            (true, Some(hint)) => hint,
            _ => DType::infer(&self.values),
        }
    }
}

/// Labeled in-memory table: named columns of equal length
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "FrameData", into = "FrameData")]
pub struct Frame {
    columns: Vec<FrameColumn>,
}

/// Row-oriented wire form of a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameData {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Build a frame from column names and row-major data
    pub fn from_rows<S: Into<String>>(
        names: Vec<S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, ModelError> {
        let width = names.len();
        let mut columns: Vec<FrameColumn> = names
            .into_iter()
            .map(|name| FrameColumn::new(name, Vec::with_capacity(rows.len())))
            .collect();
        check_unique(columns.iter().map(FrameColumn::name))?;

        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(ModelError::RowArity {
                    row: index,
                    expected: width,
                    found: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.values.push(value);
            }
        }

        Ok(Self { columns })
    }

    /// Build a frame from whole columns, which must all be the same length
    pub fn from_columns(columns: Vec<FrameColumn>) -> Result<Self, ModelError> {
        check_unique(columns.iter().map(FrameColumn::name))?;
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            for column in &columns {
                if column.values.len() != expected {
                    return Err(ModelError::ColumnLength {
                        column: column.name.clone(),
                        expected,
                        found: column.values.len(),
                    });
                }
            }
        }
        Ok(Self { columns })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(FrameColumn::name).collect()
    }

    pub fn columns(&self) -> &[FrameColumn] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn column(&self, name: &str) -> Option<&FrameColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut FrameColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn dtypes(&self) -> Vec<(&str, DType)> {
        self.columns.iter().map(|c| (c.name(), c.dtype())).collect()
    }

    /// Append one row; its arity must match the frame width
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ModelError> {
        if row.len() != self.width() {
            return Err(ModelError::RowArity {
                row: self.height(),
                expected: self.width(),
                found: row.len(),
            });
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.values.push(value);
        }
        Ok(())
    }

    /// Append a column; its length must match the frame height
    pub fn add_column(&mut self, column: FrameColumn) -> Result<(), ModelError> {
        if self.column(column.name()).is_some() {
            return Err(ModelError::DuplicateColumn(column.name));
        }
        if !self.columns.is_empty() && column.values.len() != self.height() {
            return Err(ModelError::ColumnLength {
                column: column.name,
                expected: self.height(),
                found: column.values.len(),
            });
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Result<FrameColumn, ModelError> {
        let index = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| ModelError::UnknownColumn(name.to_string()))?;
        Ok(self.columns.remove(index))
    }

    /// Row-major copy of the data, positionally aligned with `column_names`
    pub fn rows(&self) -> Vec<Vec<Value>> {
        (0..self.height())
            .map(|i| self.columns.iter().map(|c| c.values[i].clone()).collect())
            .collect()
    }
}

fn check_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), ModelError> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ModelError::DuplicateColumn(name.to_string()));
        }
    }
    Ok(())
}

impl TryFrom<FrameData> for Frame {
    type Error = ModelError;

    fn try_from(data: FrameData) -> Result<Self, Self::Error> {
        Frame::from_rows(data.columns, data.rows)
    }
}

impl From<Frame> for FrameData {
    fn from(frame: Frame) -> Self {
        let rows = frame.rows();
        FrameData {
            columns: frame.columns.into_iter().map(|c| c.name).collect(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Frame {
        Frame::from_rows(
            vec!["id", "name", "active"],
            vec![
                vec![1.into(), "a".into(), true.into()],
                vec![2.into(), "b".into(), false.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_dtype_inference() {
        assert_eq!(DType::infer(&[Value::Int(1), Value::Int(2)]), DType::Int64);
        assert_eq!(DType::infer(&[Value::Int(1), Value::Float(2.5)]), DType::Float64);
        assert_eq!(DType::infer(&[Value::Int(1), Value::Null]), DType::Float64);
        assert_eq!(DType::infer(&[Value::Bool(true), Value::Bool(false)]), DType::Bool);
        assert_eq!(DType::infer(&[Value::Bool(true), Value::Null]), DType::Object);
        assert_eq!(DType::infer(&[Value::Text("x".into()), Value::Null]), DType::Object);
        assert_eq!(DType::infer(&[Value::Int(1), Value::Text("x".into())]), DType::Object);
        assert_eq!(DType::infer(&[Value::Null, Value::Null]), DType::Null);
        assert_eq!(DType::infer(&Vec::<Value>::new()), DType::Null);

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(DType::infer(&[Value::Date(date), Value::Null]), DType::DateTime);
    }

    #[test]
    fn test_hint_only_applies_to_empty_column() {
        let empty = FrameColumn::new("n", vec![]).with_hint(DType::Int64);
        assert_eq!(empty.dtype(), DType::Int64);

        let filled = FrameColumn::new("n", vec![Value::Float(1.0)]).with_hint(DType::Int64);
        assert_eq!(filled.dtype(), DType::Float64);
    }

    #[test]
    fn test_from_rows_checks_arity() {
        let err = Frame::from_rows(vec!["a", "b"], vec![vec![Value::Int(1)]]).unwrap_err();
        assert_eq!(
            err,
            ModelError::RowArity {
                row: 0,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_rows_are_column_aligned() {
        let frame = people();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.column_names(), vec!["id", "name", "active"]);
        assert_eq!(
            frame.rows()[1],
            vec![Value::Int(2), Value::Text("b".into()), Value::Bool(false)]
        );
    }

    #[test]
    fn test_mutation() {
        let mut frame = people();
        frame
            .push_row(vec![3.into(), "c".into(), true.into()])
            .unwrap();
        assert!(frame.push_row(vec![4.into()]).is_err());

        frame
            .add_column(FrameColumn::new(
                "score",
                vec![1.5.into(), 2.0.into(), Value::Null],
            ))
            .unwrap();
        assert_eq!(frame.column("score").unwrap().dtype(), DType::Float64);

        assert!(matches!(
            frame.add_column(FrameColumn::new("id", vec![])),
            Err(ModelError::DuplicateColumn(_))
        ));

        let removed = frame.remove_column("name").unwrap();
        assert_eq!(removed.values().len(), 3);
        assert_eq!(frame.column_names(), vec!["id", "active", "score"]);
    }

    #[test]
    fn test_frame_json_form() {
        let json = r#"{"columns":["id","label","ratio"],"rows":[[1,"x",0.5],[2,null,1.25]]}"#;
        let frame: Frame = serde_json::from_str(json).unwrap();
        assert_eq!(
            frame.dtypes(),
            vec![
                ("id", DType::Int64),
                ("label", DType::Object),
                ("ratio", DType::Float64)
            ]
        );

        let back = serde_json::to_value(&frame).unwrap();
        assert_eq!(back["rows"][1][1], serde_json::Value::Null);
    }

    #[test]
    fn test_cell_edits_keep_columns_aligned() {
        let mut frame = people();
        let name = frame.column_mut("name").unwrap();
        name.set(1, "z".into()).unwrap();
        assert_eq!(
            name.set(5, "late".into()),
            Err(ModelError::RowIndex { row: 5, height: 2 })
        );

        frame
            .column_mut("id")
            .unwrap()
            .map_values(|v| match v {
                Value::Int(n) => Value::Int(n * 10),
                other => other.clone(),
            });

        let rows = frame.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == 3));
        assert_eq!(
            rows[1],
            vec![Value::Int(20), Value::Text("z".into()), Value::Bool(false)]
        );
    }

    #[test]
    fn test_temporal_cells_survive_json() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let frame = Frame::from_rows(
            vec!["id", "created", "day", "label"],
            vec![vec![
                1.into(),
                at.into(),
                Value::Date(at.date()),
                "plain".into(),
            ]],
        )
        .unwrap();

        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
        assert_eq!(back.column("created").unwrap().dtype(), DType::DateTime);
        assert_eq!(back.column("label").unwrap().dtype(), DType::Object);
    }

    #[test]
    fn test_json_cell_forms() {
        let cells: Vec<Value> =
            serde_json::from_str(r#"[null, true, 7, 18446744073709551615, 1.5, "08:15:00", [1, 2]]"#)
                .unwrap();
        assert_eq!(cells[0], Value::Null);
        assert_eq!(cells[1], Value::Bool(true));
        assert_eq!(cells[2], Value::Int(7));
        assert!(matches!(cells[3], Value::Float(_)));
        assert_eq!(cells[4], Value::Float(1.5));
        assert_eq!(cells[5], Value::Time(NaiveTime::from_hms_opt(8, 15, 0).unwrap()));
        assert_eq!(cells[6], Value::Binary(vec![1, 2]));
    }
}
