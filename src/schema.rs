// ABOUTME: Table schemas and SQL Server type inference for frames
// ABOUTME: Validated identifiers and type names, plus the dtype to SQL type mapping

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{DType, Frame, ModelError};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_@$#]{0,127}$").unwrap());

static SQL_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z][a-z0-9_]*( [a-z][a-z0-9_]*)*(\(\s*(max|\d+)\s*(,\s*\d+\s*)?\))?$")
        .unwrap()
});

/// A table or column name that is safe to interpolate inside `[...]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if IDENTIFIER.is_match(&name) {
            Ok(Self(name))
        } else {
            Err(ModelError::InvalidIdentifier(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bracket-quoted form, e.g. `[CustomerId]`
    pub fn quoted(&self) -> String {
        format!("[{}]", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// A column type such as `int`, `varchar(20)` or `decimal(10, 2)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SqlType(String);

impl SqlType {
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if SQL_TYPE.is_match(&name) {
            Ok(Self(name))
        } else {
            Err(ModelError::InvalidSqlType(name))
        }
    }

    pub fn int() -> Self {
        Self("int".to_string())
    }

    pub fn float() -> Self {
        Self("float".to_string())
    }

    pub fn varchar20() -> Self {
        Self("varchar(20)".to_string())
    }

    pub fn bit() -> Self {
        Self("bit".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Map a frame dtype to its SQL Server column type.
    ///
    /// Only the four primitive kinds are supported; dates and all-null columns are not.
    pub fn for_dtype(dtype: DType) -> Option<Self> {
        match dtype {
            DType::Int64 => Some(Self::int()),
            DType::Float64 => Some(Self::float()),
            DType::Object => Some(Self::varchar20()),
            DType::Bool => Some(Self::bit()),
            DType::DateTime | DType::Null => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SqlType {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SqlType::new(value)
    }
}

impl From<SqlType> for String {
    fn from(t: SqlType) -> Self {
        t.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: Identifier,
    #[serde(rename = "type")]
    pub sql_type: SqlType,
}

/// Ordered column list for a table; the first column is the primary key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SchemaColumn>", into = "Vec<SchemaColumn>")]
pub struct Schema {
    columns: Vec<SchemaColumn>,
}

impl Schema {
    pub fn new(columns: Vec<SchemaColumn>) -> Result<Self, ModelError> {
        if columns.is_empty() {
            return Err(ModelError::EmptySchema);
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(ModelError::DuplicateColumn(column.name.to_string()));
            }
        }
        Ok(Self { columns })
    }

    /// Build from `(name, type)` string pairs, validating both sides
    pub fn from_pairs<N, T>(pairs: impl IntoIterator<Item = (N, T)>) -> Result<Self, ModelError>
    where
        N: Into<String>,
        T: Into<String>,
    {
        let columns = pairs
            .into_iter()
            .map(|(name, sql_type)| {
                Ok(SchemaColumn {
                    name: Identifier::new(name)?,
                    sql_type: SqlType::new(sql_type)?,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        Self::new(columns)
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn primary_key(&self) -> &SchemaColumn {
        &self.columns[0]
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &Identifier> {
        self.columns.iter().map(|c| &c.name)
    }
}

impl TryFrom<Vec<SchemaColumn>> for Schema {
    type Error = ModelError;

    fn try_from(columns: Vec<SchemaColumn>) -> Result<Self, Self::Error> {
        Schema::new(columns)
    }
}

impl From<Schema> for Vec<SchemaColumn> {
    fn from(schema: Schema) -> Self {
        schema.columns
    }
}

/// Derive a SQL Server schema from a frame's column dtypes, in column order.
///
/// Fails on the first column whose dtype has no mapping.
pub fn infer_schema(frame: &Frame) -> Result<Schema, ModelError> {
    let columns = frame
        .columns()
        .iter()
        .map(|column| {
            let dtype = column.dtype();
            let sql_type = SqlType::for_dtype(dtype).ok_or_else(|| ModelError::UnsupportedDType {
                column: column.name().to_string(),
                dtype,
            })?;
            Ok(SchemaColumn {
                name: Identifier::new(column.name())?,
                sql_type,
            })
        })
        .collect::<Result<Vec<_>, ModelError>>()?;

    Schema::new(columns)
}
