// ABOUTME: T-SQL statement text for loading and replacing tables
// ABOUTME: Identifiers are validated and bracket-quoted, values are always @Pn parameters

use std::fmt;

use crate::models::ModelError;
use crate::schema::{Identifier, Schema};

/// Columns to select: everything, or an explicit list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Columns(Vec<Identifier>),
}

impl Projection {
    /// Parse `*`, a single column name, or a comma-separated list of names
    pub fn parse(spec: &str) -> Result<Self, ModelError> {
        let spec = spec.trim();
        if spec == "*" {
            return Ok(Projection::All);
        }
        let columns = spec
            .split(',')
            .map(|name| Identifier::new(name.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Projection::Columns(columns))
    }

    pub fn columns<I, S>(names: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = names
            .into_iter()
            .map(Identifier::new)
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(ModelError::InvalidIdentifier(String::new()));
        }
        Ok(Projection::Columns(columns))
    }

    /// Number of selected columns, if known without asking the database
    pub fn known_width(&self) -> Option<usize> {
        match self {
            Projection::All => None,
            Projection::Columns(columns) => Some(columns.len()),
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::All => f.write_str("*"),
            Projection::Columns(columns) => {
                let quoted: Vec<String> = columns.iter().map(Identifier::quoted).collect();
                f.write_str(&quoted.join(", "))
            }
        }
    }
}

/// Ordered column names of a dbo table; `@P1` is the table name
pub fn column_names_query(database: &Identifier) -> String {
    format!(
        "SELECT COLUMN_NAME FROM {}.INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_NAME = @P1 AND TABLE_SCHEMA = 'dbo' ORDER BY ORDINAL_POSITION",
        database.quoted()
    )
}

/// Existence check for a dbo base table; `@P1` is the table name
pub fn table_exists_query() -> &'static str {
    "SELECT 1 FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_NAME = @P1 AND TABLE_SCHEMA = 'dbo' AND TABLE_TYPE = 'BASE TABLE'"
}

/// Full scan with the id column prepended to the projection
pub fn select_with_id(table: &Identifier, id_column: &Identifier, projection: &Projection) -> String {
    format!(
        "SELECT {}, {} FROM [dbo].{}",
        id_column.quoted(),
        projection,
        table.quoted()
    )
}

/// Full scan of the projection only
pub fn select(table: &Identifier, projection: &Projection) -> String {
    format!("SELECT {} FROM [dbo].{}", projection, table.quoted())
}

pub fn drop_table(table: &Identifier) -> String {
    format!("DROP TABLE [dbo].{}", table.quoted())
}

/// CREATE TABLE with the first schema column as primary key
pub fn create_table(table: &Identifier, schema: &Schema) -> String {
    let definitions: Vec<String> = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            if i == 0 {
                format!("{} {} PRIMARY KEY", column.name.quoted(), column.sql_type)
            } else {
                format!("{} {}", column.name.quoted(), column.sql_type)
            }
        })
        .collect();

    format!(
        "CREATE TABLE [dbo].{} ({})",
        table.quoted(),
        definitions.join(", ")
    )
}

/// Parameterized INSERT listing every schema column in order
pub fn insert_row(table: &Identifier, schema: &Schema) -> String {
    let columns: Vec<String> = schema.names().map(Identifier::quoted).collect();
    let placeholders: Vec<String> = (1..=schema.len()).map(|i| format!("@P{}", i)).collect();

    format!(
        "INSERT INTO [dbo].{} ({}) VALUES ({})",
        table.quoted(),
        columns.join(", "),
        placeholders.join(", ")
    )
}
