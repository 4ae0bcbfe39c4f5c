// ABOUTME: Table-level operations, each on its own short-lived connection
// ABOUTME: Column listing, row and frame loading, and drop/create/insert table replacement

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::ConnectionSettings;
use crate::db::{statements, Projection, SqlServerConnection, SqlServerError};
use crate::models::{Frame, ModelError, Value};
use crate::schema::{infer_schema, Identifier, Schema};

/// Entry point for loading and replacing tables.
///
/// Holds only settings; every method opens a fresh connection and closes it before returning.
#[derive(Debug, Clone)]
pub struct DataAccess {
    settings: ConnectionSettings,
}

/// What happened in one phase of a table replacement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum PhaseOutcome {
    Skipped,
    Succeeded,
    Failed(String),
}

impl PhaseOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseOutcome::Failed(_))
    }
}

/// The first row that could not be inserted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row: usize,
    pub message: String,
}

/// Insert phase result; a failure rolls back every row of this call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub attempted: bool,
    pub rows_committed: usize,
    pub failure: Option<RowFailure>,
}

/// Per-phase status of `DataAccess::replace_table`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReplaceReport {
    pub table: String,
    pub drop: PhaseOutcome,
    pub create: PhaseOutcome,
    pub insert: InsertOutcome,
}

impl TableReplaceReport {
    /// True when the table was created and every row committed
    pub fn is_complete(&self) -> bool {
        !self.drop.is_failed()
            && self.create == PhaseOutcome::Succeeded
            && self.insert.attempted
            && self.insert.failure.is_none()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let PhaseOutcome::Failed(e) = &self.drop {
            parts.push(format!("drop failed: {}", e));
        }
        if let PhaseOutcome::Failed(e) = &self.create {
            parts.push(format!("create failed: {}", e));
        }
        if !self.insert.attempted {
            parts.push("insert skipped".to_string());
        }
        if let Some(failure) = &self.insert.failure {
            parts.push(format!(
                "insert rolled back at row {}: {}",
                failure.row, failure.message
            ));
        }
        if parts.is_empty() {
            format!("{} rows inserted", self.insert.rows_committed)
        } else {
            parts.join("; ")
        }
    }

    /// Turn a partial replacement into an error
    pub fn into_result(self) -> Result<Self, SqlServerError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(SqlServerError::IncompleteReplace {
                table: self.table.clone(),
                summary: self.summary(),
            })
        }
    }
}

impl DataAccess {
    pub fn new(settings: ConnectionSettings) -> Result<Self, SqlServerError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// Build from the `sql_*` environment variables
    pub fn from_env() -> Result<Self, SqlServerError> {
        Self::new(ConnectionSettings::from_env()?)
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn connect(&self) -> Result<SqlServerConnection, SqlServerError> {
        SqlServerConnection::connect(&self.settings).await
    }

    /// Server version string, to check the settings work
    pub async fn server_version(&self) -> Result<String, SqlServerError> {
        let mut conn = self.connect().await?;
        let version = conn.test_connection().await?;
        conn.close().await?;
        Ok(version)
    }

    /// Ordered column names of a table, empty if the table does not exist
    pub async fn load_columns(&self, table: &str) -> Result<Vec<String>, SqlServerError> {
        let table = Identifier::new(table)?;
        let database = Identifier::new(self.settings.database.as_str())?;

        let mut conn = self.connect().await?;
        let names = conn.column_names(&database, &table).await?;
        conn.close().await?;
        Ok(names)
    }

    /// Every row of the table, with the id column value first in each row
    pub async fn load_rows(
        &self,
        table: &str,
        id_column: &str,
        projection: &Projection,
    ) -> Result<Vec<Vec<Value>>, SqlServerError> {
        let table = Identifier::new(table)?;
        let id_column = Identifier::new(id_column)?;
        let query = statements::select_with_id(&table, &id_column, projection);

        let mut conn = self.connect().await?;
        let rows = conn.select_rows(&query).await?;
        conn.close().await?;

        if let (Some(width), Some(first)) = (projection.known_width(), rows.first()) {
            if first.len() != width + 1 {
                warn!(
                    "{} returned {} values per row, expected {}",
                    table,
                    first.len(),
                    width + 1
                );
            }
        }
        Ok(rows)
    }

    /// The projected columns as a frame; the id column is not added
    pub async fn load_frame(
        &self,
        table: &str,
        projection: &Projection,
    ) -> Result<Frame, SqlServerError> {
        let table = Identifier::new(table)?;
        let query = statements::select(&table, projection);

        let mut conn = self.connect().await?;
        let frame = conn.select_frame(&query).await?;
        conn.close().await?;
        Ok(frame)
    }

    /// Whole table as a frame via the row loader and the column lister.
    ///
    /// Slower than `load_frame`: two connections and two queries.
    pub async fn load_frame_by_rows(
        &self,
        table: &str,
        id_column: &str,
    ) -> Result<Frame, SqlServerError> {
        let rows = self.load_rows(table, id_column, &Projection::All).await?;
        let names = self.load_columns(table).await?;

        let rows = rows
            .into_iter()
            .map(|mut row| {
                if !row.is_empty() {
                    row.remove(0);
                }
                row
            })
            .collect();
        Ok(Frame::from_rows(names, rows)?)
    }

    /// Drop (if present), create and fill `table`.
    ///
    /// Rows are checked against the schema width before anything is touched. Drop,
    /// create and insert each report their own outcome; a failed create skips the
    /// insert, and a failed insert rolls back all rows of this call.
    pub async fn replace_table(
        &self,
        table: &str,
        rows: &[Vec<Value>],
        schema: &Schema,
    ) -> Result<TableReplaceReport, SqlServerError> {
        let table = Identifier::new(table)?;
        for (index, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(ModelError::RowArity {
                    row: index,
                    expected: schema.len(),
                    found: row.len(),
                }
                .into());
            }
        }

        let create_query = statements::create_table(&table, schema);
        let mut conn = self.connect().await?;

        let drop = if conn.table_exists(&table).await? {
            match conn.execute_batch(&statements::drop_table(&table)).await {
                Ok(()) => {
                    info!("dropped table {}", table);
                    PhaseOutcome::Succeeded
                }
                Err(e) => {
                    error!("ERROR: {}", e);
                    rollback_quietly(&mut conn).await;
                    PhaseOutcome::Failed(e.to_string())
                }
            }
        } else {
            PhaseOutcome::Skipped
        };

        let create = match conn.execute_batch(&create_query).await {
            Ok(()) => {
                info!("created table {}", table);
                PhaseOutcome::Succeeded
            }
            Err(e) => {
                error!("ERROR: {}", e);
                rollback_quietly(&mut conn).await;
                PhaseOutcome::Failed(e.to_string())
            }
        };

        let insert = if create == PhaseOutcome::Succeeded {
            insert_rows(&mut conn, &table, rows, schema).await?
        } else {
            warn!("skipping insert into {}, table was not created", table);
            InsertOutcome {
                attempted: false,
                rows_committed: 0,
                failure: None,
            }
        };

        conn.close().await?;

        Ok(TableReplaceReport {
            table: table.to_string(),
            drop,
            create,
            insert,
        })
    }

    /// Infer the schema from the frame and replace `table` with its rows
    pub async fn replace_table_from_frame(
        &self,
        table: &str,
        frame: &Frame,
    ) -> Result<TableReplaceReport, SqlServerError> {
        let schema = infer_schema(frame)?;
        self.replace_table(table, &frame.rows(), &schema).await
    }
}

async fn insert_rows(
    conn: &mut SqlServerConnection,
    table: &Identifier,
    rows: &[Vec<Value>],
    schema: &Schema,
) -> Result<InsertOutcome, SqlServerError> {
    let insert_query = statements::insert_row(table, schema);
    info!("{}", insert_query);

    conn.begin_transaction().await?;
    for (index, row) in rows.iter().enumerate() {
        if let Err(e) = conn.execute_row(&insert_query, row).await {
            error!("ERROR: {}", e);
            rollback_quietly(conn).await;
            return Ok(InsertOutcome {
                attempted: true,
                rows_committed: 0,
                failure: Some(RowFailure {
                    row: index,
                    message: e.to_string(),
                }),
            });
        }
    }
    conn.commit().await?;

    Ok(InsertOutcome {
        attempted: true,
        rows_committed: rows.len(),
        failure: None,
    })
}

async fn rollback_quietly(conn: &mut SqlServerConnection) {
    if let Err(e) = conn.rollback().await {
        error!("ERROR: rollback failed: {}", e);
    }
}
