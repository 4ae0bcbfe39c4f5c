// ABOUTME: SQL Server connection management using tiberius
// ABOUTME: Handles connecting, metadata lookups, full-table reads, DDL and parameterized inserts

use log::{debug, info};
use thiserror::Error;
use tiberius::{AuthMethod, Client, ColumnType, Config, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::convert::{dtype_hint, row_values};
use super::statements;
use crate::config::{ConfigError, ConnectionSettings};
use crate::models::{Frame, FrameColumn, ModelError, Value};
use crate::schema::Identifier;

#[derive(Error, Debug)]
pub enum SqlServerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Tiberius error: {0}")]
    Tiberius(#[from] tiberius::error::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid data: {0}")]
    Model(#[from] ModelError),
    #[error("Unsupported column value: {0}")]
    UnsupportedValue(String),
    #[error("Table {table} was not fully replaced: {summary}")]
    IncompleteReplace { table: String, summary: String },
}

pub struct SqlServerConnection {
    client: Client<Compat<TcpStream>>,
}

impl SqlServerConnection {
    /// Connect to SQL Server using validated connection settings
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, SqlServerError> {
        settings.validate()?;
        let address = settings.address()?;

        let port = match (&address.instance, address.port) {
            (Some(instance), None) => {
                return Err(SqlServerError::ConnectionFailed(format!(
                    "named instance {} needs an explicit port (host\\instance,port)",
                    instance
                )))
            }
            (_, _) => address.port_or_default(),
        };

        let mut config = Config::new();
        config.host(&address.host);
        config.port(port);
        config.database(&settings.database);
        config.authentication(AuthMethod::sql_server(&settings.user, &settings.password));
        if let Some(instance) = &address.instance {
            config.instance_name(instance);
        }

        if settings.trust_certificate {
            config.trust_cert();
        }

        debug!(
            "Connecting to {}:{} database {} as {} (driver {})",
            address.host, port, settings.database, settings.user, settings.driver
        );

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| SqlServerError::ConnectionFailed(e.to_string()))?;

        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| SqlServerError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client })
    }

    /// Test connection by querying SQL Server version
    pub async fn test_connection(&mut self) -> Result<String, SqlServerError> {
        let row = self
            .client
            .simple_query("SELECT @@VERSION")
            .await?
            .into_row()
            .await?
            .ok_or_else(|| SqlServerError::QueryFailed("No version returned".to_string()))?;

        let version: &str = row.get(0).unwrap_or("Unknown");
        Ok(version.to_string())
    }

    /// Ordered column names of a dbo table; empty when the table is unknown
    pub async fn column_names(
        &mut self,
        database: &Identifier,
        table: &Identifier,
    ) -> Result<Vec<String>, SqlServerError> {
        let query = statements::column_names_query(database);
        info!("{}", query);

        let rows = self
            .client
            .query(query.as_str(), &[&table.as_str()])
            .await?
            .into_first_result()
            .await?;

        let names = rows
            .iter()
            .filter_map(|row| row.get::<&str, _>(0).map(|s| s.to_string()))
            .collect();
        Ok(names)
    }

    /// Whether a dbo base table with this name exists
    pub async fn table_exists(&mut self, table: &Identifier) -> Result<bool, SqlServerError> {
        let rows = self
            .client
            .query(statements::table_exists_query(), &[&table.as_str()])
            .await?
            .into_first_result()
            .await?;
        Ok(!rows.is_empty())
    }

    /// Run a SELECT and return every row as plain values
    pub async fn select_rows(&mut self, query: &str) -> Result<Vec<Vec<Value>>, SqlServerError> {
        info!("{}", query);
        let rows = self.client.simple_query(query).await?.into_first_result().await?;
        rows.into_iter().map(row_values).collect()
    }

    /// Run a SELECT and materialize it as a frame labeled from the result metadata
    pub async fn select_frame(&mut self, query: &str) -> Result<Frame, SqlServerError> {
        info!("{}", query);
        let mut stream = self.client.simple_query(query).await?;

        let header: Vec<(String, ColumnType)> = stream
            .columns()
            .await?
            .map(|columns| {
                columns
                    .iter()
                    .map(|c| (c.name().to_string(), c.column_type()))
                    .collect()
            })
            .unwrap_or_default();

        let rows = stream.into_first_result().await?;

        let mut values: Vec<Vec<Value>> = header
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        for row in rows {
            for (column, value) in values.iter_mut().zip(row_values(row)?) {
                column.push(value);
            }
        }

        let columns = header
            .into_iter()
            .zip(values)
            .map(|((name, column_type), values)| {
                FrameColumn::new(name, values).with_hint(dtype_hint(column_type))
            })
            .collect();

        Ok(Frame::from_columns(columns)?)
    }

    /// Run a non-parameterized statement batch and drain its results
    pub async fn execute_batch(&mut self, statement: &str) -> Result<(), SqlServerError> {
        info!("{}", statement);
        self.client.simple_query(statement).await?.into_results().await?;
        Ok(())
    }

    /// Execute a parameterized statement once with the given row values
    pub async fn execute_row(
        &mut self,
        statement: &str,
        row: &[Value],
    ) -> Result<u64, SqlServerError> {
        let params: Vec<&dyn ToSql> = row.iter().map(|v| v as &dyn ToSql).collect();
        let result = self.client.execute(statement, &params).await?;
        Ok(result.total())
    }

    pub async fn begin_transaction(&mut self) -> Result<(), SqlServerError> {
        self.execute_batch("BEGIN TRANSACTION").await
    }

    pub async fn commit(&mut self) -> Result<(), SqlServerError> {
        self.execute_batch("IF @@TRANCOUNT > 0 COMMIT TRANSACTION").await
    }

    pub async fn rollback(&mut self) -> Result<(), SqlServerError> {
        self.execute_batch("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }

    /// Close the underlying connection
    pub async fn close(self) -> Result<(), SqlServerError> {
        self.client.close().await?;
        Ok(())
    }
}
