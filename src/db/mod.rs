// ABOUTME: Database module exports for sql-tabular
// ABOUTME: SQL Server connection, statement builders and value conversions

pub mod convert;
pub mod sqlserver;
pub mod statements;

pub use sqlserver::{SqlServerConnection, SqlServerError};
pub use statements::Projection;
