// ABOUTME: Connection-related CLI commands
// ABOUTME: Verifies the configured SQL Server is reachable

use serde::{Deserialize, Serialize};

use crate::{ApiResponse, DataAccess};

/// Result of a connection check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub server: String,
    pub database: String,
    pub version: String,
    #[serde(rename = "sqlServerVersion", default)]
    pub sql_server_version: Option<String>,
}

/// Connect with the configured settings and report the server version
pub async fn check_connection(access: &DataAccess) -> ApiResponse<ConnectionStatus> {
    let settings = access.settings();
    let mut status = ConnectionStatus {
        connected: false,
        server: settings.server.clone(),
        database: settings.database.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sql_server_version: None,
    };

    match access.server_version().await {
        Ok(version) => {
            status.connected = true;
            status.sql_server_version = Some(version);
            ApiResponse::success(status)
        }
        Err(e) => ApiResponse::failure(status, format!("Failed to connect: {}", e)),
    }
}
