// ABOUTME: Main library for sql-tabular
// ABOUTME: Module declarations and the JSON response envelope printed by the CLI

use serde::{Deserialize, Serialize};

// Module declarations
pub mod access;
pub mod commands;
pub mod config;
pub mod db;
pub mod models;
pub mod schema;

pub use access::{DataAccess, TableReplaceReport};
pub use config::ConnectionSettings;
pub use db::{Projection, SqlServerError};
pub use models::{DType, Frame, FrameColumn, Value};
pub use schema::{infer_schema, Schema};

/// Standard response format for every command
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub messages: Messages,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Messages {
    pub error: Vec<String>,
    pub warning: Vec<String>,
    pub info: Vec<String>,
    pub success: Vec<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            messages: Messages::default(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            messages: Messages {
                error: vec![message],
                ..Default::default()
            },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Failed response that still carries data, e.g. a partial table replacement
    pub fn failure(data: T, message: String) -> Self {
        Self {
            data: Some(data),
            ..Self::error(message)
        }
    }

    pub fn with_info(mut self, message: String) -> Self {
        self.messages.info.push(message);
        self
    }

    pub fn with_warning(mut self, message: String) -> Self {
        self.messages.warning.push(message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let response = ApiResponse::success(vec!["id", "name"]).with_info("2 columns".to_string());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"][1], "name");
        assert_eq!(json["messages"]["info"][0], "2 columns");
    }

    #[test]
    fn test_failure_keeps_data() {
        let response = ApiResponse::failure(3, "partial".to_string());
        assert!(!response.success);
        assert_eq!(response.data, Some(3));
        assert_eq!(response.messages.error, vec!["partial".to_string()]);
    }
}
