// ABOUTME: Table CLI commands
// ABOUTME: List columns, load rows or frames, infer schemas, and copy or push tables

use std::fs;
use std::path::Path;

use crate::access::TableReplaceReport;
use crate::models::{Frame, Value};
use crate::schema::{infer_schema, Schema};
use crate::{ApiResponse, DataAccess, Projection};

fn parse_projection(columns: &str) -> Result<Projection, String> {
    Projection::parse(columns).map_err(|e| format!("Invalid column list: {}", e))
}

/// Ordered column names of a table
pub async fn list_columns(access: &DataAccess, table: &str) -> ApiResponse<Vec<String>> {
    match access.load_columns(table).await {
        Ok(columns) if columns.is_empty() => ApiResponse::success(columns)
            .with_warning(format!("No columns found for table {}", table)),
        Ok(columns) => ApiResponse::success(columns),
        Err(e) => ApiResponse::error(format!("Failed to list columns: {}", e)),
    }
}

/// Rows of a table with the id column first
pub async fn load_rows(
    access: &DataAccess,
    table: &str,
    id_column: &str,
    columns: &str,
) -> ApiResponse<Vec<Vec<Value>>> {
    let projection = match parse_projection(columns) {
        Ok(p) => p,
        Err(e) => return ApiResponse::error(e),
    };

    match access.load_rows(table, id_column, &projection).await {
        Ok(rows) => {
            let count = rows.len();
            ApiResponse::success(rows).with_info(format!("{} rows loaded", count))
        }
        Err(e) => ApiResponse::error(format!("Failed to load rows: {}", e)),
    }
}

/// A table as a frame, either directly or through the row loader when `by_rows_id` is set
pub async fn load_frame(
    access: &DataAccess,
    table: &str,
    columns: &str,
    by_rows_id: Option<&str>,
) -> ApiResponse<Frame> {
    let result = match by_rows_id {
        Some(id_column) => access.load_frame_by_rows(table, id_column).await,
        None => {
            let projection = match parse_projection(columns) {
                Ok(p) => p,
                Err(e) => return ApiResponse::error(e),
            };
            access.load_frame(table, &projection).await
        }
    };

    match result {
        Ok(frame) => {
            let shape = format!("{} rows x {} columns", frame.height(), frame.width());
            ApiResponse::success(frame).with_info(shape)
        }
        Err(e) => ApiResponse::error(format!("Failed to load frame: {}", e)),
    }
}

/// Load a table and infer the schema it would be recreated with
pub async fn infer_table_schema(
    access: &DataAccess,
    table: &str,
    columns: &str,
) -> ApiResponse<Schema> {
    let frame = match load_frame(access, table, columns, None).await {
        ApiResponse {
            data: Some(frame),
            success: true,
            ..
        } => frame,
        failed => return ApiResponse::error(failed.messages.error.join("; ")),
    };

    match infer_schema(&frame) {
        Ok(schema) => ApiResponse::success(schema),
        Err(e) => ApiResponse::error(format!("Failed to infer schema: {}", e)),
    }
}

/// Load `source`, infer its schema, and replace `destination` with the same rows
pub async fn copy_table(
    access: &DataAccess,
    source: &str,
    destination: &str,
    columns: &str,
) -> ApiResponse<TableReplaceReport> {
    let frame = match load_frame(access, source, columns, None).await {
        ApiResponse {
            data: Some(frame),
            success: true,
            ..
        } => frame,
        failed => return ApiResponse::error(failed.messages.error.join("; ")),
    };

    replace_from_frame(access, destination, &frame).await
}

/// Replace `table` with the frame stored as JSON in `path`
pub async fn push_frame(
    access: &DataAccess,
    table: &str,
    path: &Path,
) -> ApiResponse<TableReplaceReport> {
    let frame = match read_frame(path) {
        Ok(f) => f,
        Err(e) => return ApiResponse::error(e),
    };

    replace_from_frame(access, table, &frame).await
}

/// Read a `{"columns": [...], "rows": [[...], ...]}` frame file
pub fn read_frame(path: &Path) -> Result<Frame, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&contents).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

async fn replace_from_frame(
    access: &DataAccess,
    table: &str,
    frame: &Frame,
) -> ApiResponse<TableReplaceReport> {
    match access.replace_table_from_frame(table, frame).await {
        Ok(report) => report_response(report),
        Err(e) => ApiResponse::error(format!("Failed to replace table: {}", e)),
    }
}

fn report_response(report: TableReplaceReport) -> ApiResponse<TableReplaceReport> {
    let summary = report.summary();
    if report.is_complete() {
        ApiResponse::success(report).with_info(summary)
    } else {
        ApiResponse::failure(report, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{InsertOutcome, PhaseOutcome};
    use crate::models::{DType, ModelError};

    #[test]
    fn test_read_frame_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.json");
        fs::write(
            &path,
            r#"{"columns":["id","name","active"],"rows":[[1,"a",true],[2,"b",false]]}"#,
        )
        .unwrap();

        let frame = read_frame(&path).unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.column("active").unwrap().dtype(), DType::Bool);
    }

    #[test]
    fn test_read_frame_keeps_datetime_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        fs::write(
            &path,
            r#"{"columns":["id","created"],"rows":[[1,"2024-05-17T08:30:00"],[2,null]]}"#,
        )
        .unwrap();

        let frame = read_frame(&path).unwrap();
        assert_eq!(frame.column("created").unwrap().dtype(), DType::DateTime);
        assert_eq!(
            infer_schema(&frame),
            Err(ModelError::UnsupportedDType {
                column: "created".to_string(),
                dtype: DType::DateTime,
            })
        );
    }

    #[test]
    fn test_read_frame_reports_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"columns":["id","name"],"rows":[[1]]}"#).unwrap();

        let err = read_frame(&path).unwrap_err();
        assert!(err.contains("Failed to parse"));
    }

    #[test]
    fn test_incomplete_report_is_a_failure_with_data() {
        let report = TableReplaceReport {
            table: "People".to_string(),
            drop: PhaseOutcome::Skipped,
            create: PhaseOutcome::Failed("permission denied".to_string()),
            insert: InsertOutcome {
                attempted: false,
                rows_committed: 0,
                failure: None,
            },
        };
        let response = report_response(report);
        assert!(!response.success);
        assert!(response.data.is_some());
        assert!(response.messages.error[0].contains("create failed: permission denied"));
    }
}
