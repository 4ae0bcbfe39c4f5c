// ABOUTME: Round-trip tests against a real SQL Server
// ABOUTME: Run with `cargo test -- --ignored` and the sql_* environment variables set

use sql_tabular::access::PhaseOutcome;
use sql_tabular::{infer_schema, DataAccess, Frame, Projection, Schema, SqlServerError, Value};

fn access() -> DataAccess {
    DataAccess::from_env().expect("sql_* environment variables must be set")
}

fn people_schema() -> Schema {
    Schema::from_pairs([("id", "int"), ("name", "varchar(20)"), ("active", "bit")]).unwrap()
}

fn people_rows() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Int(1), Value::from("a"), Value::Bool(true)],
        vec![Value::Int(2), Value::from("b"), Value::Bool(false)],
    ]
}

fn sorted_rows(frame: &Frame) -> Vec<Vec<Value>> {
    let mut rows = frame.rows();
    rows.sort_by_key(|row| match row.first() {
        Some(Value::Int(id)) => *id,
        _ => i64::MAX,
    });
    rows
}

#[tokio::test]
#[ignore = "requires a live SQL Server"]
async fn replaced_table_loads_back_identically() {
    let access = access();
    let report = access
        .replace_table("sql_tabular_people", &people_rows(), &people_schema())
        .await
        .unwrap();
    assert!(report.is_complete(), "{}", report.summary());

    let frame = access
        .load_frame("sql_tabular_people", &Projection::All)
        .await
        .unwrap();
    assert_eq!(frame.column_names(), vec!["id", "name", "active"]);
    assert_eq!(sorted_rows(&frame), people_rows());
}

#[tokio::test]
#[ignore = "requires a live SQL Server"]
async fn replacing_twice_keeps_the_same_end_state() {
    let access = access();
    for _ in 0..2 {
        let report = access
            .replace_table("sql_tabular_twice", &people_rows(), &people_schema())
            .await
            .unwrap();
        assert!(report.is_complete(), "{}", report.summary());
    }

    let report = access
        .replace_table("sql_tabular_twice", &people_rows(), &people_schema())
        .await
        .unwrap();
    assert_eq!(report.drop, PhaseOutcome::Succeeded);

    let frame = access
        .load_frame("sql_tabular_twice", &Projection::All)
        .await
        .unwrap();
    assert_eq!(frame.height(), 2);
}

#[tokio::test]
#[ignore = "requires a live SQL Server"]
async fn row_loader_prepends_id_and_matches_row_count() {
    let access = access();
    access
        .replace_table("sql_tabular_rows", &people_rows(), &people_schema())
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let projection = Projection::parse("name, active").unwrap();
    let rows = access
        .load_rows("sql_tabular_rows", "id", &projection)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.len() == 3));

    let columns = access.load_columns("sql_tabular_rows").await.unwrap();
    assert_eq!(columns, vec!["id", "name", "active"]);

    let by_rows = access
        .load_frame_by_rows("sql_tabular_rows", "id")
        .await
        .unwrap();
    assert_eq!(sorted_rows(&by_rows), people_rows());
}

#[tokio::test]
#[ignore = "requires a live SQL Server"]
async fn inferred_schema_round_trips_a_frame() {
    let access = access();
    let frame = Frame::from_rows(
        vec!["id", "score", "label", "flag"],
        vec![
            vec![Value::Int(10), Value::Float(0.25), Value::from("x"), Value::Bool(true)],
            vec![Value::Int(20), Value::Float(4.5), Value::from("y"), Value::Bool(false)],
        ],
    )
    .unwrap();

    let report = access
        .replace_table_from_frame("sql_tabular_inferred", &frame)
        .await
        .unwrap();
    assert!(report.is_complete(), "{}", report.summary());

    let loaded = access
        .load_frame("sql_tabular_inferred", &Projection::All)
        .await
        .unwrap();
    assert_eq!(infer_schema(&loaded).unwrap(), infer_schema(&frame).unwrap());
    assert_eq!(sorted_rows(&loaded), sorted_rows(&frame));
}

#[tokio::test]
#[ignore = "requires a live SQL Server"]
async fn duplicate_key_rolls_back_every_row() {
    let access = access();
    let rows = vec![
        vec![Value::Int(1), Value::from("a"), Value::Bool(true)],
        vec![Value::Int(1), Value::from("dup"), Value::Bool(false)],
    ];

    let report = access
        .replace_table("sql_tabular_dupes", &rows, &people_schema())
        .await
        .unwrap();
    assert_eq!(report.create, PhaseOutcome::Succeeded);
    let failure = report.insert.failure.clone().expect("second row must fail");
    assert_eq!(failure.row, 1);
    assert!(!report.is_complete());

    let frame = access
        .load_frame("sql_tabular_dupes", &Projection::All)
        .await
        .unwrap();
    assert!(frame.is_empty());
}

#[tokio::test]
#[ignore = "requires a live SQL Server"]
async fn unknown_table_has_no_columns() {
    let columns = access()
        .load_columns("sql_tabular_does_not_exist")
        .await
        .unwrap();
    assert!(columns.is_empty());
}

#[tokio::test]
#[ignore = "requires a live SQL Server"]
async fn failed_create_skips_the_insert() {
    let access = access();
    let schema = Schema::from_pairs([("id", "notatype")]).unwrap();

    let report = access
        .replace_table("sql_tabular_bad_type", &[vec![Value::Int(1)]], &schema)
        .await
        .unwrap();
    assert_eq!(report.drop, PhaseOutcome::Skipped);
    assert!(report.create.is_failed(), "{}", report.summary());
    assert!(!report.insert.attempted);
    assert_eq!(report.insert.rows_committed, 0);
    assert!(!report.is_complete());
    assert!(matches!(
        report.into_result(),
        Err(SqlServerError::IncompleteReplace { .. })
    ));

    let columns = access.load_columns("sql_tabular_bad_type").await.unwrap();
    assert!(columns.is_empty());
}
