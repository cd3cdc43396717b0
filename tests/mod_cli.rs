use aggrelite::Database;
use aggrelite::cli::{Command, OutputMode, run_with_format};
use std::path::Path;

fn demo(rel: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/retail").join(rel)
}

fn exec(db: &Database, cmd: Command, mode: OutputMode) -> String {
    let mut out = Vec::new();
    run_with_format(db, cmd, mode, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn load_then_aggregate_demo_pipeline() {
    let db = Database::new();
    let loaded = exec(&db, Command::Load { file: demo("seed.json") }, OutputMode::Plain);
    assert_eq!(loaded.trim(), "10");

    let pipeline_json = std::fs::read_to_string(demo("pipelines/top3_spenders.json")).unwrap();
    let cmd = Command::Aggregate { collection: "orders".into(), pipeline_json, now: None };
    let text = exec(&db, cmd, OutputMode::Json);
    let rows: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(rows[0], serde_json::json!({"name": "John Doe", "total_spent": 1550}));
    assert_eq!(rows.as_array().map(Vec::len), Some(3));
}

#[test]
fn human_output_ends_with_a_count() {
    let db = Database::new();
    exec(&db, Command::Load { file: demo("seed.json") }, OutputMode::Plain);
    let cmd = Command::Aggregate {
        collection: "orders".into(),
        pipeline_json: r#"[{"$group": {"_id": "$status", "order_count": {"$sum": 1}}}]"#.into(),
        now: None,
    };
    assert!(exec(&db, cmd, OutputMode::Human).trim_end().ends_with("(4 documents)"));
}

#[test]
fn info_json_lists_collections() {
    let db = Database::new();
    exec(&db, Command::Load { file: demo("seed.json") }, OutputMode::Plain);
    let report: serde_json::Value = serde_json::from_str(&exec(&db, Command::Info, OutputMode::Json)).unwrap();
    assert_eq!(report["collections"][0], serde_json::json!({"name": "customers", "documents": 5}));
    assert!(report["features"].is_array());
}

#[test]
fn bad_input_surfaces_as_error() {
    let db = Database::new();
    let cmd = Command::Insert { collection: "c".into(), json: "[1, 2]".into() };
    assert!(run_with_format(&db, cmd, OutputMode::Plain, &mut Vec::new()).is_err());
}
