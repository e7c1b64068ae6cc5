//! CSV sheet source and config loading against real files.

use std::fs;

use tabmap_cli::config::{CliConfig, load_config};
use tabmap_cli::source::{CsvSheetSource, read_sheet};
use tabmap_session::{SessionError, SheetSource};
use tempfile::tempdir;

const REPORT: &str = "\
Partner report,,,
,,,
Brand Name,Seller ID,W1 3/1,Notes
Acme,A-1,12,
Globex,G-7,3,
";

#[test]
fn reads_rows_and_detects_header_below_title() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Partners.csv");
    fs::write(&path, REPORT).unwrap();

    let sheet = read_sheet(&path).unwrap();
    // the blank line is dropped
    assert_eq!(sheet.total_rows, 4);
    assert_eq!(sheet.detected_header_row, 1);
    assert_eq!(
        sheet.headers_at(sheet.detected_header_row),
        vec!["Brand Name", "Seller ID", "W1 3/1", "Notes"]
    );
    assert!(sheet.header_confidence >= 50);
}

#[tokio::test]
async fn source_maps_tabs_to_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Partners.csv"), REPORT).unwrap();
    let source = CsvSheetSource::new(dir.path());

    let sheet = source.fetch("workbook", "Partners").await.unwrap();
    assert_eq!(sheet.data_rows_after(1).len(), 2);

    let error = source.fetch("workbook", "Missing").await.unwrap_err();
    match error {
        SessionError::SourceLoad { tab, .. } => assert_eq!(tab, "Missing"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn config_file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tabmap.toml");
    fs::write(
        &path,
        "state_dir = \"/tmp/tabmap-state\"\n\n[session]\ndebounce_ms = 250\n",
    )
    .unwrap();

    let config = load_config(Some(path.as_path()));
    assert_eq!(
        config.resolved_state_dir(),
        std::path::PathBuf::from("/tmp/tabmap-state")
    );
    assert_eq!(config.session.debounce_ms, 250);
    assert_eq!(config.session.draft_max_age_days, 7);
}

#[test]
fn broken_or_missing_config_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "session = 3").unwrap();

    assert_eq!(load_config(Some(broken.as_path())), CliConfig::default());
    assert_eq!(
        load_config(Some(dir.path().join("missing.toml").as_path())),
        CliConfig::default()
    );
}
