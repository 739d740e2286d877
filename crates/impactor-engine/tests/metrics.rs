use impactor_common::CellValue;
use impactor_engine::{EngineError, MetricsExtractor, SchemaMismatch};
use impactor_testkit::{FixtureDir, ReportArtifact};

#[test]
fn english_artifact() {
    let dir = FixtureDir::new();
    let path = dir.path("report.xlsx");
    ReportArtifact::english()
        .row("08:00 - 09:00", 10.0, 5.0, 8.0)
        .row("09:00 - 10:00", 10.0, 5.0, 3.0)
        .row("10:00 - 11:00", 3.0, 10.0, 3.0)
        .row("Total:", 23.0, 20.0, 14.0)
        .write(&path);

    let (lost, excess) = MetricsExtractor::default().extract_metrics(&path).unwrap();
    assert_eq!(lost, 7);
    // (5 + 5 - 7) / 20
    assert_eq!(excess, 0.15);
}

#[test]
fn russian_artifact_with_padded_headers_and_junk_cells() {
    let dir = FixtureDir::new();
    let path = dir.path("report.xlsx");
    ReportArtifact::with_headers(&[
        " Период",
        "Расчетные звонки ",
        "Спрогнозированные звонки",
        "Отвеченные звонки",
    ])
    .row("00:00", 12.0, 4.0, 2.0)
    .raw_row(
        "01:00",
        CellValue::Text("-".into()),
        CellValue::Empty,
        CellValue::Number(1.0),
    )
    .row("Итого:", 100.0, 100.0, 100.0)
    .write(&path);

    let rows = MetricsExtractor::default().read_rows(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].calculated, 0.0);

    let (lost, excess) = MetricsExtractor::default().extract_metrics(&path).unwrap();
    // 12 > 4 and 2 <= 4: (12 - 2) - (4 - 2)
    assert_eq!(lost, 8);
    // (8 + 0) / 4
    assert_eq!(excess, 2.0);
}

#[test]
fn zero_forecast_is_zero_excess() {
    let dir = FixtureDir::new();
    let path = dir.path("report.xlsx");
    ReportArtifact::english()
        .row("08:00", 0.0, 0.0, 0.0)
        .write(&path);
    assert_eq!(
        MetricsExtractor::default().extract_metrics(&path).unwrap(),
        (0, 0.0)
    );
}

#[test]
fn single_sheet_artifact_is_schema_mismatch() {
    let dir = FixtureDir::new();
    let path = dir.path("report.xlsx");
    ReportArtifact::english().without_metrics_sheet().write(&path);

    match MetricsExtractor::default().extract_metrics(&path) {
        Err(EngineError::SchemaMismatch(SchemaMismatch::MissingSheet { index, available })) => {
            assert_eq!((index, available), (1, 1));
        }
        other => panic!("expected missing sheet, got {other:?}"),
    }
}

#[test]
fn missing_column_is_schema_mismatch() {
    let dir = FixtureDir::new();
    let path = dir.path("report.xlsx");
    ReportArtifact::with_headers(&["Period", "Calculated calls", "Forecasted calls", "Dropped"])
        .row("08:00", 1.0, 1.0, 1.0)
        .write(&path);

    match MetricsExtractor::default().extract_metrics(&path) {
        Err(EngineError::SchemaMismatch(SchemaMismatch::MissingColumns { missing, .. })) => {
            assert_eq!(missing, vec!["Answered calls".to_string()]);
        }
        other => panic!("expected missing column, got {other:?}"),
    }
}

#[test]
fn unreadable_artifact_is_io_error() {
    let dir = FixtureDir::new();
    let path = dir.path("report.xlsx");
    std::fs::write(&path, b"<html>session expired</html>").unwrap();
    let err = MetricsExtractor::default().extract_metrics(&path).unwrap_err();
    assert!(matches!(err, EngineError::Io(_)), "{err:?}");
}
