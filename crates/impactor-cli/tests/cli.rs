use assert_cmd::Command;
use impactor_common::CellValue;
use impactor_testkit::{FixtureDir, ReportArtifact, SourceOfRecord, read_cell_text, text};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn binary_command() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("impactor"))
}

fn write_artifact(path: &Path) {
    ReportArtifact::english()
        .row("08:00", 10.0, 5.0, 8.0)
        .row("09:00", 10.0, 5.0, 3.0)
        .row("Total", 20.0, 10.0, 11.0)
        .write(path);
}

fn one_incident_source(dir: &FixtureDir) -> PathBuf {
    let path = dir.path("incidents.xlsx");
    SourceOfRecord::standard()
        .row(vec![
            text("INC-1"),
            text("North"),
            text("02.01.2024 08:00"),
            text("02.01.2024 12:00"),
            CellValue::Empty,
        ])
        .write(&path);
    path
}

#[test]
fn windows_lists_each_day() {
    binary_command()
        .args([
            "windows",
            "--start",
            "2024-01-01 09:00",
            "--end",
            "03.01.2024 10:00",
        ])
        .assert()
        .success()
        .stdout(
            "2024-01-01\t2024-01-01 09:00:00\t2024-01-01 23:59:59\n\
             2024-01-02\t2024-01-02 00:00:00\t2024-01-02 23:59:59\n\
             2024-01-03\t2024-01-03 00:00:00\t2024-01-03 10:00:00\n",
        );
}

#[test]
fn windows_rejects_garbage_timestamps() {
    binary_command()
        .args(["windows", "--start", "yesterday", "--end", "2024-01-01 10:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized timestamp"));
}

#[test]
fn metrics_prints_lost_and_excess() {
    let dir = FixtureDir::new();
    let artifact = dir.path("report.xlsx");
    write_artifact(&artifact);

    binary_command()
        .arg("metrics")
        .arg(&artifact)
        .assert()
        .success()
        .stdout("lost_calls\t7\nexcess_ratio\t1.0000\n");
}

#[test]
fn run_writes_workbook_and_csv() {
    let dir = FixtureDir::new();
    let source = one_incident_source(&dir);
    let artifacts = dir.path("artifacts");
    fs::create_dir(&artifacts).unwrap();
    write_artifact(&artifacts.join("INC-1_2024-01-02.xlsx"));
    let csv = dir.path("out.csv");

    binary_command()
        .arg("run")
        .arg(&source)
        .arg("--artifacts-dir")
        .arg(&artifacts)
        .arg("--out-csv")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 window(s) measured"))
        .stdout(predicate::str::contains("reconciled: 0 row(s) changed"));

    assert_eq!(read_cell_text(&source, "Report", 2, 6), "7");
    assert_eq!(
        fs::read_to_string(&csv).unwrap(),
        "incident_id,date,lost_calls,excess_ratio\nINC-1,2024-01-02,7,1.0000\n"
    );
}

#[test]
fn run_writes_one_csv_record_per_day() {
    let dir = FixtureDir::new();
    let source = dir.path("incidents.xlsx");
    SourceOfRecord::standard()
        .row(vec![
            text("INC-1"),
            text("North"),
            text("01.01.2024 09:00"),
            text("03.01.2024 10:00"),
            CellValue::Empty,
        ])
        .write(&source);
    let artifacts = dir.path("artifacts");
    fs::create_dir(&artifacts).unwrap();
    for day in ["2024-01-01", "2024-01-02", "2024-01-03"] {
        write_artifact(&artifacts.join(format!("INC-1_{day}.xlsx")));
    }
    let csv = dir.path("out.csv");

    binary_command()
        .arg("run")
        .arg(&source)
        .arg("--artifacts-dir")
        .arg(&artifacts)
        .arg("--out-csv")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 window(s) measured"))
        .stdout(predicate::str::contains("1 row(s) written"));

    assert_eq!(
        fs::read_to_string(&csv).unwrap(),
        "incident_id,date,lost_calls,excess_ratio\n\
         INC-1,2024-01-01,7,1.0000\n\
         INC-1,2024-01-02,7,1.0000\n\
         INC-1,2024-01-03,7,1.0000\n"
    );
}

#[test]
fn run_with_date_reports_target() {
    let dir = FixtureDir::new();
    let source = one_incident_source(&dir);

    binary_command()
        .arg("run")
        .arg(&source)
        .args(["--artifacts-dir", "."])
        .args(["--date", "2024-01-05", "--no-reconcile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("target date: 2024-01-05"))
        .stdout(predicate::str::contains("1 off-date"))
        .stdout(predicate::str::contains("reconciled").not());
}

#[test]
fn run_summary_as_json() {
    let dir = FixtureDir::new();
    let source = one_incident_source(&dir);
    let artifacts = dir.path("artifacts");
    fs::create_dir(&artifacts).unwrap();
    write_artifact(&artifacts.join("INC-1_2024-01-02.xlsx"));

    binary_command()
        .arg("run")
        .arg(&source)
        .arg("--artifacts-dir")
        .arg(&artifacts)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"windows_measured\": 1"))
        .stdout(predicate::str::contains("\"incident_id\": \"INC-1\""))
        .stdout(predicate::str::contains("\"date\": \"2024-01-02\""));
}

#[test]
fn run_requires_an_artifact_source() {
    let dir = FixtureDir::new();
    let source = one_incident_source(&dir);

    binary_command()
        .arg("run")
        .arg(&source)
        .assert()
        .failure()
        .code(2);
}

#[test]
fn open_workbook_exits_with_storage_busy() {
    let dir = FixtureDir::new();
    let source = one_incident_source(&dir);
    fs::write(dir.path("~$incidents.xlsx"), b"excel").unwrap();
    let before = fs::read(&source).unwrap();

    binary_command()
        .arg("run")
        .arg(&source)
        .arg("--artifacts-dir")
        .arg(dir.root())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("open in another program"));

    assert_eq!(fs::read(&source).unwrap(), before);
}

#[test]
fn reconcile_reports_changes() {
    let dir = FixtureDir::new();
    let path = dir.path("incidents.xlsx");
    SourceOfRecord::new("Report", &["Incident ID", "Region", "Notes", "Lost", "Excess"])
        .row(vec![text("INC-1"), text("North"), text("a"), 9.into(), 0.2.into()])
        .row(vec![text("INC-2"), text("North"), text("more words"), 9.into(), 0.2.into()])
        .write(&path);

    binary_command()
        .arg("reconcile")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 duplicate(s) zeroed"));

    assert_eq!(read_cell_text(&path, "Report", 2, 4), "0");
}

#[test]
fn bad_config_is_reported() {
    let dir = FixtureDir::new();
    let source = one_incident_source(&dir);
    let config = dir.path("impactor.yaml");
    fs::write(&config, "regoins: {}\n").unwrap();

    binary_command()
        .arg("reconcile")
        .arg(&source)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to load config"));
}
