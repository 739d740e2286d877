//! The seam to whatever produces report artifacts.
//!
//! Fetching is window-scoped: a [`FetchError`] means "no result for this
//! window" and the run moves on.

use chrono::NaiveDateTime;
use impactor_common::Window;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Timestamp layout substituted for `{start}` and `{end}`.
pub const FETCH_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no artifact at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` printed no artifact path")]
    NoOutput { program: String },

    #[error("invalid fetch command: {0}")]
    InvalidCommand(String),
}

/// One report request: the incident's region selectors and a window.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub incident_id: &'a str,
    pub region: &'a str,
    pub selectors: &'a [String],
    pub window: &'a Window,
}

impl FetchRequest<'_> {
    pub fn start(&self) -> NaiveDateTime {
        self.window.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.window.end
    }
}

/// Turns a window into a local artifact path.
pub trait ReportFetcher {
    fn fetch(&mut self, request: &FetchRequest<'_>) -> Result<PathBuf, FetchError>;
}

impl<F> ReportFetcher for F
where
    F: FnMut(&FetchRequest<'_>) -> Result<PathBuf, FetchError>,
{
    fn fetch(&mut self, request: &FetchRequest<'_>) -> Result<PathBuf, FetchError> {
        self(request)
    }
}

/// Artifacts already downloaded into one directory as
/// `<incident>_<YYYY-MM-DD>.xlsx`.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, request: &FetchRequest<'_>) -> PathBuf {
        let id: String = request
            .incident_id
            .chars()
            .map(|c| if std::path::is_separator(c) { '_' } else { c })
            .collect();
        self.root
            .join(format!("{id}_{}.xlsx", request.window.date.format("%Y-%m-%d")))
    }
}

impl ReportFetcher for DirectoryFetcher {
    fn fetch(&mut self, request: &FetchRequest<'_>) -> Result<PathBuf, FetchError> {
        let path = self.artifact_path(request);
        if path.is_file() {
            Ok(path)
        } else {
            Err(FetchError::NotFound { path })
        }
    }
}

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(start|end|date|region|incident|selectors)\}").expect("placeholder regex")
});

/// Runs an external downloader once per window.
///
/// Arguments may contain `{start}`, `{end}`, `{date}`, `{region}`,
/// `{incident}` and `{selectors}` (comma-joined). The last non-empty line the
/// program prints on stdout is taken as the artifact path.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: String,
    args: Vec<String>,
}

impl CommandFetcher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line.
    pub fn parse(command_line: &str) -> Result<Self, FetchError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| FetchError::InvalidCommand("empty command".into()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn render_args(&self, request: &FetchRequest<'_>) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                PLACEHOLDER
                    .replace_all(arg, |caps: &Captures<'_>| match &caps[1] {
                        "start" => request.start().format(FETCH_TIMESTAMP_FORMAT).to_string(),
                        "end" => request.end().format(FETCH_TIMESTAMP_FORMAT).to_string(),
                        "date" => request.window.date.format("%Y-%m-%d").to_string(),
                        "region" => request.region.to_string(),
                        "incident" => request.incident_id.to_string(),
                        _ => request.selectors.join(","),
                    })
                    .into_owned()
            })
            .collect()
    }
}

impl ReportFetcher for CommandFetcher {
    fn fetch(&mut self, request: &FetchRequest<'_>) -> Result<PathBuf, FetchError> {
        let args = self.render_args(request);
        tracing::debug!(program = %self.program, ?args, "running fetch command");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(FetchError::Command {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .ok_or_else(|| FetchError::NoOutput {
                program: self.program.clone(),
            })?;
        let path = PathBuf::from(line);
        if path.is_file() {
            Ok(path)
        } else {
            Err(FetchError::NotFound { path })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> Window {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        Window::new(
            date,
            date.and_hms_opt(9, 30, 0).unwrap(),
            date.and_hms_opt(23, 59, 59).unwrap(),
        )
    }

    #[test]
    fn placeholders_are_substituted() {
        let w = window();
        let selectors = vec!["WL-1".to_string(), "WL-2".to_string()];
        let req = FetchRequest {
            incident_id: "INC-7",
            region: "North",
            selectors: &selectors,
            window: &w,
        };
        let fetcher =
            CommandFetcher::parse("fetch --from {start} --to={end} {date} {region}:{incident} {selectors} {other}")
                .unwrap();
        assert_eq!(
            fetcher.render_args(&req),
            vec![
                "--from",
                "2024-01-02T09:30:00",
                "--to=2024-01-02T23:59:59",
                "2024-01-02",
                "North:INC-7",
                "WL-1,WL-2",
                "{other}",
            ]
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            CommandFetcher::parse("   "),
            Err(FetchError::InvalidCommand(_))
        ));
    }

    #[test]
    fn directory_fetcher_names_artifacts_by_incident_and_date() {
        let dir = tempfile::tempdir().unwrap();
        let w = window();
        let req = FetchRequest {
            incident_id: "INC/7",
            region: "North",
            selectors: &[],
            window: &w,
        };
        let mut fetcher = DirectoryFetcher::new(dir.path());
        let expected = dir.path().join("INC_7_2024-01-02.xlsx");
        assert_eq!(fetcher.artifact_path(&req), expected);
        assert!(matches!(fetcher.fetch(&req), Err(FetchError::NotFound { .. })));

        std::fs::write(&expected, b"xlsx").unwrap();
        assert_eq!(fetcher.fetch(&req).unwrap(), expected);
    }

    #[test]
    fn closures_are_fetchers() {
        let w = window();
        let req = FetchRequest {
            incident_id: "INC-1",
            region: "North",
            selectors: &[],
            window: &w,
        };
        let mut calls = 0;
        let mut fetcher = |r: &FetchRequest<'_>| {
            calls += 1;
            Ok::<_, FetchError>(PathBuf::from(format!("{}.xlsx", r.incident_id)))
        };
        assert_eq!(fetcher.fetch(&req).unwrap(), PathBuf::from("INC-1.xlsx"));
        drop(fetcher);
        assert_eq!(calls, 1);
    }
}
