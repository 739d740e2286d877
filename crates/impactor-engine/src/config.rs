//! Run configuration.
//!
//! Every field has a default, so an empty document (or no file at all) is a
//! valid configuration for the standard report layout.

use crate::error::EngineError;
use impactor_common::DEFAULT_TIMESTAMP_FORMATS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Region name to report selectors. `None` admits every region and uses
    /// the region name itself as the selector.
    pub regions: Option<BTreeMap<String, Vec<String>>>,
    pub source: SourceConfig,
    pub report: ReportConfig,
    pub timestamps: TimestampConfig,
}

impl EngineConfig {
    pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self, EngineError> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, EngineError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let file = std::fs::File::open(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_reader(file)
    }

    pub fn to_yaml(&self) -> Result<String, EngineError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Report selectors for `region`, or `None` when the region is not
    /// configured and must be skipped.
    pub fn selectors_for(&self, region: &str) -> Option<Vec<String>> {
        match &self.regions {
            None => Some(vec![region.to_string()]),
            Some(map) => map.get(region).cloned(),
        }
    }
}

/// Layout of the spreadsheet of record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Sheet holding incidents; first sheet when unset.
    pub sheet: Option<String>,
    pub headers: HeaderTerms,
    /// Header text written when the Lost column has to be appended.
    pub lost_label: String,
    pub excess_label: String,
    /// Incidents whose numeric Notes value is below this are not fetched.
    pub materiality_threshold: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            headers: HeaderTerms::default(),
            lost_label: "Lost".into(),
            excess_label: "Excess".into(),
            materiality_threshold: 50.0,
        }
    }
}

/// Case-insensitive substrings identifying each source column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeaderTerms {
    pub incident_id: Vec<String>,
    pub region: Vec<String>,
    pub start: Vec<String>,
    pub end: Vec<String>,
    pub day: Vec<String>,
    pub notes: Vec<String>,
    pub lost: Vec<String>,
    pub excess: Vec<String>,
}

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for HeaderTerms {
    fn default() -> Self {
        Self {
            incident_id: terms(&["incident", "номер массовой"]),
            region: terms(&["region", "регион"]),
            start: terms(&["start", "старт", "начало"]),
            end: terms(&["end", "окончание"]),
            day: terms(&["date only", "датабезвремени", "дата без времени"]),
            notes: terms(&["notes", "заметк"]),
            lost: terms(&["lost", "потерянн"]),
            excess: terms(&["excess", "превышен"]),
        }
    }
}

/// Layout of a downloaded report artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// 0-based sheet position of the metrics table.
    pub sheet_index: usize,
    /// 1-based physical row holding the column headers.
    pub header_row: u32,
    pub period: Vec<String>,
    pub calculated: Vec<String>,
    pub forecasted: Vec<String>,
    pub answered: Vec<String>,
    /// Period substrings marking summary rows.
    pub total_markers: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sheet_index: 1,
            header_row: 5,
            period: terms(&["Period", "Период"]),
            calculated: terms(&["Calculated calls", "Расчетные звонки"]),
            forecasted: terms(&["Forecasted calls", "Спрогнозированные звонки"]),
            answered: terms(&["Answered calls", "Отвеченные звонки"]),
            total_markers: terms(&["total", "итого"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimestampConfig {
    /// chrono formats tried in order for text timestamps.
    pub formats: Vec<String>,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            formats: terms(DEFAULT_TIMESTAMP_FORMATS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let cfg = EngineConfig::from_yaml_str("{}").unwrap();
        assert!(cfg.regions.is_none());
        assert_eq!(cfg.source.lost_label, "Lost");
        assert_eq!(cfg.source.materiality_threshold, 50.0);
        assert_eq!(cfg.report.sheet_index, 1);
        assert_eq!(cfg.report.header_row, 5);
        assert_eq!(cfg.timestamps.formats[0], "%d.%m.%Y %H:%M");
    }

    #[test]
    fn region_map_gates_selectors() {
        let cfg = EngineConfig::from_yaml_str(
            r#"
regions:
  North: ["WL-101", "WL-102"]
source:
  materiality_threshold: 10
"#,
        )
        .unwrap();
        assert_eq!(
            cfg.selectors_for("North"),
            Some(vec!["WL-101".to_string(), "WL-102".to_string()])
        );
        assert_eq!(cfg.selectors_for("South"), None);
        assert_eq!(cfg.source.materiality_threshold, 10.0);
        assert_eq!(cfg.source.excess_label, "Excess");
    }

    #[test]
    fn without_region_map_region_is_its_own_selector() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.selectors_for("East"), Some(vec!["East".to_string()]));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_yaml_str("source:\n  lost_lable: X\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn yaml_roundtrip_keeps_overrides() {
        let mut cfg = EngineConfig::default();
        cfg.report.total_markers = vec!["sum".into()];
        let back = EngineConfig::from_yaml_str(&cfg.to_yaml().unwrap()).unwrap();
        assert_eq!(back.report.total_markers, vec!["sum".to_string()]);
    }
}
