//! Header-driven column resolution for the spreadsheet of record.

use crate::config::HeaderTerms;
use crate::error::EngineError;
use impactor_workbook::SheetData;
use std::collections::BTreeMap;
use std::fmt;

/// Header row of the spreadsheet of record.
pub const HEADER_ROW: u32 = 1;

/// Meaning of a source-of-record column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnRole {
    Lost,
    Excess,
    Notes,
    Day,
    Start,
    End,
    Region,
    IncidentId,
}

impl ColumnRole {
    /// Resolution order: a header is claimed by the first role it matches.
    pub const PRIORITY: [ColumnRole; 8] = [
        ColumnRole::Lost,
        ColumnRole::Excess,
        ColumnRole::Notes,
        ColumnRole::Day,
        ColumnRole::Start,
        ColumnRole::End,
        ColumnRole::Region,
        ColumnRole::IncidentId,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ColumnRole::Lost => "Lost",
            ColumnRole::Excess => "Excess",
            ColumnRole::Notes => "Notes",
            ColumnRole::Day => "Day",
            ColumnRole::Start => "Start",
            ColumnRole::End => "End",
            ColumnRole::Region => "Region",
            ColumnRole::IncidentId => "Incident ID",
        }
    }

    fn terms(self, terms: &HeaderTerms) -> &[String] {
        match self {
            ColumnRole::Lost => &terms.lost,
            ColumnRole::Excess => &terms.excess,
            ColumnRole::Notes => &terms.notes,
            ColumnRole::Day => &terms.day,
            ColumnRole::Start => &terms.start,
            ColumnRole::End => &terms.end,
            ColumnRole::Region => &terms.region,
            ColumnRole::IncidentId => &terms.incident_id,
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Validated role → 1-based column index map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<ColumnRole, u32>,
}

impl ColumnMap {
    /// Resolve roles from `(column, header text)` pairs.
    ///
    /// Matching is a case-insensitive substring test. Each header is given to
    /// the first role in [`ColumnRole::PRIORITY`] it matches; within a role
    /// the leftmost column wins.
    pub fn resolve<'a, I>(headers: I, terms: &HeaderTerms) -> Self
    where
        I: IntoIterator<Item = (u32, &'a str)>,
    {
        let lowered: Vec<Vec<String>> = ColumnRole::PRIORITY
            .iter()
            .map(|role| {
                role.terms(terms)
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .collect();

        let mut columns = BTreeMap::new();
        for (col, header) in headers {
            let header = header.trim().to_lowercase();
            if header.is_empty() {
                continue;
            }
            let role = ColumnRole::PRIORITY
                .iter()
                .zip(&lowered)
                .find(|(_, role_terms)| role_terms.iter().any(|t| header.contains(t.as_str())))
                .map(|(role, _)| *role);
            if let Some(role) = role {
                columns.entry(role).or_insert(col);
            }
        }
        Self { columns }
    }

    /// Resolve from the header row of `sheet`.
    pub fn from_sheet(sheet: &SheetData, terms: &HeaderTerms) -> Self {
        let texts: Vec<(u32, String)> = (1..=sheet.max_col())
            .map(|c| (c, sheet.value(HEADER_ROW, c).as_text()))
            .collect();
        Self::resolve(texts.iter().map(|(c, t)| (*c, t.as_str())), terms)
    }

    pub fn get(&self, role: ColumnRole) -> Option<u32> {
        self.columns.get(&role).copied()
    }

    pub fn contains(&self, role: ColumnRole) -> bool {
        self.columns.contains_key(&role)
    }

    pub(crate) fn insert(&mut self, role: ColumnRole, col: u32) {
        self.columns.insert(role, col);
    }

    /// Fail with every missing role at once.
    pub fn require(&self, roles: &[ColumnRole], context: &'static str) -> Result<(), EngineError> {
        let missing: Vec<String> = roles
            .iter()
            .filter(|r| !self.contains(**r))
            .map(|r| r.label().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineError::missing_columns(context, missing))
        }
    }

    /// Column of a role already checked with [`ColumnMap::require`].
    pub fn column(&self, role: ColumnRole, context: &'static str) -> Result<u32, EngineError> {
        self.get(role)
            .ok_or_else(|| EngineError::missing_columns(context, vec![role.label().to_string()]))
    }
}
