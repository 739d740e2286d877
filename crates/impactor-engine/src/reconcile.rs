//! Post-run cleanup of duplicate and contradicted measurements.
//!
//! Overlapping windows and re-runs can store the same Lost value for several
//! incidents of one region. One full-table pass keeps a single row per
//! `(Lost, region)` group and zeroes Lost wherever Excess is negative.

use crate::config::SourceConfig;
use crate::error::EngineError;
use crate::schema::{ColumnMap, ColumnRole, HEADER_ROW};
use impactor_common::CellValue;
use impactor_workbook::WriteSession;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

/// Weight of one line of notes in [`notes_score`].
pub const LINE_WEIGHT: u64 = 1000;
/// Weight of one word of notes in [`notes_score`].
pub const WORD_WEIGHT: u64 = 10;
/// Weight of one character of notes in [`notes_score`].
pub const CHAR_WEIGHT: u64 = 1;

/// Richness of a notes cell: `1000*lines + 10*words + chars` of the trimmed
/// text; blank text scores 0.
pub fn notes_score(text: &str) -> u64 {
    let text = text.trim();
    if text.is_empty() {
        return 0;
    }
    let lines = text.split('\n').count() as u64;
    let words = text.split_whitespace().count() as u64;
    let chars = text.chars().count() as u64;
    LINE_WEIGHT * lines + WORD_WEIGHT * words + CHAR_WEIGHT * chars
}

/// The fields of one sheet row the reconciler looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub row: u32,
    pub lost: CellValue,
    pub region: String,
    pub excess: CellValue,
    pub notes: Option<String>,
    pub identifier: Option<String>,
}

impl LedgerRow {
    pub fn new(row: u32, lost: impl Into<CellValue>, region: &str, excess: impl Into<CellValue>) -> Self {
        Self {
            row,
            lost: lost.into(),
            region: region.to_string(),
            excess: excess.into(),
            notes: None,
            identifier: None,
        }
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn with_identifier(mut self, id: &str) -> Self {
        self.identifier = Some(id.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LostKey {
    Number(u64),
    Text(String),
}

fn lost_key(lost: &CellValue) -> Option<LostKey> {
    if lost.is_blank() {
        return None;
    }
    match lost.as_number() {
        Some(n) if n == 0.0 => None,
        Some(n) => Some(LostKey::Number(n.to_bits())),
        None => Some(LostKey::Text(lost.as_text().trim().to_string())),
    }
}

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub rows_scanned: usize,
    /// `(Lost, region)` groups with more than one row.
    pub duplicate_groups: usize,
    pub duplicates_zeroed: usize,
    pub negative_excess_zeroed: usize,
    /// Sheet rows whose Lost changed, ascending.
    pub mutated_rows: Vec<u32>,
}

impl ReconcileReport {
    pub fn mutated(&self) -> usize {
        self.mutated_rows.len()
    }
}

/// Resolve duplicates and negative excess in `rows`, in place.
///
/// Rows must be in table order; it decides ties. Every changed row gets
/// `lost = Int(0)`.
pub fn reconcile_rows(rows: &mut [LedgerRow], has_notes: bool) -> ReconcileReport {
    let mut report = ReconcileReport {
        rows_scanned: rows.len(),
        ..Default::default()
    };
    let mut mutated = vec![false; rows.len()];

    // Groups in first-appearance order.
    let mut index: HashMap<(LostKey, String), usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let Some(key) = lost_key(&row.lost) else {
            continue;
        };
        let slot = *index.entry((key, row.region.clone())).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }

    for members in groups.iter().filter(|g| g.len() > 1) {
        report.duplicate_groups += 1;
        let keep = pick_survivor(rows, members, has_notes);
        tracing::debug!(
            keep_row = rows[keep].row,
            group_size = members.len(),
            lost = %rows[keep].lost,
            region = %rows[keep].region,
            "duplicate group resolved"
        );
        for &i in members.iter().filter(|&&i| i != keep) {
            rows[i].lost = CellValue::Int(0);
            mutated[i] = true;
            report.duplicates_zeroed += 1;
        }
    }

    for (i, row) in rows.iter_mut().enumerate() {
        let negative = row.excess.as_number().is_some_and(|e| e < 0.0);
        let already_zero = row.lost.as_number() == Some(0.0);
        if negative && !already_zero {
            row.lost = CellValue::Int(0);
            mutated[i] = true;
            report.negative_excess_zeroed += 1;
        }
    }

    report.mutated_rows = rows
        .iter()
        .zip(&mutated)
        .filter(|(_, m)| **m)
        .map(|(r, _)| r.row)
        .collect();
    report
}

fn pick_survivor(rows: &[LedgerRow], members: &[usize], has_notes: bool) -> usize {
    if has_notes {
        return first_max_by(members, |a, b| {
            let score = |i: usize| notes_score(rows[i].notes.as_deref().unwrap_or(""));
            score(a).cmp(&score(b))
        });
    }

    let digits = |i: usize| -> Option<String> {
        let id = rows[i].identifier.as_deref()?;
        let d: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
        (!d.is_empty()).then_some(d)
    };
    let numbered: Vec<usize> = members.iter().copied().filter(|&i| digits(i).is_some()).collect();
    if !numbered.is_empty() {
        return first_max_by(&numbered, |a, b| {
            compare_digit_strings(&digits(a).unwrap_or_default(), &digits(b).unwrap_or_default())
        });
    }
    first_max_by(members, |a, b| {
        let id = |i: usize| rows[i].identifier.clone().unwrap_or_default();
        id(a).cmp(&id(b))
    })
}

/// Index of the first maximal element; later equal elements never win.
fn first_max_by(members: &[usize], mut cmp: impl FnMut(usize, usize) -> Ordering) -> usize {
    let mut best = members[0];
    for &candidate in &members[1..] {
        if cmp(candidate, best) == Ordering::Greater {
            best = candidate;
        }
    }
    best
}

/// Numeric order of two non-empty decimal digit strings of any length.
fn compare_digit_strings(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Runs the reconciliation pass over a spreadsheet of record.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: SourceConfig,
}

impl Reconciler {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Reconcile the file at `path` and persist the result in one save.
    ///
    /// A clean table is not rewritten.
    pub fn reconcile(&self, path: &Path) -> Result<ReconcileReport, EngineError> {
        let _span = tracing::info_span!("reconcile", path = %path.display()).entered();
        let mut session = WriteSession::open(path, self.config.sheet.as_deref())?;
        let report = self.reconcile_session(&mut session)?;
        session.finalize()?;
        tracing::info!(
            mutated = report.mutated(),
            duplicate_groups = report.duplicate_groups,
            negative_excess = report.negative_excess_zeroed,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Reconcile the session sheet, leaving the writes pending.
    ///
    /// Fails before any write when the Lost, region or Excess column is
    /// missing.
    pub fn reconcile_session(&self, session: &mut WriteSession) -> Result<ReconcileReport, EngineError> {
        let sheet = session.read()?;
        let columns = ColumnMap::from_sheet(&sheet, &self.config.headers);
        columns.require(
            &[ColumnRole::Lost, ColumnRole::Region, ColumnRole::Excess],
            "reconciliation",
        )?;
        let lost_col = columns.column(ColumnRole::Lost, "reconciliation")?;
        let region_col = columns.column(ColumnRole::Region, "reconciliation")?;
        let excess_col = columns.column(ColumnRole::Excess, "reconciliation")?;
        let notes_col = columns.get(ColumnRole::Notes);
        let id_col = columns.get(ColumnRole::IncidentId);
        if notes_col.is_none() {
            tracing::warn!("no notes column; duplicates resolved by incident identifier");
        }

        let mut rows: Vec<LedgerRow> = (HEADER_ROW + 1..=sheet.max_row())
            .map(|r| LedgerRow {
                row: r,
                lost: sheet.value(r, lost_col),
                region: sheet.value(r, region_col).as_text(),
                excess: sheet.value(r, excess_col),
                notes: notes_col.map(|c| sheet.value(r, c).as_text()),
                identifier: id_col.map(|c| sheet.value(r, c).as_text()),
            })
            .collect();

        let report = reconcile_rows(&mut rows, notes_col.is_some());
        for row in &report.mutated_rows {
            session.write(*row, lost_col, CellValue::Int(0))?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_weights() {
        assert_eq!(notes_score(""), 0);
        assert_eq!(notes_score("   "), 0);
        assert_eq!(notes_score("ab"), 1000 + 10 + 2);
        assert_eq!(notes_score(" two words\nline "), 2000 + 30 + 14);
    }

    #[test]
    fn richer_notes_win() {
        let mut rows = vec![
            LedgerRow::new(2, 120, "North", 0.1).with_notes("short"),
            LedgerRow::new(3, 120, "North", 0.2).with_notes("much longer\nnote here"),
            LedgerRow::new(4, 120, "South", 0.1).with_notes(""),
        ];
        let report = reconcile_rows(&mut rows, true);
        assert_eq!(report.mutated_rows, vec![2]);
        assert_eq!(rows[0].lost, CellValue::Int(0));
        assert_eq!(rows[1].lost, CellValue::from(120));
        assert_eq!(rows[2].lost, CellValue::from(120));
    }

    #[test]
    fn score_ties_keep_first_row() {
        let mut rows = vec![
            LedgerRow::new(2, 7, "North", 0.1).with_notes("abc"),
            LedgerRow::new(3, 7, "North", 0.1).with_notes("xyz"),
        ];
        let report = reconcile_rows(&mut rows, true);
        assert_eq!(report.mutated_rows, vec![3]);
    }

    #[test]
    fn identifier_digits_compared_numerically() {
        let mut rows = vec![
            LedgerRow::new(2, 5, "North", 0.0).with_identifier("INC-900"),
            LedgerRow::new(3, 5, "North", 0.0).with_identifier("INC-1000"),
            LedgerRow::new(4, 5, "North", 0.0).with_identifier("no digits"),
        ];
        let report = reconcile_rows(&mut rows, false);
        assert_eq!(report.mutated_rows, vec![2, 4]);
        assert_eq!(rows[1].lost, CellValue::from(5));
    }

    #[test]
    fn huge_identifiers_do_not_overflow() {
        let mut rows = vec![
            LedgerRow::new(2, 5, "N", 0.0).with_identifier("99999999999999999999999"),
            LedgerRow::new(3, 5, "N", 0.0).with_identifier("100000000000000000000000"),
        ];
        reconcile_rows(&mut rows, false);
        assert_eq!(rows[0].lost, CellValue::Int(0));
    }

    #[test]
    fn identifiers_without_digits_compare_lexicographically() {
        let mut rows = vec![
            LedgerRow::new(2, 5, "N", 0.0).with_identifier("beta"),
            LedgerRow::new(3, 5, "N", 0.0).with_identifier("alpha"),
        ];
        let report = reconcile_rows(&mut rows, false);
        assert_eq!(report.mutated_rows, vec![3]);
    }

    #[test]
    fn negative_excess_zeroes_lost() {
        let mut rows = vec![
            LedgerRow::new(2, 40, "North", -0.25),
            LedgerRow::new(3, 0, "North", -0.5),
            LedgerRow::new(4, 41, "North", "-0.1"),
            LedgerRow::new(5, 42, "North", 0.3),
        ];
        let report = reconcile_rows(&mut rows, false);
        assert_eq!(report.mutated_rows, vec![2, 4]);
        assert_eq!(report.negative_excess_zeroed, 2);
        assert_eq!(rows[3].lost, CellValue::from(42));
    }

    #[test]
    fn blank_and_zero_lost_are_not_grouped() {
        let mut rows = vec![
            LedgerRow::new(2, CellValue::Empty, "North", 0.1),
            LedgerRow::new(3, CellValue::Empty, "North", 0.1),
            LedgerRow::new(4, 0, "North", 0.1),
            LedgerRow::new(5, 0.0, "North", 0.1),
        ];
        let report = reconcile_rows(&mut rows, true);
        assert_eq!(report.duplicate_groups, 0);
        assert!(report.mutated_rows.is_empty());
    }

    #[test]
    fn int_and_float_lost_of_same_value_group_together() {
        let mut rows = vec![
            LedgerRow::new(2, 12, "North", 0.1).with_notes("a"),
            LedgerRow::new(3, 12.0, "North", 0.1).with_notes("bb"),
        ];
        let report = reconcile_rows(&mut rows, true);
        assert_eq!(report.mutated_rows, vec![2]);
    }

    #[test]
    fn second_pass_changes_nothing() {
        let mut rows = vec![
            LedgerRow::new(2, 9, "North", -0.1).with_notes("long long note"),
            LedgerRow::new(3, 9, "North", 0.1).with_notes("x"),
            LedgerRow::new(4, 9, "South", 0.1).with_notes("x"),
            LedgerRow::new(5, 3, "South", -1.0).with_notes(""),
        ];
        let first = reconcile_rows(&mut rows, true);
        assert_eq!(first.mutated(), 3);
        let second = reconcile_rows(&mut rows, true);
        assert_eq!(second.mutated(), 0);
    }
}
