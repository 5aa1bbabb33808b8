//! Locating the area and waste columns in a sheet whose headers vary between sources.
//!
//! Resolution tries a fixed list of strategies and keeps the first hit:
//!
//! ```text
//!  exact name ──► substring ──► value-based fallback
//!                                 area:  first text column
//!                                 waste: numeric column with the largest mean
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{RawColumn, RawTable, ResolvedSchema, SemanticColumn};
use crate::ports::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Candidate header names per semantic column, in priority order.
pub struct ColumnCandidates {
    /// Names that identify the area column.
    pub area: Vec<String>,
    /// Names that identify the waste quantity column.
    pub waste: Vec<String>,
}

impl Default for ColumnCandidates {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|name| (*name).to_owned()).collect();
        Self {
            area: owned(&["barangay", "area", "location", "district", "name"]),
            waste: owned(&[
                "totalwaste",
                "total waste",
                "sw generation (population x sw segregation) kg/day",
                "sw generation",
                "waste",
                "generation",
                "kg/day",
            ]),
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Exact, case-insensitive, whitespace-trimmed match.
///
/// Candidates are scanned in priority order, raw columns in sheet order.
#[must_use]
pub fn exact_match<S: AsRef<str>>(raw_columns: &[&str], candidates: &[S]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        let wanted = normalize(candidate.as_ref());
        raw_columns
            .iter()
            .position(|column| normalize(column) == wanted)
    })
}

/// A candidate appearing anywhere inside a normalized raw column name.
#[must_use]
pub fn substring_match<S: AsRef<str>>(raw_columns: &[&str], candidates: &[S]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        let wanted = normalize(candidate.as_ref());
        if wanted.is_empty() {
            return None;
        }
        raw_columns
            .iter()
            .position(|column| normalize(column).contains(&wanted))
    })
}

/// Name-based resolution: exact match first, then substring match.
#[must_use]
pub fn resolve<S: AsRef<str>>(raw_columns: &[&str], candidates: &[S]) -> Option<String> {
    exact_match(raw_columns, candidates)
        .or_else(|| substring_match(raw_columns, candidates))
        .and_then(|index| raw_columns.get(index))
        .map(|name| (*name).to_owned())
}

/// Numeric column with the largest mean, skipping `exclude`.
///
/// Columns named like "total" are only considered when no other numeric column exists.
#[must_use]
pub fn largest_mean_numeric(table: &RawTable, exclude: Option<&str>) -> Option<String> {
    let numeric: Vec<(&RawColumn, f64)> = table
        .columns
        .iter()
        .filter(|column| Some(column.name.as_str()) != exclude && column.is_numeric())
        .filter_map(|column| column.numeric_mean().map(|mean| (column, mean)))
        .collect();

    let (totals, others): (Vec<_>, Vec<_>) = numeric
        .into_iter()
        .partition(|(column, _)| normalize(&column.name).contains("total"));
    let pool = if others.is_empty() { totals } else { others };

    pool.into_iter()
        .fold(None, |best: Option<(&RawColumn, f64)>, (column, mean)| match best {
            Some((_, best_mean)) if best_mean >= mean => best,
            _ => Some((column, mean)),
        })
        .map(|(column, _)| column.name.clone())
}

/// First text column, skipping `exclude`.
#[must_use]
pub fn first_text_column(table: &RawTable, exclude: Option<&str>) -> Option<String> {
    table
        .columns
        .iter()
        .find(|column| Some(column.name.as_str()) != exclude && column.is_text())
        .map(|column| column.name.clone())
}

/// Resolve both semantic columns of a sheet.
///
/// # Errors
///
/// Returns [`CoreError::SchemaResolution`] naming the column no strategy could find.
pub fn resolve_schema(
    table: &RawTable,
    candidates: &ColumnCandidates,
) -> Result<ResolvedSchema, CoreError> {
    let names = table.column_names();

    let area_by_name = resolve(&names, &candidates.area);
    let waste_by_name = resolve(&names, &candidates.waste)
        .filter(|waste| area_by_name.as_deref() != Some(waste.as_str()));

    let area_column = match area_by_name {
        Some(name) => name,
        None => {
            let fallback = first_text_column(table, waste_by_name.as_deref());
            if let Some(name) = &fallback {
                warn!(column = %name, "area column resolved by text fallback");
            }
            fallback.ok_or(CoreError::SchemaResolution {
                column: SemanticColumn::Area,
            })?
        }
    };

    let waste_column = match waste_by_name {
        Some(name) => name,
        None => {
            let fallback = largest_mean_numeric(table, Some(&area_column));
            if let Some(name) = &fallback {
                warn!(column = %name, "waste column resolved by largest-mean fallback");
            }
            fallback.ok_or(CoreError::SchemaResolution {
                column: SemanticColumn::Waste,
            })?
        }
    };

    debug!(area = %area_column, waste = %waste_column, "resolved dataset schema");
    Ok(ResolvedSchema {
        area_column,
        waste_column,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cell;

    fn text(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|value| Cell::Text((*value).to_owned())).collect()
    }

    fn numbers(values: &[f64]) -> Vec<Cell> {
        values.iter().copied().map(Cell::Number).collect()
    }

    #[test]
    fn exact_match_respects_candidate_priority() {
        let columns = ["Area", " BARANGAY "];
        assert_eq!(exact_match(&columns, &["barangay", "area"]), Some(1));
        assert_eq!(exact_match(&columns, &["district"]), None);
    }

    #[test]
    fn substring_match_finds_embedded_candidate() {
        let columns = ["No.", "SW generation (Population x SW segregation) kg/day"];
        assert_eq!(substring_match(&columns, &["sw generation"]), Some(1));
        assert_eq!(substring_match(&columns, &[""]), None);
    }

    #[test]
    fn resolve_prefers_exact_over_substring() {
        let columns = ["Waste Total", "Waste"];
        assert_eq!(resolve(&columns, &["waste"]), Some("Waste".to_owned()));
    }

    #[test]
    fn largest_mean_skips_total_columns_when_alternatives_exist() {
        let table = RawTable::new(vec![
            RawColumn::new("Barangay", text(&["A", "B"])),
            RawColumn::new("Population", numbers(&[10.0, 20.0])),
            RawColumn::new("Total", numbers(&[1000.0, 2000.0])),
            RawColumn::new("Output", numbers(&[50.0, 60.0])),
        ]);
        assert_eq!(largest_mean_numeric(&table, None), Some("Output".to_owned()));
        assert_eq!(
            largest_mean_numeric(&table, Some("Output")),
            Some("Population".to_owned())
        );
    }

    #[test]
    fn largest_mean_uses_total_column_as_last_resort() {
        let table = RawTable::new(vec![
            RawColumn::new("Barangay", text(&["A"])),
            RawColumn::new("Total kg", numbers(&[5.0])),
        ]);
        assert_eq!(largest_mean_numeric(&table, None), Some("Total kg".to_owned()));
    }

    #[test]
    fn first_text_column_honours_exclusion() {
        let table = RawTable::new(vec![
            RawColumn::new("Id", numbers(&[1.0])),
            RawColumn::new("Code", text(&["x"])),
            RawColumn::new("Place", text(&["y"])),
        ]);
        assert_eq!(first_text_column(&table, None), Some("Code".to_owned()));
        assert_eq!(first_text_column(&table, Some("Code")), Some("Place".to_owned()));
    }

    #[test]
    fn barangay_header_with_one_numeric_column_resolves() {
        let table = RawTable::new(vec![
            RawColumn::new("BARANGAY", text(&["A", "B"])),
            RawColumn::new("Kilos", numbers(&[1.0, 2.0])),
        ]);
        let schema = resolve_schema(&table, &ColumnCandidates::default()).expect("resolvable");
        assert_eq!(schema.area_column, "BARANGAY");
        assert_eq!(schema.waste_column, "Kilos");
    }

    #[test]
    fn survey_headers_resolve_by_name() {
        let table = RawTable::new(vec![
            RawColumn::new("Barangay", text(&["A"])),
            RawColumn::new("Population", numbers(&[9000.0])),
            RawColumn::new(
                "SW generation (Population x SW segregation) kg/day",
                numbers(&[450.0]),
            ),
        ]);
        let schema = resolve_schema(&table, &ColumnCandidates::default()).expect("resolvable");
        assert_eq!(
            schema.waste_column,
            "SW generation (Population x SW segregation) kg/day"
        );
    }

    #[test]
    fn fallbacks_resolve_unnamed_columns() {
        let table = RawTable::new(vec![
            RawColumn::new("Col1", text(&["A", "B"])),
            RawColumn::new("Col2", numbers(&[3.0, 4.0])),
        ]);
        let schema = resolve_schema(&table, &ColumnCandidates::default()).expect("resolvable");
        assert_eq!(schema.area_column, "Col1");
        assert_eq!(schema.waste_column, "Col2");
    }

    #[test]
    fn missing_waste_column_names_the_waste_column() {
        let table = RawTable::new(vec![RawColumn::new("Barangay", text(&["A"]))]);
        let err = resolve_schema(&table, &ColumnCandidates::default()).expect_err("no numbers");
        assert!(matches!(
            err,
            CoreError::SchemaResolution {
                column: SemanticColumn::Waste
            }
        ));
    }

    #[test]
    fn missing_area_column_names_the_area_column() {
        let table = RawTable::new(vec![RawColumn::new("Kilos", numbers(&[1.0]))]);
        let err = resolve_schema(&table, &ColumnCandidates::default()).expect_err("no text");
        assert!(matches!(
            err,
            CoreError::SchemaResolution {
                column: SemanticColumn::Area
            }
        ));
    }
}
