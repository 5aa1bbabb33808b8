//! Normalization of a raw sheet into per-area records and an optional total row.

use tracing::{debug, warn};

use crate::model::{Cell, CleanRecord, Dataset, RawTable, ResolvedSchema, SemanticColumn};
use crate::ports::CoreError;
use crate::resolve::{ColumnCandidates, resolve_schema};

/// Read a waste quantity out of a cell.
///
/// Text is trimmed and stripped of thousands separators before parsing. Non-finite and
/// negative values are rejected.
#[must_use]
pub fn coerce_waste(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Number(value) => *value,
        Cell::Text(raw) => raw.trim().replace(',', "").parse::<f64>().ok()?,
        Cell::Bool(_) | Cell::Empty => return None,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Render an area cell as a name.
#[must_use]
pub fn area_name(cell: &Cell) -> String {
    cell.to_string().trim().to_owned()
}

/// Build a [`Dataset`] from the resolved columns of a sheet.
///
/// Row order is preserved. Rows whose waste cannot be coerced are dropped. The first row whose
/// area contains "total" becomes the aggregate; further total rows are discarded.
///
/// # Errors
///
/// Returns [`CoreError::SchemaResolution`] when a resolved column is missing from the table
/// and [`CoreError::DatasetEmpty`] when no row survives coercion.
pub fn clean(table: &RawTable, schema: &ResolvedSchema) -> Result<Dataset, CoreError> {
    let areas = table
        .column(&schema.area_column)
        .ok_or(CoreError::SchemaResolution {
            column: SemanticColumn::Area,
        })?;
    let wastes = table
        .column(&schema.waste_column)
        .ok_or(CoreError::SchemaResolution {
            column: SemanticColumn::Waste,
        })?;

    let mut dataset = Dataset::default();
    let mut kept = 0_usize;
    let mut dropped = 0_usize;

    for row in 0..table.row_count() {
        let Some(waste_quantity) = wastes.cells.get(row).and_then(coerce_waste) else {
            dropped += 1;
            continue;
        };
        kept += 1;

        let area = areas.cells.get(row).map(area_name).unwrap_or_default();
        let record = CleanRecord::new(area, waste_quantity);

        if !record.is_aggregate() {
            dataset.records.push(record);
        } else if dataset.aggregate.is_none() {
            dataset.aggregate = Some(record);
        } else {
            warn!(area = %record.area, row, "discarding additional total row");
        }
    }

    if kept == 0 {
        return Err(CoreError::DatasetEmpty);
    }

    debug!(
        records = dataset.records.len(),
        has_aggregate = dataset.aggregate.is_some(),
        dropped,
        "cleaned dataset"
    );
    Ok(dataset)
}

/// Resolve the schema of a sheet and clean it in one step.
///
/// # Errors
///
/// Propagates [`resolve_schema`] and [`clean`] failures.
pub fn derive_dataset(
    table: &RawTable,
    candidates: &ColumnCandidates,
) -> Result<Dataset, CoreError> {
    let schema = resolve_schema(table, candidates)?;
    clean(table, &schema)
}
