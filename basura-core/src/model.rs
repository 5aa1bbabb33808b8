//! Domain data structures for raw sheets, cleaned area records, and waste levels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ports::CoreError;

#[derive(Debug, Clone, PartialEq)]
/// A single cell of a freshly parsed spreadsheet.
pub enum Cell {
    /// Finite numeric value.
    Number(f64),
    /// Free text.
    Text(String),
    /// Boolean literal.
    Bool(bool),
    /// Blank cell.
    Empty,
}

impl Cell {
    /// Guess the cell type from its textual form.
    ///
    /// Non-finite numbers such as `NaN` or `inf` stay text.
    #[must_use]
    pub fn guess(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        if let Ok(value) = trimmed.parse::<f64>()
            && value.is_finite()
        {
            return Self::Number(value);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => Self::Text(trimmed.to_owned()),
        }
    }

    /// Numeric value of the cell, if it holds one.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Whether the cell is blank.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(formatter, "{value:.0}")
            }
            Self::Number(value) => write!(formatter, "{value}"),
            Self::Text(text) => write!(formatter, "{text}"),
            Self::Bool(flag) => write!(formatter, "{flag}"),
            Self::Empty => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One named column of a raw sheet.
pub struct RawColumn {
    /// Header text as found in the sheet.
    pub name: String,
    /// Cells in source row order.
    pub cells: Vec<Cell>,
}

impl RawColumn {
    /// Create a column from its header and cells.
    #[must_use]
    pub fn new<S: Into<String>>(name: S, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// A column holding at least one number and nothing but numbers or blanks.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        let mut seen_number = false;
        for cell in &self.cells {
            match cell {
                Cell::Number(_) => seen_number = true,
                Cell::Empty => {}
                Cell::Text(_) | Cell::Bool(_) => return false,
            }
        }
        seen_number
    }

    /// A column holding at least one text cell.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.cells.iter().any(|cell| matches!(cell, Cell::Text(_)))
    }

    /// Arithmetic mean over the numeric cells, `None` when there are none.
    #[must_use]
    pub fn numeric_mean(&self) -> Option<f64> {
        let (sum, count) = self
            .cells
            .iter()
            .filter_map(Cell::as_number)
            .fold((0.0_f64, 0_u32), |(sum, count), value| (sum + value, count + 1));
        (count > 0).then(|| sum / f64::from(count))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Sheet with an unknown schema, as produced by a [`crate::ports::SheetParser`].
pub struct RawTable {
    /// Columns in sheet order.
    pub columns: Vec<RawColumn>,
}

impl RawTable {
    /// Build a table from ready-made columns.
    #[must_use]
    pub const fn new(columns: Vec<RawColumn>) -> Self {
        Self { columns }
    }

    /// Build a table from a header row and data rows.
    ///
    /// Short rows are padded with [`Cell::Empty`], cells beyond the header are dropped, and
    /// blank header names become `Unnamed: <index>`.
    #[must_use]
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut columns: Vec<RawColumn> = header
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let name = name.trim();
                let name = if name.is_empty() {
                    format!("Unnamed: {index}")
                } else {
                    name.to_owned()
                };
                RawColumn::new(name, Vec::with_capacity(rows.len()))
            })
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in &mut columns {
                column.cells.push(cells.next().unwrap_or(Cell::Empty));
            }
        }

        Self { columns }
    }

    /// Header names in sheet order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Look up a column by exact header name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Number of data rows (the longest column wins).
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.columns
            .iter()
            .map(|column| column.cells.len())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// The two meanings a raw column can be resolved to.
pub enum SemanticColumn {
    /// Area identifier (barangay, district, ...).
    Area,
    /// Waste quantity per area.
    Waste,
}

impl fmt::Display for SemanticColumn {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Self::Area => "area",
            Self::Waste => "waste",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Names of the raw columns carrying the area and the waste quantity.
pub struct ResolvedSchema {
    /// Column holding the area name.
    pub area_column: String,
    /// Column holding the waste quantity.
    pub waste_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One cleaned row: an area and its finite, non-negative waste quantity.
pub struct CleanRecord {
    /// Area name.
    pub area: String,
    /// Waste quantity in the unit of the active [`ThresholdPolicy`].
    pub waste_quantity: f64,
}

impl CleanRecord {
    /// Construct a record.
    #[must_use]
    pub fn new<S: Into<String>>(area: S, waste_quantity: f64) -> Self {
        Self {
            area: area.into(),
            waste_quantity,
        }
    }

    /// Whether the area name marks a pre-aggregated total row.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        self.area.to_lowercase().contains("total")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Cleaned per-area records plus the optional aggregate row.
pub struct Dataset {
    /// Per-area records in source order, never containing an aggregate row.
    pub records: Vec<CleanRecord>,
    /// The aggregate ("total") row, if the sheet had one.
    pub aggregate: Option<CleanRecord>,
}

impl Dataset {
    /// Number of per-area records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no per-area records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Waste severity level.
pub enum Label {
    /// Below the low/medium cut.
    Low,
    /// Between the two cuts.
    Medium,
    /// At or above the medium/high cut.
    High,
    /// Input could not be read as a number.
    Unknown,
}

impl Label {
    /// The three severity levels in increasing order.
    pub const LEVELS: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Severity rank, `None` for [`Label::Unknown`].
    #[must_use]
    pub const fn severity(self) -> Option<u8> {
        match self {
            Self::Low => Some(0),
            Self::Medium => Some(1),
            Self::High => Some(2),
            Self::Unknown => None,
        }
    }

    /// Collection advice for this level.
    #[must_use]
    pub const fn recommended_action(self) -> &'static str {
        match self {
            Self::High => "Deploy 2 trucks, priority collection",
            Self::Medium => "Standard collection schedule",
            Self::Low => "Reduced collection frequency",
            Self::Unknown => "No recommendation available",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Unknown => "Unknown",
        };
        write!(formatter, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Time basis of the waste quantities in a sheet.
pub enum WasteUnit {
    /// Kilograms per day.
    Daily,
    /// Kilograms per week.
    Weekly,
}

impl WasteUnit {
    /// Convert a quantity in this unit to `(per_day, per_week)`.
    #[must_use]
    pub fn project(self, quantity: f64) -> (f64, f64) {
        match self {
            Self::Daily => (quantity, quantity * 7.0),
            Self::Weekly => (quantity / 7.0, quantity),
        }
    }
}

impl fmt::Display for WasteUnit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Versioned pair of cut points mapping a waste quantity to a [`Label`].
pub struct ThresholdPolicy {
    /// Identifier of this policy, stored with every trained model.
    pub version: String,
    /// Unit the cut points are expressed in.
    pub unit: WasteUnit,
    /// Quantities at or above this are at least [`Label::Medium`].
    pub low_medium: f64,
    /// Quantities at or above this are [`Label::High`].
    pub medium_high: f64,
}

impl ThresholdPolicy {
    /// Name of the preset used when nothing else is configured.
    pub const DEFAULT_PRESET: &'static str = "daily-500-700";

    /// Build a validated policy.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InputValidation`] unless `0 <= low_medium < medium_high` and both
    /// cut points are finite.
    pub fn new<S: Into<String>>(
        version: S,
        unit: WasteUnit,
        low_medium: f64,
        medium_high: f64,
    ) -> Result<Self, CoreError> {
        if !low_medium.is_finite() || !medium_high.is_finite() {
            return Err(CoreError::InputValidation(
                "threshold cut points must be finite".into(),
            ));
        }
        if low_medium < 0.0 || low_medium >= medium_high {
            return Err(CoreError::InputValidation(format!(
                "thresholds must satisfy 0 <= low/medium < medium/high, got {low_medium} and {medium_high}"
            )));
        }
        Ok(Self {
            version: version.into(),
            unit,
            low_medium,
            medium_high,
        })
    }

    /// Look up a named preset.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        let (unit, low_medium, medium_high) = match name {
            "daily-500-700" => (WasteUnit::Daily, 500.0, 700.0),
            "weekly-3000-8000" => (WasteUnit::Weekly, 3000.0, 8000.0),
            _ => return None,
        };
        Some(Self {
            version: name.to_owned(),
            unit,
            low_medium,
            medium_high,
        })
    }

    /// Names of all presets.
    #[must_use]
    pub const fn preset_names() -> [&'static str; 2] {
        ["daily-500-700", "weekly-3000-8000"]
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            version: Self::DEFAULT_PRESET.to_owned(),
            unit: WasteUnit::Daily,
            low_medium: 500.0,
            medium_high: 700.0,
        }
    }
}
