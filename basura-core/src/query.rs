//! Read views over a cleaned dataset. None of these touch the trained classifier.

use serde::{Deserialize, Serialize};

use crate::categorize::Categorizer;
use crate::model::{CleanRecord, Dataset, Label};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One area with its threshold label and advice.
pub struct TableRow {
    /// One-based position in the dataset.
    pub id: usize,
    /// Area name.
    pub area: String,
    /// Threshold label.
    pub label: Label,
    /// Waste quantity.
    pub waste_quantity: f64,
    /// Collection advice for `label`.
    pub recommended_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Summary of the aggregate row, when the sheet has one.
pub enum AggregateSummary {
    /// The sheet carries a total row.
    Present {
        /// Total waste quantity.
        total_waste: f64,
        /// Threshold label of the total.
        label: Label,
        /// Collection advice for `label`.
        recommended_action: String,
    },
    /// The sheet has no total row.
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Count and share of areas at one waste level.
pub struct LevelShare {
    /// Waste level.
    pub level: Label,
    /// Areas at this level.
    pub count: usize,
    /// Percentage of all areas, 0 to 100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Dataset-wide figures over the per-area records.
pub struct Statistics {
    /// Number of areas.
    pub area_count: usize,
    /// Sum of per-area waste.
    pub total_waste: f64,
    /// Mean per-area waste, zero without areas.
    pub average_waste: f64,
    /// Area with the most waste (first one on ties).
    pub highest_area: Option<CleanRecord>,
    /// Areas per level, in severity order.
    pub distribution: Vec<LevelShare>,
}

#[derive(Debug, Clone, Default)]
/// Derives read views from a [`Dataset`] with a [`Categorizer`].
pub struct QueryService {
    categorizer: Categorizer,
}

impl QueryService {
    /// Create a query service.
    #[must_use]
    pub const fn new(categorizer: Categorizer) -> Self {
        Self { categorizer }
    }

    /// The categorizer used for labels.
    #[must_use]
    pub const fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    /// Every area with its label and advice, in dataset order.
    #[must_use]
    pub fn full_table(&self, dataset: &Dataset) -> Vec<TableRow> {
        dataset
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let label = self.categorizer.categorize(record.waste_quantity);
                TableRow {
                    id: index + 1,
                    area: record.area.clone(),
                    label,
                    waste_quantity: record.waste_quantity,
                    recommended_action: label.recommended_action().to_owned(),
                }
            })
            .collect()
    }

    /// The `n` areas with the most waste, ties kept in dataset order.
    #[must_use]
    pub fn top_n(&self, dataset: &Dataset, n: usize) -> Vec<CleanRecord> {
        let mut ranked: Vec<&CleanRecord> = dataset.records.iter().collect();
        ranked.sort_by(|left, right| right.waste_quantity.total_cmp(&left.waste_quantity));
        ranked.into_iter().take(n).cloned().collect()
    }

    /// Label and advice for the aggregate row.
    #[must_use]
    pub fn aggregate_summary(&self, dataset: &Dataset) -> AggregateSummary {
        dataset
            .aggregate
            .as_ref()
            .map_or(AggregateSummary::Absent, |aggregate| {
                let label = self.categorizer.categorize(aggregate.waste_quantity);
                AggregateSummary::Present {
                    total_waste: aggregate.waste_quantity,
                    label,
                    recommended_action: label.recommended_action().to_owned(),
                }
            })
    }

    /// Totals and level distribution over the per-area records.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "area counts stay far below 2^52"
    )]
    pub fn statistics(&self, dataset: &Dataset) -> Statistics {
        let area_count = dataset.len();
        let total_waste: f64 = dataset.records.iter().map(|r| r.waste_quantity).sum();
        let average_waste = if area_count == 0 {
            0.0
        } else {
            total_waste / area_count as f64
        };

        let highest_area = dataset
            .records
            .iter()
            .fold(None, |best: Option<&CleanRecord>, record| match best {
                Some(current) if current.waste_quantity >= record.waste_quantity => best,
                _ => Some(record),
            })
            .cloned();

        let distribution = Label::LEVELS
            .into_iter()
            .map(|level| {
                let count = dataset
                    .records
                    .iter()
                    .filter(|record| self.categorizer.categorize(record.waste_quantity) == level)
                    .count();
                let percentage = if area_count == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / area_count as f64
                };
                LevelShare {
                    level,
                    count,
                    percentage,
                }
            })
            .collect();

        Statistics {
            area_count,
            total_waste,
            average_waste,
            highest_area,
            distribution,
        }
    }
}
