//! Classification scores for a held-out set.

use serde::{Deserialize, Serialize};

use crate::model::Label;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Scores of a model against labelled samples.
pub struct EvaluationReport {
    /// Share of correct predictions.
    pub accuracy: f64,
    /// Support-weighted precision.
    pub precision: f64,
    /// Support-weighted recall.
    pub recall: f64,
    /// Support-weighted F1 score.
    pub f1: f64,
    /// Rows are true labels, columns predicted labels, both ordered like `labels`.
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Labels present in either the truth or the predictions, in severity order.
    pub labels: Vec<Label>,
    /// Number of scored samples.
    pub samples: usize,
}

#[expect(
    clippy::cast_precision_loss,
    reason = "sample counts stay far below 2^52"
)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Score predictions against the truth.
///
/// Precision, recall and F1 are averaged over labels weighted by their support in `truth`;
/// a label with no predictions (or no support) contributes zero instead of failing.
/// Pairs are zipped, so extra entries in the longer slice are ignored.
#[must_use]
pub fn evaluate_predictions(truth: &[Label], predicted: &[Label]) -> EvaluationReport {
    let pairs: Vec<(Label, Label)> = truth.iter().copied().zip(predicted.iter().copied()).collect();

    let labels: Vec<Label> = Label::LEVELS
        .into_iter()
        .chain([Label::Unknown])
        .filter(|level| {
            pairs
                .iter()
                .any(|(actual, guess)| actual == level || guess == level)
        })
        .collect();

    let mut matrix = vec![vec![0_usize; labels.len()]; labels.len()];
    for (actual, guess) in &pairs {
        let row = labels.iter().position(|label| label == actual);
        let column = labels.iter().position(|label| label == guess);
        if let (Some(row), Some(column)) = (row, column)
            && let Some(cell) = matrix.get_mut(row).and_then(|cells| cells.get_mut(column))
        {
            *cell += 1;
        }
    }

    let total = pairs.len();
    let correct = pairs.iter().filter(|(actual, guess)| actual == guess).count();

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for (index, _) in labels.iter().enumerate() {
        let true_positive = matrix
            .get(index)
            .and_then(|cells| cells.get(index))
            .copied()
            .unwrap_or(0);
        let support: usize = matrix.get(index).map_or(0, |cells| cells.iter().sum());
        let predicted_count: usize = matrix
            .iter()
            .filter_map(|cells| cells.get(index))
            .sum();

        let label_precision = ratio(true_positive, predicted_count);
        let label_recall = ratio(true_positive, support);
        let label_f1 = if label_precision + label_recall > 0.0 {
            2.0 * label_precision * label_recall / (label_precision + label_recall)
        } else {
            0.0
        };

        let weight = ratio(support, total);
        precision += weight * label_precision;
        recall += weight * label_recall;
        f1 += weight * label_f1;
    }

    EvaluationReport {
        accuracy: ratio(correct, total),
        precision,
        recall,
        f1,
        confusion_matrix: matrix,
        labels,
        samples: total,
    }
}
