//! Training, persistence, and serving of the waste-level classifier.
//!
//! The live model sits behind a shared handle that is swapped whole: readers clone an
//! `Arc` and keep using it even if a retrain lands meanwhile.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::categorize::Categorizer;
use crate::metrics::{EvaluationReport, evaluate_predictions};
use crate::model::{Dataset, Label, ThresholdPolicy};
use crate::ports::{CoreError, ModelStore};
use crate::tree::{DecisionTree, Prediction};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Parameters of the seeded train/held-out split.
pub struct SplitSpec {
    /// Share of records withheld from training.
    pub test_fraction: f64,
    /// Shuffle seed.
    pub seed: u64,
}

impl Default for SplitSpec {
    fn default() -> Self {
        Self {
            test_fraction: 0.3,
            seed: 42,
        }
    }
}

impl SplitSpec {
    /// Build a validated split specification.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InputValidation`] unless `0 <= test_fraction < 1`.
    pub fn new(test_fraction: f64, seed: u64) -> Result<Self, CoreError> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(CoreError::InputValidation(format!(
                "test fraction must be in [0, 1), got {test_fraction}"
            )));
        }
        Ok(Self {
            test_fraction,
            seed,
        })
    }

    /// Number of held-out items for a collection of `len` items.
    ///
    /// Rounds up and always leaves at least one item for training.
    #[must_use]
    pub fn holdout_len(&self, len: usize) -> usize {
        if len < 2 {
            return 0;
        }
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::cast_sign_loss,
            reason = "fraction is in [0, 1), so the product is a small non-negative count"
        )]
        let wanted = (len as f64 * self.test_fraction).ceil() as usize;
        wanted.min(len - 1)
    }

    /// Shuffle deterministically and split into `(train, holdout)`.
    #[must_use]
    pub fn split<T: Clone>(&self, items: &[T]) -> (Vec<T>, Vec<T>) {
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));

        let holdout_len = self.holdout_len(items.len());
        let pick = |indices: &[usize]| -> Vec<T> {
            indices
                .iter()
                .filter_map(|&index| items.get(index).cloned())
                .collect()
        };
        let (holdout, train) = order.split_at(holdout_len);
        (pick(train), pick(holdout))
    }
}

/// Accept a quantity for prediction.
///
/// # Errors
///
/// Returns [`CoreError::InputValidation`] for `NaN` and infinities.
pub fn validate_quantity(waste_quantity: f64) -> Result<f64, CoreError> {
    if waste_quantity.is_finite() {
        Ok(waste_quantity)
    } else {
        Err(CoreError::InputValidation(
            "waste quantity must be a finite number".into(),
        ))
    }
}

/// Label every per-area record with the categorizer.
#[must_use]
pub fn label_records(dataset: &Dataset, categorizer: &Categorizer) -> Vec<(f64, Label)> {
    dataset
        .records
        .iter()
        .map(|record| {
            (
                record.waste_quantity,
                categorizer.categorize(record.waste_quantity),
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A fitted classifier together with everything needed to reproduce its evaluation.
pub struct TrainedModel {
    /// The fitted tree.
    pub tree: DecisionTree,
    /// Policy that produced the training labels.
    pub policy: ThresholdPolicy,
    /// Split used to withhold evaluation records.
    pub split: SplitSpec,
    /// When the model was fitted.
    pub trained_at: DateTime<Utc>,
    /// Records used for fitting.
    pub train_size: usize,
    /// Records withheld for evaluation.
    pub holdout_size: usize,
}

impl TrainedModel {
    /// Fit a model on a dataset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Training`] when the dataset has no records or fewer than two
    /// distinct labels.
    pub fn fit(
        dataset: &Dataset,
        categorizer: &Categorizer,
        split: SplitSpec,
    ) -> Result<Self, CoreError> {
        if dataset.is_empty() {
            return Err(CoreError::Training("dataset has no usable records".into()));
        }

        let samples = label_records(dataset, categorizer);
        let distinct = Label::LEVELS
            .iter()
            .filter(|level| samples.iter().any(|(_, label)| label == *level))
            .count();
        if distinct < 2 {
            return Err(CoreError::Training(format!(
                "need at least two waste levels to train, found {distinct}"
            )));
        }

        let (train, holdout) = split.split(&samples);
        debug!(
            train = train.len(),
            holdout = holdout.len(),
            seed = split.seed,
            "split training data"
        );
        let tree = DecisionTree::fit(&train)?;

        Ok(Self {
            tree,
            policy: categorizer.policy().clone(),
            split,
            trained_at: Utc::now(),
            train_size: train.len(),
            holdout_size: holdout.len(),
        })
    }

    /// Classify a waste quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Artifact`] when the stored tree is malformed.
    pub fn predict(&self, waste_quantity: f64) -> Result<Prediction, CoreError> {
        self.tree.predict(waste_quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// A prediction with the input projected to both time units.
pub struct PredictionOutcome {
    /// Classifier output.
    pub prediction: Prediction,
    /// Input expressed per day.
    pub per_day: f64,
    /// Input expressed per week.
    pub per_week: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Where the live model came from.
pub enum ModelState {
    /// Nothing loaded or trained yet.
    Unloaded,
    /// Restored from the persisted artifact.
    Loaded,
    /// Fitted in this process.
    Trained,
}

impl ModelState {
    /// Whether a model is available for prediction.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        !matches!(self, Self::Unloaded)
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Trained => "trained",
        };
        write!(formatter, "{slug}")
    }
}

struct Slot {
    model: Option<Arc<TrainedModel>>,
    state: ModelState,
}

/// Owner of the live classifier and its persisted artifact.
pub struct ClassifierLifecycle {
    store: Arc<dyn ModelStore>,
    categorizer: Categorizer,
    split: SplitSpec,
    slot: RwLock<Slot>,
    training: Mutex<()>,
}

impl ClassifierLifecycle {
    /// Create an unloaded lifecycle that labels training data with `categorizer`.
    #[must_use]
    pub fn new(store: Arc<dyn ModelStore>, categorizer: Categorizer, split: SplitSpec) -> Self {
        Self {
            store,
            categorizer,
            split,
            slot: RwLock::new(Slot {
                model: None,
                state: ModelState::Unloaded,
            }),
            training: Mutex::new(()),
        }
    }

    fn install(&self, model: Arc<TrainedModel>, state: ModelState) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.model = Some(model);
        slot.state = state;
    }

    /// The live model, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .model
            .clone()
    }

    /// Where the live model came from.
    #[must_use]
    pub fn state(&self) -> ModelState {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).state
    }

    /// Categorizer used for new training runs.
    #[must_use]
    pub const fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    /// Restore the persisted artifact, returning whether a usable one existed.
    ///
    /// An artifact trained under a threshold policy other than the configured one is not
    /// installed and counts as absent.
    ///
    /// # Errors
    ///
    /// Returns the store's error when the artifact exists but cannot be read; the live model
    /// is left untouched.
    pub async fn load(&self) -> Result<bool, CoreError> {
        let Some(model) = self.store.load().await? else {
            debug!("no persisted model artifact");
            return Ok(false);
        };
        if model.policy != *self.categorizer.policy() {
            warn!(
                stored = %model.policy.version,
                configured = %self.categorizer.policy().version,
                "persisted model was trained under another threshold policy; ignoring it"
            );
            return Ok(false);
        }
        info!(
            policy = %model.policy.version,
            trained_at = %model.trained_at,
            "loaded persisted model"
        );
        self.install(Arc::new(model), ModelState::Loaded);
        Ok(true)
    }

    /// Fit a fresh model, persist it, then make it live.
    ///
    /// Runs one at a time. On any failure the previous model stays live.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Training`] for unusable datasets and the store's error when the
    /// artifact cannot be written.
    pub async fn train(&self, dataset: &Dataset) -> Result<Arc<TrainedModel>, CoreError> {
        let _guard = self.training.lock().await;

        let model = Arc::new(TrainedModel::fit(dataset, &self.categorizer, self.split)?);
        self.store.save(&model).await?;
        self.install(Arc::clone(&model), ModelState::Trained);

        info!(
            train = model.train_size,
            holdout = model.holdout_size,
            leaves = model.tree.leaf_count(),
            policy = %model.policy.version,
            "trained waste-level model"
        );
        Ok(model)
    }

    /// Classify a waste quantity with the live model and project it to both time units.
    ///
    /// The projection uses the unit of the model that made the prediction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InputValidation`] for non-finite input and
    /// [`CoreError::ModelNotReady`] when no model is live.
    pub fn predict(&self, waste_quantity: f64) -> Result<PredictionOutcome, CoreError> {
        let waste_quantity = validate_quantity(waste_quantity)?;
        let model = self.ready_model()?;
        let prediction = model.predict(waste_quantity)?;
        let (per_day, per_week) = model.policy.unit.project(waste_quantity);
        Ok(PredictionOutcome {
            prediction,
            per_day,
            per_week,
        })
    }

    /// The live model, or [`CoreError::ModelNotReady`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ModelNotReady`] when nothing has been loaded or trained.
    pub fn ready_model(&self) -> Result<Arc<TrainedModel>, CoreError> {
        self.current().ok_or(CoreError::ModelNotReady)
    }

    /// Score the live model on the held-out part of `dataset`.
    ///
    /// Labels and split come from the model itself, so an unchanged dataset is scored on the
    /// exact records that were withheld at training time. Nothing is refitted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ModelNotReady`] without a live model and
    /// [`CoreError::Evaluation`] when the held-out set is empty.
    pub fn evaluate(&self, dataset: &Dataset) -> Result<EvaluationReport, CoreError> {
        let model = self.ready_model()?;
        let categorizer = Categorizer::new(model.policy.clone());
        let samples = label_records(dataset, &categorizer);
        let (_, holdout) = model.split.split(&samples);
        if holdout.is_empty() {
            return Err(CoreError::Evaluation(
                "not enough records to withhold an evaluation set".into(),
            ));
        }

        let truth: Vec<Label> = holdout.iter().map(|(_, label)| *label).collect();
        let predicted = holdout
            .iter()
            .map(|(value, _)| model.predict(*value).map(|prediction| prediction.label))
            .collect::<Result<Vec<Label>, CoreError>>()?;

        Ok(evaluate_predictions(&truth, &predicted))
    }
}
