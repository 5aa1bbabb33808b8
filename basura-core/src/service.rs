//! High-level service facade combining the sheet source, parsers, classifier, and views.

use std::sync::Arc;

use tracing::{info, warn};

use crate::clean::derive_dataset;
use crate::lifecycle::{ClassifierLifecycle, ModelState, PredictionOutcome, TrainedModel};
use crate::metrics::EvaluationReport;
use crate::model::{CleanRecord, Dataset};
use crate::plugin::ParserRegistry;
use crate::ports::{CoreError, DatasetSource, SheetFile};
use crate::query::{AggregateSummary, QueryService, Statistics, TableRow};
use crate::resolve::ColumnCandidates;

#[derive(Debug)]
/// Result of replacing the backing spreadsheet.
pub struct UploadReport {
    /// Per-area records in the new sheet.
    pub records: usize,
    /// Whether the new sheet has a total row.
    pub has_aggregate: bool,
    /// Outcome of the retrain that follows the upload.
    pub training: Result<Arc<TrainedModel>, CoreError>,
}

/// Public entry point for dataset views, training, and prediction.
pub struct WasteService {
    parsers: Arc<ParserRegistry>,
    source: Arc<dyn DatasetSource>,
    lifecycle: Arc<ClassifierLifecycle>,
    query: QueryService,
    candidates: ColumnCandidates,
}

impl WasteService {
    /// Create a new service. Views label areas with the lifecycle's categorizer.
    #[must_use]
    pub fn new(
        parsers: Arc<ParserRegistry>,
        source: Arc<dyn DatasetSource>,
        lifecycle: Arc<ClassifierLifecycle>,
        candidates: ColumnCandidates,
    ) -> Self {
        let query = QueryService::new(lifecycle.categorizer().clone());
        Self {
            parsers,
            source,
            lifecycle,
            query,
            candidates,
        }
    }

    /// The classifier lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> &ClassifierLifecycle {
        &self.lifecycle
    }

    /// File extensions accepted for uploads.
    #[must_use]
    pub fn supported_extensions(&self) -> Vec<String> {
        self.parsers.extensions()
    }

    /// Parse and clean a sheet without touching the backing store.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] when the sheet cannot be parsed, resolved, or cleaned.
    pub fn dataset_from(&self, sheet: &SheetFile) -> Result<Dataset, CoreError> {
        let table = self.parsers.parse(sheet)?;
        derive_dataset(&table, &self.candidates)
    }

    /// Re-read and clean the backing spreadsheet.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] when the sheet cannot be read, parsed, resolved, or cleaned.
    pub async fn dataset(&self) -> Result<Dataset, CoreError> {
        let sheet = self.source.read().await?;
        self.dataset_from(&sheet)
    }

    /// Per-area records without the aggregate row.
    ///
    /// # Errors
    ///
    /// See [`WasteService::dataset`].
    pub async fn waste_data(&self) -> Result<Vec<CleanRecord>, CoreError> {
        Ok(self.dataset().await?.records)
    }

    /// Every area with its label and advice.
    ///
    /// # Errors
    ///
    /// See [`WasteService::dataset`].
    pub async fn predictions(&self) -> Result<Vec<TableRow>, CoreError> {
        Ok(self.query.full_table(&self.dataset().await?))
    }

    /// The `n` areas with the most waste.
    ///
    /// # Errors
    ///
    /// See [`WasteService::dataset`].
    pub async fn top(&self, n: usize) -> Result<Vec<CleanRecord>, CoreError> {
        Ok(self.query.top_n(&self.dataset().await?, n))
    }

    /// Summary of the aggregate row.
    ///
    /// # Errors
    ///
    /// See [`WasteService::dataset`].
    pub async fn aggregate(&self) -> Result<AggregateSummary, CoreError> {
        Ok(self.query.aggregate_summary(&self.dataset().await?))
    }

    /// Dataset-wide statistics.
    ///
    /// # Errors
    ///
    /// See [`WasteService::dataset`].
    pub async fn statistics(&self) -> Result<Statistics, CoreError> {
        Ok(self.query.statistics(&self.dataset().await?))
    }

    /// Retrain on the backing spreadsheet.
    ///
    /// # Errors
    ///
    /// Returns dataset errors and [`ClassifierLifecycle::train`] failures.
    pub async fn train(&self) -> Result<Arc<TrainedModel>, CoreError> {
        let dataset = self.dataset().await?;
        self.lifecycle.train(&dataset).await
    }

    /// Score the live model on the backing spreadsheet.
    ///
    /// # Errors
    ///
    /// Returns dataset errors and [`ClassifierLifecycle::evaluate`] failures.
    pub async fn evaluate(&self) -> Result<EvaluationReport, CoreError> {
        let dataset = self.dataset().await?;
        self.lifecycle.evaluate(&dataset)
    }

    /// Classify a waste quantity and project it to daily and weekly figures.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InputValidation`] for non-finite input and
    /// [`CoreError::ModelNotReady`] when no model is live.
    pub fn predict(&self, waste_quantity: f64) -> Result<PredictionOutcome, CoreError> {
        self.lifecycle.predict(waste_quantity)
    }

    /// Replace the backing spreadsheet and retrain.
    ///
    /// The upload is parsed and cleaned first; an unusable sheet is rejected before anything
    /// is replaced. A failed retrain keeps the previous model and is reported in the result.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] when the upload is unusable or cannot be stored.
    pub async fn upload(&self, sheet: SheetFile) -> Result<UploadReport, CoreError> {
        let dataset = self.dataset_from(&sheet)?;
        let file_name = sheet.file_name.clone();
        self.source.replace(sheet).await?;
        info!(
            file = %file_name,
            records = dataset.len(),
            "replaced backing dataset"
        );

        let training = self.lifecycle.train(&dataset).await;
        if let Err(err) = &training {
            warn!(error = %err, "retraining after upload failed");
        }
        Ok(UploadReport {
            records: dataset.len(),
            has_aggregate: dataset.aggregate.is_some(),
            training,
        })
    }

    /// Bring the classifier up: restore the artifact, or train when there is none.
    ///
    /// Failures are logged and leave the model unloaded.
    pub async fn bootstrap(&self) -> ModelState {
        match self.lifecycle.load().await {
            Ok(true) => return self.lifecycle.state(),
            Ok(false) => {}
            Err(err) => warn!(error = %err, "could not load persisted model"),
        }
        if let Err(err) = self.train().await {
            warn!(error = %err, "initial training failed");
        }
        self.lifecycle.state()
    }
}
