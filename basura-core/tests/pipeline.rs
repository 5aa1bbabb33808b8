//! End-to-end behaviour of the service over in-memory adapters.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use basura_core::{
    AggregateSummary, Categorizer, Cell, ClassifierLifecycle, ColumnCandidates, CoreError,
    DatasetSource, Label, ModelState, ModelStore, ParserRegistry, RawTable, SheetFile,
    SheetParser, SplitSpec, ThresholdPolicy, TrainedModel, WasteService,
};

/// Semicolon separated sheets, enough to drive the pipeline.
struct SemicolonParser;

impl SheetParser for SemicolonParser {
    fn extensions(&self) -> &[&'static str] {
        &["txt"]
    }

    fn parse(&self, bytes: &[u8]) -> Result<RawTable, CoreError> {
        let text = std::str::from_utf8(bytes).map_err(|err| CoreError::Parse(err.to_string()))?;
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| CoreError::Parse("empty".into()))?
            .split(';')
            .map(str::to_owned)
            .collect();
        let rows = lines
            .map(|line| line.split(';').map(Cell::guess).collect())
            .collect();
        Ok(RawTable::from_rows(header, rows))
    }
}

struct MemorySource {
    sheet: Mutex<SheetFile>,
}

#[async_trait]
impl DatasetSource for MemorySource {
    async fn read(&self) -> Result<SheetFile, CoreError> {
        Ok(self.sheet.lock().await.clone())
    }

    async fn replace(&self, sheet: SheetFile) -> Result<(), CoreError> {
        *self.sheet.lock().await = sheet;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Option<TrainedModel>>,
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn load(&self) -> Result<Option<TrainedModel>, CoreError> {
        Ok(self.saved.lock().await.clone())
    }

    async fn save(&self, model: &TrainedModel) -> Result<(), CoreError> {
        *self.saved.lock().await = Some(model.clone());
        Ok(())
    }
}

fn weekly() -> Categorizer {
    Categorizer::new(ThresholdPolicy::preset("weekly-3000-8000").expect("known preset"))
}

fn build(contents: &str, store: Arc<MemoryStore>) -> (WasteService, Arc<MemorySource>) {
    build_with(contents, store, weekly())
}

fn build_with(
    contents: &str,
    store: Arc<MemoryStore>,
    categorizer: Categorizer,
) -> (WasteService, Arc<MemorySource>) {
    let source = Arc::new(MemorySource {
        sheet: Mutex::new(SheetFile::new("dataset.txt", contents.as_bytes().to_vec())),
    });
    let lifecycle = Arc::new(ClassifierLifecycle::new(store, categorizer, SplitSpec::default()));
    let parsers = Arc::new(ParserRegistry::new(vec![Arc::new(SemicolonParser)]));
    let service = WasteService::new(
        parsers,
        Arc::<MemorySource>::clone(&source),
        lifecycle,
        ColumnCandidates::default(),
    );
    (service, source)
}

/// Ten areas in each weekly level plus a total row.
fn trainable_sheet() -> String {
    let mut sheet = String::from("Barangay;TotalWaste\n");
    for index in 0..10 {
        sheet.push_str(&format!("Low {index};1000\nMid {index};5000\nHigh {index};9000\n"));
    }
    sheet.push_str("Total;150000\n");
    sheet
}

#[tokio::test]
async fn scenario_views_label_areas_and_total() {
    let (service, _) = build(
        "Barangay;TotalWaste\nA;100\nB;5000\nTotal;5100\n",
        Arc::default(),
    );

    let records = service.waste_data().await.expect("clean sheet");
    assert_eq!(records.len(), 2);

    let labels: Vec<(String, Label)> = service
        .predictions()
        .await
        .expect("clean sheet")
        .into_iter()
        .map(|row| (row.area, row.label))
        .collect();
    assert_eq!(
        labels,
        vec![("A".to_owned(), Label::Low), ("B".to_owned(), Label::Medium)]
    );

    match service.aggregate().await.expect("clean sheet") {
        AggregateSummary::Present {
            total_waste, label, ..
        } => {
            assert!((total_waste - 5100.0).abs() < 1e-9);
            assert_eq!(label, Label::Medium);
        }
        AggregateSummary::Absent => panic!("total row was not picked up"),
    }

    let top = service.top(5).await.expect("clean sheet");
    assert_eq!(top.first().map(|record| record.area.as_str()), Some("B"));
}

#[tokio::test]
async fn bootstrap_trains_then_restores_from_store() {
    let store = Arc::new(MemoryStore::default());
    let (first, _) = build(&trainable_sheet(), Arc::clone(&store));
    assert_eq!(first.bootstrap().await, ModelState::Trained);

    let outcome = first.predict(9000.0).expect("model is live");
    assert_eq!(outcome.prediction.label, Label::High);
    assert!((outcome.per_week - 9000.0).abs() < 1e-9);
    assert!((outcome.per_day - 9000.0 / 7.0).abs() < 1e-9);

    let (second, _) = build(&trainable_sheet(), store);
    assert_eq!(second.bootstrap().await, ModelState::Loaded);
    assert_eq!(
        second.predict(1000.0).expect("model is live").prediction.label,
        Label::Low
    );
}

#[tokio::test]
async fn bootstrap_retrains_when_the_stored_policy_differs() {
    let mut sheet = String::from("Barangay;TotalWaste\n");
    for index in 0..10 {
        for waste in [100, 600, 900, 5000, 9000] {
            sheet.push_str(&format!("Area {index}-{waste};{waste}\n"));
        }
    }
    let store = Arc::new(MemoryStore::default());
    let (daily, _) = build_with(&sheet, Arc::clone(&store), Categorizer::default());
    assert_eq!(daily.bootstrap().await, ModelState::Trained);

    let (weekly, _) = build(&sheet, store);
    assert_eq!(weekly.bootstrap().await, ModelState::Trained);
    let model = weekly.lifecycle().current().expect("model is live");
    assert_eq!(model.policy.version, "weekly-3000-8000");
    assert_eq!(
        weekly.predict(900.0).expect("model is live").prediction.label,
        Label::Low
    );
}

#[tokio::test]
async fn evaluate_scores_the_withheld_rows() {
    let (service, _) = build(&trainable_sheet(), Arc::default());
    service.train().await.expect("trainable");
    let report = service.evaluate().await.expect("holdout exists");
    assert_eq!(report.samples, 9);
    assert!((report.accuracy - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn single_level_upload_keeps_serving_the_previous_model() {
    let (service, source) = build(&trainable_sheet(), Arc::default());
    let first = service.train().await.expect("trainable");

    let report = service
        .upload(SheetFile::new(
            "flat.txt",
            b"Barangay;TotalWaste\nA;10\nB;20\nC;30\n".to_vec(),
        ))
        .await
        .expect("sheet itself is usable");
    assert_eq!(report.records, 3);
    assert!(!report.has_aggregate);
    assert!(matches!(report.training, Err(CoreError::Training(_))));

    assert_eq!(source.read().await.expect("stored").file_name, "flat.txt");
    let live = service.lifecycle().current().expect("still live");
    assert!(Arc::ptr_eq(&first, &live));
    assert_eq!(
        service.predict(9000.0).expect("model is live").prediction.label,
        Label::High
    );
}

#[tokio::test]
async fn unusable_upload_leaves_dataset_untouched() {
    let (service, source) = build(&trainable_sheet(), Arc::default());

    let unsupported = service
        .upload(SheetFile::new("photo.png", vec![0, 1, 2]))
        .await;
    assert!(matches!(unsupported, Err(CoreError::UnsupportedFormat(_))));

    let empty = service
        .upload(SheetFile::new("empty.txt", b"Barangay;TotalWaste\nA;n/a\n".to_vec()))
        .await;
    assert!(matches!(empty, Err(CoreError::DatasetEmpty)));

    assert_eq!(source.read().await.expect("stored").file_name, "dataset.txt");
}

#[tokio::test]
async fn predict_rejects_non_finite_input_and_missing_model() {
    let (service, _) = build(&trainable_sheet(), Arc::default());
    assert!(matches!(service.predict(10.0), Err(CoreError::ModelNotReady)));
    service.train().await.expect("trainable");
    assert!(matches!(
        service.predict(f64::NAN),
        Err(CoreError::InputValidation(_))
    ));
}
