//! HTTP behaviour of the router, driven in-process against a temporary dataset.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use basura_core::{model::ThresholdPolicy, service::WasteService};
use basura_server::{ServerConfig, build_service, router};

const SCENARIO: &str = "Barangay,TotalWaste\nA,100\nB,5000\nTotal,5100\n";

struct Harness {
    _dir: TempDir,
    dataset: PathBuf,
    service: Arc<WasteService>,
    app: Router,
}

impl Harness {
    fn new(sheet: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = dir.path().join("dataset.csv");
        std::fs::write(&dataset, sheet).expect("write dataset");
        let config = ServerConfig {
            dataset_path: dataset.clone(),
            model_path: dir.path().join("model.json"),
            policy: ThresholdPolicy::preset("weekly-3000-8000").expect("known preset"),
            ..ServerConfig::default()
        };
        let service = build_service(&config);
        let app = router(Arc::clone(&service), config.max_upload_bytes);
        Self {
            _dir: dir,
            dataset,
            service,
            app,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).expect("request"))
            .await
    }

    async fn post(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::post(uri).body(Body::empty()).expect("request"))
            .await
    }

    async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    async fn upload(&self, file_name: &str, contents: &str) -> (StatusCode, Value) {
        let boundary = "basura-test-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{contents}\r\n--{boundary}--\r\n"
        );
        self.send(
            Request::post("/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
    }
}

fn trainable_sheet() -> String {
    let mut sheet = String::from("Barangay,TotalWaste\n");
    for index in 0..10 {
        sheet.push_str(&format!("Low {index},1000\nMid {index},5000\nHigh {index},9000\n"));
    }
    sheet.push_str("Total,150000\n");
    sheet
}

#[tokio::test]
async fn read_endpoints_serve_the_scenario() {
    let harness = Harness::new(SCENARIO);

    let (status, body) = harness.get("/api/predictions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {
                "id": "1",
                "barangay": "A",
                "predictionLevel": "Low",
                "wasteVolume": 100.0,
                "recommendedAction": "Reduced collection frequency"
            },
            {
                "id": "2",
                "barangay": "B",
                "predictionLevel": "Medium",
                "wasteVolume": 5000.0,
                "recommendedAction": "Standard collection schedule"
            }
        ])
    );

    let (status, body) = harness.get("/api/total").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "totalWaste": 5100.0,
            "category": "Medium",
            "recommendedAction": "Standard collection schedule"
        })
    );

    let (_, body) = harness.get("/api/waste-data").await;
    assert_eq!(
        body,
        json!([
            { "barangay": "A", "predicted": 100.0 },
            { "barangay": "B", "predicted": 5000.0 }
        ])
    );

    let (_, body) = harness.get("/api/top5").await;
    assert_eq!(body[0]["barangay"], "B");

    let (_, body) = harness.get("/api/statistics").await;
    assert_eq!(body["areaCount"], 2);
    assert_eq!(body["highestArea"]["barangay"], "B");
}

#[tokio::test]
async fn total_is_null_without_aggregate_row() {
    let harness = Harness::new("Barangay,TotalWaste\nA,100\n");
    let (status, body) = harness.get("/api/total").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "totalWaste": null }));
}

#[tokio::test]
async fn unresolvable_sheet_fails_per_request() {
    let harness = Harness::new("Barangay,Notes\nA,quiet\n");
    let (status, body) = harness.get("/api/predictions").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().is_some_and(|msg| msg.contains("waste")));

    let (status, _) = harness.get("/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn predict_requires_a_trained_model() {
    let harness = Harness::new(&trainable_sheet());
    let (status, body) = harness
        .post_json("/predict", &json!({ "TotalWaste": 9000 }))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (_, body) = harness.get("/").await;
    assert_eq!(body["model"], "unloaded");
    assert_eq!(body["ready"], false);
    let (_, body) = harness.get("/api/model").await;
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn train_then_predict() {
    let harness = Harness::new(&trainable_sheet());

    let (status, body) = harness.post("/api/train").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = harness
        .post_json("/predict", &json!({ "TotalWaste": 9000 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], "High");
    assert!(body["confidence"].as_f64().is_some());
    assert_eq!(body["predicted_weekly_kg"], 9000.0);

    let (_, body) = harness
        .post_json("/api/predict", &json!({ "waste_amount": "1000" }))
        .await;
    assert_eq!(body["level"], "Low");

    let (status, body) = harness.get("/api/evaluate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accuracy"], 1.0);
    assert_eq!(body["samples"], 9);

    let (_, body) = harness.get("/api/model").await;
    assert_eq!(body["state"], "trained");
    assert_eq!(body["ready"], true);
    assert_eq!(body["policy"]["version"], "weekly-3000-8000");
}

#[tokio::test]
async fn non_numeric_prediction_is_rejected_without_touching_the_model() {
    let harness = Harness::new(&trainable_sheet());
    let (status, _) = harness.post("/api/train").await;
    assert_eq!(status, StatusCode::OK);
    let before = harness.service.lifecycle().current().expect("trained");

    let (status, body) = harness
        .post_json("/predict", &json!({ "TotalWaste": "abc" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = harness.post_json("/predict", &json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let after = harness.service.lifecycle().current().expect("still trained");
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn single_label_retrain_reports_failure_and_keeps_serving() {
    let harness = Harness::new(&trainable_sheet());
    let (status, _) = harness.post("/api/train").await;
    assert_eq!(status, StatusCode::OK);

    std::fs::write(&harness.dataset, "Barangay,TotalWaste\nA,10\nB,20\nC,30\n")
        .expect("rewrite dataset");
    let (status, body) = harness.post("/api/train").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let (status, body) = harness
        .post_json("/predict", &json!({ "totalWaste": 9000 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], "High");
}

#[tokio::test]
async fn upload_replaces_dataset_and_retrains() {
    let harness = Harness::new(SCENARIO);

    let (status, body) = harness.upload("fresh.csv", &trainable_sheet()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["retrained"], true);
    assert_eq!(body["records"], 30);
    assert_eq!(body["hasAggregate"], true);

    let (_, body) = harness.get("/api/predictions").await;
    assert_eq!(body.as_array().map(Vec::len), Some(30));

    let (status, _) = harness
        .post_json("/predict", &json!({ "TotalWaste": 5000 }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unsupported_upload_is_refused() {
    let harness = Harness::new(SCENARIO);
    let (status, body) = harness.upload("photo.png", "not a sheet").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        body["error"],
        "Unsupported file format: .png (accepted: .csv, .ods, .xls, .xlsb, .xlsx)"
    );

    let (_, body) = harness.get("/api/predictions").await;
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}
