use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use basura_core::{
    lifecycle::ModelState,
    metrics::EvaluationReport,
    model::{CleanRecord, Label, ThresholdPolicy},
    ports::{CoreError, SheetFile},
    query::{AggregateSummary, LevelShare, Statistics},
    service::WasteService,
};

use crate::error::{ApiError, log_failure, status_for};

/// Request fields accepted for the waste quantity of `/predict`, in lookup order.
pub const WASTE_FIELDS: [&str; 3] = ["TotalWaste", "totalWaste", "waste_amount"];

type AppState = Arc<WasteService>;

/// Build the application router.
#[must_use]
pub fn router(service: Arc<WasteService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/waste-data", get(waste_data))
        .route("/api/predictions", get(predictions))
        .route("/api/top5", get(top5))
        .route("/api/total", get(total))
        .route("/api/statistics", get(statistics))
        .route("/api/train", post(train))
        .route("/api/evaluate", get(evaluate))
        .route("/api/model", get(model))
        .route("/predict", post(predict))
        .route("/api/predict", post(predict))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[derive(Debug, Serialize)]
struct WasteDataRow {
    barangay: String,
    predicted: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictionRow {
    id: String,
    barangay: String,
    prediction_level: Label,
    waste_volume: f64,
    recommended_action: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AreaVolume {
    barangay: String,
    waste_volume: f64,
}

impl From<CleanRecord> for AreaVolume {
    fn from(record: CleanRecord) -> Self {
        Self {
            barangay: record.area,
            waste_volume: record.waste_quantity,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TotalResponse {
    total_waste: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recommended_action: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatisticsResponse {
    area_count: usize,
    total_waste: f64,
    average_waste: f64,
    highest_area: Option<AreaVolume>,
    distribution: Vec<LevelShare>,
}

impl From<Statistics> for StatisticsResponse {
    fn from(stats: Statistics) -> Self {
        Self {
            area_count: stats.area_count,
            total_waste: stats.total_waste,
            average_waste: stats.average_waste,
            highest_area: stats.highest_area.map(AreaVolume::from),
            distribution: stats.distribution,
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    level: Label,
    confidence: Option<f64>,
    predicted_daily_kg: f64,
    predicted_weekly_kg: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelDetails {
    policy: ThresholdPolicy,
    classes: Vec<Label>,
    trained_at: String,
    train_size: usize,
    holdout_size: usize,
    leaves: usize,
    depth: usize,
}

#[derive(Debug, Serialize)]
struct ModelResponse {
    state: ModelState,
    ready: bool,
    #[serde(flatten)]
    details: Option<ModelDetails>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    message: String,
    records: usize,
    has_aggregate: bool,
    retrained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn index(State(service): State<AppState>) -> Json<Value> {
    let state = service.lifecycle().state();
    Json(json!({
        "message": "Basura waste-level API is running",
        "model": state,
        "ready": state.is_ready(),
    }))
}

async fn waste_data(State(service): State<AppState>) -> Result<Json<Vec<WasteDataRow>>, ApiError> {
    let rows = service
        .waste_data()
        .await?
        .into_iter()
        .map(|record| WasteDataRow {
            barangay: record.area,
            predicted: record.waste_quantity,
        })
        .collect();
    Ok(Json(rows))
}

async fn predictions(
    State(service): State<AppState>,
) -> Result<Json<Vec<PredictionRow>>, ApiError> {
    let rows = service
        .predictions()
        .await?
        .into_iter()
        .map(|row| PredictionRow {
            id: row.id.to_string(),
            barangay: row.area,
            prediction_level: row.label,
            waste_volume: row.waste_quantity,
            recommended_action: row.recommended_action,
        })
        .collect();
    Ok(Json(rows))
}

async fn top5(State(service): State<AppState>) -> Result<Json<Vec<AreaVolume>>, ApiError> {
    let rows = service
        .top(5)
        .await?
        .into_iter()
        .map(AreaVolume::from)
        .collect();
    Ok(Json(rows))
}

async fn total(State(service): State<AppState>) -> Result<Json<TotalResponse>, ApiError> {
    let response = match service.aggregate().await? {
        AggregateSummary::Present {
            total_waste,
            label,
            recommended_action,
        } => TotalResponse {
            total_waste: Some(total_waste),
            category: Some(label),
            recommended_action: Some(recommended_action),
        },
        AggregateSummary::Absent => TotalResponse {
            total_waste: None,
            category: None,
            recommended_action: None,
        },
    };
    Ok(Json(response))
}

async fn statistics(
    State(service): State<AppState>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    Ok(Json(service.statistics().await?.into()))
}

async fn train(State(service): State<AppState>) -> Response {
    match service.train().await {
        Ok(model) => Json(json!({
            "success": true,
            "trainSize": model.train_size,
            "holdoutSize": model.holdout_size,
        }))
        .into_response(),
        Err(err) => {
            let status = status_for(&err);
            log_failure(status, &err);
            (
                status,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn evaluate(State(service): State<AppState>) -> Result<Json<EvaluationReport>, ApiError> {
    Ok(Json(service.evaluate().await?))
}

async fn model(State(service): State<AppState>) -> Json<ModelResponse> {
    let lifecycle = service.lifecycle();
    let details = lifecycle.current().map(|model| ModelDetails {
        policy: model.policy.clone(),
        classes: model.tree.classes().to_vec(),
        trained_at: model.trained_at.to_rfc3339(),
        train_size: model.train_size,
        holdout_size: model.holdout_size,
        leaves: model.tree.leaf_count(),
        depth: model.tree.depth(),
    });
    let state = lifecycle.state();
    Json(ModelResponse {
        state,
        ready: state.is_ready(),
        details,
    })
}

/// Read the waste quantity out of a `/predict` body.
///
/// # Errors
///
/// Rejects bodies without one of [`WASTE_FIELDS`] or with a value that is not a number or a
/// numeric string.
pub fn waste_quantity(body: &Value) -> Result<f64, ApiError> {
    let value = WASTE_FIELDS
        .iter()
        .find_map(|field| body.get(*field).filter(|value| !value.is_null()))
        .ok_or_else(|| {
            ApiError::invalid(format!(
                "Request body needs a numeric {} field",
                WASTE_FIELDS.join(" or ")
            ))
        })?;
    let quantity = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    quantity.ok_or_else(|| ApiError::invalid(format!("Waste quantity must be numeric, got {value}")))
}

async fn predict(
    State(service): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;
    let outcome = service.predict(waste_quantity(&body)?)?;
    Ok(Json(PredictResponse {
        level: outcome.prediction.label,
        confidence: outcome.prediction.confidence,
        predicted_daily_kg: outcome.per_day,
        predicted_weekly_kg: outcome.per_week,
    }))
}

/// Uploadable extensions as `.csv, .xls, ...`.
fn accepted_formats(service: &WasteService) -> String {
    service
        .supported_extensions()
        .iter()
        .map(|extension| format!(".{extension}"))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn upload(
    State(service): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut sheet = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::invalid(format!("Reading upload failed: {err}")))?
    {
        let Some(file_name) = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .map(str::to_owned)
        else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::invalid(format!("Reading upload failed: {err}")))?;
        sheet = Some(SheetFile::new(file_name, bytes.to_vec()));
        break;
    }
    let sheet = sheet.ok_or_else(|| ApiError::invalid("No file part in the request"))?;

    let file_name = sheet.file_name.clone();
    let report = service.upload(sheet).await.map_err(|err| match err {
        CoreError::UnsupportedFormat(extension) => {
            ApiError(CoreError::UnsupportedFormat(format!(
                "{extension} (accepted: {})",
                accepted_formats(&service)
            )))
        }
        other => ApiError(other),
    })?;
    info!(file = %file_name, records = report.records, "accepted dataset upload");

    let (message, error) = match &report.training {
        Ok(_) => ("File uploaded and model retrained successfully".to_owned(), None),
        Err(err) => (
            "File uploaded but retraining failed; the previous model is still served".to_owned(),
            Some(err.to_string()),
        ),
    };
    Ok(Json(UploadResponse {
        message,
        records: report.records,
        has_aggregate: report.has_aggregate,
        retrained: report.training.is_ok(),
        error,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waste_quantity_accepts_every_field_name_and_numeric_strings() {
        let read = |body: Value| waste_quantity(&body).map_err(|err| err.0.to_string());
        assert_eq!(read(json!({ "TotalWaste": 12.5 })), Ok(12.5));
        assert_eq!(read(json!({ "totalWaste": "640" })), Ok(640.0));
        assert_eq!(read(json!({ "waste_amount": " 7 " })), Ok(7.0));
        assert_eq!(read(json!({ "TotalWaste": null, "totalWaste": 3 })), Ok(3.0));
    }

    #[test]
    fn waste_quantity_rejects_missing_and_non_numeric_values() {
        assert!(waste_quantity(&json!({})).is_err());
        assert!(waste_quantity(&json!([1, 2])).is_err());
        assert!(waste_quantity(&json!({ "TotalWaste": "abc" })).is_err());
        assert!(waste_quantity(&json!({ "TotalWaste": true })).is_err());
    }
}
