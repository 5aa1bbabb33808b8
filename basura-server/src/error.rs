use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use basura_core::ports::CoreError;

/// HTTP status for a pipeline error.
#[must_use]
pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::InputValidation(_) => StatusCode::BAD_REQUEST,
        CoreError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        CoreError::SchemaResolution { .. }
        | CoreError::DatasetEmpty
        | CoreError::Training(_)
        | CoreError::Evaluation(_)
        | CoreError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::ModelNotReady => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Artifact(_) | CoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log a failed request at a level matching its status.
pub(crate) fn log_failure(status: StatusCode, err: &CoreError) {
    if status.is_server_error() {
        error!(%status, error = %err, "request failed");
    } else {
        warn!(%status, error = %err, "request rejected");
    }
}

#[derive(Debug)]
/// A [`CoreError`] rendered as `{ "error": message }` with a matching status.
pub struct ApiError(pub CoreError);

impl ApiError {
    /// Reject malformed request input.
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self(CoreError::InputValidation(message.into()))
    }

    /// Status this error is reported with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        log_failure(status, &self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
