//! HTTP surface for the basura waste-level classifier.

use std::sync::Arc;

use basura_core::{
    categorize::Categorizer,
    lifecycle::{ClassifierLifecycle, SplitSpec},
    plugin::ParserRegistry,
    resolve::ColumnCandidates,
    service::WasteService,
};
use basura_store_fs::{FsDatasetSource, JsonModelStore};

/// Routes and request handlers.
pub mod api;
/// Environment-driven settings.
pub mod config;
/// Mapping of pipeline errors to HTTP responses.
pub mod error;

pub use api::router;
pub use config::ServerConfig;
pub use error::ApiError;

/// Wire the filesystem adapters and sheet parsers into a service.
///
/// Nothing is read until the service is used; call [`WasteService::bootstrap`] to bring the
/// classifier up.
#[must_use]
pub fn build_service(config: &ServerConfig) -> Arc<WasteService> {
    let parsers = Arc::new(ParserRegistry::new(vec![
        basura_sheet_csv::plugin(),
        basura_sheet_excel::plugin(),
    ]));
    let source = Arc::new(FsDatasetSource::new(&config.dataset_path));
    let store = Arc::new(JsonModelStore::new(&config.model_path));
    let lifecycle = Arc::new(ClassifierLifecycle::new(
        store,
        Categorizer::new(config.policy.clone()),
        SplitSpec::default(),
    ));
    Arc::new(WasteService::new(
        parsers,
        source,
        lifecycle,
        ColumnCandidates::default(),
    ))
}
