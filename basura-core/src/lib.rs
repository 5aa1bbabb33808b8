//! Core types and service wiring for the basura waste-level classifier.

/// Waste-level labels and threshold policies.
pub mod categorize;
/// Normalization of raw tables into area records.
pub mod clean;
/// Train, persist, load, and evaluate the waste-level classifier.
pub mod lifecycle;
/// Scoring helpers for held-out evaluation.
pub mod metrics;
/// Domain models shared by all adapters.
pub mod model;
/// Registry for plugging spreadsheet parsers into the service.
pub mod plugin;
/// Traits describing the adapter interfaces.
pub mod ports;
/// Read views derived from a cleaned dataset.
pub mod query;
/// Locating the area and waste columns in an unknown schema.
pub mod resolve;
/// High-level service facade used by clients.
pub mod service;
/// Single-feature decision tree classifier.
pub mod tree;

pub use categorize::*;
pub use clean::*;
pub use lifecycle::*;
pub use metrics::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use query::*;
pub use resolve::*;
pub use service::*;
pub use tree::*;
