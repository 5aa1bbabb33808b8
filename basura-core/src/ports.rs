//! Traits describing adapter capabilities and the shared error type.

use std::io::Error as IoError;

use async_trait::async_trait;

use crate::lifecycle::TrainedModel;
use crate::model::{RawTable, SemanticColumn};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur anywhere in the ingestion and classification pipeline.
pub enum CoreError {
    /// A required column could not be located in the sheet.
    #[error("Could not find the {column} column in the dataset")]
    SchemaResolution {
        /// Which semantic column was missing.
        column: SemanticColumn,
    },
    /// No row survived cleaning.
    #[error("Dataset has no valid rows after cleaning")]
    DatasetEmpty,
    /// Training was refused or failed.
    #[error("Training failed: {0}")]
    Training(String),
    /// The held-out evaluation could not be computed.
    #[error("Evaluation failed: {0}")]
    Evaluation(String),
    /// No model has been loaded or trained yet.
    #[error("Model is not ready; train it first")]
    ModelNotReady,
    /// Caller-supplied input was missing or malformed.
    #[error("Invalid input: {0}")]
    InputValidation(String),
    /// No parser is registered for the file type.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    /// The spreadsheet could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The model artifact could not be encoded or decoded.
    #[error("Model artifact error: {0}")]
    Artifact(String),
    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

#[derive(Debug, Clone)]
/// Raw bytes of a spreadsheet together with its file name.
pub struct SheetFile {
    /// File name including extension, used to pick a parser.
    pub file_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl SheetFile {
    /// Wrap a file name and its contents.
    #[must_use]
    pub fn new<S: Into<String>>(file_name: S, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Lower-cased file extension, empty when there is none.
    #[must_use]
    pub fn extension(&self) -> String {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Decoder for one family of spreadsheet files.
pub trait SheetParser: Send + Sync {
    /// Lower-case file extensions handled by this parser.
    fn extensions(&self) -> &[&'static str];

    /// Decode the first sheet into a [`RawTable`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Parse`] when the bytes are not a readable sheet.
    fn parse(&self, bytes: &[u8]) -> Result<RawTable, CoreError>;
}

#[async_trait]
/// Backing store for the spreadsheet the dataset is derived from.
pub trait DatasetSource: Send + Sync {
    /// Read the current spreadsheet.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] when the file cannot be read.
    async fn read(&self) -> Result<SheetFile, CoreError>;

    /// Replace the spreadsheet with an uploaded one.
    ///
    /// Readers observe either the previous or the new file, never a partial write.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] when the file cannot be written.
    async fn replace(&self, sheet: SheetFile) -> Result<(), CoreError>;
}

#[async_trait]
/// Persistence for the single trained model artifact.
pub trait ModelStore: Send + Sync {
    /// Load the persisted model, `None` when no artifact exists yet.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] when the artifact exists but cannot be read.
    async fn load(&self) -> Result<Option<TrainedModel>, CoreError>;

    /// Persist a model, replacing any previous artifact.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] when the artifact cannot be written.
    async fn save(&self, model: &TrainedModel) -> Result<(), CoreError>;
}
