//! Filesystem adapters: the backing spreadsheet and the persisted model artifact.
//!
//! Both write through a sibling temporary file and a rename, so readers never observe a
//! half-written file.

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use basura_core::{
    lifecycle::TrainedModel,
    ports::{CoreError, DatasetSource, ModelStore, SheetFile},
};

/// Path of the temporary file used while writing `path`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `bytes` via a temporary sibling file.
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let staging = staging_path(path);
    fs::write(&staging, bytes).await?;
    if let Err(err) = fs::rename(&staging, path).await {
        // Best effort; the rename error is the one worth reporting.
        let _removed = fs::remove_file(&staging).await;
        return Err(err.into());
    }
    Ok(())
}

/// Path of the file recording which spreadsheet replaced `configured`.
fn pointer_path(configured: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(configured.file_name().unwrap_or_default());
    name.push(".current");
    configured.with_file_name(name)
}

/// The backing spreadsheet on local disk.
///
/// Uploads are stored next to the configured file under the same stem with the upload's
/// extension, so `dataset.xlsx` may become `dataset.csv`. The name of the file in use is
/// recorded in a hidden `.<name>.current` sibling, so a restart with the same configured
/// path finds the most recent upload.
#[derive(Debug)]
pub struct FsDatasetSource {
    configured: PathBuf,
    current: RwLock<Option<PathBuf>>,
}

impl FsDatasetSource {
    /// Serve the spreadsheet at `path`, or the upload that last replaced it.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            configured: path.into(),
            current: RwLock::new(None),
        }
    }

    /// Path of the spreadsheet currently served.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Io`] when the pointer file exists but cannot be read.
    pub async fn path(&self) -> Result<PathBuf, CoreError> {
        if let Some(path) = self.current.read().await.as_ref() {
            return Ok(path.clone());
        }
        let mut current = self.current.write().await;
        if let Some(path) = current.as_ref() {
            return Ok(path.clone());
        }
        let path = self.recorded_path().await?;
        *current = Some(path.clone());
        Ok(path)
    }

    /// Follow the pointer file, falling back to the configured path.
    async fn recorded_path(&self) -> Result<PathBuf, CoreError> {
        let pointer = pointer_path(&self.configured);
        let recorded = match fs::read_to_string(&pointer).await {
            Ok(recorded) => recorded,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(self.configured.clone()),
            Err(err) => return Err(err.into()),
        };
        let name = recorded.trim();
        // Only a bare sibling file name is honoured.
        if name.is_empty() || Path::new(name).file_name() != Some(OsStr::new(name)) {
            warn!(pointer = %pointer.display(), "ignoring malformed dataset pointer");
            return Ok(self.configured.clone());
        }
        Ok(self.configured.with_file_name(name))
    }
}

#[async_trait]
impl DatasetSource for FsDatasetSource {
    async fn read(&self) -> Result<SheetFile, CoreError> {
        let path = self.path().await?;
        let bytes = fs::read(&path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(path = %path.display(), bytes = bytes.len(), "read dataset");
        Ok(SheetFile::new(file_name, bytes))
    }

    async fn replace(&self, sheet: SheetFile) -> Result<(), CoreError> {
        let extension = sheet.extension();
        if extension.is_empty() {
            return Err(CoreError::UnsupportedFormat(sheet.file_name));
        }

        let mut current = self.current.write().await;
        let previous = match current.as_ref() {
            Some(path) => path.clone(),
            None => self.recorded_path().await?,
        };
        let target = self.configured.with_extension(&extension);
        write_atomically(&target, &sheet.bytes).await?;

        let target_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        write_atomically(&pointer_path(&self.configured), target_name.as_bytes()).await?;

        if target != previous {
            // The previous file would otherwise linger under a different extension.
            match fs::remove_file(&previous).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        info!(path = %target.display(), upload = %sheet.file_name, "stored dataset");
        *current = Some(target);
        Ok(())
    }
}

/// Model artifact stored as JSON.
#[derive(Debug, Clone)]
pub struct JsonModelStore {
    path: PathBuf,
}

impl JsonModelStore {
    /// Persist the model at `path`.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Artifact location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ModelStore for JsonModelStore {
    async fn load(&self) -> Result<Option<TrainedModel>, CoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let model = serde_json::from_slice(&bytes).map_err(|err| {
            CoreError::Artifact(format!("decoding {}: {err}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), "loaded model artifact");
        Ok(Some(model))
    }

    async fn save(&self, model: &TrainedModel) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec_pretty(model)
            .map_err(|err| CoreError::Artifact(format!("encoding model: {err}")))?;
        write_atomically(&self.path, &bytes).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "saved model artifact");
        Ok(())
    }
}
