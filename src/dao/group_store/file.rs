//! JSON document backend storing the whole collection in a single file.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::{
    dao::{
        group_store::GroupBackend,
        models::PersistedDocument,
        storage::{StorageError, StorageResult},
    },
    state::groups::GroupCollection,
};

/// Convenient result alias returning [`FileDaoError`] failures.
pub type FileResult<T> = Result<T, FileDaoError>;

/// Failures that can occur while reading or writing the data file.
#[derive(Debug, Error)]
pub enum FileDaoError {
    /// The data file exists but could not be read.
    #[error("failed to read `{path}`")]
    Read {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The directory holding the data file could not be created.
    #[error("failed to create directory `{path}`")]
    CreateDir {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Serializing the document failed.
    #[error("failed to encode group document")]
    Encode {
        /// Underlying serialization failure.
        #[source]
        source: serde_json::Error,
    },
    /// Writing the temporary file failed.
    #[error("failed to write `{path}`")]
    Write {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Moving the temporary file over the data file failed.
    #[error("failed to replace `{path}`")]
    Replace {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl From<FileDaoError> for StorageError {
    fn from(err: FileDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Group backend persisting to a JSON file on the local disk.
#[derive(Clone, Debug)]
pub struct FileGroupStore {
    path: Arc<PathBuf>,
}

impl FileGroupStore {
    /// Create a backend writing to `path`. Nothing is touched until the first call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    /// Location of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GroupBackend for FileGroupStore {
    fn load_groups(&self) -> BoxFuture<'static, StorageResult<GroupCollection>> {
        let path = self.path.clone();
        Box::pin(async move { read_document(&path).await.map_err(StorageError::from) })
    }

    fn save_groups(&self, groups: GroupCollection) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            write_document(&path, groups)
                .await
                .map_err(StorageError::from)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move { ensure_parent(&path).await.map_err(StorageError::from) })
    }
}

async fn read_document(path: &Path) -> FileResult<GroupCollection> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "data file not found; starting empty");
            return Ok(GroupCollection::new());
        }
        Err(source) => {
            return Err(FileDaoError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let document = match serde_json::from_str::<PersistedDocument>(&contents) {
        Ok(document) => document,
        Err(err) => {
            // An unreadable document is discarded; the next save replaces it.
            warn!(path = %path.display(), error = %err, "invalid data file; clearing");
            return Ok(GroupCollection::new());
        }
    };

    let (groups, dropped) = GroupCollection::sanitize(document.groups);
    if dropped > 0 {
        warn!(path = %path.display(), dropped, "discarded invalid persisted entries");
    }
    Ok(groups)
}

async fn write_document(path: &Path, groups: GroupCollection) -> FileResult<()> {
    ensure_parent(path).await?;

    let document = PersistedDocument {
        groups: groups.into_inner(),
    };
    let bytes =
        serde_json::to_vec_pretty(&document).map_err(|source| FileDaoError::Encode { source })?;

    let tmp = temp_path(path);
    fs::write(&tmp, bytes)
        .await
        .map_err(|source| FileDaoError::Write {
            path: tmp.clone(),
            source,
        })?;
    fs::rename(&tmp, path)
        .await
        .map_err(|source| FileDaoError::Replace {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), "data file written");
    Ok(())
}

async fn ensure_parent(path: &Path) -> FileResult<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    fs::create_dir_all(parent)
        .await
        .map_err(|source| FileDaoError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
