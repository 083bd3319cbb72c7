//! Reading and writing the snapshot, plus frontend export mirrors.
//!
//! Loading never fails: a missing object is a cold start and a corrupt one is
//! logged and replaced. Writing reports failure to the caller instead of
//! retrying.

use crate::models::{ArticleCollection, PersistReport};
use crate::store::{ObjectStore, StoreError};
use crate::utils::truncate_for_log;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// Load the previous snapshot, or an empty collection.
#[instrument(level = "info", skip(store))]
pub async fn load_collection<S: ObjectStore>(store: &S, key: &str) -> ArticleCollection {
    match store.get(key).await {
        Ok(bytes) => match serde_json::from_slice::<ArticleCollection>(&bytes) {
            Ok(collection) => {
                info!(count = collection.len(), "Loaded existing articles");
                collection
            }
            Err(e) => {
                let preview = String::from_utf8_lossy(&bytes);
                warn!(
                    error = %e,
                    preview = %truncate_for_log(&preview, 200),
                    "Stored snapshot is not valid JSON; starting empty"
                );
                ArticleCollection::empty()
            }
        },
        Err(StoreError::NotFound(_)) => {
            info!("No existing snapshot; starting empty");
            ArticleCollection::empty()
        }
        Err(e) => {
            warn!(error = %e, "Could not read snapshot; starting empty");
            ArticleCollection::empty()
        }
    }
}

/// Serialize and write the snapshot. The whole object is replaced.
#[instrument(level = "info", skip(store, collection), fields(count = collection.len()))]
pub async fn save_collection<S: ObjectStore>(
    store: &S,
    key: &str,
    collection: &ArticleCollection,
) -> Result<(), StoreError> {
    let body = serde_json::to_vec_pretty(collection).map_err(std::io::Error::from)?;
    store.put(key, body).await?;
    info!(location = %store.locate(key), "Saved snapshot");
    Ok(())
}

/// Write the snapshot to every mirror path (e.g. the frontend's public dir).
///
/// Returns one message per failed path.
#[instrument(level = "info", skip(collection))]
pub async fn write_exports(collection: &ArticleCollection, paths: &[PathBuf]) -> Vec<String> {
    if paths.is_empty() {
        return Vec::new();
    }
    let body = match serde_json::to_vec_pretty(collection) {
        Ok(body) => body,
        Err(e) => return vec![format!("serialize: {e}")],
    };

    let mut failures = Vec::new();
    for path in paths {
        if let Err(e) = write_file(path, &body).await {
            error!(path = %path.display(), error = %e, "Failed to write export");
            failures.push(format!("{}: {}", path.display(), e));
        } else {
            info!(path = %path.display(), "Wrote export");
        }
    }
    failures
}

async fn write_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, body).await
}

/// Save to the primary store, then mirror. Failures land in the report.
pub async fn persist<S: ObjectStore>(
    store: &S,
    key: &str,
    collection: &ArticleCollection,
    exports: &[PathBuf],
) -> PersistReport {
    let mut report = PersistReport {
        key: key.to_string(),
        ..Default::default()
    };

    match save_collection(store, key, collection).await {
        Ok(()) => report.uploaded = true,
        Err(e) => {
            error!(error = %e, location = %store.locate(key), "Failed to save snapshot");
            report.error = Some(e.to_string());
        }
    }

    report.export_errors = write_exports(collection, exports).await;
    report
}
