use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, warn};

use crate::vault::{Error, Result};

/// Reads a JSON index file into a collection.
///
/// A missing or unparsable file yields an empty collection rather than an
/// error; the index is a cache that every scan rebuilds anyway.
pub(crate) async fn read_index<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to parse index file '{}': {}", path.display(), e);
                Vec::new()
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read index file '{}': {}", path.display(), e);
            }
            Vec::new()
        }
    }
}

/// Serializes the full collection to a JSON index file.
///
/// The parent directory is created if needed, and the content is written to a
/// temporary sibling first and then renamed over the target, so a reader can
/// never observe a torn write.
pub(crate) async fn write_index<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(Error::Io)?;
    }
    let content = serde_json::to_string_pretty(items).map_err(Error::Metadata)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).await.map_err(Error::Io)?;
    fs::rename(&tmp, path).await.map_err(Error::Io)?;
    debug!("Index written to {}", path.display());
    Ok(())
}
