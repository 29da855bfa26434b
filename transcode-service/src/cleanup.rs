//! Cleanup (C11): best-effort, idempotent removal of a job's local scratch
//! once it reaches a terminal state. Never aborts on a missing path.

use std::path::Path;

use tokio::fs;

use crate::chunk_store::ChunkStore;
use crate::models::Resolution;

/// Deletes the chunk folder, the combined source, every rung MP4, and every
/// rung's HLS directory for `base_name`. Errors (including "not found") are
/// swallowed: cleanup must never fail a job that otherwise succeeded.
pub async fn cleanup_local(chunk_store: &ChunkStore, upload_dir: &Path, base_name: &str) {
    chunk_store.discard_set(base_name).await;
    fs::remove_file(chunk_store.source_path(base_name)).await.ok();

    for resolution in Resolution::ALL {
        let label = resolution.label();
        fs::remove_file(upload_dir.join(format!("{label}_{base_name}.mp4")))
            .await
            .ok();
        fs::remove_dir_all(upload_dir.join(format!("hls_{label}_{base_name}")))
            .await
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn tolerates_already_missing_paths() {
        let dir = std::env::temp_dir().join(format!("cleanup-test-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).await.unwrap();
        let chunk_store = ChunkStore::new(&dir);

        // nothing was ever written for this name; cleanup must not panic or error
        cleanup_local(&chunk_store, &dir, "missing").await;

        fs::remove_dir_all(&dir).await.ok();
    }
}
