//! Chunk Store: buffers partial uploads on local disk and reassembles them
//! into a single source file.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: upload_dir.into(),
        }
    }

    /// Strips path separators, collapses whitespace to `_`, lowercases.
    pub fn sanitize_name(original_name: &str) -> String {
        let base = original_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(original_name);
        let collapsed: String = base
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        collapsed.to_lowercase()
    }

    fn chunk_dir(&self, sanitized_name: &str) -> PathBuf {
        self.root.join("chunks").join(sanitized_name)
    }

    pub fn source_path(&self, sanitized_name: &str) -> PathBuf {
        self.root.join(format!("{sanitized_name}.mp4"))
    }

    /// Writes `{start}` atomically (temp file + rename) under the chunk folder,
    /// creating the folder lazily.
    pub async fn save_chunk(
        &self,
        original_name: &str,
        start_byte: u64,
        data: &[u8],
    ) -> Result<PathBuf> {
        let sanitized = Self::sanitize_name(original_name);
        let dir = self.chunk_dir(&sanitized);
        fs::create_dir_all(&dir).await?;

        let final_path = dir.join(start_byte.to_string());
        let tmp_path = dir.join(format!("{start_byte}.tmp"));

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, &final_path).await?;

        Ok(final_path)
    }

    pub async fn has_chunk(&self, original_name: &str, start_byte: u64) -> bool {
        let sanitized = Self::sanitize_name(original_name);
        self.chunk_dir(&sanitized)
            .join(start_byte.to_string())
            .exists()
    }

    /// Lists chunk files, sorts numerically by `start`, streams them
    /// sequentially into the output path, deletes each chunk after successful
    /// copy, then deletes the empty folder.
    pub async fn combine(&self, original_name: &str) -> Result<PathBuf> {
        let sanitized = Self::sanitize_name(original_name);
        let dir = self.chunk_dir(&sanitized);

        let mut offsets = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| AppError::ChunkMissing(format!("no chunk folder for {sanitized}: {e}")))?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".tmp") {
                continue;
            }
            if let Ok(offset) = name.parse::<u64>() {
                offsets.push(offset);
            }
        }
        offsets.sort_unstable();

        if offsets.first() != Some(&0) {
            return Err(AppError::ChunkMissing(format!(
                "first offset must be 0 for {sanitized}"
            )));
        }

        let combined_path = self.source_path(&sanitized);
        let mut out = fs::File::create(&combined_path).await?;

        for offset in &offsets {
            let chunk_path = dir.join(offset.to_string());
            let bytes = fs::read(&chunk_path).await.map_err(|e| {
                AppError::ChunkMissing(format!("missing offset {offset} for {sanitized}: {e}"))
            })?;
            out.write_all(&bytes).await?;
            fs::remove_file(&chunk_path).await.ok();
        }
        out.sync_all().await?;

        fs::remove_dir(&dir).await.ok();

        Ok(combined_path)
    }

    /// Best-effort recursive delete of the chunk folder.
    pub async fn discard_set(&self, original_name: &str) {
        let sanitized = Self::sanitize_name(original_name);
        let dir = self.chunk_dir(&sanitized);
        fs::remove_dir_all(&dir).await.ok();
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_path_and_whitespace() {
        assert_eq!(
            ChunkStore::sanitize_name("My Movie File.MP4"),
            "my_movie_file.mp4"
        );
        assert_eq!(
            ChunkStore::sanitize_name("../../etc/Weird Name.mp4"),
            "weird_name.mp4"
        );
    }

    #[tokio::test]
    async fn saves_and_combines_in_order() {
        let dir = tempdir();
        let store = ChunkStore::new(&dir);

        store.save_chunk("movie.mp4", 0, b"hello ").await.unwrap();
        store.save_chunk("movie.mp4", 6, b"world").await.unwrap();

        let combined = store.combine("movie.mp4").await.unwrap();
        let contents = fs::read(&combined).await.unwrap();
        assert_eq!(contents, b"hello world");

        // chunk folder is gone
        assert!(!store.chunk_dir("movie.mp4").exists());
    }

    #[tokio::test]
    async fn combine_fails_when_first_offset_missing() {
        let dir = tempdir();
        let store = ChunkStore::new(&dir);

        store.save_chunk("movie.mp4", 5, b"abcde").await.unwrap();

        let err = store.combine("movie.mp4").await.unwrap_err();
        assert!(matches!(err, AppError::ChunkMissing(_)));
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chunk-store-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
