// SPDX-License-Identifier: MPL-2.0
//! Local storage for learned model files.
//!
//! This module provides functionality for:
//! - Locating a model file from its [`ModelSpec`]
//! - Downloading it from the configured URL
//! - Verifying its integrity with a BLAKE3 checksum
//!
//! Downloads are written to a `.part` file and renamed once complete, so a
//! present model file is never a truncated download.

use crate::config::defaults::{DOWNLOAD_MAX_REDIRECTS, DOWNLOAD_USER_AGENT};
use crate::config::ModelSpec;
use std::path::{Path, PathBuf};

/// Result type for model store operations.
pub type ModelStoreResult<T> = Result<T, ModelStoreError>;

/// Errors that can occur while providing a model file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStoreError {
    /// Model file not found at expected path.
    ModelNotFound,
    /// Failed to download the model.
    DownloadFailed(String),
    /// Model checksum verification failed.
    ChecksumMismatch { expected: String, actual: String },
    /// IO error occurred.
    Io(String),
}

impl std::fmt::Display for ModelStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStoreError::ModelNotFound => write!(f, "Model file not found"),
            ModelStoreError::DownloadFailed(msg) => write!(f, "Download failed: {msg}"),
            ModelStoreError::ChecksumMismatch { expected, actual } => {
                write!(f, "Checksum mismatch: expected {expected}, got {actual}")
            }
            ModelStoreError::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ModelStoreError {}

impl From<std::io::Error> for ModelStoreError {
    fn from(err: std::io::Error) -> Self {
        ModelStoreError::Io(err.to_string())
    }
}

/// Directory of model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Creates a store rooted at `dir`. The directory is created on first download.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path where the model is/will be stored.
    #[must_use]
    pub fn model_path(&self, spec: &ModelSpec) -> PathBuf {
        self.dir.join(format!("{}.onnx", spec.name))
    }

    /// Checks if the model file exists and is not empty.
    #[must_use]
    pub fn is_model_present(&self, spec: &ModelSpec) -> bool {
        std::fs::metadata(self.model_path(spec)).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// Returns a verified local path for the model, downloading it if needed.
    ///
    /// With `offline` set, a missing file is reported as
    /// [`ModelStoreError::ModelNotFound`] instead of being downloaded. A file
    /// that fails verification is deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is missing offline, the download fails,
    /// or the checksum does not match.
    pub async fn ensure_model(&self, spec: &ModelSpec, offline: bool) -> ModelStoreResult<PathBuf> {
        let path = self.model_path(spec);

        if !self.is_model_present(spec) {
            if offline {
                return Err(ModelStoreError::ModelNotFound);
            }
            tracing::info!(model = %spec.name, url = %spec.url, "downloading model");
            let name = spec.name.clone();
            let mut last_decile = 0u8;
            let bytes = self
                .download_model(spec, move |progress| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let decile = (progress * 10.0).clamp(0.0, 10.0) as u8;
                    if decile > last_decile {
                        last_decile = decile;
                        tracing::debug!(model = %name, percent = u32::from(decile) * 10, "download progress");
                    }
                })
                .await?;
            tracing::info!(model = %spec.name, bytes, "model downloaded");
        }

        if let Some(expected) = spec.blake3.as_deref() {
            if let Err(err) = verify_checksum(&path, expected) {
                tracing::warn!(model = %spec.name, %err, "removing model that failed verification");
                let _ = std::fs::remove_file(&path);
                return Err(err);
            }
        }

        Ok(path)
    }

    /// Downloads the model from its URL.
    ///
    /// Returns the number of bytes downloaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server returns a non-success
    /// status or an empty body, or the file cannot be written.
    pub async fn download_model(
        &self,
        spec: &ModelSpec,
        mut progress_callback: impl FnMut(f32) + Send,
    ) -> ModelStoreResult<u64> {
        use futures_util::StreamExt;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(DOWNLOAD_MAX_REDIRECTS))
            .user_agent(DOWNLOAD_USER_AGENT)
            .build()
            .map_err(|e| ModelStoreError::DownloadFailed(e.to_string()))?;

        let response = client
            .get(&spec.url)
            .send()
            .await
            .map_err(|e| ModelStoreError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ModelStoreError::DownloadFailed(format!(
                "HTTP status: {}",
                response.status()
            )));
        }

        let total_size = response.content_length().unwrap_or(0);

        std::fs::create_dir_all(&self.dir)?;
        let final_path = self.model_path(spec);
        let part_path = final_path.with_extension("onnx.part");
        let mut file = std::fs::File::create(&part_path)?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = std::fs::remove_file(&part_path);
                    return Err(ModelStoreError::DownloadFailed(e.to_string()));
                }
            };
            std::io::Write::write_all(&mut file, &chunk)?;
            downloaded += chunk.len() as u64;

            if total_size > 0 {
                // f64 to f32 truncation is fine for progress display (0.0-1.0 range)
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
                let progress = (downloaded as f64 / total_size as f64) as f32;
                progress_callback(progress);
            }
        }
        drop(file);

        if downloaded == 0 {
            let _ = std::fs::remove_file(&part_path);
            return Err(ModelStoreError::DownloadFailed(
                "Server returned an empty body".to_string(),
            ));
        }

        std::fs::rename(&part_path, &final_path)?;
        Ok(downloaded)
    }

    /// Deletes the model file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be deleted.
    pub fn delete_model(&self, spec: &ModelSpec) -> ModelStoreResult<()> {
        let path = self.model_path(spec);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// Verifies a file against an expected BLAKE3 hash (case-insensitive hex).
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or the hash differs.
pub fn verify_checksum(path: &Path, expected_hash: &str) -> ModelStoreResult<()> {
    let actual_hash = compute_hash(path)?;
    if !actual_hash.eq_ignore_ascii_case(expected_hash.trim()) {
        return Err(ModelStoreError::ChecksumMismatch {
            expected: expected_hash.to_string(),
            actual: actual_hash,
        });
    }
    Ok(())
}

/// Computes the BLAKE3 hash of a file as lowercase hex.
///
/// # Errors
///
/// Returns an error if the file is not found or cannot be read.
pub fn compute_hash(path: &Path) -> ModelStoreResult<String> {
    if !path.exists() {
        return Err(ModelStoreError::ModelNotFound);
    }
    let file_data = std::fs::read(path)?;
    Ok(blake3::hash(&file_data).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn spec(name: &str) -> ModelSpec {
        let mut spec = ModelSpec::default_segment_primary();
        spec.name = name.to_string();
        spec.url = "http://127.0.0.1:9/unreachable.onnx".to_string();
        spec
    }

    #[test]
    fn model_path_uses_name_and_extension() {
        let store = ModelStore::new("/models");
        assert_eq!(store.model_path(&spec("u2netp")), PathBuf::from("/models/u2netp.onnx"));
    }

    #[test]
    fn empty_file_is_not_present() {
        let dir = tempdir().expect("temp dir");
        let store = ModelStore::new(dir.path());
        let spec = spec("empty");
        assert!(!store.is_model_present(&spec));

        std::fs::write(store.model_path(&spec), b"").unwrap();
        assert!(!store.is_model_present(&spec));

        std::fs::write(store.model_path(&spec), b"weights").unwrap();
        assert!(store.is_model_present(&spec));
    }

    #[test]
    fn checksum_matches_blake3_of_contents() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("m.onnx");
        std::fs::write(&path, b"weights").unwrap();

        let expected = blake3::hash(b"weights").to_hex().to_string();
        assert_eq!(compute_hash(&path).unwrap(), expected);
        assert!(verify_checksum(&path, &expected.to_uppercase()).is_ok());
        assert!(matches!(
            verify_checksum(&path, "00"),
            Err(ModelStoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn hash_of_missing_file_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let result = compute_hash(&dir.path().join("missing.onnx"));
        assert_eq!(result, Err(ModelStoreError::ModelNotFound));
    }

    #[tokio::test]
    async fn offline_missing_model_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let store = ModelStore::new(dir.path());
        let result = store.ensure_model(&spec("absent"), true).await;
        assert_eq!(result, Err(ModelStoreError::ModelNotFound));
    }

    #[tokio::test]
    async fn corrupt_model_is_removed() {
        let dir = tempdir().expect("temp dir");
        let store = ModelStore::new(dir.path());
        let mut spec = spec("corrupt");
        spec.blake3 = Some(blake3::hash(b"expected").to_hex().to_string());
        std::fs::write(store.model_path(&spec), b"tampered").unwrap();

        let result = store.ensure_model(&spec, true).await;
        assert!(matches!(result, Err(ModelStoreError::ChecksumMismatch { .. })));
        assert!(!store.model_path(&spec).exists());
    }

    #[tokio::test]
    async fn present_model_is_returned_without_download() {
        let dir = tempdir().expect("temp dir");
        let store = ModelStore::new(dir.path());
        let spec = spec("present");
        std::fs::write(store.model_path(&spec), b"weights").unwrap();

        let path = store.ensure_model(&spec, false).await.unwrap();
        assert_eq!(path, store.model_path(&spec));
    }

    #[test]
    fn store_error_display() {
        let err = ModelStoreError::DownloadFailed("timeout".into());
        assert_eq!(err.to_string(), "Download failed: timeout");
    }
}
