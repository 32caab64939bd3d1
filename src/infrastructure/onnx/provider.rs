// SPDX-License-Identifier: MPL-2.0
//! ONNX Runtime adapter implementing the [`ModelProvider`] port trait.

use super::model::OnnxTierModel;
use crate::application::port::{AIError, Backend, ModelHandle, ModelProvider};
use crate::config::{Config, ModelsConfig, RuntimeConfig};
use crate::domain::processing::ModelId;
use crate::media::model_store::ModelStore;
use futures_util::future::{BoxFuture, FutureExt};
use ort::execution_providers::{ExecutionProvider, CUDA as CUDAExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loads configured ONNX models, downloading them on first use.
pub struct OnnxModelProvider {
    models: ModelsConfig,
    runtime: RuntimeConfig,
    store: Arc<ModelStore>,
    backend: Backend,
}

impl std::fmt::Debug for OnnxModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModelProvider")
            .field("models_dir", &self.store.dir())
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl OnnxModelProvider {
    /// Creates a provider. The execution backend is chosen once, here.
    #[must_use]
    pub fn new(models: ModelsConfig, runtime: RuntimeConfig, store: ModelStore) -> Self {
        let backend = select_backend(runtime.prefer_gpu);
        tracing::info!(%backend, models_dir = %store.dir().display(), "ONNX provider ready");
        Self {
            models,
            runtime,
            store: Arc::new(store),
            backend,
        }
    }

    /// Creates a provider from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config, models_dir: PathBuf) -> Self {
        Self::new(
            config.models.clone(),
            config.runtime.clone(),
            ModelStore::new(models_dir),
        )
    }

    /// Model file store.
    #[must_use]
    pub fn store(&self) -> &ModelStore {
        &self.store
    }
}

impl ModelProvider for OnnxModelProvider {
    fn load(&self, id: ModelId) -> BoxFuture<'static, Result<ModelHandle, AIError>> {
        let spec = self.models.spec(id).cloned();
        let store = Arc::clone(&self.store);
        let offline = self.runtime.offline;
        let backend = self.backend;

        async move {
            let Some(spec) = spec else {
                tracing::debug!(model = %id, "no model configured");
                return Err(AIError::ModelNotReady);
            };

            let path = store.ensure_model(&spec, offline).await?;

            let model = tokio::task::spawn_blocking(move || {
                let session = build_session(&path, backend)?;
                Ok::<_, AIError>(OnnxTierModel::new(spec, session))
            })
            .await
            .map_err(|e| AIError::ModelLoadFailed(e.to_string()))??;

            tracing::info!(model = %id, name = %model.spec().name, %backend, "model loaded");
            Ok(Arc::new(model) as ModelHandle)
        }
        .boxed()
    }

    fn backend(&self) -> Backend {
        self.backend
    }
}

fn select_backend(prefer_gpu: bool) -> Backend {
    if prefer_gpu && CUDAExecutionProvider::default().is_available().unwrap_or(false) {
        Backend::GpuAccelerated
    } else {
        Backend::CpuFallback
    }
}

fn load_failed(err: impl std::fmt::Display) -> AIError {
    AIError::ModelLoadFailed(err.to_string())
}

/// Commits a session with full graph optimization.
fn build_session(path: &Path, backend: Backend) -> Result<Session, AIError> {
    let mut builder = Session::builder()
        .map_err(load_failed)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(load_failed)?;

    if backend == Backend::GpuAccelerated {
        builder = builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(load_failed)?;
    }

    builder.commit_from_file(path).map_err(load_failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::processing::{NeuralTier, Tool};
    use tempfile::tempdir;

    fn offline_config() -> Config {
        let mut config = Config::default();
        config.runtime.prefer_gpu = false;
        config.runtime.offline = true;
        config
    }

    #[test]
    fn cpu_backend_when_gpu_not_preferred() {
        let dir = tempdir().unwrap();
        let provider = OnnxModelProvider::from_config(&offline_config(), dir.path().to_path_buf());
        assert_eq!(provider.backend(), Backend::CpuFallback);
    }

    #[tokio::test]
    async fn unconfigured_tier_is_not_ready() {
        let dir = tempdir().unwrap();
        let provider = OnnxModelProvider::from_config(&offline_config(), dir.path().to_path_buf());
        let id = ModelId::new(Tool::Enhance, NeuralTier::Secondary);

        let result = provider.load(id).await;
        assert!(matches!(result, Err(AIError::ModelNotReady)));
    }

    #[tokio::test]
    async fn missing_file_offline_fails_to_load() {
        let dir = tempdir().unwrap();
        let provider = OnnxModelProvider::from_config(&offline_config(), dir.path().to_path_buf());
        let id = ModelId::new(Tool::Segment, NeuralTier::Primary);

        let result = provider.load(id).await;
        assert!(matches!(result, Err(AIError::ModelLoadFailed(_))));
    }
}
