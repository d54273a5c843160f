//! Avatar service - core business logic
//!
//! Orchestrates model preparation, gated inference, and avatar media
//! publication to object storage.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;
use uuid::Uuid;

use crate::engine::{FrameEncoder, LandmarkExtractor, ModelRuntime};
use crate::error::{Error, Result};
use crate::storage::ObjectStore;

use super::types::*;

/// Avatar creation service
pub struct AvatarService<S: ObjectStore> {
    avatars: Arc<S>,
    landmark: Arc<ModelRuntime<LandmarkExtractor>>,
    encoder: Arc<ModelRuntime<FrameEncoder>>,
    work_dir: PathBuf,
}

impl<S: ObjectStore> AvatarService<S> {
    pub fn new(
        avatars: Arc<S>,
        landmark: Arc<ModelRuntime<LandmarkExtractor>>,
        encoder: Arc<ModelRuntime<FrameEncoder>>,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            avatars,
            landmark,
            encoder,
            work_dir,
        }
    }

    /// Provision and load every model. Must complete before the service
    /// accepts its first inference-bearing request.
    pub async fn prepare(&self) -> Result<()> {
        self.landmark.provision_and_load().await?;
        self.encoder.provision_and_load().await?;
        info!("all models prepared");
        Ok(())
    }

    /// Create an avatar from uploaded media: run the gated landmark pass
    /// over the frame, persist the upload locally, and publish it to the
    /// avatars namespace.
    pub async fn create_avatar(&self, file_name: &str, data: Vec<u8>) -> Result<CreateResult> {
        let start = Instant::now();
        let avatar_id = Uuid::new_v4().to_string();

        let regions = self.landmark.infer(vec![data.clone()]).await?;
        let region = regions.into_iter().next().unwrap_or_default();

        let local_path = self.work_dir.join(&avatar_id).join(file_name);
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Runtime(format!("failed to create work directory: {}", e)))?;
        }
        tokio::fs::write(&local_path, &data)
            .await
            .map_err(|e| Error::Runtime(format!("failed to persist upload: {}", e)))?;

        let key = format!("{}/{}", avatar_id, file_name);
        let artifact = self.avatars.put(&local_path, &key).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            avatar = %avatar_id,
            artifact = %artifact,
            elapsed_ms = duration_ms,
            "avatar created"
        );

        Ok(CreateResult {
            avatar_id,
            artifact,
            region,
            duration_ms,
        })
    }

    /// Health snapshot across all model runtimes.
    pub fn health(&self) -> HealthResult {
        let mut models = HashMap::new();
        for (name, status) in [
            (
                self.landmark.descriptor().name.clone(),
                self.landmark.status(),
            ),
            (
                self.encoder.descriptor().name.clone(),
                self.encoder.status(),
            ),
        ] {
            models.insert(
                name,
                ModelStatus {
                    state: status.state.to_string(),
                    in_flight: status.in_flight,
                    limit: status.limit,
                },
            );
        }

        HealthResult {
            healthy: self.landmark.is_ready() && self.encoder.is_ready(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::encoder::ENCODER_INPUT_DIM;
    use crate::engine::runtime::{ModelDescriptor, VersionSelector};
    use crate::provision::{ArtifactLocation, ArtifactProvisioner};
    use crate::storage::MemoryStore;
    use std::io::Cursor;
    use std::num::NonZeroUsize;
    use tempfile::tempdir;

    fn landmark_checkpoint() -> Vec<u8> {
        [(0.2f32, 0.2f32), (0.8, 0.8), (0.5, 0.5)]
            .iter()
            .flat_map(|(x, y)| [x.to_le_bytes(), y.to_le_bytes()])
            .flatten()
            .collect()
    }

    fn encoder_checkpoint() -> Vec<u8> {
        std::iter::repeat(0.0f32)
            .take(ENCODER_INPUT_DIM)
            .flat_map(|f| f.to_le_bytes())
            .collect()
    }

    fn png_frame() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(32, 32, image::Rgb([10, 20, 30]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn runtime<V: crate::engine::ModelVariant>(
        name: &str,
        variant: V,
        checkpoint: Vec<u8>,
        local_dir: &std::path::Path,
    ) -> Arc<ModelRuntime<V>> {
        let base = format!("models/{}/latest", name);
        let store = Arc::new(MemoryStore::new("models", &base, 10));
        store.insert("model.pt", checkpoint);

        let descriptor = ModelDescriptor {
            name: name.to_string(),
            device: "cpu".to_string(),
            concurrency_limit: NonZeroUsize::new(2).unwrap(),
            version: VersionSelector::Latest,
        };
        let location = ArtifactLocation {
            bucket: "models".to_string(),
            base_path: base,
            region: "us-east-1".to_string(),
            local_dir: local_dir.join(name),
        };
        Arc::new(ModelRuntime::new(
            descriptor,
            variant,
            ArtifactProvisioner::new(store, location),
        ))
    }

    fn service(dir: &std::path::Path) -> (AvatarService<MemoryStore>, Arc<MemoryStore>) {
        let avatars = Arc::new(MemoryStore::new("avatars", "avatars", 10));
        let landmark = runtime("landmark", LandmarkExtractor::new(), landmark_checkpoint(), dir);
        let encoder = runtime("encoder", FrameEncoder::new(), encoder_checkpoint(), dir);
        let service = AvatarService::new(
            avatars.clone(),
            landmark,
            encoder,
            dir.join("work"),
        );
        (service, avatars)
    }

    #[tokio::test]
    async fn test_create_before_prepare_is_not_loaded() {
        let dir = tempdir().unwrap();
        let (service, _) = service(dir.path());

        let err = service
            .create_avatar("face.png", png_frame())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotLoaded));
    }

    #[tokio::test]
    async fn test_create_avatar_publishes_media() {
        let dir = tempdir().unwrap();
        let (service, avatars) = service(dir.path());
        service.prepare().await.unwrap();

        let result = service
            .create_avatar("face.png", png_frame())
            .await
            .unwrap();
        assert_eq!(
            result.artifact,
            format!("avatars/{}/face.png", result.avatar_id)
        );
        assert!(result.region.x2 > result.region.x1);

        // Media must be retrievable from the avatars namespace.
        let key = format!("{}/face.png", result.avatar_id);
        let dest = dir.path().join("roundtrip.png");
        avatars.get(&key, &dest).await.unwrap();
        assert_eq!(std::fs::read(dest).unwrap(), png_frame());
    }

    #[tokio::test]
    async fn test_health_reflects_runtime_states() {
        let dir = tempdir().unwrap();
        let (service, _) = service(dir.path());

        let health = service.health();
        assert!(!health.healthy);
        assert_eq!(health.models["landmark"].state, "uninitialized");

        service.prepare().await.unwrap();
        let health = service.health();
        assert!(health.healthy);
        assert_eq!(health.models["landmark"].state, "ready");
        assert_eq!(health.models["encoder"].in_flight, 0);
        assert_eq!(health.models["encoder"].limit, 2);
    }
}
