//! Artifact provisioning
//!
//! Turns a (model name, version selector) pair into a validated local
//! checkpoint file, and exposes batch download/upload over the store
//! client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::TryStreamExt;
use tracing::info;

use crate::config::AwsConfig;
use crate::engine::runtime::{ModelDescriptor, VersionSelector};
use crate::error::{Error, Result};
use crate::storage::ObjectStore;

/// Checkpoint file extensions the runtime accepts.
pub const MODEL_EXTENSIONS: [&str; 4] = ["pth", "pt", "bin", "safetensors"];

/// Where one (model, version) pair lives, remotely and locally. The local
/// directory is exclusive to the pair; two versions never share a cache
/// directory.
#[derive(Debug, Clone)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub base_path: String,
    pub region: String,
    pub local_dir: PathBuf,
}

impl ArtifactLocation {
    /// Layout used for model checkpoints:
    /// `<models base>/<model name lowercased>/<latest|v{tag}>`.
    pub fn for_model(
        aws: &AwsConfig,
        local_root: &Path,
        name: &str,
        version: &VersionSelector,
    ) -> Self {
        let model = name.to_lowercase();
        let version_prefix = version.key_prefix();
        Self {
            bucket: aws.models_bucket.clone(),
            base_path: format!("{}/{}/{}", aws.models_base_path, model, version_prefix),
            region: aws.region.clone(),
            local_dir: local_root.join(&model).join(&version_prefix),
        }
    }
}

/// A successfully downloaded checkpoint with a validated extension.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    pub local_path: PathBuf,
    pub extension: String,
}

/// Resolves version selectors against the object store and orchestrates
/// downloads into the location's local directory.
pub struct ArtifactProvisioner {
    store: Arc<dyn ObjectStore>,
    location: ArtifactLocation,
}

impl ArtifactProvisioner {
    pub fn new(store: Arc<dyn ObjectStore>, location: ArtifactLocation) -> Self {
        Self { store, location }
    }

    pub fn location(&self) -> &ArtifactLocation {
        &self.location
    }

    /// Resolve the descriptor's version selector to a concrete object key,
    /// download it, and validate the file extension.
    pub async fn resolve(&self, descriptor: &ModelDescriptor) -> Result<ArtifactHandle> {
        let key = match &descriptor.version {
            VersionSelector::Latest => self.store.latest("").await?,
            VersionSelector::Tag(tag) => {
                let keys: Vec<String> = self.store.list("").try_collect().await?;
                let version_prefix = format!("v{}", tag);
                // Literal string prefix and lexicographic maximum, so tag
                // "1" also matches v10 and v10 sorts above v1. Numeric
                // ordering is not used.
                keys.into_iter()
                    .filter(|k| k.starts_with(&version_prefix))
                    .max()
            }
        };

        let key = key.ok_or_else(|| {
            Error::Validation(format!(
                "no model file found for {} version {}",
                descriptor.name,
                descriptor.version.key_prefix()
            ))
        })?;

        let dest = self.location.local_dir.join(&key);
        let local_path = self.store.get(&key, &dest).await?;

        let extension = local_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        if !MODEL_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Error::Validation(format!(
                "downloaded file is not a valid model file: {}",
                local_path.display()
            )));
        }

        info!(
            model = %descriptor.name,
            key = %key,
            path = %local_path.display(),
            "resolved model artifact"
        );
        Ok(ArtifactHandle {
            local_path,
            extension,
        })
    }

    /// Download several objects sequentially. The first failure aborts the
    /// batch; files already downloaded stay on disk.
    pub async fn download_many(&self, keys: &[String]) -> Result<Vec<PathBuf>> {
        let mut local_paths = Vec::with_capacity(keys.len());
        for key in keys {
            let dest = self.location.local_dir.join(key);
            local_paths.push(self.store.get(key, &dest).await?);
        }
        Ok(local_paths)
    }

    /// Upload several local files sequentially, paired positionally with
    /// `remote_names` when given (defaulting to each file's name). The
    /// first failure aborts the batch.
    pub async fn upload_many(
        &self,
        local_paths: &[PathBuf],
        remote_names: Option<&[String]>,
    ) -> Result<Vec<String>> {
        let mut remote_keys = Vec::with_capacity(local_paths.len());
        for (i, local) in local_paths.iter().enumerate() {
            let name = match remote_names.and_then(|names| names.get(i)) {
                Some(name) => name.clone(),
                None => local
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| Error::NotFound(local.clone()))?,
            };
            remote_keys.push(self.store.put(local, &name).await?);
        }
        Ok(remote_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::num::NonZeroUsize;
    use tempfile::tempdir;

    fn descriptor(version: VersionSelector) -> ModelDescriptor {
        ModelDescriptor {
            name: "landmark".to_string(),
            device: "cpu".to_string(),
            concurrency_limit: NonZeroUsize::new(2).unwrap(),
            version,
        }
    }

    fn provisioner(store: Arc<MemoryStore>, local_dir: PathBuf) -> ArtifactProvisioner {
        let location = ArtifactLocation {
            bucket: "bucket".to_string(),
            base_path: "models/landmark".to_string(),
            region: "us-east-1".to_string(),
            local_dir,
        };
        ArtifactProvisioner::new(store, location)
    }

    #[tokio::test]
    async fn test_resolve_explicit_tag_is_lexicographic() {
        let store = Arc::new(MemoryStore::new("bucket", "models/landmark", 10));
        store.insert("v1/model.pt", b"one".to_vec());
        store.insert("v2/model.bin", b"two".to_vec());
        store.insert("v10/model.pt", b"ten".to_vec());

        let dir = tempdir().unwrap();
        let provisioner = provisioner(store, dir.path().to_path_buf());

        let handle = provisioner
            .resolve(&descriptor(VersionSelector::Tag("2".to_string())))
            .await
            .unwrap();
        assert!(handle.local_path.ends_with("v2/model.bin"));
        assert_eq!(handle.extension, "bin");
    }

    #[tokio::test]
    async fn test_resolve_latest_uses_last_modified() {
        let store = Arc::new(MemoryStore::new("bucket", "models/landmark", 10));
        store.insert_at("model_a.pt", b"a".to_vec(), 1);
        store.insert_at("model_b.pt", b"b".to_vec(), 9);
        store.insert_at("model_c.pt", b"c".to_vec(), 4);

        let dir = tempdir().unwrap();
        let provisioner = provisioner(store, dir.path().to_path_buf());

        let handle = provisioner
            .resolve(&descriptor(VersionSelector::Latest))
            .await
            .unwrap();
        assert!(handle.local_path.ends_with("model_b.pt"));
    }

    #[tokio::test]
    async fn test_resolve_no_match_is_validation_error() {
        let store = Arc::new(MemoryStore::new("bucket", "models/landmark", 10));
        store.insert("v1/model.pt", b"one".to_vec());

        let dir = tempdir().unwrap();
        let provisioner = provisioner(store, dir.path().to_path_buf());

        let err = provisioner
            .resolve(&descriptor(VersionSelector::Tag("7".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_resolve_rejects_unknown_extension() {
        let store = Arc::new(MemoryStore::new("bucket", "models/landmark", 10));
        store.insert("readme.txt", b"not a checkpoint".to_vec());

        let dir = tempdir().unwrap();
        let provisioner = provisioner(store, dir.path().to_path_buf());

        let err = provisioner
            .resolve(&descriptor(VersionSelector::Latest))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_download_many_aborts_on_first_failure() {
        let store = Arc::new(MemoryStore::new("bucket", "models/landmark", 10));
        store.insert("a.pt", b"a".to_vec());
        store.insert("c.pt", b"c".to_vec());

        let dir = tempdir().unwrap();
        let provisioner = provisioner(store, dir.path().to_path_buf());

        let keys = vec![
            "a.pt".to_string(),
            "missing.pt".to_string(),
            "c.pt".to_string(),
        ];
        let err = provisioner.download_many(&keys).await.unwrap_err();
        assert!(matches!(err, Error::Download { .. }));

        // The file downloaded before the failure stays on disk; the one
        // after the failure was never attempted.
        assert!(dir.path().join("a.pt").exists());
        assert!(!dir.path().join("c.pt").exists());
    }

    #[tokio::test]
    async fn test_upload_many_pairs_names_positionally() {
        let store = Arc::new(MemoryStore::new("bucket", "models/landmark", 10));
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.pt");
        let b = dir.path().join("b.pt");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let provisioner = provisioner(store, dir.path().to_path_buf());
        let names = vec!["renamed_a.pt".to_string()];
        let keys = provisioner
            .upload_many(&[a, b], Some(&names))
            .await
            .unwrap();
        assert_eq!(
            keys,
            vec!["models/landmark/renamed_a.pt", "models/landmark/b.pt"]
        );
    }
}
