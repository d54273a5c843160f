//! Avatar service configuration

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub aws: AwsConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub base_prefix: String,
}

/// Object-storage settings: two independent namespaces, one for avatar
/// media and one for model artifacts.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub avatars_bucket: String,
    pub avatars_base_path: String,
    pub models_bucket: String,
    pub models_base_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub device: String,
    pub local_dir: PathBuf,
    pub work_dir: PathBuf,
    pub landmark: ModelEntry,
    pub encoder: ModelEntry,
}

/// Per-model descriptor settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// "latest" or an explicit version tag.
    pub version: String,
    pub concurrency: usize,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8000,
                base_prefix: "/api/v1".to_string(),
            },
            aws: AwsConfig {
                region: "us-east-1".to_string(),
                avatars_bucket: "avatars".to_string(),
                avatars_base_path: "avatars".to_string(),
                models_bucket: "models".to_string(),
                models_base_path: "models".to_string(),
            },
            models: ModelsConfig {
                device: "cuda:0".to_string(),
                local_dir: PathBuf::from("data/models"),
                work_dir: PathBuf::from("data/avatars"),
                landmark: ModelEntry {
                    name: "landmark".to_string(),
                    version: "latest".to_string(),
                    concurrency: 2,
                },
                encoder: ModelEntry {
                    name: "encoder".to_string(),
                    version: "latest".to_string(),
                    concurrency: 2,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            [server]
            port = 9000
            base_prefix = "/api/v1"

            [aws]
            region = "eu-west-1"
            avatars_bucket = "media"
            avatars_base_path = "avatars"
            models_bucket = "checkpoints"
            models_base_path = "models"

            [models]
            device = "cpu"
            local_dir = "/tmp/models"
            work_dir = "/tmp/avatars"

            [models.landmark]
            name = "landmark"
            version = "3"
            concurrency = 4

            [models.encoder]
            name = "encoder"
            version = "latest"
            concurrency = 2
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.models.landmark.version, "3");
        assert_eq!(config.models.encoder.concurrency, 2);
    }
}
