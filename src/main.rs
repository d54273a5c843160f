//! Avatar Preparation Service
//!
//! HTTP service that provisions model checkpoints from S3, loads them
//! onto a device, and serves avatar creation over REST (Axum).

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use avatard::api::rest::{create_rest_router, AppState};
use avatard::config::{Config, ModelEntry};
use avatard::engine::{FrameEncoder, LandmarkExtractor, ModelDescriptor, ModelRuntime, ModelVariant};
use avatard::provision::{ArtifactLocation, ArtifactProvisioner};
use avatard::service::AvatarService;
use avatard::storage::S3Store;

/// Wire one model runtime: descriptor, remote location, provisioner.
fn build_runtime<V: ModelVariant>(
    config: &Config,
    client: &aws_sdk_s3::Client,
    entry: &ModelEntry,
    variant: V,
) -> Result<Arc<ModelRuntime<V>>> {
    let descriptor = ModelDescriptor::from_entry(entry, &config.models.device)?;
    let location = ArtifactLocation::for_model(
        &config.aws,
        &config.models.local_dir,
        &descriptor.name,
        &descriptor.version,
    );
    let store = Arc::new(S3Store::new(
        client.clone(),
        &location.bucket,
        &location.base_path,
    ));
    let provisioner = ArtifactProvisioner::new(store, location);
    Ok(Arc::new(ModelRuntime::new(descriptor, variant, provisioner)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting Avatar Preparation Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load(Config::default_path()).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });

    info!("Configuration loaded:");
    info!("  Port: {}", config.server.port);
    info!("  Base prefix: {}", config.server.base_prefix);
    info!("  Device: {}", config.models.device);
    info!("  Models bucket: {}", config.aws.models_bucket);
    info!("  Avatars bucket: {}", config.aws.avatars_bucket);

    // One SDK client shared across every store
    let client = S3Store::client_for_region(&config.aws.region).await;

    // Model runtimes
    let landmark = build_runtime(&config, &client, &config.models.landmark, LandmarkExtractor::new())?;
    let encoder = build_runtime(&config, &client, &config.models.encoder, FrameEncoder::new())?;

    // Avatar output store
    let avatars = Arc::new(S3Store::new(
        client.clone(),
        &config.aws.avatars_bucket,
        &config.aws.avatars_base_path,
    ));

    let service = Arc::new(AvatarService::new(
        avatars,
        landmark,
        encoder,
        config.models.work_dir.clone(),
    ));

    // Models must be provisioned and loaded before the service accepts
    // traffic. A failure here is fatal.
    info!("Provisioning models...");
    service.prepare().await?;
    info!("All models ready");

    let app_state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });
    let router = create_rest_router(app_state, &config.server.base_prefix);

    let addr = format!("0.0.0.0:{}", config.server.port);
    info!("REST API listening on http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    info!("Goodbye!");
    Ok(())
}
