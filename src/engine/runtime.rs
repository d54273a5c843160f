//! Model runtime
//!
//! Owns one model's on-device instance and gates concurrent use of it.
//! Construction is two-phase: `new` builds the descriptor synchronously,
//! and callers await `provision_and_load` before the first `infer` call.
//! A runtime that has not reached Ready rejects inference with NotLoaded
//! instead of blocking.

use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info};

use super::gate::ConcurrencyGate;
use super::variant::ModelVariant;
use crate::config::ModelEntry;
use crate::error::{Error, Result};
use crate::provision::{ArtifactHandle, ArtifactProvisioner};

/// Model version to serve: the most recently modified artifact, or an
/// explicit tag stored under a `v<tag>` key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Tag(String),
}

impl VersionSelector {
    pub fn parse(s: &str) -> Self {
        if s == "latest" {
            VersionSelector::Latest
        } else {
            VersionSelector::Tag(s.to_string())
        }
    }

    /// Rendering used in object keys and cache directories.
    pub fn key_prefix(&self) -> String {
        match self {
            VersionSelector::Latest => "latest".to_string(),
            VersionSelector::Tag(tag) => format!("v{}", tag),
        }
    }
}

/// Immutable identity and configuration of one model instance.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub name: String,
    pub device: String,
    pub concurrency_limit: NonZeroUsize,
    pub version: VersionSelector,
}

impl ModelDescriptor {
    pub fn from_entry(entry: &ModelEntry, device: &str) -> Result<Self> {
        let concurrency_limit = NonZeroUsize::new(entry.concurrency).ok_or_else(|| {
            Error::Validation(format!(
                "concurrency limit for model {} must be positive",
                entry.name
            ))
        })?;
        Ok(Self {
            name: entry.name.clone(),
            device: device.to_string(),
            concurrency_limit,
            version: VersionSelector::parse(&entry.version),
        })
    }
}

/// Device handle plus its concurrency gate. Installed whole on a
/// successful load and replaced whole on reload.
struct ActiveModel<H> {
    handle: Arc<H>,
    gate: ConcurrencyGate,
}

enum State<H> {
    Uninitialized,
    Provisioning,
    Loaded(ArtifactHandle),
    Ready(Arc<ActiveModel<H>>),
    Failed(String),
}

impl<H> State<H> {
    fn label(&self) -> &'static str {
        match self {
            State::Uninitialized => "uninitialized",
            State::Provisioning => "provisioning",
            State::Loaded(_) => "loaded",
            State::Ready(_) => "ready",
            State::Failed(_) => "failed",
        }
    }
}

/// Point-in-time view of a runtime for the health surface.
#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub state: &'static str,
    pub in_flight: usize,
    pub limit: usize,
}

pub struct ModelRuntime<V: ModelVariant> {
    descriptor: ModelDescriptor,
    variant: Arc<V>,
    provisioner: ArtifactProvisioner,
    state: RwLock<State<V::Handle>>,
}

impl<V: ModelVariant> ModelRuntime<V> {
    pub fn new(descriptor: ModelDescriptor, variant: V, provisioner: ArtifactProvisioner) -> Self {
        Self {
            descriptor,
            variant: Arc::new(variant),
            provisioner,
            state: RwLock::new(State::Uninitialized),
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.state.read(), State::Ready(_))
    }

    pub fn status(&self) -> RuntimeStatus {
        let limit = self.descriptor.concurrency_limit.get();
        let state = self.state.read();
        match &*state {
            State::Ready(active) => RuntimeStatus {
                state: "ready",
                in_flight: active.gate.in_flight(),
                limit,
            },
            other => RuntimeStatus {
                state: other.label(),
                in_flight: 0,
                limit,
            },
        }
    }

    /// Resolve and download the model artifact, then load it. The one
    /// operation callers should await before first use.
    pub async fn provision_and_load(&self) -> Result<()> {
        *self.state.write() = State::Provisioning;

        let artifact = match self.provisioner.resolve(&self.descriptor).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(
                    model = %self.descriptor.name,
                    version = %self.descriptor.version.key_prefix(),
                    "failed to provision model artifact: {}", e
                );
                self.fail(&e);
                return Err(e);
            }
        };
        *self.state.write() = State::Loaded(artifact);

        self.load().await
    }

    /// Load the provisioned checkpoint onto the device. Requires a
    /// resolved artifact; on success installs a fresh gate with exactly
    /// `concurrency_limit` permits and transitions to Ready. Any failure
    /// leaves the runtime Failed, which is terminal for this instance.
    pub async fn load(&self) -> Result<()> {
        let artifact = match &*self.state.read() {
            State::Loaded(artifact) => artifact.clone(),
            _ => {
                let e = Error::Runtime("no provisioned artifact to load".to_string());
                self.fail(&e);
                return Err(e);
            }
        };

        let variant = self.variant.clone();
        let device = self.descriptor.device.clone();
        let checkpoint = artifact.local_path.clone();
        let loaded = tokio::task::spawn_blocking(move || variant.load_on_device(&device, &checkpoint))
            .await;

        let handle = match loaded {
            Ok(Ok(Some(handle))) => handle,
            Ok(Ok(None)) => {
                let e = Error::Runtime("model could not be loaded".to_string());
                self.fail(&e);
                return Err(e);
            }
            Ok(Err(e)) => {
                let e = Error::Runtime(e.to_string());
                self.fail(&e);
                return Err(e);
            }
            Err(e) => {
                let e = Error::Runtime(format!("load task failed: {}", e));
                self.fail(&e);
                return Err(e);
            }
        };

        let limit = self.descriptor.concurrency_limit.get();
        *self.state.write() = State::Ready(Arc::new(ActiveModel {
            handle: Arc::new(handle),
            gate: ConcurrencyGate::new(limit),
        }));

        info!(
            model = %self.descriptor.name,
            device = %self.descriptor.device,
            checkpoint = %artifact.local_path.display(),
            concurrency = limit,
            "model loaded"
        );
        Ok(())
    }

    /// Run one inference call. Acquires a gate permit (suspending the
    /// caller until one frees), dispatches the variant's computation on
    /// the blocking pool, and releases the permit whether or not the
    /// computation succeeds.
    pub async fn infer(&self, request: V::Request) -> Result<V::Response> {
        let active = match &*self.state.read() {
            State::Ready(active) => active.clone(),
            _ => return Err(Error::NotLoaded),
        };

        let _permit = active.gate.acquire().await?;

        let variant = self.variant.clone();
        let handle = active.handle.clone();
        let result = tokio::task::spawn_blocking(move || variant.forward(&handle, request)).await;

        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                error!(model = %self.descriptor.name, "error during inference: {}", e);
                Err(Error::Inference(e.to_string()))
            }
            Err(e) => {
                error!(model = %self.descriptor.name, "inference task failed: {}", e);
                Err(Error::Inference(e.to_string()))
            }
        }
    }

    fn fail(&self, reason: &Error) {
        *self.state.write() = State::Failed(reason.to_string());
    }
}
