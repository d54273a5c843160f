//! Model capability interface
//!
//! The seam between the runtime and concrete model implementations. Both
//! operations are blocking; the runtime dispatches them on tokio's
//! blocking pool so the request-handling loop never stalls on device work.

use std::path::Path;

/// A concrete model implementation: how to load its checkpoint onto a
/// device and how to run one forward pass.
pub trait ModelVariant: Send + Sync + 'static {
    /// Device-resident model handle. Owned by the runtime once loaded.
    type Handle: Send + Sync + 'static;
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Load the checkpoint at `checkpoint` onto `device`. Returning
    /// `Ok(None)` means the device produced no usable handle; the runtime
    /// turns that into a load fault.
    fn load_on_device(&self, device: &str, checkpoint: &Path)
        -> anyhow::Result<Option<Self::Handle>>;

    /// Run one forward pass against a loaded handle.
    fn forward(&self, handle: &Self::Handle, request: Self::Request)
        -> anyhow::Result<Self::Response>;
}
