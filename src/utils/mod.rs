//! Utility functions for the extraction pipeline.
//!
//! Cropping helpers, dictionary loading, the letterbox transform, and
//! logging setup.

pub mod crop;
pub mod dict;
pub mod transform;

pub use crop::crop_oriented;
pub use dict::Dictionary;
pub use transform::{crop_to_tensor, letterbox_to_tensor, LetterboxTransform};

/// Installs a global tracing subscriber for applications embedding the
/// pipeline.
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
