//! Error types emitted by backend selection, resolution, and execution.
//!
//! Every variant here signals a configuration mismatch that is discoverable
//! before serving traffic. None of them are transient; callers should treat
//! them as fatal at initialization rather than retrying mid-batch.

use thiserror::Error;

use crate::core::AttentionType;
use crate::selector::BackendName;

/// Failure category shared by the selector, registry, and implementations.
#[derive(Debug, Error)]
pub enum AttentionError {
    /// An explicit backend override did not match any enumerated name.
    #[error("invalid attention backend '{name}'; available backends: {available} (case-sensitive)")]
    InvalidBackendName { name: String, available: String },

    /// The selected backend has no registered implementation.
    #[error("attention backend {0} has no registered implementation")]
    UnsupportedBackend(BackendName),

    /// A construction parameter requests a feature this backend cannot run.
    #[error("{backend} does not support {feature}")]
    UnsupportedFeature {
        backend: &'static str,
        feature: &'static str,
    },

    /// The head size is outside the backend's supported set.
    #[error("head size {head_size} is not supported by {backend}; supported head sizes: {supported:?}")]
    UnsupportedHeadSize {
        backend: &'static str,
        head_size: usize,
        supported: &'static [usize],
    },

    /// A forward call requested a mode other than encoder self-attention.
    #[error("{backend} only implements bidirectional encoder self-attention, got {requested:?}")]
    UnsupportedMode {
        backend: &'static str,
        requested: AttentionType,
    },

    /// A forward call supplied reduced-precision cache scales.
    #[error("{backend} does not support kv cache scaling (k_scale={k_scale}, v_scale={v_scale})")]
    UnsupportedQuantization {
        backend: &'static str,
        k_scale: f32,
        v_scale: f32,
    },

    /// The kernel does not operate on the supplied data type.
    #[error("unsupported dtype {requested}")]
    UnsupportedDtype { requested: String },

    /// The supplied tensors or parameters do not align with the documented
    /// packed layout.
    #[error("invalid shape: {context}")]
    InvalidShape { context: String },

    /// A tensor-level failure propagated from the compute substrate.
    #[error(transparent)]
    Kernel(#[from] candle_core::Error),
}

impl AttentionError {
    pub(crate) fn invalid_shape(context: impl Into<String>) -> Self {
        AttentionError::InvalidShape {
            context: context.into(),
        }
    }
}
