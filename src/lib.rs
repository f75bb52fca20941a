//! Attention backend selection and variable-length batched execution for an
//! encode-only serving pipeline.
//!
//! A batch of token sequences of differing lengths is packed into one
//! contiguous `[tokens, heads * head_size]` buffer with no padding; this
//! crate picks, at engine start, the fastest attention backend the running
//! hardware, precision, and configuration can support, and builds the
//! per-batch metadata (start offsets, max length) the chosen kernel needs
//! to locate sequence boundaries.
//!
//! The flow mirrors engine initialization: an [`EngineAttentionConfig`] and
//! a [`HardwareCapability`] go into [`select_backend`], the resulting
//! [`BackendName`] resolves through the registry to a [`ResolvedBackend`]
//! bundle, the bundle constructs one validated implementation per model
//! layer, and each forward batch pairs packed tensors with freshly built
//! [`PackedSeqMetadata`]. Selection and resolution run once and are pure;
//! forward calls share nothing across in-flight batches.

pub mod backends;
pub mod capability;
pub mod core;
pub mod metadata;
pub mod reference;
pub mod registry;
pub mod selector;

pub use crate::capability::HardwareCapability;
pub use crate::core::config::{
    BlockSparseParams, EngineAttentionConfig, LayerAttentionConfig, Precision,
};
pub use crate::core::errors::AttentionError;
pub use crate::core::{AttentionBackend, AttentionType, MetadataBuilder, PackedAttention};
pub use crate::metadata::{PackedSeqMetadata, PackedSeqMetadataBuilder};
pub use crate::registry::{backend_from_config, resolve, ResolvedBackend};
pub use crate::selector::{select_backend, BackendName};
