//! Compile-time mapping from backend names to implementation bundles.
//!
//! Resolution is late: a backend is only touched once it has actually been
//! selected, and names without a registered implementation fail with a
//! named error instead of dragging in unavailable kernels. The fused-style
//! path sits behind the `flash` feature; with the feature disabled the name
//! still parses and selects, but resolution reports it as unsupported.

use crate::capability::HardwareCapability;
use crate::core::config::{EngineAttentionConfig, LayerAttentionConfig};
use crate::core::errors::AttentionError;
use crate::core::{AttentionBackend, MetadataBuilder, PackedAttention};
use crate::metadata::{PackedSeqMetadata, PackedSeqMetadataBuilder};
use crate::selector::{select_backend, BackendName};

#[cfg(feature = "flash")]
use crate::backends::flash_varlen::FlashVarlenBackend;
use crate::backends::sdpa_fallback::SdpaFallbackBackend;

/// Handle to a resolved backend bundle.
///
/// Exposes the descriptor surface (name, supported head sizes) and the two
/// factories (metadata builder, implementation constructor) dynamically, so
/// engine wiring does not need to be generic over the backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBackend {
    #[cfg(feature = "flash")]
    FlashVarlen,
    SdpaFallback,
}

impl ResolvedBackend {
    /// Stable short name of the underlying backend.
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "flash")]
            ResolvedBackend::FlashVarlen => FlashVarlenBackend::NAME,
            ResolvedBackend::SdpaFallback => SdpaFallbackBackend::NAME,
        }
    }

    /// Head sizes the backend's kernel accepts.
    pub fn supported_head_sizes(&self) -> &'static [usize] {
        match self {
            #[cfg(feature = "flash")]
            ResolvedBackend::FlashVarlen => FlashVarlenBackend::supported_head_sizes(),
            ResolvedBackend::SdpaFallback => SdpaFallbackBackend::supported_head_sizes(),
        }
    }

    /// Build per-batch metadata from per-request token lengths.
    pub fn build_metadata(&self, seq_lens: &[usize]) -> PackedSeqMetadata {
        // Both registered backends share the packed-layout metadata.
        PackedSeqMetadataBuilder::build(seq_lens)
    }

    /// Validate the layer configuration and construct the implementation.
    pub fn construct(
        &self,
        config: &LayerAttentionConfig,
    ) -> Result<Box<dyn PackedAttention>, AttentionError> {
        match self {
            #[cfg(feature = "flash")]
            ResolvedBackend::FlashVarlen => {
                Ok(Box::new(FlashVarlenBackend::build(config)?))
            }
            ResolvedBackend::SdpaFallback => {
                Ok(Box::new(SdpaFallbackBackend::build(config)?))
            }
        }
    }
}

/// Resolve a selected backend name to its implementation bundle.
pub fn resolve(name: BackendName) -> Result<ResolvedBackend, AttentionError> {
    match name {
        BackendName::FlashAttn => {
            #[cfg(feature = "flash")]
            {
                Ok(ResolvedBackend::FlashVarlen)
            }
            #[cfg(not(feature = "flash"))]
            {
                Err(AttentionError::UnsupportedBackend(name))
            }
        }
        // Selector downgrades land on XFORMERS; both it and TORCH_SDPA
        // resolve to the portable fallback rather than silently no-opping.
        BackendName::Xformers | BackendName::TorchSdpa => Ok(ResolvedBackend::SdpaFallback),
        other => Err(AttentionError::UnsupportedBackend(other)),
    }
}

/// Select and resolve in one step: the engine-initialization entry point.
pub fn backend_from_config(
    config: &EngineAttentionConfig,
    capability: &HardwareCapability,
) -> Result<ResolvedBackend, AttentionError> {
    config.validate()?;
    let name = select_backend(config, capability)?;
    let backend = resolve(name)?;
    log::info!("resolved {name} to the {} backend", backend.name());
    Ok(backend)
}
