//! Core traits and types shared across attention backends.
//!
//! A backend is a bundle of four pieces that travel together: a descriptor
//! (the [`AttentionBackend`] implementor itself), a metadata type, a
//! metadata builder, and an implementation type. The bundle is expressed as
//! one trait with associated types so a backend tag always resolves to a
//! consistent set of companions.

pub mod config;
pub mod errors;

use candle_core::Tensor;

pub use config::{BlockSparseParams, EngineAttentionConfig, LayerAttentionConfig, Precision};
pub use errors::AttentionError;

use crate::metadata::PackedSeqMetadata;

/// The attention pattern a forward call requests.
///
/// This backend family implements bidirectional encoder self-attention
/// only; the other modes exist so callers get a named rejection instead of
/// silently wrong math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionType {
    /// Bidirectional self-attention over a packed batch. Causal masking is
    /// always disabled.
    Encoder,
    /// Causal decoder self-attention.
    DecoderSelf,
    /// Encoder/decoder cross-attention.
    Cross,
}

/// Builds per-batch metadata from per-request token lengths.
///
/// Builders are stateless; each call is independent and the produced
/// metadata is owned exclusively by the forward pass that requested it.
pub trait MetadataBuilder {
    type Metadata;

    fn build(seq_lens: &[usize]) -> Self::Metadata;
}

/// Executes the forward computation over packed tensors.
///
/// Implementations are immutable once constructed; `forward` is a pure
/// function of its arguments and is safe to call from whichever worker owns
/// the batch, provided construction happened-before the call.
pub trait PackedAttention: std::fmt::Debug + Send + Sync {
    /// Compute attention over `[tokens, heads * head_size]` packed buffers.
    ///
    /// `q` carries `num_heads` heads, `k`/`v` carry `num_kv_heads`. The
    /// output mirrors the shape, dtype, and token ordering of `q`.
    #[allow(clippy::too_many_arguments)]
    fn forward(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        metadata: &PackedSeqMetadata,
        k_scale: f32,
        v_scale: f32,
        kind: AttentionType,
    ) -> Result<Tensor, AttentionError>;

    /// Encoder-mode forward with unit cache scales, the only supported
    /// configuration of this family.
    fn forward_encoder(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        metadata: &PackedSeqMetadata,
    ) -> Result<Tensor, AttentionError> {
        self.forward(q, k, v, metadata, 1.0, 1.0, AttentionType::Encoder)
    }
}

/// Descriptor tying a backend's companion types together.
pub trait AttentionBackend {
    type Metadata;
    type Builder: MetadataBuilder<Metadata = Self::Metadata>;
    type Impl: PackedAttention;

    /// Stable short name used in logs and error messages.
    const NAME: &'static str;

    /// Head sizes the underlying kernel accepts, fixed per backend.
    fn supported_head_sizes() -> &'static [usize];

    /// Validate the layer configuration and construct the implementation.
    /// Validation happens here, once per layer, not per forward call.
    fn build(config: &LayerAttentionConfig) -> Result<Self::Impl, AttentionError>;
}
