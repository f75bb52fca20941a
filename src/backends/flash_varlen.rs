//! Fused-style variable-length backend.
//!
//! Mirrors the construction contract of the fused varlen kernel family:
//! restricted head sizes, no block-sparse or sliding-window support, alibi
//! and logit soft-capping accepted. The `(-1, -1)` window pair and zero
//! soft cap are the kernel's disabled sentinels.

use candle_core::Tensor;

use crate::backends::check_forward_contract;
use crate::core::config::LayerAttentionConfig;
use crate::core::errors::AttentionError;
use crate::core::{AttentionBackend, AttentionType, PackedAttention};
use crate::metadata::{PackedSeqMetadata, PackedSeqMetadataBuilder};
use crate::reference::{packed_varlen_attention, PackedKernelParams};

const SUPPORTED_HEAD_SIZES: &[usize] = &[32, 64, 96, 128, 160, 192, 224, 256];

/// Backend descriptor for the fused-style varlen path.
pub struct FlashVarlenBackend;

impl AttentionBackend for FlashVarlenBackend {
    type Metadata = PackedSeqMetadata;
    type Builder = PackedSeqMetadataBuilder;
    type Impl = FlashVarlenAttention;

    const NAME: &'static str = "flash-varlen";

    fn supported_head_sizes() -> &'static [usize] {
        SUPPORTED_HEAD_SIZES
    }

    fn build(config: &LayerAttentionConfig) -> Result<FlashVarlenAttention, AttentionError> {
        FlashVarlenAttention::new(config)
    }
}

/// Encoder self-attention over packed batches, validated once per layer.
#[derive(Debug)]
pub struct FlashVarlenAttention {
    num_heads: usize,
    head_size: usize,
    num_kv_heads: usize,
    num_queries_per_kv: usize,
    scale: f32,
    alibi_slopes: Option<Vec<f32>>,
    sliding_window: (i64, i64),
    logits_soft_cap: f32,
}

impl FlashVarlenAttention {
    fn new(config: &LayerAttentionConfig) -> Result<Self, AttentionError> {
        if config.block_sparse.is_some() {
            return Err(AttentionError::UnsupportedFeature {
                backend: FlashVarlenBackend::NAME,
                feature: "block-sparse attention",
            });
        }
        // The fused kernel's sliding window does not combine with this
        // kv layout; the selector routes windowed configs elsewhere.
        if config.sliding_window.is_some() {
            return Err(AttentionError::UnsupportedFeature {
                backend: FlashVarlenBackend::NAME,
                feature: "sliding-window attention",
            });
        }
        if !SUPPORTED_HEAD_SIZES.contains(&config.head_size) {
            return Err(AttentionError::UnsupportedHeadSize {
                backend: FlashVarlenBackend::NAME,
                head_size: config.head_size,
                supported: SUPPORTED_HEAD_SIZES,
            });
        }
        if config.num_kv_heads == 0 || config.num_heads % config.num_kv_heads != 0 {
            return Err(AttentionError::invalid_shape(format!(
                "num_heads ({}) must be divisible by num_kv_heads ({})",
                config.num_heads, config.num_kv_heads
            )));
        }
        if let Some(slopes) = &config.alibi_slopes {
            if slopes.len() != config.num_heads {
                return Err(AttentionError::invalid_shape(format!(
                    "expected {} alibi slopes, got {}",
                    config.num_heads,
                    slopes.len()
                )));
            }
        }

        Ok(Self {
            num_heads: config.num_heads,
            head_size: config.head_size,
            num_kv_heads: config.num_kv_heads,
            num_queries_per_kv: config.num_heads / config.num_kv_heads,
            scale: config.softmax_scale(),
            alibi_slopes: config.alibi_slopes.clone(),
            sliding_window: (-1, -1),
            // Zero means no soft cap in the kernel's arithmetic.
            logits_soft_cap: config.logits_soft_cap.unwrap_or(0.0),
        })
    }

    pub fn num_queries_per_kv(&self) -> usize {
        self.num_queries_per_kv
    }
}


impl PackedAttention for FlashVarlenAttention {
    fn forward(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        metadata: &PackedSeqMetadata,
        k_scale: f32,
        v_scale: f32,
        kind: AttentionType,
    ) -> Result<Tensor, AttentionError> {
        let (num_tokens, hidden) = check_forward_contract(
            FlashVarlenBackend::NAME,
            self.num_heads,
            self.num_kv_heads,
            self.head_size,
            q,
            k,
            v,
            metadata,
            k_scale,
            v_scale,
            kind,
        )?;

        let q_view = q.reshape((num_tokens, self.num_heads, self.head_size))?;
        let k_view = k.reshape((num_tokens, self.num_kv_heads, self.head_size))?;
        let v_view = v.reshape((num_tokens, self.num_kv_heads, self.head_size))?;

        let params = PackedKernelParams {
            num_heads: self.num_heads,
            num_kv_heads: self.num_kv_heads,
            head_size: self.head_size,
            softmax_scale: self.scale,
            causal: false,
            window_size: self.sliding_window,
            alibi_slopes: self.alibi_slopes.as_deref(),
            logits_soft_cap: self.logits_soft_cap,
        };
        let output = packed_varlen_attention(&q_view, &k_view, &v_view, metadata, &params)?;
        Ok(output.reshape((num_tokens, hidden))?)
    }
}
