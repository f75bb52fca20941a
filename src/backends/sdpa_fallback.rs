//! Portable fallback backend used when the fused path is ruled out.
//!
//! This is the downgrade target for old compute generations, full-precision
//! dtypes, and sliding-window configurations, so unlike the fused-style
//! backend it accepts windows. It does not implement logit soft-capping.

use candle_core::Tensor;

use crate::backends::check_forward_contract;
use crate::core::config::LayerAttentionConfig;
use crate::core::errors::AttentionError;
use crate::core::{AttentionBackend, AttentionType, PackedAttention};
use crate::metadata::{PackedSeqMetadata, PackedSeqMetadataBuilder};
use crate::reference::{packed_varlen_attention, PackedKernelParams};

const SUPPORTED_HEAD_SIZES: &[usize] = &[
    16, 32, 48, 64, 80, 96, 112, 128, 144, 160, 176, 192, 208, 224, 240, 256,
];

/// Backend descriptor for the portable fallback path.
pub struct SdpaFallbackBackend;

impl AttentionBackend for SdpaFallbackBackend {
    type Metadata = PackedSeqMetadata;
    type Builder = PackedSeqMetadataBuilder;
    type Impl = SdpaFallbackAttention;

    const NAME: &'static str = "sdpa-fallback";

    fn supported_head_sizes() -> &'static [usize] {
        SUPPORTED_HEAD_SIZES
    }

    fn build(config: &LayerAttentionConfig) -> Result<SdpaFallbackAttention, AttentionError> {
        SdpaFallbackAttention::new(config)
    }
}

/// Encoder self-attention over packed batches via the portable kernel.
#[derive(Debug)]
pub struct SdpaFallbackAttention {
    num_heads: usize,
    head_size: usize,
    num_kv_heads: usize,
    num_queries_per_kv: usize,
    scale: f32,
    alibi_slopes: Option<Vec<f32>>,
    sliding_window: (i64, i64),
}

impl SdpaFallbackAttention {
    fn new(config: &LayerAttentionConfig) -> Result<Self, AttentionError> {
        if config.block_sparse.is_some() {
            return Err(AttentionError::UnsupportedFeature {
                backend: SdpaFallbackBackend::NAME,
                feature: "block-sparse attention",
            });
        }
        if config.logits_soft_cap.is_some() {
            return Err(AttentionError::UnsupportedFeature {
                backend: SdpaFallbackBackend::NAME,
                feature: "logits soft cap",
            });
        }
        if !SUPPORTED_HEAD_SIZES.contains(&config.head_size) {
            return Err(AttentionError::UnsupportedHeadSize {
                backend: SdpaFallbackBackend::NAME,
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

        let sliding_window = match config.sliding_window {
            Some(window) => (window as i64, window as i64),
            None => (-1, -1),
        };

        Ok(Self {
            num_heads: config.num_heads,
            head_size: config.head_size,
            num_kv_heads: config.num_kv_heads,
            num_queries_per_kv: config.num_heads / config.num_kv_heads,
            scale: config.softmax_scale(),
            alibi_slopes: config.alibi_slopes.clone(),
            sliding_window,
        })
    }

    pub fn num_queries_per_kv(&self) -> usize {
        self.num_queries_per_kv
    }
}


impl PackedAttention for SdpaFallbackAttention {
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
            SdpaFallbackBackend::NAME,
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
            logits_soft_cap: 0.0,
        };
        let output = packed_varlen_attention(&q_view, &k_view, &v_view, metadata, &params)?;
        Ok(output.reshape((num_tokens, hidden))?)
    }
}
