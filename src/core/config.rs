//! Configuration consumed by backend selection and layer construction.
//!
//! [`EngineAttentionConfig`] carries the engine-level inputs to backend
//! selection, including the explicit override that replaces any implicit
//! process-environment read so selection stays a pure function of its
//! arguments. [`LayerAttentionConfig`] is created once per model layer at
//! load time and is immutable thereafter.

use candle_core::DType;
use serde::Deserialize;

use crate::core::errors::AttentionError;

/// Numeric precision the engine runs the model in.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Fp32,
    Fp16,
    Bf16,
}

impl Default for Precision {
    fn default() -> Self {
        Precision::Bf16
    }
}

impl Precision {
    /// The candle dtype tensors carry under this precision.
    pub fn as_dtype(self) -> DType {
        match self {
            Precision::Fp32 => DType::F32,
            Precision::Fp16 => DType::F16,
            Precision::Bf16 => DType::BF16,
        }
    }
}

/// Engine-level inputs to backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineAttentionConfig {
    pub num_heads: usize,
    pub head_size: usize,
    pub num_kv_heads: usize,
    #[serde(default)]
    pub sliding_window: Option<usize>,
    #[serde(default)]
    pub precision: Precision,
    /// Explicit backend override, threaded in by the caller instead of read
    /// from the process environment. Parsed case-sensitively against the
    /// enumerated backend names.
    #[serde(default)]
    pub backend_override: Option<String>,
}

impl EngineAttentionConfig {
    pub fn new(
        num_heads: usize,
        head_size: usize,
        num_kv_heads: usize,
        precision: Precision,
    ) -> Self {
        Self {
            num_heads,
            head_size,
            num_kv_heads,
            sliding_window: None,
            precision,
            backend_override: None,
        }
    }

    /// The dtype tensors will carry at forward time.
    pub fn dtype(&self) -> DType {
        self.precision.as_dtype()
    }

    /// Validate structural invariants before selection runs.
    pub fn validate(&self) -> Result<(), AttentionError> {
        if self.num_heads == 0 {
            return Err(AttentionError::invalid_shape(
                "num_heads must be greater than zero",
            ));
        }
        if self.head_size == 0 {
            return Err(AttentionError::invalid_shape(
                "head_size must be greater than zero",
            ));
        }
        if self.num_kv_heads == 0 {
            return Err(AttentionError::invalid_shape(
                "num_kv_heads must be greater than zero",
            ));
        }
        if self.num_heads % self.num_kv_heads != 0 {
            return Err(AttentionError::invalid_shape(format!(
                "num_heads ({}) must be divisible by num_kv_heads ({})",
                self.num_heads, self.num_kv_heads
            )));
        }
        Ok(())
    }

    /// Derive the per-layer construction parameters for this engine config.
    pub fn layer_config(&self) -> LayerAttentionConfig {
        let mut config =
            LayerAttentionConfig::new(self.num_heads, self.head_size, self.num_kv_heads);
        config.sliding_window = self.sliding_window;
        config
    }
}

/// Block-sparse attention parameters. This backend family rejects them at
/// construction; the type exists so callers can express the request and get
/// a named error back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSparseParams {
    pub block_size: usize,
    pub local_blocks: usize,
    pub vert_stride: usize,
}

/// Per-layer attention parameters, fixed at model-load time.
#[derive(Debug, Clone)]
pub struct LayerAttentionConfig {
    pub num_heads: usize,
    pub head_size: usize,
    pub num_kv_heads: usize,
    /// Softmax scale; `None` means the conventional `1/sqrt(head_size)`.
    pub scale: Option<f32>,
    pub sliding_window: Option<usize>,
    /// Per-head linear bias coefficients added to attention scores as a
    /// function of token distance.
    pub alibi_slopes: Option<Vec<f32>>,
    /// Smooth upper bound applied to attention logits before the softmax.
    /// `None` maps onto the kernel's disabled sentinel (zero).
    pub logits_soft_cap: Option<f32>,
    pub block_sparse: Option<BlockSparseParams>,
}

impl LayerAttentionConfig {
    pub fn new(num_heads: usize, head_size: usize, num_kv_heads: usize) -> Self {
        Self {
            num_heads,
            head_size,
            num_kv_heads,
            scale: None,
            sliding_window: None,
            alibi_slopes: None,
            logits_soft_cap: None,
            block_sparse: None,
        }
    }

    /// The softmax scale the kernel will apply.
    pub fn softmax_scale(&self) -> f32 {
        self.scale
            .unwrap_or_else(|| 1.0 / (self.head_size as f32).sqrt())
    }
}
