//! Variable-length attention over packed `[tokens, heads, head_size]` views.

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::ops::softmax_last_dim;

use crate::metadata::PackedSeqMetadata;

/// Kernel invocation parameters, fixed by the implementation that owns them.
#[derive(Debug, Clone)]
pub struct PackedKernelParams<'a> {
    pub num_heads: usize,
    pub num_kv_heads: usize,
    pub head_size: usize,
    pub softmax_scale: f32,
    /// Always `false` for the encoder family; the kernel honours it anyway.
    pub causal: bool,
    /// `(left, right)` window in tokens; `(-1, -1)` disables windowing.
    pub window_size: (i64, i64),
    /// Per-head distance-bias slopes, `num_heads` entries when present.
    pub alibi_slopes: Option<&'a [f32]>,
    /// Smooth logit bound; `0.0` disables the cap.
    pub logits_soft_cap: f32,
}

/// Compute attention independently per sequence of a packed batch.
///
/// `q` is `[tokens, num_heads, head_size]`; `k` and `v` are
/// `[tokens, num_kv_heads, head_size]`. Query and key/value share the same
/// start offsets since this is self-attention. The output mirrors the shape
/// and dtype of `q`, with token ordering preserved exactly.
pub fn packed_varlen_attention(
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
    metadata: &PackedSeqMetadata,
    params: &PackedKernelParams<'_>,
) -> Result<Tensor> {
    if metadata.total_tokens() == 0 {
        return q.zeros_like();
    }

    let input_dtype = q.dtype();
    let device = q.device();

    let q_work = q.to_dtype(DType::F32)?;
    let k_work = k.to_dtype(DType::F32)?;
    let v_work = v.to_dtype(DType::F32)?;

    // Grouped-query expansion: map each query head onto its kv head.
    let group = params.num_heads / params.num_kv_heads;
    let head_map = if group > 1 {
        let map: Vec<u32> = (0..params.num_heads).map(|h| (h / group) as u32).collect();
        Some(Tensor::from_vec(map, params.num_heads, device)?)
    } else {
        None
    };

    let mut outputs = Vec::with_capacity(metadata.num_seqs());
    for i in 0..metadata.num_seqs() {
        let (start, len) = metadata.seq_range(i);
        if len == 0 {
            continue;
        }

        // [heads, len, head_size]
        let q_seq = q_work.narrow(0, start, len)?.transpose(0, 1)?.contiguous()?;
        let mut k_seq = k_work.narrow(0, start, len)?.transpose(0, 1)?.contiguous()?;
        let mut v_seq = v_work.narrow(0, start, len)?.transpose(0, 1)?.contiguous()?;
        if let Some(map) = &head_map {
            k_seq = k_seq.index_select(map, 0)?;
            v_seq = v_seq.index_select(map, 0)?;
        }

        let mut scores = q_seq.matmul(&k_seq.transpose(1, 2)?.contiguous()?)?;
        scores = scores.affine(params.softmax_scale as f64, 0.0)?;

        if params.logits_soft_cap > 0.0 {
            let cap = params.logits_soft_cap as f64;
            scores = scores.affine(1.0 / cap, 0.0)?.tanh()?.affine(cap, 0.0)?;
        }

        if let Some(bias) = build_score_bias(params, len, device)? {
            scores = scores.broadcast_add(&bias)?;
        }

        let probs = softmax_last_dim(&scores)?;
        let out = probs.matmul(&v_seq)?.transpose(0, 1)?.contiguous()?;
        outputs.push(out);
    }

    if outputs.is_empty() {
        return q.zeros_like();
    }

    let packed = Tensor::cat(&outputs, 0)?;
    packed.to_dtype(input_dtype)
}

/// Additive score bias combining alibi slopes, windowing, and causality.
///
/// Returns `[num_heads, len, len]` when per-head alibi is in play and
/// `[1, len, len]` otherwise, or `None` when no bias applies.
fn build_score_bias(
    params: &PackedKernelParams<'_>,
    len: usize,
    device: &Device,
) -> Result<Option<Tensor>> {
    let (left, right) = params.window_size;
    let windowed = left >= 0 || right >= 0;
    if params.alibi_slopes.is_none() && !windowed && !params.causal {
        return Ok(None);
    }

    let heads = if params.alibi_slopes.is_some() {
        params.num_heads
    } else {
        1
    };
    let mut data = vec![0f32; heads * len * len];
    for h in 0..heads {
        let slope = params.alibi_slopes.map(|slopes| slopes[h]);
        for i in 0..len {
            let row = (h * len + i) * len;
            for j in 0..len {
                let behind = i as i64 - j as i64;
                let ahead = j as i64 - i as i64;
                let masked = (params.causal && ahead > 0)
                    || (left >= 0 && behind > left)
                    || (right >= 0 && ahead > right);
                data[row + j] = if masked {
                    f32::NEG_INFINITY
                } else if let Some(slope) = slope {
                    // Bidirectional alibi: symmetric distance penalty.
                    -slope * behind.unsigned_abs() as f32
                } else {
                    0.0
                };
            }
        }
    }

    Tensor::from_vec(data, (heads, len, len), device).map(Some)
}
