//! Registered attention backend implementations.

#[cfg(feature = "flash")]
pub mod flash_varlen;
pub mod sdpa_fallback;

use candle_core::{DType, Tensor};

use crate::core::errors::AttentionError;
use crate::core::AttentionType;
use crate::metadata::PackedSeqMetadata;

/// Forward-call contract shared by every backend in this family: encoder
/// mode only, unit cache scales, packed `[tokens, heads * head_size]`
/// layout consistent with the metadata. Returns `(num_tokens, hidden)` for
/// the query so callers can restore the flat shape afterwards.
#[allow(clippy::too_many_arguments)]
pub(crate) fn check_forward_contract(
    backend: &'static str,
    num_heads: usize,
    num_kv_heads: usize,
    head_size: usize,
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
    metadata: &PackedSeqMetadata,
    k_scale: f32,
    v_scale: f32,
    kind: AttentionType,
) -> Result<(usize, usize), AttentionError> {
    if kind != AttentionType::Encoder {
        return Err(AttentionError::UnsupportedMode {
            backend,
            requested: kind,
        });
    }
    if k_scale != 1.0 || v_scale != 1.0 {
        return Err(AttentionError::UnsupportedQuantization {
            backend,
            k_scale,
            v_scale,
        });
    }

    let dtype = q.dtype();
    if dtype != k.dtype() || dtype != v.dtype() {
        return Err(AttentionError::invalid_shape(
            "q, k, v must share the same dtype",
        ));
    }
    if !matches!(dtype, DType::F32 | DType::F16 | DType::BF16) {
        return Err(AttentionError::UnsupportedDtype {
            requested: format!("{dtype:?}"),
        });
    }
    if !q.is_contiguous() || !k.is_contiguous() || !v.is_contiguous() {
        return Err(AttentionError::invalid_shape(
            "q, k, v must be contiguous in memory",
        ));
    }

    let (num_tokens, hidden) = q.dims2().map_err(|_| {
        AttentionError::invalid_shape("q must have shape [num_tokens, num_heads * head_size]")
    })?;
    if hidden != num_heads * head_size {
        return Err(AttentionError::invalid_shape(format!(
            "q hidden size {hidden} does not match num_heads ({num_heads}) * head_size ({head_size})"
        )));
    }

    let kv_hidden = num_kv_heads * head_size;
    for (name, tensor) in [("k", k), ("v", v)] {
        let (tokens, width) = tensor.dims2().map_err(|_| {
            AttentionError::invalid_shape(format!(
                "{name} must have shape [num_tokens, num_kv_heads * head_size]"
            ))
        })?;
        if tokens != num_tokens {
            return Err(AttentionError::invalid_shape(format!(
                "{name} token count {tokens} does not match q token count {num_tokens}"
            )));
        }
        if width != kv_hidden {
            return Err(AttentionError::invalid_shape(format!(
                "{name} hidden size {width} does not match num_kv_heads ({num_kv_heads}) * head_size ({head_size})"
            )));
        }
    }

    if num_tokens != metadata.total_tokens() {
        return Err(AttentionError::invalid_shape(format!(
            "packed token count {num_tokens} does not match metadata total {}",
            metadata.total_tokens()
        )));
    }

    Ok((num_tokens, hidden))
}
