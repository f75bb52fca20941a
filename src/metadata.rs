//! Per-batch metadata describing the packed-sequence layout.
//!
//! A packed batch concatenates sequences of differing lengths along the
//! token axis without padding; the metadata locates each sequence via
//! prefix-sum start offsets. Metadata is built fresh per forward batch, is
//! immutable once built, and is owned exclusively by the forward call that
//! created it.

use crate::core::MetadataBuilder;

/// Start offsets and maximum length for one packed batch.
///
/// `seq_start_locs` has `num_seqs + 1` entries: monotonic, starting at 0,
/// ending at the total packed token count. Sequence `i` occupies tokens
/// `seq_start_locs[i] .. seq_start_locs[i + 1]`, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedSeqMetadata {
    seq_start_locs: Vec<u32>,
    max_seq_len: usize,
}

impl PackedSeqMetadata {
    /// Offsets into the token axis, one per sequence boundary.
    pub fn seq_start_locs(&self) -> &[u32] {
        &self.seq_start_locs
    }

    /// Length of the longest sequence in the batch (0 for an empty batch).
    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    pub fn num_seqs(&self) -> usize {
        self.seq_start_locs.len() - 1
    }

    /// Total packed token count across all sequences.
    pub fn total_tokens(&self) -> usize {
        *self.seq_start_locs.last().expect("offsets are never empty") as usize
    }

    /// Start offset and length of sequence `i`.
    pub fn seq_range(&self, i: usize) -> (usize, usize) {
        let start = self.seq_start_locs[i] as usize;
        let end = self.seq_start_locs[i + 1] as usize;
        (start, end - start)
    }
}

/// Stateless builder computing prefix-sum offsets from sequence lengths.
pub struct PackedSeqMetadataBuilder;

impl MetadataBuilder for PackedSeqMetadataBuilder {
    type Metadata = PackedSeqMetadata;

    fn build(seq_lens: &[usize]) -> PackedSeqMetadata {
        let mut seq_start_locs = Vec::with_capacity(seq_lens.len() + 1);
        let mut offset = 0u32;
        seq_start_locs.push(offset);
        let mut max_seq_len = 0usize;
        for &len in seq_lens {
            offset += len as u32;
            seq_start_locs.push(offset);
            max_seq_len = max_seq_len.max(len);
        }
        PackedSeqMetadata {
            seq_start_locs,
            max_seq_len,
        }
    }
}
