//! Portable packed-sequence attention kernel.
//!
//! The exact path prioritises numerical fidelity: reductions accumulate in
//! `f32` regardless of the incoming dtype and the output is cast back to the
//! input dtype. Every registered backend currently executes through this
//! kernel; hardware-specific fused kernels plug in behind the same contract.

pub mod packed;

pub use packed::{packed_varlen_attention, PackedKernelParams};
