//! Hardware capability reporting consumed by backend selection.
//!
//! The capability is immutable per process: it is queried during engine
//! initialization and never mutated by this crate. Engines that probe real
//! devices construct it explicitly; [`HardwareCapability::detect`] offers a
//! conservative default derived from the tensor device.

use candle_core::{DType, Device, DeviceLocation};

/// Compute-generation and dtype support of the running hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareCapability {
    /// Major compute-generation version. Fused kernels require 8 or newer.
    pub major_compute_version: u32,
    /// Numeric types the hardware executes natively.
    pub supported_dtypes: Vec<DType>,
}

impl HardwareCapability {
    pub fn new(major_compute_version: u32, supported_dtypes: Vec<DType>) -> Self {
        Self {
            major_compute_version,
            supported_dtypes,
        }
    }

    /// Whether the hardware supports `dtype` natively.
    pub fn supports_dtype(&self, dtype: DType) -> bool {
        self.supported_dtypes.contains(&dtype)
    }

    /// Conservative capability derived from the tensor device.
    ///
    /// Candle does not expose the CUDA compute capability, so CUDA devices
    /// report generation 8 with reduced-precision support and callers with a
    /// real probe should construct the capability themselves. CPU reports
    /// generation 0, which steers selection away from fused kernels.
    pub fn detect(device: &Device) -> Self {
        match device.location() {
            DeviceLocation::Cpu => Self::new(0, vec![DType::F32]),
            DeviceLocation::Cuda { .. } => {
                Self::new(8, vec![DType::F16, DType::BF16, DType::F32])
            }
            DeviceLocation::Metal { .. } => Self::new(0, vec![DType::F16, DType::F32]),
        }
    }
}
