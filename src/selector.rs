//! Backend selection: maps engine configuration and hardware capability to
//! one named backend.
//!
//! Selection runs once, synchronously, during engine initialization. It is
//! deterministic and total for valid enumerated input: once an override
//! parses, the function always returns a name. Downgrades are not errors;
//! they are logged policy decisions so an operator can audit why a
//! non-default backend was chosen.

use std::fmt;
use std::str::FromStr;

use candle_core::DType;

use crate::capability::HardwareCapability;
use crate::core::config::EngineAttentionConfig;
use crate::core::errors::AttentionError;

/// Enumerated attention backend tags.
///
/// Exactly one is selected per engine instance. Only a subset has a
/// registered implementation; the registry reports the rest as unsupported
/// rather than failing at selection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendName {
    FlashAttn,
    Xformers,
    RocmFlash,
    TorchSdpa,
    Openvino,
    Flashinfer,
    Pallas,
    Ipex,
}

impl BackendName {
    pub const ALL: [BackendName; 8] = [
        BackendName::FlashAttn,
        BackendName::Xformers,
        BackendName::RocmFlash,
        BackendName::TorchSdpa,
        BackendName::Openvino,
        BackendName::Flashinfer,
        BackendName::Pallas,
        BackendName::Ipex,
    ];

    /// Canonical name, matched case-sensitively by overrides.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendName::FlashAttn => "FLASH_ATTN",
            BackendName::Xformers => "XFORMERS",
            BackendName::RocmFlash => "ROCM_FLASH",
            BackendName::TorchSdpa => "TORCH_SDPA",
            BackendName::Openvino => "OPENVINO",
            BackendName::Flashinfer => "FLASHINFER",
            BackendName::Pallas => "PALLAS",
            BackendName::Ipex => "IPEX",
        }
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendName {
    type Err = AttentionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendName::ALL
            .iter()
            .find(|name| name.as_str() == s)
            .copied()
            .ok_or_else(|| AttentionError::InvalidBackendName {
                name: s.to_string(),
                available: BackendName::ALL
                    .iter()
                    .map(BackendName::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Choose the attention backend for this engine instance.
///
/// The default candidate is the fused kernel; an explicit override in the
/// config short-circuits the downgrade rules entirely. Otherwise the fused
/// kernel is downgraded to [`BackendName::Xformers`] when the hardware
/// generation, dtype, or sliding-window configuration rules it out.
pub fn select_backend(
    config: &EngineAttentionConfig,
    capability: &HardwareCapability,
) -> Result<BackendName, AttentionError> {
    if let Some(override_name) = &config.backend_override {
        let selected: BackendName = override_name.parse()?;
        log::info!("attention backend forced to {selected} by explicit override");
        return Ok(selected);
    }

    let mut selected = BackendName::FlashAttn;

    if selected == BackendName::FlashAttn {
        if capability.major_compute_version < 8 {
            log::info!(
                "cannot use the fused attention backend on compute generation {} (requires 8)",
                capability.major_compute_version
            );
            selected = BackendName::Xformers;
        } else if !matches!(config.dtype(), DType::F16 | DType::BF16) {
            log::info!(
                "cannot use the fused attention backend for dtype {:?}; it supports f16 and bf16 only",
                config.dtype()
            );
            selected = BackendName::Xformers;
        } else if config.sliding_window.is_some() {
            log::info!("cannot use the fused attention backend with a sliding window");
            selected = BackendName::Xformers;
        }
    }

    log::info!("using {selected} attention backend");
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Precision;

    fn config(precision: Precision) -> EngineAttentionConfig {
        EngineAttentionConfig::new(8, 64, 8, precision)
    }

    fn ampere() -> HardwareCapability {
        HardwareCapability::new(8, vec![DType::F16, DType::BF16, DType::F32])
    }

    fn turing() -> HardwareCapability {
        HardwareCapability::new(7, vec![DType::F16, DType::F32])
    }

    #[test]
    fn parses_canonical_names() {
        assert_eq!(
            "FLASH_ATTN".parse::<BackendName>().unwrap(),
            BackendName::FlashAttn
        );
        assert_eq!(
            "TORCH_SDPA".parse::<BackendName>().unwrap(),
            BackendName::TorchSdpa
        );
    }

    #[test]
    fn parse_is_case_sensitive() {
        let err = "flash_attn".parse::<BackendName>().unwrap_err();
        assert!(matches!(err, AttentionError::InvalidBackendName { .. }));
        let message = err.to_string();
        assert!(message.contains("flash_attn"));
        assert!(message.contains("FLASH_ATTN"));
    }

    #[test]
    fn defaults_to_fused_on_recent_hardware() {
        let selected = select_backend(&config(Precision::Fp16), &ampere()).unwrap();
        assert_eq!(selected, BackendName::FlashAttn);
    }

    #[test]
    fn selection_is_deterministic() {
        let cfg = config(Precision::Bf16);
        let first = select_backend(&cfg, &ampere()).unwrap();
        let second = select_backend(&cfg, &ampere()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn downgrades_on_old_compute_generation() {
        let selected = select_backend(&config(Precision::Fp16), &turing()).unwrap();
        assert_eq!(selected, BackendName::Xformers);
    }

    #[test]
    fn downgrades_on_full_precision() {
        let selected = select_backend(&config(Precision::Fp32), &ampere()).unwrap();
        assert_eq!(selected, BackendName::Xformers);
    }

    #[test]
    fn downgrades_on_sliding_window() {
        let mut cfg = config(Precision::Fp16);
        cfg.sliding_window = Some(128);
        let selected = select_backend(&cfg, &ampere()).unwrap();
        assert_eq!(selected, BackendName::Xformers);
    }

    #[test]
    fn override_short_circuits_downgrades() {
        let mut cfg = config(Precision::Fp32);
        cfg.backend_override = Some("FLASH_ATTN".to_string());
        let selected = select_backend(&cfg, &turing()).unwrap();
        assert_eq!(selected, BackendName::FlashAttn);
    }

    #[test]
    fn unknown_override_is_rejected() {
        let mut cfg = config(Precision::Fp16);
        cfg.backend_override = Some("TRITON".to_string());
        let err = select_backend(&cfg, &ampere()).unwrap_err();
        assert!(matches!(err, AttentionError::InvalidBackendName { .. }));
    }
}
