//! Compute device selection.

use std::fmt;

use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::Device;

use crate::error::ConfigError;

/// Parsed form of the `model.device` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSpec {
    /// CUDA if built and present, then Metal, then CPU
    Auto,
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl DeviceSpec {
    /// Parse `"auto"`, `"cpu"`, `"cuda"`, `"cuda:N"`, `"metal"` or `"metal:N"`.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let s = s.trim().to_lowercase();
        let (kind, ordinal) = match s.split_once(':') {
            Some((kind, ordinal)) => {
                let ordinal = ordinal.parse::<usize>().map_err(|_| {
                    ConfigError::Device(format!("invalid device ordinal in {s:?}"))
                })?;
                (kind, Some(ordinal))
            }
            None => (s.as_str(), None),
        };
        match (kind, ordinal) {
            ("auto", None) => Ok(Self::Auto),
            ("cpu", None) => Ok(Self::Cpu),
            ("cuda", n) => Ok(Self::Cuda(n.unwrap_or(0))),
            ("metal", n) => Ok(Self::Metal(n.unwrap_or(0))),
            _ => Err(ConfigError::Device(format!(
                "unsupported device {s:?} (expected auto, cpu, cuda:N or metal:N)"
            ))),
        }
    }

    /// Open the device. `force_cpu` wins over everything else.
    pub fn open(self, force_cpu: bool) -> Result<Device, ConfigError> {
        if force_cpu {
            return Ok(Device::Cpu);
        }
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Auto => {
                if cuda_is_available() {
                    if let Ok(device) = Device::new_cuda(0) {
                        return Ok(device);
                    }
                }
                if metal_is_available() {
                    if let Ok(device) = Device::new_metal(0) {
                        return Ok(device);
                    }
                }
                Ok(Device::Cpu)
            }
            Self::Cuda(n) => {
                if !cuda_is_available() {
                    return Err(ConfigError::Device(format!(
                        "cuda:{n} requested but this build has no CUDA support"
                    )));
                }
                Device::new_cuda(n).map_err(|e| ConfigError::Device(format!("cuda:{n}: {e}")))
            }
            Self::Metal(n) => {
                if !metal_is_available() {
                    return Err(ConfigError::Device(format!(
                        "metal:{n} requested but this build has no Metal support"
                    )));
                }
                Device::new_metal(n).map_err(|e| ConfigError::Device(format!("metal:{n}: {e}")))
            }
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(n) => write!(f, "cuda:{n}"),
            Self::Metal(n) => write!(f, "metal:{n}"),
        }
    }
}

/// Open the configured device and seed it.
///
/// Only accelerator RNGs are seeded; the CPU backend has no seedable state.
pub fn select(spec: &str, force_cpu: bool, seed: u64) -> Result<Device, ConfigError> {
    let device = DeviceSpec::parse(spec)?.open(force_cpu)?;
    if !device.is_cpu() {
        device
            .set_seed(seed)
            .map_err(|e| ConfigError::Device(format!("cannot seed {}: {e}", label(&device))))?;
    }
    tracing::info!(device = %label(&device), "Selected compute device");
    Ok(device)
}

/// Short human-readable device name.
pub fn label(device: &Device) -> String {
    match device.location() {
        candle_core::DeviceLocation::Cpu => "cpu".to_string(),
        candle_core::DeviceLocation::Cuda { gpu_id } => format!("cuda:{gpu_id}"),
        candle_core::DeviceLocation::Metal { gpu_id } => format!("metal:{gpu_id}"),
    }
}
