use std::fmt;
use std::str::FromStr;

use candle_core::Device;
use tracing::{debug, warn};

#[cfg(any(feature = "metal", feature = "cuda"))]
use tracing::info;

use super::error::EmbeddingError;

/// Which compute device the models should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// First available GPU backend compiled in, then CPU.
    #[default]
    Auto,
    Cpu,
    Metal,
    Cuda,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "metal" => Ok(Self::Metal),
            "cuda" => Ok(Self::Cuda),
            other => Err(format!("unknown device '{other}'")),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Metal => "metal",
            Self::Cuda => "cuda",
        };
        f.write_str(name)
    }
}

/// Resolves a preference into a device.
///
/// `Auto` degrades to CPU with a warning. An explicit `Metal`/`Cuda` request
/// fails when the backend is not compiled in or the device cannot be opened.
pub fn select_device(preference: DevicePreference) -> Result<Device, EmbeddingError> {
    match preference {
        DevicePreference::Cpu => {
            debug!("CPU device requested");
            Ok(Device::Cpu)
        }
        DevicePreference::Metal => open_metal(),
        DevicePreference::Cuda => open_cuda(),
        DevicePreference::Auto => {
            let mut failures: Vec<String> = Vec::new();

            if cfg!(feature = "metal") {
                match open_metal() {
                    Ok(device) => return Ok(device),
                    Err(e) => failures.push(e.to_string()),
                }
            }
            if cfg!(feature = "cuda") {
                match open_cuda() {
                    Ok(device) => return Ok(device),
                    Err(e) => failures.push(e.to_string()),
                }
            }

            let reason = if failures.is_empty() {
                "no GPU backend compiled".to_string()
            } else {
                failures.join("; ")
            };
            warn!(reason = %reason, "Falling back to CPU device");
            Ok(Device::Cpu)
        }
    }
}

#[cfg(feature = "metal")]
fn open_metal() -> Result<Device, EmbeddingError> {
    let device = Device::new_metal(0).map_err(|e| EmbeddingError::DeviceUnavailable {
        device: "metal".to_string(),
        reason: e.to_string(),
    })?;
    info!("Using Metal GPU acceleration");
    Ok(device)
}

#[cfg(not(feature = "metal"))]
fn open_metal() -> Result<Device, EmbeddingError> {
    Err(EmbeddingError::DeviceUnavailable {
        device: "metal".to_string(),
        reason: "crate built without the `metal` feature".to_string(),
    })
}

#[cfg(feature = "cuda")]
fn open_cuda() -> Result<Device, EmbeddingError> {
    let device = Device::new_cuda(0).map_err(|e| EmbeddingError::DeviceUnavailable {
        device: "cuda".to_string(),
        reason: e.to_string(),
    })?;
    info!("Using CUDA GPU acceleration");
    Ok(device)
}

#[cfg(not(feature = "cuda"))]
fn open_cuda() -> Result<Device, EmbeddingError> {
    Err(EmbeddingError::DeviceUnavailable {
        device: "cuda".to_string(),
        reason: "crate built without the `cuda` feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preference() {
        assert_eq!("CPU".parse::<DevicePreference>(), Ok(DevicePreference::Cpu));
        assert_eq!(" auto ".parse::<DevicePreference>(), Ok(DevicePreference::Auto));
        assert!("tpu".parse::<DevicePreference>().is_err());
        assert_eq!(DevicePreference::Cuda.to_string(), "cuda");
    }

    #[test]
    fn test_cpu_always_available() {
        let device = select_device(DevicePreference::Cpu).expect("cpu");
        assert!(matches!(device, Device::Cpu));
        assert!(select_device(DevicePreference::Auto).is_ok());
    }
}
