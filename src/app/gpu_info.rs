use nvml_wrapper::{Device, Nvml, enum_wrappers::device::TemperatureSensor};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct GpuInfo {
    pub cuda_available: bool,
    pub gpu_count: u32,
    pub gpus: Vec<GpuDevice>,
}

#[derive(Debug, Serialize)]
pub struct GpuDevice {
    pub index: u32,
    pub name: String,
    pub memory_total_mb: u64,
    pub memory_used_mb: u64,
    pub temperature: Option<u32>,
    pub utilization_gpu: Option<u32>,
}

/// Starts NVML if a driver is present; the service runs without it.
pub fn init_nvml() -> Option<Nvml> {
    match Nvml::init() {
        Ok(nvml) => Some(nvml),
        Err(e) => {
            warn!("NVML unavailable, GPU details disabled: {}", e);
            None
        }
    }
}

impl GpuInfo {
    pub fn new(nvml: &Nvml) -> Self {
        let cuda_available = tch::Cuda::is_available();

        let device_count = match nvml.device_count() {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to query GPU count: {}", e);
                return GpuInfo {
                    cuda_available,
                    gpu_count: 0,
                    gpus: Vec::new(),
                };
            }
        };

        let gpus = (0..device_count)
            .filter_map(|i| {
                let device = nvml.device_by_index(i).ok()?;
                Self::device_info(&device, i)
            })
            .collect();

        GpuInfo {
            cuda_available,
            gpu_count: device_count,
            gpus,
        }
    }

    fn device_info(device: &Device, index: u32) -> Option<GpuDevice> {
        let name = device.name().unwrap_or_else(|_| format!("GPU {}", index));
        let memory = device.memory_info().ok()?;

        Some(GpuDevice {
            index,
            name,
            memory_total_mb: memory.total / 1024 / 1024,
            memory_used_mb: memory.used / 1024 / 1024,
            temperature: device.temperature(TemperatureSensor::Gpu).ok(),
            utilization_gpu: device.utilization_rates().ok().map(|u| u.gpu),
        })
    }
}
