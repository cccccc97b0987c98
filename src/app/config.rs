use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};

/// Pixel scaling applied before the tensor reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Normalization {
    /// Keep 0..255, as produced by a plain array conversion.
    Raw,
    /// Divide by 255.
    Unit,
    /// Divide by 255, then ImageNet mean/std.
    Imagenet,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "tomato-leaf-doctor", about = "Tomato leaf disease detection with Grad-CAM")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LEAF_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Classifier weights (safetensors or .ot var store)
    #[arg(long, env = "LEAF_MODEL", default_value = "model.safetensors")]
    pub model: PathBuf,

    /// Minimum probability of the top class
    #[arg(long, env = "LEAF_THRESHOLD", default_value_t = 0.8)]
    pub threshold: f64,

    #[arg(long, env = "LEAF_NORMALIZATION", value_enum, default_value_t = Normalization::Raw)]
    pub normalization: Normalization,

    /// Side of the square network input
    #[arg(long, env = "LEAF_INPUT_SIZE", default_value_t = 224)]
    pub input_size: u32,

    /// Weight of the heat map when blended over the input
    #[arg(long, env = "LEAF_OVERLAY_ALPHA", default_value_t = 0.4)]
    pub overlay_alpha: f32,

    #[arg(long, env = "LEAF_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    #[arg(long, env = "LEAF_MAX_UPLOAD_MB", default_value_t = 16)]
    pub max_upload_mb: usize,

    /// Run on CPU even if CUDA is available
    #[arg(long, env = "LEAF_CPU")]
    pub cpu: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            bail!("threshold must be within [0, 1], got {}", self.threshold);
        }
        if !(0.0..=1.0).contains(&self.overlay_alpha) {
            bail!("overlay alpha must be within [0, 1], got {}", self.overlay_alpha);
        }
        if self.input_size < 32 {
            bail!("input size must be at least 32, got {}", self.input_size);
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}
