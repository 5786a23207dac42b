//! Demo configuration

use anyhow::Context;
use image_buffer::{CopyRegion, PixelFormat};
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `SENSOR_DEMO_DEPTH__RATE_HZ=10`
pub const ENV_PREFIX: &str = "SENSOR_DEMO";

/// Simulated depth camera
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    /// Callback rate in Hz
    pub rate_hz: f64,
    /// Point capacity of each buffer
    pub max_points: usize,
    /// Points delivered per callback
    pub points_per_frame: usize,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            rate_hz: 5.0,
            max_points: 60_000,
            points_per_frame: 20_000,
        }
    }
}

/// Simulated color camera
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Callback rate in Hz
    pub rate_hz: f64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Rows copied per frame, whole frame when absent
    pub region: Option<CopyRegion>,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            rate_hz: 30.0,
            width: 1280,
            height: 720,
            format: PixelFormat::Nv21,
            region: None,
        }
    }
}

/// Demo configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Tracing filter directive (e.g. "info", "sensor_demo=debug")
    pub log_level: String,
    /// How long the render loop runs
    pub duration_secs: f64,
    /// Render loop polling rate
    pub render_fps: f64,
    pub depth: DepthConfig,
    pub color: ColorConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            duration_secs: 10.0,
            render_fps: 60.0,
            depth: DepthConfig::default(),
            color: ColorConfig::default(),
        }
    }
}

impl DemoConfig {
    /// Load from an optional TOML file, overridden by `SENSOR_DEMO_*`
    /// environment variables.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let config: DemoConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.render_fps > 0.0, "render_fps must be positive");
        anyhow::ensure!(self.depth.rate_hz > 0.0, "depth.rate_hz must be positive");
        anyhow::ensure!(self.color.rate_hz > 0.0, "color.rate_hz must be positive");
        anyhow::ensure!(
            self.depth.points_per_frame <= self.depth.max_points,
            "depth.points_per_frame exceeds depth.max_points"
        );
        Ok(())
    }
}
