//! Sensor Sample Exchange Demo
//!
//! Drives the point cloud and image buffer managers the way a tracking
//! application would: simulated camera callbacks publish on their own
//! threads while a render loop polls the latest samples at frame rate.

pub mod config;
pub mod simulator;

pub use config::DemoConfig;

use anyhow::Context;
use image_buffer::{ImageBuffer, ImageBufferManager, ImageFormat};
use point_cloud::{PointCloudError, PointCloudManager};
use pose_support::{CoordinateFrame, FramePair};
use serde::Serialize;
use simulator::{SensorClock, TrajectoryPoseProvider};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use triple_buffer::BufferStats;

/// Render loop counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderStats {
    /// Render ticks executed
    pub frames: u64,
    /// New clouds paired with a pose
    pub clouds: u64,
    /// New clouds dropped because no valid pose was available
    pub pose_failures: u64,
    /// New color images read
    pub images: u64,
    /// Average depth of the last cloud (meters)
    pub last_average_depth: Option<f32>,
    /// Device position at the last cloud
    pub last_position: Option<[f64; 3]>,
    /// Mean luma over the copy region of the last image
    pub last_region_luma: Option<f64>,
}

/// Everything the demo reports when it finishes
#[derive(Debug, Clone, Serialize)]
pub struct DemoSummary {
    pub render: RenderStats,
    pub depth: BufferStats,
    pub color: BufferStats,
    pub depth_frames_delivered: u64,
    pub color_frames_delivered: u64,
}

/// Initialize logging with a tracing filter directive
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")
}

/// Mean luma over rows `lines`, ignoring rows outside the image
fn region_luma(image: &ImageBuffer, lines: std::ops::RangeInclusive<u32>) -> Option<f64> {
    let mut sum = 0u64;
    let mut count = 0u64;
    for line in lines {
        let Some(row) = image.row(line) else { break };
        sum += row.iter().map(|&b| u64::from(b)).sum::<u64>();
        count += row.len() as u64;
    }
    (count > 0).then(|| sum as f64 / count as f64)
}

/// Run the simulated sensors and the render loop for `duration_secs`
pub async fn run(config: DemoConfig) -> anyhow::Result<DemoSummary> {
    config.validate()?;

    let clouds = PointCloudManager::new(config.depth.max_points)
        .context("Failed to create point cloud manager")?;
    let format = ImageFormat::packed(config.color.width, config.color.height, config.color.format)
        .context("Invalid color camera format")?;
    let images = ImageBufferManager::new(format).context("Failed to create image buffer manager")?;

    if let Some(region) = config.color.region {
        images
            .set_copy_region(region.begin_line, region.end_line, region.y_plane_only)
            .context("Invalid copy region")?;
    }
    let strip = config
        .color
        .region
        .map(|r| r.begin_line..=r.end_line)
        .unwrap_or(0..=format.height - 1);

    let (depth_producer, mut depth_consumer) = clouds.split();
    let (color_producer, mut color_consumer) = images.split();

    let clock = SensorClock::start();
    let depth_thread = simulator::spawn_depth(depth_producer, config.depth.clone(), clock);
    let color_thread = simulator::spawn_color(color_producer, config.color.clone(), clock);

    let poses = TrajectoryPoseProvider::default();
    let depth_frame = FramePair::new(CoordinateFrame::StartOfService, CoordinateFrame::CameraDepth);
    let mut stats = RenderStats::default();

    info!(
        "Render loop started: {:.1} fps for {:.1}s, color {}x{} {:?}",
        config.render_fps, config.duration_secs, format.width, format.height, format.format
    );

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / config.render_fps));
    let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(config.duration_secs);

    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;
        stats.frames += 1;

        match depth_consumer.get_latest_with_pose(&poses, depth_frame) {
            Ok(latest) if latest.is_new => {
                stats.clouds += 1;
                stats.last_average_depth = latest.cloud.average_depth();
                stats.last_position = Some(latest.pose.translation);
            }
            Ok(_) | Err(PointCloudError::NoData) => {}
            Err(e) => {
                stats.pose_failures += 1;
                warn!("Dropping cloud without pose: {}", e);
            }
        }

        let (image, is_new) = color_consumer.get_latest();
        if is_new {
            stats.images += 1;
            stats.last_region_luma = region_luma(image, strip.clone());
        }
    }

    let depth_frames_delivered = depth_thread.stop();
    let color_frames_delivered = color_thread.stop();
    debug!("Sensor threads joined");

    Ok(DemoSummary {
        render: stats,
        depth: depth_consumer.stats(),
        color: color_consumer.stats(),
        depth_frames_delivered,
        color_frames_delivered,
    })
}
