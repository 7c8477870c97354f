//! V4L2 camera capture

use crate::camera::{CaptureSample, FrameSource};
use crate::error::VisionError;
use async_trait::async_trait;
use image::ImageFormat;
use std::time::Duration;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Frames dropped after opening the stream while exposure settles
const WARMUP_FRAMES: u32 = 2;

/// USB camera read through V4L2 as MJPG.
///
/// The device is opened for each capture and released afterwards, so a
/// camera unplugged between cards only costs the attempts made while it is
/// missing.
pub struct V4lCamera {
    index: u32,
    resolution: (u32, u32),
    frame_interval: Duration,
}

impl V4lCamera {
    pub fn new(index: u32, resolution: (u32, u32), frame_interval: Duration) -> Self {
        Self {
            index,
            resolution,
            frame_interval,
        }
    }

    fn device_path(&self) -> String {
        format!("/dev/video{}", self.index)
    }
}

fn capture_blocking(
    path: &str,
    (width, height): (u32, u32),
    n: u32,
    interval: Duration,
) -> Result<Vec<CaptureSample>, VisionError> {
    let mut dev = Device::with_path(path)
        .map_err(|e| VisionError::DeviceUnavailable(format!("cannot open {}: {}", path, e)))?;

    let mjpg = v4l::FourCC::new(b"MJPG");
    let mut format = dev
        .format()
        .map_err(|e| VisionError::DeviceUnavailable(format!("cannot query format: {}", e)))?;
    format.width = width;
    format.height = height;
    format.fourcc = mjpg;
    let format = dev
        .set_format(&format)
        .map_err(|e| VisionError::DeviceUnavailable(format!("cannot set format: {}", e)))?;
    if format.fourcc != mjpg {
        return Err(VisionError::DeviceUnavailable(format!(
            "{} does not deliver MJPG (got {:?})",
            path, format.fourcc
        )));
    }
    debug!(width = format.width, height = format.height, "V4L2 format set");

    let mut stream = MmapStream::with_buffers(&mut dev, Type::VideoCapture, 4)
        .map_err(|e| VisionError::DeviceUnavailable(format!("cannot start stream: {}", e)))?;

    for _ in 0..WARMUP_FRAMES {
        let _ = stream.next();
    }

    let mut samples = Vec::with_capacity(n as usize);
    let mut last_error = None;
    for i in 0..n {
        if i > 0 && !interval.is_zero() {
            std::thread::sleep(interval);
        }
        let decoded = stream
            .next()
            .map_err(|e| e.to_string())
            .and_then(|(buf, _meta)| {
                image::load_from_memory_with_format(buf, ImageFormat::Jpeg).map_err(|e| e.to_string())
            });
        match decoded {
            Ok(image) => samples.push(CaptureSample::new(image)),
            Err(e) => {
                warn!("Dropped frame from {}: {}", path, e);
                last_error = Some(e);
            }
        }
    }

    if samples.is_empty() {
        return Err(VisionError::DeviceUnavailable(
            last_error.unwrap_or_else(|| "no frames delivered".to_string()),
        ));
    }
    Ok(samples)
}

#[async_trait]
impl FrameSource for V4lCamera {
    fn describe(&self) -> String {
        format!(
            "v4l2 {} {}x{}",
            self.device_path(),
            self.resolution.0,
            self.resolution.1
        )
    }

    async fn capture(&mut self, n: u32) -> Result<Vec<CaptureSample>, VisionError> {
        let path = self.device_path();
        let resolution = self.resolution;
        let interval = self.frame_interval;
        tokio::task::spawn_blocking(move || capture_blocking(&path, resolution, n, interval))
            .await
            .map_err(|e| VisionError::Processing(format!("capture task failed: {}", e)))?
    }

    async fn is_alive(&mut self) -> bool {
        let path = self.device_path();
        let alive = tokio::task::spawn_blocking(move || Device::with_path(&path).is_ok())
            .await
            .unwrap_or(false);
        if alive {
            info!("Camera {} is available", self.device_path());
        }
        alive
    }
}
