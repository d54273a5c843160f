//! Face landmark extraction variant
//!
//! The checkpoint carries a normalized 2-D keypoint template; a forward
//! pass maps the template onto each decoded frame and reduces it to a
//! face-region box. Frames that cannot be decoded yield a placeholder
//! region instead of failing the whole batch.

use std::path::Path;

use anyhow::{ensure, Context};
use ndarray::Array2;
use tracing::error;

use super::variant::ModelVariant;

/// Region reported for frames with no usable face geometry.
pub const REGION_PLACEHOLDER: FaceRegion = FaceRegion {
    x1: 0.0,
    y1: 0.0,
    x2: 0.0,
    y2: 0.0,
};

/// Axis-aligned face region in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceRegion {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Keypoint template loaded onto a device: N normalized (x, y) points in
/// `[0, 1]`.
pub struct LandmarkNet {
    points: Array2<f32>,
    #[allow(dead_code)]
    device: String,
}

pub struct LandmarkExtractor;

impl LandmarkExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LandmarkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelVariant for LandmarkExtractor {
    type Handle = LandmarkNet;
    type Request = Vec<Vec<u8>>;
    type Response = Vec<FaceRegion>;

    fn load_on_device(&self, device: &str, checkpoint: &Path) -> anyhow::Result<Option<LandmarkNet>> {
        let bytes = std::fs::read(checkpoint)
            .with_context(|| format!("failed to read checkpoint {}", checkpoint.display()))?;
        ensure!(!bytes.is_empty(), "checkpoint is empty");
        ensure!(
            bytes.len() % 8 == 0,
            "checkpoint is not a sequence of (x, y) f32 pairs"
        );

        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        let count = floats.len() / 2;
        ensure!(count >= 3, "keypoint template needs at least 3 points");

        let points = Array2::from_shape_vec((count, 2), floats)?;
        Ok(Some(LandmarkNet {
            points,
            device: device.to_string(),
        }))
    }

    fn forward(&self, net: &LandmarkNet, frames: Vec<Vec<u8>>) -> anyhow::Result<Vec<FaceRegion>> {
        let mut regions = Vec::with_capacity(frames.len());

        for frame in &frames {
            let image = match image::load_from_memory(frame) {
                Ok(image) => image,
                Err(_) => {
                    // No decodable face in this frame.
                    regions.push(REGION_PLACEHOLDER);
                    continue;
                }
            };
            let (width, height) = (image.width() as f32, image.height() as f32);

            let xs = net.points.column(0);
            let ys = net.points.column(1);
            let region = FaceRegion {
                x1: xs.iter().cloned().fold(f32::INFINITY, f32::min) * width,
                y1: ys.iter().cloned().fold(f32::INFINITY, f32::min) * height,
                x2: xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max) * width,
                y2: ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max) * height,
            };

            if region.x2 - region.x1 <= 0.0 || region.y2 - region.y1 <= 0.0 || region.x1 < 0.0 {
                error!("degenerate face region: {:?}", region);
                regions.push(REGION_PLACEHOLDER);
            } else {
                regions.push(region);
            }
        }

        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn template_checkpoint(points: &[(f32, f32)]) -> Vec<u8> {
        points
            .iter()
            .flat_map(|(x, y)| [x.to_le_bytes(), y.to_le_bytes()])
            .flatten()
            .collect()
    }

    fn write_checkpoint(dir: &std::path::Path, points: &[(f32, f32)]) -> std::path::PathBuf {
        let path = dir.join("model.pt");
        std::fs::write(&path, template_checkpoint(points)).unwrap();
        path
    }

    fn png_frame(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([120, 90, 60]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_load_parses_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_checkpoint(dir.path(), &[(0.2, 0.3), (0.8, 0.4), (0.5, 0.9)]);

        let extractor = LandmarkExtractor::new();
        let net = extractor.load_on_device("cpu", &path).unwrap().unwrap();
        assert_eq!(net.points.nrows(), 3);
    }

    #[test]
    fn test_load_rejects_truncated_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pt");
        std::fs::write(&path, [0u8; 10]).unwrap();

        let extractor = LandmarkExtractor::new();
        assert!(extractor.load_on_device("cpu", &path).is_err());
    }

    #[test]
    fn test_forward_scales_template_to_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_checkpoint(dir.path(), &[(0.25, 0.1), (0.75, 0.5), (0.5, 0.9)]);

        let extractor = LandmarkExtractor::new();
        let net = extractor.load_on_device("cpu", &path).unwrap().unwrap();

        let regions = extractor.forward(&net, vec![png_frame(200, 100)]).unwrap();
        assert_eq!(regions.len(), 1);
        let region = regions[0];
        assert!((region.x1 - 50.0).abs() < 1e-3);
        assert!((region.x2 - 150.0).abs() < 1e-3);
        assert!((region.y1 - 10.0).abs() < 1e-3);
        assert!((region.y2 - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_forward_placeholder_for_undecodable_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_checkpoint(dir.path(), &[(0.2, 0.2), (0.8, 0.8), (0.5, 0.5)]);

        let extractor = LandmarkExtractor::new();
        let net = extractor.load_on_device("cpu", &path).unwrap().unwrap();

        let frames = vec![b"not an image".to_vec(), png_frame(64, 64)];
        let regions = extractor.forward(&net, frames).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0], REGION_PLACEHOLDER);
        assert_ne!(regions[1], REGION_PLACEHOLDER);
    }
}
