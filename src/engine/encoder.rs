//! Frame encoder variant
//!
//! Projects frames into latent vectors with a linear encoder whose weight
//! matrix comes straight from the checkpoint (row-major little-endian
//! f32 over a fixed 64x64 RGB input).

use std::path::Path;

use anyhow::{ensure, Context};
use image::imageops::FilterType;
use ndarray::{Array1, Array2};

use super::variant::ModelVariant;

/// Encoder input edge length; frames are resized to this before encoding.
pub const ENCODER_INPUT_SIZE: u32 = 64;

/// Flattened RGB input dimension.
pub const ENCODER_INPUT_DIM: usize =
    (ENCODER_INPUT_SIZE as usize) * (ENCODER_INPUT_SIZE as usize) * 3;

/// Projection matrix loaded from a checkpoint, one row per latent
/// dimension.
pub struct EncoderWeights {
    weight: Array2<f32>,
}

impl EncoderWeights {
    pub fn latent_dim(&self) -> usize {
        self.weight.nrows()
    }
}

pub struct FrameEncoder;

impl FrameEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode and normalize one frame to a flat `[-1, 1]` input vector.
    fn preprocess(frame: &[u8]) -> anyhow::Result<Array1<f32>> {
        let image = image::load_from_memory(frame).context("failed to decode frame")?;
        let resized = image
            .resize_exact(ENCODER_INPUT_SIZE, ENCODER_INPUT_SIZE, FilterType::Triangle)
            .to_rgb8();

        let pixels: Vec<f32> = resized
            .pixels()
            .flat_map(|pixel| pixel.0)
            .map(|channel| (channel as f32 / 255.0) * 2.0 - 1.0)
            .collect();
        Ok(Array1::from_vec(pixels))
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelVariant for FrameEncoder {
    type Handle = EncoderWeights;
    type Request = Vec<Vec<u8>>;
    type Response = Vec<Vec<f32>>;

    fn load_on_device(
        &self,
        _device: &str,
        checkpoint: &Path,
    ) -> anyhow::Result<Option<EncoderWeights>> {
        let bytes = std::fs::read(checkpoint)
            .with_context(|| format!("failed to read checkpoint {}", checkpoint.display()))?;
        ensure!(!bytes.is_empty(), "checkpoint is empty");
        ensure!(bytes.len() % 4 == 0, "checkpoint is not an f32 tensor");

        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        ensure!(
            floats.len() % ENCODER_INPUT_DIM == 0,
            "checkpoint shape mismatch: {} weights is not a multiple of input dim {}",
            floats.len(),
            ENCODER_INPUT_DIM
        );

        let latent_dim = floats.len() / ENCODER_INPUT_DIM;
        let weight = Array2::from_shape_vec((latent_dim, ENCODER_INPUT_DIM), floats)?;
        Ok(Some(EncoderWeights { weight }))
    }

    fn forward(
        &self,
        weights: &EncoderWeights,
        frames: Vec<Vec<u8>>,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut latents = Vec::with_capacity(frames.len());
        for frame in &frames {
            let input = Self::preprocess(frame)?;
            latents.push(weights.weight.dot(&input).to_vec());
        }
        Ok(latents)
    }
}
