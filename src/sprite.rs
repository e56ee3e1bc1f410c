//! Sprite sheet loading.
//!
//! An idle animation is stored as one tall bitmap: frames are stacked
//! vertically, each exactly one panel high. We decode it once at startup,
//! slice it into frames and pre-apply brightness so the render path is a
//! straight pixel copy.

use crate::{Color, PanelConfig};
use image::RgbImage;
use image::imageops;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpriteError {
    #[error("failed to load sprite sheet: {0}")]
    Image(#[from] image::ImageError),

    #[error("sprite sheet is {height}px tall, shorter than one {rows}px frame")]
    TooShort { height: u32, rows: u32 },
}

pub struct SpriteSheet {
    frames: Vec<RgbImage>,
}

impl SpriteSheet {
    pub fn load(path: &Path, panel: PanelConfig, brightness: u8) -> Result<Self, SpriteError> {
        let sheet = image::open(path)?.to_rgb8();
        Self::from_image(&sheet, panel, brightness)
    }

    /// Slice an already-decoded sheet. Extra rows below the last full frame are ignored.
    pub fn from_image(
        sheet: &RgbImage,
        panel: PanelConfig,
        brightness: u8,
    ) -> Result<Self, SpriteError> {
        let rows = panel.rows.max(1);
        let frame_count = sheet.height() / rows;
        if frame_count == 0 {
            return Err(SpriteError::TooShort {
                height: sheet.height(),
                rows,
            });
        }

        let width = sheet.width().min(panel.cols);
        let frames = (0..frame_count)
            .map(|i| {
                let mut frame = imageops::crop_imm(sheet, 0, i * rows, width, rows).to_image();
                apply_brightness(&mut frame, brightness);
                frame
            })
            .collect();

        Ok(Self { frames })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Frame `index`, wrapping past the end.
    pub fn frame(&self, index: usize) -> &RgbImage {
        &self.frames[index % self.frames.len()]
    }
}

fn apply_brightness(img: &mut RgbImage, brightness: u8) {
    if brightness >= 100 {
        return;
    }
    for pixel in img.pixels_mut() {
        let c = Color::new(pixel[0], pixel[1], pixel[2]).apply_brightness(brightness);
        pixel[0] = c.r;
        pixel[1] = c.g;
        pixel[2] = c.b;
    }
}
