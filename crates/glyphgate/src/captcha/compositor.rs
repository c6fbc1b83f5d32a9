//! Challenge image composition.
//!
//! Stamps the correct glyphs onto the background, one per grid cell, each
//! rotated away from upright and resized within the cell envelope.

use std::path::Path;

use glyphgate_common::GateError;
use glyphgate_common::constants::ROTATION_RANGES;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use rand::Rng;
use tempfile::NamedTempFile;

use super::layout::{self, Envelope, GridLayout};

/// Canvas settings for challenge images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compositor {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub cell_padding: u32,
}

impl Compositor {
    pub fn new(canvas_width: u32, canvas_height: u32, cell_padding: u32) -> Self {
        Self {
            canvas_width,
            canvas_height,
            cell_padding,
        }
    }

    /// Scale the background to the canvas and stamp `glyphs` onto it
    pub fn render<R: Rng + ?Sized>(&self, background: &RgbaImage, glyphs: &[RgbaImage], rng: &mut R) -> RgbaImage {
        let canvas = imageops::resize(background, self.canvas_width, self.canvas_height, FilterType::Lanczos3);
        let grid = layout::layout(self.canvas_width, self.canvas_height, glyphs.len(), self.cell_padding);
        compose(canvas, glyphs, &grid, rng)
    }
}

/// Stamp `glyphs` onto `background` following `grid`, in input order.
/// Cells beyond the number of glyphs stay empty.
pub fn compose<R: Rng + ?Sized>(
    mut background: RgbaImage,
    glyphs: &[RgbaImage],
    grid: &GridLayout,
    rng: &mut R,
) -> RgbaImage {
    for (glyph, cell) in glyphs.iter().zip(grid.cells.iter()) {
        let degrees = random_rotation(rng);
        let side = random_side(&grid.envelope, rng);
        if side == 0 {
            tracing::warn!(x = cell.x, y = cell.y, "Empty glyph envelope, skipping cell");
            continue;
        }

        // imageproc rotates clockwise; negate for a counter-clockwise turn
        let rotated = rotate_about_center(
            glyph,
            -(degrees as f32).to_radians(),
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
        );
        let resized = imageops::resize(&rotated, side, side, FilterType::Lanczos3);

        imageops::overlay(&mut background, &resized, cell.x as i64, cell.y as i64);
    }

    background
}

/// Rotation in degrees, uniform over one of the non-upright ranges
pub fn random_rotation<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    let (lo, hi) = ROTATION_RANGES[rng.random_range(0..ROTATION_RANGES.len())];
    rng.random_range(lo..=hi)
}

/// Square side length between the envelope's smaller and larger dimension
pub fn random_side<R: Rng + ?Sized>(envelope: &Envelope, rng: &mut R) -> u32 {
    let (lo, hi) = envelope.side_range();
    rng.random_range(lo..=hi)
}

/// A rendered challenge image written to disk.
///
/// Every artifact gets its own uniquely named file, removed when the value
/// is dropped, so it is cleaned up even when delivering it fails.
#[derive(Debug)]
pub struct ArtifactFile {
    file: NamedTempFile,
}

impl ArtifactFile {
    /// Save `image` as PNG in `dir`, under a fresh name starting with `prefix`
    pub fn write(dir: &Path, prefix: &str, image: &RgbaImage) -> Result<Self, GateError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| GateError::Asset(format!("cannot create {}: {e}", dir.display())))?;

        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".png")
            .tempfile_in(dir)
            .map_err(|e| GateError::Asset(format!("cannot create artifact in {}: {e}", dir.display())))?;

        image
            .write_to(file.as_file_mut(), ImageFormat::Png)
            .map_err(|e| GateError::Asset(format!("cannot write {}: {e}", file.path().display())))?;

        tracing::trace!(path = ?file.path(), "Wrote challenge artifact");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, GateError> {
        std::fs::read(self.path())
            .map_err(|e| GateError::Asset(format!("cannot read {}: {e}", self.path().display())))
    }
}
