//! Occupancy bitmap for a racetrack.
//!
//! A track is a packed `0xAARRGGBB` raster. Pure black (ignoring alpha) is drivable
//! surface; every other colour is wall. There is no anti-aliasing tolerance.

use thiserror::Error;

const RGB_MASK: u32 = 0x00ff_ffff;

/// Packed colour used for walls drawn by [`Track::bordered`].
pub const WALL_ARGB: u32 = 0xffff_ffff;

/// Packed colour used for drivable surface drawn by [`Track::bordered`].
pub const ROAD_ARGB: u32 = 0xff00_0000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("track must be at least 1x1 pixels, got {width}x{height}")]
    Empty { width: u32, height: u32 },
    #[error("expected {expected} pixels for the track, got {actual}")]
    PixelCount { expected: usize, actual: usize },
}

/// What the track holds at a pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Drivable,
    Wall,
    /// The coordinate lies outside the bitmap.
    OffMap,
}

/// Binary wall / road segmentation of a raster image.
#[derive(Clone)]
pub struct Track {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("wall_pixels", &self.pixels.iter().filter(|p| *p & RGB_MASK != 0).count())
            .finish()
    }
}

impl Track {
    /// Builds a track from row-major packed ARGB pixels.
    pub fn from_argb(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self, TrackError> {
        if width == 0 || height == 0 {
            return Err(TrackError::Empty { width, height });
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(TrackError::PixelCount {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Builds a track by evaluating `colour(x, y)` for every pixel.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut colour: impl FnMut(u32, u32) -> u32,
    ) -> Result<Self, TrackError> {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| colour(x, y))
            .collect();
        Self::from_argb(width, height, pixels)
    }

    /// A black field enclosed by a white 1-pixel border.
    pub fn bordered(width: u32, height: u32) -> Result<Self, TrackError> {
        Self::from_fn(width, height, |x, y| {
            if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                WALL_ARGB
            } else {
                ROAD_ARGB
            }
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Classifies an integer pixel coordinate.
    pub fn cell(&self, x: i64, y: i64) -> Cell {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return Cell::OffMap;
        }
        let idx = y as usize * self.width as usize + x as usize;
        if self.pixels[idx] & RGB_MASK != 0 {
            Cell::Wall
        } else {
            Cell::Drivable
        }
    }

    /// Classifies a real-valued point by truncating it to its pixel.
    ///
    /// Negative coordinates are off-map even when they would truncate to 0.
    pub fn cell_at(&self, x: f64, y: f64) -> Cell {
        if !(x >= 0.0 && y >= 0.0) {
            return Cell::OffMap;
        }
        // Saturating float casts keep huge coordinates off-map.
        self.cell(x as i64, y as i64)
    }

    /// True when the pixel stops a ray: either a wall or outside the map.
    pub fn is_wall(&self, x: i64, y: i64) -> bool {
        !matches!(self.cell(x, y), Cell::Drivable)
    }
}
