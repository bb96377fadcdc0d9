//!
//! This module provides the drawing primitives shared by the bar and its popups.
//!
//! Everything is painted into a `Canvas`, a BGRA software framebuffer, and a `Surface` pushes the damaged parts of it to the screen.
use std::str::FromStr;

use image::RgbaImage;

use crate::error::{Error, Res};

/// A pixel rectangle. Coordinates are signed so that text hanging off the edge can be clipped instead of wrapping around.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// The overlapping part of both rectangles. May be empty.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        Self {
            x,
            y,
            width: (self.right().min(other.right()) - x).max(0),
            height: (self.bottom().min(other.bottom()) - y).max(0),
        }
    }

    /// The smallest rectangle containing both rectangles.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

/// An opaque RGB color.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

impl FromStr for Color {
    type Err = Error;

    /// Parses a `#rrggbb` color.
    fn from_str(hex: &str) -> Result<Self, Self::Err> {
        let bad = || Error::Color(hex.to_owned());
        let digits = hex.strip_prefix('#').ok_or_else(bad)?;
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(bad());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| bad());
        Ok(Self {
            red: channel(0)?,
            green: channel(2)?,
            blue: channel(4)?,
        })
    }
}

/// Determines the blended combination of both colors with the specified alpha mask.
#[must_use]
pub fn alpha_interpolate(color1: u8, color2: u8, alpha: u8) -> u8 {
    ((u32::from(color1) * u32::from(alpha) + (255 - u32::from(alpha)) * u32::from(color2)) / 255)
        as u8
}

/// A BGRA framebuffer. Every write is clipped to its bounds.
pub struct Canvas {
    width: i32,
    height: i32,
    data: Vec<u8>,
}

impl Canvas {
    #[must_use]
    pub fn new(width: u16, height: u16, color: Color) -> Self {
        let mut canvas = Self {
            width: i32::from(width),
            height: i32::from(height),
            data: vec![0u8; usize::from(width) * usize::from(height) * 4],
        };
        canvas.fill_rect(canvas.bounds(), color);
        canvas
    }

    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some(((y * self.width + x) * 4) as usize)
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rect = rect.intersect(&self.bounds());
        if rect.is_empty() {
            return;
        }
        let pixel = [color.blue, color.green, color.red, 0xFF];
        for y in rect.y..rect.bottom() {
            let start = ((y * self.width + rect.x) * 4) as usize;
            let end = start + rect.width as usize * 4;
            self.data[start..end]
                .chunks_exact_mut(4)
                .for_each(|p| p.copy_from_slice(&pixel));
        }
    }

    /// Blends a color on top of the pixel at (x, y) with the given coverage.
    pub fn blend(&mut self, x: i32, y: i32, color: Color, alpha: u8) {
        let Some(j) = self.offset(x, y) else {
            return;
        };
        self.data[j] = alpha_interpolate(color.blue, self.data[j], alpha);
        self.data[j + 1] = alpha_interpolate(color.green, self.data[j + 1], alpha);
        self.data[j + 2] = alpha_interpolate(color.red, self.data[j + 2], alpha);
        self.data[j + 3] = 0xFF;
    }

    /// Composites an RGBA image with its top left corner at (x, y).
    pub fn draw_image(&mut self, x: i32, y: i32, image: &RgbaImage) {
        image.enumerate_pixels().for_each(|(ix, iy, p)| {
            let [red, green, blue, alpha] = p.0;
            self.blend(
                x + ix as i32,
                y + iy as i32,
                Color::rgb(red, green, blue),
                alpha,
            );
        });
    }

    #[cfg(test)]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.offset(x, y)
            .map(|j| Color::rgb(self.data[j + 2], self.data[j + 1], self.data[j]))
    }

    /// Copies the rows of a clipped region out as a packed BGRA byte array.
    #[must_use]
    pub fn region(&self, rect: Rect) -> Vec<u8> {
        let rect = rect.intersect(&self.bounds());
        let mut out = Vec::with_capacity((rect.width.max(0) * rect.height.max(0) * 4) as usize);
        for y in rect.y..rect.bottom() {
            let start = ((y * self.width + rect.x) * 4) as usize;
            out.extend_from_slice(&self.data[start..start + rect.width as usize * 4]);
        }
        out
    }
}

/// Something that knows how wide a string is once drawn.
pub trait Measure: Send + Sync {
    /// The advance width of the whole string in pixels.
    fn text_width(&self, text: &str) -> i32;
}

/// A drawable, presentable pixel area backed by a window.
///
/// The bar's surface is owned by the draw engine; every popup owns its own.
pub trait Surface: Send {
    /// The drawable area, always anchored at (0, 0).
    fn bounds(&self) -> Rect;
    /// The y coordinate text is drawn on so that it looks vertically centered.
    fn baseline(&self) -> i32;
    fn text_width(&self, text: &str) -> i32;
    fn fill_rect(&mut self, rect: Rect, color: Color);
    /// Draws `text` starting at `x` on the `baseline` and returns its width.
    fn draw_text(&mut self, x: i32, baseline: i32, color: Color, text: &str) -> i32;
    fn draw_image(&mut self, x: i32, y: i32, image: &RgbaImage);
    /// Pushes the given region of the framebuffer to the screen.
    ///
    /// # Errors
    /// Returns an error if the window is gone or the connection broke.
    fn present(&mut self, rect: Rect) -> Res;
    /// Unmaps the window and releases every resource tied to it.
    ///
    /// # Errors
    /// Returns an error if the resources were already released.
    fn destroy(self: Box<Self>) -> Res;
}

/// Creates surfaces for popup windows.
pub trait SurfaceFactory: Send + Sync {
    /// Creates and maps a new window covering `rect` in root coordinates.
    ///
    /// # Errors
    /// Returns an error if the window couldn't be created.
    fn create(&self, rect: Rect, background: Color) -> Result<Box<dyn Surface>, Error>;
}
