use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::error::{ConvertError, Result};

/// Decoded image, RGBA row-major, 4 bytes par pixel.
///
/// Read-only input to the converter; owned by the decoder or caller.
///
/// # Example
/// ```
/// use mta_core::frame::PixelBuffer;
/// let pb = PixelBuffer::new(10, 4);
/// assert_eq!(pb.as_raw().len(), 10 * 4 * 4);
/// assert_eq!(pb.pixel(0, 0), (0, 0, 0, 255));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Opaque black buffer of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Rgb::default())
    }

    /// Opaque buffer where every pixel is `color`.
    #[must_use]
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        let [r, g, b] = color.to_array();
        let data = [r, g, b, 255].repeat(width as usize * height as usize);
        Self {
            data,
            width,
            height,
        }
    }

    /// Wrap raw RGBA samples.
    ///
    /// # Errors
    /// `InvalidConfig` if `data.len() != width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        check_len(width, height, 4, data.len())?;
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Copy raw RGB samples, adding an opaque alpha channel.
    ///
    /// # Errors
    /// `InvalidConfig` if `data.len() != width * height * 3`.
    ///
    /// # Example
    /// ```
    /// use mta_core::frame::PixelBuffer;
    /// let pb = PixelBuffer::from_rgb(1, 1, &[10, 20, 30]).unwrap();
    /// assert_eq!(pb.pixel(0, 0), (10, 20, 30, 255));
    /// ```
    pub fn from_rgb(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        check_len(width, height, 3, data.len())?;
        let mut rgba = Vec::with_capacity(data.len() / 3 * 4);
        for px in data.chunks_exact(3) {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
        Ok(Self {
            data: rgba,
            width,
            height,
        })
    }

    #[inline(always)]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Mutable RGBA samples, for writers rendering in place.
    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Accès au pixel (x, y) → (r, g, b, a).
    #[inline(always)]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8, u8) {
        debug_assert!(x < self.width && y < self.height, "pixel out of bounds");
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        (
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        )
    }

    /// Color at (x, y) with alpha premultiplied: transparent reads as black.
    #[inline(always)]
    #[must_use]
    pub fn color(&self, x: u32, y: u32) -> Rgb {
        let (r, g, b, a) = self.pixel(x, y);
        if a == 255 {
            return Rgb::new(r, g, b);
        }
        let mul = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        Rgb::new(mul(r), mul(g), mul(b))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb) {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.data[idx..idx + 4].copy_from_slice(&[color.r, color.g, color.b, 255]);
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

fn check_len(width: u32, height: u32, channels: usize, len: usize) -> Result<()> {
    let expected = width as usize * height as usize * channels;
    if len == expected {
        Ok(())
    } else {
        Err(ConvertError::config(format!(
            "pixel data for {width}×{height}×{channels} must be {expected} bytes, got {len}"
        )))
    }
}

/// Input rotation applied by the decoders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    Clockwise90,
    Rotate180,
    CounterClockwise90,
}

impl Rotation {
    /// Map the CLI index (0 = 90° clockwise, 1 = 180°, 2 = 90° counter-clockwise).
    ///
    /// # Errors
    /// `InvalidConfig` for any other index.
    pub fn from_index(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Self::Clockwise90),
            1 => Ok(Self::Rotate180),
            2 => Ok(Self::CounterClockwise90),
            n => Err(ConvertError::config(format!(
                "rotate must be 0, 1 or 2, got {n}"
            ))),
        }
    }
}

/// Line terminator used when a grid is written as text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// Rectangular grid of glyphs, row-major.
///
/// # Example
/// ```
/// use mta_core::frame::CharacterGrid;
/// let mut grid = CharacterGrid::new(3, 2);
/// grid.set(1, 0, '@');
/// assert_eq!(grid.get(1, 0), '@');
/// assert_eq!(grid.to_string(), " @ \n   \n");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CharacterGrid {
    cells: Vec<char>,
    width: u32,
    height: u32,
}

impl CharacterGrid {
    /// Grid of spaces.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            cells: vec![' '; width as usize * height as usize],
            width,
            height,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    pub fn set(&mut self, x: u32, y: u32, ch: char) {
        self.cells[y as usize * self.width as usize + x as usize] = ch;
    }

    #[inline(always)]
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> char {
        self.cells[y as usize * self.width as usize + x as usize]
    }

    /// Rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[char]> {
        self.cells.chunks_exact(self.width.max(1) as usize)
    }

    #[must_use]
    pub fn cells(&self) -> &[char] {
        &self.cells
    }

    /// Rows joined by `ending`, with a trailing terminator.
    #[must_use]
    pub fn to_text(&self, ending: LineEnding) -> String {
        let mut out = String::with_capacity(self.cells.len() + self.height as usize * 2);
        for row in self.rows() {
            out.extend(row.iter());
            out.push_str(ending.as_str());
        }
        out
    }
}

impl fmt::Display for CharacterGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(LineEnding::Lf))
    }
}

impl fmt::Debug for CharacterGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharacterGrid {}×{}\n{self}", self.width, self.height)
    }
}

/// Per-cell average colors, same shape as the [`CharacterGrid`] it accompanies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorGrid {
    colors: Vec<Rgb>,
    width: u32,
    height: u32,
}

impl ColorGrid {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            colors: vec![Rgb::default(); width as usize * height as usize],
            width,
            height,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    pub fn set(&mut self, x: u32, y: u32, color: Rgb) {
        self.colors[y as usize * self.width as usize + x as usize] = color;
    }

    #[inline(always)]
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Rgb {
        self.colors[y as usize * self.width as usize + x as usize]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Rgb]> {
        self.colors.chunks_exact(self.width.max(1) as usize)
    }
}

/// One converted image or video frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertedFrame {
    /// Index of the source frame this was converted from.
    pub index: usize,
    pub chars: CharacterGrid,
    /// Present only when color preservation was requested.
    pub colors: Option<ColorGrid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_length_mismatch_rejected() {
        let err = PixelBuffer::from_rgb(2, 2, &[0; 11]).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn transparent_pixel_reads_black() {
        let pb = PixelBuffer::from_rgba(1, 1, vec![255, 255, 255, 0]).unwrap();
        assert_eq!(pb.color(0, 0), Rgb::new(0, 0, 0));
    }

    #[test]
    fn half_alpha_premultiplies() {
        let pb = PixelBuffer::from_rgba(1, 1, vec![200, 100, 0, 128]).unwrap();
        assert_eq!(pb.color(0, 0), Rgb::new(100, 50, 0));
    }

    #[test]
    fn rotation_index_bounds() {
        assert_eq!(Rotation::from_index(1).unwrap(), Rotation::Rotate180);
        assert!(Rotation::from_index(3).is_err());
    }

    #[test]
    fn text_uses_line_ending() {
        let grid = CharacterGrid::new(2, 2);
        assert_eq!(grid.to_text(LineEnding::CrLf), "  \r\n  \r\n");
    }

    #[test]
    fn rows_are_rectangular() {
        let grid = CharacterGrid::new(5, 3);
        assert_eq!(grid.rows().count(), 3);
        assert!(grid.rows().all(|r| r.len() == 5));
    }
}
