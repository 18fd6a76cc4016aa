use std::collections::HashMap;

use ab_glyph::{Font, FontRef, PxScale, point};
use mta_core::color::{BLACK, DARK_BACKGROUND, Rgb, WHITE};
use mta_core::error::{ConvertError, Result};
use mta_core::frame::{ConvertedFrame, PixelBuffer};
use rayon::prelude::*;

/// Colors used when drawing a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterStyle {
    pub background: Rgb,
    pub foreground: Rgb,
    /// Draw each glyph in its cell color when the frame carries one.
    pub cell_colors: bool,
}

impl RasterStyle {
    /// Dark background with white glyphs; inverted: white background with
    /// black glyphs.
    ///
    /// # Example
    /// ```
    /// use mta_core::color::{BLACK, WHITE};
    /// use mta_export::rasterizer::RasterStyle;
    /// let s = RasterStyle::new(true, false);
    /// assert_eq!((s.background, s.foreground), (WHITE, BLACK));
    /// ```
    #[must_use]
    pub fn new(invert: bool, cell_colors: bool) -> Self {
        let (background, foreground) = if invert {
            (WHITE, BLACK)
        } else {
            (DARK_BACKGROUND, WHITE)
        };
        Self {
            background,
            foreground,
            cell_colors,
        }
    }
}

/// Dessine une grille de caractères en pixels RGBA.
///
/// Les glyphes sont pré-rasterisés dans un atlas (masques alpha) à la
/// construction ; le rendu ne fait que composer.
pub struct Rasterizer {
    char_width: u32,
    char_height: u32,
    /// char → alpha mask of `char_width × char_height` bytes.
    glyph_cache: HashMap<char, Vec<u8>>,
    empty_glyph: Vec<u8>,
}

impl Rasterizer {
    /// Build the atlas for printable ASCII, Latin-1, block elements and
    /// any `extra` glyphs (the ramp in use).
    ///
    /// Cell width is the advance of `M`, height the font's line height.
    ///
    /// # Errors
    /// `Encode` if the font data cannot be parsed or the size is not positive.
    pub fn new(font_data: &[u8], font_size: f32, extra: &[char]) -> Result<Self> {
        if !(font_size.is_finite() && font_size > 0.0) {
            return Err(ConvertError::encode(format!(
                "font size must be positive, got {font_size}"
            )));
        }
        let font = FontRef::try_from_slice(font_data)
            .map_err(|e| ConvertError::encode(format!("invalid font data: {e}")))?;
        let scale = PxScale::from(font_size);

        let v_advance = font.ascent_unscaled() - font.descent_unscaled() + font.line_gap_unscaled();
        let height = (v_advance * scale.y / font.height_unscaled()).ceil() as u32;
        let m_advance = font.h_advance_unscaled(font.glyph_id('M'));
        let width = (m_advance * scale.x / font.height_unscaled()).ceil() as u32;

        let char_width = width.max(1);
        let char_height = height.max(1);
        let mut rasterizer = Self {
            char_width,
            char_height,
            glyph_cache: HashMap::new(),
            empty_glyph: vec![0u8; (char_width * char_height) as usize],
        };

        rasterizer.cache_chars(&font, scale, (32..=126).filter_map(char::from_u32));
        rasterizer.cache_chars(&font, scale, (0x00A0..=0x00FF).filter_map(char::from_u32));
        rasterizer.cache_chars(&font, scale, (0x2580..=0x259F).filter_map(char::from_u32));
        rasterizer.cache_chars(&font, scale, extra.iter().copied());

        log::debug!(
            "Rasterizer: cellule {char_width}x{char_height}px, {} glyphes en cache",
            rasterizer.glyph_cache.len()
        );
        Ok(rasterizer)
    }

    fn cache_chars(&mut self, font: &FontRef, scale: PxScale, chars: impl Iterator<Item = char>) {
        let ascent_px = font.ascent_unscaled() * scale.y / font.height_unscaled();
        for ch in chars {
            if self.glyph_cache.contains_key(&ch) {
                continue;
            }
            // glyph_id 0 = .notdef : on évite les boîtes « tofu » dans la sortie.
            let gid = font.glyph_id(ch);
            if gid.0 == 0 {
                continue;
            }

            let mut mask = vec![0u8; (self.char_width * self.char_height) as usize];
            let glyph = gid.with_scale_and_position(scale, point(0.0, ascent_px));
            if let Some(outline) = font.outline_glyph(glyph) {
                let bounds = outline.px_bounds();
                #[allow(clippy::cast_possible_wrap)]
                outline.draw(|x, y, v| {
                    let px = (x as i32 + bounds.min.x as i32).max(0) as u32;
                    let py = (y as i32 + bounds.min.y as i32).max(0) as u32;
                    if px < self.char_width && py < self.char_height {
                        let idx = (py * self.char_width + px) as usize;
                        mask[idx] = mask[idx].max((v * 255.0).round() as u8);
                    }
                });
            }
            self.glyph_cache.insert(ch, mask);
        }
    }

    #[must_use]
    pub fn cell_size(&self) -> (u32, u32) {
        (self.char_width, self.char_height)
    }

    /// Pixel size of a rendered `columns × rows` grid.
    #[must_use]
    pub fn target_dimensions(&self, columns: u32, rows: u32) -> (u32, u32) {
        (columns * self.char_width, rows * self.char_height)
    }

    /// Render into a freshly allocated buffer.
    ///
    /// # Errors
    /// See [`Rasterizer::render_into`].
    pub fn render(&self, frame: &ConvertedFrame, style: RasterStyle) -> Result<PixelBuffer> {
        let (w, h) = self.target_dimensions(frame.chars.width(), frame.chars.height());
        let mut out = PixelBuffer::new(w, h);
        self.render_into(frame, style, &mut out)?;
        Ok(out)
    }

    /// Render into `out`, which must match [`Rasterizer::target_dimensions`].
    /// Rows of cells are drawn in parallel.
    ///
    /// # Errors
    /// `Encode` on a size mismatch.
    pub fn render_into(
        &self,
        frame: &ConvertedFrame,
        style: RasterStyle,
        out: &mut PixelBuffer,
    ) -> Result<()> {
        let grid = &frame.chars;
        let (expected_w, expected_h) = self.target_dimensions(grid.width(), grid.height());
        if out.width() != expected_w || out.height() != expected_h {
            return Err(ConvertError::encode(format!(
                "raster buffer {}x{} does not match grid size {expected_w}x{expected_h}",
                out.width(),
                out.height()
            )));
        }
        if expected_w == 0 || expected_h == 0 {
            return Ok(());
        }

        let colors = frame.colors.as_ref().filter(|_| style.cell_colors);
        let cw = self.char_width as usize;
        let ch = self.char_height as usize;
        let stride = expected_w as usize * 4;
        let band_size = stride * ch;
        let bg = style.background;

        out.as_raw_mut()
            .par_chunks_exact_mut(band_size)
            .enumerate()
            .for_each(|(gy, band)| {
                let gy = gy as u32;
                for gx in 0..grid.width() {
                    let mask = self
                        .glyph_cache
                        .get(&grid.get(gx, gy))
                        .unwrap_or(&self.empty_glyph);
                    let fg = colors.map_or(style.foreground, |c| c.get(gx, gy));
                    let x0 = gx as usize * cw;

                    for cy in 0..ch {
                        let row = &mut band[cy * stride..(cy + 1) * stride];
                        for cx in 0..cw {
                            let a = u16::from(mask[cy * cw + cx]);
                            let blend = |f: u8, b: u8| {
                                ((u16::from(f) * a + u16::from(b) * (255 - a) + 127) / 255) as u8
                            };
                            let idx = (x0 + cx) * 4;
                            row[idx] = blend(fg.r, bg.r);
                            row[idx + 1] = blend(fg.g, bg.g);
                            row[idx + 2] = blend(fg.b, bg.b);
                            row[idx + 3] = 255;
                        }
                    }
                }
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::locate_font;
    use mta_core::frame::CharacterGrid;

    /// Rasterizer from the first system font, if the machine has one.
    fn system_rasterizer(size: f32) -> Option<Rasterizer> {
        let path = locate_font(None).ok()?;
        let data = std::fs::read(path).ok()?;
        Rasterizer::new(&data, size, &[]).ok()
    }

    #[test]
    fn garbage_font_is_encode_error() {
        let err = Rasterizer::new(b"not a font", 12.0, &[]).err().unwrap();
        assert!(matches!(err, ConvertError::Encode { .. }));
    }

    #[test]
    fn style_colors() {
        let dark = RasterStyle::new(false, true);
        assert_eq!(dark.background, DARK_BACKGROUND);
        assert_eq!(dark.foreground, WHITE);
        assert!(dark.cell_colors);
    }

    #[test]
    fn blank_grid_is_background() {
        let Some(r) = system_rasterizer(12.0) else {
            return;
        };
        let frame = ConvertedFrame {
            index: 0,
            chars: CharacterGrid::new(3, 2),
            colors: None,
        };
        let style = RasterStyle::new(false, false);
        let pb = r.render(&frame, style).unwrap();
        assert_eq!((pb.width(), pb.height()), r.target_dimensions(3, 2));
        assert!(pb.as_raw().chunks_exact(4).all(|px| px == [40, 42, 54, 255]));
    }

    #[test]
    fn glyph_draws_foreground() {
        let Some(r) = system_rasterizer(16.0) else {
            return;
        };
        let mut chars = CharacterGrid::new(1, 1);
        chars.set(0, 0, '@');
        let frame = ConvertedFrame {
            index: 0,
            chars,
            colors: None,
        };
        let pb = r.render(&frame, RasterStyle::new(true, false)).unwrap();
        // Black ink on white paper: some pixel must be darker than the page.
        assert!(pb.as_raw().chunks_exact(4).any(|px| px[0] < 128));
    }

    #[test]
    fn mismatched_buffer_rejected() {
        let Some(r) = system_rasterizer(12.0) else {
            return;
        };
        let frame = ConvertedFrame {
            index: 0,
            chars: CharacterGrid::new(2, 2),
            colors: None,
        };
        let mut wrong = PixelBuffer::new(1, 1);
        assert!(r.render_into(&frame, RasterStyle::new(false, false), &mut wrong).is_err());
    }
}
