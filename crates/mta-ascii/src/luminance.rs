use mta_core::color::ColorAccumulator;
use mta_core::ramp::GlyphRamp;

/// Ramp index for a luminance value.
///
/// `floor(lum × (len − 1))` clamped to the ramp; `invert` reflects the index
/// so dark cells get the lightest glyphs. Non-finite input maps to 0.
///
/// # Example
/// ```
/// use mta_ascii::luminance::glyph_index;
/// assert_eq!(glyph_index(0.0, 16, false), 0);
/// assert_eq!(glyph_index(1.0, 16, false), 15);
/// assert_eq!(glyph_index(0.5, 16, false), 7);
/// assert_eq!(glyph_index(0.0, 16, true), 15);
/// ```
#[inline(always)]
#[must_use]
pub fn glyph_index(luminance: f64, ramp_len: usize, invert: bool) -> usize {
    let last = ramp_len.saturating_sub(1);
    let lum = if luminance.is_finite() {
        luminance.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let idx = ((lum * last as f64).floor() as usize).min(last);
    if invert { last - idx } else { idx }
}

/// Glyph for a luminance value.
#[inline(always)]
#[must_use]
pub fn map_glyph(luminance: f64, ramp: &GlyphRamp, invert: bool) -> char {
    ramp.char_at(glyph_index(luminance, ramp.length(), invert))
}

/// Glyph for an aggregated cell.
///
/// Same mapping as [`map_glyph`] but evaluated on the integer luma sums, so
/// a cell whose exact luminance sits on a bucket edge never drops one glyph.
#[inline(always)]
#[must_use]
pub fn map_cell(cell: &ColorAccumulator, ramp: &GlyphRamp, invert: bool) -> char {
    let len = ramp.length();
    let idx = cell.ramp_index(len);
    let idx = if invert { len - 1 - idx } else { idx };
    ramp.char_at(idx)
}
