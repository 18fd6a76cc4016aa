/// BT.601 luma weights, scaled by 1000 for integer accumulation.
pub const LUMA_WEIGHTS: (u32, u32, u32) = (299, 587, 114);

/// Sum of [`LUMA_WEIGHTS`] times the channel maximum.
pub const LUMA_SCALE: u32 = 1000 * 255;

/// Background used behind white glyphs in rasterized output.
pub const DARK_BACKGROUND: Rgb = Rgb::new(40, 42, 54);
/// Pure white.
pub const WHITE: Rgb = Rgb::new(255, 255, 255);
/// Pure black.
pub const BLACK: Rgb = Rgb::new(0, 0, 0);

/// An 8-bit RGB triple.
///
/// # Example
/// ```
/// use mta_core::color::Rgb;
/// let c = Rgb::new(255, 128, 0);
/// assert_eq!(c.to_array(), [255, 128, 0]);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Weighted luma of this color, in `[0, LUMA_SCALE]`.
    ///
    /// # Example
    /// ```
    /// use mta_core::color::{Rgb, LUMA_SCALE};
    /// assert_eq!(Rgb::new(255, 255, 255).weighted_luma(), LUMA_SCALE);
    /// assert_eq!(Rgb::new(0, 0, 0).weighted_luma(), 0);
    /// ```
    #[inline(always)]
    #[must_use]
    pub fn weighted_luma(self) -> u32 {
        let (wr, wg, wb) = LUMA_WEIGHTS;
        u32::from(self.r) * wr + u32::from(self.g) * wg + u32::from(self.b) * wb
    }

    /// Normalized perceptual luminance in `[0.0, 1.0]`.
    #[must_use]
    pub fn luminance(self) -> f64 {
        f64::from(self.weighted_luma()) / f64::from(LUMA_SCALE)
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self { r, g, b }
    }
}

/// Running sums over a set of pixels: weighted luma plus raw channels.
///
/// Integer accumulation keeps an all-white cell at exactly 1.0.
#[derive(Clone, Copy, Debug, Default)]
pub struct ColorAccumulator {
    luma: u64,
    r: u64,
    g: u64,
    b: u64,
    count: u64,
}

impl ColorAccumulator {
    #[inline(always)]
    pub fn push(&mut self, color: Rgb) {
        self.luma += u64::from(color.weighted_luma());
        self.r += u64::from(color.r);
        self.g += u64::from(color.g);
        self.b += u64::from(color.b);
        self.count += 1;
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean luminance in `[0.0, 1.0]`; 0.0 when empty.
    #[must_use]
    pub fn mean_luminance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.luma as f64 / (u64::from(LUMA_SCALE) * self.count) as f64
    }

    /// `floor(mean_luminance × (len − 1))` computed on the integer sums, so
    /// bucket edges land exactly. 0 when empty or `len` ≤ 1.
    ///
    /// # Example
    /// ```
    /// use mta_core::color::{ColorAccumulator, Rgb};
    /// let mut acc = ColorAccumulator::default();
    /// acc.push(Rgb::new(155, 155, 155));
    /// assert_eq!(acc.ramp_index(52), 31);
    /// ```
    #[inline(always)]
    #[must_use]
    pub fn ramp_index(&self, len: usize) -> usize {
        let last = len.saturating_sub(1);
        if self.count == 0 || last == 0 {
            return 0;
        }
        let den = u128::from(LUMA_SCALE) * u128::from(self.count);
        let idx = u128::from(self.luma) * last as u128 / den;
        (idx as usize).min(last)
    }

    /// Per-channel unweighted mean, rounded to nearest.
    #[must_use]
    pub fn mean_color(&self) -> Rgb {
        if self.count == 0 {
            return BLACK;
        }
        let avg = |sum: u64| ((sum + self.count / 2) / self.count).min(255) as u8;
        Rgb::new(avg(self.r), avg(self.g), avg(self.b))
    }
}
