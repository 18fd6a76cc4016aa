use std::fmt;

use crate::error::{ConvertError, Result};

/// 16 caractères : rampe par défaut, adoucie pour fond sombre.
pub const RAMP_DEFAULT: &str = " .^:~?7YJ5PG#&B@";

/// 10 caractères, compact.
pub const RAMP_COMPACT: &str = " .:-=+*#%@";

/// 70 caractères, Paul Bourke extended.
pub const RAMP_STANDARD: &str =
    " .'`^\",:;Il!i><~+_-?][}{1)(|/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

/// Blocs Unicode (pseudo-pixels).
pub const RAMP_BLOCKS: &str = " ░▒▓█";

/// Named presets accepted by [`GlyphRamp::preset`].
pub const PRESETS: &[(&str, &str)] = &[
    ("default", RAMP_DEFAULT),
    ("compact", RAMP_COMPACT),
    ("standard", RAMP_STANDARD),
    ("blocks", RAMP_BLOCKS),
];

/// Ordered glyph lookup table, darkest → lightest.
///
/// "Darkest" means least ink on a dark background: index 0 is drawn for
/// black cells. Immutable once built.
///
/// # Example
/// ```
/// use mta_core::ramp::GlyphRamp;
/// let ramp = GlyphRamp::new(" .:#@").unwrap();
/// assert_eq!(ramp.length(), 5);
/// assert_eq!(ramp.char_at(0), ' ');
/// assert_eq!(ramp.char_at(4), '@');
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct GlyphRamp {
    glyphs: Vec<char>,
}

impl GlyphRamp {
    /// Build a ramp from an ordered string of glyphs.
    ///
    /// # Errors
    /// `InvalidConfig` if `glyphs` is empty or holds a control character.
    pub fn new(glyphs: &str) -> Result<Self> {
        Self::from_chars(glyphs.chars().collect())
    }

    /// Build a ramp from an ordered list of glyphs.
    ///
    /// # Errors
    /// `InvalidConfig` if `glyphs` is empty or holds a control character.
    pub fn from_chars(glyphs: Vec<char>) -> Result<Self> {
        if glyphs.is_empty() {
            return Err(ConvertError::config("glyph ramp must not be empty"));
        }
        if let Some(bad) = glyphs.iter().find(|c| c.is_control()) {
            return Err(ConvertError::config(format!(
                "glyph ramp contains non-printable character {bad:?}"
            )));
        }
        Ok(Self { glyphs })
    }

    /// Look up a built-in ramp by name.
    ///
    /// # Errors
    /// `InvalidConfig` for an unknown name.
    ///
    /// # Example
    /// ```
    /// use mta_core::ramp::GlyphRamp;
    /// assert_eq!(GlyphRamp::preset("blocks").unwrap().length(), 5);
    /// assert!(GlyphRamp::preset("nope").is_err());
    /// ```
    pub fn preset(name: &str) -> Result<Self> {
        PRESETS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, glyphs)| Self {
                glyphs: glyphs.chars().collect(),
            })
            .ok_or_else(|| {
                let known: Vec<&str> = PRESETS.iter().map(|(n, _)| *n).collect();
                ConvertError::config(format!(
                    "unknown ramp preset '{name}' (known: {})",
                    known.join(", ")
                ))
            })
    }

    /// Resolve a user value: a preset name if one matches, otherwise the
    /// literal glyph sequence.
    ///
    /// # Errors
    /// `InvalidConfig` if the literal sequence is not a valid ramp.
    pub fn parse(value: &str) -> Result<Self> {
        Self::preset(value).or_else(|_| Self::new(value))
    }

    #[inline(always)]
    #[must_use]
    pub fn length(&self) -> usize {
        self.glyphs.len()
    }

    /// Glyph at `index`. Out-of-range indices clamp to the lightest glyph.
    #[inline(always)]
    #[must_use]
    pub fn char_at(&self, index: usize) -> char {
        self.glyphs[index.min(self.glyphs.len() - 1)]
    }

    #[must_use]
    pub fn darkest(&self) -> char {
        self.glyphs[0]
    }

    #[must_use]
    pub fn lightest(&self) -> char {
        self.glyphs[self.glyphs.len() - 1]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[char] {
        &self.glyphs
    }
}

impl Default for GlyphRamp {
    fn default() -> Self {
        Self {
            glyphs: RAMP_DEFAULT.chars().collect(),
        }
    }
}

impl fmt::Debug for GlyphRamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: String = self.glyphs.iter().collect();
        f.debug_tuple("GlyphRamp").field(&s).finish()
    }
}
