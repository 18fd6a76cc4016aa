use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use mta_core::error::{ConvertError, Result};
use mta_core::frame::{CharacterGrid, ColorGrid, LineEnding};

/// Write `grid` to `path` as plain text, one row per line.
///
/// # Errors
/// `Io` if the file cannot be created or written.
pub fn write_text(path: &Path, grid: &CharacterGrid, ending: LineEnding) -> Result<()> {
    std::fs::write(path, grid.to_text(ending)).map_err(|e| ConvertError::io(path, e))?;
    log::info!(
        "Texte écrit: {}x{} → {}",
        grid.width(),
        grid.height(),
        path.display()
    );
    Ok(())
}

/// Grid as text with a 24-bit foreground escape before each glyph whose
/// color differs from the previous one. Each row ends with a reset.
///
/// # Example
/// ```
/// use mta_core::color::Rgb;
/// use mta_core::frame::{CharacterGrid, ColorGrid, LineEnding};
/// use mta_export::text::render_ansi;
///
/// let mut chars = CharacterGrid::new(2, 1);
/// chars.set(0, 0, '#');
/// let mut colors = ColorGrid::new(2, 1);
/// colors.set(0, 0, Rgb::new(255, 0, 0));
/// colors.set(1, 0, Rgb::new(255, 0, 0));
/// let out = render_ansi(&chars, &colors, LineEnding::Lf);
/// assert_eq!(out, "\x1b[38;2;255;0;0m# \x1b[0m\n");
/// ```
#[must_use]
pub fn render_ansi(chars: &CharacterGrid, colors: &ColorGrid, ending: LineEnding) -> String {
    let mut out = String::with_capacity(chars.cells().len() * 4);
    for (row, color_row) in chars.rows().zip(colors.rows()) {
        let mut current = None;
        for (&ch, &color) in row.iter().zip(color_row) {
            if current != Some(color) {
                let _ = write!(out, "\x1b[38;2;{};{};{}m", color.r, color.g, color.b);
                current = Some(color);
            }
            out.push(ch);
        }
        out.push_str("\x1b[0m");
        out.push_str(ending.as_str());
    }
    out
}

/// Print a grid to `out`, colored when a color grid is given.
///
/// # Errors
/// `Io` (path `<stdout>`) if the stream is closed.
pub fn print_grid<W: Write>(
    out: &mut W,
    chars: &CharacterGrid,
    colors: Option<&ColorGrid>,
    ending: LineEnding,
) -> Result<()> {
    let text = match colors {
        Some(c) => render_ansi(chars, c, ending),
        None => chars.to_text(ending),
    };
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| ConvertError::io("<stdout>", e))
}
