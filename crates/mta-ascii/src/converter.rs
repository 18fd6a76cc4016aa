use mta_core::config::ConversionConfig;
use mta_core::error::Result;
use mta_core::frame::{CharacterGrid, ColorGrid, ConvertedFrame, PixelBuffer};

use crate::luminance::map_cell;
use crate::sampler::{CellGeometry, sample_cell};

/// Convert one pixel buffer to a character grid, plus a color grid when
/// `preserve_color` is set.
///
/// Pure: reads `buffer` and `config`, allocates the result, nothing else.
/// Safe to call from many threads at once.
///
/// # Errors
/// `InvalidConfig` from the cell sampler (bad parameters, degenerate grid).
///
/// # Example
/// ```
/// use mta_core::config::ConversionConfig;
/// use mta_core::frame::PixelBuffer;
/// use mta_ascii::converter::convert_frame;
///
/// let frame = convert_frame(&PixelBuffer::new(8, 8), &ConversionConfig::default(), 0).unwrap();
/// assert_eq!(frame.chars.width(), 8);
/// assert!(frame.chars.cells().iter().all(|&c| c == ' '));
/// assert!(frame.colors.is_none());
/// ```
pub fn convert_frame(
    buffer: &PixelBuffer,
    config: &ConversionConfig,
    index: usize,
) -> Result<ConvertedFrame> {
    let geom = CellGeometry::new(config, buffer.width(), buffer.height())?;
    let (cols, rows) = (geom.columns(), geom.rows());

    let mut chars = CharacterGrid::new(cols, rows);
    let mut colors = config.preserve_color.then(|| ColorGrid::new(cols, rows));

    for r in 0..rows {
        for c in 0..cols {
            let acc = sample_cell(buffer, &geom, c, r);
            chars.set(c, r, map_cell(&acc, &config.ramp, config.invert));
            if let Some(grid) = colors.as_mut() {
                grid.set(c, r, acc.mean_color());
            }
        }
    }

    Ok(ConvertedFrame {
        index,
        chars,
        colors,
    })
}
