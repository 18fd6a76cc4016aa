use mta_core::color::ColorAccumulator;
use mta_core::config::ConversionConfig;
use mta_core::error::{ConvertError, Result};
use mta_core::frame::PixelBuffer;

/// Partition of a source image into output cells.
///
/// Cell width is `scale_down` pixels, cell height `aspect × scale_down`.
/// Remainder pixels at the right and bottom edges belong to no cell.
///
/// # Example
/// ```
/// use mta_core::config::ConversionConfig;
/// use mta_ascii::sampler::CellGeometry;
///
/// let config = ConversionConfig::default();
/// let geom = CellGeometry::new(&config, 4, 4).unwrap();
/// assert_eq!((geom.columns(), geom.rows()), (4, 2));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellGeometry {
    cell_width: f64,
    cell_height: f64,
    columns: u32,
    rows: u32,
}

impl CellGeometry {
    /// Compute the grid for an image of `width × height` pixels.
    ///
    /// # Errors
    /// `InvalidConfig` if the config is invalid, a cell would be smaller
    /// than one pixel, or the grid would have no rows or columns.
    pub fn new(config: &ConversionConfig, width: u32, height: u32) -> Result<Self> {
        config.validate()?;
        let (cell_width, cell_height) = config.cell_size();
        if cell_width < 1.0 || cell_height < 1.0 {
            return Err(ConvertError::config(format!(
                "cell size {cell_width:.3}×{cell_height:.3} px is below one pixel \
                 (scale_down {}, aspect {:.3})",
                config.scale_down,
                config.aspect()
            )));
        }
        let columns = (f64::from(width) / cell_width).floor() as u32;
        let rows = (f64::from(height) / cell_height).floor() as u32;
        if columns == 0 || rows == 0 {
            return Err(ConvertError::config(format!(
                "image {width}×{height} yields an empty {columns}×{rows} grid \
                 for cell size {cell_width:.3}×{cell_height:.3} px"
            )));
        }
        Ok(Self {
            cell_width,
            cell_height,
            columns,
            rows,
        })
    }

    #[inline]
    #[must_use]
    pub fn columns(&self) -> u32 {
        self.columns
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[must_use]
    pub fn cell_size(&self) -> (f64, f64) {
        (self.cell_width, self.cell_height)
    }

    /// Source columns covered by cell column `c`, half-open.
    #[inline]
    #[must_use]
    pub fn x_span(&self, c: u32) -> (u32, u32) {
        span(c, self.cell_width)
    }

    /// Source rows covered by cell row `r`, half-open.
    #[inline]
    #[must_use]
    pub fn y_span(&self, r: u32) -> (u32, u32) {
        span(r, self.cell_height)
    }
}

#[inline]
fn span(index: u32, size: f64) -> (u32, u32) {
    let start = (f64::from(index) * size).floor() as u32;
    let end = (f64::from(index + 1) * size).floor() as u32;
    (start, end)
}

/// Aggregate every pixel covered by cell `(c, r)`.
///
/// The returned accumulator holds the mean luminance and, if wanted, the
/// mean color of the cell.
#[must_use]
pub fn sample_cell(buffer: &PixelBuffer, geom: &CellGeometry, c: u32, r: u32) -> ColorAccumulator {
    let (x0, x1) = geom.x_span(c);
    let (y0, y1) = geom.y_span(r);
    let x1 = x1.min(buffer.width());
    let y1 = y1.min(buffer.height());

    let mut acc = ColorAccumulator::default();
    for y in y0..y1 {
        for x in x0..x1 {
            acc.push(buffer.color(x, y));
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_core::color::{Rgb, WHITE};

    fn config(scale_down: f32, aspect: f32) -> ConversionConfig {
        ConversionConfig::default()
            .with_scale_down(scale_down)
            .with_cell_aspect(Some(aspect))
    }

    #[test]
    fn remainder_pixels_discarded() {
        let geom = CellGeometry::new(&config(3.0, 1.0), 10, 7).unwrap();
        assert_eq!((geom.columns(), geom.rows()), (3, 2));
        assert_eq!(geom.x_span(2), (6, 9));
    }

    #[test]
    fn fractional_cells_tile_without_gaps() {
        let geom = CellGeometry::new(&config(1.5, 1.0), 9, 3).unwrap();
        let spans: Vec<_> = (0..geom.columns()).map(|c| geom.x_span(c)).collect();
        assert_eq!(spans, vec![(0, 1), (1, 3), (3, 4), (4, 6), (6, 7), (7, 9)]);
    }

    #[test]
    fn sub_pixel_cell_rejected() {
        let err = CellGeometry::new(&config(0.5, 1.0), 10, 10).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn cell_wider_than_image_rejected() {
        let err = CellGeometry::new(&config(11.0, 1.0), 10, 100).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn zero_rows_rejected() {
        // 2 px tall image, cells 1.818 px tall → 1 row; 1 px tall → 0 rows.
        assert!(CellGeometry::new(&ConversionConfig::default(), 5, 2).is_ok());
        assert!(CellGeometry::new(&ConversionConfig::default(), 5, 1).is_err());
    }

    #[test]
    fn sample_averages_cell() {
        let mut pb = PixelBuffer::new(2, 2);
        pb.set_pixel(0, 0, WHITE);
        pb.set_pixel(1, 1, Rgb::new(100, 0, 0));
        let geom = CellGeometry::new(&config(2.0, 1.0), 2, 2).unwrap();
        let acc = sample_cell(&pb, &geom, 0, 0);
        assert_eq!(acc.count(), 4);
        assert_eq!(acc.mean_color(), Rgb::new(89, 64, 64));
        assert!((acc.mean_luminance() - 0.25 - 0.299 * 100.0 / 255.0 / 4.0).abs() < 1e-9);
    }
}
