use std::fmt;

/// Pipeline-wide no-data sentinel written to every product.
pub const NODATA: i16 = -32768;

/// `NODATA` as held in the `f64` block arrays.
pub const NODATA_VALUE: f64 = NODATA as f64;

const TRANSFORM_TOLERANCE: f64 = 1e-9;

/// Rectangular sub-region of the grid read, computed and written as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl Window {
    pub fn new(col_off: usize, row_off: usize, cols: usize, rows: usize) -> Self {
        Self {
            col_off,
            row_off,
            cols,
            rows,
        }
    }

    /// Number of cells in the window.
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// GDAL offset argument for this window.
    pub fn offset(&self) -> (isize, isize) {
        (self.col_off as isize, self.row_off as isize)
    }

    /// GDAL size argument for this window.
    pub fn size(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{} {}x{}]",
            self.col_off, self.row_off, self.cols, self.rows
        )
    }
}

/// Grid geometry shared by every layer consumed in one computation.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    pub cols: usize,
    pub rows: usize,
    pub geo_transform: [f64; 6],
    pub projection: String,
    /// Internal block size as (cols, rows).
    pub block_size: (usize, usize),
}

impl GridGeometry {
    /// Block windows in the order GDAL iterates them: block rows top to
    /// bottom, block columns left to right. Edge blocks are clipped to the
    /// raster extent.
    pub fn windows(&self) -> Vec<Window> {
        let (block_cols, block_rows) = (self.block_size.0.max(1), self.block_size.1.max(1));
        let mut windows = Vec::new();
        let mut row_off = 0;
        while row_off < self.rows {
            let rows = block_rows.min(self.rows - row_off);
            let mut col_off = 0;
            while col_off < self.cols {
                let cols = block_cols.min(self.cols - col_off);
                windows.push(Window::new(col_off, row_off, cols, rows));
                col_off += block_cols;
            }
            row_off += block_rows;
        }
        windows
    }

    pub fn cell_count(&self) -> usize {
        self.cols * self.rows
    }

    /// Checks that `other` lies on the same grid. Block size is not part of
    /// the comparison; windows always come from the reference raster.
    pub fn check_aligned(&self, other: &GridGeometry) -> std::result::Result<(), String> {
        if (self.cols, self.rows) != (other.cols, other.rows) {
            return Err(format!(
                "size {}x{} differs from reference {}x{}",
                other.cols, other.rows, self.cols, self.rows
            ));
        }
        let transform_differs = self
            .geo_transform
            .iter()
            .zip(other.geo_transform.iter())
            .any(|(a, b)| (a - b).abs() > TRANSFORM_TOLERANCE);
        if transform_differs {
            return Err(format!(
                "geotransform {:?} differs from reference {:?}",
                other.geo_transform, self.geo_transform
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(cols: usize, rows: usize, block: (usize, usize)) -> GridGeometry {
        GridGeometry {
            cols,
            rows,
            geo_transform: [0.0, 10.0, 0.0, 100.0, 0.0, -10.0],
            projection: String::new(),
            block_size: block,
        }
    }

    #[test]
    fn windows_cover_grid_once() {
        let grid = geometry(10, 7, (4, 3));
        let windows = grid.windows();

        assert_eq!(windows.len(), 9);
        assert_eq!(windows[0], Window::new(0, 0, 4, 3));
        assert_eq!(windows[2], Window::new(8, 0, 2, 3));
        assert_eq!(windows[8], Window::new(8, 6, 2, 1));

        let covered: usize = windows.iter().map(Window::len).sum();
        assert_eq!(covered, grid.cell_count());
    }

    #[test]
    fn strip_blocks_yield_row_windows() {
        let grid = geometry(5, 3, (5, 1));
        let windows = grid.windows();
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.cols == 5 && w.rows == 1));
    }

    #[test]
    fn alignment_rejects_shifted_transform() {
        let reference = geometry(4, 4, (2, 2));
        let mut shifted = reference.clone();
        shifted.geo_transform[0] = 5.0;

        assert!(reference.check_aligned(&reference.clone()).is_ok());
        assert!(reference.check_aligned(&shifted).is_err());
        assert!(reference.check_aligned(&geometry(4, 5, (2, 2))).is_err());
    }

    #[test]
    fn alignment_ignores_block_size() {
        let reference = geometry(4, 4, (2, 2));
        assert!(reference.check_aligned(&geometry(4, 4, (4, 1))).is_ok());
    }
}
