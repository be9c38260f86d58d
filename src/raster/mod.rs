//! Block-wise raster access.
//!
//! [`LayerReader`] is the read side of one co-registered input layer,
//! [`BlockSink`] the write side of one output product. GDAL-backed
//! implementations live in [`crate::reader`] and [`crate::writer`]; the
//! in-memory ones in [`memory`] drive the tests.

pub mod memory;

use crate::error::Result;
use crate::model::{GridGeometry, Window};
use crate::pipeline::Product;

pub trait LayerReader {
    /// Logical name used in logs and errors.
    fn name(&self) -> &str;

    fn geometry(&self) -> &GridGeometry;

    /// The layer's own no-data value, if it declares one.
    fn nodata(&self) -> Option<f64>;

    /// Raw cell values of `window`, row-major.
    fn read(&self, window: Window) -> Result<Vec<f64>>;

    /// Like [`read`](Self::read), with the layer's own no-data replaced by
    /// 0 so that missing cover counts as no cover.
    fn read_normalized(&self, window: Window) -> Result<Vec<f64>> {
        let mut values = self.read(window)?;
        if let Some(nodata) = self.nodata() {
            values
                .iter_mut()
                .filter(|v| **v == nodata)
                .for_each(|v| *v = 0.0);
        }
        Ok(values)
    }
}

/// Destination of one product's blocks.
pub trait BlockSink {
    fn write_block(&mut self, window: Window, cells: &[i16]) -> Result<()>;

    /// Flushes and closes the product. No further writes follow.
    fn finish(&mut self) -> Result<()>;
}

/// Creates the sink of a product on the grid of the domain mask.
pub trait SinkProvider {
    fn create(&mut self, product: &Product, geometry: &GridGeometry) -> Result<Box<dyn BlockSink>>;
}

/// Converts a block of computed values to output cells. Values are already
/// integral or get truncated toward zero; out-of-range values saturate.
pub fn to_cells(values: &[f64]) -> Vec<i16> {
    values.iter().map(|&v| v as i16).collect()
}
