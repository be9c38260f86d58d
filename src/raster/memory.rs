//! In-memory rasters.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::rc::Rc;

use gdal::errors::GdalError;

use super::{BlockSink, LayerReader, SinkProvider};
use crate::error::{Result, StratError};
use crate::model::{GridGeometry, Window, NODATA};
use crate::pipeline::Product;

/// A whole layer held in a `Vec`, row-major.
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    name: String,
    geometry: GridGeometry,
    nodata: Option<f64>,
    values: Vec<f64>,
    fail_from_row: Option<usize>,
}

impl MemoryLayer {
    /// A `cols` x `rows` layer on a 10 m grid, tiled in single-row strips.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not hold exactly `cols * rows` cells.
    pub fn new(name: impl Into<String>, cols: usize, rows: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), cols * rows, "layer size does not match values");
        Self {
            name: name.into(),
            geometry: GridGeometry {
                cols,
                rows,
                geo_transform: [0.0, 10.0, 0.0, 0.0, 0.0, -10.0],
                projection: String::new(),
                block_size: (cols, 1),
            },
            nodata: None,
            values,
            fail_from_row: None,
        }
    }

    /// A layer with every cell set to `value`.
    pub fn filled(name: impl Into<String>, cols: usize, rows: usize, value: f64) -> Self {
        Self::new(name, cols, rows, vec![value; cols * rows])
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_block_size(mut self, cols: usize, rows: usize) -> Self {
        self.geometry.block_size = (cols, rows);
        self
    }

    pub fn with_geo_transform(mut self, geo_transform: [f64; 6]) -> Self {
        self.geometry.geo_transform = geo_transform;
        self
    }

    pub fn with_projection(mut self, wkt: impl Into<String>) -> Self {
        self.geometry.projection = wkt.into();
        self
    }

    /// Makes every read of a window starting at or below `row` fail.
    pub fn failing_from_row(mut self, row: usize) -> Self {
        self.fail_from_row = Some(row);
        self
    }
}

impl LayerReader for MemoryLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn read(&self, window: Window) -> Result<Vec<f64>> {
        if self.fail_from_row.is_some_and(|row| window.row_off >= row) {
            return Err(StratError::BlockRead {
                layer: self.name.clone(),
                window,
                source: GdalError::BadArgument(format!("row {} is unreadable", window.row_off)),
            });
        }
        let cols = self.geometry.cols;
        let mut out = Vec::with_capacity(window.len());
        for row in window.row_off..window.row_off + window.rows {
            let start = row * cols + window.col_off;
            out.extend_from_slice(&self.values[start..start + window.cols]);
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    rasters: BTreeMap<String, (GridGeometry, Vec<i16>)>,
    writes: usize,
    fail_on: Option<String>,
    fail_finish: Option<String>,
}

/// Collects every product written through it. Clones share storage, so a
/// test can keep one handle while the pipeline owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every block write of `product` fail.
    pub fn fail_writes_to(&self, product: &str) {
        self.inner.borrow_mut().fail_on = Some(product.to_string());
    }

    /// Makes closing `product` fail after all its blocks were accepted.
    pub fn fail_finish_of(&self, product: &str) {
        self.inner.borrow_mut().fail_finish = Some(product.to_string());
    }

    /// Block writes across all products so far.
    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }

    pub fn products(&self) -> Vec<String> {
        self.inner.borrow().rasters.keys().cloned().collect()
    }

    /// Cells of a written product, row-major.
    pub fn cells(&self, product: &str) -> Option<Vec<i16>> {
        self.inner
            .borrow()
            .rasters
            .get(product)
            .map(|(_, cells)| cells.clone())
    }

    /// A written product, readable as an input layer.
    pub fn layer(&self, product: &str) -> Option<MemoryLayer> {
        let inner = self.inner.borrow();
        let (geometry, cells) = inner.rasters.get(product)?;
        let values = cells.iter().map(|&c| f64::from(c)).collect();
        let mut layer = MemoryLayer::new(product, geometry.cols, geometry.rows, values)
            .with_nodata(f64::from(NODATA));
        layer.geometry = geometry.clone();
        Some(layer)
    }
}

impl SinkProvider for MemoryStore {
    fn create(&mut self, product: &Product, geometry: &GridGeometry) -> Result<Box<dyn BlockSink>> {
        self.inner.borrow_mut().rasters.insert(
            product.id.clone(),
            (geometry.clone(), vec![0; geometry.cell_count()]),
        );
        Ok(Box::new(MemorySink {
            store: self.clone(),
            product: product.id.clone(),
            cols: geometry.cols,
        }))
    }
}

struct MemorySink {
    store: MemoryStore,
    product: String,
    cols: usize,
}

impl BlockSink for MemorySink {
    fn write_block(&mut self, window: Window, cells: &[i16]) -> Result<()> {
        let mut inner = self.store.inner.borrow_mut();
        if inner.fail_on.as_deref() == Some(self.product.as_str()) {
            return Err(StratError::Io(io::Error::other(format!(
                "write of block {window} rejected"
            ))));
        }
        inner.writes += 1;
        let (_, raster) = inner
            .rasters
            .get_mut(&self.product)
            .ok_or_else(|| StratError::Io(io::Error::other("product was not created")))?;
        for (r, row) in cells.chunks(window.cols).enumerate() {
            let start = (window.row_off + r) * self.cols + window.col_off;
            raster[start..start + window.cols].copy_from_slice(row);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.store.inner.borrow().fail_finish.as_deref() == Some(self.product.as_str()) {
            return Err(StratError::Io(io::Error::other(format!(
                "closing {} failed",
                self.product
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_sub_windows() {
        let layer = MemoryLayer::new("x", 3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(layer.read(Window::new(1, 0, 2, 2)).unwrap(), vec![2.0, 3.0, 5.0, 6.0]);
    }

    #[test]
    fn sink_places_blocks_by_window() {
        let mut store = MemoryStore::new();
        let geometry = MemoryLayer::filled("mask", 3, 2, 1.0).geometry().clone();
        let product = Product::new("p", "p.tif");

        let mut sink = store.create(&product, &geometry).unwrap();
        sink.write_block(Window::new(2, 0, 1, 2), &[7, 8]).unwrap();
        sink.write_block(Window::new(0, 1, 2, 1), &[4, 5]).unwrap();
        sink.finish().unwrap();

        assert_eq!(store.cells("p").unwrap(), vec![0, 0, 7, 4, 5, 8]);
        assert_eq!(store.writes(), 2);
    }
}
