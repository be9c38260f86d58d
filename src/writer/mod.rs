use std::fs;
use std::path::{Path, PathBuf};

use gdal::cpl::CslStringList;
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager, Metadata};
use tracing::debug;

use crate::codes::TAXONOMY_VERSION;
use crate::error::{Result, StratError};
use crate::model::{GridGeometry, Window, NODATA_VALUE};
use crate::pipeline::Product;
use crate::raster::{BlockSink, SinkProvider};

/// Single-band Int16 GeoTIFF written one block at a time.
pub struct GeoTiffBlockWriter {
    product: String,
    path: PathBuf,
    dataset: Option<Dataset>,
}

impl GeoTiffBlockWriter {
    /// Creates `path` on `geometry`'s grid with the pipeline no-data value
    /// and product metadata. An existing file is replaced.
    pub fn create(product: &str, path: &Path, geometry: &GridGeometry) -> Result<Self> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let options = creation_options(geometry)?;
        let mut dataset = driver.create_with_band_type_with_options::<i16, _>(
            path,
            geometry.cols,
            geometry.rows,
            1,
            &options,
        )?;

        dataset.set_geo_transform(&geometry.geo_transform)?;
        if !geometry.projection.is_empty() {
            dataset.set_projection(&geometry.projection)?;
        }
        dataset.rasterband(1)?.set_no_data_value(Some(NODATA_VALUE))?;
        dataset.set_metadata_item("PRODUCT", product, "")?;
        dataset.set_metadata_item("TAXONOMY_VERSION", TAXONOMY_VERSION, "")?;

        debug!("Created {} for {}", path.display(), product);
        Ok(Self {
            product: product.to_string(),
            path: path.to_path_buf(),
            dataset: Some(dataset),
        })
    }
}

/// LZW, BigTIFF, and a block layout matching the mask's where GTiff allows it.
fn creation_options(geometry: &GridGeometry) -> Result<CslStringList> {
    let mut options = CslStringList::new();
    options.set_name_value("COMPRESS", "LZW")?;
    options.set_name_value("BIGTIFF", "YES")?;

    let (block_cols, block_rows) = geometry.block_size;
    if block_cols == geometry.cols {
        options.set_name_value("BLOCKYSIZE", &block_rows.max(1).to_string())?;
    } else if block_cols % 16 == 0 && block_rows % 16 == 0 {
        options.set_name_value("TILED", "YES")?;
        options.set_name_value("BLOCKXSIZE", &block_cols.to_string())?;
        options.set_name_value("BLOCKYSIZE", &block_rows.to_string())?;
    }
    Ok(options)
}

impl BlockSink for GeoTiffBlockWriter {
    fn write_block(&mut self, window: Window, cells: &[i16]) -> Result<()> {
        let product = &self.product;
        let Some(dataset) = self.dataset.as_mut() else {
            return Err(StratError::Io(std::io::Error::other(format!(
                "{} is already closed",
                self.path.display()
            ))));
        };
        let block_write = |source| StratError::BlockWrite {
            product: product.clone(),
            window,
            source,
        };
        let mut band = dataset.rasterband(1).map_err(block_write)?;
        let mut buffer = Buffer::new(window.size(), cells.to_vec());
        band.write(window.offset(), window.size(), &mut buffer)
            .map_err(block_write)
    }

    /// Closes the dataset, flushing every pending block to disk.
    fn finish(&mut self) -> Result<()> {
        if let Some(dataset) = self.dataset.take() {
            dataset.close()?;
            debug!("Closed {}", self.path.display());
        }
        Ok(())
    }
}

/// Writes every product to its artifact path as a GeoTIFF.
#[derive(Debug, Default)]
pub struct GeoTiffSinkProvider;

impl GeoTiffSinkProvider {
    pub fn new() -> Self {
        Self
    }
}

impl SinkProvider for GeoTiffSinkProvider {
    fn create(&mut self, product: &Product, geometry: &GridGeometry) -> Result<Box<dyn BlockSink>> {
        let writer = GeoTiffBlockWriter::create(&product.id, &product.artifact, geometry)?;
        Ok(Box::new(writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NODATA;
    use tempfile::TempDir;

    fn gtiff_available() -> bool {
        DriverManager::get_driver_by_name("GTiff").is_ok()
    }

    fn grid(cols: usize, rows: usize, block_size: (usize, usize)) -> GridGeometry {
        GridGeometry {
            cols,
            rows,
            geo_transform: [250000.0, 10.0, 0.0, 1750000.0, 0.0, -10.0],
            projection: String::new(),
            block_size,
        }
    }

    #[test]
    fn test_write_blocks() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("nested").join("picea_sum_10m_3338.tif");
        let geometry = grid(3, 2, (3, 1));

        let mut writer = GeoTiffBlockWriter::create("picea_sum", &output_path, &geometry).unwrap();
        writer.write_block(Window::new(0, 0, 3, 1), &[1, 2, 3]).unwrap();
        writer.write_block(Window::new(0, 1, 3, 1), &[4, NODATA, 6]).unwrap();
        writer.finish().unwrap();

        assert!(output_path.exists());

        let dataset = Dataset::open(&output_path).unwrap();
        assert_eq!(dataset.raster_size(), (3, 2));
        assert_eq!(dataset.geo_transform().unwrap(), geometry.geo_transform);
        assert_eq!(
            dataset.metadata_item("TAXONOMY_VERSION", ""),
            Some(TAXONOMY_VERSION.to_string())
        );

        let band = dataset.rasterband(1).unwrap();
        assert_eq!(band.no_data_value(), Some(NODATA_VALUE));
        let (_, values) = band
            .read_as::<i16>((0, 0), (3, 2), (3, 2), None)
            .unwrap()
            .into_shape_and_vec();
        assert_eq!(values, vec![1, 2, 3, 4, NODATA, 6]);
    }

    #[test]
    fn test_write_after_finish_fails() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("closed.tif");

        let mut writer =
            GeoTiffBlockWriter::create("closed", &output_path, &grid(2, 1, (2, 1))).unwrap();
        writer.finish().unwrap();
        writer.finish().unwrap();
        assert!(writer.write_block(Window::new(0, 0, 2, 1), &[1, 2]).is_err());
    }

    #[test]
    fn test_tiled_options_for_square_blocks() {
        let options = creation_options(&grid(1024, 1024, (256, 256))).unwrap();
        assert_eq!(options.fetch_name_value("TILED"), Some("YES".to_string()));
        assert_eq!(options.fetch_name_value("BLOCKXSIZE"), Some("256".to_string()));

        let strips = creation_options(&grid(1000, 50, (1000, 1))).unwrap();
        assert_eq!(strips.fetch_name_value("TILED"), None);
        assert_eq!(strips.fetch_name_value("BLOCKYSIZE"), Some("1".to_string()));
    }
}
