use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use gdal::spatial_ref::SpatialRef;
use gdal::Dataset;
use tracing::{debug, warn};

use crate::config::LayerCatalog;
use crate::error::{Result, StratError};
use crate::layers::{Layer, LayerStack};
use crate::model::{GridGeometry, Window};
use crate::raster::LayerReader;

/// Band 1 of a GDAL raster, read block by block.
pub struct GdalLayer {
    name: String,
    dataset: Dataset,
    geometry: GridGeometry,
    nodata: Option<f64>,
}

impl GdalLayer {
    /// Opens `path`. A file that does not exist is a `MissingLayer` error
    /// rather than a GDAL open failure.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let name = name.into();
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StratError::MissingLayer {
                layer: name,
                path: path.to_path_buf(),
            });
        }

        let dataset = Dataset::open(path)?;
        let (cols, rows) = dataset.raster_size();
        let geo_transform = dataset.geo_transform()?;
        let projection = dataset.projection();
        let (block_size, nodata) = {
            let band = dataset.rasterband(1)?;
            (band.block_size(), band.no_data_value())
        };

        debug!(
            "Opened {} ({}x{}, block {}x{}, nodata {:?})",
            path.display(),
            cols,
            rows,
            block_size.0,
            block_size.1,
            nodata
        );

        Ok(Self {
            name,
            dataset,
            geometry: GridGeometry {
                cols,
                rows,
                geo_transform,
                projection,
                block_size,
            },
            nodata,
        })
    }
}

impl LayerReader for GdalLayer {
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
        let block_read = |source| StratError::BlockRead {
            layer: self.name.clone(),
            window,
            source,
        };
        let band = self.dataset.rasterband(1).map_err(block_read)?;
        let buffer = band
            .read_as::<f64>(window.offset(), window.size(), window.size(), None)
            .map_err(block_read)?;
        let (_, values) = buffer.into_shape_and_vec();
        Ok(values)
    }
}

/// The domain mask plus every input layer of one computation, all checked
/// to lie on the mask's grid.
pub struct LayerSet {
    mask: Box<dyn LayerReader>,
    layers: BTreeMap<Layer, Box<dyn LayerReader>>,
}

impl LayerSet {
    pub fn new(mask: Box<dyn LayerReader>) -> Self {
        Self {
            mask,
            layers: BTreeMap::new(),
        }
    }

    /// Adds `reader` as `layer`. Fails with `LayerGeometryMismatch` if its
    /// size or geotransform differs from the mask's.
    pub fn insert(&mut self, layer: Layer, reader: Box<dyn LayerReader>) -> Result<()> {
        check_alignment(self.mask.as_ref(), reader.as_ref())?;
        self.layers.insert(layer, reader);
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, layer: Layer, reader: impl LayerReader + 'static) -> Result<Self> {
        self.insert(layer, Box::new(reader))?;
        Ok(self)
    }

    pub fn mask(&self) -> &dyn LayerReader {
        self.mask.as_ref()
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.mask.geometry()
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.layers.contains_key(&layer)
    }

    /// Fails with `MissingInput` naming the first layer not in the set.
    pub fn require<'a>(&self, layers: impl IntoIterator<Item = &'a Layer>) -> Result<()> {
        match layers.into_iter().find(|layer| !self.contains(**layer)) {
            Some(layer) => Err(StratError::MissingInput {
                layer: layer.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Reads `layers` for `window`, normalised, into a fresh stack.
    pub fn read_stack(&self, window: Window, layers: &BTreeSet<Layer>) -> Result<LayerStack> {
        let mut stack = LayerStack::new(window.len());
        for layer in layers {
            let reader = self
                .layers
                .get(layer)
                .ok_or_else(|| StratError::MissingInput {
                    layer: layer.to_string(),
                })?;
            stack.insert(*layer, reader.read_normalized(window)?)?;
        }
        Ok(stack)
    }
}

/// Fails with `LayerGeometryMismatch` unless `layer` lies on `mask`'s grid
/// in the same coordinate system.
pub fn check_alignment(mask: &dyn LayerReader, layer: &dyn LayerReader) -> Result<()> {
    let mismatch = |reason| StratError::LayerGeometryMismatch {
        layer: layer.name().to_string(),
        reason,
    };
    mask.geometry()
        .check_aligned(layer.geometry())
        .map_err(mismatch)?;

    let (reference, other) = (&mask.geometry().projection, &layer.geometry().projection);
    if reference.is_empty() != other.is_empty() {
        warn!(
            "{} or the mask has no coordinate system; assuming they match",
            layer.name()
        );
    } else if !same_crs(reference, other)? {
        return Err(mismatch(format!(
            "coordinate system differs from the mask's: {other}"
        )));
    }
    if mask.geometry().block_size != layer.geometry().block_size {
        warn!(
            "{} is tiled {:?}, mask is tiled {:?}; reading on mask blocks",
            layer.name(),
            layer.geometry().block_size,
            mask.geometry().block_size
        );
    }
    Ok(())
}

/// Textually equal WKT matches without parsing; anything else is compared
/// by GDAL.
fn same_crs(reference: &str, other: &str) -> Result<bool> {
    if reference == other {
        return Ok(true);
    }
    Ok(SpatialRef::from_wkt(reference)? == SpatialRef::from_wkt(other)?)
}

/// Opens the domain mask and `layers` from `catalog`.
pub fn open_layers(
    catalog: &LayerCatalog,
    mask_path: &Path,
    layers: impl IntoIterator<Item = Layer>,
) -> Result<LayerSet> {
    let mask = GdalLayer::open("domain mask", mask_path)?;
    let mut set = LayerSet::new(Box::new(mask));
    for layer in layers {
        let path = catalog.locate(layer)?;
        set.insert(layer, Box::new(GdalLayer::open(layer.stem(), path)?))?;
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::memory::MemoryLayer;
    use tempfile::TempDir;

    #[test]
    fn rejects_misaligned_layer() {
        let mask = MemoryLayer::filled("mask", 4, 4, 1.0);
        let shifted =
            MemoryLayer::filled("alnus", 4, 4, 0.0).with_geo_transform([10.0, 10.0, 0.0, 0.0, 0.0, -10.0]);
        let wrong_size = MemoryLayer::filled("betshr", 4, 3, 0.0);

        let mut set = LayerSet::new(Box::new(mask));
        let err = set.insert(Layer::Alnus, Box::new(shifted)).unwrap_err();
        assert!(matches!(err, StratError::LayerGeometryMismatch { ref layer, .. } if layer == "alnus"));
        let err = set.insert(Layer::Betshr, Box::new(wrong_size)).unwrap_err();
        assert!(matches!(err, StratError::LayerGeometryMismatch { .. }));
    }

    const WGS84: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#;
    const NAD27: &str = r#"GEOGCS["NAD27",DATUM["North_American_Datum_1927",SPHEROID["Clarke 1866",6378206.4,294.978698213898]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#;

    #[test]
    fn rejects_layer_in_other_coordinate_system() {
        let mask = MemoryLayer::filled("mask", 2, 2, 1.0).with_projection(WGS84);
        let same = MemoryLayer::filled("alnus", 2, 2, 0.0).with_projection(WGS84);
        let other = MemoryLayer::filled("betshr", 2, 2, 0.0).with_projection(NAD27);

        assert!(check_alignment(&mask, &same).is_ok());
        let err = check_alignment(&mask, &other).unwrap_err();
        assert!(matches!(err, StratError::LayerGeometryMismatch { ref layer, .. } if layer == "betshr"));
    }

    #[test]
    fn missing_coordinate_system_is_tolerated() {
        let mask = MemoryLayer::filled("mask", 2, 2, 1.0).with_projection(WGS84);
        let bare = MemoryLayer::filled("alnus", 2, 2, 0.0);
        assert!(check_alignment(&mask, &bare).is_ok());
    }

    #[test]
    fn accepts_different_tiling() {
        let mask = MemoryLayer::filled("mask", 4, 4, 1.0).with_block_size(2, 2);
        let layer = MemoryLayer::filled("alnus", 4, 4, 0.0);
        assert!(LayerSet::new(Box::new(mask)).with(Layer::Alnus, layer).is_ok());
    }

    #[test]
    fn stack_is_normalised() {
        let mask = MemoryLayer::filled("mask", 2, 1, 1.0);
        let set = LayerSet::new(Box::new(mask))
            .with(
                Layer::Alnus,
                MemoryLayer::new("alnus", 2, 1, vec![255.0, 4.0]).with_nodata(255.0),
            )
            .unwrap();
        let layers: BTreeSet<Layer> = [Layer::Alnus].into_iter().collect();

        let stack = set.read_stack(Window::new(0, 0, 2, 1), &layers).unwrap();
        assert_eq!(stack.get(Layer::Alnus).unwrap(), &[0.0, 4.0]);
        assert!(set.require(&[Layer::Alnus]).is_ok());
        assert!(matches!(
            set.require(&[Layer::Alnus, Layer::Height]),
            Err(StratError::MissingInput { .. })
        ));
    }

    #[test]
    fn missing_file_is_missing_layer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alnus_10m_3338.tif");
        match GdalLayer::open("alnus", &path) {
            Err(StratError::MissingLayer { layer, path: p }) => {
                assert_eq!(layer, "alnus");
                assert_eq!(p, path);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a file that does not exist"),
        }
    }
}
