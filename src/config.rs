//! Layer locations and run settings.

use std::path::{Path, PathBuf};

use crate::error::{Result, StratError};
use crate::layers::Layer;

/// File name suffix shared by every raster of the 10 m Alaska Albers grid.
pub const DEFAULT_SUFFIX: &str = "_10m_3338";

/// Default stem of the classification product.
pub const CLASSIFICATION_STEM: &str = "vegetation_type";

/// Progress cadence, in percent of blocks, for single-formula products.
pub const DERIVED_CADENCE: u32 = 10;

/// Progress cadence for the classification, which runs much longer per block.
pub const CLASSIFICATION_CADENCE: u32 = 1;

/// Maps logical layer names to raster files.
///
/// A layer named `stem` is looked up as `<dir>/<stem><suffix>.tif` in each
/// directory in turn; the first hit wins.
#[derive(Debug, Clone)]
pub struct LayerCatalog {
    dirs: Vec<PathBuf>,
    suffix: String,
}

impl LayerCatalog {
    pub fn new(dirs: Vec<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dirs,
            suffix: suffix.into(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Path of `stem` inside `dir`, whether or not it exists.
    pub fn path_in(&self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{stem}{}.tif", self.suffix))
    }

    /// Finds the raster for `layer`, or fails with `MissingLayer` naming the
    /// path expected in the first search directory.
    pub fn locate(&self, layer: Layer) -> Result<PathBuf> {
        self.locate_stem(layer.stem())
    }

    pub fn locate_stem(&self, stem: &str) -> Result<PathBuf> {
        if let Some(path) = self
            .dirs
            .iter()
            .map(|dir| self.path_in(dir, stem))
            .find(|path| path.is_file())
        {
            return Ok(path);
        }
        let expected = match self.dirs.first() {
            Some(dir) => self.path_in(dir, stem),
            None => PathBuf::from(format!("{stem}{}.tif", self.suffix)),
        };
        Err(StratError::MissingLayer {
            layer: stem.to_string(),
            path: expected,
        })
    }
}

/// Everything one pipeline run needs to know about the file system.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Binary domain mask; defines extent, grid and block windows.
    pub mask: PathBuf,
    /// Where primary layers are looked up.
    pub inputs: LayerCatalog,
    pub derived_dir: PathBuf,
    pub classified_dir: PathBuf,
    pub classification_stem: String,
}

impl PipelineConfig {
    pub fn new(
        mask: impl Into<PathBuf>,
        input_dirs: Vec<PathBuf>,
        derived_dir: impl Into<PathBuf>,
        classified_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mask: mask.into(),
            inputs: LayerCatalog::new(input_dirs, DEFAULT_SUFFIX),
            derived_dir: derived_dir.into(),
            classified_dir: classified_dir.into(),
            classification_stem: CLASSIFICATION_STEM.to_string(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.inputs = LayerCatalog::new(self.inputs.dirs().to_vec(), suffix);
        self
    }

    pub fn derived_artifact(&self, layer: Layer) -> PathBuf {
        self.inputs.path_in(&self.derived_dir, layer.stem())
    }

    pub fn classification_artifact(&self) -> PathBuf {
        self.inputs
            .path_in(&self.classified_dir, &self.classification_stem)
    }
}
