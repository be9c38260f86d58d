//! Block orchestrator.
//!
//! Every product is computed the same way: the window list comes from the
//! domain mask, each window is computed independently, cells outside the
//! mask are overwritten with [`NODATA`], and the block goes to the product's
//! sink. A product whose completion marker is already recorded is skipped
//! without touching its artifact; the marker is only recorded once the last
//! block has been flushed.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::codes::{Code, NOT_ASSIGNED, NO_DATA, TAXONOMY_VERSION};
use crate::config::{PipelineConfig, CLASSIFICATION_CADENCE, DERIVED_CADENCE};
use crate::derived::{self, Metric};
use crate::error::{Result, StratError};
use crate::layers::Layer;
use crate::model::{Window, NODATA};
use crate::progress::{LogProgress, Progress, ProgressObserver};
use crate::raster::{to_cells, LayerReader, SinkProvider};
use crate::reader::{self, check_alignment, GdalLayer, LayerSet};
use crate::rules::{Rule, RuleSet};

/// One output raster of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub artifact: PathBuf,
    /// Progress reporting step in percent of blocks.
    pub cadence: u32,
}

impl Product {
    pub fn new(id: impl Into<String>, artifact: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            artifact: artifact.into(),
            cadence: DERIVED_CADENCE,
        }
    }

    pub fn with_cadence(mut self, cadence: u32) -> Self {
        self.cadence = cadence;
        self
    }
}

/// Records which products are fully written.
pub trait CompletionStore {
    fn is_complete(&self, product: &Product) -> Result<bool>;

    fn mark_complete(&mut self, product: &Product) -> Result<()>;

    /// Forgets any earlier completion of `product`.
    fn clear(&mut self, product: &Product) -> Result<()>;
}

/// Completion markers stored next to each artifact as `<artifact>.done`.
#[derive(Debug, Default)]
pub struct MarkerFiles;

impl MarkerFiles {
    pub fn marker_path(artifact: &Path) -> PathBuf {
        let mut name = artifact
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".done");
        artifact.with_file_name(name)
    }
}

impl CompletionStore for MarkerFiles {
    fn is_complete(&self, product: &Product) -> Result<bool> {
        Ok(product.artifact.is_file() && Self::marker_path(&product.artifact).is_file())
    }

    fn mark_complete(&mut self, product: &Product) -> Result<()> {
        let marker = Self::marker_path(&product.artifact);
        fs::write(&marker, format!("{}\n{}\n", product.id, TAXONOMY_VERSION))?;
        Ok(())
    }

    fn clear(&mut self, product: &Product) -> Result<()> {
        match fs::remove_file(Self::marker_path(&product.artifact)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Completion records that live only as long as the run.
#[derive(Debug, Default)]
pub struct MemoryCompletion {
    done: BTreeSet<String>,
}

impl MemoryCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_complete(mut self, product: &str) -> Self {
        self.done.insert(product.to_string());
        self
    }
}

impl CompletionStore for MemoryCompletion {
    fn is_complete(&self, product: &Product) -> Result<bool> {
        Ok(self.done.contains(&product.id))
    }

    fn mark_complete(&mut self, product: &Product) -> Result<()> {
        self.done.insert(product.id.clone());
        Ok(())
    }

    fn clear(&mut self, product: &Product) -> Result<()> {
        self.done.remove(&product.id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProductStatus {
    Completed { blocks: usize, elapsed: Duration },
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductOutcome {
    pub product: String,
    pub status: ProductStatus,
}

/// State threaded through one pipeline run.
pub struct RunContext {
    completion: Box<dyn CompletionStore>,
    observer: Box<dyn ProgressObserver>,
    outcomes: Vec<ProductOutcome>,
}

impl RunContext {
    pub fn new(
        completion: impl CompletionStore + 'static,
        observer: impl ProgressObserver + 'static,
    ) -> Self {
        Self {
            completion: Box::new(completion),
            observer: Box::new(observer),
            outcomes: Vec::new(),
        }
    }

    /// Marker files on disk, progress through `tracing`.
    pub fn on_disk() -> Self {
        Self::new(MarkerFiles, LogProgress)
    }

    pub fn completion(&self) -> &dyn CompletionStore {
        self.completion.as_ref()
    }

    /// Outcome of every product handled so far, in order.
    pub fn outcomes(&self) -> &[ProductOutcome] {
        &self.outcomes
    }

    /// Streams one product over the mask's windows.
    ///
    /// `preflight` runs after the completion check and before the sink is
    /// created, so a failing check leaves no artifact behind. `compute`
    /// turns one window (and its mask block) into output cells.
    pub fn run_product<P, F>(
        &mut self,
        product: &Product,
        mask: &dyn LayerReader,
        sinks: &mut dyn SinkProvider,
        preflight: P,
        mut compute: F,
    ) -> Result<ProductStatus>
    where
        P: FnOnce() -> Result<()>,
        F: FnMut(Window, &[f64]) -> Result<Vec<i16>>,
    {
        if self.completion.is_complete(product)? {
            self.observer.skipped(&product.id);
            return Ok(self.record(product, ProductStatus::Skipped));
        }
        preflight()?;
        self.completion.clear(product)?;

        let geometry = mask.geometry();
        let windows = geometry.windows();
        let start = Instant::now();
        self.observer.started(&product.id, windows.len());

        let mut sink = sinks.create(product, geometry)?;
        let mut progress = Progress::new(windows.len(), product.cadence);
        for window in &windows {
            let mask_block = mask.read(*window)?;
            let mut cells = compute(*window, &mask_block)?;
            if cells.len() != window.len() {
                return Err(StratError::ShapeMismatch {
                    layer: product.id.clone(),
                    expected: window.len(),
                    actual: cells.len(),
                });
            }
            apply_mask(&mut cells, &mask_block);
            sink.write_block(*window, &cells)?;
            debug!("{}: wrote block {}", product.id, window);

            if let Some(percent) = progress.tick() {
                self.observer.progress(&product.id, percent);
            }
        }
        sink.finish()?;
        self.completion.mark_complete(product)?;

        let elapsed = start.elapsed();
        self.observer.finished(&product.id, elapsed);
        Ok(self.record(
            product,
            ProductStatus::Completed {
                blocks: windows.len(),
                elapsed,
            },
        ))
    }

    fn record(&mut self, product: &Product, status: ProductStatus) -> ProductStatus {
        self.outcomes.push(ProductOutcome {
            product: product.id.clone(),
            status: status.clone(),
        });
        status
    }
}

/// Sets every cell whose mask value is not exactly 1 to [`NODATA`].
pub fn apply_mask(cells: &mut [i16], mask: &[f64]) {
    for (cell, &inside) in cells.iter_mut().zip(mask) {
        if inside != 1.0 {
            *cell = NODATA;
        }
    }
}

/// Primary layers read by the persisted derived products.
pub fn derived_inputs() -> BTreeSet<Layer> {
    let targets: Vec<Layer> = derived::persisted().map(|m| m.layer).collect();
    derived::primary_inputs(&targets)
}

/// Primary layers read by the classification under `rules`.
pub fn classification_inputs(rules: &RuleSet) -> BTreeSet<Layer> {
    let required: Vec<Layer> = rules.required_layers().into_iter().collect();
    derived::primary_inputs(&required)
}

/// Writes one derived metric as its own product.
pub fn derive_metric(
    ctx: &mut RunContext,
    layers: &LayerSet,
    metric: &Metric,
    product: &Product,
    sinks: &mut dyn SinkProvider,
) -> Result<ProductStatus> {
    let primaries = derived::primary_inputs(&[metric.layer]);
    ctx.run_product(
        product,
        layers.mask(),
        sinks,
        || layers.require(&primaries),
        |window, mask| {
            let mut stack = layers.read_stack(window, &primaries)?;
            derived::evaluate_into(&mut stack, &[metric.layer], mask)?;
            Ok(to_cells(stack.get(metric.layer)?))
        },
    )
}

/// Writes every persisted derived metric into `config.derived_dir`.
pub fn derive_all(
    ctx: &mut RunContext,
    layers: &LayerSet,
    config: &PipelineConfig,
    sinks: &mut dyn SinkProvider,
) -> Result<()> {
    for metric in derived::persisted() {
        let product = Product::new(metric.layer.stem(), config.derived_artifact(metric.layer))
            .with_cadence(DERIVED_CADENCE);
        derive_metric(ctx, layers, metric, &product, sinks)?;
    }
    Ok(())
}

/// Classifies every cell of the domain with `rules`.
///
/// The state starts at 0 inside the mask and [`NO_DATA`] outside it. Derived
/// layers the rules read are computed per block from the primary layers,
/// persisted ones quantised exactly as their products are.
pub fn classify(
    ctx: &mut RunContext,
    layers: &LayerSet,
    rules: &RuleSet,
    product: &Product,
    sinks: &mut dyn SinkProvider,
) -> Result<ProductStatus> {
    let required: Vec<Layer> = rules.required_layers().into_iter().collect();
    let primaries = derived::primary_inputs(&required);
    ctx.run_product(
        product,
        layers.mask(),
        sinks,
        || layers.require(&primaries),
        |window, mask| {
            let mut stack = layers.read_stack(window, &primaries)?;
            derived::evaluate_into(&mut stack, &required, mask)?;
            let mut state: Vec<Code> = mask
                .iter()
                .map(|&inside| if inside == 1.0 { NOT_ASSIGNED } else { NO_DATA })
                .collect();
            rules.apply(&stack, &mut state)?;
            Ok(state)
        },
    )
}

/// Rules of `rules` that fire for the cell at `col`, `row`, in order.
/// Empty for a cell outside the domain mask.
pub fn explain_cell<'r>(
    layers: &LayerSet,
    rules: &'r RuleSet,
    col: usize,
    row: usize,
) -> Result<Vec<&'r Rule>> {
    let geometry = layers.geometry();
    if col >= geometry.cols || row >= geometry.rows {
        return Err(StratError::CellOutOfGrid {
            col,
            row,
            cols: geometry.cols,
            rows: geometry.rows,
        });
    }
    let window = Window::new(col, row, 1, 1);
    let mask = layers.mask().read(window)?;
    if mask.first() != Some(&1.0) {
        return Ok(Vec::new());
    }

    let required: Vec<Layer> = rules.required_layers().into_iter().collect();
    let primaries = derived::primary_inputs(&required);
    layers.require(&primaries)?;
    let mut stack = layers.read_stack(window, &primaries)?;
    derived::evaluate_into(&mut stack, &required, &mask)?;
    rules.trace(&stack, 0, NOT_ASSIGNED)
}

/// Copies `input` with its own no-data set to 0 and everything outside the
/// mask set to [`NODATA`].
pub fn conform_layer(
    ctx: &mut RunContext,
    mask: &dyn LayerReader,
    input: &dyn LayerReader,
    product: &Product,
    sinks: &mut dyn SinkProvider,
) -> Result<ProductStatus> {
    ctx.run_product(
        product,
        mask,
        sinks,
        || check_alignment(mask, input),
        |window, _| Ok(to_cells(&input.read_normalized(window)?)),
    )
}

/// Conforms every `.tif` in `input_dir` into `output_dir` under the same
/// file name. Returns the number of rasters handled.
pub fn conform_dir(
    ctx: &mut RunContext,
    mask_path: &Path,
    input_dir: &Path,
    output_dir: &Path,
    sinks: &mut dyn SinkProvider,
) -> Result<usize> {
    let mask = GdalLayer::open("domain mask", mask_path)?;
    let inputs = list_rasters(input_dir, mask_path)?;
    info!("Conforming {} rasters from {}", inputs.len(), input_dir.display());

    for path in &inputs {
        let (Some(stem), Some(file_name)) = (path.file_stem(), path.file_name()) else {
            continue;
        };
        let stem = stem.to_string_lossy().into_owned();
        let product = Product::new(stem.as_str(), output_dir.join(file_name))
            .with_cadence(DERIVED_CADENCE);
        let input = GdalLayer::open(stem, path)?;
        conform_layer(ctx, &mask, &input, &product, sinks)?;
    }
    Ok(inputs.len())
}

/// `.tif` files directly in `dir`, sorted, excluding `mask_path`.
fn list_rasters(dir: &Path, mask_path: &Path) -> Result<Vec<PathBuf>> {
    let mask = fs::canonicalize(mask_path).ok();
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_tif = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tif"));
        if !is_tif || !path.is_file() {
            continue;
        }
        if mask.is_some() && fs::canonicalize(&path).ok() == mask {
            continue;
        }
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}

/// Derived products, then the classification, on GeoTIFFs described by
/// `config`.
pub fn run(
    ctx: &mut RunContext,
    config: &PipelineConfig,
    rules: &RuleSet,
    sinks: &mut dyn SinkProvider,
) -> Result<()> {
    let mut inputs = derived_inputs();
    inputs.extend(classification_inputs(rules));
    let layers = reader::open_layers(&config.inputs, &config.mask, inputs)?;

    derive_all(ctx, &layers, config, sinks)?;
    let product = Product::new(
        config.classification_stem.as_str(),
        config.classification_artifact(),
    )
    .with_cadence(CLASSIFICATION_CADENCE);
    classify(ctx, &layers, rules, &product, sinks)?;
    Ok(())
}
