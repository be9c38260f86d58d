pub mod codes;
pub mod config;
pub mod derived;
pub mod error;
pub mod layers;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod raster;
pub mod reader;
pub mod rules;
pub mod writer;

pub use config::{LayerCatalog, PipelineConfig};
pub use error::{Result, StratError};
pub use layers::{Layer, LayerStack};
pub use model::{GridGeometry, Window, NODATA};
pub use pipeline::{Product, ProductOutcome, ProductStatus, RunContext};
pub use reader::{GdalLayer, LayerSet};
pub use rules::{Rule, RuleSet};
pub use writer::{GeoTiffBlockWriter, GeoTiffSinkProvider};
