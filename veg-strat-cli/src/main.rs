use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use veg_strat::codes;
use veg_strat::config::{CLASSIFICATION_CADENCE, CLASSIFICATION_STEM, DEFAULT_SUFFIX};
use veg_strat::pipeline::{self, ProductStatus};
use veg_strat::progress::format_elapsed;
use veg_strat::reader::open_layers;
use veg_strat::rules::taxonomy;
use veg_strat::{GeoTiffSinkProvider, PipelineConfig, Product, Rule, RunContext};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Worker threads for per-cell evaluation (default: number of CPU cores)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set each raster's no-data to 0 and cells outside the domain to no-data
    Conform {
        /// Binary domain mask raster
        #[arg(short, long)]
        mask: PathBuf,

        /// Directory of co-registered input rasters
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },

    /// Compute the persisted derived metrics
    Derive {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output directory for derived metrics
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },

    /// Classify the domain into vegetation types
    Classify {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output directory for the classification
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// File stem of the classification raster
        #[arg(long, default_value = CLASSIFICATION_STEM)]
        name: String,
    },

    /// Derive, then classify
    Run {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output directory for derived metrics
        #[arg(long, value_name = "DIR")]
        derived: PathBuf,

        /// Output directory for the classification
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// File stem of the classification raster
        #[arg(long, default_value = CLASSIFICATION_STEM)]
        name: String,
    },

    /// List the rules that fire for one cell
    Explain {
        #[command(flatten)]
        inputs: InputArgs,

        /// Column of the cell in the mask grid
        #[arg(long)]
        col: usize,

        /// Row of the cell in the mask grid
        #[arg(long)]
        row: usize,
    },

    /// Print the classification codes and their labels
    Legend,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Binary domain mask raster
    #[arg(short, long)]
    mask: PathBuf,

    /// Directories searched for input layers, in order
    #[arg(short, long = "input", value_name = "DIR", required = true)]
    inputs: Vec<PathBuf>,

    /// File name suffix of every layer
    #[arg(long, default_value = DEFAULT_SUFFIX)]
    suffix: String,
}

impl InputArgs {
    fn config(&self, derived: PathBuf, output: PathBuf, name: &str) -> PipelineConfig {
        let mut config = PipelineConfig::new(&self.mask, self.inputs.clone(), derived, output)
            .with_suffix(self.suffix.as_str());
        config.classification_stem = name.to_string();
        config
    }
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("veg_strat=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let start_time = Instant::now();

    if let Some(threads) = cli.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    let mut ctx = RunContext::on_disk();
    let mut sinks = GeoTiffSinkProvider::new();

    match cli.command {
        Command::Conform {
            mask,
            input,
            output,
        } => {
            let count = pipeline::conform_dir(&mut ctx, &mask, &input, &output, &mut sinks)
                .with_context(|| format!("Failed to conform rasters in {}", input.display()))?;
            info!("Conformed {} rasters", count);
        }
        Command::Derive { inputs, output } => {
            let config = inputs.config(output.clone(), output, CLASSIFICATION_STEM);
            let layers = open_layers(&config.inputs, &config.mask, pipeline::derived_inputs())
                .context("Failed to open input layers")?;
            pipeline::derive_all(&mut ctx, &layers, &config, &mut sinks)
                .context("Failed to compute derived metrics")?;
        }
        Command::Classify {
            inputs,
            output,
            name,
        } => {
            let config = inputs.config(output.clone(), output, &name);
            let rules = taxonomy::rules();
            let layers = open_layers(
                &config.inputs,
                &config.mask,
                pipeline::classification_inputs(&rules),
            )
            .context("Failed to open input layers")?;
            let product = Product::new(name.as_str(), config.classification_artifact())
                .with_cadence(CLASSIFICATION_CADENCE);
            pipeline::classify(&mut ctx, &layers, &rules, &product, &mut sinks)
                .with_context(|| format!("Failed to classify {}", product.artifact.display()))?;
        }
        Command::Run {
            inputs,
            derived,
            output,
            name,
        } => {
            let config = inputs.config(derived, output, &name);
            pipeline::run(&mut ctx, &config, &taxonomy::rules(), &mut sinks)
                .context("Pipeline run failed")?;
        }
        Command::Explain { inputs, col, row } => {
            let config = inputs.config(PathBuf::new(), PathBuf::new(), CLASSIFICATION_STEM);
            let rules = taxonomy::rules();
            let layers = open_layers(
                &config.inputs,
                &config.mask,
                pipeline::classification_inputs(&rules),
            )
            .context("Failed to open input layers")?;
            let fired = pipeline::explain_cell(&layers, &rules, col, row)
                .with_context(|| format!("Failed to explain cell ({col}, {row})"))?;
            print_trace(&fired);
            return Ok(());
        }
        Command::Legend => {
            print_legend();
            return Ok(());
        }
    }

    for outcome in ctx.outcomes() {
        match &outcome.status {
            ProductStatus::Completed { blocks, elapsed } => info!(
                "{}: {} blocks in {}",
                outcome.product,
                blocks,
                format_elapsed(*elapsed)
            ),
            ProductStatus::Skipped => info!("{}: already complete", outcome.product),
        }
    }

    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}

fn print_trace(fired: &[&Rule]) {
    if fired.is_empty() {
        println!("no rule fired");
        return;
    }
    for rule in fired {
        let label = codes::label(rule.code).unwrap_or("unlabelled");
        println!("{:>8}  {:>4}  {}", rule.id, rule.code, label);
    }
}

fn print_legend() {
    println!("# taxonomy {}", codes::TAXONOMY_VERSION);
    for code in codes::ALL {
        if let Some(label) = codes::label(code) {
            println!("{code:>4}  {label}");
        }
    }
    println!("{:>4}  no data", codes::NO_DATA);
}
