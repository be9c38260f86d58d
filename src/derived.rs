//! Derived metric evaluator.
//!
//! Each derived layer is one closed-form elementwise formula over other
//! layers. Results are clipped at zero and then masked: every cell where
//! the domain mask is not 1 becomes [`NODATA_VALUE`]. Persisted metrics are
//! also written as standalone products, so their values are truncated to
//! the integer output type before anything else reads them.

use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, StratError};
use crate::layers::{Layer, LayerKind, LayerStack};
use crate::model::NODATA_VALUE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Written to its own product and consumed by the rules.
    Persisted,
    /// Handed to the rule engine only.
    RuleOnly,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formula {
    /// `a + b + ...`
    Sum(&'static [Layer]),
    /// `numerator / (d1 + d2 + ... + epsilon) * scale`
    Ratio {
        numerator: Layer,
        denominator: &'static [Layer],
        epsilon: f64,
        scale: f64,
    },
    /// `max(0, (p1 + p2 + ...) - (m1 + m2 + ...))`
    ClippedDifference {
        plus: &'static [Layer],
        minus: &'static [Layer],
    },
}

impl Formula {
    pub fn inputs(&self) -> Vec<Layer> {
        match self {
            Formula::Sum(layers) => layers.to_vec(),
            Formula::Ratio {
                numerator,
                denominator,
                ..
            } => {
                let mut inputs = vec![*numerator];
                inputs.extend(denominator.iter().copied().filter(|l| l != numerator));
                inputs
            }
            Formula::ClippedDifference { plus, minus } => {
                plus.iter().chain(minus.iter()).copied().collect()
            }
        }
    }

    fn cell(&self, slices: &[&[f64]], i: usize) -> f64 {
        let sum = |layers: &[Layer]| {
            layers
                .iter()
                .map(|layer| slices[layer.index()][i])
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a + v)))
                .unwrap_or(0.0)
        };
        match self {
            Formula::Sum(layers) => sum(layers),
            Formula::Ratio {
                numerator,
                denominator,
                epsilon,
                scale,
            } => slices[numerator.index()][i] / (sum(denominator) + epsilon) * scale,
            Formula::ClippedDifference { plus, minus } => sum(plus) - sum(minus),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metric {
    pub layer: Layer,
    pub formula: Formula,
    pub persistence: Persistence,
}

/// All derived metrics, ordered so that every metric follows its inputs.
pub const METRICS: [Metric; 18] = [
    Metric {
        layer: Layer::PiceaRatio,
        formula: Formula::Ratio {
            numerator: Layer::Picgla,
            denominator: &[Layer::Picgla, Layer::Picmar],
            epsilon: 0.01,
            scale: 100.0,
        },
        persistence: Persistence::Persisted,
    },
    Metric {
        layer: Layer::PiceaSum,
        formula: Formula::Sum(&[Layer::Picgla, Layer::Picmar]),
        persistence: Persistence::Persisted,
    },
    Metric {
        layer: Layer::DeciduousRatio,
        formula: Formula::Ratio {
            numerator: Layer::Brotre,
            denominator: &[Layer::Picgla, Layer::Picmar, Layer::Brotre],
            epsilon: 0.01,
            scale: 100.0,
        },
        persistence: Persistence::Persisted,
    },
    Metric {
        layer: Layer::AlderBirchWillow,
        formula: Formula::Sum(&[Layer::Alnus, Layer::Ndsalix, Layer::Betshr]),
        persistence: Persistence::Persisted,
    },
    Metric {
        layer: Layer::EricaceousDwarf,
        formula: Formula::Sum(&[Layer::Nerishr, Layer::Rhoshr, Layer::Vacvit]),
        persistence: Persistence::Persisted,
    },
    Metric {
        layer: Layer::WetlandIndicator,
        formula: Formula::Sum(&[Layer::Sphagn, Layer::Wetsed]),
        persistence: Persistence::Persisted,
    },
    Metric {
        layer: Layer::PicmarWetIndicator,
        formula: Formula::Sum(&[Layer::Erivag, Layer::Sphagn, Layer::Wetsed]),
        persistence: Persistence::Persisted,
    },
    Metric {
        layer: Layer::Herbaceous,
        formula: Formula::ClippedDifference {
            plus: &[Layer::Forb, Layer::Gramin],
            minus: &[Layer::Erivag, Layer::Wetsed],
        },
        persistence: Persistence::Persisted,
    },
    Metric {
        layer: Layer::ShrubTotal,
        formula: Formula::Sum(&[
            Layer::AlderBirchWillow,
            Layer::EricaceousDwarf,
            Layer::Vaculi,
            Layer::Dryas,
            Layer::Dsalix,
        ]),
        persistence: Persistence::RuleOnly,
    },
    Metric {
        layer: Layer::HerbaceousTotal,
        formula: Formula::Sum(&[Layer::Herbaceous, Layer::Mwcalama]),
        persistence: Persistence::RuleOnly,
    },
    Metric {
        layer: Layer::ForestDensity,
        formula: Formula::Sum(&[Layer::PiceaSum, Layer::Brotre]),
        persistence: Persistence::RuleOnly,
    },
    Metric {
        layer: Layer::DwarfShrubTotal,
        formula: Formula::Sum(&[Layer::Dsalix, Layer::Dryas, Layer::EricaceousDwarf]),
        persistence: Persistence::RuleOnly,
    },
    Metric {
        layer: Layer::BirchEricaceous,
        formula: Formula::Sum(&[Layer::Betshr, Layer::EricaceousDwarf, Layer::Vaculi]),
        persistence: Persistence::RuleOnly,
    },
    Metric {
        layer: Layer::WetCalamagrostis,
        formula: Formula::Sum(&[Layer::WetlandIndicator, Layer::Mwcalama]),
        persistence: Persistence::RuleOnly,
    },
    Metric {
        layer: Layer::AlderRatio,
        formula: Formula::Ratio {
            numerator: Layer::Alnus,
            denominator: &[Layer::Alnus, Layer::Ndsalix],
            epsilon: 0.1,
            scale: 1.0,
        },
        persistence: Persistence::RuleOnly,
    },
    Metric {
        layer: Layer::WillowRatio,
        formula: Formula::Ratio {
            numerator: Layer::Ndsalix,
            denominator: &[Layer::Betshr, Layer::Ndsalix],
            epsilon: 0.1,
            scale: 1.0,
        },
        persistence: Persistence::RuleOnly,
    },
    Metric {
        layer: Layer::EricaceousRatio,
        formula: Formula::Ratio {
            numerator: Layer::EricaceousDwarf,
            denominator: &[Layer::EricaceousDwarf, Layer::Dryas],
            epsilon: 0.1,
            scale: 1.0,
        },
        persistence: Persistence::RuleOnly,
    },
    Metric {
        layer: Layer::CalamagrostisRatio,
        formula: Formula::Ratio {
            numerator: Layer::Mwcalama,
            denominator: &[Layer::Mwcalama, Layer::Wetsed],
            epsilon: 0.1,
            scale: 1.0,
        },
        persistence: Persistence::RuleOnly,
    },
];

/// Definition of a derived layer, `None` for primary layers.
pub fn metric(layer: Layer) -> Option<&'static Metric> {
    METRICS.iter().find(|m| m.layer == layer)
}

/// Metrics written as their own products.
pub fn persisted() -> impl Iterator<Item = &'static Metric> {
    METRICS
        .iter()
        .filter(|m| m.persistence == Persistence::Persisted)
}

/// Every derived layer needed to compute `targets`, including the targets.
pub fn derived_closure(targets: &[Layer]) -> BTreeSet<Layer> {
    let mut needed = BTreeSet::new();
    let mut pending: Vec<Layer> = targets.to_vec();
    while let Some(layer) = pending.pop() {
        if let Some(metric) = metric(layer) {
            if needed.insert(layer) {
                pending.extend(metric.formula.inputs());
            }
        }
    }
    needed
}

/// Primary layers that must be read to compute `targets`.
pub fn primary_inputs(targets: &[Layer]) -> BTreeSet<Layer> {
    let mut primaries: BTreeSet<Layer> = targets
        .iter()
        .copied()
        .filter(|l| l.kind() == LayerKind::Primary)
        .collect();
    for layer in derived_closure(targets) {
        if let Some(metric) = metric(layer) {
            primaries.extend(
                metric
                    .formula
                    .inputs()
                    .into_iter()
                    .filter(|l| l.kind() == LayerKind::Primary),
            );
        }
    }
    primaries
}

impl Metric {
    /// Evaluates the formula over one block. Inputs must already be present
    /// in `stack`; `mask` is the domain mask block for the same window.
    pub fn evaluate(&self, stack: &LayerStack, mask: &[f64]) -> Result<Vec<f64>> {
        if mask.len() != stack.len() {
            return Err(StratError::ShapeMismatch {
                layer: format!("domain mask for {}", self.layer),
                expected: stack.len(),
                actual: mask.len(),
            });
        }
        let inputs = self.formula.inputs();
        stack.require(&inputs)?;
        let slices = stack.slices();
        let quantize = self.persistence == Persistence::Persisted;

        let values = mask
            .par_iter()
            .enumerate()
            .map(|(i, &inside)| {
                if inside != 1.0 {
                    return NODATA_VALUE;
                }
                let value = self.formula.cell(&slices, i).max(0.0);
                if quantize {
                    value.trunc()
                } else {
                    value
                }
            })
            .collect();
        Ok(values)
    }
}

/// Computes every derived layer `targets` depends on that is not already in
/// `stack`, in dependency order.
pub fn evaluate_into(stack: &mut LayerStack, targets: &[Layer], mask: &[f64]) -> Result<()> {
    let needed = derived_closure(targets);
    for metric in METRICS.iter().filter(|m| needed.contains(&m.layer)) {
        if stack.contains(metric.layer) {
            continue;
        }
        let values = metric.evaluate(stack, mask)?;
        debug!("Computed derived layer {}", metric.layer);
        stack.insert(metric.layer, values)?;
    }
    Ok(())
}
