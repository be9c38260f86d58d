//! Named input arrays.
//!
//! Every array the derived metrics or the rule table can read is a
//! [`Layer`]. Primary layers come from co-registered input rasters,
//! derived layers are computed per block by [`crate::derived`].

use std::fmt;

use crate::error::{Result, StratError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    // foliar cover
    Alnus,
    Betshr,
    Bettre,
    Brotre,
    Dryas,
    Dsalix,
    Erivag,
    Forb,
    Gramin,
    Lichen,
    Mwcalama,
    Ndsalix,
    Nerishr,
    Picgla,
    Picmar,
    Poptre,
    Populbt,
    Rhoshr,
    Sphagn,
    Vaculi,
    Vacvit,
    Wetsed,
    // structure and ancillary
    Height,
    EsaCover,
    EsriCover,
    FireYear,
    Floodplain,
    Alkaline,
    Correction,
    // persisted derived metrics
    PiceaRatio,
    PiceaSum,
    DeciduousRatio,
    AlderBirchWillow,
    EricaceousDwarf,
    WetlandIndicator,
    PicmarWetIndicator,
    Herbaceous,
    // rule-only derived metrics
    ShrubTotal,
    HerbaceousTotal,
    ForestDensity,
    DwarfShrubTotal,
    BirchEricaceous,
    WetCalamagrostis,
    AlderRatio,
    WillowRatio,
    EricaceousRatio,
    CalamagrostisRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Primary,
    Derived,
}

impl Layer {
    pub const COUNT: usize = 47;

    pub const ALL: [Layer; Layer::COUNT] = [
        Layer::Alnus,
        Layer::Betshr,
        Layer::Bettre,
        Layer::Brotre,
        Layer::Dryas,
        Layer::Dsalix,
        Layer::Erivag,
        Layer::Forb,
        Layer::Gramin,
        Layer::Lichen,
        Layer::Mwcalama,
        Layer::Ndsalix,
        Layer::Nerishr,
        Layer::Picgla,
        Layer::Picmar,
        Layer::Poptre,
        Layer::Populbt,
        Layer::Rhoshr,
        Layer::Sphagn,
        Layer::Vaculi,
        Layer::Vacvit,
        Layer::Wetsed,
        Layer::Height,
        Layer::EsaCover,
        Layer::EsriCover,
        Layer::FireYear,
        Layer::Floodplain,
        Layer::Alkaline,
        Layer::Correction,
        Layer::PiceaRatio,
        Layer::PiceaSum,
        Layer::DeciduousRatio,
        Layer::AlderBirchWillow,
        Layer::EricaceousDwarf,
        Layer::WetlandIndicator,
        Layer::PicmarWetIndicator,
        Layer::Herbaceous,
        Layer::ShrubTotal,
        Layer::HerbaceousTotal,
        Layer::ForestDensity,
        Layer::DwarfShrubTotal,
        Layer::BirchEricaceous,
        Layer::WetCalamagrostis,
        Layer::AlderRatio,
        Layer::WillowRatio,
        Layer::EricaceousRatio,
        Layer::CalamagrostisRatio,
    ];

    /// File stem used for the layer's raster, e.g. `picea_ratio`.
    pub fn stem(self) -> &'static str {
        match self {
            Layer::Alnus => "alnus",
            Layer::Betshr => "betshr",
            Layer::Bettre => "bettre",
            Layer::Brotre => "brotre",
            Layer::Dryas => "dryas",
            Layer::Dsalix => "dsalix",
            Layer::Erivag => "erivag",
            Layer::Forb => "forb",
            Layer::Gramin => "gramin",
            Layer::Lichen => "lichen",
            Layer::Mwcalama => "mwcalama",
            Layer::Ndsalix => "ndsalix",
            Layer::Nerishr => "nerishr",
            Layer::Picgla => "picgla",
            Layer::Picmar => "picmar",
            Layer::Poptre => "poptre",
            Layer::Populbt => "populbt",
            Layer::Rhoshr => "rhoshr",
            Layer::Sphagn => "sphagn",
            Layer::Vaculi => "vaculi",
            Layer::Vacvit => "vacvit",
            Layer::Wetsed => "wetsed",
            Layer::Height => "height",
            Layer::EsaCover => "esacover",
            Layer::EsriCover => "esricover",
            Layer::FireYear => "fireyear",
            Layer::Floodplain => "floodplain",
            Layer::Alkaline => "alkaline",
            Layer::Correction => "correction",
            Layer::PiceaRatio => "picea_ratio",
            Layer::PiceaSum => "picea_sum",
            Layer::DeciduousRatio => "deciduous_ratio",
            Layer::AlderBirchWillow => "alder_birch_willow",
            Layer::EricaceousDwarf => "ericaceous_dwarf",
            Layer::WetlandIndicator => "wetland_indicator",
            Layer::PicmarWetIndicator => "picmar_wet_indicator",
            Layer::Herbaceous => "herbaceous",
            Layer::ShrubTotal => "shrub_total",
            Layer::HerbaceousTotal => "herbaceous_total",
            Layer::ForestDensity => "forest_density",
            Layer::DwarfShrubTotal => "dwarf_shrub_total",
            Layer::BirchEricaceous => "birch_ericaceous",
            Layer::WetCalamagrostis => "wet_calamagrostis",
            Layer::AlderRatio => "alder_ratio",
            Layer::WillowRatio => "willow_ratio",
            Layer::EricaceousRatio => "ericaceous_ratio",
            Layer::CalamagrostisRatio => "calamagrostis_ratio",
        }
    }

    pub fn kind(self) -> LayerKind {
        if self >= Layer::PiceaRatio {
            LayerKind::Derived
        } else {
            LayerKind::Primary
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// The arrays loaded for one block, indexed by [`Layer`].
#[derive(Debug, Clone)]
pub struct LayerStack {
    len: usize,
    arrays: Vec<Option<Vec<f64>>>,
}

impl LayerStack {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            arrays: vec![None; Layer::COUNT],
        }
    }

    /// Cells per array.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, layer: Layer, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len {
            return Err(StratError::ShapeMismatch {
                layer: layer.to_string(),
                expected: self.len,
                actual: values.len(),
            });
        }
        self.arrays[layer.index()] = Some(values);
        Ok(())
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.arrays[layer.index()].is_some()
    }

    pub fn get(&self, layer: Layer) -> Result<&[f64]> {
        self.arrays[layer.index()]
            .as_deref()
            .ok_or_else(|| StratError::MissingInput {
                layer: layer.to_string(),
            })
    }

    /// Fails with `MissingInput` naming the first absent layer.
    pub fn require<'a>(&self, layers: impl IntoIterator<Item = &'a Layer>) -> Result<()> {
        for layer in layers {
            self.get(*layer)?;
        }
        Ok(())
    }

    /// Borrowed per-layer slices for cell lookups; absent layers are empty.
    pub(crate) fn slices(&self) -> Vec<&[f64]> {
        self.arrays
            .iter()
            .map(|array| array.as_deref().unwrap_or(&[]))
            .collect()
    }
}
