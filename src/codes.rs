//! Classification codes of the vegetation type taxonomy.

use crate::model::NODATA;

/// A cell's classification state.
pub type Code = i16;

/// Version of the rule table and thresholds in [`crate::rules::taxonomy`].
pub const TAXONOMY_VERSION: &str = "2025.04";

pub const NOT_ASSIGNED: Code = 0;
pub const NO_DATA: Code = NODATA;

// growth habit
pub const CONIFEROUS: Code = 1;
pub const DECIDUOUS: Code = 2;
pub const MIXED_TREES: Code = 3;
pub const SHRUB_MESIC: Code = 4;
pub const SHRUB_WET: Code = 5;
pub const HERBACEOUS_MESIC: Code = 6;
pub const HERBACEOUS_WET: Code = 7;

// spruce forest & woodland
pub const SPRUCE_LICHEN_WOODLAND: Code = 10;
pub const WHITE_SPRUCE_WOODLAND: Code = 11;
pub const WHITE_SPRUCE_FOREST: Code = 12;
pub const BLACK_SPRUCE_WOODLAND: Code = 13;
pub const BLACK_SPRUCE_FOREST: Code = 14;
pub const MIXED_SPRUCE_WOODLAND: Code = 15;
pub const MIXED_SPRUCE_FOREST: Code = 16;
pub const BLACK_SPRUCE_TUSSOCK: Code = 17;
pub const BLACK_SPRUCE_PEATLAND: Code = 18;

// deciduous forest
pub const POPLAR_FOREST: Code = 20;
pub const ASPEN_FOREST: Code = 21;
pub const BIRCH_FOREST: Code = 22;

// spruce-hardwood forest & woodland
pub const WHITE_SPRUCE_POPLAR: Code = 30;
pub const WHITE_SPRUCE_ASPEN: Code = 31;
pub const WHITE_SPRUCE_BIRCH: Code = 32;
pub const BLACK_SPRUCE_DECIDUOUS: Code = 33;
pub const MIXED_SPRUCE_BIRCH: Code = 34;

// tussock tundra
pub const TUSSOCK_LOW_SHRUB: Code = 40;
pub const TUSSOCK_DWARF_SHRUB: Code = 41;

// shrub mesic
pub const ALDER_MESIC: Code = 50;
pub const ALDER_WILLOW_MESIC: Code = 51;
pub const WILLOW_MESIC: Code = 52;
pub const BIRCH_WILLOW_MESIC: Code = 53;
pub const BIRCH_ERICACEOUS_MESIC: Code = 54;
pub const DWARF_SHRUB_LICHEN: Code = 55;
pub const ERICACEOUS_DWARF_SHRUB: Code = 56;
pub const DRYAS_ERICACEOUS_DWARF_SHRUB: Code = 57;
pub const DRYAS_WILLOW_DWARF_SHRUB: Code = 58;

// shrub wet
pub const SHRUB_SPHAGNUM_WET: Code = 60;
pub const DWARF_SHRUB_SPHAGNUM_WET: Code = 61;
pub const ALDER_WILLOW_WET: Code = 62;
pub const WILLOW_WET: Code = 63;
pub const BIRCH_WILLOW_WET: Code = 64;

// herbaceous mesic
pub const CALAMAGROSTIS_MESIC: Code = 70;
pub const MEADOW_MESIC_ALKALINE: Code = 71;
pub const MEADOW_MESIC_ACIDIC: Code = 72;

// herbaceous wet
pub const SEDGE_WET: Code = 80;
pub const SEDGE_CALAMAGROSTIS_WET: Code = 81;
pub const MEADOW_WET: Code = 82;

// fire
pub const BURNED: Code = 90;
pub const RECOVERING_MESIC: Code = 91;
pub const RECOVERING_WET: Code = 92;

// sparse or barren
pub const DEVELOPED: Code = 95;
pub const BARREN: Code = 96;
pub const SNOW_ICE: Code = 97;
pub const WATER: Code = 98;

// floodplain
pub const WHITE_SPRUCE_FLOODPLAIN: Code = 100;
pub const POPLAR_FLOODPLAIN: Code = 101;
pub const BIRCH_FLOODPLAIN: Code = 102;
pub const ALDER_WILLOW_FLOODPLAIN: Code = 103;
pub const WILLOW_FLOODPLAIN: Code = 104;

/// Every code of the taxonomy, in ascending order.
pub const ALL: [Code; 59] = [
    NOT_ASSIGNED,
    CONIFEROUS,
    DECIDUOUS,
    MIXED_TREES,
    SHRUB_MESIC,
    SHRUB_WET,
    HERBACEOUS_MESIC,
    HERBACEOUS_WET,
    SPRUCE_LICHEN_WOODLAND,
    WHITE_SPRUCE_WOODLAND,
    WHITE_SPRUCE_FOREST,
    BLACK_SPRUCE_WOODLAND,
    BLACK_SPRUCE_FOREST,
    MIXED_SPRUCE_WOODLAND,
    MIXED_SPRUCE_FOREST,
    BLACK_SPRUCE_TUSSOCK,
    BLACK_SPRUCE_PEATLAND,
    POPLAR_FOREST,
    ASPEN_FOREST,
    BIRCH_FOREST,
    WHITE_SPRUCE_POPLAR,
    WHITE_SPRUCE_ASPEN,
    WHITE_SPRUCE_BIRCH,
    BLACK_SPRUCE_DECIDUOUS,
    MIXED_SPRUCE_BIRCH,
    TUSSOCK_LOW_SHRUB,
    TUSSOCK_DWARF_SHRUB,
    ALDER_MESIC,
    ALDER_WILLOW_MESIC,
    WILLOW_MESIC,
    BIRCH_WILLOW_MESIC,
    BIRCH_ERICACEOUS_MESIC,
    DWARF_SHRUB_LICHEN,
    ERICACEOUS_DWARF_SHRUB,
    DRYAS_ERICACEOUS_DWARF_SHRUB,
    DRYAS_WILLOW_DWARF_SHRUB,
    SHRUB_SPHAGNUM_WET,
    DWARF_SHRUB_SPHAGNUM_WET,
    ALDER_WILLOW_WET,
    WILLOW_WET,
    BIRCH_WILLOW_WET,
    CALAMAGROSTIS_MESIC,
    MEADOW_MESIC_ALKALINE,
    MEADOW_MESIC_ACIDIC,
    SEDGE_WET,
    SEDGE_CALAMAGROSTIS_WET,
    MEADOW_WET,
    BURNED,
    RECOVERING_MESIC,
    RECOVERING_WET,
    DEVELOPED,
    BARREN,
    SNOW_ICE,
    WATER,
    WHITE_SPRUCE_FLOODPLAIN,
    POPLAR_FLOODPLAIN,
    BIRCH_FLOODPLAIN,
    ALDER_WILLOW_FLOODPLAIN,
    WILLOW_FLOODPLAIN,
];

/// Human-readable label of a code, for legends only.
pub fn label(code: Code) -> Option<&'static str> {
    let label = match code {
        NOT_ASSIGNED => "not assigned",
        CONIFEROUS => "coniferous trees",
        DECIDUOUS => "deciduous trees",
        MIXED_TREES => "mixed trees",
        SHRUB_MESIC => "shrub mesic",
        SHRUB_WET => "shrub wet",
        HERBACEOUS_MESIC => "herbaceous mesic",
        HERBACEOUS_WET => "herbaceous wet",
        SPRUCE_LICHEN_WOODLAND => "spruce-lichen woodland",
        WHITE_SPRUCE_WOODLAND => "white spruce woodland",
        WHITE_SPRUCE_FOREST => "white spruce forest",
        BLACK_SPRUCE_WOODLAND => "black spruce woodland",
        BLACK_SPRUCE_FOREST => "black spruce forest mesic",
        MIXED_SPRUCE_WOODLAND => "mixed spruce woodland",
        MIXED_SPRUCE_FOREST => "mixed spruce forest",
        BLACK_SPRUCE_TUSSOCK => "black spruce-tussock woodland",
        BLACK_SPRUCE_PEATLAND => "black spruce peatland",
        POPLAR_FOREST => "poplar forest",
        ASPEN_FOREST => "aspen forest",
        BIRCH_FOREST => "birch forest",
        WHITE_SPRUCE_POPLAR => "white spruce-poplar forest & woodland",
        WHITE_SPRUCE_ASPEN => "white spruce-aspen forest & woodland",
        WHITE_SPRUCE_BIRCH => "white spruce-birch forest & woodland",
        BLACK_SPRUCE_DECIDUOUS => "black spruce-deciduous forest & woodland",
        MIXED_SPRUCE_BIRCH => "mixed spruce-birch forest & woodland",
        TUSSOCK_LOW_SHRUB => "tussock tundra low shrub",
        TUSSOCK_DWARF_SHRUB => "tussock tundra dwarf shrub",
        ALDER_MESIC => "alder mesic",
        ALDER_WILLOW_MESIC => "alder-willow mesic",
        WILLOW_MESIC => "willow mesic",
        BIRCH_WILLOW_MESIC => "birch-willow mesic",
        BIRCH_ERICACEOUS_MESIC => "birch shrub / birch-ericaceous mesic",
        DWARF_SHRUB_LICHEN => "dwarf shrub-lichen",
        ERICACEOUS_DWARF_SHRUB => "ericaceous dwarf shrub",
        DRYAS_ERICACEOUS_DWARF_SHRUB => "dryas-ericaceous dwarf shrub",
        DRYAS_WILLOW_DWARF_SHRUB => "dryas-willow dwarf shrub",
        SHRUB_SPHAGNUM_WET => "shrub-sphagnum wet",
        DWARF_SHRUB_SPHAGNUM_WET => "dwarf shrub-sphagnum wet",
        ALDER_WILLOW_WET => "alder-willow wet",
        WILLOW_WET => "willow wet",
        BIRCH_WILLOW_WET => "birch-willow wet",
        CALAMAGROSTIS_MESIC => "Calamagrostis meadow mesic",
        MEADOW_MESIC_ALKALINE => "forb-graminoid meadow mesic alkaline",
        MEADOW_MESIC_ACIDIC => "forb-graminoid meadow mesic acidic",
        SEDGE_WET => "sedge meadow wet",
        SEDGE_CALAMAGROSTIS_WET => "sedge-Calamagrostis meadow wet",
        MEADOW_WET => "forb-graminoid meadow wet",
        BURNED => "burned",
        RECOVERING_MESIC => "recent burn recovering birch-willow mesic",
        RECOVERING_WET => "recent burn recovering birch-willow wet",
        DEVELOPED => "developed",
        BARREN => "barren / sparse",
        SNOW_ICE => "permanent snow / ice",
        WATER => "water",
        WHITE_SPRUCE_FLOODPLAIN => "white spruce active floodplain",
        POPLAR_FLOODPLAIN => "poplar (white spruce) active floodplain",
        BIRCH_FLOODPLAIN => "birch (white spruce) active floodplain",
        ALDER_WILLOW_FLOODPLAIN => "alder-willow active floodplain",
        WILLOW_FLOODPLAIN => "willow active floodplain",
        _ => return None,
    };
    Some(label)
}
