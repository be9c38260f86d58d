//! The vegetation type key.
//!
//! Rules are listed in evaluation order. Thresholds are in percent foliar
//! cover unless noted (height in metres, fire in calendar years, land
//! cover in ESA WorldCover class values). Changing any of them changes
//! [`TAXONOMY_VERSION`](crate::codes::TAXONOMY_VERSION).

use crate::codes::*;
use crate::layers::Layer::*;
use crate::layers::Layer;
use crate::rules::RuleGroup as G;
use crate::rules::{state_in, state_is, v, Cond, Rule, RuleSet};

const SPRUCE_TYPES: [Code; 4] = [
    BLACK_SPRUCE_WOODLAND,
    BLACK_SPRUCE_FOREST,
    MIXED_SPRUCE_WOODLAND,
    MIXED_SPRUCE_FOREST,
];

const OPEN_TYPES: [Code; 5] = [
    NOT_ASSIGNED,
    SHRUB_MESIC,
    SHRUB_WET,
    HERBACEOUS_MESIC,
    HERBACEOUS_WET,
];

/// Code of the tussock tundra dwarf shrub precondition. No earlier rule
/// produces it, so rule 8.41 never fires; kept as published.
const TUSSOCK_DWARF_PRECONDITION: Code = 26;

/// `layer` exceeds both `others` once given a 0.1 tie margin.
fn dominant(layer: Layer, a: Layer, b: Layer) -> Cond {
    (v(layer) + 0.1).gt(v(a)) & (v(layer) + 0.1).gt(v(b))
}

fn poplar_dominant() -> Cond {
    dominant(Populbt, Poptre, Bettre)
}

fn aspen_dominant() -> Cond {
    dominant(Poptre, Populbt, Bettre)
}

fn birch_dominant() -> Cond {
    dominant(Bettre, Populbt, Poptre)
}

fn woodland() -> Cond {
    v(ForestDensity).lt(20)
}

fn forest() -> Cond {
    v(ForestDensity).ge(20)
}

/// Tree or willow cover left on an otherwise open cell.
fn woody_signal() -> Cond {
    v(Brotre).ge(3) | v(Poptre).ge(3) | v(Ndsalix).ge(3)
}

fn recent_fire() -> Cond {
    v(FireYear).within(2000, 2019)
}

fn low_stature() -> Cond {
    v(Height).lt(1) & v(Brotre).lt(5)
}

fn growth_habit() -> Vec<Rule> {
    vec![
        Rule::new(
            "0.1a",
            G::GrowthHabit,
            CONIFEROUS,
            v(PiceaSum).ge(10) & v(DeciduousRatio).lt(40),
        ),
        Rule::new(
            "0.1b",
            G::GrowthHabit,
            CONIFEROUS,
            state_is(NOT_ASSIGNED)
                & v(PiceaSum).ge(5)
                & v(DeciduousRatio).lt(40)
                & (v(EsaCover).is(10) | v(Height).gt(3)),
        ),
        // retract conifers on corrected 1975-1999 burns that are short or
        // not mapped as tree cover, unless the wet indicator is high
        Rule::new(
            "0.1c",
            G::GrowthHabit,
            NOT_ASSIGNED,
            state_is(CONIFEROUS)
                & (v(Height).le(2) | v(EsaCover).is_not(10))
                & v(FireYear).within(1975, 2000)
                & v(Correction).is(1)
                & v(PicmarWetIndicator).lt(20),
        ),
        Rule::new(
            "0.2",
            G::GrowthHabit,
            DECIDUOUS,
            state_is(NOT_ASSIGNED)
                & v(Brotre).ge(12)
                & v(DeciduousRatio).ge(60)
                & v(Brotre).ge(v(AlderBirchWillow) * 0.5)
                & ((v(FireYear).lt(1975) & v(Height).ge(2))
                    | v(FireYear).ge(1975)
                    | v(Brotre).ge(25)),
        ),
        Rule::new(
            "0.3",
            G::GrowthHabit,
            MIXED_TREES,
            state_is(NOT_ASSIGNED)
                & v(Brotre).ge(10)
                & v(PiceaSum).ge(10)
                & v(DeciduousRatio).within(40, 60)
                & (v(Height).ge(2) | (v(Brotre) + v(PiceaSum)).ge(40)),
        ),
        Rule::new(
            "0.4",
            G::GrowthHabit,
            SHRUB_MESIC,
            state_is(NOT_ASSIGNED) & v(ShrubTotal).ge(15) & v(WetlandIndicator).lt(8),
        ),
        Rule::new(
            "0.5",
            G::GrowthHabit,
            SHRUB_WET,
            state_is(NOT_ASSIGNED) & v(ShrubTotal).ge(15) & v(WetlandIndicator).ge(8),
        ),
        Rule::new(
            "0.6",
            G::GrowthHabit,
            HERBACEOUS_MESIC,
            state_is(NOT_ASSIGNED)
                & v(HerbaceousTotal).ge(15)
                & v(WetlandIndicator).lt(8)
                & v(Brotre).lt(5),
        ),
        Rule::new(
            "0.7",
            G::GrowthHabit,
            HERBACEOUS_WET,
            state_is(NOT_ASSIGNED)
                & v(HerbaceousTotal).ge(15)
                & v(WetlandIndicator).ge(8)
                & v(Brotre).lt(5),
        ),
    ]
}

fn forest_subtypes() -> Vec<Rule> {
    let conifer = || state_is(CONIFEROUS);
    let mixed = || state_is(MIXED_TREES);
    let white = || v(PiceaRatio).ge(60);
    let black = || v(PiceaRatio).lt(40);
    let even = || v(PiceaRatio).within(40, 60);

    vec![
        // spruce forest & woodland
        Rule::new(
            "1.10",
            G::ForestSubtype,
            SPRUCE_LICHEN_WOODLAND,
            conifer() & v(Lichen).ge(15) & v(AlderBirchWillow).le(10) & woodland(),
        ),
        Rule::new("1.11", G::ForestSubtype, WHITE_SPRUCE_WOODLAND, conifer() & white() & woodland()),
        Rule::new("1.12", G::ForestSubtype, WHITE_SPRUCE_FOREST, conifer() & white() & forest()),
        Rule::new("1.13", G::ForestSubtype, BLACK_SPRUCE_WOODLAND, conifer() & black() & woodland()),
        Rule::new("1.14", G::ForestSubtype, BLACK_SPRUCE_FOREST, conifer() & black() & forest()),
        Rule::new("1.15", G::ForestSubtype, MIXED_SPRUCE_WOODLAND, conifer() & even() & woodland()),
        Rule::new("1.16", G::ForestSubtype, MIXED_SPRUCE_FOREST, conifer() & even() & forest()),
        Rule::new(
            "1.17a",
            G::ForestSubtype,
            BLACK_SPRUCE_TUSSOCK,
            state_in(&SPRUCE_TYPES) & v(Erivag).ge(20),
        ),
        Rule::new(
            "1.17b",
            G::ForestSubtype,
            BLACK_SPRUCE_TUSSOCK,
            state_in(&SPRUCE_TYPES) & v(Erivag).ge(15) & v(AlderBirchWillow).lt(35),
        ),
        Rule::new(
            "1.18",
            G::ForestSubtype,
            BLACK_SPRUCE_PEATLAND,
            state_in(&SPRUCE_TYPES) & v(PicmarWetIndicator).ge(8) & v(Ndsalix).lt(30),
        ),
        // deciduous forest
        Rule::new("2.20", G::ForestSubtype, POPLAR_FOREST, state_is(DECIDUOUS) & poplar_dominant()),
        Rule::new("2.21", G::ForestSubtype, ASPEN_FOREST, state_is(DECIDUOUS) & aspen_dominant()),
        Rule::new("2.22", G::ForestSubtype, BIRCH_FOREST, state_is(DECIDUOUS) & birch_dominant()),
        // spruce-hardwood forest & woodland
        Rule::new("3.30a", G::ForestSubtype, WHITE_SPRUCE_POPLAR, mixed() & white() & poplar_dominant()),
        Rule::new("3.30b", G::ForestSubtype, WHITE_SPRUCE_POPLAR, mixed() & even() & poplar_dominant()),
        Rule::new("3.31a", G::ForestSubtype, WHITE_SPRUCE_ASPEN, mixed() & white() & aspen_dominant()),
        Rule::new("3.31b", G::ForestSubtype, WHITE_SPRUCE_ASPEN, mixed() & even() & aspen_dominant()),
        Rule::new("3.32", G::ForestSubtype, WHITE_SPRUCE_BIRCH, mixed() & white() & birch_dominant()),
        Rule::new("3.33a", G::ForestSubtype, BLACK_SPRUCE_DECIDUOUS, mixed() & black() & poplar_dominant()),
        Rule::new("3.33b", G::ForestSubtype, BLACK_SPRUCE_DECIDUOUS, mixed() & black() & aspen_dominant()),
        Rule::new("3.33c", G::ForestSubtype, BLACK_SPRUCE_DECIDUOUS, mixed() & black() & birch_dominant()),
        Rule::new("3.34", G::ForestSubtype, MIXED_SPRUCE_BIRCH, mixed() & even() & birch_dominant()),
    ]
}

fn tussock_override() -> Vec<Rule> {
    vec![
        Rule::new(
            "8.40a",
            G::TussockOverride,
            TUSSOCK_LOW_SHRUB,
            state_in(&OPEN_TYPES) & v(Erivag).ge(20),
        ),
        Rule::new(
            "8.40b",
            G::TussockOverride,
            TUSSOCK_LOW_SHRUB,
            state_in(&OPEN_TYPES) & v(Erivag).ge(15) & v(AlderBirchWillow).lt(35),
        ),
        Rule::new(
            "8.41",
            G::TussockOverride,
            TUSSOCK_DWARF_SHRUB,
            state_is(TUSSOCK_DWARF_PRECONDITION) & v(AlderBirchWillow).lt(8),
        ),
    ]
}

fn shrub_herbaceous_subtypes() -> Vec<Rule> {
    let shrub_mesic = || state_is(SHRUB_MESIC);
    let dwarf = || v(DwarfShrubTotal).ge(15);

    vec![
        // shrub mesic
        Rule::new(
            "4.50",
            G::ShrubHerbSubtype,
            ALDER_MESIC,
            shrub_mesic() & v(Alnus).ge(12) & v(AlderRatio).ge(0.3),
        ),
        Rule::new(
            "4.51",
            G::ShrubHerbSubtype,
            ALDER_WILLOW_MESIC,
            state_in(&[SHRUB_MESIC, ALDER_MESIC])
                & (v(Alnus) + v(Ndsalix)).ge(12)
                & v(AlderRatio).within(0.3, 0.7),
        ),
        Rule::new(
            "4.52",
            G::ShrubHerbSubtype,
            WILLOW_MESIC,
            shrub_mesic() & v(Ndsalix).ge(10) & v(WillowRatio).ge(0.3),
        ),
        Rule::new(
            "4.53",
            G::ShrubHerbSubtype,
            BIRCH_WILLOW_MESIC,
            state_in(&[SHRUB_MESIC, WILLOW_MESIC])
                & (v(Betshr) + v(Ndsalix)).ge(12)
                & v(WillowRatio).within(0.3, 0.7),
        ),
        Rule::new(
            "4.54",
            G::ShrubHerbSubtype,
            BIRCH_ERICACEOUS_MESIC,
            shrub_mesic() & v(BirchEricaceous).ge(15) & v(Betshr).ge(5),
        ),
        Rule::new(
            "4.55",
            G::ShrubHerbSubtype,
            DWARF_SHRUB_LICHEN,
            shrub_mesic() & dwarf() & v(Lichen).ge(20) & low_stature(),
        ),
        Rule::new(
            "4.56",
            G::ShrubHerbSubtype,
            ERICACEOUS_DWARF_SHRUB,
            shrub_mesic()
                & dwarf()
                & v(EricaceousDwarf).ge(10)
                & v(EricaceousRatio).ge(0.3)
                & low_stature(),
        ),
        Rule::new(
            "4.57",
            G::ShrubHerbSubtype,
            DRYAS_ERICACEOUS_DWARF_SHRUB,
            state_in(&[SHRUB_MESIC, ERICACEOUS_DWARF_SHRUB])
                & dwarf()
                & v(Dryas).ge(10)
                & v(EricaceousRatio).within(0.3, 0.7)
                & low_stature(),
        ),
        Rule::new(
            "4.58",
            G::ShrubHerbSubtype,
            DRYAS_WILLOW_DWARF_SHRUB,
            shrub_mesic() & dwarf() & v(Dryas).ge(10) & low_stature(),
        ),
        // shrub wet
        Rule::new(
            "5.60",
            G::ShrubHerbSubtype,
            SHRUB_SPHAGNUM_WET,
            state_is(SHRUB_WET) & v(Sphagn).ge(12),
        ),
        Rule::new(
            "5.61",
            G::ShrubHerbSubtype,
            DWARF_SHRUB_SPHAGNUM_WET,
            state_is(SHRUB_SPHAGNUM_WET) & v(AlderBirchWillow).lt(15),
        ),
        Rule::new(
            "5.62",
            G::ShrubHerbSubtype,
            ALDER_WILLOW_WET,
            state_is(SHRUB_WET) & v(Alnus).ge(10),
        ),
        Rule::new(
            "5.63",
            G::ShrubHerbSubtype,
            WILLOW_WET,
            state_is(SHRUB_WET) & v(Ndsalix).ge(10),
        ),
        Rule::new(
            "5.64",
            G::ShrubHerbSubtype,
            BIRCH_WILLOW_WET,
            state_in(&[SHRUB_WET, WILLOW_WET])
                & v(Betshr).ge(10)
                & v(Ndsalix).lt(v(Betshr) * 1.5),
        ),
        // herbaceous mesic
        Rule::new(
            "6.70",
            G::ShrubHerbSubtype,
            CALAMAGROSTIS_MESIC,
            state_is(HERBACEOUS_MESIC) & v(Mwcalama).ge(8),
        ),
        Rule::new(
            "6.71",
            G::ShrubHerbSubtype,
            MEADOW_MESIC_ALKALINE,
            state_is(HERBACEOUS_MESIC) & v(Alkaline).is(1),
        ),
        Rule::new(
            "6.72",
            G::ShrubHerbSubtype,
            MEADOW_MESIC_ACIDIC,
            state_is(HERBACEOUS_MESIC) & v(Alkaline).is(0),
        ),
        // herbaceous wet
        Rule::new(
            "7.80",
            G::ShrubHerbSubtype,
            SEDGE_WET,
            state_is(HERBACEOUS_WET) & v(Wetsed).ge(8),
        ),
        Rule::new(
            "7.81",
            G::ShrubHerbSubtype,
            SEDGE_CALAMAGROSTIS_WET,
            (state_is(SEDGE_WET) | (state_is(HERBACEOUS_WET) & v(WetCalamagrostis).ge(12)))
                & v(CalamagrostisRatio).ge(0.3),
        ),
        Rule::new("7.82", G::ShrubHerbSubtype, MEADOW_WET, state_is(HERBACEOUS_WET)),
    ]
}

fn corrections() -> Vec<Rule> {
    vec![
        Rule::new(
            "c.63",
            G::Correction,
            WILLOW_WET,
            state_in(&[NOT_ASSIGNED, SHRUB_MESIC, SHRUB_WET])
                & woody_signal()
                & v(WetlandIndicator).ge(5),
        ),
        Rule::new(
            "c.64",
            G::Correction,
            BIRCH_WILLOW_WET,
            state_is(SHRUB_WET) & v(Betshr).ge(3),
        ),
        Rule::new(
            "c.21",
            G::Correction,
            ASPEN_FOREST,
            state_in(&[NOT_ASSIGNED, SHRUB_MESIC])
                & woody_signal()
                & v(WetlandIndicator).lt(5)
                & v(Poptre).gt(v(Ndsalix) + 0.1),
        ),
        Rule::new(
            "c.52",
            G::Correction,
            WILLOW_MESIC,
            state_in(&[NOT_ASSIGNED, SHRUB_MESIC]) & woody_signal() & v(WetlandIndicator).lt(5),
        ),
        Rule::new(
            "c.54",
            G::Correction,
            BIRCH_ERICACEOUS_MESIC,
            state_is(SHRUB_MESIC) & v(Betshr).ge(3),
        ),
    ]
}

fn disturbance() -> Vec<Rule> {
    let shrubland_cover = || v(EsaCover).is(20) | v(EsaCover).is(30);

    vec![
        Rule::new("9.90", G::Disturbance, BURNED, v(FireYear).ge(2019)),
        Rule::new(
            "9.91a",
            G::Disturbance,
            RECOVERING_MESIC,
            recent_fire() & state_in(&[WILLOW_MESIC, BIRCH_WILLOW_MESIC]),
        ),
        Rule::new(
            "9.91b",
            G::Disturbance,
            RECOVERING_MESIC,
            recent_fire()
                & state_is(NOT_ASSIGNED)
                & shrubland_cover()
                & v(WetlandIndicator).lt(5),
        ),
        Rule::new(
            "9.92a",
            G::Disturbance,
            RECOVERING_WET,
            recent_fire() & state_in(&[ALDER_WILLOW_WET, WILLOW_WET, BIRCH_WILLOW_WET]),
        ),
        Rule::new(
            "9.92b",
            G::Disturbance,
            RECOVERING_WET,
            recent_fire()
                & state_is(NOT_ASSIGNED)
                & shrubland_cover()
                & v(WetlandIndicator).ge(5),
        ),
    ]
}

fn floodplain() -> Vec<Rule> {
    let active = || v(Floodplain).is(1);

    vec![
        Rule::new(
            "10.100",
            G::Floodplain,
            WHITE_SPRUCE_FLOODPLAIN,
            active()
                & state_in(&[
                    WHITE_SPRUCE_WOODLAND,
                    WHITE_SPRUCE_FOREST,
                    MIXED_SPRUCE_WOODLAND,
                    MIXED_SPRUCE_FOREST,
                ]),
        ),
        Rule::new(
            "10.101a",
            G::Floodplain,
            POPLAR_FLOODPLAIN,
            active() & state_in(&[POPLAR_FOREST, WHITE_SPRUCE_POPLAR]),
        ),
        Rule::new(
            "10.101b",
            G::Floodplain,
            POPLAR_FLOODPLAIN,
            active() & state_is(ASPEN_FOREST) & v(Populbt).ge(v(Poptre) * 0.75),
        ),
        Rule::new(
            "10.102",
            G::Floodplain,
            BIRCH_FLOODPLAIN,
            active() & state_in(&[BIRCH_FOREST, WHITE_SPRUCE_BIRCH, MIXED_SPRUCE_BIRCH]),
        ),
        Rule::new(
            "10.103",
            G::Floodplain,
            ALDER_WILLOW_FLOODPLAIN,
            active() & state_in(&[ALDER_MESIC, ALDER_WILLOW_MESIC, ALDER_WILLOW_WET]),
        ),
        Rule::new(
            "10.104",
            G::Floodplain,
            WILLOW_FLOODPLAIN,
            active() & state_is(WILLOW_MESIC),
        ),
    ]
}

fn land_cover() -> Vec<Rule> {
    vec![
        Rule::new("12.95", G::LandCover, DEVELOPED, v(EsaCover).is(50)),
        Rule::new("12.96", G::LandCover, BARREN, v(EsaCover).is(60)),
        Rule::new(
            "12.97",
            G::LandCover,
            SNOW_ICE,
            state_is(NOT_ASSIGNED) & v(EsaCover).is(70),
        ),
        Rule::new(
            "12.98",
            G::LandCover,
            WATER,
            v(EsaCover).is(80) | v(EsriCover).is(1),
        ),
    ]
}

/// The complete key, in evaluation order.
pub fn rules() -> RuleSet {
    let mut rules = growth_habit();
    rules.extend(forest_subtypes());
    rules.extend(tussock_override());
    rules.extend(shrub_herbaceous_subtypes());
    rules.extend(corrections());
    rules.extend(disturbance());
    rules.extend(floodplain());
    rules.extend(land_cover());
    RuleSet::new(rules)
}
