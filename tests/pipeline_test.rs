use veg_strat::codes::{self, Code};
use veg_strat::derived;
use veg_strat::layers::{Layer, LayerKind};
use veg_strat::pipeline::{self, MemoryCompletion, ProductStatus};
use veg_strat::progress::Silent;
use veg_strat::raster::memory::{MemoryLayer, MemoryStore};
use veg_strat::raster::LayerReader;
use veg_strat::rules::taxonomy;
use veg_strat::{LayerSet, PipelineConfig, Product, RunContext, StratError, Window, NODATA};

const COLS: usize = 5;
const ROWS: usize = 4;

fn context() -> RunContext {
    RunContext::new(MemoryCompletion::new(), Silent)
}

fn primaries() -> impl Iterator<Item = Layer> {
    Layer::ALL
        .into_iter()
        .filter(|layer| layer.kind() == LayerKind::Primary)
}

/// Every primary layer, with `cells[i]` giving the non-zero inputs of cell `i`.
fn layer_set(mask: MemoryLayer, cells: &[Vec<(Layer, f64)>]) -> LayerSet {
    let (cols, rows) = (mask.geometry().cols, mask.geometry().rows);
    let mut set = LayerSet::new(Box::new(mask));
    for layer in primaries() {
        let values = (0..cols * rows)
            .map(|i| {
                cells
                    .get(i)
                    .and_then(|cell| cell.iter().find(|(l, _)| *l == layer))
                    .map_or(0.0, |(_, v)| *v)
            })
            .collect();
        set.insert(layer, Box::new(MemoryLayer::new(layer.stem(), cols, rows, values)))
            .unwrap();
    }
    set
}

/// Deterministic spread of cover values across every cell.
fn varied_cells() -> Vec<Vec<(Layer, f64)>> {
    let mut seed: u64 = 0x5eed;
    let mut next = move |bound: u64| {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((seed >> 33) % bound) as f64
    };
    (0..COLS * ROWS)
        .map(|_| {
            let mut cell: Vec<(Layer, f64)> = primaries()
                .filter(|layer| *layer < Layer::Height)
                .map(|layer| (layer, next(40)))
                .collect();
            cell.push((Layer::Height, next(4)));
            cell.push((Layer::FireYear, [0.0, 1990.0, 2005.0, 2021.0][next(4) as usize]));
            cell.push((Layer::EsaCover, [10.0, 40.0, 70.0, 80.0][next(4) as usize]));
            cell.push((Layer::Floodplain, next(2)));
            cell
        })
        .collect()
}

fn classify(set: &LayerSet, store: &mut MemoryStore) -> Vec<Code> {
    let rules = taxonomy::rules();
    let product = Product::new("vegetation_type", "vegetation_type_10m_3338.tif");
    pipeline::classify(&mut context(), set, &rules, &product, store).unwrap();
    store.cells("vegetation_type").unwrap()
}

#[test]
fn cells_outside_mask_are_nodata_in_every_product() {
    let mut mask_values = vec![1.0; COLS * ROWS];
    mask_values[3] = 0.0;
    mask_values[7] = -32768.0;
    mask_values[18] = 2.0;
    let set = layer_set(MemoryLayer::new("mask", COLS, ROWS, mask_values), &varied_cells());
    let config = PipelineConfig::new("mask.tif", vec![], "derived", "out");
    let mut store = MemoryStore::new();

    pipeline::derive_all(&mut context(), &set, &config, &mut store).unwrap();
    classify(&set, &mut store);

    assert_eq!(store.products().len(), derived::persisted().count() + 1);
    for product in store.products() {
        let cells = store.cells(&product).unwrap();
        for index in [3, 7, 18] {
            assert_eq!(cells[index], NODATA, "{product} cell {index}");
        }
        assert!(cells
            .iter()
            .enumerate()
            .filter(|(i, _)| ![3, 7, 18].contains(i))
            .all(|(_, &c)| c != NODATA));
    }
}

#[test]
fn block_layout_does_not_change_classification() {
    let cells = varied_cells();
    let mut results = Vec::new();
    for (block_cols, block_rows) in [(COLS, 1), (4, 4), (3, 5), (1, 1)] {
        let mask = MemoryLayer::filled("mask", COLS, ROWS, 1.0).with_block_size(block_cols, block_rows);
        let set = layer_set(mask, &cells);
        let mut store = MemoryStore::new();
        results.push(classify(&set, &mut store));
    }
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn white_spruce_forest_with_old_fire() {
    let cell = vec![
        (Layer::Picgla, 10.0),
        (Layer::Picmar, 2.0),
        (Layer::Brotre, 8.0),
        (Layer::FireYear, 2015.0),
    ];
    let set = layer_set(MemoryLayer::filled("mask", 1, 1, 1.0), &[cell]);
    let mut store = MemoryStore::new();

    assert_eq!(classify(&set, &mut store), vec![codes::WHITE_SPRUCE_FOREST]);
}

#[test]
fn esa_water_is_terminal() {
    let cell = vec![
        (Layer::Picgla, 40.0),
        (Layer::Alnus, 25.0),
        (Layer::FireYear, 2021.0),
        (Layer::Floodplain, 1.0),
        (Layer::EsaCover, 80.0),
    ];
    let set = layer_set(MemoryLayer::filled("mask", 1, 1, 1.0), &[cell]);
    let mut store = MemoryStore::new();

    assert_eq!(classify(&set, &mut store), vec![codes::WATER]);
}

#[test]
fn empty_cell_stays_unassigned() {
    let set = layer_set(MemoryLayer::filled("mask", 2, 1, 1.0), &[]);
    let mut store = MemoryStore::new();

    assert_eq!(classify(&set, &mut store), vec![codes::NOT_ASSIGNED; 2]);
}

#[test]
fn completed_product_is_not_rewritten() {
    let set = layer_set(MemoryLayer::filled("mask", COLS, ROWS, 1.0), &varied_cells());
    let rules = taxonomy::rules();
    let product = Product::new("vegetation_type", "vegetation_type_10m_3338.tif");
    let mut store = MemoryStore::new();
    let mut ctx = RunContext::new(MemoryCompletion::new().with_complete("vegetation_type"), Silent);

    let status = pipeline::classify(&mut ctx, &set, &rules, &product, &mut store).unwrap();

    assert_eq!(status, ProductStatus::Skipped);
    assert_eq!(store.writes(), 0);
    assert_eq!(ctx.outcomes().len(), 1);
}

#[test]
fn second_run_skips_every_product() {
    let set = layer_set(MemoryLayer::filled("mask", COLS, ROWS, 1.0), &varied_cells());
    let config = PipelineConfig::new("mask.tif", vec![], "derived", "out");
    let mut store = MemoryStore::new();
    let mut ctx = context();

    pipeline::derive_all(&mut ctx, &set, &config, &mut store).unwrap();
    let writes = store.writes();
    pipeline::derive_all(&mut ctx, &set, &config, &mut store).unwrap();

    assert_eq!(store.writes(), writes);
    let skipped = ctx
        .outcomes()
        .iter()
        .filter(|o| o.status == ProductStatus::Skipped)
        .count();
    assert_eq!(skipped, derived::persisted().count());
}

#[test]
fn missing_layer_fails_before_any_write() {
    let mut set = LayerSet::new(Box::new(MemoryLayer::filled("mask", 2, 2, 1.0)));
    for layer in primaries().filter(|layer| *layer != Layer::Height) {
        set.insert(layer, Box::new(MemoryLayer::filled(layer.stem(), 2, 2, 0.0)))
            .unwrap();
    }
    let rules = taxonomy::rules();
    let product = Product::new("vegetation_type", "vegetation_type_10m_3338.tif");
    let mut store = MemoryStore::new();

    let result = pipeline::classify(&mut context(), &set, &rules, &product, &mut store);

    assert!(matches!(result, Err(StratError::MissingInput { ref layer }) if layer == "height"));
    assert!(store.products().is_empty());
}

#[test]
fn picea_ratio_without_spruce_is_zero() {
    let cells = vec![vec![(Layer::Brotre, 30.0)], vec![(Layer::Picgla, 3.0), (Layer::Picmar, 1.0)]];
    let set = layer_set(MemoryLayer::filled("mask", 2, 1, 1.0), &cells);
    let metric = derived::metric(Layer::PiceaRatio).unwrap();
    let mut store = MemoryStore::new();

    pipeline::derive_metric(
        &mut context(),
        &set,
        metric,
        &Product::new("picea_ratio", "picea_ratio_10m_3338.tif"),
        &mut store,
    )
    .unwrap();

    // 3 / 4.01 * 100 truncates to 74
    assert_eq!(store.cells("picea_ratio").unwrap(), vec![0, 74]);
}

#[test]
fn derived_product_reads_back_as_aligned_input() {
    let cells = vec![
        vec![(Layer::Picgla, 3.0), (Layer::Picmar, 4.0)],
        vec![(Layer::Picgla, 9.0)],
        vec![(Layer::Picmar, 2.0)],
    ];
    let mask = MemoryLayer::new("mask", 3, 1, vec![1.0, 0.0, 1.0]);
    let set = layer_set(mask.clone(), &cells);
    let metric = derived::metric(Layer::PiceaSum).unwrap();
    let mut store = MemoryStore::new();
    let mut ctx = context();

    pipeline::derive_metric(
        &mut ctx,
        &set,
        metric,
        &Product::new("picea_sum", "picea_sum_10m_3338.tif"),
        &mut store,
    )
    .unwrap();

    let written = store.layer("picea_sum").unwrap();
    assert_eq!(written.geometry(), mask.geometry());
    assert_eq!(
        written.read_normalized(Window::new(0, 0, 3, 1)).unwrap(),
        vec![7.0, 0.0, 2.0]
    );

    pipeline::conform_layer(
        &mut ctx,
        &mask,
        &written,
        &Product::new("picea_sum_conformed", "picea_sum_conformed.tif"),
        &mut store,
    )
    .unwrap();
    assert_eq!(store.cells("picea_sum_conformed").unwrap(), vec![7, NODATA, 2]);
}

#[test]
fn explained_rules_end_in_the_classified_code() {
    let mut mask_values = vec![1.0; COLS * ROWS];
    mask_values[6] = 0.0;
    let set = layer_set(MemoryLayer::new("mask", COLS, ROWS, mask_values), &varied_cells());
    let rules = taxonomy::rules();
    let mut store = MemoryStore::new();
    let classified = classify(&set, &mut store);

    for (index, &code) in classified.iter().enumerate() {
        let fired = pipeline::explain_cell(&set, &rules, index % COLS, index / COLS).unwrap();
        let last = fired.last().map_or(codes::NOT_ASSIGNED, |rule| rule.code);
        if index == 6 {
            assert!(fired.is_empty());
            assert_eq!(code, NODATA);
        } else {
            assert_eq!(last, code, "cell {index}");
        }
    }

    let outside = pipeline::explain_cell(&set, &rules, COLS, 0);
    assert!(matches!(outside, Err(StratError::CellOutOfGrid { col: COLS, row: 0, .. })));
}
