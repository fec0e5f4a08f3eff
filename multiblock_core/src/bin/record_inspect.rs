use std::collections::BTreeMap;
use std::env;
use std::process;

use tracing::info;

use multiblock_core::{
    load_registry_config_from_env, DimensionId, DirectoryStore, MultiblockWorldData,
    StaticWorld,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let Some(root) = args.next() else {
        eprintln!("usage: record_inspect <save-data-dir> [overworld|the_nether|the_end]");
        process::exit(2);
    };
    let dimension = match args.next().as_deref() {
        None | Some("overworld") => DimensionId::overworld(),
        Some("the_nether") => DimensionId::nether(),
        Some("the_end") => DimensionId::end(),
        Some(other) => {
            eprintln!("unknown dimension {other:?}");
            process::exit(2);
        }
    };

    let config = load_registry_config_from_env();
    let store = DirectoryStore::new(root);
    let world = StaticWorld::new(dimension).with_height(-2048, 2048);

    let (mut data, report) = match MultiblockWorldData::load_or_create(&store, &world, &config) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("failed to open {}: {err}", store.root().display());
            process::exit(1);
        }
    };
    info!(
        target: "multiblocked::inspect",
        record = data.record_name(),
        loaded = report.loaded,
        skipped = report.skipped.len(),
        "inspect.opened"
    );

    let mut states: Vec<_> = data.states().cloned().collect();
    states.sort_by_key(|state| state.anchor());

    let mut coverage: BTreeMap<_, usize> = BTreeMap::new();
    println!("{} ({} structures)", data.record_name(), states.len());
    for state in &states {
        let chunks = state.chunks();
        for chunk in &chunks {
            *coverage.entry(*chunk).or_default() += 1;
        }
        println!(
            "  {} {} members={} chunks={}",
            state.anchor(),
            state.definition(),
            state.cache().len(),
            chunks.len()
        );
    }

    if !coverage.is_empty() {
        println!("chunks:");
        for (chunk, count) in &coverage {
            println!("  {chunk} {count}");
        }
    }

    for (key, err) in &report.skipped {
        println!("skipped {key}: {err}");
    }

    data.shutdown();
}
