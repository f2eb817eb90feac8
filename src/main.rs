//! plugin-store - scan a game data directory
//!
//! Walks every plugin of a load order, optionally building the record index or
//! collecting game settings, and prints a per-plugin summary.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use log::info;
use plugin_store::load_order::validate_data_path;
use plugin_store::traversal::walk_file;
use plugin_store::{
    Coordinator, EvictionPolicy, HandlerSet, LoadOrder, RecordIndex, SettingValue,
    SettingsHandler, StoreConfig, TraversalStats,
};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct ScanOptions {
    index: bool,
    settings: bool,
}

/// Everything learned from one plugin
#[derive(Debug, Default)]
struct PluginReport {
    stats: TraversalStats,
    index: RecordIndex,
    settings: HashMap<String, SettingValue>,
}

fn build_cli() -> Command {
    let command = Command::new("plugin-store")
        .version(plugin_store::VERSION)
        .about("Scan a game plugin load order")
        .long_about(
            "plugin-store reads a load order of game plugin files through a bounded pool \
             of file handles, translating every record identifier to its load-order-wide form.",
        )
        .arg(
            Arg::new("paths")
                .help("Data directory to scan, or plugin files in load order")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("pool-size")
                .long("pool-size")
                .help("Maximum number of simultaneously open plugin files")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("eviction")
                .long("eviction")
                .help("Which open file to close when the pool is full")
                .value_parser(["random", "lru"]),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Seed for random eviction")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("index")
                .long("index")
                .help("Build the record index and report overrides")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("settings")
                .long("settings")
                .help("Print decoded game settings and globals")
                .action(ArgAction::SetTrue),
        );

    #[cfg(feature = "config")]
    let command = command.arg(
        Arg::new("config")
            .long("config")
            .help("Configuration file (TOML)")
            .value_parser(value_parser!(PathBuf)),
    );

    command
}

fn load_config(matches: &clap::ArgMatches) -> Result<StoreConfig> {
    #[cfg(feature = "config")]
    let mut config = {
        let explicit = matches.get_one::<PathBuf>("config").cloned();
        match explicit.or_else(|| StoreConfig::default_path().filter(|p| p.exists())) {
            Some(path) => StoreConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => StoreConfig::default(),
        }
    };
    #[cfg(not(feature = "config"))]
    let mut config = StoreConfig::default();

    // Command-line flags win over the file
    if let Some(size) = matches.get_one::<usize>("pool-size") {
        config.pool_size = *size;
    }
    if let Some(policy) = matches.get_one::<String>("eviction") {
        config.eviction = policy.parse::<EvictionPolicy>()?;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.seed = Some(*seed);
    }
    config.validate()?;
    Ok(config)
}

fn load_order_from(paths: &[PathBuf], config: &StoreConfig) -> Result<LoadOrder> {
    for path in paths {
        validate_data_path(path)?;
    }
    let load_order = match paths {
        [dir] if dir.is_dir() => LoadOrder::from_directory(dir)?,
        _ => LoadOrder::from_paths(paths)?,
    };
    if load_order.is_empty() {
        match &config.data_dir {
            Some(dir) => return Ok(LoadOrder::from_directory(dir)?),
            None => anyhow::bail!("No plugin files found"),
        }
    }
    Ok(load_order)
}

/// One plugin, one pass per requested output
fn scan_plugin(
    coordinator: &Coordinator,
    file: usize,
    options: ScanOptions,
) -> plugin_store::Result<PluginReport> {
    let mut report = PluginReport::default();

    report.stats = if options.index {
        report.index.index_file(coordinator, file)?
    } else {
        walk_file(coordinator, file, &mut HandlerSet::new())?
    };

    if options.settings {
        let mut handlers = HandlerSet::new();
        SettingsHandler::new(&mut report.settings).register(&mut handlers);
        walk_file(coordinator, file, &mut handlers)?;
    }

    coordinator.close_file(file);
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let matches = build_cli().get_matches();
    let config = load_config(&matches)?;
    let options = ScanOptions {
        index: matches.get_flag("index"),
        settings: matches.get_flag("settings"),
    };

    let paths: Vec<PathBuf> = matches
        .get_many::<PathBuf>("paths")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let load_order = load_order_from(&paths, &config)?;
    info!(
        "{} plugins, pool of {} handles ({:?} eviction)",
        load_order.len(),
        config.pool_size,
        config.eviction
    );

    let coordinator = Arc::new(Coordinator::new(load_order, &config)?);

    // One blocking task per plugin; the coordinator bounds the open handles
    let tasks: Vec<_> = (0..coordinator.load_order().len())
        .map(|file| {
            let coordinator = Arc::clone(&coordinator);
            tokio::task::spawn_blocking(move || scan_plugin(&coordinator, file, options))
        })
        .collect();

    let mut index = RecordIndex::new();
    let mut settings: BTreeMap<String, SettingValue> = BTreeMap::new();
    let mut failed = 0;

    // Results are folded in load order so later files override earlier ones
    for (file, task) in tasks.into_iter().enumerate() {
        let name = coordinator
            .load_order()
            .get(file)
            .map(|p| p.name().to_string())
            .unwrap_or_default();
        match task.await.context("plugin task panicked")? {
            Ok(report) => {
                println!(
                    "{file:>3} {name:<40} {:>8} records {:>6} groups",
                    report.stats.records(),
                    report.stats.groups
                );
                index.merge(report.index);
                settings.extend(report.settings);
            }
            Err(error) => {
                failed += 1;
                eprintln!("{file:>3} {name:<40} FAILED: {error}");
            }
        }
    }

    if options.index {
        println!(
            "index: {} records, {} overrides",
            index.len(),
            index.override_count()
        );
        for (file, plugin) in coordinator.load_order().iter().enumerate() {
            let overrides = index.overrides_in(file);
            if overrides > 0 {
                println!("  {:<40} overrides {overrides}", plugin.name());
            }
        }
    }

    if options.settings {
        for (key, value) in &settings {
            println!("{key} = {value}");
        }
    }

    let total = coordinator.load_order().len();
    if total > 0 && failed == total {
        anyhow::bail!("All {total} plugins failed to load");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        // Ensure version is accessible
        assert!(!plugin_store::VERSION.is_empty());
    }

    #[test]
    fn test_cli_flags_override_defaults() {
        let matches = build_cli()
            .try_get_matches_from([
                "plugin-store",
                "--pool-size",
                "4",
                "--eviction",
                "lru",
                "--seed",
                "9",
                "Data",
            ])
            .expect("Failed to parse arguments");
        let config = load_config(&matches).expect("Failed to build config");
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.eviction, EvictionPolicy::Lru);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let matches = build_cli()
            .try_get_matches_from(["plugin-store", "--pool-size", "0", "Data"])
            .expect("Failed to parse arguments");
        assert!(load_config(&matches).is_err());
    }
}
