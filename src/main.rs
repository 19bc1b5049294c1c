use crate::settings::{CliArgs, Command};
use clap::Parser;
use doomsday_bank::bank::notify::{CacheLevelObserver, LoadObserver};
use doomsday_bank::fs::native::NativeFileSystem;
use doomsday_bank::lumps::{LumpLoader, scan_lumps};
use doomsday_bank::{Bank, BankFlags, BankSettings, CacheLevel, DotPath};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod settings;

/// Logs what the bank reports back to the main loop.
struct BankLogger;

impl LoadObserver for BankLogger {
    fn bank_loaded(&self, path: &DotPath) {
        debug!("Loaded \"{}\"", path);
    }
}

impl CacheLevelObserver for BankLogger {
    fn bank_cache_level_changed(&self, path: &DotPath, level: CacheLevel) {
        debug!("\"{}\" is now {:?}", path, level);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    let bank = create_bank(&args)?;
    let logger = Arc::new(BankLogger);
    bank.audience_for_load().add(logger.clone());
    bank.audience_for_cache_level().add(logger);

    let source_dir = Path::new(&args.source_dir);
    let lumps = scan_lumps(source_dir)?;
    info!("Found {} files in {:?}", lumps.len(), source_dir);
    for (path, source) in lumps {
        bank.add(path, source);
    }
    run_main_loop(&bank);

    match &args.command {
        Command::List { prefix } => {
            let prefix = DotPath::new(prefix.as_deref().unwrap_or_default());
            for path in bank.index().paths_under(&prefix) {
                let level = bank.cache_level(&path).unwrap_or(CacheLevel::InColdStorage);
                println!("{:<48} {:?}", path, level);
            }
        }
        Command::Warm => {
            bank.load_all();
            run_main_loop(&bank);
            bank.unload_all(CacheLevel::InHotStorage);
            run_main_loop(&bank);
            info!("{} items warmed", bank.index().len());
        }
        Command::Get { item } => {
            let lump = bank.data(item.as_str())?;
            run_main_loop(&bank);
            println!("{}: {} bytes, checksum {:#010x}", item, lump.bytes().len(), lump.checksum());
        }
        Command::Stats => {
            bank.load_all();
            run_main_loop(&bank);
            bank.purge();
            run_main_loop(&bank);

            let stats = bank.stats();
            println!("{} items", stats.items);
            for cache in [Some(stats.source), stats.hot_storage, Some(stats.memory)]
                .into_iter()
                .flatten()
            {
                println!(
                    "{:<12} {:>8} items {:>12} bytes (limit {})",
                    cache.format,
                    cache.item_count,
                    cache.byte_count,
                    cache
                        .max_bytes
                        .map_or_else(|| "none".to_string(), |max| max.to_string())
                );
            }
        }
    }

    Ok(())
}

fn create_bank(args: &CliArgs) -> anyhow::Result<Bank<LumpLoader>> {
    let mut flags = BankFlags::empty();
    flags.set(BankFlags::BACKGROUND_THREAD, !args.sync);
    flags.set(BankFlags::CLEAR_HOT_STORAGE_WHEN_BANK_DESTROYED, args.clear_hot_storage);
    if args.hot_storage.is_none() {
        flags |= BankFlags::DISABLE_HOT_STORAGE;
    }

    let settings = BankSettings {
        flags,
        hot_storage_location: args.hot_storage.as_ref().map(PathBuf::from),
        file_system: Arc::new(NativeFileSystem::default()),
        worker_threads: args.workers,
        memory_cache_size: args.memory_limit.map(|size| size.0),
        hot_storage_size: args.hot_storage_limit.map(|size| size.0),
    };
    Ok(Bank::new(LumpLoader, settings)?)
}

/// Keeps delivering notifications until the bank has nothing left to do.
fn run_main_loop(bank: &Bank<LumpLoader>) {
    while !bank.is_idle() {
        bank.loop_iteration();
        std::thread::sleep(Duration::from_millis(10));
    }
    bank.loop_iteration();
}
