use clap::{Parser, Subcommand, value_parser};
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "bank-tool")]
#[command(version)]
#[command(about = "Loads a folder of files through a data bank with hot storage")]
pub struct CliArgs {
    #[arg(long, env = "BANK_SOURCE_DIR", default_value_t = default_source_dir())]
    pub source_dir: String,

    /// Folder for serialized copies. Hot storage is disabled without one.
    #[arg(long, env = "BANK_HOT_STORAGE")]
    pub hot_storage: Option<String>,

    #[arg(long, env = "BANK_WORKERS", default_value_t = default_workers())]
    pub workers: usize,

    /// Run every job on the main thread.
    #[arg(long)]
    pub sync: bool,

    /// Delete the serialized copies when the tool exits.
    #[arg(long)]
    pub clear_hot_storage: bool,

    /// Memory cache limit, e.g. `64M`. Only enforced when purging.
    #[arg(long, value_parser = value_parser!(ByteSize))]
    pub memory_limit: Option<ByteSize>,

    /// Hot storage limit, e.g. `1G`. Only enforced when purging.
    #[arg(long, value_parser = value_parser!(ByteSize))]
    pub hot_storage_limit: Option<ByteSize>,

    #[command(subcommand)]
    pub command: Command,
}

pub fn default_source_dir() -> String {
    std::env::current_dir()
        .expect("Can't read current working directory!")
        .join("_data")
        .to_string_lossy()
        .to_string()
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, |threads| threads.get())
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints every item with its cache level, optionally only those below a dotted prefix.
    List { prefix: Option<String> },
    /// Loads everything and moves it to hot storage.
    Warm,
    /// Loads one item and prints its size and checksum.
    Get { item: String },
    /// Loads everything, purges the caches down to their limits and prints the accounting.
    Stats,
}

/// A number of bytes, optionally with a binary `K`, `M` or `G` suffix.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ByteSize(pub u64);

impl FromStr for ByteSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (digits, multiplier) = match trimmed.chars().last().map(|c| c.to_ascii_uppercase()) {
            Some('K') => (&trimmed[..trimmed.len() - 1], 1u64 << 10),
            Some('M') => (&trimmed[..trimmed.len() - 1], 1u64 << 20),
            Some('G') => (&trimmed[..trimmed.len() - 1], 1u64 << 30),
            _ => (trimmed, 1),
        };

        let value = digits
            .trim()
            .parse::<u64>()
            .map_err(|er| format!("Invalid size \"{}\": {}", s, er))?;

        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| format!("Size \"{}\" is too large", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!("512".parse::<ByteSize>(), Ok(ByteSize(512)));
        assert_eq!("4k".parse::<ByteSize>(), Ok(ByteSize(4096)));
        assert_eq!("64M".parse::<ByteSize>(), Ok(ByteSize(64 << 20)));
        assert_eq!(" 2G ".parse::<ByteSize>(), Ok(ByteSize(2 << 30)));
        assert!("lots".parse::<ByteSize>().is_err());
        assert!("M".parse::<ByteSize>().is_err());
    }

    #[test]
    fn parses_command_line() {
        let args = CliArgs::parse_from([
            "bank-tool",
            "--source-dir",
            "/tmp/wads",
            "--hot-storage",
            "/tmp/hot",
            "--sync",
            "--memory-limit",
            "1M",
            "get",
            "sounds.explosion",
        ]);
        assert_eq!(args.source_dir, "/tmp/wads");
        assert_eq!(args.hot_storage.as_deref(), Some("/tmp/hot"));
        assert!(args.sync);
        assert_eq!(args.memory_limit, Some(ByteSize(1 << 20)));
        assert!(matches!(args.command, Command::Get { item } if item == "sounds.explosion"));
    }
}
