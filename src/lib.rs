//! A multi-tiered data bank: named items whose data is loaded from a source, kept in memory
//! while in use, and parked as serialized copies in a "hot storage" folder in between.

pub mod bank;
pub mod concurrency;
pub mod fs;
pub mod lumps;
pub mod path;

pub use bank::error::BankError;
pub use bank::{Bank, BankData, BankFlags, BankSettings, BankStats, CacheLevel, DataLoader, Importance, Source};
pub use path::DotPath;
