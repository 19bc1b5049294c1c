use crate::path::DotPath;
use bank_files::ParserError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BankError {
    /// A blocking request for an item's data finished without the item being in memory.
    #[error("Failed to load \"{path}\"")]
    Load { path: DotPath },

    #[error("The bank has no item \"{path}\"")]
    NotFound { path: DotPath },

    #[error("Loading \"{path}\" from source produced no data")]
    NothingLoaded { path: DotPath },

    #[error("Hot storage is disabled")]
    HotStorageDisabled,

    #[error("Invalid hot storage header: {0}")]
    Header(#[from] ParserError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Raised by the data type or the loader of a concrete bank.
    #[error(transparent)]
    Data(#[from] anyhow::Error),
}
