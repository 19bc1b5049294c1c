//! On-disk formats used by the bank's hot storage.
//!
//! Every serialized item starts with a [`hot::types::HotHeader`], followed by whatever the
//! item's data type writes. This crate only knows about the header, the payload is opaque.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("The file's magic value does not match the expectation {magic:#010x}")]
    InvalidMagicValue { magic: u32 },

    #[error("Unsupported format version {version}")]
    UnsupportedVersion { version: u16 },

    #[error("The file is violating the expected format, because: {reason}")]
    FormatError { reason: &'static str },

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

pub mod common;
pub mod hot;
