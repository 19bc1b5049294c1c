use std::io::Read;

use crate::ParserError;
use crate::common::reader::Parseable;
use crate::hot::types::{HOT_HEADER_MAGIC, HOT_HEADER_VERSION, HotHeader};

pub struct HotStorageReader {}

impl HotStorageReader {
    /// Reads and validates the header, leaving `rdr` positioned at the start of the payload.
    pub fn parse_header<R: Read>(rdr: &mut R) -> Result<HotHeader, ParserError> {
        let header = HotHeader::parse(rdr)?;
        if header.magic != HOT_HEADER_MAGIC {
            return Err(ParserError::InvalidMagicValue { magic: header.magic });
        }

        if header.version != HOT_HEADER_VERSION {
            return Err(ParserError::UnsupportedVersion {
                version: header.version,
            });
        }

        if header.has_timestamp > 1 || header.nanos >= 1_000_000_000 {
            return Err(ParserError::FormatError {
                reason: "Corrupt timestamp",
            });
        }

        Ok(header)
    }
}
