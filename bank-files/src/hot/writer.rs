use std::io::Write;

use crate::ParserError;
use crate::common::writer::Writable;
use crate::hot::types::HotHeader;

pub struct HotStorageWriter {}

impl HotStorageWriter {
    pub fn write_header<W: Write>(wtr: &mut W, timestamp: Option<(i64, u32)>) -> Result<(), ParserError> {
        HotHeader::new(timestamp).write(wtr)
    }
}
