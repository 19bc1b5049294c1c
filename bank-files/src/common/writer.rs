use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ParserError;

pub trait Writable {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError>;
}

impl Writable for u8 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u8(*self)?)
    }
}

impl Writable for u16 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u16::<LittleEndian>(*self)?)
    }
}

impl Writable for u32 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u32::<LittleEndian>(*self)?)
    }
}

impl Writable for i64 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_i64::<LittleEndian>(*self)?)
    }
}

impl Writable for u64 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u64::<LittleEndian>(*self)?)
    }
}

/// Counterpart of [`crate::common::reader::read_sized_blob`].
pub fn write_sized_blob<W: Write>(wtr: &mut W, blob: &[u8]) -> Result<(), ParserError> {
    let len = u32::try_from(blob.len()).map_err(|_| ParserError::FormatError {
        reason: "Blob exceeds 4 GiB",
    })?;
    wtr.write_u32::<LittleEndian>(len)?;
    wtr.write_all(blob)?;
    Ok(())
}
