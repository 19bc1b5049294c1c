use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;

pub trait Parseable<T> {
    fn parse<R: Read>(rdr: &mut R) -> Result<T, ParserError>;
}

impl Parseable<u8> for u8 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u8, ParserError> {
        Ok(rdr.read_u8()?)
    }
}

impl Parseable<u16> for u16 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u16, ParserError> {
        Ok(rdr.read_u16::<LittleEndian>()?)
    }
}

impl Parseable<u32> for u32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u32, ParserError> {
        Ok(rdr.read_u32::<LittleEndian>()?)
    }
}

impl Parseable<i64> for i64 {
    fn parse<R: Read>(rdr: &mut R) -> Result<i64, ParserError> {
        Ok(rdr.read_i64::<LittleEndian>()?)
    }
}

impl Parseable<u64> for u64 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u64, ParserError> {
        Ok(rdr.read_u64::<LittleEndian>()?)
    }
}

/// Reads a `u32` length prefix followed by that many bytes.
pub fn read_sized_blob<R: Read>(rdr: &mut R) -> Result<Vec<u8>, ParserError> {
    let len = rdr.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    rdr.read_exact(&mut buf)?;
    Ok(buf)
}
