use std::io::{Cursor, Read};

use crate::ParserError;
use crate::common::reader::read_sized_blob;
use crate::common::writer::write_sized_blob;
use crate::hot::reader::HotStorageReader;
use crate::hot::types::{HOT_HEADER_MAGIC, HotHeader};
use crate::hot::writer::HotStorageWriter;

#[test]
fn header_keeps_timestamp_and_payload_position() -> Result<(), anyhow::Error> {
    let mut buf = Vec::new();
    HotStorageWriter::write_header(&mut buf, Some((1_700_000_000, 123_456_789)))?;
    assert_eq!(buf.len(), HotHeader::SIZE);
    buf.extend_from_slice(b"payload");

    let mut rdr = Cursor::new(buf);
    let header = HotStorageReader::parse_header(&mut rdr)?;
    assert_eq!(header.magic, HOT_HEADER_MAGIC);
    assert_eq!(header.timestamp(), Some((1_700_000_000, 123_456_789)));

    let mut rest = String::new();
    rdr.read_to_string(&mut rest)?;
    assert_eq!(rest, "payload");
    Ok(())
}

#[test]
fn unknown_timestamp() -> Result<(), anyhow::Error> {
    let mut buf = Vec::new();
    HotStorageWriter::write_header(&mut buf, None)?;
    let header = HotStorageReader::parse_header(&mut buf.as_slice())?;
    assert_eq!(header.timestamp(), None);
    Ok(())
}

#[test]
fn rejects_foreign_files() {
    let garbage = b"PNG\x00 this is not a bank file at all".to_vec();
    let res = HotStorageReader::parse_header(&mut garbage.as_slice());
    assert!(matches!(res, Err(ParserError::InvalidMagicValue { .. })));
}

#[test]
fn rejects_truncated_header() {
    let mut buf = Vec::new();
    HotStorageWriter::write_header(&mut buf, None).unwrap();
    buf.truncate(HotHeader::SIZE - 3);
    let res = HotStorageReader::parse_header(&mut buf.as_slice());
    assert!(matches!(res, Err(ParserError::IOError(_))));
}

#[test]
fn rejects_newer_versions() {
    let mut buf = Vec::new();
    HotStorageWriter::write_header(&mut buf, None).unwrap();
    buf[4] = 0xFF;
    let res = HotStorageReader::parse_header(&mut buf.as_slice());
    assert!(matches!(res, Err(ParserError::UnsupportedVersion { .. })));
}

#[test]
fn sized_blob() -> Result<(), anyhow::Error> {
    let mut buf = Vec::new();
    write_sized_blob(&mut buf, &[1, 2, 3])?;
    write_sized_blob(&mut buf, &[])?;
    let mut rdr = buf.as_slice();
    assert_eq!(read_sized_blob(&mut rdr)?, vec![1, 2, 3]);
    assert!(read_sized_blob(&mut rdr)?.is_empty());
    Ok(())
}
