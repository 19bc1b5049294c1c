use bank_files_derive_serial::Serial;

/// `BNKH`, little endian.
pub const HOT_HEADER_MAGIC: u32 = u32::from_le_bytes(*b"BNKH");
pub const HOT_HEADER_VERSION: u16 = 1;

/// Fixed-size prefix of every file in hot storage. The only semantic content is the
/// modification time of the item's source at the time it was serialized.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serial)]
pub struct HotHeader {
    pub magic: u32,
    pub version: u16,
    pub has_timestamp: u8,
    pub seconds: i64,
    pub nanos: u32,
}

impl HotHeader {
    /// Size of the header on disk, in bytes.
    pub const SIZE: usize = 4 + 2 + 1 + 8 + 4;

    pub fn new(timestamp: Option<(i64, u32)>) -> Self {
        let (seconds, nanos) = timestamp.unwrap_or((0, 0));
        Self {
            magic: HOT_HEADER_MAGIC,
            version: HOT_HEADER_VERSION,
            has_timestamp: timestamp.is_some() as u8,
            seconds,
            nanos,
        }
    }

    /// Seconds and nanoseconds since the Unix epoch, `None` if the source had no known
    /// modification time.
    pub fn timestamp(&self) -> Option<(i64, u32)> {
        (self.has_timestamp != 0).then_some((self.seconds, self.nanos))
    }
}
