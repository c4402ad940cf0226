//! Record table entries

use serde::{Serialize, Serializer};
use std::fmt;

/// Entry name as stored in the bank
///
/// Names are kept as raw 16-bit units. They are not validated as UTF-16, so
/// an unpaired surrogate survives decoding unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RecordName(Vec<u16>);

impl RecordName {
    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    /// Raw code units, without the terminator
    pub fn units(&self) -> &[u16] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode as UTF-16, replacing invalid units with U+FFFD
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for RecordName {
    fn from(s: &str) -> Self {
        Self(s.encode_utf16().collect())
    }
}

impl fmt::Display for RecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in char::decode_utf16(self.0.iter().copied()) {
            write!(f, "{}", c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl Serialize for RecordName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}

/// One embedded file: name, absolute payload offset and payload size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    name: RecordName,
    offset: u32,
    size: u32,
}

impl Record {
    pub fn new(name: RecordName, offset: u32, size: u32) -> Self {
        Self { name, offset, size }
    }

    pub fn name(&self) -> &RecordName {
        &self.name
    }

    /// Absolute position of the payload, counted from the start of the bank
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Payload length in bytes
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Position just past the payload
    #[inline]
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}
