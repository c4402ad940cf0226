//! Header and record table decoding

use byteorder::{LittleEndian as LE, ReadBytesExt};
use std::io::{self, Read};

use crate::{Error, Record, RecordName, Result, HEADER, VERSION};

/// Upper bound on table pre-allocation; the declared count is not trusted
const MAX_PREALLOC: usize = 1024;

/// How the header and version tags are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagWidth {
    /// One byte per character, 4 bytes per tag
    #[default]
    Narrow,
    /// One 16-bit little-endian unit per character, 8 bytes per tag
    Wide,
}

impl TagWidth {
    /// Bytes occupied by one tag
    pub fn tag_len(self) -> usize {
        match self {
            TagWidth::Narrow => HEADER.len(),
            TagWidth::Wide => HEADER.len() * 2,
        }
    }

    /// Bytes occupied by header, version and record count
    pub fn preamble_len(self) -> usize {
        self.tag_len() * 2 + 4
    }
}

/// Map a short read onto `Error::Truncated`, keeping other I/O failures as-is
fn field<T>(result: io::Result<T>, field: &'static str) -> Result<T> {
    result.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::Truncated { field },
        _ => Error::Io(e),
    })
}

/// Read one tag as 16-bit units, whatever its on-disk width
fn read_tag<R: Read>(reader: &mut R, width: TagWidth, name: &'static str) -> Result<Vec<u16>> {
    match width {
        TagWidth::Narrow => {
            let mut buf = [0u8; 4];
            field(reader.read_exact(&mut buf), name)?;
            Ok(buf.iter().map(|&b| u16::from(b)).collect())
        }
        TagWidth::Wide => {
            let mut units = [0u16; 4];
            field(reader.read_u16_into::<LE>(&mut units), name)?;
            Ok(units.to_vec())
        }
    }
}

fn tag_matches(units: &[u16], expected: &[u8; 4]) -> bool {
    units.iter().copied().eq(expected.iter().map(|&b| u16::from(b)))
}

/// Read a zero-terminated name of 16-bit units
fn read_name<R: Read>(reader: &mut R) -> Result<RecordName> {
    let mut units = Vec::new();
    loop {
        let unit = field(reader.read_u16::<LE>(), "record name")?;
        if unit == 0 {
            return Ok(RecordName::from_units(units));
        }
        units.push(unit);
    }
}

/// Decode the bank preamble and record table
///
/// Consumes exactly the header, version, count and table bytes. On return the
/// reader sits at the first byte after the table.
pub fn read_table<R: Read>(reader: &mut R, width: TagWidth) -> Result<Vec<Record>> {
    let header = read_tag(reader, width, "header")?;
    if !tag_matches(&header, HEADER) {
        return Err(Error::InvalidHeader(String::from_utf16_lossy(&header)));
    }

    let version = read_tag(reader, width, "version")?;
    if !tag_matches(&version, VERSION) {
        return Err(Error::InvalidVersion(String::from_utf16_lossy(&version)));
    }

    let count = field(reader.read_u32::<LE>(), "record count")?;
    let mut records = Vec::with_capacity((count as usize).min(MAX_PREALLOC));

    for _ in 0..count {
        let name = read_name(reader)?;
        let offset = field(reader.read_u32::<LE>(), "record offset")?;
        let size = field(reader.read_u32::<LE>(), "record size")?;
        records.push(Record::new(name, offset, size));
    }

    tracing::debug!(count, "decoded record table");
    Ok(records)
}
