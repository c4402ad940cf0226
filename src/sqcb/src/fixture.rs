//! Synthetic bank builder for tests

use crate::{TagWidth, HEADER, VERSION};

pub(crate) struct Builder {
    tag_width: TagWidth,
    entries: Vec<(Vec<u16>, Vec<u8>)>,
    skews: Vec<(usize, i64)>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            tag_width: TagWidth::Narrow,
            entries: Vec::new(),
            skews: Vec::new(),
        }
    }

    pub fn tag_width(mut self, width: TagWidth) -> Self {
        self.tag_width = width;
        self
    }

    pub fn entry(self, name: &str, payload: &[u8]) -> Self {
        self.raw_entry(name.encode_utf16().collect(), payload)
    }

    pub fn raw_entry(mut self, name: Vec<u16>, payload: &[u8]) -> Self {
        self.entries.push((name, payload.to_vec()));
        self
    }

    /// Declare entry `index` at its true offset plus `delta`
    pub fn skew_offset(mut self, index: usize, delta: i64) -> Self {
        self.skews.push((index, delta));
        self
    }

    fn write_tag(&self, out: &mut Vec<u8>, tag: &[u8; 4]) {
        for &b in tag {
            match self.tag_width {
                TagWidth::Narrow => out.push(b),
                TagWidth::Wide => out.extend_from_slice(&u16::from(b).to_le_bytes()),
            }
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let table_len: usize = self
            .entries
            .iter()
            .map(|(name, _)| name.len() * 2 + 2 + 8)
            .sum();
        let mut offset = (self.tag_width.preamble_len() + table_len) as i64;

        let mut out = Vec::new();
        self.write_tag(&mut out, HEADER);
        self.write_tag(&mut out, VERSION);
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());

        for (i, (name, payload)) in self.entries.iter().enumerate() {
            for unit in name {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out.extend_from_slice(&[0, 0]);

            let skew: i64 = self
                .skews
                .iter()
                .filter(|(index, _)| *index == i)
                .map(|(_, delta)| delta)
                .sum();
            out.extend_from_slice(&((offset + skew) as u32).to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            offset += payload.len() as i64;
        }

        for (_, payload) in &self.entries {
            out.extend_from_slice(payload);
        }
        out
    }
}
