//! Sequential bank session
//!
//! A [`Bank`] owns the byte source and hands out one [`Entry`] at a time, in
//! table order. Each entry borrows the bank mutably, so the next entry cannot
//! be opened while the previous one is still alive.
//!
//! Before opening an entry the bank compares the bytes consumed so far with
//! the entry's declared offset. A mismatch means either the table is wrong or
//! the previous entry was not read to the end, and the session fails with
//! [`Error::BrokenFile`].

use std::io::{self, Read};

use crate::decoder::{read_table, TagWidth};
use crate::io::{BoundedReader, CountingReader};
use crate::{Error, Record, RecordName, Result};

/// Table decoding state
#[derive(Debug)]
enum State {
    Unopened,
    Ready { records: Vec<Record>, cursor: usize },
    Failed,
}

/// An open SQCB bank
#[derive(Debug)]
pub struct Bank<R> {
    reader: CountingReader<R>,
    tag_width: TagWidth,
    state: State,
}

impl<R: Read> Bank<R> {
    /// Open a bank with narrow (single-byte) tags
    pub fn new(reader: R) -> Self {
        Self::with_tag_width(reader, TagWidth::Narrow)
    }

    pub fn with_tag_width(reader: R, tag_width: TagWidth) -> Self {
        Self {
            reader: CountingReader::new(reader),
            tag_width,
            state: State::Unopened,
        }
    }

    /// Decode the table if that has not happened yet
    fn decode(&mut self) -> Result<()> {
        match self.state {
            State::Ready { .. } => Ok(()),
            State::Failed => Err(Error::Failed),
            State::Unopened => match read_table(&mut self.reader, self.tag_width) {
                Ok(records) => {
                    self.state = State::Ready { records, cursor: 0 };
                    Ok(())
                }
                Err(e) => {
                    self.state = State::Failed;
                    Err(e)
                }
            },
        }
    }

    /// The full record table
    pub fn records(&mut self) -> Result<&[Record]> {
        self.decode()?;
        match &self.state {
            State::Ready { records, .. } => Ok(records),
            _ => Err(Error::Failed),
        }
    }

    /// Whether another entry is available
    pub fn has_next(&mut self) -> Result<bool> {
        self.decode()?;
        match &self.state {
            State::Ready { records, cursor } => Ok(*cursor < records.len()),
            _ => Err(Error::Failed),
        }
    }

    /// Check the stream position against the current record and advance the
    /// cursor past it. Returns the index of the record to open.
    fn advance(&mut self) -> Result<usize> {
        self.decode()?;
        let position = self.reader.bytes_read();

        let State::Ready { records, cursor } = &mut self.state else {
            return Err(Error::Failed);
        };
        let record = records.get(*cursor).ok_or(Error::Exhausted)?;

        if position != u64::from(record.offset()) {
            let err = Error::BrokenFile {
                name: record.name().to_string_lossy(),
                expected: record.offset(),
                actual: position,
            };
            tracing::warn!(index = *cursor, "{}", err);
            self.state = State::Failed;
            return Err(err);
        }

        let index = *cursor;
        *cursor += 1;
        Ok(index)
    }

    /// Open the next entry
    ///
    /// The returned entry must be read to the end before calling `next` again,
    /// otherwise that call fails with [`Error::BrokenFile`].
    pub fn next(&mut self) -> Result<Entry<'_, R>> {
        let index = self.advance()?;

        let Self { reader, state, .. } = self;
        let State::Ready { records, .. } = state else {
            return Err(Error::Failed);
        };
        let record = &records[index];

        tracing::debug!(
            index,
            name = %record.name(),
            offset = record.offset(),
            size = record.size(),
            "opening entry"
        );

        Ok(Entry {
            index,
            record,
            stream: BoundedReader::new(reader, u64::from(record.size())),
        })
    }

    /// Bytes consumed from the source so far
    pub fn position(&self) -> u64 {
        self.reader.bytes_read()
    }

    /// Index of the next entry to be opened
    pub fn cursor(&self) -> usize {
        match &self.state {
            State::Ready { cursor, .. } => *cursor,
            _ => 0,
        }
    }

    /// Whether the session hit a fatal error
    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    /// Release the byte source
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// One embedded file, readable up to its declared size
#[derive(Debug)]
pub struct Entry<'a, R> {
    index: usize,
    record: &'a Record,
    stream: BoundedReader<&'a mut CountingReader<R>>,
}

impl<R: Read> Entry<'_, R> {
    /// Position of this entry in the table
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn record(&self) -> &Record {
        self.record
    }

    pub fn name(&self) -> &RecordName {
        self.record.name()
    }

    /// Payload bytes not yet read
    pub fn remaining(&self) -> u64 {
        self.stream.remaining()
    }
}

impl<R: Read> Read for Entry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}
