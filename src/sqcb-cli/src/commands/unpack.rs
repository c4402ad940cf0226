//! Bank extraction

use anyhow::{Context, Result};
use std::path::Path;

use sqcb::{LogListener, TagWidth, Unpacker};

use super::BankFile;

/// Extraction settings resolved from config and arguments
#[derive(Debug, Clone)]
pub struct Options<'a> {
    pub output: Option<&'a Path>,
    pub tag_width: TagWidth,
    pub buffer_size: usize,
    pub keep_going: bool,
}

/// Totals of a run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub entries: usize,
    pub banks: usize,
    pub failed: usize,
}

/// Extract every bank in order
///
/// A failing bank aborts the run unless `keep_going` is set, in which case it
/// is logged and the next bank is tried. A broken bank is never resumed.
/// Two banks that would share an output directory count as a failure of the
/// second one.
pub fn unpack_banks(banks: &[BankFile], options: &Options<'_>) -> Result<Summary> {
    let mut unpacker = Unpacker::new()
        .with_buffer_size(options.buffer_size)
        .with_tag_width(options.tag_width)
        .with_listener(LogListener);
    if let Some(output) = options.output {
        unpacker = unpacker.with_output(output);
    }

    let mut summary = Summary::default();
    for bank in banks {
        match unpacker.unpack_file_in(&bank.path, &bank.root) {
            Ok(count) => {
                summary.entries += count;
                summary.banks += 1;
            }
            Err(e) if options.keep_going => {
                tracing::error!("Failed to unpack {}: {}", bank.path.display(), e);
                summary.failed += 1;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to unpack {}", bank.path.display()));
            }
        }
    }

    Ok(summary)
}
