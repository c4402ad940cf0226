//! Record table listing

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use sqcb::{Bank, Record, TagWidth};

use super::BankFile;

/// Record table of one bank
#[derive(Debug, Serialize)]
pub struct Listing {
    pub path: PathBuf,
    pub records: Vec<Record>,
}

/// Read a bank's record table without extracting anything
pub fn read_listing(path: &Path, tag_width: TagWidth) -> Result<Listing> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut bank = Bank::with_tag_width(BufReader::new(file), tag_width);
    let records = bank
        .records()
        .with_context(|| format!("Failed to read record table of {}", path.display()))?
        .to_vec();

    Ok(Listing {
        path: path.to_path_buf(),
        records,
    })
}

fn format_listing(listing: &Listing) -> String {
    let mut out = format!("{} ({} entries)\n", listing.path.display(), listing.records.len());
    for record in &listing.records {
        out.push_str(&format!(
            "  {:>10} {:>10}  {}\n",
            record.offset(),
            record.size(),
            record.name()
        ));
    }
    out
}

/// Print the record tables of the given banks
pub fn list_banks(
    banks: &[BankFile],
    tag_width: TagWidth,
    json: bool,
    keep_going: bool,
) -> Result<usize> {
    let mut listings = Vec::with_capacity(banks.len());
    let mut failed = 0;

    for bank in banks {
        match read_listing(&bank.path, tag_width) {
            Ok(listing) => {
                if !json {
                    print!("{}", format_listing(&listing));
                }
                listings.push(listing);
            }
            Err(e) if keep_going => {
                tracing::error!("{:#}", e);
                failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
    }

    Ok(failed)
}
