//! Command implementations

mod list;
mod unpack;

pub use list::list_banks;
pub use unpack::{unpack_banks, Options};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A bank file and the directory it was found in
///
/// Output paths keep the bank's location relative to `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankFile {
    pub path: PathBuf,
    pub root: PathBuf,
}

impl From<PathBuf> for BankFile {
    fn from(path: PathBuf) -> Self {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self { path, root }
    }
}

/// Expand the command-line paths into bank files
///
/// Directories are searched recursively; paths that are neither a file nor a
/// directory are reported and skipped.
pub fn collect_banks(paths: &[PathBuf]) -> Result<Vec<BankFile>> {
    let mut banks = Vec::new();

    for path in paths {
        if path.is_dir() {
            let found = sqcb::find_containers(path)
                .with_context(|| format!("Failed to search {}", path.display()))?;
            tracing::debug!("Found {} banks in {}", found.len(), path.display());
            banks.extend(found.into_iter().map(|bank| BankFile {
                path: bank,
                root: path.clone(),
            }));
        } else if path.is_file() {
            banks.push(BankFile::from(path.clone()));
        } else {
            tracing::warn!("Skipping {}: no such file or directory", path.display());
        }
    }

    Ok(banks)
}
