//! Repository traversal: which files get scanned and how their bytes become
//! text.
//!
//! The walker is deliberately forgiving. Binary files, oversized files, and
//! unreadable files are skipped with a log line; only the scan of the
//! surviving text decides whether anything interesting was found.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory names never descended into.
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "vendor",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    "dist",
    "build",
];

/// Bytes sniffed from the head of a file to detect binary content.
const BINARY_SNIFF_BYTES: usize = 8192;

#[derive(Debug, Error)]
pub enum FileSkip {
    #[error("binary file")]
    Binary,
    #[error("file exceeds size cap ({size} > {cap} bytes)")]
    Oversized { size: u64, cap: u64 },
    #[error("unreadable: {0}")]
    Unreadable(String),
}

/// Collect every scannable file under `root`, in deterministic path order.
///
/// Files over `max_file_size` bytes are skipped here so their contents are
/// never read at all.
pub fn collect_files(root: &Path, max_file_size: u64) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let walk = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && SKIP_DIRS.contains(&entry.file_name().to_string_lossy().as_ref()))
        });

    for entry in walk {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) if metadata.len() > max_file_size => {
                debug!(
                    path = %entry.path().display(),
                    size = metadata.len(),
                    cap = max_file_size,
                    "skipping oversized file"
                );
            }
            Ok(_) => files.push(entry.into_path()),
            Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping file"),
        }
    }

    files
}

/// Read `path` as text.
///
/// Binary content (NUL byte in the first [`BINARY_SNIFF_BYTES`]) is skipped.
/// Invalid UTF-8 elsewhere is decoded lossily so the scanner sees whatever
/// decodable text exists.
pub fn read_text(path: &Path) -> Result<String, FileSkip> {
    let bytes = std::fs::read(path).map_err(|e| FileSkip::Unreadable(e.to_string()))?;

    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    if sniff.contains(&0) {
        return Err(FileSkip::Binary);
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Path of `file` relative to `root`, as the label attached to findings.
pub fn relative_label(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .display()
        .to_string()
}
