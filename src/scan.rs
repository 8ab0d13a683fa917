//! # Scan Module
//!
//! Finds the files b64drop works on. Everything here is shallow (depth 1):
//! a batch converts the files sitting directly in the chosen folder, never
//! the contents of its sub-folders.
//!
//! Two listings are provided:
//!
//! 1.  **Sources** (`list_sources`): regular files matching an optional suffix filter.
//! 2.  **Outputs** (`list_converted`): `*.base64.txt` files already produced in a save directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use log::debug;

/// Every file written by the encoder ends with this suffix.
pub const OUTPUT_SUFFIX: &str = ".base64.txt";

/// A case-sensitive file name suffix filter, as typed by the user (e.g. `docx`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuffixFilter {
    /// Normalized extension without the leading dot. Empty means "everything".
    ext: String,
}

impl SuffixFilter {
    /// Builds a filter from raw user input.
    ///
    /// Surrounding whitespace is ignored and one leading `.` is accepted,
    /// so `" docx"`, `"docx"` and `".docx"` are the same filter.
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let ext = trimmed.strip_prefix('.').unwrap_or(trimmed);
        Self { ext: ext.to_string() }
    }

    pub fn is_empty(&self) -> bool {
        self.ext.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.ext
    }

    /// `true` when `file_name` ends with `.<ext>`, or always when the filter is empty.
    pub fn matches(&self, file_name: &str) -> bool {
        if self.ext.is_empty() {
            return true;
        }
        file_name
            .strip_suffix(self.ext.as_str())
            .is_some_and(|rest| rest.ends_with('.'))
    }
}

/// Lists the regular files directly inside `dir` that pass `filter`.
///
/// Results are sorted by file name so a batch always runs in the same order.
/// Errors only when `dir` itself cannot be read; unreadable entries are skipped.
pub fn list_sources(dir: &Path, filter: &SuffixFilter) -> walkdir::Result<Vec<PathBuf>> {
    debug!("Scanning source directory: {:?} (filter: {:?})", dir, filter.as_str());
    let mut files = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            // The root failing means there is nothing to scan at all.
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        // Follow symlinks for the type check, like a plain `is_file()` does.
        if !entry.path().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if filter.matches(&name) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Lists the `*.base64.txt` files directly inside `dir`.
///
/// A missing or unreadable directory yields an empty list: there is simply nothing to copy.
pub fn list_converted(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(OUTPUT_SUFFIX))
        .map(|e| e.into_path())
        .collect()
}
