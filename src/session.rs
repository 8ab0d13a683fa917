//! # Session
//!
//! The state one run of b64drop carries between its actions: which mode it is
//! in, where files come from, where they go, and what was converted last.
//! The front end owns the single `Session`; the encoder and the clipboard only
//! ever see paths borrowed from it.

use std::path::{Path, PathBuf};
use crate::scan;

/// One file at a time, or a whole folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SingleFile,
    Batch,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub mode: Mode,
    /// Folder picked for batch mode.
    pub source_dir: Option<PathBuf>,
    /// Where outputs go. `None` means "next to the sources".
    pub save_dir: Option<PathBuf>,
    /// Output of the most recent single-file conversion.
    pub last_converted: Option<PathBuf>,
}

impl Session {
    pub fn single_file(save_dir: Option<PathBuf>) -> Self {
        Self {
            mode: Mode::SingleFile,
            source_dir: None,
            save_dir,
            last_converted: None,
        }
    }

    pub fn batch(source_dir: PathBuf, save_dir: Option<PathBuf>) -> Self {
        Self {
            mode: Mode::Batch,
            source_dir: Some(source_dir),
            save_dir,
            last_converted: None,
        }
    }

    /// The directory outputs for `source` are written to.
    ///
    /// The chosen save directory wins. Otherwise a single file is saved next to
    /// itself and a batch is saved into its source directory.
    pub fn save_dir_for(&self, source: &Path) -> PathBuf {
        if let Some(dir) = &self.save_dir {
            return dir.clone();
        }
        match (self.mode, &self.source_dir) {
            (Mode::Batch, Some(dir)) => dir.clone(),
            _ => source
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// The directory whose outputs a batch "copy files" action picks up.
    pub fn output_dir(&self) -> Option<&Path> {
        self.save_dir.as_deref().or(self.source_dir.as_deref())
    }

    /// The files a "copy converted files" action should put on the clipboard.
    ///
    /// Single-file mode: the last converted file, if it still exists.
    /// Batch mode: every `*.base64.txt` in the output directory.
    pub fn converted_files(&self) -> Vec<PathBuf> {
        match self.mode {
            Mode::SingleFile => self
                .last_converted
                .iter()
                .filter(|p| p.exists())
                .cloned()
                .collect(),
            Mode::Batch => self.output_dir().map(scan::list_converted).unwrap_or_default(),
        }
    }

    pub fn record_conversion(&mut self, output: &Path) {
        self.last_converted = Some(output.to_path_buf());
    }
}
