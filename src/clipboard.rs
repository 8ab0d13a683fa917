//! # Clipboard
//!
//! Everything b64drop puts on the clipboard goes through `ClipboardBackend`,
//! so the platform calls can be swapped for a mock in tests.
//!
//! Copying *files* comes in two flavours, chosen once at startup by
//! `FileCopier::probe()`:
//!
//! - `FileDrop`: a CF_HDROP list, pasteable in Explorer (Windows only).
//! - `PlainText`: the newline-joined paths as text. Always available, and used as
//!   the fallback whenever the file drop cannot be set.

use std::path::{Path, PathBuf};
use log::{info, warn};
use thiserror::Error;
use crate::dropfiles;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("none of the given files exist")]
    NoFiles,

    #[error("clipboard unavailable: {0}")]
    ClipboardUnavailable(String),
}

/// The raw clipboard operations b64drop needs.
pub trait ClipboardBackend {
    /// Replace the clipboard content with plain text.
    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Replace the clipboard content with a CF_HDROP payload (see `dropfiles`).
    fn set_file_drop(&self, payload: &[u8]) -> Result<(), ClipboardError>;
}

/// The real clipboard: `arboard` for text, the Win32 API for file drops.
pub struct SystemClipboard;

impl ClipboardBackend for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| ClipboardError::ClipboardUnavailable(format!("failed to access clipboard: {}", e)))?;
        clipboard
            .set_text(text)
            .map_err(|e| ClipboardError::ClipboardUnavailable(format!("failed to write clipboard: {}", e)))
    }

    #[cfg(windows)]
    fn set_file_drop(&self, payload: &[u8]) -> Result<(), ClipboardError> {
        win32::set_file_drop(payload)
    }

    #[cfg(not(windows))]
    fn set_file_drop(&self, _payload: &[u8]) -> Result<(), ClipboardError> {
        Err(ClipboardError::ClipboardUnavailable(
            "file drops are only supported on Windows".to_string(),
        ))
    }
}

#[cfg(windows)]
mod win32 {
    use super::ClipboardError;
    use windows::Win32::Foundation::{GlobalFree, HANDLE};
    use windows::Win32::System::DataExchange::{CloseClipboard, EmptyClipboard, OpenClipboard, SetClipboardData};
    use windows::Win32::System::Memory::{GlobalAlloc, GlobalLock, GlobalUnlock, GMEM_MOVEABLE};
    use windows::Win32::System::Ole::CF_HDROP;

    fn unavailable(what: &str, e: windows::core::Error) -> ClipboardError {
        ClipboardError::ClipboardUnavailable(format!("{}: {}", what, e))
    }

    /// Copies `payload` into a movable global block and hands it to the clipboard.
    ///
    /// On success the clipboard owns the block; on any failure we free it ourselves.
    pub(super) fn set_file_drop(payload: &[u8]) -> Result<(), ClipboardError> {
        unsafe {
            let hglobal = GlobalAlloc(GMEM_MOVEABLE, payload.len()).map_err(|e| unavailable("GlobalAlloc failed", e))?;

            let dst = GlobalLock(hglobal);
            if dst.is_null() {
                let _ = GlobalFree(Some(hglobal));
                return Err(ClipboardError::ClipboardUnavailable("GlobalLock failed".to_string()));
            }
            std::ptr::copy_nonoverlapping(payload.as_ptr(), dst as *mut u8, payload.len());
            // Reports an "error" once the lock count hits zero, which is the normal case.
            let _ = GlobalUnlock(hglobal);

            if let Err(e) = OpenClipboard(None) {
                let _ = GlobalFree(Some(hglobal));
                return Err(unavailable("OpenClipboard failed", e));
            }

            let result = EmptyClipboard()
                .and_then(|_| SetClipboardData(CF_HDROP.0 as u32, Some(HANDLE(hglobal.0))))
                .map(|_| ());
            let _ = CloseClipboard();

            if let Err(e) = result {
                let _ = GlobalFree(Some(hglobal));
                return Err(unavailable("SetClipboardData(CF_HDROP) failed", e));
            }
        }
        Ok(())
    }
}

/// What actually ended up on the clipboard, with the number of files in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    FileDrop(usize),
    PlainText(usize),
}

/// The "copy these files" capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCopier {
    FileDrop,
    PlainText,
}

impl FileCopier {
    /// Picks the best copier for this platform.
    pub fn probe() -> Self {
        if cfg!(windows) {
            FileCopier::FileDrop
        } else {
            FileCopier::PlainText
        }
    }

    /// Puts `paths` on the clipboard.
    ///
    /// Missing paths are dropped first. Fails with `NoFiles` (leaving the clipboard
    /// untouched) if none remain. A file-drop failure falls back to plain text.
    pub fn copy_files<P: AsRef<Path>>(
        self,
        backend: &impl ClipboardBackend,
        paths: &[P],
    ) -> Result<CopyOutcome, ClipboardError> {
        let valid = dropfiles::validate_paths(paths);
        if valid.is_empty() {
            return Err(ClipboardError::NoFiles);
        }

        if self == FileCopier::FileDrop {
            let payload = dropfiles::build_payload(&valid);
            match backend.set_file_drop(&payload) {
                Ok(()) => {
                    info!("Copied {} file(s) to the clipboard. Paste them in Explorer with Ctrl+V.", valid.len());
                    return Ok(CopyOutcome::FileDrop(valid.len()));
                }
                Err(e) => warn!("File drop failed ({}), copying the paths as text instead", e),
            }
        }

        backend.set_text(&path_list_text(&valid))?;
        info!("Copied {} path(s) to the clipboard as text", valid.len());
        Ok(CopyOutcome::PlainText(valid.len()))
    }
}

/// Newline-joined path list, the plain-text form of a file copy.
pub fn path_list_text(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A clipboard that records what was set, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockClipboard {
    pub text: std::sync::Mutex<Option<String>>,
    pub file_drop: std::sync::Mutex<Option<Vec<u8>>>,
    pub fail_file_drop: bool,
}

#[cfg(test)]
impl MockClipboard {
    pub fn failing_file_drop() -> Self {
        Self {
            fail_file_drop: true,
            ..Default::default()
        }
    }

    pub fn is_untouched(&self) -> bool {
        self.text.lock().unwrap().is_none() && self.file_drop.lock().unwrap().is_none()
    }
}

#[cfg(test)]
impl ClipboardBackend for MockClipboard {
    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        *self.text.lock().unwrap() = Some(text.to_string());
        Ok(())
    }

    fn set_file_drop(&self, payload: &[u8]) -> Result<(), ClipboardError> {
        if self.fail_file_drop {
            return Err(ClipboardError::ClipboardUnavailable("mock refuses file drops".to_string()));
        }
        *self.file_drop.lock().unwrap() = Some(payload.to_vec());
        Ok(())
    }
}
