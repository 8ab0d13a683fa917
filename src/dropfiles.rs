//! # DROPFILES Payload
//!
//! Builds the byte block Windows Explorer puts on the clipboard when you copy
//! files (clipboard format `CF_HDROP`). A file manager pasting from the clipboard
//! parses this byte-for-byte, so the layout below is fixed:
//!
//! ```text
//! offset  size  field
//! 0       4     pFiles  (offset to the file list, always 20)
//! 4       4     pt.x    (0)
//! 8       4     pt.y    (0)
//! 12      4     fNC     (0)
//! 16      4     fWide   (1, the list is UTF-16LE)
//! 20      ..    path1 NUL path2 NUL ... pathN NUL NUL
//! ```
//!
//! All integers are little-endian. Nothing here touches the clipboard itself;
//! see `clipboard` for that.

use std::path::{Path, PathBuf};
use log::{debug, warn};
use path_absolutize::Absolutize;

/// Size of the fixed DROPFILES header, which is also where the file list starts.
pub const HEADER_LEN: u32 = 20;

/// The fixed header in front of the file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropFilesHeader {
    pub files_offset: u32,
    pub point_x: u32,
    pub point_y: u32,
    pub non_client: u32,
    pub wide: u32,
}

impl Default for DropFilesHeader {
    fn default() -> Self {
        Self {
            files_offset: HEADER_LEN,
            point_x: 0,
            point_y: 0,
            non_client: 0,
            wide: 1,
        }
    }
}

impl DropFilesHeader {
    pub fn to_le_bytes(self) -> [u8; HEADER_LEN as usize] {
        let mut out = [0u8; HEADER_LEN as usize];
        let fields = [self.files_offset, self.point_x, self.point_y, self.non_client, self.wide];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }
}

/// Normalizes `paths` to absolute form and keeps only the ones that exist.
///
/// `.` and `..` are resolved lexically against the current directory. Missing
/// paths are logged and dropped; order is preserved. An empty result means there
/// is nothing to package.
pub fn validate_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    let mut valid = Vec::with_capacity(paths.len());

    for p in paths {
        let p = p.as_ref();
        let abs = match p.absolutize() {
            Ok(abs) => abs.into_owned(),
            Err(e) => {
                warn!("Cannot resolve {:?}: {}", p, e);
                continue;
            }
        };

        if abs.exists() {
            valid.push(abs);
        } else {
            warn!("File not found, leaving it out: {:?}", abs);
        }
    }

    debug!("{} of {} path(s) survived validation", valid.len(), paths.len());
    valid
}

/// Builds the complete CF_HDROP payload for already validated paths.
pub fn build_payload<P: AsRef<Path>>(paths: &[P]) -> Vec<u8> {
    let mut units: Vec<u16> = Vec::new();
    for p in paths {
        units.extend(wide(p.as_ref()));
        units.push(0);
    }
    // End of list.
    units.push(0);

    let mut payload = Vec::with_capacity(HEADER_LEN as usize + units.len() * 2);
    payload.extend_from_slice(&DropFilesHeader::default().to_le_bytes());
    for unit in units {
        payload.extend_from_slice(&unit.to_le_bytes());
    }
    payload
}

#[cfg(windows)]
fn wide(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().collect()
}

#[cfg(not(windows))]
fn wide(path: &Path) -> Vec<u16> {
    path.to_string_lossy().encode_utf16().collect()
}
