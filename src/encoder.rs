//! # Encoder
//!
//! The conversion core of b64drop. It is responsible for:
//! 1. Turning one file into `<stem>[-date].base64.txt` (`convert_file`).
//! 2. Running a whole folder through the same routine (`convert_dir`), tallying
//!    successes and failures per file without ever stopping early.
//! 3. Checking a save directory up front (`ensure_writable_dir`) and reading the
//!    Base64 text back for the clipboard (`read_encoded_text`).
//!
//! Output is the standard, padded Base64 alphabet on one unbroken line.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use crate::scan::{self, SuffixFilter, OUTPUT_SUFFIX};

/// Why a conversion (or a read-back) failed.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("cannot read {path:?}: {source}")]
    SourceUnreadable { path: PathBuf, source: io::Error },

    #[error("cannot write to {path:?}: {source}")]
    DestinationUnwritable { path: PathBuf, source: io::Error },

    #[error("{path:?} is not valid Base64 text: {description}")]
    EncodingFailure { path: PathBuf, description: String },
}

/// How output files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputNaming {
    /// `<stem>.base64.txt`
    Plain,
    /// `<stem>-<YYYY-MM-DD>.base64.txt`
    Dated(NaiveDate),
}

impl OutputNaming {
    /// Dated naming using the local calendar date.
    pub fn dated_today() -> Self {
        OutputNaming::Dated(chrono::Local::now().date_naive())
    }

    /// Derives the output file name for `source`.
    ///
    /// The stem drops only the last extension: `report.tar.gz` -> `report.tar`.
    pub fn file_name_for(&self, source: &Path) -> String {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        match self {
            OutputNaming::Plain => format!("{}{}", stem, OUTPUT_SUFFIX),
            OutputNaming::Dated(date) => format!("{}-{}{}", stem, date.format("%Y-%m-%d"), OUTPUT_SUFFIX),
        }
    }
}

/// The outcome of converting one file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    /// Number of source bytes that were read (0 if reading failed).
    pub byte_length: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl ConversionResult {
    fn failed(source_path: &Path, output_path: PathBuf, byte_length: u64, err: &ConvertError) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            output_path,
            byte_length,
            success: false,
            error: Some(err.to_string()),
        }
    }
}

/// Per-file results of a folder conversion plus the aggregate counts.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub source_dir: PathBuf,
    pub save_dir: PathBuf,
    pub filter: String,
    pub results: Vec<ConversionResult>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    fn new(source_dir: &Path, save_dir: &Path, filter: &SuffixFilter, results: Vec<ConversionResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            source_dir: source_dir.to_path_buf(),
            save_dir: save_dir.to_path_buf(),
            filter: filter.as_str().to_string(),
            failed: results.len() - succeeded,
            succeeded,
            results,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }
}

/// Encodes raw bytes as standard, padded Base64.
pub fn encode_bytes(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Checks that `dir` is a directory this process can actually create files in.
///
/// Writes and removes a scratch file rather than trusting permission bits: Windows
/// marks customized folders read-only without enforcing it, and Unix bits say
/// nothing about who owns the directory.
/// Run this before any work so a bad save directory fails once, not per file.
pub fn ensure_writable_dir(dir: &Path) -> Result<(), ConvertError> {
    let unwritable = |source: io::Error| ConvertError::DestinationUnwritable {
        path: dir.to_path_buf(),
        source,
    };

    let meta = fs::metadata(dir).map_err(unwritable)?;
    if !meta.is_dir() {
        return Err(unwritable(io::Error::new(io::ErrorKind::NotADirectory, "not a directory")));
    }

    // Removed again when dropped.
    let scratch = tempfile::Builder::new()
        .prefix(".b64drop-")
        .tempfile_in(dir)
        .map_err(unwritable)?;
    debug!("Save directory {:?} is writable (probed with {:?})", dir, scratch.path());
    Ok(())
}

/// Converts one file into `<save_dir>/<stem>[-date].base64.txt`.
///
/// An existing output with the same name is overwritten.
pub fn convert_file(source: &Path, save_dir: &Path, naming: OutputNaming) -> Result<ConversionResult, ConvertError> {
    let (result, outcome) = convert_file_recorded(source, save_dir, naming);
    outcome.map(|()| result)
}

/// Like `convert_file`, but always hands back a `ConversionResult`, also for a
/// failure, next to the error itself. Used where failed files must be reported.
pub fn convert_file_recorded(
    source: &Path,
    save_dir: &Path,
    naming: OutputNaming,
) -> (ConversionResult, Result<(), ConvertError>) {
    let output_path = save_dir.join(naming.file_name_for(source));
    let (bytes_read, written) = encode_into(source, &output_path);

    match written {
        Ok(()) => {
            info!("Converted {:?} -> {:?} ({} bytes)", source, output_path, bytes_read);
            let result = ConversionResult {
                source_path: source.to_path_buf(),
                output_path,
                byte_length: bytes_read,
                success: true,
                error: None,
            };
            (result, Ok(()))
        }
        Err(e) => (ConversionResult::failed(source, output_path, bytes_read, &e), Err(e)),
    }
}

/// Reads, encodes and writes. Returns the number of bytes read alongside the outcome
/// so a failed write can still report how much was read.
fn encode_into(source: &Path, output_path: &Path) -> (u64, Result<(), ConvertError>) {
    let data = match fs::read(source) {
        Ok(d) => d,
        Err(e) => {
            return (0, Err(ConvertError::SourceUnreadable { path: source.to_path_buf(), source: e }));
        }
    };
    let bytes_read = data.len() as u64;
    let encoded = encode_bytes(&data);
    debug!("Encoded {} bytes into {} Base64 characters", bytes_read, encoded.len());

    if output_path.exists() {
        warn!("Overwriting existing file {:?}", output_path);
    }

    let written = fs::write(output_path, encoded.as_bytes()).map_err(|e| ConvertError::DestinationUnwritable {
        path: output_path.to_path_buf(),
        source: e,
    });
    (bytes_read, written)
}

/// Converts every file directly inside `source_dir` that passes `filter`.
///
/// Individual failures are recorded in the report and never stop the batch.
/// `on_progress` is called after each file with `(done, total, result)`.
/// Only a source directory that cannot be listed fails the whole call.
pub fn convert_dir(
    source_dir: &Path,
    save_dir: &Path,
    filter: &SuffixFilter,
    naming: OutputNaming,
    mut on_progress: impl FnMut(usize, usize, &ConversionResult),
) -> Result<BatchReport, ConvertError> {
    let meta = fs::metadata(source_dir).map_err(|e| ConvertError::SourceUnreadable {
        path: source_dir.to_path_buf(),
        source: e,
    })?;
    if !meta.is_dir() {
        return Err(ConvertError::SourceUnreadable {
            path: source_dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        });
    }

    let sources = scan::list_sources(source_dir, filter).map_err(|e| ConvertError::SourceUnreadable {
        path: source_dir.to_path_buf(),
        source: e.into(),
    })?;

    if sources.is_empty() {
        warn!("No files in {:?} match filter {:?}", source_dir, filter.as_str());
        return Ok(BatchReport::new(source_dir, save_dir, filter, Vec::new()));
    }

    let total = sources.len();
    info!("Converting {} file(s) from {:?} into {:?}", total, source_dir, save_dir);

    let mut results = Vec::with_capacity(total);
    for (i, source) in sources.iter().enumerate() {
        let (result, outcome) = convert_file_recorded(source, save_dir, naming);
        if let Err(e) = outcome {
            warn!("Failed to convert {:?}: {}", source, e);
        }

        on_progress(i + 1, total, &result);
        results.push(result);
    }

    let report = BatchReport::new(source_dir, save_dir, filter, results);
    info!("Batch finished: {} converted, {} failed", report.succeeded, report.failed);
    Ok(report)
}

/// Loads the Base64 text of a converted file, e.g. to put it on the clipboard.
pub fn read_encoded_text(path: &Path) -> Result<String, ConvertError> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::InvalidData {
            ConvertError::EncodingFailure {
                path: path.to_path_buf(),
                description: e.to_string(),
            }
        } else {
            ConvertError::SourceUnreadable { path: path.to_path_buf(), source: e }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn is_base64_text(s: &str) -> bool {
        s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
    }

    #[test]
    fn man_encodes_to_twfu() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("man.bin");
        fs::write(&src, [0x4D, 0x61, 0x6E]).unwrap();

        let result = convert_file(&src, dir.path(), OutputNaming::Plain).unwrap();

        assert!(result.success);
        assert_eq!(result.byte_length, 3);
        assert_eq!(result.output_path, dir.path().join("man.base64.txt"));
        assert_eq!(fs::read_to_string(&result.output_path).unwrap(), "TWFu");
    }

    #[test]
    fn output_names_follow_naming_style() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let src = Path::new("/tmp/report.tar.gz");
        assert_eq!(OutputNaming::Plain.file_name_for(src), "report.tar.base64.txt");
        assert_eq!(OutputNaming::Dated(date).file_name_for(src), "report.tar-2025-03-07.base64.txt");
        assert_eq!(OutputNaming::Plain.file_name_for(Path::new(".bashrc")), ".bashrc.base64.txt");
    }

    #[test]
    fn existing_output_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"new").unwrap();
        fs::write(dir.path().join("a.base64.txt"), b"stale content").unwrap();

        convert_file(&src, dir.path(), OutputNaming::Plain).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.base64.txt")).unwrap(), "bmV3");
    }

    #[test]
    fn missing_source_is_source_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert_file(&dir.path().join("nope.bin"), dir.path(), OutputNaming::Plain).unwrap_err();
        assert!(matches!(err, ConvertError::SourceUnreadable { .. }));
        assert!(!dir.path().join("nope.base64.txt").exists());
    }

    #[test]
    fn missing_save_dir_is_destination_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"abc").unwrap();

        let err = convert_file(&src, &dir.path().join("missing"), OutputNaming::Plain).unwrap_err();
        assert!(matches!(err, ConvertError::DestinationUnwritable { .. }));
    }

    #[test]
    fn writable_check_rejects_files_and_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, b"x").unwrap();

        assert!(ensure_writable_dir(dir.path()).is_ok());
        assert!(matches!(ensure_writable_dir(&file), Err(ConvertError::DestinationUnwritable { .. })));
        assert!(matches!(
            ensure_writable_dir(&dir.path().join("missing")),
            Err(ConvertError::DestinationUnwritable { .. })
        ));
    }

    #[test]
    fn writable_check_leaves_no_scratch_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        ensure_writable_dir(dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn writable_check_follows_real_access_not_the_read_only_bit() {
        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        let mut perms = fs::metadata(&locked).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&locked, perms.clone()).unwrap();

        let result = ensure_writable_dir(&locked);
        // Windows ignores the attribute on folders and root ignores mode bits,
        // so ask the filesystem what actually happens.
        let can_write = fs::write(locked.join("try.txt"), b"x").is_ok();
        let _ = fs::remove_file(locked.join("try.txt"));

        perms.set_readonly(false);
        fs::set_permissions(&locked, perms).unwrap();

        if can_write {
            assert!(result.is_ok(), "writable directory rejected: {:?}", result);
        } else {
            assert!(matches!(result, Err(ConvertError::DestinationUnwritable { .. })));
        }
    }

    #[test]
    fn batch_converts_only_matching_files() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), b"a").unwrap();
        fs::write(src.path().join("b.docx"), b"b").unwrap();
        fs::write(src.path().join("c.docx"), b"c").unwrap();

        let report = convert_dir(src.path(), out.path(), &SuffixFilter::new("docx"), OutputNaming::Plain, |_, _, _| {}).unwrap();

        assert_eq!(report.total(), 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 0);
        assert!(out.path().join("b.base64.txt").exists());
        assert!(out.path().join("c.base64.txt").exists());
        assert!(!out.path().join("a.base64.txt").exists());
        assert_eq!(scan::list_converted(out.path()).len(), 2);
    }

    #[test]
    fn batch_reports_progress_in_order() {
        let src = tempfile::tempdir().unwrap();
        for name in ["x.bin", "y.bin", "z.bin"] {
            fs::write(src.path().join(name), name.as_bytes()).unwrap();
        }

        let mut seen = Vec::new();
        convert_dir(src.path(), src.path(), &SuffixFilter::new("bin"), OutputNaming::Plain, |done, total, r| {
            seen.push((done, total, r.source_path.file_name().unwrap().to_string_lossy().to_string()));
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (1, 3, "x.bin".to_string()),
                (2, 3, "y.bin".to_string()),
                (3, 3, "z.bin".to_string()),
            ]
        );
    }

    #[test]
    fn batch_continues_past_failures() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("good1.dat"), b"1").unwrap();
        fs::write(src.path().join("good2.dat"), b"2").unwrap();
        fs::write(src.path().join("bad.dat"), b"3").unwrap();
        // A directory already sitting at the output path makes that one write fail.
        fs::create_dir(out.path().join("bad.base64.txt")).unwrap();

        let report = convert_dir(src.path(), out.path(), &SuffixFilter::new("dat"), OutputNaming::Plain, |_, _, _| {}).unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        let failure = report.results.iter().find(|r| !r.success).unwrap();
        assert!(failure.source_path.ends_with("bad.dat"));
        assert_eq!(failure.byte_length, 1);
        assert!(failure.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert!(out.path().join("good1.base64.txt").is_file());
    }

    #[test]
    fn batch_with_no_matches_is_empty_not_an_error() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), b"a").unwrap();

        let report = convert_dir(src.path(), src.path(), &SuffixFilter::new("pdf"), OutputNaming::Plain, |_, _, _| {}).unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn batch_over_missing_directory_fails() {
        let src = tempfile::tempdir().unwrap();
        let err = convert_dir(&src.path().join("gone"), src.path(), &SuffixFilter::default(), OutputNaming::Plain, |_, _, _| {}).unwrap_err();
        assert!(matches!(err, ConvertError::SourceUnreadable { .. }));
    }

    #[test]
    fn batch_over_a_regular_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, b"not a folder").unwrap();

        let err = convert_dir(&file, dir.path(), &SuffixFilter::default(), OutputNaming::Plain, |_, _, _| {}).unwrap_err();
        match err {
            ConvertError::SourceUnreadable { path, source } => {
                assert_eq!(path, file);
                assert_eq!(source.kind(), io::ErrorKind::NotADirectory);
            }
            other => panic!("expected SourceUnreadable, got {:?}", other),
        }
        assert!(!dir.path().join("notes.base64.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn batch_counts_unreadable_sources_and_continues() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.dat"), b"aa").unwrap();
        fs::write(src.path().join("b.dat"), b"bb").unwrap();
        fs::write(src.path().join("c.dat"), b"cc").unwrap();
        let locked = src.path().join("b.dat");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root reads through mode bits; nothing to check there.
        if fs::read(&locked).is_ok() {
            return;
        }

        let report = convert_dir(src.path(), out.path(), &SuffixFilter::new("dat"), OutputNaming::Plain, |_, _, _| {}).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        let failure = report.results.iter().find(|r| !r.success).unwrap();
        assert!(failure.source_path.ends_with("b.dat"));
        assert_eq!(failure.byte_length, 0);
        assert!(failure.error.as_deref().is_some_and(|e| e.starts_with("cannot read")));
        assert!(!out.path().join("b.base64.txt").exists());
        assert!(out.path().join("c.base64.txt").is_file());
    }

    #[test]
    fn recorded_conversion_describes_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.pdf");

        let (result, outcome) = convert_file_recorded(&missing, dir.path(), OutputNaming::Plain);

        assert!(matches!(outcome, Err(ConvertError::SourceUnreadable { .. })));
        assert!(!result.success);
        assert_eq!(result.source_path, missing);
        assert_eq!(result.output_path, dir.path().join("gone.base64.txt"));
        assert_eq!(result.byte_length, 0);
        assert!(result.error.is_some());
    }

    #[test]
    fn dated_batch_uses_supplied_date() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("n.txt"), b"n").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

        let report = convert_dir(src.path(), src.path(), &SuffixFilter::new("txt"), OutputNaming::Dated(date), |_, _, _| {}).unwrap();
        assert_eq!(report.results[0].output_path, src.path().join("n-2024-12-31.base64.txt"));
    }

    #[test]
    fn read_back_rejects_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("g.base64.txt");
        let bad = dir.path().join("b.base64.txt");
        fs::write(&good, b"TWFu").unwrap();
        fs::write(&bad, [0xFF, 0xFE, 0x00]).unwrap();

        assert_eq!(read_encoded_text(&good).unwrap(), "TWFu");
        assert!(matches!(read_encoded_text(&bad), Err(ConvertError::EncodingFailure { .. })));
        assert!(matches!(
            read_encoded_text(&dir.path().join("none")),
            Err(ConvertError::SourceUnreadable { .. })
        ));
    }

    proptest! {
        #[test]
        fn encoding_round_trips(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let encoded = encode_bytes(&data);
            let decoded = STANDARD.decode(encoded.as_bytes()).unwrap();
            prop_assert_eq!(decoded, data);
        }

        #[test]
        fn output_file_is_single_line_base64(data in prop::collection::vec(any::<u8>(), 1..2048)) {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("blob.bin");
            fs::write(&src, &data).unwrap();

            let result = convert_file(&src, dir.path(), OutputNaming::Plain).unwrap();
            let text = fs::read_to_string(&result.output_path).unwrap();

            prop_assert!(is_base64_text(&text), "unexpected characters in {:?}", text);
            prop_assert_eq!(text.len() % 4, 0);
            prop_assert_eq!(result.byte_length, data.len() as u64);
        }
    }
}
