//! # b64drop: The Main Entry Point
//!
//! This module handles Command Line Interface (CLI) parsing, logging initialization,
//! and dispatching commands to the appropriate sub-modules. It owns the `Session`
//! for the run and decides how results and errors are presented.
//!
//! Every conversion writes `<name>.base64.txt` files; the `--copy-*` flags then hand
//! the results to the clipboard (as an Explorer file drop on Windows, as text elsewhere).

use std::path::{Path, PathBuf};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn, LevelFilter};
use simplelog::{Config, SimpleLogger};

mod clipboard;
mod dropfiles;
mod encoder;
mod scan;
mod session;

use clipboard::{ClipboardBackend, CopyOutcome, FileCopier, SystemClipboard};
use encoder::{ConversionResult, OutputNaming};
use scan::SuffixFilter;
use session::{Mode, Session};

/// The primary Command Line Interface (CLI) configuration.
#[derive(Parser)]
#[command(name = "b64drop")]
#[command(about = "Encode files to Base64 text and drop the results on the clipboard", long_about = None)]
struct Cli {
    /// The sub-command to execute (file, dir, copy-files).
    #[command(subcommand)]
    command: Option<Commands>,

    /// Turn on verbose logging.
    ///
    /// - `-v`: Debug
    /// - `-vv`: Trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Options shared by both conversion modes.
#[derive(Args, Debug, Clone, Default)]
struct OutputArgs {
    /// Directory to save `.base64.txt` files in.
    ///
    /// Defaults to the file's own directory (`file`) or the source directory (`dir`).
    #[arg(short = 'o', long = "out")]
    save_dir: Option<PathBuf>,

    /// Add today's date to output names: `<name>-YYYY-MM-DD.base64.txt`.
    #[arg(long)]
    dated: bool,

    /// Copy the save directory path to the clipboard as text.
    #[arg(long)]
    copy_path: bool,

    /// Copy the converted files to the clipboard (pasteable in Explorer on Windows).
    #[arg(long)]
    copy_files: bool,

    /// Print the conversion report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

/// Available sub-commands.
#[derive(Subcommand)]
enum Commands {
    /// Convert a single file.
    File {
        /// The file to encode.
        file: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        /// Copy the Base64 text itself to the clipboard.
        #[arg(long)]
        copy_text: bool,
    },
    /// Convert every file directly inside a directory (not recursive).
    Dir {
        /// The source directory.
        dir: PathBuf,

        /// Only convert files ending in `.<EXT>` (case-sensitive). Empty converts everything.
        #[arg(short, long, default_value = "")]
        ext: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Put existing files on the clipboard as a file drop (or a text path list).
    CopyFiles {
        /// Files to copy. Missing ones are skipped.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Determine log level based on verbosity flag
    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // Logging failure shouldn't stop a conversion.
    let _ = SimpleLogger::init(log_level, Config::default());

    let clipboard = SystemClipboard;
    let copier = FileCopier::probe();

    let outcome = match &cli.command {
        Some(Commands::File { file, output, copy_text }) => run_file(file, output, *copy_text, &clipboard, copier),
        Some(Commands::Dir { dir, ext, output }) => run_dir(dir, ext, output, &clipboard, copier),
        Some(Commands::CopyFiles { paths }) => copier
            .copy_files(&clipboard, paths)
            .map(|outcome| {
                print_copy_outcome(outcome);
                true
            })
            .map_err(anyhow::Error::from),
        None => {
            // Default behavior if no command: print the help message
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            return;
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn naming(output: &OutputArgs) -> OutputNaming {
    if output.dated {
        OutputNaming::dated_today()
    } else {
        OutputNaming::Plain
    }
}

/// One-file mode. Returns `Ok(false)` when a requested clipboard action failed.
fn run_file(
    file: &Path,
    output: &OutputArgs,
    copy_text: bool,
    clipboard: &impl ClipboardBackend,
    copier: FileCopier,
) -> Result<bool> {
    let mut session = Session::single_file(output.save_dir.clone());
    let save_dir = session.save_dir_for(file);
    encoder::ensure_writable_dir(&save_dir)?;

    let (result, converted) = encoder::convert_file_recorded(file, &save_dir, naming(output));
    // With --json a failure is still reported on stdout before the error is returned.
    if output.json || converted.is_ok() {
        println!("{}", render_result(&result, output.json)?);
    }
    converted?;
    session.record_conversion(&result.output_path);

    let mut ok = clipboard_actions(&session, &save_dir, output, clipboard, copier);

    if copy_text {
        ok &= copy_last_text(&session, clipboard);
    }
    Ok(ok)
}

/// The stdout line for a single-file conversion: pretty JSON, or a short summary.
fn render_result(result: &ConversionResult, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(result)?);
    }
    Ok(match &result.error {
        None => format!("Saved as {}", result.output_path.display()),
        Some(e) => format!("Failed to convert {}: {}", result.source_path.display(), e),
    })
}

/// Batch mode. Returns `Ok(false)` when any file or a requested clipboard action failed.
fn run_dir(
    dir: &Path,
    ext: &str,
    output: &OutputArgs,
    clipboard: &impl ClipboardBackend,
    copier: FileCopier,
) -> Result<bool> {
    let session = Session::batch(dir.to_path_buf(), output.save_dir.clone());
    let save_dir = session.save_dir_for(dir);
    encoder::ensure_writable_dir(&save_dir)?;

    let filter = SuffixFilter::new(ext);
    if filter.is_empty() {
        info!("No extension filter given, converting every file in {:?}", dir);
    }
    let report = encoder::convert_dir(dir, &save_dir, &filter, naming(output), |done, total, r| {
        if r.success {
            info!("[{}/{}] {}", done, total, r.output_path.display());
        } else {
            warn!("[{}/{}] {} failed: {}", done, total, r.source_path.display(), r.error.as_deref().unwrap_or("unknown error"));
        }
    })?;

    if output.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.total() == 0 {
        println!("No files to convert.");
    } else {
        println!("Conversion finished. Saved {} file(s), {} failed.", report.succeeded, report.failed);
        for failure in report.results.iter().filter(|r| !r.success) {
            println!("  ✕ {}: {}", failure.source_path.display(), failure.error.as_deref().unwrap_or(""));
        }
    }

    let ok = clipboard_actions(&session, &save_dir, output, clipboard, copier);
    Ok(ok && report.failed == 0)
}

/// Runs the `--copy-path` / `--copy-files` actions. Failures are logged, not fatal.
fn clipboard_actions(
    session: &Session,
    save_dir: &Path,
    output: &OutputArgs,
    clipboard: &impl ClipboardBackend,
    copier: FileCopier,
) -> bool {
    let mut ok = true;

    if output.copy_path {
        match clipboard.set_text(&save_dir.to_string_lossy()) {
            Ok(()) => info!("Save path copied to the clipboard"),
            Err(e) => {
                error!("Could not copy the save path: {}", e);
                ok = false;
            }
        }
    }

    if output.copy_files {
        let files = session.converted_files();
        if files.is_empty() {
            let hint = match session.mode {
                Mode::SingleFile => "convert a file first",
                Mode::Batch => "no .base64.txt files in the save directory",
            };
            warn!("Nothing to copy: {}", hint);
            ok = false;
        } else {
            match copier.copy_files(clipboard, &files) {
                Ok(outcome) => print_copy_outcome(outcome),
                Err(e) => {
                    error!("Could not copy files: {}", e);
                    ok = false;
                }
            }
        }
    }

    ok
}

fn print_copy_outcome(outcome: CopyOutcome) {
    match outcome {
        CopyOutcome::FileDrop(n) => println!("{} file(s) on the clipboard. Paste them with Ctrl+V.", n),
        CopyOutcome::PlainText(n) => println!("{} path(s) copied to the clipboard as text.", n),
    }
}

fn copy_last_text(session: &Session, clipboard: &impl ClipboardBackend) -> bool {
    let Some(last) = session.last_converted.as_deref().filter(|p| p.exists()) else {
        warn!("No converted file to copy text from");
        return false;
    };

    let text = match encoder::read_encoded_text(last) {
        Ok(t) => t,
        Err(e) => {
            error!("{}", e);
            return false;
        }
    };

    match clipboard.set_text(&text) {
        Ok(()) => {
            info!("Copied {} Base64 characters to the clipboard", text.len());
            true
        }
        Err(e) => {
            error!("Could not copy the Base64 text: {}", e);
            false
        }
    }
}
