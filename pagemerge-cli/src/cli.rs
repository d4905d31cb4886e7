//! CLI argument parsing for pagemerge.
//!
//! This module only depends on `clap` and the standard library so the build
//! script can include it to render the man page.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Reorder, rotate and merge pages from many PDF files.
///
/// pagemerge runs either as an HTTP service backing an interactive page
/// editor, or as a one-shot command that merges selected pages locally.
#[derive(Parser, Debug)]
#[command(name = "pagemerge")]
#[command(version)]
#[command(about = "Reorder, rotate and merge pages from many PDF files", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    ///
    /// Accepts a level (error, warn, info, debug, trace) or a full
    /// tracing filter directive.
    #[arg(long, global = true, env = "PAGEMERGE_LOG", default_value = "info")]
    pub log_level: String,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Merge pages from local files into one PDF
    Merge(MergeArgs),
}

/// Arguments of `pagemerge serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(short, long, env = "PAGEMERGE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Directory for uploads and merge output
    ///
    /// Defaults to a `pagemerge` directory inside the system temp directory.
    #[arg(long, env = "PAGEMERGE_STORAGE_DIR", value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Scale factor for preview renderings
    #[arg(long, env = "PAGEMERGE_PREVIEW_SCALE", default_value_t = 0.5)]
    pub preview_scale: f32,

    /// JPEG quality for preview renderings (1-100)
    #[arg(long, env = "PAGEMERGE_PREVIEW_QUALITY", default_value_t = 80)]
    pub preview_quality: u8,

    /// Scale factor for full-size renderings
    #[arg(long, env = "PAGEMERGE_FULL_SCALE", default_value_t = 2.0)]
    pub full_scale: f32,

    /// JPEG quality for full-size renderings (1-100)
    #[arg(long, env = "PAGEMERGE_FULL_QUALITY", default_value_t = 90)]
    pub full_quality: u8,

    /// Number of pages rendered concurrently per batch
    #[arg(long, env = "PAGEMERGE_BATCH_SIZE", default_value_t = 5)]
    pub batch_size: usize,

    /// Number of uploads parsed concurrently
    ///
    /// Default is number of CPU cores.
    #[arg(short, long, env = "PAGEMERGE_JOBS", value_name = "N")]
    pub jobs: Option<usize>,

    /// Largest accepted upload request, in MiB
    #[arg(long, env = "PAGEMERGE_MAX_UPLOAD_MB", default_value_t = 100)]
    pub max_upload_mb: usize,

    /// Directory containing the pdfium library
    ///
    /// The system library is used when not set.
    #[arg(long, env = "PDFIUM_LIBRARY_DIR", value_name = "DIR")]
    pub pdfium_dir: Option<PathBuf>,
}

/// Arguments of `pagemerge merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input PDF files (in order)
    ///
    /// Glob patterns are expanded. File numbers in --pages refer to the
    /// position in the expanded list.
    ///
    /// Examples:
    ///   pagemerge merge a.pdf b.pdf -o out.pdf
    ///   pagemerge merge scans/*.pdf -o out.pdf
    #[arg(required = true, value_name = "FILE")]
    pub inputs: Vec<String>,

    /// Output PDF file path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Pages to merge, in output order
    ///
    /// Comma separated list of <file>:<page> with optional ranges and
    /// rotation. File and page numbers start at 1. All pages of all files
    /// are merged in input order when not set.
    ///
    /// Examples:
    ///   --pages "2:1,1:1-3"     # first page of file 2, then pages 1-3 of file 1
    ///   --pages "1:4@90,1:1"    # page 4 turned clockwise, then page 1
    #[arg(short, long, value_name = "SELECTION")]
    pub pages: Option<String>,

    /// Rotate every selected page by this many degrees (multiple of 90)
    #[arg(long, value_name = "DEGREES", allow_hyphen_values = true)]
    pub rotate: Option<i32>,

    /// Overwrite the output file if it exists
    #[arg(short, long)]
    pub force: bool,

    /// Dry run - list the pages that would be merged without writing output
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of inputs parsed concurrently
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,
}
