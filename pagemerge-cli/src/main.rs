//! pagemerge - Reorder, rotate and merge pages from many PDF files.
//!
//! Runs the page editor's HTTP service, or merges selected pages locally.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, MergeArgs, ServeArgs};
use pagemerge::cache::CacheOptions;
use pagemerge::config::{Config, PageSelection};
use pagemerge::document::{PageDescriptor, SourceFile};
use pagemerge::error::PageMergeError;
use pagemerge::ingest::{Ingestor, RawFile};
use pagemerge::merge::MergeEngine;
use pagemerge::order::PageOrder;
use pagemerge::render::TierSettings;
use pagemerge::storage::ScratchStorage;
use pagemerge::utils::format_file_size;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        process::exit(exit_code(&err));
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_filter))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Exit code for `err`, taken from the library error when there is one.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<PageMergeError>()
        .map_or(1, PageMergeError::exit_code)
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Merge(args) => merge(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = serve_config(args);
    info!("{} v{}", pagemerge::NAME, pagemerge::VERSION);
    pagemerge::server::serve(config).await?;
    Ok(())
}

fn serve_config(args: ServeArgs) -> Config {
    let defaults = Config::default();

    Config {
        storage_dir: args.storage_dir.unwrap_or(defaults.storage_dir),
        bind_address: args.bind,
        cache: CacheOptions {
            preview: TierSettings {
                scale: args.preview_scale,
                jpeg_quality: args.preview_quality,
            },
            full: TierSettings {
                scale: args.full_scale,
                jpeg_quality: args.full_quality,
            },
            batch_size: args.batch_size,
        },
        jobs: args.jobs,
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
        pdfium_library_dir: args.pdfium_dir,
    }
}

async fn merge(args: MergeArgs) -> Result<()> {
    if let Some(jobs) = args.jobs
        && jobs == 0
    {
        return Err(PageMergeError::invalid_config("Number of jobs must be at least 1").into());
    }

    let inputs = resolve_inputs(&args.inputs)?;

    if !args.dry_run && !args.force && tokio::fs::try_exists(&args.output).await.unwrap_or(false) {
        bail!(
            "Output file already exists: {} (use --force to overwrite)",
            args.output.display()
        );
    }

    let scratch_dir = std::env::temp_dir().join(format!("pagemerge-{}", process::id()));
    let storage = ScratchStorage::open(&scratch_dir).await?;

    let result = merge_with_storage(&args, &inputs, storage).await;

    if let Err(e) = tokio::fs::remove_dir_all(&scratch_dir).await {
        warn!("Failed to remove scratch directory {}: {e}", scratch_dir.display());
    }

    result
}

async fn merge_with_storage(
    args: &MergeArgs,
    inputs: &[PathBuf],
    storage: ScratchStorage,
) -> Result<()> {
    let mut files = Vec::with_capacity(inputs.len());
    for path in inputs {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(RawFile::new(display_name(path), bytes));
    }

    let jobs = args.jobs.unwrap_or_else(|| Config::default().effective_jobs());
    let report = Ingestor::new(storage.clone(), jobs).ingest(files).await;

    if let Some(rejected) = report.rejected.first() {
        bail!("{}: {}", rejected.original, rejected.error);
    }

    let pages = select_pages(&report.files, args.pages.as_deref(), args.rotate)?;

    info!(
        "Selected {} page(s) from {} file(s)",
        pages.len(),
        report.files.len()
    );

    if args.dry_run {
        for (position, page) in pages.iter().enumerate() {
            info!(
                "  {:>3}. {} (rotation {})",
                position + 1,
                page.display_label(),
                page.rotation.as_degrees()
            );
        }
        info!("Dry run completed, output would be: {}", args.output.display());
        return Ok(());
    }

    let locations = report
        .files
        .iter()
        .map(|f| (f.file_id.clone(), f.storage_key.clone()))
        .collect();

    let output_stem = args
        .output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let engine = MergeEngine::new(storage);
    let merged = engine.merge(&pages, &locations, &output_stem).await?;

    let output = args.output.clone();
    engine
        .deliver(&merged, |path| async move {
            tokio::fs::copy(&path, &output).await
        })
        .await?;

    info!(
        "Successfully created {} ({} pages, {}) in {:.2}s",
        args.output.display(),
        merged.statistics.total_pages,
        format_file_size(merged.bytes.len() as u64),
        merged.statistics.merge_time.as_secs_f64()
    );

    Ok(())
}

/// Expand glob patterns in `patterns`, keeping the given order.
///
/// A pattern that matches nothing is kept as a literal path so that reading
/// it reports a proper error.
fn resolve_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::new();

    for pattern in patterns {
        let matches = glob::glob(pattern)
            .with_context(|| format!("Invalid glob pattern: {pattern}"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to expand {pattern}"))?;

        if matches.is_empty() {
            resolved.push(PathBuf::from(pattern));
        } else {
            resolved.extend(matches);
        }
    }

    Ok(resolved)
}

/// Build the page order for a local merge.
///
/// Without a selection every page of every file is used in input order.
/// `rotate` is added to every selected page on top of its own rotation.
fn select_pages(
    files: &[SourceFile],
    selection: Option<&str>,
    rotate: Option<i32>,
) -> pagemerge::Result<Vec<PageDescriptor>> {
    let mut pages = match selection {
        None => files.iter().flat_map(SourceFile::page_descriptors).collect(),
        Some(selection) => {
            let mut pages = Vec::new();

            for pick in PageSelection::parse_list(selection)? {
                let file = files.get(pick.file).ok_or_else(|| {
                    PageMergeError::invalid_config(format!(
                        "File {} does not exist ({} input files)",
                        pick.file + 1,
                        files.len()
                    ))
                })?;

                // Bounds are checked before a range is expanded.
                if pick.last_page >= file.page_count {
                    return Err(PageMergeError::invalid_config(format!(
                        "Page {} does not exist in {} ({} pages)",
                        u64::from(pick.last_page) + 1,
                        file.original_name,
                        file.page_count
                    )));
                }

                pages.extend(pick.page_indices().map(|page_index| {
                    let mut page =
                        PageDescriptor::new(file.file_id.clone(), page_index, &file.original_name);
                    page.rotation = pick.rotation;
                    page
                }));
            }

            pages
        }
    };

    if let Some(delta) = rotate {
        for page in &mut pages {
            page.rotation = page.rotation.rotated_by(delta)?;
        }
    }

    let mut order = PageOrder::new();
    order.append(pages)?;
    Ok(order.snapshot())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
