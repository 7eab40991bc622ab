//! # CLI Module
//!
//! Command-line interface for export retrieval and deduplication.
//!
//! ## Usage
//! ```bash
//! # Retrieve annotations for every reviewed item of a dataset
//! anno-fetch export bumper-2021 --dest annos
//!
//! # Overwrite whatever the destination holds
//! anno-fetch export bumper-2021 --dest annos --clear --timeout-secs 120
//!
//! # Partition a directory of downloaded images into keepers and duplicates
//! anno-fetch dedup ./images
//!
//! # Duplicate ids only, for piping into rm or a manifest filter
//! anno-fetch dedup ./images --output minimal
//! ```

use anno_fetch::config::RemoteConfig;
use anno_fetch::core::dedup::{DirectoryImageSource, DuplicateScanner};
use anno_fetch::core::export::{ExportManager, ExportManifest, ExportRequest};
use anno_fetch::core::remote::{
    DarwinClient, DatasetIdentifier, HttpArchiveFetcher, RemoteDatasetService,
};
use anno_fetch::error::{AnnoFetchError, DedupError, ExportError, Result};
use anno_fetch::events::{DedupEvent, Event, EventChannel, ExportEvent};
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Annotation export retrieval and image deduplication
#[derive(Parser, Debug)]
#[command(name = "anno-fetch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Retrieve an annotation export for a dataset
    Export {
        /// Dataset slug on the annotation platform
        dataset: String,

        /// Directory to extract the annotation files into
        #[arg(long)]
        dest: PathBuf,

        /// Remove pre-existing top-level files from the destination
        #[arg(long)]
        clear: bool,

        /// Seconds to wait for the export to become ready
        #[arg(long, default_value = "60")]
        timeout_secs: u64,

        /// Workflow statuses used to select items when no explicit ids are given
        #[arg(long, default_value = "review,complete")]
        statuses: String,

        /// Explicit dataset item ids (skips the item listing call)
        #[arg(long = "item-id")]
        item_ids: Vec<String>,

        /// Fixed server-side export name (defaults to a generated unique name)
        #[arg(long)]
        name: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Partition a directory of images into representatives and duplicates
    Dedup {
        /// Directory holding `{id}.jpg` images
        dir: PathBuf,

        /// Fingerprint one image at a time instead of in parallel
        #[arg(long)]
        sequential: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (duplicate ids / extracted paths only)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    anno_fetch::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            dataset,
            dest,
            clear,
            timeout_secs,
            statuses,
            item_ids,
            name,
            config,
            output,
        } => run_export(
            dataset,
            dest,
            clear,
            timeout_secs,
            statuses,
            item_ids,
            name,
            config,
            output,
        ),
        Commands::Dedup {
            dir,
            sequential,
            output,
        } => run_dedup(dir, sequential, output),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_export(
    dataset: String,
    dest: PathBuf,
    clear: bool,
    timeout_secs: u64,
    statuses: String,
    item_ids: Vec<String>,
    name: Option<String>,
    config_path: Option<PathBuf>,
    output: OutputFormat,
) -> Result<()> {
    let term = Term::stderr();

    let dataset = DatasetIdentifier::parse(&dataset).ok_or_else(|| {
        AnnoFetchError::InvalidInput(format!(
            "'{dataset}' is not a valid dataset slug (must be non-empty and URL-safe)"
        ))
    })?;

    let config = RemoteConfig::load(config_path.as_deref())?;
    let client = DarwinClient::new(config);

    // Resolve item ids up front; explicit ids skip the listing call.
    let item_ids = if item_ids.is_empty() {
        let items = client
            .list_items(&dataset, Some(&statuses))
            .map_err(ExportError::Remote)?;
        items.into_iter().map(|item| item.id).collect()
    } else {
        item_ids
    };

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {} items selected from {}",
            style("→").cyan(),
            style(item_ids.len()).bold(),
            style(&dataset).bold()
        ))
        .ok();
    }

    let manager = ExportManager::new(Box::new(client), Box::new(HttpArchiveFetcher::new()));

    let mut request = ExportRequest::new(dataset, item_ids, dest);
    request.clear_existing = clear;
    request.timeout = Duration::from_secs(timeout_secs);
    request.name = name;

    let (sender, receiver) = EventChannel::new();

    let spinner = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let spinner_clone = spinner.clone();
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = spinner_clone else { continue };
            match event {
                Event::Export(ExportEvent::Requested { name, .. }) => {
                    pb.set_message(format!("Export '{name}' requested"));
                }
                Event::Export(ExportEvent::Waiting { attempt, .. }) => {
                    pb.set_message(format!("Waiting for export (poll {attempt})"));
                }
                Event::Export(ExportEvent::DownloadStarted { .. }) => {
                    pb.set_message("Downloading archive".to_string());
                }
                Event::Export(ExportEvent::Extracting { .. }) => {
                    pb.set_message("Extracting annotations".to_string());
                }
                Event::Export(ExportEvent::CleanupStarted { .. }) => {
                    pb.set_message("Cleaning up server-side export".to_string());
                }
                Event::Export(ExportEvent::Error { message }) => {
                    pb.set_message(format!("Poll failed, retrying: {message}"));
                }
                _ => {}
            }
        }
    });

    let result = manager.retrieve_with_events(&request, &sender);
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let manifest = result.map_err(AnnoFetchError::Export)?;

    match output {
        OutputFormat::Pretty => print_pretty_manifest(&term, &manifest),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&manifest).unwrap());
        }
        OutputFormat::Minimal => {
            for path in &manifest.annotation_paths {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}

fn print_pretty_manifest(term: &Term, manifest: &ExportManifest) {
    term.write_line("").ok();
    term.write_line(&format!("{} Export Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();
    term.write_line(&format!(
        "  {} annotation files extracted",
        style(manifest.annotation_paths.len()).cyan()
    ))
    .ok();
    term.write_line(&format!(
        "  {} items requested from {}",
        style(manifest.item_count).cyan(),
        style(&manifest.dataset).bold()
    ))
    .ok();
    if let Some(format) = &manifest.format {
        term.write_line(&format!("  {} format", style(format).dim())).ok();
    }
    term.write_line(&format!(
        "  {} server-side export removed",
        style(&manifest.name).dim()
    ))
    .ok();
}

fn run_dedup(dir: PathBuf, sequential: bool, output: OutputFormat) -> Result<()> {
    let term = Term::stderr();

    let source = DirectoryImageSource::new(&dir);
    let image_ids = source.discover_ids().map_err(AnnoFetchError::Dedup)?;

    if image_ids.is_empty() {
        return Err(AnnoFetchError::Dedup(DedupError::ReadDirectory {
            path: dir,
            source: std::io::Error::other("no .jpg images found"),
        }));
    }

    let scanner = DuplicateScanner::new().parallel(!sequential);

    let (sender, receiver) = EventChannel::new();

    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(image_ids.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            if let Event::Dedup(DedupEvent::Progress(p)) = event {
                if let Some(ref pb) = progress_clone {
                    pb.set_position(p.completed as u64);
                    pb.set_message(p.current_id);
                }
            }
        }
    });

    let result = scanner.scan_with_events(&image_ids, &source, &sender);
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let result = result.map_err(AnnoFetchError::Dedup)?;

    match output {
        OutputFormat::Pretty => {
            term.write_line("").ok();
            term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
                .ok();
            term.write_line("").ok();
            term.write_line(&format!(
                "  {} images scanned",
                style(result.total_scanned()).cyan()
            ))
            .ok();
            term.write_line(&format!(
                "  {} representatives kept",
                style(result.representatives().len()).cyan()
            ))
            .ok();
            term.write_line(&format!(
                "  {} duplicates ({:.1} %)",
                style(result.duplicates().len()).yellow(),
                result.duplicate_ratio() * 100.0
            ))
            .ok();
            if !result.duplicates().is_empty() {
                term.write_line("").ok();
                term.write_line(&format!("{}", style("Duplicates:").bold().underlined()))
                    .ok();
                for id in result.duplicates() {
                    term.write_line(&format!("  {} {}", style("○").dim(), id)).ok();
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
        }
        OutputFormat::Minimal => {
            for id in result.duplicates() {
                println!("{id}");
            }
        }
    }

    Ok(())
}
