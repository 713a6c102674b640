use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;

use swipe_review::cli::{self, Commands, HistoryArgs, ReviewArgs, SinkKind};
use swipe_review::config::{AppConfig, FolderIdValidation};
use swipe_review::controller::ReviewController;
use swipe_review::journal::SubmissionJournal;
use swipe_review::logging::init_file_logging;
use swipe_review::preview::TerminalPreparer;
use swipe_review::sink::{JournalSink, SubmissionSink, WebhookSink};
use swipe_review::source::{DirectoryImageSource, HttpImageSource, ImageSource};
use swipe_review::tui::{App, run_tui};

fn main() -> Result<()> {
    let args = cli::parse_args();
    let config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        None => {
            // Top-level usage: swipe-review [--local] <folder>
            let Some(folder) = args.folder else {
                bail!("No folder given. Usage: swipe-review [--local] <folder>");
            };
            handle_review(ReviewArgs::for_folder(folder, args.local), config)?;
        }
        Some(Commands::Review(review_args)) => {
            handle_review(review_args, config)?;
        }
        Some(Commands::History(history_args)) => {
            handle_history(&history_args, &config)?;
        }
    }

    Ok(())
}

/// Handle the review command - fetch the folder and launch the TUI.
fn handle_review(args: ReviewArgs, mut config: AppConfig) -> Result<()> {
    args.apply_to(&mut config);
    config.validate()?;

    let source = build_source(&args, &config)?;
    let sink = build_sink(args.sink_kind(), &config)?;

    init_file_logging(&config.log_file)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let preparer = Arc::new(TerminalPreparer::new().context("Failed to build HTTP client")?);
    let controller = ReviewController::new(preparer, config.review.clone());
    let app = App::new(controller, source, sink, args.folder);

    run_tui(app, runtime.handle())
}

fn build_source(args: &ReviewArgs, config: &AppConfig) -> Result<Box<dyn ImageSource>> {
    if args.local {
        let dir = Path::new(&args.folder);
        if !dir.is_dir() {
            bail!("Not a directory: {}", args.folder);
        }
        return Ok(Box::new(DirectoryImageSource::new()));
    }

    let Some(fetch_url) = &config.fetch_url else {
        bail!("No fetch URL configured. Pass --fetch-url or set fetch_url in the config file");
    };
    let source = HttpImageSource::new(fetch_url.clone()).context("Failed to build HTTP client")?;
    let source = match config.validate_folder_id {
        FolderIdValidation::Off => source,
        FolderIdValidation::Charset => source.with_validation(false),
        FolderIdValidation::Strict => source.with_validation(true),
    };
    Ok(Box::new(source))
}

fn build_sink(kind: SinkKind, config: &AppConfig) -> Result<Box<dyn SubmissionSink>> {
    match kind {
        SinkKind::Webhook => {
            let sink = WebhookSink::new(config.submit_url.clone())
                .context("Failed to build HTTP client")?;
            Ok(Box::new(sink))
        }
        SinkKind::Journal => {
            if let Some(parent) = config.journal_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create journal directory {}", parent.display())
                })?;
            }
            let sink = JournalSink::open(&config.journal_path).with_context(|| {
                format!("Failed to open journal {}", config.journal_path.display())
            })?;
            Ok(Box::new(sink))
        }
    }
}

/// Handle the history command - print journaled submissions.
fn handle_history(args: &HistoryArgs, config: &AppConfig) -> Result<()> {
    let path = args.journal.as_deref().unwrap_or(&config.journal_path);
    if !path.exists() {
        println!("No submissions recorded");
        return Ok(());
    }

    let journal = SubmissionJournal::open(path)
        .with_context(|| format!("Failed to open journal {}", path.display()))?;

    if let Some(id) = args.show {
        if !journal.list_submissions()?.iter().any(|summary| summary.id == id) {
            bail!("No submission with id {}", id);
        }
        for entry in journal.submission_items(id)? {
            println!("{}\t{}", entry.file_id, entry.status);
        }
        return Ok(());
    }

    let submissions = journal.list_submissions()?;
    if submissions.is_empty() {
        println!("No submissions recorded");
        return Ok(());
    }

    println!("Submissions ({}):", submissions.len());
    for summary in submissions {
        println!(
            "  #{:<4} {}  ✓ {:<4} ✗ {:<4} total {:<4} sent {:<4} {}",
            summary.id,
            summary.submitted_at,
            summary.approved,
            summary.rejected,
            summary.total,
            summary.delivered,
            summary.resume_token.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
