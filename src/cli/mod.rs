use crate::config::{AppConfig, ENV_CONFIG_PATH};
use crate::sink::SubmissionFilter;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "swipe-review",
    about = "Swipe through a folder of images and submit approve/reject decisions"
)]
pub struct Cli {
    /// Folder to review (remote folder id, or a directory with --local).
    /// Shorthand for `review <folder>`.
    pub folder: Option<String>,

    /// Treat the folder as a local directory of images.
    #[arg(short, long)]
    pub local: bool,

    /// Path to a TOML config file.
    #[arg(long, global = true, env = ENV_CONFIG_PATH)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the interactive card review (default).
    Review(ReviewArgs),
    /// List submissions recorded in the local journal.
    History(HistoryArgs),
}

/// Where submitted results are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// POST to the resume URL returned by the fetch (or --submit-url).
    Webhook,
    /// Record in the local SQLite journal.
    Journal,
}

#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Remote folder id, or a directory path with --local.
    pub folder: String,

    /// Treat the folder as a local directory of images.
    #[arg(short, long)]
    pub local: bool,

    /// Webhook that lists the assets of a folder.
    #[arg(long)]
    pub fetch_url: Option<String>,

    /// Fallback submission URL when the resume token is not a URL.
    #[arg(long)]
    pub submit_url: Option<String>,

    /// Submission destination. Defaults to journal for --local, webhook otherwise.
    #[arg(long, value_enum)]
    pub sink: Option<SinkKind>,

    /// Which items are submitted.
    #[arg(long, value_enum)]
    pub submit_filter: Option<SubmissionFilter>,

    /// Number of upcoming images prepared ahead.
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Horizontal drag distance that counts as a swipe.
    #[arg(long)]
    pub drag_threshold: Option<f64>,

    /// Journal database path.
    #[arg(long)]
    pub journal: Option<PathBuf>,
}

impl ReviewArgs {
    /// Arguments for the top-level `swipe-review <folder>` shorthand.
    pub fn for_folder(folder: String, local: bool) -> Self {
        Self {
            folder,
            local,
            fetch_url: None,
            submit_url: None,
            sink: None,
            submit_filter: None,
            buffer_size: None,
            drag_threshold: None,
            journal: None,
        }
    }

    pub fn sink_kind(&self) -> SinkKind {
        self.sink.unwrap_or(if self.local {
            SinkKind::Journal
        } else {
            SinkKind::Webhook
        })
    }

    /// Overlay flags on top of the file configuration.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(url) = &self.fetch_url {
            config.fetch_url = Some(url.clone());
        }
        if let Some(url) = &self.submit_url {
            config.submit_url = Some(url.clone());
        }
        if let Some(filter) = self.submit_filter {
            config.review.submit_filter = filter;
        }
        if let Some(size) = self.buffer_size {
            config.review.buffer_size = size;
        }
        if let Some(threshold) = self.drag_threshold {
            config.review.drag_threshold = threshold;
        }
        if let Some(path) = &self.journal {
            config.journal_path = path.clone();
        }
    }
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Journal database path.
    #[arg(long)]
    pub journal: Option<PathBuf>,

    /// Print the items of one submission.
    #[arg(long)]
    pub show: Option<i64>,
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
