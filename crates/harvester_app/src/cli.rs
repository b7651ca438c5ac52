use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use harvester_core::{DurationFlags, HarvestOptions, Priority, WindowSpec, DEFAULT_MIN_VIEWS};

use crate::config::DEFAULT_CONFIG_FILE;
use crate::logging::LogDestination;

#[derive(Parser, Debug)]
#[command(author, version, about = "Quota-aware harvester for trending channel uploads", long_about = None)]
pub struct Cli {
    /// Path to the RON config file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Override the log destination from the config file.
    #[arg(long, value_enum)]
    pub log: Option<LogDestination>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Harvest explicit channels, configured groups, or every active group.
    Collect(CollectArgs),
    /// Print the most recent job summaries.
    History {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// List configured channel groups.
    Groups,
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Channel id or channel URL; repeat for several channels (one job).
    #[arg(long = "channel", value_name = "ID_OR_URL")]
    pub channels: Vec<String>,

    /// Configured group id; repeat to queue one job per group.
    #[arg(long = "group", value_name = "GROUP_ID", conflicts_with = "all_groups")]
    pub groups: Vec<String>,

    /// Queue one job per active configured group.
    #[arg(long)]
    pub all_groups: bool,

    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub days_back: Option<u32>,

    /// First publish date (YYYY-MM-DD), inclusive.
    #[arg(long, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Last publish date (YYYY-MM-DD), inclusive.
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,

    #[arg(long, default_value_t = DEFAULT_MIN_VIEWS)]
    pub min_views: u64,

    #[arg(long)]
    pub max_views: Option<u64>,

    #[arg(long)]
    pub no_shorts: bool,

    #[arg(long)]
    pub no_mid: bool,

    #[arg(long)]
    pub no_long: bool,

    /// Keep only videos mentioning one of these words.
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    /// Drop videos mentioning any of these words.
    #[arg(long = "exclude")]
    pub exclude_keywords: Vec<String>,

    /// Put the jobs ahead of already queued ones.
    #[arg(long)]
    pub high_priority: bool,

    /// Skip the statistics pass.
    #[arg(long)]
    pub basic: bool,

    /// Batch id used for per-batch deduplication.
    #[arg(long)]
    pub batch_id: Option<String>,
}

impl CollectArgs {
    pub fn options(&self) -> HarvestOptions {
        let window = match (self.start, self.end, self.days_back) {
            (Some(start), Some(end), _) => WindowSpec::Dates { start, end },
            (_, _, Some(days)) => WindowSpec::DaysBack(days),
            _ => WindowSpec::default(),
        };
        let priority = if self.high_priority {
            Priority::High
        } else {
            Priority::Normal
        };
        HarvestOptions {
            min_views: self.min_views,
            max_views: self.max_views,
            window,
            durations: DurationFlags {
                include_shorts: !self.no_shorts,
                include_mid: !self.no_mid,
                include_long: !self.no_long,
            },
            keywords: self.keywords.clone(),
            exclude_keywords: self.exclude_keywords.clone(),
            priority,
            detailed: !self.basic,
            batch_id: self.batch_id.clone(),
        }
    }
}
