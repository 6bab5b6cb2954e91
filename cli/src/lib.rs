pub mod commands;
pub mod config;
pub mod input;
pub mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "stepgauge")]
#[command(about = "Note density, replay judgment and chart similarity tools for step charts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Overrides `paths.logs_dir` from the config file.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "STEPGAUGE_CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the playable levels of a chart.
    Levels { chart: PathBuf },
    /// Notes-per-second summary of one level.
    Density {
        chart: PathBuf,

        #[arg(long, conflicts_with = "difficulty")]
        level: Option<usize>,

        #[arg(long)]
        difficulty: Option<String>,

        /// Print the summary and the zero-filled series as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Judgment counts and per-lane statistics of a replay log.
    Replay {
        replay: PathBuf,

        /// A later replay to compare against.
        #[arg(long)]
        compare: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Similarity of the note data of two charts.
    Diff {
        chart_a: PathBuf,
        chart_b: PathBuf,

        #[arg(long, requires = "level_b")]
        level_a: Option<usize>,

        #[arg(long, requires = "level_a")]
        level_b: Option<usize>,

        /// Text report path; a JSON report is written next to it.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fingerprint of one level's note data.
    Fingerprint {
        chart: PathBuf,

        #[arg(long)]
        level: Option<usize>,
    },
    /// Replace one level with a chart body recovered from free-form text.
    Learn {
        chart: PathBuf,

        /// Text holding the new body, e.g. a saved generator response.
        response: PathBuf,

        #[arg(long)]
        level: Option<usize>,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write the demo chart, its variant and a demo replay.
    Demo {
        #[arg(long, default_value = "data/demo")]
        output_dir: PathBuf,
    },
}
