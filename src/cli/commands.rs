//! CLI command definitions using clap.
//!
//! - generate: submit a generation and follow it to completion
//! - status / jobs: inspect generation jobs
//! - show / stats: read the persisted schedule
//! - check / audit: validate a dataset or the persisted schedule

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// examsched - greedy exam timetable generator
#[derive(Parser, Debug)]
#[command(name = "examsched")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a schedule and wait for the job to finish (Ctrl-C cancels)
    Generate {
        /// Dataset file (YAML or JSON); defaults to the configured dataset
        #[arg(short = 'D', long)]
        data: Option<PathBuf>,

        /// Number of exam days
        #[arg(short = 'n', long)]
        days: i64,

        /// First exam day (YYYY-MM-DD); defaults to next Monday
        #[arg(short, long)]
        start: Option<NaiveDate>,

        /// Restrict to a department (repeatable)
        #[arg(short, long = "department")]
        departments: Vec<String>,
    },

    /// Show a job's status as JSON
    Status {
        /// Job ID
        id: String,
    },

    /// List generation jobs, newest first
    Jobs,

    /// Print the persisted schedule
    Show {
        /// Only this department
        #[arg(short, long)]
        department: Option<String>,
    },

    /// Print statistics of the latest generation, with conflict counts when a
    /// dataset is known
    Stats {
        #[arg(short = 'D', long)]
        data: Option<PathBuf>,
    },

    /// Validate a dataset file without generating
    Check {
        #[arg(short = 'D', long)]
        data: Option<PathBuf>,
    },

    /// Re-check the persisted schedule for constraint violations
    Audit {
        #[arg(short = 'D', long)]
        data: Option<PathBuf>,
    },
}
