use crate::config::{validate_workers, ConfigError};
use crate::engine::EngineKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "numbreacher")]
#[command(about = "Phone-number reconnaissance: metadata, owner guesses and risk tiers, one number or thousands")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/numbreacher.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Configuration file to load instead of ./config/numbreacher.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose logging (use -v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write run messages to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a single number
    Scan {
        /// Number in international format, e.g. +14155552671
        number: String,

        /// Skip the owner-name web lookup
        #[arg(long)]
        no_owner_lookup: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a number is valid and print its standard formats
    Validate {
        number: String,

        /// Print the verdict and formats as JSON
        #[arg(long)]
        json: bool,
    },

    /// Guess the owner of a single number
    Owner {
        number: String,

        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan every number in a file
    Bulk {
        #[command(flatten)]
        options: BulkOptions,

        /// Skip the owner-name web lookup
        #[arg(long)]
        no_owner_lookup: bool,
    },

    /// Guess owners for every number in a file
    OwnerBulk {
        #[command(flatten)]
        options: BulkOptions,
    },

    /// List the available dispatch engines
    Engines,

    /// Run one task read from stdin (used by the parallel engine)
    #[command(hide = true)]
    Worker,
}

/// Flags shared by the bulk commands
#[derive(Args, Debug, Clone)]
pub struct BulkOptions {
    /// Number list: text (one per line), CSV with a "number" column, or JSON
    pub file: PathBuf,

    /// Dispatch engine: threading, parallel or async (overrides config)
    #[arg(short, long)]
    pub engine: Option<String>,

    /// Maximum concurrent tasks, 1-64 (overrides config)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Keep duplicate numbers
    #[arg(long)]
    pub no_dedupe: bool,

    /// Write a JSON batch summary to this path
    #[arg(long, value_name = "PATH")]
    pub summary_out: Option<PathBuf>,

    /// Print every result as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl BulkOptions {
    /// Reject bad engine names and worker counts before any work starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(engine) = &self.engine {
            EngineKind::parse(engine)?;
        }
        if let Some(workers) = self.workers {
            validate_workers(workers)?;
        }
        Ok(())
    }
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Some(Commands::Bulk { options, .. }) | Some(Commands::OwnerBulk { options }) => {
                options.validate().map_err(|e| e.to_string())
            }
            Some(Commands::Scan { number, .. })
            | Some(Commands::Owner { number, .. })
            | Some(Commands::Validate { number, .. })
                if number.trim().is_empty() =>
            {
                Err("Invalid number: empty input".to_string())
            }
            None if !self.init => Err("No command given (try --help)".to_string()),
            _ => Ok(()),
        }
    }
}
