//! Graft CLI
//!
//! Command-line interface for checking mappings and querying stored entities

use clap::{Parser, Subcommand, ValueEnum};
use graft_core::logging_facility::{self, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "graft")]
#[command(about = "Graft - orphan-removal persistence engine", long_about = None)]
struct Cli {
    /// Emit logs with this profile (a config file's `log_profile` applies otherwise)
    #[arg(long, global = true, value_enum)]
    log: Option<LogProfile>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogProfile {
    Development,
    Production,
}

impl From<LogProfile> for Profile {
    fn from(profile: LogProfile) -> Self {
        match profile {
            LogProfile::Development => Profile::Development,
            LogProfile::Production => Profile::Production,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Mapping file operations
    Mapping(commands::mapping::MappingArgs),
    /// Query stored entities
    Query(commands::query::QueryArgs),
}

fn main() {
    let cli = Cli::parse();
    if let Some(profile) = cli.log {
        logging_facility::init(profile.into());
    }

    let result = match cli.command {
        Commands::Mapping(args) => commands::mapping::execute(args),
        Commands::Query(args) => commands::query::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
