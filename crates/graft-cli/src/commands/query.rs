//! Query commands
//!
//! Usage:
//!   graft query count <TYPE> --config <FILE>
//!   graft query count <TYPE> --db <PATH> --mapping <FILE>
//!   graft query list <TYPE> (same options)

use clap::{Args, Subcommand};
use graft_core::logging_facility;
use graft_engine::{SessionFactory, SessionFactoryConfig};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub command: QueryCommand,
}

#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// Count stored entities of a type
    Count(QueryTarget),
    /// Print the identities of stored entities of a type, oldest first
    List(QueryTarget),
}

#[derive(Debug, Args)]
pub struct QueryTarget {
    /// Entity type name
    pub entity_type: String,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Session factory configuration (TOML)
    #[arg(long, conflicts_with_all = ["db", "mapping"])]
    pub config: Option<PathBuf>,

    /// Database file
    #[arg(long, requires = "mapping")]
    pub db: Option<PathBuf>,

    /// Mapping file (YAML)
    #[arg(long, requires = "db")]
    pub mapping: Option<PathBuf>,
}

impl SourceArgs {
    fn open(&self) -> Result<SessionFactory, Box<dyn std::error::Error>> {
        let config = match (&self.config, &self.db, &self.mapping) {
            (Some(path), _, _) => {
                let config = SessionFactoryConfig::from_toml_file(path)?;
                logging_facility::init(config.log_profile);
                config
            }
            (None, Some(db), Some(mapping)) => SessionFactoryConfig::file(db).with_mapping(mapping),
            _ => return Err("either --config or both --db and --mapping are required".into()),
        };
        Ok(SessionFactory::open(config)?)
    }
}

/// Execute query command
pub fn execute(args: QueryArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        QueryCommand::Count(target) => execute_count(target),
        QueryCommand::List(target) => execute_list(target),
    }
}

fn execute_count(target: QueryTarget) -> Result<(), Box<dyn std::error::Error>> {
    let mut factory = target.source.open()?;
    let count = factory.from_transaction(|session| session.count(&target.entity_type))?;
    println!("{}", count);
    Ok(())
}

fn execute_list(target: QueryTarget) -> Result<(), Box<dyn std::error::Error>> {
    let mut factory = target.source.open()?;
    let ids = factory.from_transaction(|session| {
        let handles = session.list(&target.entity_type)?;
        let mut ids = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(id) = session.identity(handle)? {
                ids.push(id);
            }
        }
        Ok(ids)
    })?;
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}
