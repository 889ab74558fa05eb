//! Mapping command
//!
//! Usage: graft mapping check <FILE>

use clap::{Args, Subcommand};
use graft_core::model::MappingRegistry;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct MappingArgs {
    #[command(subcommand)]
    pub command: MappingCommand,
}

#[derive(Debug, Subcommand)]
pub enum MappingCommand {
    /// Validate a mapping file and summarize its entity types
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Path to the mapping YAML file
    pub path: PathBuf,
}

/// Execute mapping command
pub fn execute(args: MappingArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        MappingCommand::Check(check_args) => execute_check(check_args),
    }
}

fn execute_check(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = graft_store::mapping::parse_mapping_file(&args.path)?;
    print!("{}", summarize(&registry));
    println!("✓ Mapping valid: {} entity type(s)", registry.len());
    Ok(())
}

/// One line per entity type, orphan-removal associations called out
fn summarize(registry: &MappingRegistry) -> String {
    let mut out = String::new();
    for descriptor in registry.entity_types() {
        let orphan_removal: Vec<&str> = descriptor
            .orphan_removal_associations()
            .map(|a| a.name.as_str())
            .collect();
        out.push_str(&format!(
            "{}: {} attribute(s), {} association(s)",
            descriptor.name,
            descriptor.attributes.len(),
            descriptor.associations.len()
        ));
        if !orphan_removal.is_empty() {
            out.push_str(&format!(" [orphan removal: {}]", orphan_removal.join(", ")));
        }
        out.push('\n');
    }
    out
}
