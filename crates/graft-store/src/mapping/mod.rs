//! Declarative mappings
//!
//! Provides:
//! - Mapping Format v0 schema (YAML)
//! - Parser producing a validated `MappingRegistry`

pub mod format_v0;
pub mod parser;

pub use format_v0::MappingV0;
pub use parser::{parse_mapping_file, parse_mapping_str, to_descriptors};
