//! Mapping Format v0 schema
//!
//! Defines the YAML structure for declaring entity types and associations

use graft_core::model::{AttributeKind, Cardinality};
use serde::{Deserialize, Serialize};

/// Top-level mapping file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingV0 {
    /// Format version (must be 0 for this format)
    pub mapping_version: u32,

    /// Mapped entity types
    pub entities: Vec<MappedEntity>,
}

/// Entity type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappedEntity {
    pub name: String,

    #[serde(default)]
    pub attributes: Vec<MappedAttribute>,

    #[serde(default)]
    pub associations: Vec<MappedAssociation>,
}

/// Attribute definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappedAttribute {
    pub name: String,

    #[serde(default = "default_kind")]
    pub kind: AttributeKind,

    #[serde(default = "default_true")]
    pub nullable: bool,
}

/// Association definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappedAssociation {
    pub name: String,

    /// Target entity type
    pub target: String,

    /// `one-to-one`, `one-to-many`, `many-to-one` or `many-to-many`
    pub cardinality: Cardinality,

    /// The owning side stores the link; defaults to owning
    #[serde(default = "default_true")]
    pub owning: bool,

    /// Paired association on the target; required on the non-owning side
    #[serde(default)]
    pub inverse: Option<String>,

    #[serde(default)]
    pub orphan_removal: bool,

    #[serde(default)]
    pub cascade: Vec<CascadeKind>,
}

/// Lifecycle operations an association propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeKind {
    Persist,
    Remove,
    All,
}

fn default_kind() -> AttributeKind {
    AttributeKind::Text
}

fn default_true() -> bool {
    true
}
