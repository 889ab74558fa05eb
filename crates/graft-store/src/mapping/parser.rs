//! Mapping parser
//!
//! Parses YAML, checks the format version and builds a validated
//! `MappingRegistry`. Structural validation (unknown targets, inverse pairs,
//! orphan removal cardinalities) is the registry's job.

#![allow(clippy::result_large_err)]

use crate::errors::{io_error, mapping_error, Result};
use crate::mapping::format_v0::{CascadeKind, MappedAssociation, MappedEntity, MappingV0};
use graft_core::errors::ExError;
use graft_core::model::{
    AssociationDescriptor, AttributeDescriptor, Cascade, EntityTypeDescriptor, MappingRegistry,
};
use std::fs;
use std::path::Path;

/// Parse and validate a mapping file
pub fn parse_mapping_file(path: &Path) -> Result<MappingRegistry> {
    let content = fs::read_to_string(path).map_err(|e| io_error("mapping_read", e))?;
    parse_mapping_str(&content)
}

/// Parse and validate a mapping from a string
pub fn parse_mapping_str(content: &str) -> Result<MappingRegistry> {
    let mapping: MappingV0 = serde_yaml::from_str(content)
        .map_err(|e| mapping_error(&format!("YAML parse error: {}", e)))?;

    MappingRegistry::new(to_descriptors(&mapping)?)
        .map_err(|e| ExError::from(e).with_op("mapping_parse"))
}

/// Convert a parsed document into entity type descriptors
pub fn to_descriptors(mapping: &MappingV0) -> Result<Vec<EntityTypeDescriptor>> {
    if mapping.mapping_version != 0 {
        return Err(mapping_error(&format!(
            "Unsupported mapping_version: {}. Expected 0",
            mapping.mapping_version
        )));
    }

    mapping.entities.iter().map(entity_descriptor).collect()
}

fn entity_descriptor(entity: &MappedEntity) -> Result<EntityTypeDescriptor> {
    let mut descriptor = EntityTypeDescriptor::new(entity.name.clone());
    for attribute in &entity.attributes {
        let mut mapped = AttributeDescriptor::new(attribute.name.clone(), attribute.kind);
        if !attribute.nullable {
            mapped = mapped.required();
        }
        descriptor = descriptor.with_attribute(mapped);
    }
    for association in &entity.associations {
        descriptor = descriptor.with_association(association_descriptor(&entity.name, association)?);
    }
    Ok(descriptor)
}

fn association_descriptor(
    owner: &str,
    association: &MappedAssociation,
) -> Result<AssociationDescriptor> {
    let mut descriptor = AssociationDescriptor::new(
        association.name.clone(),
        association.target.clone(),
        association.cardinality,
    );

    descriptor = match (&association.inverse, association.owning) {
        (Some(inverse), false) => descriptor.mapped_by(inverse.clone()),
        (Some(inverse), true) => descriptor.with_inverse(inverse.clone()),
        (None, true) => descriptor,
        (None, false) => {
            return Err(mapping_error(&format!(
                "{}.{} is not owning and needs an inverse",
                owner, association.name
            )))
        }
    };

    if association.orphan_removal {
        descriptor = descriptor.orphan_removal();
    }

    let mut cascade = Cascade::default();
    for kind in &association.cascade {
        match kind {
            CascadeKind::Persist => cascade.persist = true,
            CascadeKind::Remove => cascade.remove = true,
            CascadeKind::All => cascade = Cascade::all(),
        }
    }
    Ok(descriptor.cascade(cascade))
}
