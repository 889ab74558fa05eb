use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{GraftError, Result};
use crate::model::descriptor::{AssociationDescriptor, Cardinality, EntityTypeDescriptor};

/// Validated, immutable set of entity type mappings
///
/// Built once at startup and shared (behind an `Arc`) by every session.
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    types: BTreeMap<String, EntityTypeDescriptor>,
}

impl MappingRegistry {
    /// Validate descriptors and build the registry
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEntityType` when a type is declared twice and
    /// `InvalidMapping` for any structural problem: duplicate member names,
    /// unknown targets, inverse pairs that do not point back at each other,
    /// or orphan removal on a cardinality that cannot own its targets.
    pub fn new(descriptors: Vec<EntityTypeDescriptor>) -> Result<Self> {
        let mut types = BTreeMap::new();
        for descriptor in descriptors {
            if types.contains_key(&descriptor.name) {
                return Err(GraftError::DuplicateEntityType {
                    entity_type: descriptor.name,
                });
            }
            types.insert(descriptor.name.clone(), descriptor);
        }

        let registry = Self { types };
        for descriptor in registry.types.values() {
            registry.validate_type(descriptor)?;
        }
        Ok(registry)
    }

    fn validate_type(&self, descriptor: &EntityTypeDescriptor) -> Result<()> {
        if descriptor.name.trim().is_empty() {
            return Err(invalid("entity type name must not be empty"));
        }

        let mut member_names = BTreeSet::new();
        for name in descriptor
            .attributes
            .iter()
            .map(|a| &a.name)
            .chain(descriptor.associations.iter().map(|a| &a.name))
        {
            if name.trim().is_empty() {
                return Err(invalid(format!(
                    "{} declares a member with an empty name",
                    descriptor.name
                )));
            }
            if !member_names.insert(name.as_str()) {
                return Err(invalid(format!(
                    "{}.{} is declared more than once",
                    descriptor.name, name
                )));
            }
        }

        for association in &descriptor.associations {
            self.validate_association(descriptor, association)?;
        }
        Ok(())
    }

    fn validate_association(
        &self,
        owner: &EntityTypeDescriptor,
        association: &AssociationDescriptor,
    ) -> Result<()> {
        let path = format!("{}.{}", owner.name, association.name);

        let target = self.types.get(&association.target_type).ok_or_else(|| {
            invalid(format!(
                "{} targets unmapped type {}",
                path, association.target_type
            ))
        })?;

        if association.orphan_removal && !association.cardinality.supports_orphan_removal() {
            return Err(invalid(format!(
                "{} is {}; orphan removal needs one-to-one or one-to-many",
                path,
                association.cardinality.label()
            )));
        }

        if association.cardinality == Cardinality::ManyToOne && !association.owning {
            return Err(invalid(format!("{} is many-to-one and must be owning", path)));
        }

        let Some(inverse_name) = &association.inverse else {
            if !association.owning {
                return Err(invalid(format!(
                    "{} is not owning but names no owning counterpart",
                    path
                )));
            }
            return Ok(());
        };

        let inverse = target.association(inverse_name).ok_or_else(|| {
            invalid(format!(
                "{} names counterpart {}.{} which is not declared",
                path, target.name, inverse_name
            ))
        })?;

        if inverse.target_type != owner.name {
            return Err(invalid(format!(
                "{}.{} targets {}, expected {} to pair with {}",
                target.name, inverse.name, inverse.target_type, owner.name, path
            )));
        }

        if inverse.cardinality != association.cardinality.counterpart() {
            return Err(invalid(format!(
                "{} is {} but counterpart {}.{} is {}",
                path,
                association.cardinality.label(),
                target.name,
                inverse.name,
                inverse.cardinality.label()
            )));
        }

        if inverse.owning == association.owning {
            return Err(invalid(format!(
                "{} and {}.{} must have exactly one owning side",
                path, target.name, inverse.name
            )));
        }

        if let Some(back) = &inverse.inverse {
            if back != &association.name {
                return Err(invalid(format!(
                    "{}.{} points back at {}, not {}",
                    target.name, inverse.name, back, association.name
                )));
            }
        }

        Ok(())
    }

    /// Look up an entity type
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` if the type is not mapped.
    pub fn entity_type(&self, name: &str) -> Result<&EntityTypeDescriptor> {
        self.types
            .get(name)
            .ok_or_else(|| GraftError::UnknownEntityType {
                entity_type: name.to_string(),
            })
    }

    /// Look up an association on an entity type
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` or `UnknownAssociation`.
    pub fn association(&self, entity_type: &str, name: &str) -> Result<&AssociationDescriptor> {
        self.entity_type(entity_type)?
            .association(name)
            .ok_or_else(|| GraftError::UnknownAssociation {
                entity_type: entity_type.to_string(),
                association: name.to_string(),
            })
    }

    /// The other side of a bidirectional association, if any
    ///
    /// An owning side without an explicit `inverse` is still paired when the
    /// target declares a non-owning association mapped by it.
    pub fn inverse_association(
        &self,
        entity_type: &str,
        association: &AssociationDescriptor,
    ) -> Option<&AssociationDescriptor> {
        let target = self.types.get(&association.target_type)?;
        match &association.inverse {
            Some(name) => target.association(name),
            None => target.associations.iter().find(|a| {
                !a.owning
                    && a.target_type == entity_type
                    && a.inverse.as_deref() == Some(association.name.as_str())
            }),
        }
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.types.contains_key(entity_type)
    }

    /// Entity types in name order
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityTypeDescriptor> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn invalid(reason: impl Into<String>) -> GraftError {
    GraftError::InvalidMapping {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::descriptor::{AttributeDescriptor, AttributeKind, Cascade};

    fn employee_mapping() -> Vec<EntityTypeDescriptor> {
        vec![
            EntityTypeDescriptor::new("Employee").with_association(
                AssociationDescriptor::new("info", "EmployeeInfo", Cardinality::OneToOne)
                    .mapped_by("employee")
                    .orphan_removal()
                    .cascade(Cascade::all()),
            ),
            EntityTypeDescriptor::new("EmployeeInfo").with_association(
                AssociationDescriptor::new("employee", "Employee", Cardinality::OneToOne)
                    .with_inverse("info"),
            ),
        ]
    }

    #[test]
    fn test_valid_bidirectional_mapping() {
        let registry = MappingRegistry::new(employee_mapping()).unwrap();
        assert_eq!(registry.len(), 2);

        let info = registry.association("Employee", "info").unwrap();
        let inverse = registry.inverse_association("Employee", info).unwrap();
        assert_eq!(inverse.name, "employee");
        assert!(inverse.owning);
    }

    #[test]
    fn test_inverse_found_without_explicit_back_reference() {
        let mut types = employee_mapping();
        types[1].associations[0].inverse = None;
        let registry = MappingRegistry::new(types).unwrap();

        let owning = registry.association("EmployeeInfo", "employee").unwrap();
        let inverse = registry.inverse_association("EmployeeInfo", owning).unwrap();
        assert_eq!(inverse.name, "info");
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut types = employee_mapping();
        types.push(EntityTypeDescriptor::new("Employee"));
        let err = MappingRegistry::new(types).unwrap_err();
        assert!(matches!(err, GraftError::DuplicateEntityType { .. }));
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let types = vec![EntityTypeDescriptor::new("Employee")
            .with_attribute(AttributeDescriptor::new("name", AttributeKind::Text))
            .with_attribute(AttributeDescriptor::new("name", AttributeKind::Text))];
        let err = MappingRegistry::new(types).unwrap_err();
        assert!(matches!(err, GraftError::InvalidMapping { .. }));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let types = vec![EntityTypeDescriptor::new("Employee").with_association(
            AssociationDescriptor::new("badge", "Badge", Cardinality::OneToOne),
        )];
        let err = MappingRegistry::new(types).unwrap_err();
        match err {
            GraftError::InvalidMapping { reason } => assert!(reason.contains("Badge")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_two_owning_sides_rejected() {
        let mut types = employee_mapping();
        types[0].associations[0].owning = true;
        assert!(MappingRegistry::new(types).is_err());
    }

    #[test]
    fn test_cardinality_pair_mismatch_rejected() {
        let mut types = employee_mapping();
        types[1].associations[0].cardinality = Cardinality::ManyToOne;
        assert!(MappingRegistry::new(types).is_err());
    }

    #[test]
    fn test_orphan_removal_on_many_to_many_rejected() {
        let types = vec![
            EntityTypeDescriptor::new("Team").with_association(
                AssociationDescriptor::new("members", "Person", Cardinality::ManyToMany)
                    .orphan_removal(),
            ),
            EntityTypeDescriptor::new("Person"),
        ];
        assert!(MappingRegistry::new(types).is_err());
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = MappingRegistry::new(employee_mapping()).unwrap();
        assert!(matches!(
            registry.entity_type("Ghost"),
            Err(GraftError::UnknownEntityType { .. })
        ));
        assert!(matches!(
            registry.association("Employee", "ghost"),
            Err(GraftError::UnknownAssociation { .. })
        ));
    }
}
