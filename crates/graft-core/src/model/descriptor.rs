//! Static mapping metadata
//!
//! Descriptors are plain immutable values. They are assembled once (from a
//! mapping file or with the builders below) and validated into a
//! `MappingRegistry`; nothing inspects entity values at runtime to discover
//! them.

use serde::{Deserialize, Serialize};

/// Relationship multiplicity, seen from the declaring side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Whether the declaring side holds a collection of targets
    pub fn is_collection(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }

    /// The cardinality the other side of a bidirectional pair must declare
    pub fn counterpart(&self) -> Cardinality {
        match self {
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// Orphan removal is only meaningful where the parent owns its children
    pub fn supports_orphan_removal(&self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::OneToMany)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Cardinality::OneToOne => "one-to-one",
            Cardinality::OneToMany => "one-to-many",
            Cardinality::ManyToOne => "many-to-one",
            Cardinality::ManyToMany => "many-to-many",
        }
    }
}

/// Lifecycle operations propagated from an entity to its association targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cascade {
    pub persist: bool,
    pub remove: bool,
}

impl Cascade {
    pub fn all() -> Self {
        Self {
            persist: true,
            remove: true,
        }
    }
}

/// Metadata for one mapped relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDescriptor {
    pub name: String,
    pub target_type: String,
    pub cardinality: Cardinality,
    /// The owning side is the one written to storage
    pub owning: bool,
    pub orphan_removal: bool,
    /// Name of the paired association on the target type
    pub inverse: Option<String>,
    pub cascade: Cascade,
}

impl AssociationDescriptor {
    /// An owning, unidirectional association without cascades
    pub fn new(
        name: impl Into<String>,
        target_type: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            cardinality,
            owning: true,
            orphan_removal: false,
            inverse: None,
            cascade: Cascade::default(),
        }
    }

    /// Make this the non-owning side, mapped by `owning_association` on the target
    pub fn mapped_by(mut self, owning_association: impl Into<String>) -> Self {
        self.owning = false;
        self.inverse = Some(owning_association.into());
        self
    }

    /// Name the non-owning counterpart on the target (owning side stays owning)
    pub fn with_inverse(mut self, inverse_association: impl Into<String>) -> Self {
        self.inverse = Some(inverse_association.into());
        self
    }

    pub fn orphan_removal(mut self) -> Self {
        self.orphan_removal = true;
        self
    }

    pub fn cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn is_collection(&self) -> bool {
        self.cardinality.is_collection()
    }

    /// Orphan removal implies removal cascades to the children
    pub fn cascades_remove(&self) -> bool {
        self.cascade.remove || self.orphan_removal
    }

    pub fn cascades_persist(&self) -> bool {
        self.cascade.persist
    }

    /// Owning links that allow a single owner per target
    pub fn exclusive_link(&self) -> bool {
        self.owning
            && matches!(
                self.cardinality,
                Cardinality::OneToOne | Cardinality::OneToMany
            )
    }
}

/// Value kinds an attribute may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Text,
    Integer,
    Boolean,
    Json,
}

impl AttributeKind {
    /// Null is accepted here; nullability is checked at flush time.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (_, Value::Null) => true,
            (AttributeKind::Text, Value::String(_)) => true,
            (AttributeKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (AttributeKind::Boolean, Value::Bool(_)) => true,
            (AttributeKind::Json, _) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    pub nullable: bool,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Mapping of one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeDescriptor {
    pub name: String,
    pub attributes: Vec<AttributeDescriptor>,
    pub associations: Vec<AssociationDescriptor>,
}

impl EntityTypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_association(mut self, association: AssociationDescriptor) -> Self {
        self.associations.push(association);
        self
    }

    pub fn association(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Associations the orphan resolver has to inspect
    pub fn orphan_removal_associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations.iter().filter(|a| a.orphan_removal)
    }

    pub fn has_orphan_removal(&self) -> bool {
        self.associations.iter().any(|a| a.orphan_removal)
    }

    /// Associations that are written to storage as links
    pub fn owning_associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations.iter().filter(|a| a.owning)
    }
}
