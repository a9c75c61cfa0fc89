//! Entity type graph and navigation model
//!
//! Parsed once per session from the service's metadata document and
//! immutable thereafter. Navigation properties refer to their target type
//! by qualified name; the metadata model owns every `EntityType`, so no
//! type is ever duplicated into a navigation edge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A primitive type name outside the supported enumeration.
///
/// Carries the raw `Edm.*` name for diagnostics. Callers picking fixture
/// types treat this as "no fixture", not a hard failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported primitive type: {0}")]
pub struct UnsupportedPrimitive(pub String);

/// The fixed enumeration of primitive property types the core can
/// synthesize values for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Byte,
    Int16,
    Int32,
    Int64,
    Boolean,
    String,
    Guid,
    Decimal,
    Double,
    DateTimeOffset,
    Binary,
}

impl PrimitiveType {
    /// Parse an `Edm.*` type name from a metadata document.
    pub fn from_edm(name: &str) -> Result<Self, UnsupportedPrimitive> {
        match name {
            "Edm.Byte" => Ok(Self::Byte),
            "Edm.Int16" => Ok(Self::Int16),
            "Edm.Int32" => Ok(Self::Int32),
            "Edm.Int64" => Ok(Self::Int64),
            "Edm.Boolean" => Ok(Self::Boolean),
            "Edm.String" => Ok(Self::String),
            "Edm.Guid" => Ok(Self::Guid),
            "Edm.Decimal" => Ok(Self::Decimal),
            "Edm.Double" => Ok(Self::Double),
            "Edm.DateTimeOffset" => Ok(Self::DateTimeOffset),
            "Edm.Binary" => Ok(Self::Binary),
            other => Err(UnsupportedPrimitive(other.to_string())),
        }
    }

    /// The `Edm.*` wire name for this type.
    pub fn edm_name(&self) -> &'static str {
        match self {
            Self::Byte => "Edm.Byte",
            Self::Int16 => "Edm.Int16",
            Self::Int32 => "Edm.Int32",
            Self::Int64 => "Edm.Int64",
            Self::Boolean => "Edm.Boolean",
            Self::String => "Edm.String",
            Self::Guid => "Edm.Guid",
            Self::Decimal => "Edm.Decimal",
            Self::Double => "Edm.Double",
            Self::DateTimeOffset => "Edm.DateTimeOffset",
            Self::Binary => "Edm.Binary",
        }
    }
}

/// Relationship multiplicity of a navigation property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    One,
    Many,
}

impl Multiplicity {
    /// Combine with the next hop's multiplicity.
    ///
    /// A single `Many` anywhere in a path makes everything downstream a
    /// collection, so `Many` is sticky.
    pub fn combine(self, next: Multiplicity) -> Multiplicity {
        match (self, next) {
            (Multiplicity::One, Multiplicity::One) => Multiplicity::One,
            _ => Multiplicity::Many,
        }
    }

    pub fn is_many(self) -> bool {
        matches!(self, Multiplicity::Many)
    }
}

/// A declared structural property of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Property name as declared in the metadata document
    pub name: String,
    /// Raw declared type name, e.g. `Edm.Guid`
    pub declared_type: String,
    /// Declared type resolved against the supported enumeration;
    /// `None` when the declared type falls outside it
    pub primitive: Option<PrimitiveType>,
    /// Whether the property accepts null
    pub nullable: bool,
    /// Whether the property is part of the entity key
    pub is_key: bool,
}

impl Property {
    /// A property whose declared type is inside the supported enumeration.
    pub fn primitive(name: impl Into<String>, primitive: PrimitiveType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            declared_type: primitive.edm_name().to_string(),
            primitive: Some(primitive),
            nullable,
            is_key: false,
        }
    }

    pub fn key(name: impl Into<String>, primitive: PrimitiveType) -> Self {
        Self {
            is_key: true,
            ..Self::primitive(name, primitive, false)
        }
    }
}

/// A typed relationship from one entity type to another.
///
/// Holds the target type's qualified name as a lookup key into the owning
/// metadata model rather than a copy of the type itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationProperty {
    /// Navigation property name
    pub name: String,
    /// Qualified name of the target entity type
    pub target_type: String,
    /// Multiplicity of the relationship
    pub multiplicity: Multiplicity,
    /// Partner navigation property on the target type, if bidirectional
    pub partner: Option<String>,
}

/// An entity type parsed from the metadata document.
///
/// Immutable once parsed; owned exclusively by the metadata model for the
/// lifetime of one verification session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    /// Simple type name
    pub name: String,
    /// Namespace-qualified name
    pub qualified_name: String,
    /// Name of the entity set exposing this type, if any
    pub entity_set: Option<String>,
    /// Declared structural properties, in document order
    pub properties: Vec<Property>,
    /// Declared navigation properties, in document order
    pub navigation: Vec<NavigationProperty>,
    /// Names of the key properties
    pub key_names: Vec<String>,
    /// Whether the type is stream/media-backed
    pub has_stream: bool,
}

impl EntityType {
    /// Iterate the key properties in declaration order.
    pub fn key_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_key)
    }

    /// Look up a navigation property by name.
    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation.iter().find(|n| n.name == name)
    }

    /// Whether any navigation property has the given multiplicity.
    pub fn has_navigation(&self, multiplicity: Multiplicity) -> bool {
        self.navigation.iter().any(|n| n.multiplicity == multiplicity)
    }
}

/// One resolved hop of a navigation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationStep {
    /// The navigation property taken at this hop
    pub property: NavigationProperty,
    /// Multiplicity accumulated from the root through this hop
    pub cumulative: Multiplicity,
}

/// A fully resolved navigation path from a root entity type.
///
/// One stack per branch of a navigation expression; built per
/// verification attempt and discarded after use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationStack {
    /// Qualified name of the root entity type
    pub root: String,
    /// Resolved hops, outermost first
    pub steps: Vec<NavigationStep>,
}

impl NavigationStack {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The final hop of the path, if any.
    pub fn leaf(&self) -> Option<&NavigationStep> {
        self.steps.last()
    }

    /// Slash-joined segment names, for diagnostics.
    pub fn path(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.property.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// A resource created (or about to be created) during synthesis.
///
/// The URL stays unresolved until the verifier has executed the create
/// call and the server has assigned identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedResource {
    /// Resource URL once known, target of the cleanup delete
    pub url: Option<String>,
    /// JSON path of this entity inside the synthesized payload
    /// (empty for the root entity)
    pub local_path: Vec<String>,
    /// Whether the entity is stream/media-backed and needs the media
    /// request encoding
    pub is_media: bool,
    /// ETag-like token required by the delete, if the service issued one
    pub etag: Option<String>,
}

impl SynthesizedResource {
    /// Descriptor for the root entity of a synthesized payload.
    pub fn root(is_media: bool) -> Self {
        Self {
            url: None,
            local_path: Vec::new(),
            is_media,
            etag: None,
        }
    }

    /// Descriptor for an entity nested at `local_path` in the payload.
    pub fn nested(local_path: Vec<String>, is_media: bool) -> Self {
        Self {
            url: None,
            local_path,
            is_media,
            etag: None,
        }
    }
}

/// Permitted operations for an entity set, derived from capability
/// vocabulary annotations. Read-only after derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restrictions {
    /// Whether inserts are permitted
    pub insertable: bool,
    /// Whether deletes are permitted
    pub deletable: bool,
    /// Whether expand is permitted
    pub expandable: bool,
    /// Navigation properties that may not be populated in a deep insert
    pub non_insertable_navigations: Vec<String>,
}

impl Restrictions {
    /// Restrictions permitting every operation.
    pub fn unrestricted() -> Self {
        Self {
            insertable: true,
            deletable: true,
            expandable: true,
            non_insertable_navigations: Vec::new(),
        }
    }

    /// Restrictions permitting nothing; the explicit-opt-in baseline.
    pub fn closed() -> Self {
        Self {
            insertable: false,
            deletable: false,
            expandable: false,
            non_insertable_navigations: Vec::new(),
        }
    }

    /// Whether a deep insert may populate the named navigation property.
    pub fn allows_deep_insert(&self, navigation: &str) -> bool {
        self.insertable
            && !self
                .non_insertable_navigations
                .iter()
                .any(|n| n == navigation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav(name: &str, target: &str, multiplicity: Multiplicity) -> NavigationProperty {
        NavigationProperty {
            name: name.into(),
            target_type: target.into(),
            multiplicity,
            partner: None,
        }
    }

    #[test]
    fn test_primitive_from_edm_roundtrip() {
        let guid = PrimitiveType::from_edm("Edm.Guid").unwrap();
        assert_eq!(guid, PrimitiveType::Guid);
        assert_eq!(guid.edm_name(), "Edm.Guid");
    }

    #[test]
    fn test_primitive_unsupported() {
        let err = PrimitiveType::from_edm("Edm.GeographyPoint").unwrap_err();
        assert!(err.to_string().contains("Edm.GeographyPoint"));
    }

    #[test]
    fn test_multiplicity_many_is_sticky() {
        assert_eq!(
            Multiplicity::One.combine(Multiplicity::One),
            Multiplicity::One
        );
        assert_eq!(
            Multiplicity::Many.combine(Multiplicity::One),
            Multiplicity::Many
        );
        assert_eq!(
            Multiplicity::One.combine(Multiplicity::Many),
            Multiplicity::Many
        );
    }

    #[test]
    fn test_stack_path_and_leaf() {
        let stack = NavigationStack {
            root: "ns.Customer".into(),
            steps: vec![
                NavigationStep {
                    property: nav("Orders", "ns.Order", Multiplicity::Many),
                    cumulative: Multiplicity::Many,
                },
                NavigationStep {
                    property: nav("Items", "ns.Item", Multiplicity::Many),
                    cumulative: Multiplicity::Many,
                },
            ],
        };
        assert_eq!(stack.path(), "Orders/Items");
        assert_eq!(stack.leaf().unwrap().property.name, "Items");
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_restrictions_deep_insert_gate() {
        let mut r = Restrictions::unrestricted();
        r.non_insertable_navigations.push("Audit".into());
        assert!(r.allows_deep_insert("Orders"));
        assert!(!r.allows_deep_insert("Audit"));
        assert!(!Restrictions::closed().allows_deep_insert("Orders"));
    }

    #[test]
    fn test_entity_type_lookups() {
        let ty = EntityType {
            name: "Customer".into(),
            qualified_name: "ns.Customer".into(),
            entity_set: Some("Customers".into()),
            properties: vec![Property::key("Id", PrimitiveType::Guid)],
            navigation: vec![nav("Orders", "ns.Order", Multiplicity::Many)],
            key_names: vec!["Id".into()],
            has_stream: false,
        };
        assert_eq!(ty.key_properties().count(), 1);
        assert!(ty.navigation_property("Orders").is_some());
        assert!(ty.navigation_property("Nope").is_none());
        assert!(ty.has_navigation(Multiplicity::Many));
        assert!(!ty.has_navigation(Multiplicity::One));
    }
}
