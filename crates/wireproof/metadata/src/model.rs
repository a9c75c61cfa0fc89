//! Service model: the navigable type graph and its query surface

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use wireproof_types::{EntityType, Multiplicity, PrimitiveType, Restrictions};

use crate::error::MetadataResult;
use crate::parser::{self, ParsedDocument, RestrictionRecord};

/// Per-spec-version behavior knobs for the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// When true, an entity set with no capability annotations permits
    /// nothing; operations must be explicitly opted in. When false
    /// (the default), absence of annotations means unrestricted.
    pub explicit_opt_in: bool,
}

/// Fixture-search criteria for [`ServiceModel::find_entity_types`].
#[derive(Debug, Clone, Default)]
pub struct TypeFilter {
    /// Minimum number of key properties the type must declare
    pub min_key_properties: usize,
    /// Primitive types every key property must be drawn from;
    /// empty means any supported primitive
    pub allowed_key_types: Vec<PrimitiveType>,
    /// Require at least one navigation property of this multiplicity
    pub navigation_multiplicity: Option<Multiplicity>,
    /// Require the type to be exposed through an entity set
    pub require_entity_set: bool,
}

impl TypeFilter {
    pub fn with_key_types(mut self, types: &[PrimitiveType]) -> Self {
        self.allowed_key_types = types.to_vec();
        self
    }

    pub fn with_navigation(mut self, multiplicity: Multiplicity) -> Self {
        self.navigation_multiplicity = Some(multiplicity);
        self
    }

    pub fn exposed(mut self) -> Self {
        self.require_entity_set = true;
        self
    }
}

/// The parsed, immutable type graph of one service.
///
/// Owns every [`EntityType`]; all other components borrow from it.
/// Safe for concurrent read access once constructed.
#[derive(Debug)]
pub struct ServiceModel {
    types: BTreeMap<String, EntityType>,
    sets: BTreeMap<String, String>,
    restrictions: BTreeMap<String, RestrictionRecord>,
    config: ModelConfig,
}

impl ServiceModel {
    /// Parse a metadata document with default configuration.
    pub fn parse(xml: &str) -> MetadataResult<Self> {
        Self::parse_with_config(xml, ModelConfig::default())
    }

    /// Parse a metadata document with explicit configuration.
    pub fn parse_with_config(xml: &str, config: ModelConfig) -> MetadataResult<Self> {
        let ParsedDocument {
            types,
            sets,
            restrictions,
        } = parser::parse_document(xml)?;
        Ok(Self {
            types,
            sets,
            restrictions,
            config,
        })
    }

    /// Look up an entity type by qualified name, falling back to a
    /// unique simple-name match.
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        if let Some(ty) = self.types.get(name) {
            return Some(ty);
        }
        let mut by_simple = self.types.values().filter(|t| t.name == name);
        let first = by_simple.next();
        // Ambiguous simple names resolve to nothing.
        if by_simple.next().is_some() {
            return None;
        }
        first
    }

    /// The entity type exposed by the named entity set.
    pub fn entity_type_for_set(&self, set: &str) -> Option<&EntityType> {
        self.sets.get(set).and_then(|name| self.types.get(name))
    }

    /// Names of all declared entity sets.
    pub fn entity_sets(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// All parsed entity types, in qualified-name order.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    /// Every entity type satisfying the filter.
    ///
    /// An empty result is the expected "no fixture" answer, not an
    /// error; dependent attempts report inconclusive.
    pub fn find_entity_types(&self, filter: &TypeFilter) -> Vec<&EntityType> {
        self.types
            .values()
            .filter(|ty| self.matches(ty, filter))
            .collect()
    }

    fn matches(&self, ty: &EntityType, filter: &TypeFilter) -> bool {
        if filter.require_entity_set && ty.entity_set.is_none() {
            return false;
        }
        let keys: Vec<_> = ty.key_properties().collect();
        if keys.len() < filter.min_key_properties || keys.is_empty() {
            return false;
        }
        for key in &keys {
            let Some(primitive) = key.primitive else {
                return false;
            };
            if !filter.allowed_key_types.is_empty()
                && !filter.allowed_key_types.contains(&primitive)
            {
                return false;
            }
        }
        match filter.navigation_multiplicity {
            Some(multiplicity) => ty.has_navigation(multiplicity),
            None => true,
        }
    }

    /// Derive the permitted operations for an entity set from its
    /// capability annotations.
    ///
    /// With default configuration an unannotated operation is permitted;
    /// under `explicit_opt_in` it is denied.
    pub fn restrictions_for(&self, entity_set: &str) -> Restrictions {
        let base = if self.config.explicit_opt_in {
            Restrictions::closed()
        } else {
            Restrictions::unrestricted()
        };
        let Some(record) = self.restrictions.get(entity_set) else {
            return base;
        };
        Restrictions {
            insertable: record.insertable.unwrap_or(base.insertable),
            deletable: record.deletable.unwrap_or(base.deletable),
            expandable: record.expandable.unwrap_or(base.expandable),
            non_insertable_navigations: record.non_insertable_navigations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:Reference Uri="https://oasis/vocabularies/Capabilities.xml">
    <edmx:Include Namespace="Org.OData.Capabilities.V1" Alias="Capabilities"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Demo">
      <EntityType Name="Customer">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Guid" Nullable="false"/>
        <Property Name="Name" Type="Edm.String" Nullable="false"/>
        <Property Name="Tier" Type="Edm.Int32"/>
        <NavigationProperty Name="Orders" Type="Collection(Demo.Order)" Partner="Customer"/>
      </EntityType>
      <EntityType Name="Order">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int64" Nullable="false"/>
        <Property Name="Total" Type="Edm.Decimal" Nullable="false"/>
        <NavigationProperty Name="Customer" Type="Demo.Customer" Partner="Orders"/>
        <NavigationProperty Name="Items" Type="Collection(Demo.Item)"/>
      </EntityType>
      <EntityType Name="Item">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
        <Property Name="Label" Type="Edm.String"/>
      </EntityType>
      <EntityType Name="Document" HasStream="true">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Guid" Nullable="false"/>
      </EntityType>
      <EntityType Name="Exotic">
        <Key><PropertyRef Name="Location"/></Key>
        <Property Name="Location" Type="Edm.GeographyPoint" Nullable="false"/>
      </EntityType>
      <EntityContainer Name="Container">
        <EntitySet Name="Customers" EntityType="Demo.Customer">
          <Annotation Term="Org.OData.Capabilities.V1.InsertRestrictions">
            <Record>
              <PropertyValue Property="Insertable" Bool="true"/>
              <PropertyValue Property="NonInsertableNavigationProperties">
                <Collection>
                  <NavigationPropertyPath>Orders</NavigationPropertyPath>
                </Collection>
              </PropertyValue>
            </Record>
          </Annotation>
        </EntitySet>
        <EntitySet Name="Orders" EntityType="Demo.Order"/>
        <EntitySet Name="Items" EntityType="Demo.Item"/>
        <EntitySet Name="Documents" EntityType="Demo.Document"/>
        <EntitySet Name="Exotics" EntityType="Demo.Exotic"/>
      </EntityContainer>
      <Annotations Target="Demo.Container/Orders">
        <Annotation Term="Org.OData.Capabilities.V1.DeleteRestrictions">
          <Record>
            <PropertyValue Property="Deletable" Bool="false"/>
          </Record>
        </Annotation>
      </Annotations>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    #[test]
    fn test_parse_builds_type_graph() {
        let model = ServiceModel::parse(METADATA).unwrap();
        let customer = model.entity_type("Demo.Customer").unwrap();
        assert_eq!(customer.entity_set.as_deref(), Some("Customers"));
        assert_eq!(customer.key_names, vec!["Id".to_string()]);
        assert_eq!(customer.properties.len(), 3);

        let orders = customer.navigation_property("Orders").unwrap();
        assert_eq!(orders.multiplicity, Multiplicity::Many);
        assert_eq!(orders.target_type, "Demo.Order");
        assert_eq!(orders.partner.as_deref(), Some("Customer"));

        let order = model.entity_type_for_set("Orders").unwrap();
        assert_eq!(
            order.navigation_property("Customer").unwrap().multiplicity,
            Multiplicity::One
        );

        assert!(model.entity_type("Demo.Document").unwrap().has_stream);
    }

    #[test]
    fn test_simple_name_lookup() {
        let model = ServiceModel::parse(METADATA).unwrap();
        assert_eq!(
            model.entity_type("Customer").unwrap().qualified_name,
            "Demo.Customer"
        );
        assert!(model.entity_type("Nonexistent").is_none());
    }

    #[test]
    fn test_unsupported_key_type_is_kept_in_model() {
        let model = ServiceModel::parse(METADATA).unwrap();
        let exotic = model.entity_type("Demo.Exotic").unwrap();
        let key = exotic.key_properties().next().unwrap();
        assert!(key.primitive.is_none());
        assert_eq!(key.declared_type, "Edm.GeographyPoint");
    }

    #[test]
    fn test_malformed_xml_is_fatal() {
        let err = ServiceModel::parse("<edmx:Edmx>").unwrap_err();
        assert!(err.to_string().contains("malformed metadata"));
    }

    #[test]
    fn test_reference_without_include_is_rejected() {
        let doc = r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:Reference Uri="https://example.org/vocab.xml"/>
  <edmx:DataServices/>
</edmx:Edmx>"#;
        let err = ServiceModel::parse(doc).unwrap_err();
        assert!(err.to_string().contains("Include"));
    }

    #[test]
    fn test_find_entity_types_filters() {
        let model = ServiceModel::parse(METADATA).unwrap();

        let guid_keyed = model.find_entity_types(
            &TypeFilter::default()
                .with_key_types(&[PrimitiveType::Guid])
                .with_navigation(Multiplicity::Many)
                .exposed(),
        );
        assert_eq!(guid_keyed.len(), 1);
        assert_eq!(guid_keyed[0].name, "Customer");

        // No type has a Boolean key: empty result, not an error.
        let none = model
            .find_entity_types(&TypeFilter::default().with_key_types(&[PrimitiveType::Boolean]));
        assert!(none.is_empty());

        // The exotic key type never satisfies any filter.
        let all_with_keys = model.find_entity_types(&TypeFilter::default());
        assert!(all_with_keys.iter().all(|t| t.name != "Exotic"));
    }

    #[test]
    fn test_restrictions_from_annotations() {
        let model = ServiceModel::parse(METADATA).unwrap();

        let customers = model.restrictions_for("Customers");
        assert!(customers.insertable);
        assert!(!customers.allows_deep_insert("Orders"));

        let orders = model.restrictions_for("Orders");
        assert!(!orders.deletable);
        assert!(orders.insertable);

        // No annotations at all: unrestricted by default.
        let items = model.restrictions_for("Items");
        assert!(items.insertable && items.deletable && items.expandable);
    }

    #[test]
    fn test_restrictions_explicit_opt_in() {
        let model = ServiceModel::parse_with_config(
            METADATA,
            ModelConfig {
                explicit_opt_in: true,
            },
        )
        .unwrap();

        // Unannotated operations are denied under opt-in.
        let items = model.restrictions_for("Items");
        assert!(!items.insertable);

        // Explicit annotations still win.
        let customers = model.restrictions_for("Customers");
        assert!(customers.insertable);
    }
}
