//! Wireproof test data synthesizer
//!
//! Builds spec-valid request payloads for an entity type on demand: every
//! declared property gets a non-null, type-appropriate placeholder, key
//! properties match their declared primitive exactly, and requested
//! navigation properties are populated with recursively synthesized
//! related entities (a one-element array for `many`, a nested object for
//! `one`).
//!
//! The synthesizer never performs I/O. Alongside the payload it returns
//! the ordered ledger of [`SynthesizedResource`] descriptors, root first
//! and leaf last, whose URLs the verifier fills in once the service has
//! assigned identifiers.
//!
//! Each synthesizer carries a random namespace suffix, so payloads from
//! concurrent verification attempts never collide on unique keys, and a
//! monotonic counter, so repeated calls within one attempt stay
//! distinguishable.

use rand::Rng;
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;
use wireproof_metadata::ServiceModel;
use wireproof_types::{
    EntityType, Multiplicity, NavigationStack, PrimitiveType, SynthesizedResource,
};

/// Errors raised during payload synthesis.
///
/// Per-attempt: callers convert these to an inconclusive verdict ("no
/// usable fixture"), never a hard session failure.
#[derive(Debug, Error)]
pub enum SynthError {
    /// A key property's declared type is outside the supported
    /// enumeration
    #[error("unsupported key type {declared_type} on {type_name}.{property}")]
    UnsupportedKeyType {
        property: String,
        declared_type: String,
        type_name: String,
    },

    /// The named entity type is not declared in the metadata document
    #[error("unknown entity type: {0}")]
    UnknownType(String),

    /// A navigation property to populate does not exist on the type
    #[error("unknown navigation property '{navigation}' on type {on_type}")]
    UnknownNavigation { navigation: String, on_type: String },
}

/// Convenience result type for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// A synthesized request payload plus its resource ledger.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Entity set the outer create request targets
    pub entity_set: String,
    /// The request body
    pub payload: Value,
    /// Descriptors for every entity the payload will create, root
    /// first, deep-insert leaf last
    pub resources: Vec<SynthesizedResource>,
}

/// Payload builder bound to one metadata model and one verification
/// attempt.
pub struct Synthesizer<'m> {
    model: &'m ServiceModel,
    namespace: String,
    counter: u64,
    numeric_base: i64,
}

impl<'m> Synthesizer<'m> {
    /// A synthesizer with a fresh random namespace.
    pub fn new(model: &'m ServiceModel) -> Self {
        let namespace = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self::with_namespace(model, namespace)
    }

    /// A synthesizer with a caller-chosen namespace (tests mostly).
    pub fn with_namespace(model: &'m ServiceModel, namespace: impl Into<String>) -> Self {
        Self {
            model,
            namespace: namespace.into(),
            counter: 0,
            numeric_base: rand::thread_rng().gen_range(1_000..9_000),
        }
    }

    /// Synthesize a create payload for `type_name`, populating the named
    /// navigation properties with one related entity each.
    pub fn synthesize(
        &mut self,
        entity_set: &str,
        type_name: &str,
        navigations: &[&str],
    ) -> SynthResult<Synthesis> {
        let ty = self.lookup(type_name)?;
        let mut resources = Vec::new();
        let payload = self.entity_payload(&ty, navigations, &[], &mut resources)?;
        tracing::debug!(
            entity_set,
            type_name,
            entities = resources.len(),
            "synthesized payload"
        );
        Ok(Synthesis {
            entity_set: entity_set.to_string(),
            payload,
            resources,
        })
    }

    /// Synthesize a deep-insert payload following a resolved navigation
    /// stack: each hop nests one related entity inside the previous one.
    ///
    /// Recursion depth is the stack's literal length, so cycles in the
    /// type graph never matter here.
    pub fn synthesize_stack(
        &mut self,
        entity_set: &str,
        root_type: &str,
        stack: &NavigationStack,
    ) -> SynthResult<Synthesis> {
        let ty = self.lookup(root_type)?;
        let mut resources = Vec::new();
        let payload = self.stack_payload(&ty, &stack.steps, &[], &mut resources)?;
        Ok(Synthesis {
            entity_set: entity_set.to_string(),
            payload,
            resources,
        })
    }

    fn lookup(&self, type_name: &str) -> SynthResult<EntityType> {
        self.model
            .entity_type(type_name)
            .cloned()
            .ok_or_else(|| SynthError::UnknownType(type_name.to_string()))
    }

    /// Structured payload for one entity, recursing into the named
    /// navigation properties.
    fn entity_payload(
        &mut self,
        ty: &EntityType,
        navigations: &[&str],
        local_path: &[String],
        resources: &mut Vec<SynthesizedResource>,
    ) -> SynthResult<Value> {
        resources.push(SynthesizedResource::nested(
            local_path.to_vec(),
            ty.has_stream,
        ));
        let mut object = self.structural_fields(ty)?;

        for name in navigations {
            let nav = ty
                .navigation_property(name)
                .ok_or_else(|| SynthError::UnknownNavigation {
                    navigation: (*name).to_string(),
                    on_type: ty.qualified_name.clone(),
                })?
                .clone();
            let target = self.lookup(&nav.target_type)?;
            let mut child_path = local_path.to_vec();
            child_path.push(nav.name.clone());
            let value = match nav.multiplicity {
                Multiplicity::Many => {
                    child_path.push("0".to_string());
                    let child = self.entity_payload(&target, &[], &child_path, resources)?;
                    Value::Array(vec![child])
                }
                Multiplicity::One => {
                    self.entity_payload(&target, &[], &child_path, resources)?
                }
            };
            object.insert(nav.name, value);
        }
        Ok(Value::Object(object))
    }

    /// Payload for one entity nesting the remainder of a navigation
    /// stack inside it.
    fn stack_payload(
        &mut self,
        ty: &EntityType,
        steps: &[wireproof_types::NavigationStep],
        local_path: &[String],
        resources: &mut Vec<SynthesizedResource>,
    ) -> SynthResult<Value> {
        let Some((step, rest)) = steps.split_first() else {
            return self.entity_payload(ty, &[], local_path, resources);
        };
        resources.push(SynthesizedResource::nested(
            local_path.to_vec(),
            ty.has_stream,
        ));
        let mut object = self.structural_fields(ty)?;

        let target = self.lookup(&step.property.target_type)?;
        let mut child_path = local_path.to_vec();
        child_path.push(step.property.name.clone());
        let value = match step.property.multiplicity {
            Multiplicity::Many => {
                child_path.push("0".to_string());
                let child = self.stack_payload(&target, rest, &child_path, resources)?;
                Value::Array(vec![child])
            }
            Multiplicity::One => self.stack_payload(&target, rest, &child_path, resources)?,
        };
        object.insert(step.property.name.clone(), value);
        Ok(Value::Object(object))
    }

    /// Placeholder values for every synthesizable declared property.
    ///
    /// Key properties must be representable; a key outside the supported
    /// enumeration aborts synthesis. Non-key properties the enumeration
    /// cannot express are left for the service to default.
    fn structural_fields(&mut self, ty: &EntityType) -> SynthResult<Map<String, Value>> {
        self.counter += 1;
        let mut object = Map::new();
        for property in &ty.properties {
            match property.primitive {
                Some(primitive) => {
                    object.insert(property.name.clone(), self.placeholder(primitive));
                }
                None if property.is_key => {
                    return Err(SynthError::UnsupportedKeyType {
                        property: property.name.clone(),
                        declared_type: property.declared_type.clone(),
                        type_name: ty.qualified_name.clone(),
                    });
                }
                None => {}
            }
        }
        Ok(object)
    }

    fn placeholder(&self, primitive: PrimitiveType) -> Value {
        let n = self.numeric_base + self.counter as i64;
        match primitive {
            PrimitiveType::Byte => json!(1 + (self.counter % 200)),
            PrimitiveType::Int16 => json!((n % i64::from(i16::MAX)) as i16),
            PrimitiveType::Int32 => json!(n as i32),
            PrimitiveType::Int64 => json!(n),
            PrimitiveType::Boolean => json!(true),
            PrimitiveType::String => {
                json!(format!("wireproof-{}-{}", self.namespace, self.counter))
            }
            PrimitiveType::Guid => json!(Uuid::new_v4().to_string()),
            PrimitiveType::Decimal => json!(n as f64 + 0.5),
            PrimitiveType::Double => json!(n as f64 + 0.25),
            PrimitiveType::DateTimeOffset => json!("2026-01-01T00:00:00Z"),
            PrimitiveType::Binary => json!("d2lyZXByb29m"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireproof_types::{NavigationStep, Property};

    const METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Demo">
      <EntityType Name="Customer">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Guid" Nullable="false"/>
        <Property Name="Name" Type="Edm.String" Nullable="false"/>
        <NavigationProperty Name="Orders" Type="Collection(Demo.Order)"/>
        <NavigationProperty Name="Profile" Type="Demo.Profile"/>
      </EntityType>
      <EntityType Name="Order">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int64" Nullable="false"/>
        <Property Name="Total" Type="Edm.Decimal" Nullable="false"/>
        <NavigationProperty Name="Items" Type="Collection(Demo.Item)"/>
      </EntityType>
      <EntityType Name="Item">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
      </EntityType>
      <EntityType Name="Profile">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
      </EntityType>
      <EntityType Name="Photo" HasStream="true">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Guid" Nullable="false"/>
      </EntityType>
      <EntityType Name="Exotic">
        <Key><PropertyRef Name="Point"/></Key>
        <Property Name="Point" Type="Edm.GeographyPoint" Nullable="false"/>
      </EntityType>
      <EntityContainer Name="Container">
        <EntitySet Name="Customers" EntityType="Demo.Customer"/>
        <EntitySet Name="Photos" EntityType="Demo.Photo"/>
        <EntitySet Name="Exotics" EntityType="Demo.Exotic"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    fn model() -> ServiceModel {
        ServiceModel::parse(METADATA).unwrap()
    }

    #[test]
    fn test_guid_key_roundtrips_as_valid_guid() {
        let model = model();
        let mut synth = Synthesizer::with_namespace(&model, "t1");
        let result = synth.synthesize("Customers", "Demo.Customer", &[]).unwrap();
        let id = result.payload["Id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert!(result.payload["Name"].is_string());
        assert_eq!(result.resources.len(), 1);
        assert!(result.resources[0].local_path.is_empty());
    }

    #[test]
    fn test_deep_insert_nests_by_multiplicity() {
        let model = model();
        let mut synth = Synthesizer::with_namespace(&model, "t2");
        let result = synth
            .synthesize("Customers", "Demo.Customer", &["Orders", "Profile"])
            .unwrap();

        // `many` embeds a one-element array, `one` a single object.
        let orders = result.payload["Orders"].as_array().unwrap();
        assert_eq!(orders.len(), 1);
        assert!(orders[0]["Total"].is_number());
        assert!(result.payload["Profile"].is_object());

        assert_eq!(result.resources.len(), 3);
        assert!(result.resources[0].local_path.is_empty());
        assert_eq!(result.resources[1].local_path, vec!["Orders", "0"]);
        assert_eq!(result.resources[2].local_path, vec!["Profile"]);
    }

    #[test]
    fn test_stack_synthesis_leaf_is_last() {
        let model = model();
        let customer = model.entity_type("Demo.Customer").unwrap();
        let orders = customer.navigation_property("Orders").unwrap().clone();
        let order = model.entity_type("Demo.Order").unwrap();
        let items = order.navigation_property("Items").unwrap().clone();
        let stack = NavigationStack {
            root: customer.qualified_name.clone(),
            steps: vec![
                NavigationStep {
                    cumulative: orders.multiplicity,
                    property: orders,
                },
                NavigationStep {
                    cumulative: Multiplicity::Many,
                    property: items,
                },
            ],
        };

        let mut synth = Synthesizer::with_namespace(&model, "t3");
        let result = synth
            .synthesize_stack("Customers", "Demo.Customer", &stack)
            .unwrap();

        let item = &result.payload["Orders"][0]["Items"][0];
        assert!(item["Id"].is_number());
        assert_eq!(result.resources.len(), 3);
        assert_eq!(
            result.resources.last().unwrap().local_path,
            vec!["Orders", "0", "Items", "0"]
        );
    }

    #[test]
    fn test_values_distinguishable_across_calls() {
        let model = model();
        let mut synth = Synthesizer::with_namespace(&model, "t4");
        let a = synth.synthesize("Customers", "Demo.Customer", &[]).unwrap();
        let b = synth.synthesize("Customers", "Demo.Customer", &[]).unwrap();
        assert_ne!(a.payload["Id"], b.payload["Id"]);
        assert_ne!(a.payload["Name"], b.payload["Name"]);
    }

    #[test]
    fn test_unsupported_key_type() {
        let model = model();
        let mut synth = Synthesizer::with_namespace(&model, "t5");
        let err = synth.synthesize("Exotics", "Demo.Exotic", &[]).unwrap_err();
        match err {
            SynthError::UnsupportedKeyType {
                property,
                declared_type,
                ..
            } => {
                assert_eq!(property, "Point");
                assert_eq!(declared_type, "Edm.GeographyPoint");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_media_entity_flagged() {
        let model = model();
        let mut synth = Synthesizer::with_namespace(&model, "t6");
        let result = synth.synthesize("Photos", "Demo.Photo", &[]).unwrap();
        assert!(result.resources[0].is_media);
    }

    #[test]
    fn test_unknown_navigation() {
        let model = model();
        let mut synth = Synthesizer::with_namespace(&model, "t7");
        assert!(matches!(
            synth.synthesize("Customers", "Demo.Customer", &["Nope"]),
            Err(SynthError::UnknownNavigation { .. })
        ));
    }

    #[test]
    fn test_every_non_key_property_is_non_null() {
        let model = model();
        let mut synth = Synthesizer::with_namespace(&model, "t8");
        let result = synth.synthesize("Customers", "Demo.Customer", &[]).unwrap();
        let customer = model.entity_type("Demo.Customer").unwrap();
        for Property { name, .. } in customer
            .properties
            .iter()
            .filter(|p| p.primitive.is_some())
        {
            assert!(!result.payload[name].is_null(), "property {name} is null");
        }
    }
}
