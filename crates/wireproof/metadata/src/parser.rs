//! CSDL document parser
//!
//! Walks the XML metadata document and produces the raw material for a
//! `ServiceModel`: entity types, entity-set bindings, and capability
//! annotation records. Element matching is by local name so that edmx
//! namespace aliasing never affects parsing.

use std::collections::BTreeMap;

use roxmltree::{Document, Node};
use wireproof_types::{EntityType, Multiplicity, NavigationProperty, PrimitiveType, Property};

use crate::error::{MetadataError, MetadataResult};

/// Capability annotation values recorded for one entity set.
///
/// `None` means the annotation was absent; the model decides what absence
/// means based on its configuration.
#[derive(Debug, Clone, Default)]
pub(crate) struct RestrictionRecord {
    pub insertable: Option<bool>,
    pub deletable: Option<bool>,
    pub expandable: Option<bool>,
    pub non_insertable_navigations: Vec<String>,
}

/// Everything extracted from one metadata document.
#[derive(Debug, Default)]
pub(crate) struct ParsedDocument {
    /// Entity types keyed by qualified name
    pub types: BTreeMap<String, EntityType>,
    /// Entity set name -> qualified entity type name
    pub sets: BTreeMap<String, String>,
    /// Entity set name -> recorded capability annotations
    pub restrictions: BTreeMap<String, RestrictionRecord>,
}

pub(crate) fn parse_document(xml: &str) -> MetadataResult<ParsedDocument> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "Edmx" {
        return Err(MetadataError::structure(format!(
            "document root is <{}>, expected <Edmx>",
            root.tag_name().name()
        )));
    }

    // A Reference element without an Include child is itself a
    // conformance defect in the document; reject rather than skip.
    for reference in elements(root, "Reference") {
        let has_include = reference
            .children()
            .filter(Node::is_element)
            .any(|c| matches!(c.tag_name().name(), "Include" | "IncludeAnnotations"));
        if !has_include {
            return Err(MetadataError::structure(
                "Reference element has no Include or IncludeAnnotations child",
            ));
        }
    }

    let data_services = elements(root, "DataServices").next().ok_or_else(|| {
        MetadataError::structure("Edmx element has no DataServices child")
    })?;

    let mut parsed = ParsedDocument::default();
    for schema in elements(data_services, "Schema") {
        let namespace = schema.attribute("Namespace").ok_or_else(|| {
            MetadataError::structure("Schema element has no Namespace attribute")
        })?;
        parse_schema(schema, namespace, &mut parsed)?;
    }

    // Back-fill the owning entity set on each type.
    for (set, type_name) in &parsed.sets {
        if let Some(ty) = parsed.types.get_mut(type_name) {
            if ty.entity_set.is_none() {
                ty.entity_set = Some(set.clone());
            }
        }
    }

    tracing::debug!(
        types = parsed.types.len(),
        sets = parsed.sets.len(),
        "parsed metadata document"
    );
    Ok(parsed)
}

fn parse_schema(
    schema: Node<'_, '_>,
    namespace: &str,
    parsed: &mut ParsedDocument,
) -> MetadataResult<()> {
    for child in schema.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "EntityType" => {
                let ty = parse_entity_type(child, namespace)?;
                parsed.types.insert(ty.qualified_name.clone(), ty);
            }
            "EntityContainer" => parse_container(child, parsed)?,
            "Annotations" => parse_annotations_block(child, parsed),
            _ => {}
        }
    }
    Ok(())
}

fn parse_entity_type(node: Node<'_, '_>, namespace: &str) -> MetadataResult<EntityType> {
    let name = node
        .attribute("Name")
        .ok_or_else(|| MetadataError::structure("EntityType element has no Name attribute"))?;
    let qualified_name = format!("{namespace}.{name}");
    let has_stream = node.attribute("HasStream") == Some("true");

    let mut key_names = Vec::new();
    if let Some(key) = elements(node, "Key").next() {
        for prop_ref in elements(key, "PropertyRef") {
            let key_name = prop_ref.attribute("Name").ok_or_else(|| {
                MetadataError::structure(format!(
                    "PropertyRef without Name attribute on type {qualified_name}"
                ))
            })?;
            key_names.push(key_name.to_string());
        }
    }

    let mut properties = Vec::new();
    let mut navigation = Vec::new();
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "Property" => {
                let prop_name = child.attribute("Name").ok_or_else(|| {
                    MetadataError::structure(format!(
                        "Property without Name attribute on type {qualified_name}"
                    ))
                })?;
                let declared_type = child.attribute("Type").unwrap_or_default().to_string();
                properties.push(Property {
                    name: prop_name.to_string(),
                    primitive: PrimitiveType::from_edm(&declared_type).ok(),
                    declared_type,
                    nullable: child.attribute("Nullable") != Some("false"),
                    is_key: key_names.iter().any(|k| k == prop_name),
                });
            }
            "NavigationProperty" => {
                navigation.push(parse_navigation(child, &qualified_name)?);
            }
            _ => {}
        }
    }

    Ok(EntityType {
        name: name.to_string(),
        qualified_name,
        entity_set: None,
        properties,
        navigation,
        key_names,
        has_stream,
    })
}

fn parse_navigation(node: Node<'_, '_>, owner: &str) -> MetadataResult<NavigationProperty> {
    let name = node.attribute("Name").ok_or_else(|| {
        MetadataError::structure(format!(
            "NavigationProperty without Name attribute on type {owner}"
        ))
    })?;
    let declared = node.attribute("Type").ok_or_else(|| {
        MetadataError::structure(format!(
            "NavigationProperty {name} on type {owner} has no Type attribute"
        ))
    })?;
    let (target_type, multiplicity) = match declared
        .strip_prefix("Collection(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (inner.to_string(), Multiplicity::Many),
        None => (declared.to_string(), Multiplicity::One),
    };
    Ok(NavigationProperty {
        name: name.to_string(),
        target_type,
        multiplicity,
        partner: node.attribute("Partner").map(str::to_string),
    })
}

fn parse_container(node: Node<'_, '_>, parsed: &mut ParsedDocument) -> MetadataResult<()> {
    for set in elements(node, "EntitySet") {
        let set_name = set
            .attribute("Name")
            .ok_or_else(|| MetadataError::structure("EntitySet element has no Name attribute"))?;
        let type_name = set.attribute("EntityType").ok_or_else(|| {
            MetadataError::structure(format!(
                "EntitySet {set_name} has no EntityType attribute"
            ))
        })?;
        parsed
            .sets
            .insert(set_name.to_string(), type_name.to_string());

        // Inline capability annotations on the set itself.
        let record = parsed.restrictions.entry(set_name.to_string()).or_default();
        for annotation in elements(set, "Annotation") {
            apply_annotation(annotation, record);
        }
    }
    Ok(())
}

/// An `Annotations Target="ns.Container/Customers"` block; the last path
/// segment of the target names the entity set.
fn parse_annotations_block(node: Node<'_, '_>, parsed: &mut ParsedDocument) {
    let Some(target) = node.attribute("Target") else {
        return;
    };
    let set_name = target.rsplit('/').next().unwrap_or(target).to_string();
    let record = parsed.restrictions.entry(set_name).or_default();
    for annotation in elements(node, "Annotation") {
        apply_annotation(annotation, record);
    }
}

fn apply_annotation(node: Node<'_, '_>, record: &mut RestrictionRecord) {
    let Some(term) = node.attribute("Term") else {
        return;
    };
    let flag_property = match term.rsplit('.').next() {
        Some("InsertRestrictions") => "Insertable",
        Some("DeleteRestrictions") => "Deletable",
        Some("ExpandRestrictions") => "Expandable",
        _ => return,
    };
    let Some(rec) = elements(node, "Record").next() else {
        return;
    };
    for value in elements(rec, "PropertyValue") {
        match value.attribute("Property") {
            Some(p) if p == flag_property => {
                let flag = bool_value(value);
                match flag_property {
                    "Insertable" => record.insertable = flag,
                    "Deletable" => record.deletable = flag,
                    _ => record.expandable = flag,
                }
            }
            Some("NonInsertableNavigationProperties") => {
                for collection in elements(value, "Collection") {
                    for path in elements(collection, "NavigationPropertyPath") {
                        if let Some(text) = path.text() {
                            let text = text.trim();
                            if !text.is_empty() {
                                record
                                    .non_insertable_navigations
                                    .push(text.to_string());
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// A PropertyValue boolean, either as a `Bool` attribute or a `Bool`
/// child element.
fn bool_value(node: Node<'_, '_>) -> Option<bool> {
    if let Some(attr) = node.attribute("Bool") {
        return attr.parse().ok();
    }
    elements(node, "Bool")
        .next()
        .and_then(|b| b.text())
        .and_then(|t| t.trim().parse().ok())
}

fn elements<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(Node::is_element)
        .filter(move |c| c.tag_name().name() == name)
}
