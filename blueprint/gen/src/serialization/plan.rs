//! Serialization plans.
//!
//! A plan is a tree of [`SerializationNode`]s describing how one schema is
//! carried in one wire format. Plans are computed once per `(schema, format)`
//! and memoized in the [`GenerationContext`]; nested models are linked through
//! [`SerializationNode::ModelRef`] so recursive schemas stay finite.

use std::collections::BTreeSet;
use std::sync::Arc;

use blueprint_define::{ObjectSchema, PrimitiveFormat, PrimitiveKind, SchemaId, SchemaType, WireFormat};
use tracing::{debug, trace};

use crate::context::{GenerationContext, PlanKey};
use crate::errors::ModelError;
use crate::naming::type_name;
use crate::resolver::{
    ModelRole, TargetKind, hierarchy_root, inherited_properties, object_schema, resolve,
};

/// One node of a serialization plan.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializationNode {
    JsonObject(JsonObjectNode),
    JsonPolymorphic(JsonPolymorphicNode),
    JsonArray(Box<SerializationNode>),
    JsonDictionary(Box<SerializationNode>),
    JsonValue(ValueKind),
    /// A nested model, planned separately.
    ModelRef {
        schema: SchemaId,
        format: WireFormat,
    },
    XmlElement(XmlElementNode),
    Raw(RawFormat),
}

/// A scalar carried as a single JSON value or text node.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Primitive {
        kind: PrimitiveKind,
        format: Option<PrimitiveFormat>,
    },
    Enum(EnumKind),
    Any,
}

/// The raw value set of an enum.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumKind {
    pub name: String,
    pub values: Vec<String>,
    pub extensible: bool,
    pub underlying: PrimitiveKind,
}

/// Bodies carried without a structured format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RawFormat {
    Binary,
    Text,
}

/// A JSON object with a fixed property list.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonObjectNode {
    pub schema: SchemaId,
    pub type_name: String,
    /// Constant written before any property (derived variants only).
    pub discriminator: Option<DiscriminatorConst>,
    /// Inherited properties first, then declared ones.
    pub properties: Vec<JsonProperty>,
}

/// Discriminator wire name and the constant value of one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscriminatorConst {
    pub serialized_name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonProperty {
    pub name: String,
    pub serialized_name: String,
    pub node: SerializationNode,
    pub required: bool,
    pub nullable: bool,
    pub read_only: bool,
    pub default: Option<serde_json::Value>,
}

/// A polymorphic base: the discriminator selects the variant plan.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPolymorphicNode {
    pub schema: SchemaId,
    pub type_name: String,
    pub discriminator: String,
    /// Shape used when the discriminator value is not recognized.
    pub base: JsonObjectNode,
    pub variants: Vec<PolymorphicVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolymorphicVariant {
    pub value: String,
    pub schema: SchemaId,
}

/// An XML element mapped from an object.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElementNode {
    pub schema: SchemaId,
    pub type_name: String,
    /// Element name used when this object is the document root.
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub elements: Vec<XmlChild>,
    pub text: Option<XmlText>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub property: String,
    pub name: String,
    pub kind: ValueKind,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlChild {
    pub property: String,
    pub name: String,
    pub content: XmlContent,
    pub required: bool,
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlText {
    pub property: String,
    pub kind: ValueKind,
    pub required: bool,
}

/// What an XML child element carries.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlContent {
    Value(ValueKind),
    Model(SchemaId),
    /// Items are children of a wrapper element, or repeated siblings.
    Sequence {
        wrapped: bool,
        item_name: String,
        item: Box<XmlContent>,
    },
    /// Entries are children of the element, named by their keys.
    Dictionary(Box<XmlContent>),
}

impl SerializationNode {
    /// Returns the wire format this node belongs to.
    pub fn format(&self) -> Option<WireFormat> {
        match self {
            Self::XmlElement(_) => Some(WireFormat::Xml),
            Self::ModelRef { format, .. } => Some(*format),
            Self::Raw(_) => None,
            _ => Some(WireFormat::Json),
        }
    }

    /// Returns the scalar kind of a value node.
    pub fn value_kind(&self) -> Option<&ValueKind> {
        match self {
            Self::JsonValue(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Returns the serialization plan of a schema, computing it once per context.
///
/// ## Errors
///
/// Returns a [`ModelError`] if the schema cannot be resolved, or
/// `ModelError::UnsupportedSerialization` when XML is requested for a
/// polymorphic or non-object root.
pub fn plan(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
    format: WireFormat,
) -> Result<Arc<SerializationNode>, ModelError> {
    let key = PlanKey {
        schema: id.clone(),
        format,
    };
    if let Some(cached) = ctx.cached_plan(&key) {
        return Ok(cached);
    }
    let node = match format {
        WireFormat::Json => plan_json(ctx, id)?,
        WireFormat::Xml => SerializationNode::XmlElement(plan_xml(ctx, id)?),
    };
    trace!(schema = %id, %format, "Planned serialization");
    Ok(ctx.insert_plan(key, node))
}

/// Returns the plan of a body carried without structure.
pub fn plan_raw(format: RawFormat) -> SerializationNode {
    SerializationNode::Raw(format)
}

/// Returns the scalar kind of a schema, or `None` for structured schemas.
///
/// ## Errors
///
/// Returns `ModelError::UnknownSchema` if the id is undefined.
pub fn value_kind(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
    referenced_by: &str,
) -> Result<Option<ValueKind>, ModelError> {
    let kind = match ctx.schema(id, referenced_by)? {
        SchemaType::Primitive {
            kind: PrimitiveKind::Any,
            ..
        }
        | SchemaType::Framework { .. } => Some(ValueKind::Any),
        SchemaType::Primitive { kind, format } => Some(ValueKind::Primitive {
            kind: *kind,
            format: *format,
        }),
        SchemaType::Enum(schema) => Some(ValueKind::Enum(EnumKind {
            name: type_name(&schema.name),
            values: schema.values.iter().map(|v| v.raw_text()).collect(),
            extensible: schema.extensible,
            underlying: schema.underlying,
        })),
        _ => None,
    };
    Ok(kind)
}

fn value_node(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
    referenced_by: &str,
) -> Result<SerializationNode, ModelError> {
    if let Some(kind) = value_kind(ctx, id, referenced_by)? {
        return Ok(SerializationNode::JsonValue(kind));
    }
    let node = match ctx.schema(id, referenced_by)? {
        SchemaType::Object(_) => SerializationNode::ModelRef {
            schema: id.clone(),
            format: WireFormat::Json,
        },
        SchemaType::Array { element } => {
            SerializationNode::JsonArray(Box::new(value_node(ctx, element, id.as_str())?))
        }
        SchemaType::Dictionary { value } => {
            SerializationNode::JsonDictionary(Box::new(value_node(ctx, value, id.as_str())?))
        }
        _ => SerializationNode::JsonValue(ValueKind::Any),
    };
    Ok(node)
}

fn plan_json(ctx: &GenerationContext<'_>, id: &SchemaId) -> Result<SerializationNode, ModelError> {
    let SchemaType::Object(object) = ctx.schema(id, id.as_str())? else {
        return value_node(ctx, id, id.as_str());
    };
    let target = resolve(ctx, id)?;
    let TargetKind::Model { role, .. } = &target.kind else {
        return value_node(ctx, id, id.as_str());
    };
    let node = match role {
        ModelRole::Plain => SerializationNode::JsonObject(json_object(ctx, id, object, None)?),
        ModelRole::PolymorphicBase {
            discriminator,
            variants,
        } => SerializationNode::JsonPolymorphic(JsonPolymorphicNode {
            schema: id.clone(),
            type_name: target.name.clone(),
            discriminator: discriminator.clone(),
            base: json_object(ctx, id, object, Some(discriminator))?,
            variants: variants
                .iter()
                .map(|v| PolymorphicVariant {
                    value: v.discriminator_value.clone(),
                    schema: v.schema.clone(),
                })
                .collect(),
        }),
        ModelRole::Derived {
            base,
            discriminator_value: value,
        } => {
            let root = object_schema(ctx, base, id.as_str())?;
            let wire = root.discriminator.clone().unwrap_or_default();
            let mut node = json_object(ctx, id, object, Some(&wire))?;
            node.discriminator = Some(DiscriminatorConst {
                serialized_name: wire,
                value: value.clone(),
            });
            SerializationNode::JsonObject(node)
        }
    };
    Ok(node)
}

fn json_object(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
    object: &ObjectSchema,
    discriminator: Option<&String>,
) -> Result<JsonObjectNode, ModelError> {
    let mut properties = Vec::new();
    for property in inherited_properties(ctx, id)? {
        // The discriminator is written from the variant, never from a field.
        if discriminator.is_some_and(|d| *d == property.serialized_name) {
            continue;
        }
        properties.push(JsonProperty {
            name: property.name.clone(),
            serialized_name: property.serialized_name.clone(),
            node: value_node(ctx, &property.schema, &format!("{}.{}", object.name, property.name))?,
            required: property.required,
            nullable: property.nullable,
            read_only: property.read_only,
            default: property.default_value.clone(),
        });
    }
    Ok(JsonObjectNode {
        schema: id.clone(),
        type_name: type_name(&object.name),
        discriminator: None,
        properties,
    })
}

fn unsupported(id: &SchemaId, reason: impl Into<String>) -> ModelError {
    ModelError::UnsupportedSerialization {
        schema: id.to_string(),
        reason: reason.into(),
    }
}

fn plan_xml(ctx: &GenerationContext<'_>, id: &SchemaId) -> Result<XmlElementNode, ModelError> {
    let SchemaType::Object(object) = ctx.schema(id, id.as_str())? else {
        return Err(unsupported(id, "XML documents need an object at the root"));
    };
    if hierarchy_root(ctx, id)?.is_some() {
        return Err(unsupported(id, "polymorphic objects cannot be carried as XML"));
    }

    let mut node = XmlElementNode {
        schema: id.clone(),
        type_name: type_name(&object.name),
        name: xml_object_name(object),
        attributes: Vec::new(),
        elements: Vec::new(),
        text: None,
    };
    for property in inherited_properties(ctx, id)? {
        let referenced_by = format!("{}.{}", object.name, property.name);
        let xml = property.xml.clone().unwrap_or_default();
        let name = xml.name.clone().unwrap_or_else(|| property.serialized_name.clone());

        if xml.attribute || xml.text {
            let Some(kind) = value_kind(ctx, &property.schema, &referenced_by)? else {
                return Err(unsupported(
                    id,
                    format!("property '{}' must be a scalar to be an attribute or text", property.name),
                ));
            };
            if xml.text {
                if node.text.is_some() {
                    return Err(unsupported(id, "only one property may carry the element text"));
                }
                node.text = Some(XmlText {
                    property: property.name.clone(),
                    kind,
                    required: property.required,
                });
            } else {
                node.attributes.push(XmlAttribute {
                    property: property.name.clone(),
                    name,
                    kind,
                    required: property.required,
                });
            }
            continue;
        }

        let content = match ctx.schema(&property.schema, &referenced_by)? {
            SchemaType::Array { element } => {
                let item = xml_item(ctx, id, element, &referenced_by)?;
                let item_name = xml.item_name.clone().unwrap_or_else(|| {
                    match ctx.schema(element, &referenced_by).ok().and_then(|s| s.as_object()) {
                        Some(element_object) => xml_object_name(element_object),
                        None => name.clone(),
                    }
                });
                XmlContent::Sequence {
                    wrapped: xml.wrapped,
                    item_name,
                    item: Box::new(item),
                }
            }
            SchemaType::Dictionary { value } => {
                XmlContent::Dictionary(Box::new(xml_item(ctx, id, value, &referenced_by)?))
            }
            _ => xml_item(ctx, id, &property.schema, &referenced_by)?,
        };
        node.elements.push(XmlChild {
            property: property.name.clone(),
            name,
            content,
            required: property.required,
            default: property.default_value.clone(),
        });
    }
    Ok(node)
}

fn xml_item(
    ctx: &GenerationContext<'_>,
    owner: &SchemaId,
    id: &SchemaId,
    referenced_by: &str,
) -> Result<XmlContent, ModelError> {
    if let Some(kind) = value_kind(ctx, id, referenced_by)? {
        return Ok(XmlContent::Value(kind));
    }
    match ctx.schema(id, referenced_by)? {
        SchemaType::Object(_) => Ok(XmlContent::Model(id.clone())),
        _ => Err(unsupported(
            owner,
            format!("'{}' nests collections, which XML cannot carry", referenced_by),
        )),
    }
}

fn xml_object_name(object: &ObjectSchema) -> String {
    object
        .xml
        .as_ref()
        .and_then(|xml| xml.name.clone())
        .unwrap_or_else(|| object.name.clone())
}

/// Returns every object schema reachable from `root` through XML content.
///
/// Empty unwrapped lists and empty optional text content read back absent
/// from the documents these plans describe; see [`crate::serialization::xml`].
///
/// ## Errors
///
/// Returns a [`ModelError`] if any reachable schema cannot be planned as XML.
pub fn xml_closure(
    ctx: &GenerationContext<'_>,
    root: &SchemaId,
) -> Result<BTreeSet<SchemaId>, ModelError> {
    let mut seen = BTreeSet::new();
    let mut pending = vec![root.clone()];
    while let Some(id) = pending.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let node = plan(ctx, &id, WireFormat::Xml)?;
        if let SerializationNode::XmlElement(element) = node.as_ref() {
            for child in &element.elements {
                collect_models(&child.content, &mut pending);
            }
        }
    }
    debug!(root = %root, reachable = seen.len(), "Computed XML closure");
    Ok(seen)
}

fn collect_models(content: &XmlContent, pending: &mut Vec<SchemaId>) {
    match content {
        XmlContent::Model(id) => pending.push(id.clone()),
        XmlContent::Sequence { item, .. } | XmlContent::Dictionary(item) => {
            collect_models(item, pending)
        }
        XmlContent::Value(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{pet_model, vault_model};
    use blueprint_define::{ApiModel, Property, XmlPropertyInfo};

    #[test]
    fn plans_are_memoized() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let first = plan(&ctx, &"Secret".into(), WireFormat::Json).unwrap();
        let second = plan(&ctx, &"Secret".into(), WireFormat::Json).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(ctx.has_plan(&"Secret".into(), WireFormat::Json));
        assert!(!ctx.has_plan(&"Secret".into(), WireFormat::Xml));
    }

    #[test]
    fn nested_models_are_referenced() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"SecretList".into(), WireFormat::Json).unwrap();
        let SerializationNode::JsonObject(list) = node.as_ref() else {
            panic!("expected object plan");
        };
        assert_eq!(
            list.properties[0].node,
            SerializationNode::JsonArray(Box::new(SerializationNode::ModelRef {
                schema: "Secret".into(),
                format: WireFormat::Json
            }))
        );
    }

    #[test]
    fn derived_plan_writes_discriminator_and_inherited_properties() {
        let model = pet_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Lion".into(), WireFormat::Json).unwrap();
        let SerializationNode::JsonObject(lion) = node.as_ref() else {
            panic!("expected object plan");
        };
        assert_eq!(
            lion.discriminator,
            Some(DiscriminatorConst {
                serialized_name: "kind".to_string(),
                value: "Lion".to_string()
            })
        );
        let names: Vec<_> = lion.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "lives", "pride"]);
    }

    #[test]
    fn base_plan_lists_variants() {
        let model = pet_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Pet".into(), WireFormat::Json).unwrap();
        let SerializationNode::JsonPolymorphic(pet) = node.as_ref() else {
            panic!("expected polymorphic plan");
        };
        assert_eq!(pet.discriminator, "kind");
        assert_eq!(pet.variants.len(), 3);
        assert!(pet.base.discriminator.is_none());
    }

    #[test]
    fn polymorphic_xml_is_unsupported() {
        let model = pet_model();
        let ctx = GenerationContext::new(&model);
        let err = plan(&ctx, &"Cat".into(), WireFormat::Xml).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedSerialization { ref schema, .. } if schema == "Cat"));
    }

    #[test]
    fn xml_plan_places_attributes_and_sequences() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Secret".into(), WireFormat::Xml).unwrap();
        let SerializationNode::XmlElement(secret) = node.as_ref() else {
            panic!("expected XML plan");
        };
        assert_eq!(secret.name, "Secret");
        assert_eq!(secret.attributes[0].name, "id");
        let tags = secret
            .elements
            .iter()
            .find(|child| child.property == "tags")
            .unwrap();
        assert_eq!(
            tags.content,
            XmlContent::Sequence {
                wrapped: true,
                item_name: "tag".to_string(),
                item: Box::new(XmlContent::Value(ValueKind::Primitive {
                    kind: PrimitiveKind::String,
                    format: None
                }))
            }
        );
    }

    #[test]
    fn xml_closure_reaches_nested_models() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let reachable = xml_closure(&ctx, &"SecretList".into()).unwrap();
        assert!(reachable.contains(&SchemaId::from("Secret")));
        assert!(reachable.contains(&SchemaId::from("SecretList")));
    }

    #[test]
    fn xml_attribute_must_be_scalar() {
        let model = ApiModel::new("Test")
            .with_primitives()
            .with_schema("names", SchemaType::array("string"))
            .with_schema(
                "Bad",
                SchemaType::Object(ObjectSchema::new(
                    "Bad",
                    vec![Property::required("names", "names").with_xml(XmlPropertyInfo {
                        attribute: true,
                        ..XmlPropertyInfo::default()
                    })],
                )),
            );
        let ctx = GenerationContext::new(&model);
        assert!(matches!(
            plan(&ctx, &"Bad".into(), WireFormat::Xml),
            Err(ModelError::UnsupportedSerialization { .. })
        ));
    }

    #[test]
    fn array_root_plans_as_json_array() {
        let model = ApiModel::new("Test")
            .with_primitives()
            .with_schema("names", SchemaType::array("string"));
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"names".into(), WireFormat::Json).unwrap();
        assert!(matches!(node.as_ref(), SerializationNode::JsonArray(_)));
        assert!(plan(&ctx, &"names".into(), WireFormat::Xml).is_err());
    }
}
