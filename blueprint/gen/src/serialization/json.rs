//! JSON execution of serialization plans.
//!
//! Writing emits the discriminator of a derived variant before any other
//! property and skips null-valued optional properties. Reading ignores
//! unknown properties, fills absent optional properties from their declared
//! default, and falls back to the base shape when a discriminator value is
//! not recognized.

use std::collections::BTreeMap;

use blueprint_define::WireFormat;

use crate::context::GenerationContext;
use crate::errors::ValueError;
use crate::serialization::plan::{JsonObjectNode, JsonPolymorphicNode, SerializationNode, plan};
use crate::serialization::value::{Value, mismatch, scalar_from_json, scalar_to_json};

/// Writes a value through a JSON plan.
///
/// ## Errors
///
/// Returns a [`ValueError`] if the value does not fit the plan.
pub fn write(
    ctx: &GenerationContext<'_>,
    node: &SerializationNode,
    value: &Value,
) -> Result<serde_json::Value, ValueError> {
    match node {
        SerializationNode::JsonObject(object) => match value {
            Value::Record(fields) => write_object(ctx, object, fields),
            Value::Variant { value, .. } => write(ctx, node, value),
            other => Err(mismatch(format!("a {} record", object.type_name), other)),
        },
        SerializationNode::JsonPolymorphic(poly) => write_polymorphic(ctx, poly, value),
        SerializationNode::JsonArray(element) => match value {
            Value::List(items) => items
                .iter()
                .map(|item| write(ctx, element, item))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            other => Err(mismatch("a list", other)),
        },
        SerializationNode::JsonDictionary(entry) => match value {
            Value::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (key, item) in entries {
                    map.insert(key.clone(), write(ctx, entry, item)?);
                }
                Ok(serde_json::Value::Object(map))
            }
            other => Err(mismatch("a map", other)),
        },
        SerializationNode::JsonValue(kind) => scalar_to_json(value, kind),
        SerializationNode::ModelRef { schema, format } => {
            let nested = plan(ctx, schema, *format)?;
            write(ctx, &nested, value)
        }
        SerializationNode::XmlElement(_) | SerializationNode::Raw(_) => Err(ValueError::Json(
            "plan does not describe a JSON document".to_string(),
        )),
    }
}

fn write_object(
    ctx: &GenerationContext<'_>,
    object: &JsonObjectNode,
    fields: &BTreeMap<String, Value>,
) -> Result<serde_json::Value, ValueError> {
    let mut map = serde_json::Map::new();
    if let Some(discriminator) = &object.discriminator {
        map.insert(
            discriminator.serialized_name.clone(),
            serde_json::Value::String(discriminator.value.clone()),
        );
    }
    write_properties(ctx, object, fields, &mut map)?;
    Ok(serde_json::Value::Object(map))
}

fn write_properties(
    ctx: &GenerationContext<'_>,
    object: &JsonObjectNode,
    fields: &BTreeMap<String, Value>,
    map: &mut serde_json::Map<String, serde_json::Value>,
) -> Result<(), ValueError> {
    for property in &object.properties {
        match fields.get(&property.name) {
            Some(Value::Null) | None if !property.required => {}
            Some(Value::Null) if property.nullable => {
                map.insert(property.serialized_name.clone(), serde_json::Value::Null);
            }
            Some(Value::Null) | None => {
                return Err(ValueError::MissingProperty {
                    type_name: object.type_name.clone(),
                    property: property.name.clone(),
                });
            }
            Some(value) => {
                map.insert(property.serialized_name.clone(), write(ctx, &property.node, value)?);
            }
        }
    }
    Ok(())
}

fn write_polymorphic(
    ctx: &GenerationContext<'_>,
    poly: &JsonPolymorphicNode,
    value: &Value,
) -> Result<serde_json::Value, ValueError> {
    match value {
        Value::Variant {
            discriminator,
            value,
        } => {
            if let Some(variant) = poly.variants.iter().find(|v| &v.value == discriminator) {
                let nested = plan(ctx, &variant.schema, WireFormat::Json)?;
                return write(ctx, &nested, value);
            }
            let Value::Record(fields) = value.as_ref() else {
                return Err(mismatch(format!("a {} record", poly.type_name), value));
            };
            let mut map = serde_json::Map::new();
            map.insert(
                poly.discriminator.clone(),
                serde_json::Value::String(discriminator.clone()),
            );
            write_properties(ctx, &poly.base, fields, &mut map)?;
            Ok(serde_json::Value::Object(map))
        }
        Value::Record(fields) => write_object(ctx, &poly.base, fields),
        other => Err(mismatch(format!("a {} variant", poly.type_name), other)),
    }
}

/// Reads a value through a JSON plan.
///
/// ## Errors
///
/// Returns a [`ValueError`] if the document does not fit the plan.
pub fn read(
    ctx: &GenerationContext<'_>,
    node: &SerializationNode,
    json: &serde_json::Value,
) -> Result<Value, ValueError> {
    let found = || Value::Json(json.clone());
    match node {
        SerializationNode::JsonObject(object) => match json {
            serde_json::Value::Object(map) => read_object(ctx, object, map),
            _ => Err(mismatch(format!("a {} object", object.type_name), &found())),
        },
        SerializationNode::JsonPolymorphic(poly) => {
            let serde_json::Value::Object(map) = json else {
                return Err(mismatch(format!("a {} object", poly.type_name), &found()));
            };
            let Some(discriminator) = map.get(&poly.discriminator).and_then(|d| d.as_str()) else {
                return read_object(ctx, &poly.base, map);
            };
            let value = match poly.variants.iter().find(|v| v.value == discriminator) {
                Some(variant) => {
                    let nested = plan(ctx, &variant.schema, WireFormat::Json)?;
                    read(ctx, &nested, json)?
                }
                None => read_object(ctx, &poly.base, map)?,
            };
            Ok(Value::variant(discriminator, value))
        }
        SerializationNode::JsonArray(element) => match json {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| read(ctx, element, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            _ => Err(mismatch("an array", &found())),
        },
        SerializationNode::JsonDictionary(entry) => match json {
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(key, item)| Ok((key.clone(), read(ctx, entry, item)?)))
                .collect::<Result<BTreeMap<_, _>, ValueError>>()
                .map(Value::Map),
            _ => Err(mismatch("an object", &found())),
        },
        SerializationNode::JsonValue(kind) => scalar_from_json(json, kind),
        SerializationNode::ModelRef { schema, format } => {
            let nested = plan(ctx, schema, *format)?;
            read(ctx, &nested, json)
        }
        SerializationNode::XmlElement(_) | SerializationNode::Raw(_) => Err(ValueError::Json(
            "plan does not describe a JSON document".to_string(),
        )),
    }
}

fn read_object(
    ctx: &GenerationContext<'_>,
    object: &JsonObjectNode,
    map: &serde_json::Map<String, serde_json::Value>,
) -> Result<Value, ValueError> {
    let mut fields = BTreeMap::new();
    for property in &object.properties {
        match map.get(&property.serialized_name) {
            Some(serde_json::Value::Null) if property.required && property.nullable => {
                fields.insert(property.name.clone(), Value::Null);
            }
            Some(serde_json::Value::Null) | None => {
                if let Some(default) = &property.default {
                    fields.insert(property.name.clone(), read(ctx, &property.node, default)?);
                } else if property.required {
                    return Err(ValueError::MissingProperty {
                        type_name: object.type_name.clone(),
                        property: property.name.clone(),
                    });
                }
            }
            Some(json) => {
                fields.insert(property.name.clone(), read(ctx, &property.node, json)?);
            }
        }
    }
    Ok(Value::Record(fields))
}

/// Writes a value through a JSON plan to bytes.
///
/// ## Errors
///
/// See [`write`].
pub fn to_vec(
    ctx: &GenerationContext<'_>,
    node: &SerializationNode,
    value: &Value,
) -> Result<Vec<u8>, ValueError> {
    let json = write(ctx, node, value)?;
    serde_json::to_vec(&json).map_err(|e| ValueError::Json(e.to_string()))
}

/// Reads a value through a JSON plan from bytes.
///
/// ## Errors
///
/// Returns `ValueError::Json` on malformed input, otherwise see [`read`].
pub fn from_slice(
    ctx: &GenerationContext<'_>,
    node: &SerializationNode,
    bytes: &[u8],
) -> Result<Value, ValueError> {
    let json: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ValueError::Json(e.to_string()))?;
    read(ctx, node, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{pet_model, vault_model};
    use serde_json::json;

    fn plan_of(ctx: &GenerationContext<'_>, id: &str) -> std::sync::Arc<SerializationNode> {
        plan(ctx, &id.into(), WireFormat::Json).unwrap()
    }

    // === write tests ===

    #[test]
    fn discriminator_is_written_first() {
        let model = pet_model();
        let ctx = GenerationContext::new(&model);
        let lion = Value::record([
            ("name", Value::from("Leo")),
            ("lives", Value::Int(9)),
            ("pride", Value::from("savanna")),
        ]);
        let json = write(&ctx, &plan_of(&ctx, "Lion"), &lion).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["kind", "name", "lives", "pride"]);
        assert_eq!(json["kind"], "Lion");
    }

    #[test]
    fn base_plan_dispatches_on_variant() {
        let model = pet_model();
        let ctx = GenerationContext::new(&model);
        let dog = Value::variant(
            "dog",
            Value::record([("name", Value::from("Rex")), ("good", Value::Bool(true))]),
        );
        let json = write(&ctx, &plan_of(&ctx, "Pet"), &dog).unwrap();
        assert_eq!(json, json!({"kind": "dog", "name": "Rex", "good": true}));
    }

    #[test]
    fn null_optional_properties_are_skipped() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let secret = Value::record([
            ("id", Value::from("s1")),
            ("value", Value::from("hunter2")),
            ("note", Value::Null),
        ]);
        let json = write(&ctx, &plan_of(&ctx, "Secret"), &secret).unwrap();
        assert_eq!(json, json!({"id": "s1", "value": "hunter2"}));
    }

    #[test]
    fn missing_required_property_is_reported() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let err = write(
            &ctx,
            &plan_of(&ctx, "Secret"),
            &Value::record([("id", Value::from("s1"))]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValueError::MissingProperty {
                type_name: "Secret".to_string(),
                property: "value".to_string()
            }
        );
    }

    // === read tests ===

    #[test]
    fn unknown_properties_are_ignored() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let value = read(
            &ctx,
            &plan_of(&ctx, "Secret"),
            &json!({"id": "s1", "value": "v", "extra": [1, 2]}),
        )
        .unwrap();
        assert_eq!(value.field("extra"), None);
        assert_eq!(value.field("value"), Some(&Value::from("v")));
    }

    #[test]
    fn absent_optional_reads_declared_default() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let value = read(&ctx, &plan_of(&ctx, "Secret"), &json!({"id": "s1", "value": "v"})).unwrap();
        assert_eq!(value.field("enabled"), Some(&Value::Bool(true)));
        assert_eq!(value.field("note"), None);
    }

    #[test]
    fn unknown_discriminator_falls_back_to_base_shape() {
        let model = pet_model();
        let ctx = GenerationContext::new(&model);
        let value = read(
            &ctx,
            &plan_of(&ctx, "Pet"),
            &json!({"kind": "parrot", "name": "Polly", "words": 12}),
        )
        .unwrap();
        assert_eq!(
            value,
            Value::variant("parrot", Value::record([("name", Value::from("Polly"))]))
        );
    }

    #[test]
    fn known_discriminator_reads_variant() {
        let model = pet_model();
        let ctx = GenerationContext::new(&model);
        let value = read(
            &ctx,
            &plan_of(&ctx, "Pet"),
            &json!({"kind": "cat", "name": "Tom", "lives": 7}),
        )
        .unwrap();
        assert_eq!(
            value,
            Value::variant(
                "cat",
                Value::record([("name", Value::from("Tom")), ("lives", Value::Int(7))])
            )
        );
    }

    #[test]
    fn nested_lists_of_models_round_trip() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let list = Value::record([(
            "value",
            Value::list([Value::record([
                ("id", Value::from("a")),
                ("value", Value::from("1")),
                ("enabled", Value::Bool(false)),
                ("tags", Value::from(vec!["x", "y"])),
            ])]),
        )]);
        let node = plan_of(&ctx, "SecretList");
        let bytes = to_vec(&ctx, &node, &list).unwrap();
        assert_eq!(from_slice(&ctx, &node, &bytes).unwrap(), list);
    }

    #[test]
    fn malformed_bytes_are_json_errors() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        assert!(matches!(
            from_slice(&ctx, &plan_of(&ctx, "Secret"), b"{not json"),
            Err(ValueError::Json(_))
        ));
    }
}
