//! Property tests for the JSON and XML interpreters.
//!
//! A record written through a plan and read back through the same plan
//! must come back unchanged, with absent optional properties still absent.
//! The `Entry` model carries every text-carried primitive kind, a closed
//! enum, a nested object, wrapped lists of scalars and objects, and a
//! dictionary.

use blueprint_define::prelude::*;
use blueprint_gen::context::GenerationContext;
use blueprint_gen::serialization::{Value, json, plan, xml};
use proptest::prelude::*;

fn entries_model() -> ApiModel {
    ApiModel::new("Entries")
        .with_primitives()
        .with_schema("label-list", SchemaType::array("string"))
        .with_schema("author-list", SchemaType::array("Author"))
        .with_schema("string-map", SchemaType::dictionary("string"))
        .with_schema(
            "Kind",
            SchemaType::Enum(EnumSchema::closed(
                "Kind",
                vec![EnumValue::new("Rsa", "RSA"), EnumValue::new("Ec", "EC")],
            )),
        )
        .with_schema(
            "Author",
            SchemaType::Object(ObjectSchema::new(
                "Author",
                vec![
                    Property::required("name", "string"),
                    Property::optional("email", "string"),
                ],
            )),
        )
        .with_schema(
            "Entry",
            SchemaType::Object(ObjectSchema::new(
                "Entry",
                vec![
                    Property::required("id", "string").with_xml(XmlPropertyInfo {
                        attribute: true,
                        ..XmlPropertyInfo::default()
                    }),
                    Property::required("title", "string"),
                    Property::optional("viewCount", "int32").with_serialized_name("view-count"),
                    Property::optional("total", "int64"),
                    Property::optional("rating", "float64"),
                    Property::optional("pinned", "boolean"),
                    Property::optional("createdOn", "date-time").with_serialized_name("created-on"),
                    Property::optional("token", "uuid"),
                    Property::optional("blob", "bytes"),
                    Property::optional("kind", "Kind"),
                    Property::optional("author", "Author"),
                    Property::optional("labels", "label-list").with_xml(XmlPropertyInfo {
                        wrapped: true,
                        item_name: Some("label".to_string()),
                        ..XmlPropertyInfo::default()
                    }),
                    Property::optional("contributors", "author-list").with_xml(XmlPropertyInfo {
                        wrapped: true,
                        item_name: Some("contributor".to_string()),
                        ..XmlPropertyInfo::default()
                    }),
                    Property::optional("extra", "string-map"),
                ],
            )),
        )
}

/// Text including characters both formats must escape, and the empty string.
fn text() -> impl Strategy<Value = String> {
    r#"[a-zA-Z0-9 <>&"'{}\[\]\\/]{0,12}"#
}

fn author() -> impl Strategy<Value = Value> {
    (text(), proptest::option::of(text())).prop_map(|(name, email)| {
        let mut fields = vec![("name", Value::from(name))];
        if let Some(email) = email {
            fields.push(("email", Value::from(email)));
        }
        Value::record(fields)
    })
}

fn scalars() -> impl Strategy<Value = Vec<(&'static str, Value)>> {
    (
        proptest::option::of(any::<i32>()),
        proptest::option::of(any::<i64>()),
        proptest::option::of(-1.0e9..1.0e9f64),
        proptest::option::of(any::<bool>()),
        proptest::option::of(
            "20[0-9]{2}-(0[1-9]|1[0-2])-(0[1-9]|1[0-9]|2[0-8])T([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9]Z",
        ),
        proptest::option::of("[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}"),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..16)),
        proptest::option::of(prop_oneof![Just("RSA"), Just("EC")]),
    )
        .prop_map(|(views, total, rating, pinned, created, token, blob, kind)| {
            let mut fields = Vec::new();
            if let Some(views) = views {
                fields.push(("viewCount", Value::from(views)));
            }
            if let Some(total) = total {
                fields.push(("total", Value::from(total)));
            }
            if let Some(rating) = rating {
                fields.push(("rating", Value::Float(rating)));
            }
            if let Some(pinned) = pinned {
                fields.push(("pinned", Value::Bool(pinned)));
            }
            if let Some(created) = created {
                fields.push(("createdOn", Value::from(created)));
            }
            if let Some(token) = token {
                fields.push(("token", Value::from(token)));
            }
            if let Some(blob) = blob {
                fields.push(("blob", Value::Bytes(blob)));
            }
            if let Some(kind) = kind {
                fields.push(("kind", Value::from(kind)));
            }
            fields
        })
}

fn structures() -> impl Strategy<Value = Vec<(&'static str, Value)>> {
    (
        proptest::option::of(author()),
        proptest::option::of(proptest::collection::vec(text(), 0..4)),
        proptest::option::of(proptest::collection::vec(author(), 0..3)),
        proptest::option::of(proptest::collection::btree_map("[a-z]{1,6}", text(), 0..3)),
    )
        .prop_map(|(author, labels, contributors, extra)| {
            let mut fields = Vec::new();
            if let Some(author) = author {
                fields.push(("author", author));
            }
            if let Some(labels) = labels {
                fields.push(("labels", Value::list(labels.into_iter().map(Value::from))));
            }
            if let Some(contributors) = contributors {
                fields.push(("contributors", Value::list(contributors)));
            }
            if let Some(extra) = extra {
                fields.push(("extra", Value::map(extra.into_iter().map(|(k, v)| (k, Value::from(v))))));
            }
            fields
        })
}

fn entry() -> impl Strategy<Value = Value> {
    (text(), text(), scalars(), structures()).prop_map(|(id, title, scalars, structures)| {
        let mut fields = vec![("id", Value::from(id)), ("title", Value::from(title))];
        fields.extend(scalars);
        fields.extend(structures);
        Value::record(fields)
    })
}

// === fixed documents ===

#[test]
fn json_uses_serialized_names() {
    let model = entries_model();
    let ctx = GenerationContext::new(&model);
    let node = plan(&ctx, &"Entry".into(), WireFormat::Json).unwrap();
    let entry = Value::record([
        ("id", Value::from("n1")),
        ("title", Value::from("groceries")),
        ("viewCount", Value::from(3)),
        ("blob", Value::Bytes(vec![1, 2, 3])),
    ]);
    let bytes = json::to_vec(&ctx, &node, &entry).unwrap();
    let written: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        written,
        serde_json::json!({"id": "n1", "title": "groceries", "view-count": 3, "blob": "AQID"})
    );
}

#[test]
fn xml_places_attributes_and_wrapped_items() {
    let model = entries_model();
    let ctx = GenerationContext::new(&model);
    let node = plan(&ctx, &"Entry".into(), WireFormat::Xml).unwrap();
    let entry = Value::record([
        ("id", Value::from("n1")),
        ("title", Value::from("a < b")),
        ("labels", Value::from(vec!["home", "food"])),
        ("extra", Value::map([("color", Value::from("red"))])),
    ]);
    let document = xml::write(&ctx, &node, &entry).unwrap();
    assert!(document.contains("<Entry id=\"n1\">"));
    assert!(document.contains("<title>a &lt; b</title>"));
    assert!(document.contains("<labels><label>home</label><label>food</label></labels>"));
    assert!(document.contains("<extra><color>red</color></extra>"));
}

#[test]
fn closed_enum_rejects_undeclared_values() {
    let model = entries_model();
    let ctx = GenerationContext::new(&model);
    let node = plan(&ctx, &"Entry".into(), WireFormat::Json).unwrap();
    let entry = Value::record([
        ("id", Value::from("n1")),
        ("title", Value::from("t")),
        ("kind", Value::from("DSA")),
    ]);
    assert!(json::to_vec(&ctx, &node, &entry).is_err());
}

// === round trips ===

proptest! {
    #[test]
    fn json_round_trips_records(entry in entry()) {
        let model = entries_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Entry".into(), WireFormat::Json).unwrap();
        let bytes = json::to_vec(&ctx, &node, &entry).unwrap();
        prop_assert_eq!(json::from_slice(&ctx, &node, &bytes).unwrap(), entry);
    }

    #[test]
    fn xml_round_trips_records(entry in entry()) {
        let model = entries_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Entry".into(), WireFormat::Xml).unwrap();
        let document = xml::write(&ctx, &node, &entry).unwrap();
        prop_assert_eq!(xml::read(&ctx, &node, &document).unwrap(), entry);
    }
}
