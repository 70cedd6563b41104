//! XML execution of serialization plans.
//!
//! Documents are built as a small element tree and written with
//! `quick_xml::Writer`; reading parses the document back into the same tree
//! before interpreting it against the plan.
//!
//! ## Lossy shapes
//!
//! Two values cannot survive a write and read, because the document they
//! produce is the same as for an absent property:
//! - an empty unwrapped list writes no elements and reads back absent
//!   (wrapped lists keep their empty wrapper and read back as `[]`);
//! - an empty optional text-content property writes an element without text
//!   and reads back absent.

use std::collections::BTreeMap;

use blueprint_define::WireFormat;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::context::GenerationContext;
use crate::errors::ValueError;
use crate::serialization::plan::{SerializationNode, XmlContent, XmlElementNode, plan};
use crate::serialization::value::{Value, mismatch, scalar_from_json, scalar_from_text, scalar_to_text};

#[derive(Debug, Default, Clone, PartialEq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

fn xml_error(err: impl std::fmt::Display) -> ValueError {
    ValueError::Xml(err.to_string())
}

fn root_node(node: &SerializationNode) -> Result<&XmlElementNode, ValueError> {
    match node {
        SerializationNode::XmlElement(element) => Ok(element),
        _ => Err(ValueError::Xml("plan does not describe an XML document".to_string())),
    }
}

fn nested_node(
    ctx: &GenerationContext<'_>,
    schema: &blueprint_define::SchemaId,
) -> Result<std::sync::Arc<SerializationNode>, ValueError> {
    Ok(plan(ctx, schema, WireFormat::Xml)?)
}

/// Writes a value through an XML plan as a document.
///
/// ## Errors
///
/// Returns a [`ValueError`] if the value does not fit the plan.
pub fn write(
    ctx: &GenerationContext<'_>,
    node: &SerializationNode,
    value: &Value,
) -> Result<String, ValueError> {
    let root = root_node(node)?;
    let element = build_element(ctx, root, &root.name, value)?;
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_error)?;
    write_element(&mut writer, &element)?;
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn build_element(
    ctx: &GenerationContext<'_>,
    node: &XmlElementNode,
    name: &str,
    value: &Value,
) -> Result<Element, ValueError> {
    let Value::Record(fields) = value else {
        return Err(mismatch(format!("a {} record", node.type_name), value));
    };
    let missing = |property: &str| ValueError::MissingProperty {
        type_name: node.type_name.clone(),
        property: property.to_string(),
    };
    let present = |property: &str| fields.get(property).filter(|v| !v.is_null());

    let mut element = Element::named(name);
    for attribute in &node.attributes {
        match present(&attribute.property) {
            Some(value) => element
                .attributes
                .push((attribute.name.clone(), scalar_to_text(value, &attribute.kind)?)),
            None if attribute.required => return Err(missing(&attribute.property)),
            None => {}
        }
    }
    if let Some(text) = &node.text {
        match present(&text.property) {
            Some(value) => element.text = Some(scalar_to_text(value, &text.kind)?),
            None if text.required => return Err(missing(&text.property)),
            None => {}
        }
    }
    for child in &node.elements {
        let Some(value) = present(&child.property) else {
            if child.required {
                return Err(missing(&child.property));
            }
            continue;
        };
        match &child.content {
            XmlContent::Sequence {
                wrapped,
                item_name,
                item,
            } => {
                let Value::List(items) = value else {
                    return Err(mismatch("a list", value));
                };
                let item_name = if *wrapped { item_name } else { &child.name };
                let built = items
                    .iter()
                    .map(|v| build_content(ctx, item, item_name, v))
                    .collect::<Result<Vec<_>, _>>()?;
                if *wrapped {
                    let mut wrapper = Element::named(&child.name);
                    wrapper.children = built;
                    element.children.push(wrapper);
                } else {
                    element.children.extend(built);
                }
            }
            content => element
                .children
                .push(build_content(ctx, content, &child.name, value)?),
        }
    }
    Ok(element)
}

fn build_content(
    ctx: &GenerationContext<'_>,
    content: &XmlContent,
    name: &str,
    value: &Value,
) -> Result<Element, ValueError> {
    match content {
        XmlContent::Value(kind) => Ok(Element {
            text: Some(scalar_to_text(value, kind)?),
            ..Element::named(name)
        }),
        XmlContent::Model(schema) => {
            let nested = nested_node(ctx, schema)?;
            build_element(ctx, root_node(&nested)?, name, value)
        }
        XmlContent::Dictionary(entry) => {
            let Value::Map(entries) = value else {
                return Err(mismatch("a map", value));
            };
            let mut element = Element::named(name);
            for (key, item) in entries {
                element.children.push(build_content(ctx, entry, key, item)?);
            }
            Ok(element)
        }
        XmlContent::Sequence { .. } => Err(ValueError::Xml(format!(
            "'{}' nests sequences, which XML cannot carry",
            name
        ))),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), ValueError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() && element.text.is_none() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(xml_error)
}

/// Reads a value through an XML plan.
///
/// ## Errors
///
/// Returns `ValueError::Xml` on malformed input or a mismatched root
/// element, otherwise a [`ValueError`] describing the misfit.
pub fn read(
    ctx: &GenerationContext<'_>,
    node: &SerializationNode,
    xml: &str,
) -> Result<Value, ValueError> {
    let root = root_node(node)?;
    let document = parse_document(xml)?;
    if document.name != root.name {
        return Err(ValueError::Xml(format!(
            "expected root element <{}>, found <{}>",
            root.name, document.name
        )));
    }
    read_element(ctx, root, &document)
}

fn read_element(
    ctx: &GenerationContext<'_>,
    node: &XmlElementNode,
    element: &Element,
) -> Result<Value, ValueError> {
    let missing = |property: &str| ValueError::MissingProperty {
        type_name: node.type_name.clone(),
        property: property.to_string(),
    };
    let mut fields = BTreeMap::new();

    for attribute in &node.attributes {
        match element.attributes.iter().find(|(key, _)| *key == attribute.name) {
            Some((_, text)) => {
                fields.insert(attribute.property.clone(), scalar_from_text(text, &attribute.kind)?);
            }
            None if attribute.required => return Err(missing(&attribute.property)),
            None => {}
        }
    }
    if let Some(text) = &node.text {
        match &element.text {
            Some(content) => {
                fields.insert(text.property.clone(), scalar_from_text(content, &text.kind)?);
            }
            None if text.required => {
                fields.insert(text.property.clone(), scalar_from_text("", &text.kind)?);
            }
            None => {}
        }
    }
    for child in &node.elements {
        let value = match &child.content {
            XmlContent::Sequence {
                wrapped: true,
                item_name,
                item,
            } => match element.child(&child.name) {
                Some(wrapper) => Some(read_items(
                    ctx,
                    item,
                    wrapper.children.iter().filter(|c| c.name == *item_name),
                )?),
                None => None,
            },
            XmlContent::Sequence {
                wrapped: false,
                item,
                ..
            } => {
                let items: Vec<&Element> = element
                    .children
                    .iter()
                    .filter(|c| c.name == child.name)
                    .collect();
                if items.is_empty() && !child.required {
                    None
                } else {
                    Some(read_items(ctx, item, items.into_iter())?)
                }
            }
            content => element
                .child(&child.name)
                .map(|found| read_content(ctx, content, found))
                .transpose()?,
        };
        match value {
            Some(value) => {
                fields.insert(child.property.clone(), value);
            }
            None => match (&child.default, &child.content) {
                (Some(default), XmlContent::Value(kind)) => {
                    fields.insert(child.property.clone(), scalar_from_json(default, kind)?);
                }
                _ if child.required => return Err(missing(&child.property)),
                _ => {}
            },
        }
    }
    Ok(Value::Record(fields))
}

fn read_items<'e>(
    ctx: &GenerationContext<'_>,
    item: &XmlContent,
    elements: impl Iterator<Item = &'e Element>,
) -> Result<Value, ValueError> {
    elements
        .map(|element| read_content(ctx, item, element))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn read_content(
    ctx: &GenerationContext<'_>,
    content: &XmlContent,
    element: &Element,
) -> Result<Value, ValueError> {
    match content {
        XmlContent::Value(kind) => scalar_from_text(element.text(), kind),
        XmlContent::Model(schema) => {
            let nested = nested_node(ctx, schema)?;
            read_element(ctx, root_node(&nested)?, element)
        }
        XmlContent::Dictionary(entry) => element
            .children
            .iter()
            .map(|child| Ok((child.name.clone(), read_content(ctx, entry, child)?)))
            .collect::<Result<BTreeMap<_, _>, ValueError>>()
            .map(Value::Map),
        XmlContent::Sequence { .. } => Err(ValueError::Xml(format!(
            "<{}> nests sequences, which XML cannot carry",
            element.name
        ))),
    }
}

fn start_element(start: &BytesStart<'_>) -> Result<Element, ValueError> {
    let mut element = Element::named(&String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn close(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<(), ValueError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(ValueError::Xml("document has more than one root".to_string())),
    }
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) {
    if let Some(top) = stack.last_mut() {
        top.text.get_or_insert_with(String::new).push_str(text);
    }
}

fn parse_document(xml: &str) -> Result<Element, ValueError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(start_element(&start)?),
            Event::Empty(start) => {
                let element = start_element(&start)?;
                close(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| ValueError::Xml("unbalanced end tag".to_string()))?;
                // Indentation between child elements is not content.
                if !element.children.is_empty()
                    && element.text.as_deref().is_some_and(|t| t.trim().is_empty())
                {
                    element.text = None;
                }
                close(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => append_text(&mut stack, &String::from_utf8_lossy(&text)),
            Event::CData(data) => {
                append_text(&mut stack, &String::from_utf8_lossy(&data));
            }
            Event::GeneralRef(reference) => {
                let resolved = match reference.resolve_char_ref().map_err(xml_error)? {
                    Some(ch) => ch.to_string(),
                    None => {
                        let name = reference.decode().map_err(xml_error)?;
                        quick_xml::escape::resolve_predefined_entity(&name)
                            .map(str::to_string)
                            .ok_or_else(|| ValueError::Xml(format!("unknown entity &{};", name)))?
                    }
                };
                append_text(&mut stack, &resolved);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(ValueError::Xml("document ended inside an element".to_string()));
    }
    root.ok_or_else(|| ValueError::Xml("document has no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::vault_model;

    fn secret() -> Value {
        Value::record([
            ("id", Value::from("s1")),
            ("value", Value::from("a < b & c")),
            ("enabled", Value::Bool(true)),
            ("tags", Value::from(vec!["red", "blue"])),
        ])
    }

    #[test]
    fn writes_attributes_and_wrapped_sequences() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Secret".into(), WireFormat::Xml).unwrap();
        let xml = write(&ctx, &node, &secret()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<Secret id=\"s1\">"));
        assert!(xml.contains("<value>a &lt; b &amp; c</value>"));
        assert!(xml.contains("<tags><tag>red</tag><tag>blue</tag></tags>"));
    }

    #[test]
    fn document_round_trips() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Secret".into(), WireFormat::Xml).unwrap();
        let xml = write(&ctx, &node, &secret()).unwrap();
        assert_eq!(read(&ctx, &node, &xml).unwrap(), secret());
    }

    #[test]
    fn nested_models_and_indentation_are_read() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"SecretList".into(), WireFormat::Xml).unwrap();
        let xml = r#"<?xml version="1.0"?>
<SecretList>
  <value>
    <Secret id="a"><value>1</value></Secret>
    <Secret id="b"><value><![CDATA[x<y]]></value></Secret>
  </value>
</SecretList>"#;
        let value = read(&ctx, &node, xml).unwrap();
        let Some(Value::List(items)) = value.field("value") else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].field("value"), Some(&Value::from("x<y")));
        assert_eq!(items[0].field("enabled"), Some(&Value::Bool(true)));
    }

    #[test]
    fn missing_required_attribute_is_reported() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Secret".into(), WireFormat::Xml).unwrap();
        let err = read(&ctx, &node, "<Secret><value>v</value></Secret>").unwrap_err();
        assert_eq!(
            err,
            ValueError::MissingProperty {
                type_name: "Secret".to_string(),
                property: "id".to_string()
            }
        );
    }

    #[test]
    fn wrong_root_element_is_rejected() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Secret".into(), WireFormat::Xml).unwrap();
        assert!(matches!(
            read(&ctx, &node, "<Other id=\"a\"/>"),
            Err(ValueError::Xml(_))
        ));
    }

    fn shelf_model() -> blueprint_define::ApiModel {
        use blueprint_define::{ApiModel, ObjectSchema, Property, SchemaType, XmlPropertyInfo};

        ApiModel::new("Shelf")
            .with_primitives()
            .with_schema("word-list", SchemaType::array("string"))
            .with_schema(
                "Shelf",
                SchemaType::Object(ObjectSchema::new(
                    "Shelf",
                    vec![
                        Property::optional("label", "string").with_xml(XmlPropertyInfo {
                            text: true,
                            ..XmlPropertyInfo::default()
                        }),
                        Property::optional("loose", "word-list"),
                        Property::optional("boxed", "word-list").with_xml(XmlPropertyInfo {
                            wrapped: true,
                            item_name: Some("word".to_string()),
                            ..XmlPropertyInfo::default()
                        }),
                    ],
                )),
            )
    }

    #[test]
    fn empty_wrapped_list_survives_but_lossy_shapes_read_absent() {
        let model = shelf_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Shelf".into(), WireFormat::Xml).unwrap();
        let shelf = Value::record([
            ("label", Value::from("")),
            ("loose", Value::List(Vec::new())),
            ("boxed", Value::List(Vec::new())),
        ]);
        let xml = write(&ctx, &node, &shelf).unwrap();
        let back = read(&ctx, &node, &xml).unwrap();
        assert_eq!(back.field("boxed"), Some(&Value::List(Vec::new())));
        assert_eq!(back.field("loose"), None);
        assert_eq!(back.field("label"), None);
    }

    #[test]
    fn malformed_document_is_rejected() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let node = plan(&ctx, &"Secret".into(), WireFormat::Xml).unwrap();
        assert!(read(&ctx, &node, "<Secret id=\"a\"><value>v</Secret>").is_err());
    }
}
