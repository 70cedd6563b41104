//! `XmlModel` impl generation.
//!
//! Replays an XML serialization plan as code: attributes, element text and
//! child elements are written and read exactly as the plan describes, so a
//! generated model produces the same document as the plan interpreter.

use blueprint_define::{SchemaId, WireFormat};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::codegen::models::{FieldMode, ModelField, model_fields};
use crate::codegen::types::{parse_expr, text_expr};
use crate::context::GenerationContext;
use crate::errors::GeneratorError;
use crate::serialization::{SerializationNode, XmlContent, plan};

/// Generates `impl XmlModel` for an object planned as XML.
///
/// ## Errors
///
/// Returns a [`GeneratorError`] if the schema has no XML plan (polymorphic
/// or non-object schemas) or the plan names an unknown property.
pub fn generate_xml_impl(ctx: &GenerationContext<'_>, id: &SchemaId) -> Result<TokenStream, GeneratorError> {
    let node = plan(ctx, id, WireFormat::Xml)?;
    let SerializationNode::XmlElement(element) = node.as_ref() else {
        return Err(GeneratorError::CodeGenError(format!("'{}' has no XML element plan", id)));
    };
    let fields = model_fields(ctx, id, None)?;
    let field = |property: &str| {
        fields
            .iter()
            .find(|f| f.property.name == property)
            .ok_or_else(|| {
                GeneratorError::CodeGenError(format!(
                    "{} has no field for property '{}'",
                    element.type_name, property
                ))
            })
    };

    let mut writes = Vec::new();
    let mut reads = Vec::new();

    for attribute in &element.attributes {
        let field = field(&attribute.property)?;
        let wire = &attribute.name;
        let text = text_expr(&attribute.kind, quote! { value });
        writes.push(with_value(
            field,
            quote! { element.attributes.push((#wire.to_string(), #text)); },
        ));
        let parse = parse_expr(&attribute.kind, quote! { text }, wire);
        reads.push(read_field(
            field,
            quote! { element.attribute(#wire) },
            quote! { element.required_attribute(#wire)? },
            parse,
        ));
    }

    if let Some(text_node) = &element.text {
        let field = field(&text_node.property)?;
        let text = text_expr(&text_node.kind, quote! { value });
        writes.push(with_value(field, quote! { element.text = Some(#text); }));
        let parse = parse_expr(&text_node.kind, quote! { text }, &text_node.property);
        reads.push(read_field(
            field,
            quote! { element.text.as_deref() },
            quote! { element.text() },
            parse,
        ));
    }

    for child in &element.elements {
        let field = field(&child.property)?;
        let wire = &child.name;
        let ident = &field.ident;
        match &child.content {
            XmlContent::Sequence {
                wrapped,
                item_name,
                item,
            } => {
                let read_item = read_content(item, quote! { item }, wire, field.boxed);
                if *wrapped {
                    let build = write_content(item, quote! { #item_name }, quote! { item }, field.boxed);
                    writes.push(with_value(
                        field,
                        quote! {
                            let mut wrapper = crate::shared::xml::Element::named(#wire);
                            for item in value.iter() {
                                wrapper.children.push(#build);
                            }
                            element.children.push(wrapper);
                        },
                    ));
                    let items = quote! {
                        element
                            .child(#wire)
                            .map(|wrapper| {
                                wrapper
                                    .children_named(#item_name)
                                    .map(|item| #read_item)
                                    .collect::<Result<Vec<_>, crate::shared::ApiError>>()
                            })
                            .transpose()?
                    };
                    let value = match field.mode {
                        FieldMode::Optional => items,
                        FieldMode::Required => quote! { #items.unwrap_or_default() },
                        FieldMode::Defaulted => {
                            let default_fn = field.default_fn();
                            quote! { #items.unwrap_or_else(Self::#default_fn) }
                        }
                    };
                    reads.push(quote! { #ident: #value, });
                } else {
                    let build = write_content(item, quote! { #wire }, quote! { item }, field.boxed);
                    writes.push(with_value(
                        field,
                        quote! {
                            for item in value.iter() {
                                element.children.push(#build);
                            }
                        },
                    ));
                    let empty = match field.mode {
                        FieldMode::Optional => quote! { None },
                        FieldMode::Required => quote! { Vec::new() },
                        FieldMode::Defaulted => {
                            let default_fn = field.default_fn();
                            quote! { Self::#default_fn() }
                        }
                    };
                    let present = match field.mode {
                        FieldMode::Optional => quote! { Some(items) },
                        _ => quote! { items },
                    };
                    reads.push(quote! {
                        #ident: {
                            let items = element
                                .children_named(#wire)
                                .map(|item| #read_item)
                                .collect::<Result<Vec<_>, crate::shared::ApiError>>()?;
                            if items.is_empty() { #empty } else { #present }
                        },
                    });
                }
            }
            content => {
                let build = write_content(content, quote! { #wire }, quote! { value }, field.boxed);
                writes.push(with_value(field, quote! { element.children.push(#build); }));
                let read = read_content(content, quote! { child }, wire, field.boxed);
                let value = match field.mode {
                    FieldMode::Optional => {
                        quote! { element.child(#wire).map(|child| #read).transpose()? }
                    }
                    FieldMode::Required => quote! {
                        {
                            let child = element.required_child(#wire)?;
                            #read?
                        }
                    },
                    FieldMode::Defaulted => {
                        let default_fn = field.default_fn();
                        quote! {
                            match element.child(#wire) {
                                Some(child) => #read?,
                                None => Self::#default_fn(),
                            }
                        }
                    }
                };
                reads.push(quote! { #ident: #value, });
            }
        }
    }

    let name = format_ident!("{}", element.type_name);
    Ok(quote! {
        impl crate::shared::xml::XmlModel for #name {
            fn to_element(&self, name: &str) -> crate::shared::xml::Element {
                let mut element = crate::shared::xml::Element::named(name);
                #(#writes)*
                element
            }

            fn from_element(element: &crate::shared::xml::Element) -> Result<Self, crate::shared::ApiError> {
                Ok(Self {
                    #(#reads)*
                })
            }
        }
    })
}

/// Runs `body` with `value` bound to the field, skipping absent values.
fn with_value(field: &ModelField<'_>, body: TokenStream) -> TokenStream {
    let ident = &field.ident;
    if field.target.nullable {
        quote! {
            if let Some(value) = self.#ident.as_ref() {
                #body
            }
        }
    } else {
        quote! {
            {
                let value = &self.#ident;
                #body
            }
        }
    }
}

/// Reads an attribute or text field; `parse` reads from `text`.
fn read_field(
    field: &ModelField<'_>,
    optional: TokenStream,
    required: TokenStream,
    parse: TokenStream,
) -> TokenStream {
    let ident = &field.ident;
    let value = match field.mode {
        FieldMode::Optional => quote! { #optional.map(|text| #parse).transpose()? },
        FieldMode::Required => quote! {
            {
                let text = #required;
                #parse?
            }
        },
        FieldMode::Defaulted => {
            let default_fn = field.default_fn();
            quote! {
                match #optional {
                    Some(text) => #parse?,
                    None => Self::#default_fn(),
                }
            }
        }
    };
    quote! { #ident: #value, }
}

/// Builds the element for one value; `value` is a reference expression.
fn write_content(content: &XmlContent, name: TokenStream, value: TokenStream, boxed: bool) -> TokenStream {
    match content {
        XmlContent::Value(kind) => {
            let text = text_expr(kind, value);
            quote! { crate::shared::xml::Element::named(#name).with_text(#text) }
        }
        XmlContent::Model(_) if boxed => {
            quote! { crate::shared::xml::XmlModel::to_element(&**#value, #name) }
        }
        XmlContent::Model(_) => quote! { crate::shared::xml::XmlModel::to_element(#value, #name) },
        XmlContent::Dictionary(entry) => {
            let build = write_content(entry, quote! { key }, quote! { entry }, false);
            quote! {
                {
                    let mut map = crate::shared::xml::Element::named(#name);
                    for (key, entry) in #value.iter() {
                        map.children.push(#build);
                    }
                    map
                }
            }
        }
        // Planning never nests sequences.
        XmlContent::Sequence { .. } => quote! { crate::shared::xml::Element::named(#name) },
    }
}

/// Reads one value from `element`, yielding `Result<T, ApiError>`.
fn read_content(content: &XmlContent, element: TokenStream, what: &str, boxed: bool) -> TokenStream {
    match content {
        XmlContent::Value(kind) => parse_expr(kind, quote! { #element.text() }, what),
        XmlContent::Model(_) if boxed => {
            quote! { crate::shared::xml::XmlModel::from_element(#element).map(Box::new) }
        }
        XmlContent::Model(_) => quote! { crate::shared::xml::XmlModel::from_element(#element) },
        XmlContent::Dictionary(entry) => {
            let read = read_content(entry, quote! { entry }, what, false);
            quote! {
                #element
                    .children
                    .iter()
                    .map(|entry| Ok((entry.name.clone(), #read?)))
                    .collect::<Result<std::collections::HashMap<_, _>, crate::shared::ApiError>>()
            }
        }
        XmlContent::Sequence { .. } => quote! {
            Err(crate::shared::ApiError::Xml(format!("<{}> nests sequences", #what)))
        },
    }
}
