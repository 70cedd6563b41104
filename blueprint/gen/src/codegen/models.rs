//! Model generation: objects, enums and header models.
//!
//! Every object and enum schema becomes one file under `models/`:
//!
//! - plain objects become `serde` structs;
//! - derived objects become structs that write their discriminator first;
//! - a polymorphic base becomes an enum over its variants plus an
//!   `Unknown` variant carrying the base shape (`{Name}Base`);
//! - closed enums become Rust enums, open enums newtypes with constants.
//!
//! Header models declared by responses become structs with one optional
//! field per header and a `from_response` constructor.

use std::collections::BTreeSet;
use std::sync::Arc;

use blueprint_define::{EnumSchema, PrimitiveFormat, Property, SchemaId, SchemaType};
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use tracing::{debug, trace};

use crate::codegen::types::{base_type_tokens, default_expr, parse_expr, serde_with_module};
use crate::codegen::xml::generate_xml_impl;
use crate::context::GenerationContext;
use crate::errors::GeneratorError;
use crate::naming::{field_ident, field_name, type_ident};
use crate::resolver::{
    ModelRole, TargetKind, TargetType, VariantInfo, inherited_properties, object_schema, resolve,
    resolve_property,
};
use crate::response::HeaderModelPlan;
use crate::serialization::{ValueKind, value_kind};

/// One generated file under `models/`.
#[derive(Debug, Clone)]
pub struct ModelFile {
    /// Module name, also the file stem.
    pub module: String,
    /// Public types defined by the file.
    pub exports: Vec<String>,
    pub tokens: TokenStream,
}

/// How a field behaves when absent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldMode {
    Required,
    /// Carried as `Option<T>`.
    Optional,
    /// Filled from the declared default.
    Defaulted,
}

/// A property as a struct field.
#[derive(Debug, Clone)]
pub(crate) struct ModelField<'m> {
    pub property: &'m Property,
    pub ident: Ident,
    pub target: Arc<TargetType>,
    /// Boxed to break a recursive type.
    pub boxed: bool,
    pub mode: FieldMode,
    pub format: Option<PrimitiveFormat>,
}

impl ModelField<'_> {
    /// Field type, boxed and `Option`-wrapped as needed.
    pub fn type_tokens(&self) -> Result<TokenStream, GeneratorError> {
        let base = base_type_tokens(&self.target)?;
        let base = if self.boxed {
            quote! { Box<#base> }
        } else {
            base
        };
        Ok(if self.target.nullable {
            quote! { Option<#base> }
        } else {
            base
        })
    }

    /// Name of the function supplying the declared default.
    pub fn default_fn(&self) -> Ident {
        format_ident!("default_{}", field_name(&self.property.name))
    }
}

/// Returns the fields of an object, inherited ones first.
///
/// The property whose wire name is `skip` is left out.
pub(crate) fn model_fields<'m>(
    ctx: &GenerationContext<'m>,
    id: &SchemaId,
    skip: Option<&str>,
) -> Result<Vec<ModelField<'m>>, GeneratorError> {
    let owner = object_schema(ctx, id, id.as_str())?;
    let mut fields = Vec::new();
    for property in inherited_properties(ctx, id)? {
        if skip.is_some_and(|name| name == property.serialized_name) {
            continue;
        }
        let target = resolve_property(ctx, &owner.name, property)?;
        let mode = if target.nullable {
            FieldMode::Optional
        } else if !property.required && property.default_value.is_some() {
            FieldMode::Defaulted
        } else {
            FieldMode::Required
        };
        let format = match value_kind(ctx, &property.schema, &property.name)? {
            Some(ValueKind::Primitive { format, .. }) => format,
            _ => None,
        };
        fields.push(ModelField {
            property,
            ident: field_ident(&property.name),
            boxed: needs_box(ctx, id, &target)?,
            target,
            mode,
            format,
        });
    }
    Ok(fields)
}

/// True when a model-typed field leads back to `owner` without passing
/// through a collection.
fn needs_box(
    ctx: &GenerationContext<'_>,
    owner: &SchemaId,
    target: &TargetType,
) -> Result<bool, GeneratorError> {
    let TargetKind::Model { schema, .. } = &target.kind else {
        return Ok(false);
    };
    let mut visited = BTreeSet::new();
    let mut pending = vec![schema.clone()];
    while let Some(id) = pending.pop() {
        if &id == owner {
            return Ok(true);
        }
        if !visited.insert(id.clone()) {
            continue;
        }
        if let TargetKind::Model {
            role: ModelRole::PolymorphicBase { variants, .. },
            ..
        } = &resolve(ctx, &id)?.kind
        {
            pending.extend(variants.iter().map(|v| v.schema.clone()));
        }
        let object = object_schema(ctx, &id, owner.as_str())?;
        for property in inherited_properties(ctx, &id)? {
            let nested = resolve_property(ctx, &object.name, property)?;
            if let TargetKind::Model { schema, .. } = &nested.kind {
                pending.push(schema.clone());
            }
        }
    }
    Ok(false)
}

fn doc_attr(description: Option<&String>) -> TokenStream {
    match description {
        Some(text) if !text.trim().is_empty() => {
            let text = format!(" {}", text.trim());
            quote! { #[doc = #text] }
        }
        _ => TokenStream::new(),
    }
}

/// Generates a struct with its fields and default functions.
///
/// `leading` is inserted before the property fields.
fn generate_struct(
    ctx: &GenerationContext<'_>,
    name: &Ident,
    description: Option<&String>,
    fields: &[ModelField<'_>],
    leading: TokenStream,
    container_attrs: TokenStream,
) -> Result<TokenStream, GeneratorError> {
    let doc = doc_attr(description);
    let mut field_tokens = Vec::new();
    let mut defaults = Vec::new();

    for field in fields {
        let ident = &field.ident;
        let ty = field.type_tokens()?;
        let wire = &field.property.serialized_name;
        let mut attrs = vec![quote! { rename = #wire }];
        match (field.mode, &field.property.default_value) {
            (FieldMode::Optional, _) if !field.property.required => {
                attrs.push(quote! { default, skip_serializing_if = "Option::is_none" });
            }
            (FieldMode::Defaulted, Some(value)) => {
                let default_fn = field.default_fn();
                let path = format!("{}::{}", name, default_fn);
                attrs.push(quote! { default = #path });
                let expr = default_expr(ctx, &field.target, value)?;
                defaults.push(quote! {
                    pub fn #default_fn() -> #ty {
                        #expr
                    }
                });
            }
            _ => {}
        }
        if !field.boxed {
            if let Some(module) = serde_with_module(&field.target, field.format) {
                attrs.push(quote! { with = #module });
            }
        }
        let field_doc = doc_attr(field.property.description.as_ref());
        field_tokens.push(quote! {
            #field_doc
            #[serde(#(#attrs),*)]
            pub #ident: #ty,
        });
    }

    let impl_block = if defaults.is_empty() {
        TokenStream::new()
    } else {
        quote! {
            impl #name {
                #(#defaults)*
            }
        }
    };

    Ok(quote! {
        #doc
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #container_attrs
        pub struct #name {
            #leading
            #(#field_tokens)*
        }

        #impl_block
    })
}

/// Generates the file of an object schema.
///
/// ## Errors
///
/// Returns a [`GeneratorError`] if the schema cannot be resolved or a
/// declared default has no literal form.
pub fn generate_object(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
    xml: bool,
) -> Result<ModelFile, GeneratorError> {
    let object = object_schema(ctx, id, id.as_str())?;
    let target = resolve(ctx, id)?;
    let name = type_ident(&object.name);
    let TargetKind::Model { role, .. } = &target.kind else {
        return Err(GeneratorError::CodeGenError(format!(
            "'{}' did not resolve to a model",
            id
        )));
    };

    let (tokens, exports) = match role {
        ModelRole::Plain => {
            let fields = model_fields(ctx, id, None)?;
            let body = generate_struct(
                ctx,
                &name,
                object.description.as_ref(),
                &fields,
                TokenStream::new(),
                TokenStream::new(),
            )?;
            let xml_impl = if xml {
                generate_xml_impl(ctx, id)?
            } else {
                TokenStream::new()
            };
            (quote! { #body #xml_impl }, vec![name.to_string()])
        }
        ModelRole::Derived {
            base,
            discriminator_value,
        } => {
            let root = object_schema(ctx, base, id.as_str())?;
            let discriminator = root.discriminator.clone().unwrap_or_default();
            let fields = model_fields(ctx, id, Some(&discriminator))?;
            let attrs = quote! {
                #[serde(tag = #discriminator, rename = #discriminator_value)]
            };
            let body = generate_struct(
                ctx,
                &name,
                object.description.as_ref(),
                &fields,
                TokenStream::new(),
                attrs,
            )?;
            (body, vec![name.to_string()])
        }
        ModelRole::PolymorphicBase {
            discriminator,
            variants,
        } => {
            let base_name = format_ident!("{}Base", name);
            let fields = model_fields(ctx, id, Some(discriminator))?;
            let discriminator_field = field_ident(discriminator);
            let base_doc = format!(
                " The shape of a [`{}`] whose `{}` is not a known variant.",
                name, discriminator
            );
            let leading = quote! {
                #[serde(rename = #discriminator, default, skip_serializing_if = "Option::is_none")]
                pub #discriminator_field: Option<String>,
            };
            let base_struct = generate_struct(
                ctx,
                &base_name,
                Some(&base_doc),
                &fields,
                leading,
                TokenStream::new(),
            )?;
            let union = generate_polymorphic_enum(
                &name,
                &base_name,
                object.description.as_ref(),
                (discriminator, &discriminator_field),
                variants,
            );
            (
                quote! { #union #base_struct },
                vec![name.to_string(), base_name.to_string()],
            )
        }
    };

    trace!(schema = %id, xml, "Generated model");
    Ok(ModelFile {
        module: field_name(&object.name),
        exports,
        tokens,
    })
}

/// Generates the enum of a polymorphic base with its `serde` impls.
///
/// Deserialization reads the discriminator and selects the variant; an
/// unknown or absent value reads the base shape into `Unknown`.
fn generate_polymorphic_enum(
    name: &Ident,
    base_name: &Ident,
    description: Option<&String>,
    (discriminator, discriminator_field): (&str, &Ident),
    variants: &[VariantInfo],
) -> TokenStream {
    let doc = doc_attr(description);
    let idents: Vec<Ident> = variants.iter().map(|v| format_ident!("{}", v.type_name)).collect();
    let values: Vec<&str> = variants
        .iter()
        .map(|v| v.discriminator_value.as_str())
        .collect();
    let variant_docs: Vec<String> = values
        .iter()
        .map(|value| format!(" `{}: \"{}\"`", discriminator, value))
        .collect();

    quote! {
        #doc
        #[derive(Debug, Clone, PartialEq)]
        pub enum #name {
            #(
                #[doc = #variant_docs]
                #idents(crate::models::#idents),
            )*
            /// A value whose discriminator is not a known variant.
            Unknown(#base_name),
        }

        impl #name {
            /// Returns the discriminator value of this variant.
            pub fn discriminator(&self) -> Option<&str> {
                match self {
                    #(Self::#idents(_) => Some(#values),)*
                    Self::Unknown(base) => base.#discriminator_field.as_deref(),
                }
            }
        }

        impl serde::Serialize for #name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self {
                    #(Self::#idents(value) => serde::Serialize::serialize(value, serializer),)*
                    Self::Unknown(value) => serde::Serialize::serialize(value, serializer),
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for #name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = <serde_json::Value as serde::Deserialize>::deserialize(deserializer)?;
                let kind = value
                    .get(#discriminator)
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string);
                let parsed = match kind.as_deref() {
                    #(Some(#values) => serde_json::from_value(value).map(Self::#idents),)*
                    _ => serde_json::from_value(value).map(Self::Unknown),
                };
                parsed.map_err(serde::de::Error::custom)
            }
        }
    }
}

/// Generates the file of an enum schema.
///
/// ## Errors
///
/// Returns `GeneratorError::CodeGenError` when an integer enum declares a
/// non-integer value.
pub fn generate_enum(schema: &EnumSchema) -> Result<ModelFile, GeneratorError> {
    let name = type_ident(&schema.name);
    let doc = doc_attr(schema.description.as_ref());
    let enum_name = name.to_string();
    let integer = schema.underlying.is_integer();
    let raw: Vec<String> = schema.values.iter().map(|v| v.raw_text()).collect();
    let numbers = if integer {
        raw.iter()
            .map(|text| {
                text.parse::<i64>().map_err(|_| {
                    GeneratorError::CodeGenError(format!(
                        "{} declares '{}' but carries integers",
                        enum_name, text
                    ))
                })
            })
            .collect::<Result<Vec<i64>, _>>()?
    } else {
        Vec::new()
    };

    let tokens = match (schema.extensible, integer) {
        (false, _) => {
            let variants: Vec<Ident> = schema.values.iter().map(|v| type_ident(&v.name)).collect();
            let wire_attrs: Vec<TokenStream> = if integer {
                vec![TokenStream::new(); raw.len()]
            } else {
                raw.iter().map(|text| quote! { #[serde(rename = #text)] }).collect()
            };
            let derives = if integer {
                quote! { #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)] }
            } else {
                quote! { #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)] }
            };
            let integer_serde = if integer {
                quote! {
                    impl serde::Serialize for #name {
                        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                            let value = match self {
                                #(Self::#variants => #numbers,)*
                            };
                            serializer.serialize_i64(value)
                        }
                    }

                    impl<'de> serde::Deserialize<'de> for #name {
                        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                            let value = <i64 as serde::Deserialize>::deserialize(deserializer)?;
                            match value {
                                #(#numbers => Ok(Self::#variants),)*
                                other => Err(serde::de::Error::custom(format!(
                                    "{} is not a known {} value",
                                    other, #enum_name
                                ))),
                            }
                        }
                    }
                }
            } else {
                TokenStream::new()
            };
            quote! {
                #doc
                #derives
                pub enum #name {
                    #(
                        #wire_attrs
                        #variants,
                    )*
                }

                impl #name {
                    /// Returns the wire text of this value.
                    pub fn as_str(&self) -> &'static str {
                        match self {
                            #(Self::#variants => #raw,)*
                        }
                    }
                }

                impl std::fmt::Display for #name {
                    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        f.write_str(self.as_str())
                    }
                }

                impl std::str::FromStr for #name {
                    type Err = crate::shared::ApiError;

                    fn from_str(s: &str) -> Result<Self, Self::Err> {
                        match s {
                            #(#raw => Ok(Self::#variants),)*
                            _ => Err(crate::shared::ApiError::UnknownEnumValue {
                                enum_name: #enum_name,
                                value: s.to_string(),
                            }),
                        }
                    }
                }

                #integer_serde
            }
        }
        (true, false) => {
            let consts: Vec<Ident> = schema
                .values
                .iter()
                .map(|v| format_ident!("{}", field_name(&v.name).to_uppercase()))
                .collect();
            quote! {
                #doc
                ///
                /// Values outside the known constants are carried unchanged.
                #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
                #[serde(transparent)]
                pub struct #name(std::borrow::Cow<'static, str>);

                impl #name {
                    #(pub const #consts: Self = Self(std::borrow::Cow::Borrowed(#raw));)*

                    pub fn as_str(&self) -> &str {
                        &self.0
                    }
                }

                impl From<&str> for #name {
                    fn from(value: &str) -> Self {
                        Self(std::borrow::Cow::Owned(value.to_string()))
                    }
                }

                impl From<String> for #name {
                    fn from(value: String) -> Self {
                        Self(std::borrow::Cow::Owned(value))
                    }
                }

                impl std::fmt::Display for #name {
                    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        f.write_str(&self.0)
                    }
                }

                impl std::str::FromStr for #name {
                    type Err = std::convert::Infallible;

                    fn from_str(s: &str) -> Result<Self, Self::Err> {
                        Ok(Self::from(s))
                    }
                }
            }
        }
        (true, true) => {
            let consts: Vec<Ident> = schema
                .values
                .iter()
                .map(|v| format_ident!("{}", field_name(&v.name).to_uppercase()))
                .collect();
            quote! {
                #doc
                ///
                /// Values outside the known constants are carried unchanged.
                #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
                #[serde(transparent)]
                pub struct #name(pub i64);

                impl #name {
                    #(pub const #consts: Self = Self(#numbers);)*
                }

                impl std::fmt::Display for #name {
                    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        write!(f, "{}", self.0)
                    }
                }

                impl std::str::FromStr for #name {
                    type Err = std::num::ParseIntError;

                    fn from_str(s: &str) -> Result<Self, Self::Err> {
                        s.trim().parse().map(Self)
                    }
                }
            }
        }
    };

    Ok(ModelFile {
        module: field_name(&schema.name),
        exports: vec![enum_name],
        tokens,
    })
}

/// Generates the file of a response header model.
///
/// ## Errors
///
/// Returns a [`GeneratorError`] if a header type cannot be rendered.
pub fn generate_header_model(plan: &HeaderModelPlan) -> Result<ModelFile, GeneratorError> {
    let name = format_ident!("{}", plan.type_name);
    let mut fields = Vec::new();
    let mut reads = Vec::new();
    for binding in &plan.fields {
        let ident = field_ident(&binding.field);
        let ty = base_type_tokens(&binding.target)?;
        let header = &binding.header;
        let doc = format!(" The `{}` response header.", header);
        fields.push(quote! {
            #[doc = #doc]
            pub #ident: Option<#ty>,
        });
        let parse = parse_expr(&binding.kind, quote! { text }, header);
        reads.push(quote! {
            #ident: response.header(#header).map(|text| #parse).transpose()?,
        });
    }

    let tokens = quote! {
        /// Headers read from a response; absent headers are `None`.
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct #name {
            #(#fields)*
        }

        impl #name {
            /// Extracts the declared headers present on a response.
            ///
            /// ## Errors
            ///
            /// Returns `ApiError::InvalidValue` when a header does not parse.
            pub fn from_response(response: &crate::shared::RawResponse) -> Result<Self, crate::shared::ApiError> {
                Ok(Self {
                    #(#reads)*
                })
            }
        }
    };

    Ok(ModelFile {
        module: field_name(&plan.type_name),
        exports: vec![plan.type_name.clone()],
        tokens,
    })
}

/// Generates every model file: objects, enums, then header models.
///
/// Objects in `xml_models` also get an `XmlModel` impl. Header models
/// sharing a type name are emitted once.
///
/// ## Errors
///
/// Returns the first [`GeneratorError`] raised by any model.
pub fn generate_models(
    ctx: &GenerationContext<'_>,
    xml_models: &BTreeSet<SchemaId>,
    header_models: &[HeaderModelPlan],
) -> Result<Vec<ModelFile>, GeneratorError> {
    let mut files = Vec::new();
    for (id, schema) in &ctx.model().schemas {
        match schema {
            SchemaType::Object(_) => files.push(generate_object(ctx, id, xml_models.contains(id))?),
            SchemaType::Enum(schema) => files.push(generate_enum(schema)?),
            _ => {}
        }
    }
    let mut seen = BTreeSet::new();
    for plan in header_models {
        if seen.insert(plan.type_name.clone()) {
            files.push(generate_header_model(plan)?);
        }
    }
    files.sort_by(|a, b| a.module.cmp(&b.module));
    debug!(models = files.len(), "Generated models");
    Ok(files)
}

/// Generates `models/mod.rs` declaring and re-exporting every model file.
pub fn generate_models_mod(files: &[ModelFile]) -> TokenStream {
    let declarations = files.iter().map(|file| {
        let module = format_ident!("{}", file.module);
        let exports = file.exports.iter().map(|name| format_ident!("{}", name));
        quote! {
            mod #module;
            pub use #module::{#(#exports),*};
        }
    });
    quote! {
        //! Data models exchanged with the service.

        #(#declarations)*
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenerationContext;
    use crate::output::validate_code;
    use crate::response;
    use crate::test_utils::{compact, format_tokens, pet_model, vault_model};
    use blueprint_define::{EnumValue, ObjectSchema};

    fn object_code(model: &blueprint_define::ApiModel, id: &str, xml: bool) -> String {
        let ctx = GenerationContext::new(model);
        let file = generate_object(&ctx, &id.into(), xml).unwrap();
        format_tokens(&file.tokens)
    }

    // === plain object tests ===

    #[test]
    fn plain_object_renames_and_skips_absent_fields() {
        let code = object_code(&vault_model(), "Secret", false);
        assert!(code.contains("pub struct Secret"));
        assert!(code.contains("rename = \"created-on\""));
        assert!(code.contains("skip_serializing_if = \"Option::is_none\""));
        assert!(code.contains("pub created_on: Option<chrono::DateTime<chrono::Utc>>"));
        assert!(code.contains("pub key_type: Option<crate::models::KeyType>"));
    }

    #[test]
    fn defaulted_field_gets_default_function() {
        let code = object_code(&vault_model(), "Secret", false);
        assert!(code.contains("default = \"Secret::default_enabled\""));
        assert!(code.contains("fn default_enabled() -> bool"));
        assert!(code.contains("pub enabled: bool"));
    }

    #[test]
    fn self_reference_is_boxed() {
        let model = blueprint_define::ApiModel::new("Tree").with_primitives().with_schema(
            "Node",
            SchemaType::Object(ObjectSchema::new(
                "Node",
                vec![
                    Property::required("label", "string"),
                    Property::optional("next", "Node"),
                ],
            )),
        );
        let code = object_code(&model, "Node", false);
        assert!(code.contains("pub next: Option<Box<crate::models::Node>>"));
    }

    // === polymorphism tests ===

    #[test]
    fn polymorphic_base_becomes_enum_with_unknown_shape() {
        let model = pet_model();
        let ctx = GenerationContext::new(&model);
        let file = generate_object(&ctx, &"Pet".into(), false).unwrap();
        assert_eq!(file.exports, vec!["Pet".to_string(), "PetBase".to_string()]);
        let code = format_tokens(&file.tokens);
        assert!(code.contains("pub enum Pet"));
        assert!(code.contains("Cat(crate::models::Cat)"));
        assert!(code.contains("Lion(crate::models::Lion)"));
        assert!(code.contains("Unknown(PetBase)"));
        assert!(code.contains("Some(\"dog\") => serde_json::from_value(value).map(Self::Dog)"));
        assert!(code.contains("pub struct PetBase"));
        assert!(code.contains("pub kind: Option<String>"));
    }

    #[test]
    fn derived_struct_writes_its_discriminator() {
        let code = object_code(&pet_model(), "Lion", false);
        assert!(code.contains("#[serde(tag = \"kind\", rename = \"Lion\")]"));
        assert!(code.contains("pub name: String"));
        assert!(code.contains("pub lives: i32"));
        assert!(code.contains("pub pride: Option<String>"));
    }

    // === enum tests ===

    #[test]
    fn closed_enum_parses_declared_values_only() {
        let model = vault_model();
        let Some(SchemaType::Enum(schema)) = model.schema(&"KeyType".into()) else {
            panic!("KeyType should be an enum");
        };
        let code = format_tokens(&generate_enum(schema).unwrap().tokens);
        assert!(code.contains("#[serde(rename = \"RSA\")]"));
        assert!(code.contains("\"EC\" => Ok(Self::Ec)"));
        assert!(code.contains("ApiError::UnknownEnumValue"));
    }

    #[test]
    fn open_enum_is_a_string_newtype() {
        let model = vault_model();
        let Some(SchemaType::Enum(schema)) = model.schema(&"RecoveryLevel".into()) else {
            panic!("RecoveryLevel should be an enum");
        };
        let code = format_tokens(&generate_enum(schema).unwrap().tokens);
        assert!(code.contains("pub struct RecoveryLevel(std::borrow::Cow<'static, str>)"));
        assert!(code.contains("pub const PURGEABLE: Self"));
        assert!(code.contains("type Err = std::convert::Infallible"));
    }

    #[test]
    fn integer_enum_serializes_numbers() {
        let schema = EnumSchema {
            underlying: blueprint_define::PrimitiveKind::Int32,
            ..EnumSchema::closed(
                "Priority",
                vec![
                    EnumValue {
                        name: "Low".to_string(),
                        value: serde_json::json!(1),
                    },
                    EnumValue {
                        name: "High".to_string(),
                        value: serde_json::json!(9),
                    },
                ],
            )
        };
        let file = generate_enum(&schema).unwrap();
        assert!(validate_code(&file.tokens).is_ok());
        let code = format_tokens(&file.tokens);
        assert!(code.contains("serializer.serialize_i64(value)"));
        assert!(code.contains("\"9\" => Ok(Self::High)"));

        let broken = EnumSchema {
            values: vec![EnumValue::new("Odd", "x")],
            ..schema
        };
        assert!(matches!(
            generate_enum(&broken),
            Err(GeneratorError::CodeGenError(_))
        ));
    }

    // === header model and module tests ===

    #[test]
    fn header_model_reads_present_headers() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let operation = model.operation("getSecret").unwrap();
        let table = response::plan(&ctx, operation).unwrap();
        let file = generate_header_model(table.header_model.as_ref().unwrap()).unwrap();
        assert_eq!(file.module, "secret_headers");
        let code = compact(&format_tokens(&file.tokens));
        assert!(code.contains("pubetag:Option<String>"));
        assert!(code.contains("response.header(\"ETag\")"));
    }

    #[test]
    fn every_vault_model_is_valid_syntax() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let xml = BTreeSet::from([SchemaId::from("Secret")]);
        let files = generate_models(&ctx, &xml, &[]).unwrap();
        let modules: Vec<_> = files.iter().map(|f| f.module.as_str()).collect();
        assert_eq!(modules, vec!["key_type", "recovery_level", "secret", "secret_list"]);
        for file in &files {
            assert!(validate_code(&file.tokens).is_ok(), "{} is invalid", file.module);
        }
        let code = format_tokens(&generate_models_mod(&files));
        assert!(code.contains("pub use secret::{Secret};") || code.contains("pub use secret::Secret;"));
    }
}
