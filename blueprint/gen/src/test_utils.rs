//! Shared test fixtures for blueprint-gen tests.
//!
//! Two small models cover most of the engine: [`pet_model`] is a
//! three-level polymorphic hierarchy and [`vault_model`] is a secret store
//! exercising every parameter location, body kind and response shape.

use blueprint_define::{
    ApiModel, EnumSchema, EnumValue, FlattenedInitializer, HeaderField, HeaderModel, HttpMethod,
    ObjectSchema, Operation, Parameter, ParameterLocation, PathSegment, PrimitiveFormat,
    PrimitiveKind, Property, RequestBody, ResponseDecl, SchemaType, SerializationStyle,
    WireFormat, XmlPropertyInfo,
};
use proc_macro2::TokenStream;
use serde_json::json;

/// `Pet` (discriminator `kind`) with `Cat` (`cat`), `Lion` (derived from
/// `Cat`, no declared value) and `Dog` (`dog`).
pub fn pet_model() -> ApiModel {
    ApiModel::new("Zoo")
        .with_primitives()
        .with_schema(
            "Pet",
            SchemaType::Object(ObjectSchema {
                discriminator: Some("kind".to_string()),
                derived: vec!["Cat".into(), "Dog".into()],
                ..ObjectSchema::new("Pet", vec![Property::required("name", "string")])
            }),
        )
        .with_schema(
            "Cat",
            SchemaType::Object(ObjectSchema {
                base: Some("Pet".into()),
                discriminator_value: Some("cat".to_string()),
                derived: vec!["Lion".into()],
                ..ObjectSchema::new("Cat", vec![Property::required("lives", "int32")])
            }),
        )
        .with_schema(
            "Lion",
            SchemaType::Object(ObjectSchema {
                base: Some("Cat".into()),
                ..ObjectSchema::new("Lion", vec![Property::optional("pride", "string")])
            }),
        )
        .with_schema(
            "Dog",
            SchemaType::Object(ObjectSchema {
                base: Some("Pet".into()),
                discriminator_value: Some("dog".to_string()),
                ..ObjectSchema::new("Dog", vec![Property::required("good", "boolean")])
            }),
        )
}

fn secret_schema() -> ObjectSchema {
    ObjectSchema::new(
        "Secret",
        vec![
            Property::required("id", "string").with_xml(XmlPropertyInfo {
                attribute: true,
                ..XmlPropertyInfo::default()
            }),
            Property::required("value", "string"),
            Property::optional("note", "string"),
            Property::optional("enabled", "boolean").with_default(json!(true)),
            Property::optional("tags", "tag-list").with_xml(XmlPropertyInfo {
                wrapped: true,
                item_name: Some("tag".to_string()),
                ..XmlPropertyInfo::default()
            }),
            Property::optional("recoveryLevel", "RecoveryLevel"),
            Property::optional("keyType", "KeyType"),
            Property::optional("createdOn", "date-time").with_serialized_name("created-on"),
        ],
    )
}

fn secret_headers() -> HeaderModel {
    HeaderModel {
        name: "SecretHeaders".to_string(),
        headers: vec![HeaderField {
            name: "etag".to_string(),
            header: "ETag".to_string(),
            schema: "string".into(),
        }],
    }
}

fn secret_route() -> Vec<PathSegment> {
    vec![PathSegment::constant("/secrets/"), PathSegment::parameter("id")]
}

fn id_parameter() -> Parameter {
    Parameter::required("id", "string", ParameterLocation::Path)
}

fn api_version() -> Parameter {
    Parameter::required("apiVersion", "string", ParameterLocation::Query)
        .with_serialized_name("api-version")
        .with_constant(json!("2024-01-01"))
}

/// A secret store with operations under `/admin`, `/secrets` and `/backup`.
pub fn vault_model() -> ApiModel {
    ApiModel::new("Vault")
        .with_primitives()
        .with_schema("tag-list", SchemaType::array("string"))
        .with_schema("secret-array", SchemaType::array("Secret"))
        .with_schema(
            "RecoveryLevel",
            SchemaType::Enum(EnumSchema::open(
                "RecoveryLevel",
                vec![
                    EnumValue::new("Purgeable", "Purgeable"),
                    EnumValue::new("Recoverable", "Recoverable"),
                ],
            )),
        )
        .with_schema(
            "KeyType",
            SchemaType::Enum(EnumSchema::closed(
                "KeyType",
                vec![EnumValue::new("Rsa", "RSA"), EnumValue::new("Ec", "EC")],
            )),
        )
        .with_schema(
            "date-time",
            SchemaType::formatted(PrimitiveKind::DateTime, PrimitiveFormat::Rfc3339),
        )
        .with_schema("Secret", SchemaType::Object(secret_schema()))
        .with_schema(
            "SecretList",
            SchemaType::Object(ObjectSchema::new(
                "SecretList",
                vec![
                    Property::required("value", "secret-array").with_xml(XmlPropertyInfo {
                        wrapped: true,
                        ..XmlPropertyInfo::default()
                    }),
                    Property::optional("nextLink", "string"),
                ],
            )),
        )
        .with_operation(
            Operation::new("admin_createSecret", HttpMethod::Put)
                .with_path(vec![
                    PathSegment::constant("/admin/secrets/"),
                    PathSegment::parameter("id"),
                ])
                .with_parameter(id_parameter())
                .with_parameter(Parameter::required("secret", "Secret", ParameterLocation::Body))
                .with_body(RequestBody::json("secret"))
                .with_response(ResponseDecl::typed(201, "Secret")),
        )
        .with_operation(
            Operation::new("getSecret", HttpMethod::Get)
                .with_path(secret_route())
                .with_parameter(id_parameter())
                .with_parameter(api_version())
                .with_parameter(
                    Parameter::optional("ifMatch", "tag-list", ParameterLocation::Header)
                        .with_serialized_name("If-Match"),
                )
                .with_response(ResponseDecl::typed(200, "Secret").with_headers(secret_headers())),
        )
        .with_operation(
            Operation::new("headSecret", HttpMethod::Head)
                .with_path(secret_route())
                .with_parameter(id_parameter())
                .with_response(ResponseDecl::empty(200).with_headers(secret_headers())),
        )
        .with_operation(
            Operation::new("listSecrets", HttpMethod::Get)
                .with_path(vec![PathSegment::constant("/secrets")])
                .with_parameter(
                    Parameter::optional("tags", "tag-list", ParameterLocation::Query)
                        .with_style(SerializationStyle::Comma),
                )
                .with_parameter(Parameter::optional("filter", "string", ParameterLocation::Query))
                .with_parameter(
                    Parameter::optional("maxResults", "int32", ParameterLocation::Query)
                        .with_default(json!(25))
                        .with_serialized_name("maxresults"),
                )
                .with_parameter(
                    Parameter::optional("nextLink", "string", ParameterLocation::Query)
                        .as_next_link(),
                )
                .with_parameter(api_version())
                .with_response(ResponseDecl::typed(200, "SecretList")),
        )
        .with_operation(
            Operation::new("rotateSecret", HttpMethod::Post)
                .with_path(vec![
                    PathSegment::constant("/secrets/"),
                    PathSegment::parameter("id"),
                    PathSegment::constant("/rotate"),
                ])
                .with_parameter(id_parameter())
                .with_parameter(Parameter::optional("options", "Secret", ParameterLocation::Body))
                .with_body(RequestBody::json("options"))
                .with_response(ResponseDecl::empty(202)),
        )
        .with_operation(
            Operation::new("updateSecret", HttpMethod::Patch)
                .with_path(secret_route())
                .with_parameter(id_parameter())
                .with_parameter(Parameter::required("newValue", "string", ParameterLocation::Body))
                .with_parameter(Parameter::optional("note", "string", ParameterLocation::Body))
                .with_body(RequestBody::Flattened {
                    schema: "Secret".into(),
                    initializers: vec![
                        FlattenedInitializer {
                            property: "id".to_string(),
                            parameter: "id".to_string(),
                        },
                        FlattenedInitializer {
                            property: "value".to_string(),
                            parameter: "newValue".to_string(),
                        },
                        FlattenedInitializer {
                            property: "note".to_string(),
                            parameter: "note".to_string(),
                        },
                    ],
                    format: WireFormat::Json,
                    content_type: None,
                })
                .with_response(ResponseDecl::typed(200, "Secret")),
        )
        .with_operation(
            Operation::new("deleteSecret", HttpMethod::Delete)
                .with_path(secret_route())
                .with_parameter(id_parameter())
                .with_response(ResponseDecl::empty(204)),
        )
        .with_operation(
            Operation::new("recoverSecret", HttpMethod::Post)
                .with_path(vec![
                    PathSegment::constant("/secrets/"),
                    PathSegment::parameter("id"),
                    PathSegment::constant("/recover"),
                ])
                .with_parameter(id_parameter())
                .with_response(ResponseDecl::typed(200, "Secret"))
                .with_response(ResponseDecl::empty(204)),
        )
        .with_operation(
            Operation::new("downloadBackup", HttpMethod::Get)
                .with_path(vec![PathSegment::constant("/backup")])
                .with_response(ResponseDecl::stream(200)),
        )
        .with_operation(
            Operation::new("uploadBackup", HttpMethod::Put)
                .with_path(vec![PathSegment::constant("/backup")])
                .with_parameter(Parameter::required("content", "bytes", ParameterLocation::Body))
                .with_body(RequestBody::Binary {
                    parameter: "content".to_string(),
                    content_type: None,
                })
                .with_response(ResponseDecl::empty(201)),
        )
}

/// Parses and pretty-prints generated tokens.
pub fn format_tokens(tokens: &TokenStream) -> String {
    let file: syn::File = syn::parse2(tokens.clone()).expect("generated code should parse");
    prettyplease::unparse(&file)
}

/// Strips all whitespace so assertions survive prettyplease line breaks.
pub fn compact(code: &str) -> String {
    code.split_whitespace().collect()
}
