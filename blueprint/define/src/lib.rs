//! Blueprint Definition Library
//!
//! This crate provides the semantic model of an HTTP API consumed by the
//! `blueprint-gen` code generator. The model is the output of an upstream
//! API-description parser; it is plain data and derives `serde` traits so it
//! can be loaded from YAML or JSON.
//!
//! ## Core Types
//!
//! - [`ApiModel`] - Schemas plus operations
//! - [`SchemaType`] - Primitive, enum, object, array, dictionary or framework type
//! - [`Property`] - A property of an object schema
//! - [`Operation`] - Route, parameters, body and responses of one HTTP operation
//! - [`Parameter`] - A path, query, header or body parameter
//! - [`RequestBody`] - Schema, binary, text or flattened request body
//! - [`ResponseDecl`] - Status codes, body and header model of a response
//!
//! ## Examples
//!
//! ```
//! use blueprint_define::{
//!     ApiModel, HttpMethod, ObjectSchema, Operation, Parameter, ParameterLocation,
//!     PathSegment, Property, ResponseDecl, SchemaType,
//! };
//!
//! let model = ApiModel::new("Vault")
//!     .with_primitives()
//!     .with_schema(
//!         "Secret",
//!         SchemaType::Object(ObjectSchema::new(
//!             "Secret",
//!             vec![Property::required("value", "string")],
//!         )),
//!     )
//!     .with_operation(
//!         Operation::new("admin_getSecret", HttpMethod::Get)
//!             .with_path(vec![PathSegment::constant("/admin/secrets/"), PathSegment::parameter("id")])
//!             .with_parameter(Parameter::required("id", "string", ParameterLocation::Path))
//!             .with_response(ResponseDecl::typed(200, "Secret")),
//!     );
//!
//! assert_eq!(model.operations.len(), 1);
//! ```

pub mod model;
pub mod operation;
pub mod prelude;
pub mod response;
pub mod schema;

pub use model::ApiModel;
pub use operation::{
    FlattenedInitializer, HttpMethod, Operation, Parameter, ParameterLocation, PathSegment,
    RequestBody, SerializationStyle,
};
pub use response::{
    HeaderField, HeaderModel, ResponseBodyDecl, ResponseDecl, StatusCode, StatusCodeError,
};
pub use schema::{
    EnumSchema, EnumValue, ObjectSchema, PrimitiveFormat, PrimitiveKind, Property, SchemaId,
    SchemaType, WireFormat, XmlObjectInfo, XmlPropertyInfo,
};
