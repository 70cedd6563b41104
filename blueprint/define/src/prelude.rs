//! Convenient re-exports for building API models.
//!
//! ## Examples
//!
//! ```
//! use blueprint_define::prelude::*;
//!
//! let op = Operation::new("listSecrets", HttpMethod::Get)
//!     .with_path(vec![PathSegment::constant("/secrets")])
//!     .with_parameter(
//!         Parameter::optional("tags", "tag-list", ParameterLocation::Query)
//!             .with_style(SerializationStyle::Comma),
//!     )
//!     .with_response(ResponseDecl::typed(200, "SecretList"));
//!
//! let model = ApiModel::new("Vault")
//!     .with_primitives()
//!     .with_schema("tag-list", SchemaType::array("string"))
//!     .with_operation(op);
//!
//! assert_eq!(model.operations[0].parameters.len(), 1);
//! ```

pub use crate::model::ApiModel;
pub use crate::operation::{
    FlattenedInitializer, HttpMethod, Operation, Parameter, ParameterLocation, PathSegment,
    RequestBody, SerializationStyle,
};
pub use crate::response::{HeaderField, HeaderModel, ResponseBodyDecl, ResponseDecl, StatusCode};
pub use crate::schema::{
    EnumSchema, EnumValue, ObjectSchema, PrimitiveFormat, PrimitiveKind, Property, SchemaId,
    SchemaType, WireFormat, XmlObjectInfo, XmlPropertyInfo,
};
