//! Serialization planning and execution.
//!
//! [`plan`] turns a schema into a [`SerializationNode`] tree for one wire
//! format. The [`json`] and [`xml`] interpreters execute plans against
//! dynamic [`Value`]s; generated code follows the same plans statically.

pub mod json;
pub mod plan;
pub mod value;
pub mod xml;

pub use plan::{
    DiscriminatorConst, EnumKind, JsonObjectNode, JsonPolymorphicNode, JsonProperty,
    PolymorphicVariant, RawFormat, SerializationNode, ValueKind, XmlAttribute, XmlChild,
    XmlContent, XmlElementNode, XmlText, plan, plan_raw, value_kind, xml_closure,
};
pub use value::{Value, scalar_from_text, scalar_to_text};
