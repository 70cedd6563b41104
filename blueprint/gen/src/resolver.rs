//! Type resolution: schema → target type.
//!
//! Every schema reference is resolved to a [`TargetType`] describing the
//! Rust type that carries it. Resolution is memoized in the
//! [`GenerationContext`] by `(schema id, nullability)`, so repeated lookups
//! of the same schema return the same `Arc`.
//!
//! ## Nullability
//!
//! A property or parameter that is optional and has no default resolves to
//! the nullable variant (`Option<T>`). Explicitly nullable properties do too.
//!
//! ## Polymorphism
//!
//! An object declaring a `discriminator` is the root of a hierarchy. It
//! resolves to a [`ModelRole::PolymorphicBase`] listing every transitive
//! derived variant with its discriminator value; each derived object
//! resolves to a [`ModelRole::Derived`]. Discriminator values must be unique
//! within a hierarchy.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use blueprint_define::{ObjectSchema, Parameter, PrimitiveKind, Property, SchemaId, SchemaType};
use tracing::trace;

use crate::context::{GenerationContext, TypeKey};
use crate::errors::ModelError;
use crate::naming::type_name;

/// The Rust type carrying a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetType {
    /// Type name without the nullable wrapper.
    pub name: String,
    pub nullable: bool,
    pub kind: TargetKind,
    /// True for opaque references to existing types.
    pub is_framework_type: bool,
}

/// What a target type is.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetKind {
    Primitive(PrimitiveKind),
    Enum { schema: SchemaId, extensible: bool },
    Model { schema: SchemaId, role: ModelRole },
    Collection(Arc<TargetType>),
    Dictionary(Arc<TargetType>),
    Framework,
}

/// Position of a model within a polymorphic hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelRole {
    Plain,
    PolymorphicBase {
        /// Wire name of the discriminator property.
        discriminator: String,
        variants: Vec<VariantInfo>,
    },
    Derived {
        base: SchemaId,
        discriminator_value: String,
    },
}

/// One derived variant of a polymorphic base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInfo {
    pub schema: SchemaId,
    pub type_name: String,
    pub discriminator_value: String,
}

impl TargetType {
    fn new(name: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            kind,
            is_framework_type: false,
        }
    }

    /// Returns the full Rust type, wrapping nullable types in `Option`.
    ///
    /// ## Examples
    ///
    /// ```
    /// use blueprint_define::{ApiModel, PrimitiveKind, SchemaType};
    /// use blueprint_gen::context::GenerationContext;
    /// use blueprint_gen::resolver::resolve_nullable;
    ///
    /// let model = ApiModel::new("Test")
    ///     .with_primitives()
    ///     .with_schema("names", SchemaType::array("string"));
    /// let ctx = GenerationContext::new(&model);
    ///
    /// let names = resolve_nullable(&ctx, &"names".into(), true).unwrap();
    /// assert_eq!(names.rust_type(), "Option<Vec<String>>");
    /// ```
    pub fn rust_type(&self) -> String {
        if self.nullable {
            format!("Option<{}>", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Returns the element type of a collection.
    pub fn is_collection_of(&self) -> Option<&TargetType> {
        match &self.kind {
            TargetKind::Collection(element) => Some(element),
            _ => None,
        }
    }

    /// Returns the value type of a dictionary.
    pub fn is_dictionary_of(&self) -> Option<&TargetType> {
        match &self.kind {
            TargetKind::Dictionary(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the schema of a model or enum type.
    pub fn schema(&self) -> Option<&SchemaId> {
        match &self.kind {
            TargetKind::Enum { schema, .. } | TargetKind::Model { schema, .. } => Some(schema),
            _ => None,
        }
    }

    /// Returns the primitive kind of a primitive type.
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TargetKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Returns the Rust type carrying a primitive kind.
pub fn primitive_type_name(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::String | PrimitiveKind::Duration => "String",
        PrimitiveKind::Boolean => "bool",
        PrimitiveKind::Int32 => "i32",
        PrimitiveKind::Int64 => "i64",
        PrimitiveKind::Float32 => "f32",
        PrimitiveKind::Float64 => "f64",
        PrimitiveKind::Date => "chrono::NaiveDate",
        PrimitiveKind::DateTime => "chrono::DateTime<chrono::Utc>",
        PrimitiveKind::Uuid => "uuid::Uuid",
        PrimitiveKind::Uri => "url::Url",
        PrimitiveKind::Bytes => "Vec<u8>",
        PrimitiveKind::Any => "serde_json::Value",
    }
}

/// Resolves a schema to its non-nullable target type.
///
/// ## Errors
///
/// Returns a [`ModelError`] if the schema (or anything it references) is
/// undefined, or if its polymorphic hierarchy reuses a discriminator value.
pub fn resolve(ctx: &GenerationContext<'_>, id: &SchemaId) -> Result<Arc<TargetType>, ModelError> {
    resolve_ref(ctx, id, false, id.as_str())
}

/// Resolves a schema to its nullable or non-nullable target type.
///
/// ## Errors
///
/// See [`resolve`].
pub fn resolve_nullable(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
    nullable: bool,
) -> Result<Arc<TargetType>, ModelError> {
    resolve_ref(ctx, id, nullable, id.as_str())
}

/// Resolves a property of `owner`, applying the nullability rule.
///
/// ## Errors
///
/// See [`resolve`].
pub fn resolve_property(
    ctx: &GenerationContext<'_>,
    owner: &str,
    property: &Property,
) -> Result<Arc<TargetType>, ModelError> {
    let nullable = property.nullable || (!property.required && property.default_value.is_none());
    resolve_ref(
        ctx,
        &property.schema,
        nullable,
        &format!("{}.{}", owner, property.name),
    )
}

/// Resolves a parameter of `operation`, applying the nullability rule.
///
/// Constant parameters are never nullable.
///
/// ## Errors
///
/// See [`resolve`].
pub fn resolve_parameter(
    ctx: &GenerationContext<'_>,
    operation: &str,
    parameter: &Parameter,
) -> Result<Arc<TargetType>, ModelError> {
    resolve_ref(
        ctx,
        &parameter.schema,
        is_nullable_parameter(parameter),
        &format!("{}({})", operation, parameter.name),
    )
}

/// Returns true when an unset argument for the parameter is skipped.
pub fn is_nullable_parameter(parameter: &Parameter) -> bool {
    parameter.constant.is_none() && !parameter.required && parameter.default_value.is_none()
}

fn resolve_ref(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
    nullable: bool,
    referenced_by: &str,
) -> Result<Arc<TargetType>, ModelError> {
    let key = TypeKey {
        schema: id.clone(),
        nullable,
    };
    if let Some(cached) = ctx.cached_type(&key) {
        return Ok(cached);
    }

    let target = if nullable {
        let inner = resolve_ref(ctx, id, false, referenced_by)?;
        TargetType {
            nullable: true,
            ..(*inner).clone()
        }
    } else {
        compute(ctx, id, referenced_by)?
    };
    trace!(schema = %id, nullable, name = %target.name, "Resolved target type");
    Ok(ctx.insert_type(key, target))
}

fn compute(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
    referenced_by: &str,
) -> Result<TargetType, ModelError> {
    let target = match ctx.schema(id, referenced_by)? {
        SchemaType::Primitive { kind, .. } => {
            TargetType::new(primitive_type_name(*kind), TargetKind::Primitive(*kind))
        }
        SchemaType::Enum(schema) => TargetType::new(
            type_name(&schema.name),
            TargetKind::Enum {
                schema: id.clone(),
                extensible: schema.extensible,
            },
        ),
        SchemaType::Object(object) => TargetType::new(
            type_name(&object.name),
            TargetKind::Model {
                schema: id.clone(),
                role: model_role(ctx, id, object)?,
            },
        ),
        SchemaType::Array { element } => {
            let element = resolve_ref(ctx, element, false, id.as_str())?;
            TargetType::new(format!("Vec<{}>", element.name), TargetKind::Collection(element))
        }
        SchemaType::Dictionary { value } => {
            let value = resolve_ref(ctx, value, false, id.as_str())?;
            TargetType::new(
                format!("std::collections::HashMap<String, {}>", value.name),
                TargetKind::Dictionary(value),
            )
        }
        SchemaType::Framework { type_path } => TargetType {
            is_framework_type: true,
            ..TargetType::new(type_path.clone(), TargetKind::Framework)
        },
    };
    Ok(target)
}

fn model_role(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
    object: &ObjectSchema,
) -> Result<ModelRole, ModelError> {
    if let Some(discriminator) = &object.discriminator {
        let variants = collect_variants(ctx, id, object)?;
        return Ok(ModelRole::PolymorphicBase {
            discriminator: discriminator.clone(),
            variants,
        });
    }
    match hierarchy_root(ctx, id)? {
        Some(root) if &root != id => {
            // Resolving the root validates the whole hierarchy.
            resolve_ref(ctx, &root, false, id.as_str())?;
            Ok(ModelRole::Derived {
                base: root,
                discriminator_value: discriminator_value(object),
            })
        }
        _ => Ok(ModelRole::Plain),
    }
}

/// Returns the discriminator value of a derived object.
///
/// Falls back to the schema name when none is declared.
pub fn discriminator_value(object: &ObjectSchema) -> String {
    object
        .discriminator_value
        .clone()
        .unwrap_or_else(|| object.name.clone())
}

fn collect_variants(
    ctx: &GenerationContext<'_>,
    root: &SchemaId,
    object: &ObjectSchema,
) -> Result<Vec<VariantInfo>, ModelError> {
    let mut variants = Vec::new();
    let mut seen_values: BTreeMap<String, String> = BTreeMap::new();
    let mut visited: BTreeSet<SchemaId> = BTreeSet::from([root.clone()]);
    let mut pending: Vec<SchemaId> = object.derived.iter().rev().cloned().collect();

    while let Some(id) = pending.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let derived = object_schema(ctx, &id, root.as_str())?;
        let value = discriminator_value(derived);
        let name = type_name(&derived.name);
        if let Some(first) = seen_values.insert(value.clone(), name.clone()) {
            return Err(ModelError::DuplicateDiscriminator {
                base: object.name.clone(),
                value,
                first,
                second: name,
            });
        }
        variants.push(VariantInfo {
            schema: id.clone(),
            type_name: name,
            discriminator_value: value,
        });
        pending.extend(derived.derived.iter().rev().cloned());
    }
    Ok(variants)
}

/// Returns the object schema behind an id.
///
/// ## Errors
///
/// Returns `ModelError::UnknownSchema` if the id is undefined and
/// `ModelError::UnsupportedSerialization` if it is not an object.
pub fn object_schema<'m>(
    ctx: &GenerationContext<'m>,
    id: &SchemaId,
    referenced_by: &str,
) -> Result<&'m ObjectSchema, ModelError> {
    ctx.schema(id, referenced_by)?
        .as_object()
        .ok_or_else(|| ModelError::UnsupportedSerialization {
            schema: id.to_string(),
            reason: format!("expected an object schema (referenced by '{}')", referenced_by),
        })
}

/// Walks the `base` chain to the object declaring the discriminator.
///
/// Returns `None` when the chain ends without one.
pub fn hierarchy_root(
    ctx: &GenerationContext<'_>,
    id: &SchemaId,
) -> Result<Option<SchemaId>, ModelError> {
    let mut current = id.clone();
    let mut visited = BTreeSet::new();
    loop {
        if !visited.insert(current.clone()) {
            return Ok(None);
        }
        let object = object_schema(ctx, &current, id.as_str())?;
        if object.discriminator.is_some() {
            return Ok(Some(current));
        }
        match &object.base {
            Some(base) => current = base.clone(),
            None => return Ok(None),
        }
    }
}

/// Returns every property of an object, inherited ones first.
///
/// ## Errors
///
/// Returns a [`ModelError`] if a base schema is undefined or not an object.
pub fn inherited_properties<'m>(
    ctx: &GenerationContext<'m>,
    id: &SchemaId,
) -> Result<Vec<&'m Property>, ModelError> {
    let mut chain = Vec::new();
    let mut visited = BTreeSet::new();
    let mut current = Some(id.clone());
    while let Some(schema) = current {
        if !visited.insert(schema.clone()) {
            break;
        }
        let object = object_schema(ctx, &schema, id.as_str())?;
        chain.push(object);
        current = object.base.clone();
    }
    Ok(chain
        .into_iter()
        .rev()
        .flat_map(|object| object.properties.iter())
        .collect())
}
