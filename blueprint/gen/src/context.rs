//! Per-run generation context.
//!
//! The context owns the memo tables of the type resolver and the
//! serialization planner for exactly one run. Both tables are concurrent
//! maps with insert-if-absent semantics: values are computed outside the map
//! and the first inserted value wins, so racing computations for the same
//! schema converge on one shared `Arc`.

use std::sync::Arc;

use blueprint_define::{ApiModel, SchemaId, SchemaType, WireFormat};
use dashmap::DashMap;

use crate::errors::ModelError;
use crate::resolver::TargetType;
use crate::serialization::SerializationNode;

/// Cache key of a resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub schema: SchemaId,
    pub nullable: bool,
}

/// Cache key of a serialization plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    pub schema: SchemaId,
    pub format: WireFormat,
}

/// State shared by every planner during one generation run.
///
/// ## Examples
///
/// ```
/// use blueprint_define::ApiModel;
/// use blueprint_gen::context::GenerationContext;
///
/// let model = ApiModel::new("Vault").with_primitives();
/// let ctx = GenerationContext::new(&model);
/// assert_eq!(ctx.type_count(), 0);
/// ```
pub struct GenerationContext<'m> {
    model: &'m ApiModel,
    types: DashMap<TypeKey, Arc<TargetType>>,
    plans: DashMap<PlanKey, Arc<SerializationNode>>,
}

impl<'m> GenerationContext<'m> {
    /// Creates an empty context over the model.
    pub fn new(model: &'m ApiModel) -> Self {
        Self {
            model,
            types: DashMap::new(),
            plans: DashMap::new(),
        }
    }

    /// Returns the model being generated.
    pub fn model(&self) -> &'m ApiModel {
        self.model
    }

    /// Looks up a schema, naming the referrer when it is missing.
    ///
    /// ## Errors
    ///
    /// Returns `ModelError::UnknownSchema` if the id is not defined.
    pub fn schema(&self, id: &SchemaId, referenced_by: &str) -> Result<&'m SchemaType, ModelError> {
        self.model
            .schema(id)
            .ok_or_else(|| ModelError::UnknownSchema {
                schema: id.to_string(),
                referenced_by: referenced_by.to_string(),
            })
    }

    pub(crate) fn cached_type(&self, key: &TypeKey) -> Option<Arc<TargetType>> {
        self.types.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn insert_type(&self, key: TypeKey, value: TargetType) -> Arc<TargetType> {
        let entry = self.types.entry(key).or_insert_with(|| Arc::new(value));
        Arc::clone(entry.value())
    }

    pub(crate) fn cached_plan(&self, key: &PlanKey) -> Option<Arc<SerializationNode>> {
        self.plans.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn insert_plan(&self, key: PlanKey, value: SerializationNode) -> Arc<SerializationNode> {
        let entry = self.plans.entry(key).or_insert_with(|| Arc::new(value));
        Arc::clone(entry.value())
    }

    /// Returns true once a plan for the schema and format exists.
    pub fn has_plan(&self, schema: &SchemaId, format: WireFormat) -> bool {
        self.plans.contains_key(&PlanKey {
            schema: schema.clone(),
            format,
        })
    }

    /// Number of resolved types cached so far.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of serialization plans cached so far.
    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }
}

impl std::fmt::Debug for GenerationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationContext")
            .field("model", &self.model.name)
            .field("types", &self.types.len())
            .field("plans", &self.plans.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::TargetKind;
    use blueprint_define::PrimitiveKind;

    fn string_type(name: &str) -> TargetType {
        TargetType {
            name: name.to_string(),
            nullable: false,
            kind: TargetKind::Primitive(PrimitiveKind::String),
            is_framework_type: false,
        }
    }

    #[test]
    fn first_insert_wins() {
        let model = ApiModel::new("Test");
        let ctx = GenerationContext::new(&model);
        let key = TypeKey {
            schema: SchemaId::from("string"),
            nullable: false,
        };
        let first = ctx.insert_type(key.clone(), string_type("String"));
        let second = ctx.insert_type(key.clone(), string_type("Other"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.name, "String");
        assert_eq!(ctx.type_count(), 1);
    }

    #[test]
    fn unknown_schema_names_referrer() {
        let model = ApiModel::new("Test");
        let ctx = GenerationContext::new(&model);
        let err = ctx.schema(&SchemaId::from("Ghost"), "Secret.value").unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownSchema {
                schema: "Ghost".to_string(),
                referenced_by: "Secret.value".to_string()
            }
        );
    }

    #[test]
    fn separate_contexts_do_not_share_caches() {
        let model = ApiModel::new("Test");
        let a = GenerationContext::new(&model);
        let b = GenerationContext::new(&model);
        let key = TypeKey {
            schema: SchemaId::from("string"),
            nullable: false,
        };
        a.insert_type(key.clone(), string_type("String"));
        assert!(a.cached_type(&key).is_some());
        assert!(b.cached_type(&key).is_none());
    }
}
