//! The top-level semantic API model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::operation::Operation;
use crate::schema::{PrimitiveKind, SchemaId, SchemaType};

/// A fully parsed HTTP API: every schema it uses and every operation it exposes.
///
/// Schemas are stored once, keyed by [`SchemaId`]; everything else refers to
/// them by id.
///
/// ## Examples
///
/// ```
/// use blueprint_define::{ApiModel, HttpMethod, Operation, PrimitiveKind, SchemaType};
///
/// let model = ApiModel::new("Vault")
///     .with_primitives()
///     .with_operation(Operation::new("listSecrets", HttpMethod::Get));
///
/// assert_eq!(
///     model.schema(&"string".into()),
///     Some(&SchemaType::primitive(PrimitiveKind::String))
/// );
/// assert!(model.operation("listSecrets").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub schemas: BTreeMap<SchemaId, SchemaType>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl ApiModel {
    /// Creates an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Registers one schema per primitive kind, keyed by the kind's name
    /// (`"string"`, `"int32"`, `"date-time"`, …).
    pub fn with_primitives(mut self) -> Self {
        use strum::IntoEnumIterator;

        for kind in PrimitiveKind::iter() {
            self.schemas
                .entry(SchemaId::new(kind.to_string()))
                .or_insert_with(|| SchemaType::primitive(kind));
        }
        self
    }

    /// Registers a schema.
    pub fn with_schema(mut self, id: impl Into<SchemaId>, schema: SchemaType) -> Self {
        self.schemas.insert(id.into(), schema);
        self
    }

    /// Adds an operation.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Looks up a schema by id.
    pub fn schema(&self, id: &SchemaId) -> Option<&SchemaType> {
        self.schemas.get(id)
    }

    /// Looks up an operation by name.
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObjectSchema, Property};

    #[test]
    fn with_primitives_keeps_existing_entries() {
        let custom = SchemaType::Framework {
            type_path: "my::Text".to_string(),
        };
        let model = ApiModel::new("Test")
            .with_schema("string", custom.clone())
            .with_primitives();
        assert_eq!(model.schema(&SchemaId::from("string")), Some(&custom));
        assert!(model.schema(&SchemaId::from("uuid")).is_some());
    }

    #[test]
    fn model_loads_from_yaml() {
        let yaml = r#"
name: Vault
schemas:
  string: { type: primitive, kind: string }
  Secret:
    type: object
    name: Secret
    properties:
      - { name: value, serialized-name: value, schema: string, required: true }
operations:
  - name: admin_createSecret
    method: PUT
    path:
      - { kind: constant, value: /admin/secrets/ }
      - { kind: parameter, name: id }
    parameters:
      - { name: id, schema: string, location: path, required: true }
      - { name: secret, schema: Secret, location: body, required: true }
    body: { kind: schema, parameter: secret }
    responses:
      - status-codes: [201]
        body: { kind: typed, schema: Secret }
"#;
        let model: ApiModel = serde_yaml::from_str(yaml).unwrap();
        let secret = model.schema(&SchemaId::from("Secret")).unwrap();
        assert_eq!(
            secret.as_object(),
            Some(&ObjectSchema::new("Secret", vec![Property::required("value", "string")]))
        );
        let op = model.operation("admin_createSecret").unwrap();
        assert_eq!(op.path.len(), 2);
        assert_eq!(op.responses.len(), 1);
    }
}
