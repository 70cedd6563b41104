//! Assignment of operations to output buckets.
//!
//! Every operation lands in exactly one [`OutputBucket`]. The bucket key is
//! chosen by the configured [`ApiGroupBy`] policy; the bucket type name is
//! `{Key}Api` and its file `{key}_api.rs`. An operation for which the policy
//! finds no key goes to the empty-key bucket (`Api`, `api.rs`), which is kept
//! and logged for review rather than rejected.

use std::collections::BTreeMap;

use blueprint_define::Operation;
use heck::ToSnakeCase;
use tracing::{debug, warn};

use crate::config::ApiGroupBy;
use crate::errors::ModelError;
use crate::naming::{bucket_file_name, bucket_name};

/// A group of operations emitted as one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBucket<'m> {
    pub key: String,
    /// Type name of the generated client, e.g. `SecretsApi`.
    pub name: String,
    /// Module path of the artifact below the crate root.
    pub namespace_hint: String,
    /// Artifact path relative to the output folder.
    pub path: String,
    /// Operations ordered by name.
    pub operations: Vec<&'m Operation>,
}

impl OutputBucket<'_> {
    /// Returns the folder of the artifact, empty at the root.
    pub fn folder(&self) -> &str {
        self.path.rsplit_once('/').map_or("", |(folder, _)| folder)
    }
}

/// Returns the bucket key of an operation under a policy.
///
/// ## Examples
///
/// ```
/// use blueprint_define::{HttpMethod, Operation, PathSegment};
/// use blueprint_gen::config::ApiGroupBy;
/// use blueprint_gen::grouping::bucket_key;
///
/// let op = Operation::new("admin_createSecret", HttpMethod::Put)
///     .with_path(vec![PathSegment::constant("/admin/secrets/"), PathSegment::parameter("id")]);
///
/// assert_eq!(bucket_key(&op, ApiGroupBy::OperationGroup), "admin");
/// assert_eq!(bucket_key(&op, ApiGroupBy::FirstPathSegment), "admin");
/// assert_eq!(bucket_key(&op, ApiGroupBy::LastPathSegment), "secrets");
/// assert_eq!(bucket_key(&op, ApiGroupBy::Operation), "admin_createSecret");
/// ```
pub fn bucket_key(operation: &Operation, policy: ApiGroupBy) -> String {
    match policy {
        ApiGroupBy::Operation | ApiGroupBy::OperationFlat => operation.name.clone(),
        ApiGroupBy::OperationGroup => operation
            .name
            .split_once('_')
            .map(|(prefix, _)| prefix.to_string())
            .unwrap_or_default(),
        ApiGroupBy::FirstPathSegment => route_segments(operation)
            .first()
            .cloned()
            .unwrap_or_default(),
        ApiGroupBy::LastPathSegment => route_segments(operation)
            .last()
            .cloned()
            .unwrap_or_default(),
    }
}

/// Non-empty, lower-cased segments of the first constant route part that
/// starts with `/`.
fn route_segments(operation: &Operation) -> Vec<String> {
    operation
        .path
        .iter()
        .filter_map(|segment| segment.as_constant())
        .find(|value| value.starts_with('/'))
        .map(|value| {
            value
                .split('/')
                .filter(|part| !part.is_empty())
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default()
}

/// Folder an operation is nested under by the `operation` policy.
fn operation_folder(operation: &Operation) -> String {
    operation
        .constant_route()
        .map(|route| {
            route
                .trim_matches('/')
                .split('/')
                .filter(|part| !part.is_empty())
                .map(|part| part.to_snake_case())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

/// Partitions operations into buckets ordered by key.
///
/// ## Errors
///
/// Returns `ModelError::ArtifactCollision` when two buckets map to the same
/// artifact path.
pub fn group<'m>(
    operations: &'m [Operation],
    policy: ApiGroupBy,
    namespace: &str,
) -> Result<Vec<OutputBucket<'m>>, ModelError> {
    let mut grouped: BTreeMap<(String, String), Vec<&'m Operation>> = BTreeMap::new();
    for operation in operations {
        let key = bucket_key(operation, policy);
        let folder = match policy {
            ApiGroupBy::Operation => operation_folder(operation),
            _ => String::new(),
        };
        if key.is_empty() {
            warn!(
                operation = %operation.name,
                %policy,
                "Operation has no bucket key; emitting it into the default bucket for review"
            );
        }
        grouped.entry((key, folder)).or_default().push(operation);
    }

    let mut buckets = Vec::with_capacity(grouped.len());
    let mut paths: BTreeMap<String, String> = BTreeMap::new();
    for ((key, folder), mut members) in grouped {
        members.sort_by(|a, b| a.name.cmp(&b.name));
        let file = bucket_file_name(&key);
        let path = if folder.is_empty() {
            file
        } else {
            format!("{}/{}", folder, file)
        };
        if let Some(first) = paths.insert(path.clone(), key.clone()) {
            return Err(ModelError::ArtifactCollision {
                path,
                first: bucket_name(&first),
                second: bucket_name(&key),
            });
        }
        let module_path = path.trim_end_matches(".rs").replace('/', "::");
        buckets.push(OutputBucket {
            name: bucket_name(&key),
            namespace_hint: format!("{}::{}", namespace, module_path),
            path,
            key,
            operations: members,
        });
    }
    debug!(%policy, buckets = buckets.len(), "Grouped operations");
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::vault_model;
    use blueprint_define::{HttpMethod, PathSegment};

    fn keys(buckets: &[OutputBucket<'_>]) -> Vec<String> {
        buckets.iter().map(|b| b.key.clone()).collect()
    }

    #[test]
    fn first_path_segment_groups_by_resource() {
        let model = vault_model();
        let buckets = group(&model.operations, ApiGroupBy::FirstPathSegment, "vault").unwrap();
        assert_eq!(keys(&buckets), vec!["admin", "backup", "secrets"]);
        let secrets = &buckets[2];
        assert_eq!(secrets.name, "SecretsApi");
        assert_eq!(secrets.path, "secrets_api.rs");
        assert_eq!(secrets.namespace_hint, "vault::secrets_api");
        let names: Vec<_> = secrets.operations.iter().map(|op| op.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn operation_policy_nests_under_route() {
        let model = vault_model();
        let buckets = group(&model.operations, ApiGroupBy::Operation, "vault").unwrap();
        let create = buckets
            .iter()
            .find(|b| b.key == "admin_createSecret")
            .unwrap();
        assert_eq!(create.path, "admin/secrets/admin_create_secret_api.rs");
        assert_eq!(create.folder(), "admin/secrets");
        assert_eq!(create.name, "AdminCreateSecretApi");
    }

    #[test]
    fn operation_flat_places_everything_at_root() {
        let model = vault_model();
        let buckets = group(&model.operations, ApiGroupBy::OperationFlat, "vault").unwrap();
        assert_eq!(buckets.len(), model.operations.len());
        assert!(buckets.iter().all(|b| b.folder().is_empty()));
    }

    #[test]
    #[tracing_test::traced_test]
    fn missing_key_goes_to_default_bucket() {
        let ops = vec![
            Operation::new("ping", HttpMethod::Get),
            Operation::new("status", HttpMethod::Get)
                .with_path(vec![PathSegment::constant("health")]),
        ];
        let buckets = group(&ops, ApiGroupBy::FirstPathSegment, "vault").unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "Api");
        assert_eq!(buckets[0].path, "api.rs");
        assert_eq!(buckets[0].operations.len(), 2);
        assert!(logs_contain("default bucket for review"));
    }

    #[test]
    fn case_variants_collide() {
        let ops = vec![
            Operation::new("Secrets_list", HttpMethod::Get),
            Operation::new("secrets_get", HttpMethod::Get),
        ];
        let err = group(&ops, ApiGroupBy::OperationGroup, "vault").unwrap_err();
        assert!(matches!(err, ModelError::ArtifactCollision { ref path, .. } if path == "secrets_api.rs"));
    }
}
