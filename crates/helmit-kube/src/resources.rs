//! Applying and deleting rendered manifests
//!
//! Resources are applied with Server-Side Apply through the dynamic API, so
//! any kind the cluster's discovery knows about can be installed. Ordering
//! follows the usual install order (namespaces and config before workloads)
//! and is reversed for deletion.

use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PropagationPolicy},
    core::{GroupVersionKind, TypeMeta},
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope},
};
use serde::Deserialize;

use crate::error::{KubeError, Result};

/// Field manager name for Server-Side Apply
const FIELD_MANAGER: &str = "helmit";

/// Kinds in install order; anything unlisted goes last
const INSTALL_ORDER: &[&str] = &[
    "Namespace",
    "NetworkPolicy",
    "ResourceQuota",
    "LimitRange",
    "PodDisruptionBudget",
    "ServiceAccount",
    "Secret",
    "ConfigMap",
    "StorageClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "CustomResourceDefinition",
    "ClusterRole",
    "ClusterRoleBinding",
    "Role",
    "RoleBinding",
    "Service",
    "DaemonSet",
    "Pod",
    "ReplicaSet",
    "Deployment",
    "HorizontalPodAutoscaler",
    "StatefulSet",
    "Job",
    "CronJob",
    "IngressClass",
    "Ingress",
];

fn install_rank(kind: &str) -> usize {
    INSTALL_ORDER
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(INSTALL_ORDER.len())
}

/// Summary of apply/delete operations
#[derive(Debug, Clone, Default)]
pub struct OperationSummary {
    pub succeeded: Vec<String>,
    /// Resource and error message
    pub failed: Vec<(String, String)>,
    /// Resource and reason
    pub skipped: Vec<(String, String)>,
}

impl OperationSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Human-readable summary, e.g. "2 succeeded, 1 failed"
    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            (self.succeeded.len(), "succeeded"),
            (self.failed.len(), "failed"),
            (self.skipped.len(), "skipped"),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, what)| format!("{n} {what}"))
        .collect();

        if parts.is_empty() {
            "No resources processed".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// First failure as an error, if any
    pub fn into_result(self, action: &str) -> Result<Self> {
        match self.failed.first() {
            None => Ok(self),
            Some((resource, message)) => Err(KubeError::InvalidManifest(format!(
                "failed to {action} {resource}: {message} ({})",
                self.summary()
            ))),
        }
    }
}

/// Split a multi-document YAML stream into objects
///
/// Empty and comment-only documents are ignored. Every remaining document
/// must carry `apiVersion`, `kind` and `metadata.name`.
pub fn parse_documents(manifest: &str) -> Result<Vec<DynamicObject>> {
    let mut objects = Vec::new();

    for (index, doc) in serde_yaml::Deserializer::from_str(manifest).enumerate() {
        let value = serde_yaml::Value::deserialize(doc)
            .map_err(|e| KubeError::InvalidManifest(format!("document {index}: {e}")))?;
        if value.is_null() {
            continue;
        }

        let obj: DynamicObject = serde_yaml::from_value(value)
            .map_err(|e| KubeError::InvalidManifest(format!("document {index}: {e}")))?;

        if obj.types.is_none() {
            return Err(KubeError::InvalidManifest(format!(
                "document {index}: missing apiVersion or kind"
            )));
        }
        if obj.metadata.name.is_none() {
            return Err(KubeError::InvalidManifest(format!(
                "document {index}: missing metadata.name"
            )));
        }

        objects.push(obj);
    }

    Ok(objects)
}

/// Resource resolved against cluster discovery
#[derive(Debug, Clone)]
struct ParsedResource {
    obj: DynamicObject,
    gvk: GroupVersionKind,
    api_resource: ApiResource,
    capabilities: ApiCapabilities,
}

impl ParsedResource {
    fn name(&self) -> &str {
        self.obj.metadata.name.as_deref().unwrap_or_default()
    }

    fn display_name(&self) -> String {
        match &self.obj.metadata.namespace {
            Some(ns) => format!("{ns}/{}/{}", self.gvk.kind, self.name()),
            None => format!("{}/{}", self.gvk.kind, self.name()),
        }
    }
}

/// Applies and deletes manifests through the dynamic API
pub struct ResourceManager {
    client: Client,
    discovery: Discovery,
}

impl ResourceManager {
    /// Create a manager, running API discovery once
    pub async fn new(client: Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        Ok(Self { client, discovery })
    }

    /// Server-Side Apply every resource in `manifest`
    pub async fn apply_manifest(&self, namespace: &str, manifest: &str) -> Result<OperationSummary> {
        let mut resources = self.resolve(manifest, namespace)?;
        resources.sort_by_key(|r| install_rank(&r.gvk.kind));

        let params = PatchParams::apply(FIELD_MANAGER).force();
        let mut summary = OperationSummary::default();

        for resource in &resources {
            let api = self.api_for(resource);
            match api
                .patch(resource.name(), &params, &Patch::Apply(&resource.obj))
                .await
            {
                Ok(_) => {
                    tracing::debug!(resource = %resource.display_name(), "applied");
                    summary.succeeded.push(resource.display_name());
                }
                Err(e) => summary.failed.push((resource.display_name(), e.to_string())),
            }
        }

        Ok(summary)
    }

    /// Delete every resource in `manifest`, in reverse install order
    ///
    /// Resources that are already gone count as skipped.
    pub async fn delete_manifest(&self, namespace: &str, manifest: &str) -> Result<OperationSummary> {
        let mut resources = self.resolve(manifest, namespace)?;
        resources.sort_by_key(|r| std::cmp::Reverse(install_rank(&r.gvk.kind)));

        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };
        let mut summary = OperationSummary::default();

        for resource in &resources {
            match self.api_for(resource).delete(resource.name(), &params).await {
                Ok(_) => summary.succeeded.push(resource.display_name()),
                Err(kube::Error::Api(resp)) if resp.code == 404 => summary
                    .skipped
                    .push((resource.display_name(), "not found".to_string())),
                Err(e) => summary.failed.push((resource.display_name(), e.to_string())),
            }
        }

        Ok(summary)
    }

    fn resolve(&self, manifest: &str, default_namespace: &str) -> Result<Vec<ParsedResource>> {
        parse_documents(manifest)?
            .into_iter()
            .map(|mut obj| {
                let types = obj.types.clone().unwrap_or_default();
                let gvk = gvk_from_type_meta(&types);
                let (api_resource, capabilities) =
                    self.discovery.resolve_gvk(&gvk).ok_or_else(|| {
                        KubeError::InvalidManifest(format!(
                            "unknown resource type: {}/{}",
                            types.api_version, types.kind
                        ))
                    })?;

                if capabilities.scope == Scope::Namespaced && obj.metadata.namespace.is_none() {
                    obj.metadata.namespace = Some(default_namespace.to_string());
                }

                Ok(ParsedResource {
                    obj,
                    gvk,
                    api_resource,
                    capabilities,
                })
            })
            .collect()
    }

    fn api_for(&self, resource: &ParsedResource) -> Api<DynamicObject> {
        match (&resource.capabilities.scope, &resource.obj.metadata.namespace) {
            (Scope::Namespaced, Some(ns)) => {
                Api::namespaced_with(self.client.clone(), ns, &resource.api_resource)
            }
            _ => Api::all_with(self.client.clone(), &resource.api_resource),
        }
    }
}

/// "apps/v1" -> group "apps", version "v1"; "v1" -> core group
fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = match tm.api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), tm.api_version.clone()),
    };

    GroupVersionKind {
        group,
        version,
        kind: tm.kind.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_rank() {
        assert!(install_rank("Namespace") < install_rank("ConfigMap"));
        assert!(install_rank("ConfigMap") < install_rank("Deployment"));
        assert!(install_rank("Service") < install_rank("Deployment"));
        assert_eq!(install_rank("Widget"), INSTALL_ORDER.len());
    }

    #[test]
    fn test_gvk_from_type_meta() {
        let gvk = gvk_from_type_meta(&TypeMeta {
            api_version: "networking.k8s.io/v1".to_string(),
            kind: "Ingress".to_string(),
        });
        assert_eq!(gvk.group, "networking.k8s.io");
        assert_eq!(gvk.version, "v1");

        let core = gvk_from_type_meta(&TypeMeta {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
        });
        assert_eq!(core.group, "");
        assert_eq!(core.kind, "ConfigMap");
    }

    #[test]
    fn test_parse_documents() {
        let manifest = r#"---
# Source: cm.yaml
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  banner: "---"
---
# only a comment
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: prod
"#;
        let objects = parse_documents(manifest).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].metadata.name.as_deref(), Some("settings"));
        assert_eq!(objects[1].types.as_ref().unwrap().kind, "Deployment");
        assert_eq!(objects[1].metadata.namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn test_parse_documents_requires_name() {
        let err = parse_documents("apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n").unwrap_err();
        assert!(err.to_string().contains("missing metadata.name"));
    }

    #[test]
    fn test_parse_documents_requires_kind() {
        assert!(parse_documents("metadata:\n  name: x\n").is_err());
    }

    #[test]
    fn test_operation_summary() {
        let mut summary = OperationSummary::default();
        assert_eq!(summary.summary(), "No resources processed");

        summary.succeeded.push("ConfigMap/a".to_string());
        summary.skipped.push(("Secret/b".to_string(), "not found".to_string()));
        assert!(summary.is_success());
        assert_eq!(summary.summary(), "1 succeeded, 1 skipped");
        assert!(summary.clone().into_result("apply").is_ok());

        summary
            .failed
            .push(("default/Service/c".to_string(), "forbidden".to_string()));
        let err = summary.into_result("apply").unwrap_err();
        assert!(err.to_string().contains("failed to apply default/Service/c: forbidden"));
    }
}
