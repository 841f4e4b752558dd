// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::BTreeMap;

use serde::Serialize;

/// Namespace -> pod name -> container ID -> runtime info. BTreeMap keeps the
/// hierarchy ordered so serialized reports are stable.
pub type NodeRuntimeInfo = BTreeMap<String, NamespaceRuntimeInfo>;
pub type NamespaceRuntimeInfo = BTreeMap<String, PodRuntimeInfo>;
pub type PodRuntimeInfo = BTreeMap<String, ContainerRuntimeInfo>;

/// Runtime facts detected for a single container. Every field is optional;
/// absence means "not detected", never an error.
#[derive(Debug, Default, Eq, PartialEq, Serialize)]
pub struct ContainerRuntimeInfo {
    #[serde(rename = "os-release-id", skip_serializing_if = "Option::is_none")]
    pub os_id: Option<String>,

    #[serde(
        rename = "os-release-version-id",
        skip_serializing_if = "Option::is_none"
    )]
    pub os_version_id: Option<String>,

    #[serde(rename = "runtime-kind", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(
        rename = "runtime-kind-version",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind_version: Option<String>,

    #[serde(
        rename = "runtime-kind-implementer",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind_implementer: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub runtimes: Vec<RuntimeComponent>,
}

/// A higher-level framework detected in the container, with an optional
/// version.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct RuntimeComponent {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_omitted() {
        let info = ContainerRuntimeInfo::default();
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_serialized_field_names() {
        let info = ContainerRuntimeInfo {
            os_id: Some("rhel".to_string()),
            os_version_id: Some("9.4".to_string()),
            kind: Some("GraalVM".to_string()),
            kind_version: None,
            kind_implementer: None,
            runtimes: vec![RuntimeComponent {
                name: "Quarkus".to_string(),
                version: String::new(),
            }],
        };

        let json: serde_json::Value = serde_json::to_value(&info).unwrap();
        assert_eq!(json["os-release-id"], "rhel");
        assert_eq!(json["os-release-version-id"], "9.4");
        assert_eq!(json["runtime-kind"], "GraalVM");
        assert!(json.get("runtime-kind-version").is_none());
        assert_eq!(json["runtimes"][0]["name"], "Quarkus");
        // empty versions are dropped from the serialized component
        assert!(json["runtimes"][0].get("version").is_none());
    }

    #[test]
    fn test_hierarchy_is_ordered() {
        let mut report = NodeRuntimeInfo::new();
        for namespace in ["zeta", "alpha", "mid"] {
            report.entry(namespace.to_string()).or_default();
        }

        let keys: Vec<_> = report.keys().cloned().collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }
}
