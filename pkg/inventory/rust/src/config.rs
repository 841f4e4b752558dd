// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Declarative fingerprint rules, loaded once per extraction and passed
//! explicitly into probes so they stay independently testable.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub fingerprints: Fingerprints,
}

#[derive(Debug, Default, Deserialize)]
pub struct Fingerprints {
    #[serde(rename = "version-executables", default)]
    pub version_executables: Vec<ExecutableKindRule>,

    #[serde(default)]
    pub java: Vec<JavaRule>,
}

/// Maps process names onto a runtime-kind label for executables that report
/// their version through a `--version` invocation.
#[derive(Debug, Deserialize)]
pub struct ExecutableKindRule {
    #[serde(rename = "process-names")]
    pub process_names: Vec<String>,
    #[serde(rename = "runtime-kind-name")]
    pub runtime_kind_name: String,
}

/// Identifies a Java application framework by its `Main-Class` and declares
/// where its version lives.
#[derive(Debug, Deserialize)]
pub struct JavaRule {
    #[serde(rename = "runtime-name")]
    pub runtime_name: String,
    #[serde(rename = "main-class")]
    pub main_class: String,
    /// When true the version is read from the executable jar's own manifest;
    /// otherwise the jar holding the main class is located via `Class-Path`.
    #[serde(rename = "read-manifest-of-executable-jar")]
    pub read_manifest_of_executable_jar: bool,
    #[serde(rename = "jar-version-manifest-entry")]
    pub jar_version_manifest_entry: String,
}

impl RuleSet {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read fingerprint rules from {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse fingerprint rules")
    }

    /// Returns the runtime-kind label declared for `process_name`, if any.
    pub fn executable_kind(&self, process_name: &str) -> Option<&str> {
        self.fingerprints
            .version_executables
            .iter()
            .find(|rule| rule.process_names.iter().any(|name| name == process_name))
            .map(|rule| rule.runtime_kind_name.as_str())
    }

    /// Returns the Java application rule matching `main_class` exactly.
    pub fn java_rule(&self, main_class: &str) -> Option<&JavaRule> {
        self.fingerprints
            .java
            .iter()
            .find(|rule| rule.main_class == main_class)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RULES: &str = r#"
[[fingerprints.version-executables]]
process-names = ["node", "nodejs"]
runtime-kind-name = "Node.js"

[[fingerprints.version-executables]]
process-names = ["python", "python3"]
runtime-kind-name = "Python"

[[fingerprints.java]]
runtime-name = "Quarkus"
main-class = "io.quarkus.bootstrap.runner.QuarkusEntryPoint"
read-manifest-of-executable-jar = false
jar-version-manifest-entry = "Implementation-Version"

[[fingerprints.java]]
runtime-name = "Spring Boot"
main-class = "org.springframework.boot.loader.launch.JarLauncher"
read-manifest-of-executable-jar = true
jar-version-manifest-entry = "Spring-Boot-Version"
"#;

    #[test]
    fn test_parse_rules() {
        let rules = RuleSet::parse(RULES).unwrap();
        assert_eq!(rules.fingerprints.version_executables.len(), 2);
        assert_eq!(rules.fingerprints.java.len(), 2);
    }

    #[test]
    fn test_executable_kind_lookup() {
        let rules = RuleSet::parse(RULES).unwrap();
        assert_eq!(rules.executable_kind("node"), Some("Node.js"));
        assert_eq!(rules.executable_kind("nodejs"), Some("Node.js"));
        assert_eq!(rules.executable_kind("python3"), Some("Python"));
        assert_eq!(rules.executable_kind("ruby"), None);
    }

    #[test]
    fn test_java_rule_lookup() {
        let rules = RuleSet::parse(RULES).unwrap();

        let rule = rules
            .java_rule("io.quarkus.bootstrap.runner.QuarkusEntryPoint")
            .unwrap();
        assert_eq!(rule.runtime_name, "Quarkus");
        assert!(!rule.read_manifest_of_executable_jar);

        assert!(rules.java_rule("com.example.Main").is_none());
    }

    #[test]
    fn test_empty_document() {
        let rules = RuleSet::parse("").unwrap();
        assert!(rules.executable_kind("node").is_none());
        assert!(rules.java_rule("anything").is_none());
    }
}
