// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::HashMap;

use anyhow::Result;

use crate::probe::{Fingerprint, Probe, ProbeContext};
use crate::properties::{self, Quotes};

/// Identifies the container's operating system from `/etc/os-release`.
pub struct Os;

impl Probe for Os {
    fn name(&self) -> &'static str {
        "os"
    }

    fn detect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Fingerprint>> {
        let path = ctx.root.join("etc/os-release");
        let Some(release) = properties::read(path, Quotes::Strip) else {
            // scratch images carry no os-release at all
            return Ok(Vec::new());
        };

        let mut entries = HashMap::new();
        if let Some(id) = release.get("ID") {
            entries.insert("os-release-id".to_string(), id.clone());
        }
        if let Some(version_id) = release.get("VERSION_ID") {
            entries.insert("os-release-version-id".to_string(), version_id.clone());
        }

        Ok(vec![Fingerprint::os(entries)])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::RuleSet;
    use std::fs;

    fn context_with_root<'a>(rules: &'a RuleSet, root: &std::path::Path) -> ProbeContext<'a> {
        let mut ctx = ProbeContext::new(rules);
        ctx.root = root.to_path_buf();
        ctx
    }

    #[test]
    fn test_reads_id_and_version_id() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("etc")).unwrap();
        fs::write(
            dir.path().join("etc/os-release"),
            "NAME=\"Red Hat Enterprise Linux\"\nID=\"rhel\"\nVERSION_ID=\"9.4\"\n",
        )
        .unwrap();

        let rules = RuleSet::default();
        let ctx = context_with_root(&rules, dir.path());

        let fingerprints = Os.detect(&ctx).unwrap();
        assert_eq!(fingerprints.len(), 1);
        let entries = &fingerprints.first().unwrap().entries;
        assert_eq!(entries.get("os-release-id"), Some(&"rhel".to_string()));
        assert_eq!(
            entries.get("os-release-version-id"),
            Some(&"9.4".to_string())
        );
    }

    #[test]
    fn test_missing_version_id() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/os-release"), "ID=alpine\n").unwrap();

        let rules = RuleSet::default();
        let ctx = context_with_root(&rules, dir.path());

        let fingerprints = Os.detect(&ctx).unwrap();
        let entries = &fingerprints.first().unwrap().entries;
        assert_eq!(entries.get("os-release-id"), Some(&"alpine".to_string()));
        assert!(!entries.contains_key("os-release-version-id"));
    }

    #[test]
    fn test_absent_os_release_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let rules = RuleSet::default();
        let ctx = context_with_root(&rules, dir.path());

        assert!(Os.detect(&ctx).unwrap().is_empty());
    }
}
