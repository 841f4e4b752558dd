// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use log::debug;

use crate::probe::{Fingerprint, Probe, ProbeContext};
use crate::properties::{self, Quotes};

/// Identifies the JVM running a `java` process from the `release` descriptor
/// shipped at the root of every JDK/JRE installation.
pub struct JavaRuntime;

impl Probe for JavaRuntime {
    fn name(&self) -> &'static str {
        "java-runtime"
    }

    fn detect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Fingerprint>> {
        if !ctx.is_java() {
            return Ok(Vec::new());
        }

        let Some(java_home) = find_java_home(ctx) else {
            bail!("process {} has no resolvable java home", ctx.process_name);
        };
        debug!("java home resolved to {}", java_home.display());

        let mut entries = HashMap::new();
        entries.insert("runtime-kind".to_string(), "Java".to_string());

        if let Some(release) = properties::read(java_home.join("release"), Quotes::Strip) {
            if let Some(version) = release.get("JAVA_VERSION") {
                entries.insert("runtime-kind-version".to_string(), version.clone());
            }
            if let Some(implementor) = release.get("IMPLEMENTOR") {
                entries.insert("runtime-kind-implementer".to_string(), implementor.clone());
            }
        }

        Ok(vec![Fingerprint::runtime_kind(entries)])
    }
}

/// `JAVA_HOME` when set and non-empty, otherwise the grandparent directory of
/// the `java` binary found on the process `PATH` (symlinks followed, so
/// `/usr/bin/java -> /opt/jdk/bin/java` yields `/opt/jdk`).
fn find_java_home(ctx: &ProbeContext<'_>) -> Option<PathBuf> {
    if let Some(java_home) = ctx.env_var("JAVA_HOME")
        && !java_home.is_empty()
    {
        return Some(PathBuf::from(java_home));
    }

    let path_var = ctx.env_var("PATH")?;
    for dir in path_var.split(':') {
        let candidate = Path::new(dir).join("java");
        if candidate.is_file() {
            let java_bin = resolve_links(candidate);
            return Some(java_bin.parent()?.parent()?.to_path_buf());
        }
    }
    None
}

/// Follows symlinks until a regular file is reached. Relative link targets
/// are resolved against the link's own directory.
fn resolve_links(mut path: PathBuf) -> PathBuf {
    while let Ok(target) = fs::read_link(&path) {
        path = if target.is_absolute() {
            target
        } else {
            match path.parent() {
                Some(parent) => parent.join(target),
                None => target,
            }
        };
    }
    path
}
