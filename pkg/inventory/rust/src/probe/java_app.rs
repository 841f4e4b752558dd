// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use zip::ZipArchive;

use crate::config::JavaRule;
use crate::probe::{Fingerprint, Probe, ProbeContext};

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Identifies the Java application framework behind a `java -jar` invocation
/// by matching the executable jar's `Main-Class` against the java rules, then
/// reading the framework version from the manifest the rule points at.
pub struct JavaApplication;

impl Probe for JavaApplication {
    fn name(&self) -> &'static str {
        "java-application"
    }

    fn detect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Fingerprint>> {
        if !ctx.is_java() {
            return Ok(Vec::new());
        }
        let Some(jar_arg) = executable_jar(&ctx.command_line) else {
            return Ok(Vec::new());
        };

        let jar_path = ctx.resolve(jar_arg);
        let manifest = read_manifest(&jar_path)
            .with_context(|| format!("failed to read manifest of {}", jar_path.display()))?;

        let Some(main_class) = manifest.get("Main-Class") else {
            return Ok(Vec::new());
        };
        let Some(rule) = ctx.rules.java_rule(main_class) else {
            debug!("no java rule for main class {main_class}");
            return Ok(Vec::new());
        };

        let version = if rule.read_manifest_of_executable_jar {
            manifest.get(&rule.jar_version_manifest_entry).cloned()
        } else {
            version_from_class_path(&jar_path, &manifest, rule)?
        };

        let Some(version) = version else {
            debug!(
                "manifest entry {} not found for {}",
                rule.jar_version_manifest_entry, rule.runtime_name
            );
            return Ok(Vec::new());
        };

        let mut entries = HashMap::new();
        entries.insert(rule.runtime_name.clone(), version);

        Ok(vec![Fingerprint::framework("java-runtimes", entries)])
    }
}

/// The argument following `-jar`, if any.
fn executable_jar(command_line: &[String]) -> Option<&str> {
    let mut args = command_line.iter();
    args.find(|arg| *arg == "-jar")?;
    args.next().map(String::as_str)
}

/// Walks the executable jar's `Class-Path`, finds the jar that carries the
/// rule's main class and reads the version entry from that jar's manifest.
fn version_from_class_path(
    jar_path: &Path,
    manifest: &HashMap<String, String>,
    rule: &JavaRule,
) -> Result<Option<String>> {
    let Some(class_path) = manifest.get("Class-Path") else {
        return Ok(None);
    };
    // Class-Path entries are relative to the jar that declares them
    let base_dir = jar_path.parent().unwrap_or(Path::new(""));

    let class_entry = format!("{}.class", rule.main_class.replace('.', "/"));

    for entry in class_path.split(' ').filter(|e| !e.is_empty()) {
        let entry_path = base_dir.join(entry);
        if !jar_contains(&entry_path, &class_entry) {
            continue;
        }
        let manifest = read_manifest(&entry_path)
            .with_context(|| format!("failed to read manifest of {}", entry_path.display()))?;
        return Ok(manifest.get(&rule.jar_version_manifest_entry).cloned());
    }

    Ok(None)
}

/// True when the jar at `path` contains the entry `name`. Unreadable or
/// missing jars count as not containing it.
fn jar_contains(path: &Path, name: &str) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let Ok(mut archive) = ZipArchive::new(file) else {
        return false;
    };
    archive.by_name(name).is_ok()
}

fn read_manifest(jar_path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(jar_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut entry = archive.by_name(MANIFEST_PATH)?;

    let mut content = String::new();
    entry.read_to_string(&mut content)?;

    Ok(parse_manifest(&content))
}

/// Parses a jar manifest. Entries are `Name: value` lines; a line starting
/// with a single space continues the previous entry's value.
fn parse_manifest(content: &str) -> HashMap<String, String> {
    let mut entries: HashMap<String, String> = HashMap::new();
    let mut last_key: Option<String> = None;

    for line in content.lines() {
        if let Some(continuation) = line.strip_prefix(' ') {
            if let Some(key) = &last_key
                && let Some(value) = entries.get_mut(key)
            {
                value.push_str(continuation);
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(": ") {
            entries.insert(key.to_string(), value.to_string());
            last_key = Some(key.to_string());
        }
    }

    entries
}
