// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Probes derive runtime facts from a container's filesystem or its main
//! executable and emit fingerprint records, written as properties files into
//! the per-container output directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error};

use crate::config::RuleSet;
use crate::properties;

pub mod exec_version;
pub mod java_app;
pub mod java_runtime;
pub mod native;
pub mod os;

/// Written by the extraction trigger; consumed by the aggregator.
pub const CONTAINER_INFO_FILE: &str = "container-info.txt";
pub const OS_FILE: &str = "os.txt";
pub const RUNTIME_KIND_FILE: &str = "runtime-kind.txt";
pub const FINGERPRINTS_SUFFIX: &str = "-fingerprints.txt";

/// One probe output file: a name and its `key=value` entries.
#[derive(Debug, Eq, PartialEq)]
pub struct Fingerprint {
    pub file_name: String,
    pub entries: HashMap<String, String>,
}

impl Fingerprint {
    pub fn os(entries: HashMap<String, String>) -> Self {
        Fingerprint {
            file_name: OS_FILE.to_string(),
            entries,
        }
    }

    pub fn runtime_kind(entries: HashMap<String, String>) -> Self {
        Fingerprint {
            file_name: RUNTIME_KIND_FILE.to_string(),
            entries,
        }
    }

    pub fn framework(prefix: &str, entries: HashMap<String, String>) -> Self {
        Fingerprint {
            file_name: format!("{prefix}{FINGERPRINTS_SUFFIX}"),
            entries,
        }
    }
}

/// Everything a probe may inspect: the fingerprint rules plus a description
/// of the target process and its filesystem. Built by the extraction trigger
/// (or the scan CLI) and passed by reference, never held as global state.
pub struct ProbeContext<'a> {
    pub rules: &'a RuleSet,
    /// Filesystem root the probes operate under. `/` in production since the
    /// probes run inside the container's mount namespace.
    pub root: PathBuf,
    /// Working directory of the target process, used to resolve relative
    /// paths from its command line.
    pub cwd: PathBuf,
    pub command_line: Vec<String>,
    pub process_name: String,
    pub env: HashMap<String, String>,
}

impl<'a> ProbeContext<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        ProbeContext {
            rules,
            root: PathBuf::from("/"),
            cwd: PathBuf::from("/"),
            command_line: Vec::new(),
            process_name: String::new(),
            env: HashMap::new(),
        }
    }

    /// First command-line token.
    pub fn executable(&self) -> Option<&str> {
        self.command_line.first().map(String::as_str)
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Resolves `path` against the process working directory when relative.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    pub(crate) fn is_java(&self) -> bool {
        self.process_name.ends_with("java")
    }
}

/// A probe inspects the context and returns zero or more fingerprint records.
///
/// An empty result is non-detection and always silent. An `Err` is an
/// operational failure and fatal for a one-shot probe run.
pub trait Probe {
    fn name(&self) -> &'static str;

    fn detect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Fingerprint>>;
}

fn probes() -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(os::Os),
        Box::new(exec_version::ExecutableVersion),
        Box::new(java_runtime::JavaRuntime),
        Box::new(java_app::JavaApplication),
        Box::new(native::NativeExecutable),
    ]
}

/// Runs every probe against `ctx` and writes each non-empty fingerprint into
/// `out_dir`. Probes are independent: all of them run even when one fails,
/// and the first failure is returned once the others have finished.
pub fn run_probes(ctx: &ProbeContext<'_>, out_dir: &Path) -> Result<()> {
    let mut first_err = None;

    for probe in probes() {
        match probe.detect(ctx) {
            Ok(fingerprints) => {
                for fingerprint in fingerprints {
                    if fingerprint.entries.is_empty() {
                        continue;
                    }
                    debug!(
                        "probe {} wrote {} entries to {}",
                        probe.name(),
                        fingerprint.entries.len(),
                        fingerprint.file_name
                    );
                    let written =
                        properties::write(out_dir, &fingerprint.file_name, &fingerprint.entries)
                            .with_context(|| {
                                format!("failed to write {}", fingerprint.file_name)
                            });
                    if let Err(e) = written {
                        error!("probe {}: {e:#}", probe.name());
                        first_err.get_or_insert(e);
                    }
                }
            }
            Err(e) => {
                error!("probe {} failed: {e:#}", probe.name());
                first_err.get_or_insert(e);
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
