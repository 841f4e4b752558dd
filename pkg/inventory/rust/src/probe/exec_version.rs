// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::HashMap;
use std::process::Command;

use anyhow::Result;
use log::debug;

use crate::probe::{Fingerprint, Probe, ProbeContext};

/// Detects interpreters and runtimes that report their version through a
/// `--version` invocation, driven by the `version-executables` rules.
pub struct ExecutableVersion;

impl Probe for ExecutableVersion {
    fn name(&self) -> &'static str {
        "executable-version"
    }

    fn detect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Fingerprint>> {
        let Some(kind) = ctx.rules.executable_kind(&ctx.process_name) else {
            return Ok(Vec::new());
        };
        let Some(executable) = ctx.executable() else {
            return Ok(Vec::new());
        };

        let path = ctx.resolve(executable);
        let output = match Command::new(&path).arg("--version").output() {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                debug!(
                    "{} --version exited with {}",
                    path.display(),
                    output.status
                );
                return Ok(Vec::new());
            }
            Err(e) => {
                // the executable may have been removed since the process started
                debug!("could not run {} --version: {e}", path.display());
                return Ok(Vec::new());
            }
        };

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();

        let mut entries = HashMap::new();
        entries.insert("runtime-kind".to_string(), kind.to_string());
        entries.insert("runtime-kind-version".to_string(), version);

        Ok(vec![Fingerprint::runtime_kind(entries)])
    }
}
