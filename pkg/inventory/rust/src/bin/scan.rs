// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

//! One-shot probe runner. The extraction trigger invokes this binary inside
//! a container's namespaces with a description of the container's main
//! process; every probe runs once and the fingerprint files land in the
//! output directory.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::debug;
use runtime_inventory::{ProbeContext, RuleSet, run_probes};

#[derive(Debug, Parser)]
#[command(name = "runtime-scan", version)]
struct Args {
    /// Path to the fingerprint rule configuration.
    #[arg(long)]
    rules: PathBuf,

    /// Directory the fingerprint files are written to.
    #[arg(long)]
    out: PathBuf,

    /// Filesystem root the probes operate under.
    #[arg(long, default_value = "/")]
    root: PathBuf,

    /// Working directory of the target process.
    #[arg(long, default_value = "/")]
    cwd: PathBuf,

    /// Process name; defaults to the basename of the command line.
    #[arg(long)]
    process_name: Option<String>,

    /// Environment of the target process, as repeated KEY=VALUE pairs.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Log level filter, overridable through RUST_LOG.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Command line of the target process.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    command_line: Vec<String>,
}

fn parse_env(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut env = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid --env value {pair:?}, expected KEY=VALUE");
        };
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}

fn process_name(args: &Args) -> String {
    if let Some(name) = &args.process_name {
        return name.clone();
    }
    args.command_line
        .first()
        .map(|exe| {
            PathBuf::from(exe)
                .file_name()
                .map_or_else(|| exe.clone(), |name| name.to_string_lossy().to_string())
        })
        .unwrap_or_default()
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let rules = RuleSet::load(&args.rules)?;
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create output directory {}", args.out.display()))?;

    let mut ctx = ProbeContext::new(&rules);
    ctx.root = args.root.clone();
    ctx.cwd = args.cwd.clone();
    ctx.process_name = process_name(&args);
    ctx.env = parse_env(&args.env)?;
    ctx.command_line = args.command_line.clone();

    debug!("scanning process {}", ctx.process_name);
    run_probes(&ctx, &args.out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(argv)
    }

    #[test]
    fn test_process_name_defaults_to_basename() {
        let args = args(&[
            "runtime-scan",
            "--rules",
            "rules.toml",
            "--out",
            "/tmp/out",
            "/usr/bin/node",
            "server.js",
        ]);
        assert_eq!(process_name(&args), "node");
    }

    #[test]
    fn test_explicit_process_name_wins() {
        let args = args(&[
            "runtime-scan",
            "--rules",
            "rules.toml",
            "--out",
            "/tmp/out",
            "--process-name",
            "java",
            "/opt/jdk/bin/java",
            "-jar",
            "app.jar",
        ]);
        assert_eq!(process_name(&args), "java");
    }

    #[test]
    fn test_parse_env_pairs() {
        let env = parse_env(&[
            "JAVA_HOME=/opt/jdk".to_string(),
            "PATH=/usr/bin:/bin".to_string(),
        ])
        .unwrap();
        assert_eq!(env.get("JAVA_HOME"), Some(&"/opt/jdk".to_string()));

        assert!(parse_env(&["NOVALUE".to_string()]).is_err());
    }
}
