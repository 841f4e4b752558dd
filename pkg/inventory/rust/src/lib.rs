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

mod anonymize;
pub mod config;
mod exporter;
pub mod probe;
pub mod properties;
mod report;

// Re-export the public API
pub use anonymize::anonymize;
pub use config::RuleSet;
pub use exporter::{ExportError, collect_report, gather_runtime_info};
pub use probe::{Fingerprint, Probe, ProbeContext, run_probes};
pub use report::{ContainerRuntimeInfo, NodeRuntimeInfo, RuntimeComponent};
