// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Aggregates per-container probe output into a single hierarchical report.
//!
//! Each request triggers one extraction over a one-shot TCP handshake: the
//! trigger answers with the path of a directory holding one subdirectory per
//! container, which is read, optionally anonymized, and deleted.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use crate::anonymize;
use crate::probe::{CONTAINER_INFO_FILE, FINGERPRINTS_SUFFIX, OS_FILE, RUNTIME_KIND_FILE};
use crate::properties::{self, Quotes};
use crate::report::{ContainerRuntimeInfo, NodeRuntimeInfo, RuntimeComponent};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to trigger extraction at {address}: {source}")]
    Trigger {
        address: String,
        source: std::io::Error,
    },

    #[error("extraction trigger returned an empty data path")]
    EmptyDataPath,

    #[error("extraction data directory {0} does not exist")]
    MissingDataDir(PathBuf),

    #[error("failed to read extraction directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize runtime info report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Runs one full gather cycle: trigger an extraction, collect the report
/// from the returned directory, delete the directory, serialize.
pub async fn gather_runtime_info(
    trigger_address: &str,
    hash: bool,
) -> Result<Vec<u8>, ExportError> {
    let data_path = trigger_extraction(trigger_address).await?;
    debug!("extraction data at {}", data_path.display());

    if !data_path.is_dir() {
        return Err(ExportError::MissingDataDir(data_path));
    }

    let report = collect_report(&data_path, hash);

    // extraction artifacts never persist across requests
    if let Err(e) = fs::remove_dir_all(&data_path) {
        warn!(
            "failed to remove extraction directory {}: {e}",
            data_path.display()
        );
    }

    Ok(serde_json::to_vec(&report?)?)
}

/// Opens a one-shot connection to the extraction trigger. The connection
/// itself is the signal; the trigger answers with a single line holding the
/// extraction directory path.
async fn trigger_extraction(address: &str) -> Result<PathBuf, ExportError> {
    let trigger = |source| ExportError::Trigger {
        address: address.to_string(),
        source,
    };

    let stream = TcpStream::connect(address).await.map_err(trigger)?;

    let mut line = String::new();
    BufReader::new(stream)
        .read_line(&mut line)
        .await
        .map_err(trigger)?;

    let path = line.trim();
    if path.is_empty() {
        return Err(ExportError::EmptyDataPath);
    }
    Ok(PathBuf::from(path))
}

/// Builds the namespace/pod/container report from one extraction directory,
/// one subdirectory per container. Subdirectories without a container-info
/// file cannot be placed in the hierarchy and are skipped.
pub fn collect_report(data_path: &Path, hash: bool) -> Result<NodeRuntimeInfo, ExportError> {
    let read_dir = |path: &Path| {
        fs::read_dir(path).map_err(|source| ExportError::ReadDir {
            path: path.to_path_buf(),
            source,
        })
    };

    let mut report = NodeRuntimeInfo::new();

    for entry in read_dir(data_path)? {
        let entry = entry.map_err(|source| ExportError::ReadDir {
            path: data_path.to_path_buf(),
            source,
        })?;
        let container_dir = entry.path();
        if !container_dir.is_dir() {
            continue;
        }

        let Some(container_info) =
            properties::read(container_dir.join(CONTAINER_INFO_FILE), Quotes::Preserve)
        else {
            debug!(
                "skipping {}: no {CONTAINER_INFO_FILE}",
                container_dir.display()
            );
            continue;
        };

        let field = |key: &str| container_info.get(key).cloned().unwrap_or_default();
        let namespace = field("pod-namespace");
        let pod_name = field("pod-name");
        let container_id = field("container-id");

        let info = collect_container_info(&container_dir, hash, &read_dir)?;

        report
            .entry(namespace)
            .or_default()
            .entry(pod_name)
            .or_default()
            .insert(container_id, info);
    }

    Ok(report)
}

fn collect_container_info(
    container_dir: &Path,
    hash: bool,
    read_dir: &impl Fn(&Path) -> Result<fs::ReadDir, ExportError>,
) -> Result<ContainerRuntimeInfo, ExportError> {
    let mut info = ContainerRuntimeInfo::default();

    if let Some(os) = properties::read(container_dir.join(OS_FILE), Quotes::Preserve) {
        info.os_id = hashed(hash, os.get("os-release-id"));
        info.os_version_id = hashed(hash, os.get("os-release-version-id"));
    }

    if let Some(kind) = properties::read(container_dir.join(RUNTIME_KIND_FILE), Quotes::Preserve) {
        info.kind = hashed(hash, kind.get("runtime-kind"));
        info.kind_version = hashed(hash, kind.get("runtime-kind-version"));
        info.kind_implementer = hashed(hash, kind.get("runtime-kind-implementer"));
    }

    // deterministic report: fingerprint files and their entries both sorted
    let mut fingerprint_files = Vec::new();
    for entry in read_dir(container_dir)? {
        let entry = entry.map_err(|source| ExportError::ReadDir {
            path: container_dir.to_path_buf(),
            source,
        })?;
        if entry.file_name().to_string_lossy().ends_with(FINGERPRINTS_SUFFIX) {
            fingerprint_files.push(entry.path());
        }
    }
    fingerprint_files.sort();

    for file in fingerprint_files {
        let Some(fingerprints) = properties::read(&file, Quotes::Preserve) else {
            continue;
        };
        let mut pairs: Vec<_> = fingerprints.into_iter().collect();
        pairs.sort();
        for (name, version) in pairs {
            info.runtimes.push(RuntimeComponent {
                name: anonymize(hash, &name),
                version: anonymize(hash, &version),
            });
        }
    }

    Ok(info)
}

/// Anonymizes a value that may be absent; absent fields stay absent instead
/// of turning into a digest of the empty string.
fn hashed(hash: bool, value: Option<&String>) -> Option<String> {
    value.map(|v| anonymize(hash, v))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write_container_dir(
        root: &Path,
        name: &str,
        files: &[(&str, &str)],
    ) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (file_name, content) in files {
            fs::write(dir.join(file_name), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_collect_os_only_container() {
        let data = tempfile::tempdir().unwrap();
        write_container_dir(
            data.path(),
            "container-1",
            &[
                (
                    CONTAINER_INFO_FILE,
                    "pod-namespace=ns1\npod-name=p1\ncontainer-id=c1\n",
                ),
                (OS_FILE, "os-release-id=rhel\nos-release-version-id=9.4\n"),
            ],
        );

        let report = collect_report(data.path(), false).unwrap();
        let info = report.get("ns1").unwrap().get("p1").unwrap().get("c1").unwrap();

        assert_eq!(info.os_id, Some("rhel".to_string()));
        assert_eq!(info.os_version_id, Some("9.4".to_string()));
        assert!(info.kind.is_none());
        assert!(info.runtimes.is_empty());
    }

    #[test]
    fn test_collect_hashes_values_but_not_structure() {
        let data = tempfile::tempdir().unwrap();
        write_container_dir(
            data.path(),
            "container-1",
            &[
                (
                    CONTAINER_INFO_FILE,
                    "pod-namespace=ns1\npod-name=p1\ncontainer-id=c1\n",
                ),
                (OS_FILE, "os-release-id=rhel\n"),
            ],
        );

        let report = collect_report(data.path(), true).unwrap();
        // the hierarchy keys stay readable, only detected values are hashed
        let info = report.get("ns1").unwrap().get("p1").unwrap().get("c1").unwrap();

        let os_id = info.os_id.as_ref().unwrap();
        assert_eq!(os_id.len(), 12);
        assert_ne!(os_id, "rhel");
        assert_eq!(os_id, &anonymize(true, "rhel"));
    }

    #[test]
    fn test_collect_merges_fingerprint_files() {
        let data = tempfile::tempdir().unwrap();
        write_container_dir(
            data.path(),
            "container-1",
            &[
                (
                    CONTAINER_INFO_FILE,
                    "pod-namespace=ns1\npod-name=p1\ncontainer-id=c1\n",
                ),
                (RUNTIME_KIND_FILE, "runtime-kind=Java\nruntime-kind-version=17.0.10\n"),
                ("java-runtimes-fingerprints.txt", "Spring Boot=3.2.4\n"),
                ("quarkus-fingerprints.txt", "Quarkus=\n"),
            ],
        );

        let report = collect_report(data.path(), false).unwrap();
        let info = report.get("ns1").unwrap().get("p1").unwrap().get("c1").unwrap();

        assert_eq!(info.kind, Some("Java".to_string()));
        assert_eq!(info.runtimes.len(), 2);
        // files are visited in sorted order
        assert_eq!(info.runtimes.first().unwrap().name, "Spring Boot");
        assert_eq!(info.runtimes.first().unwrap().version, "3.2.4");
        assert_eq!(info.runtimes.get(1).unwrap().name, "Quarkus");
        assert_eq!(info.runtimes.get(1).unwrap().version, "");
    }

    #[test]
    fn test_container_without_info_file_is_skipped() {
        let data = tempfile::tempdir().unwrap();
        write_container_dir(data.path(), "orphan", &[(OS_FILE, "os-release-id=rhel\n")]);
        write_container_dir(
            data.path(),
            "container-1",
            &[(
                CONTAINER_INFO_FILE,
                "pod-namespace=ns1\npod-name=p1\ncontainer-id=c1\n",
            )],
        );

        let report = collect_report(data.path(), false).unwrap();
        assert_eq!(report.len(), 1);
        assert!(report.contains_key("ns1"));
    }

    #[test]
    fn test_missing_data_dir_is_an_error() {
        let err = collect_report(Path::new("/nonexistent/extraction"), false).unwrap_err();
        assert!(matches!(err, ExportError::ReadDir { .. }));
    }

    #[test]
    fn test_multiple_containers_share_hierarchy() {
        let data = tempfile::tempdir().unwrap();
        write_container_dir(
            data.path(),
            "a",
            &[(
                CONTAINER_INFO_FILE,
                "pod-namespace=ns1\npod-name=p1\ncontainer-id=c1\n",
            )],
        );
        write_container_dir(
            data.path(),
            "b",
            &[(
                CONTAINER_INFO_FILE,
                "pod-namespace=ns1\npod-name=p1\ncontainer-id=c2\n",
            )],
        );

        let report = collect_report(data.path(), false).unwrap();
        assert_eq!(report.get("ns1").unwrap().get("p1").unwrap().len(), 2);
    }
}
