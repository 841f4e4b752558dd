// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Line-oriented `key=value` codec shared by all probe outputs.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Handling of double quotes surrounding keys and values.
///
/// Two readers exist on purpose: probes reading OS/JVM release descriptors
/// strip quotes (`VERSION_ID="9.4"` means `9.4`), while the aggregator reads
/// probe output files as written, without interpretation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Quotes {
    Preserve,
    Strip,
}

/// Reads a properties file into a map.
///
/// Returns `None` if the file does not exist or cannot be read; filesystem
/// errors are never surfaced to the caller. Blank lines and lines starting
/// with `#` are ignored, a line with no `=` is dropped, and duplicate keys
/// keep the last value.
pub fn read<P: AsRef<Path>>(path: P, quotes: Quotes) -> Option<HashMap<String, String>> {
    let content = fs::read_to_string(path).ok()?;

    let mut entries = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let (mut key, mut value) = (key.trim(), value.trim());
        if quotes == Quotes::Strip {
            key = key.trim_matches('"');
            value = value.trim_matches('"');
        }
        entries.insert(key.to_string(), value.to_string());
    }

    Some(entries)
}

/// Writes a properties file to `dir/file_name`, overwriting any previous
/// content. Keys are emitted in ascending order so output is deterministic.
pub fn write(dir: &Path, file_name: &str, entries: &HashMap<String, String>) -> io::Result<()> {
    let mut keys: Vec<_> = entries.keys().collect();
    keys.sort();

    let mut content = String::new();
    for key in keys {
        if let Some(value) = entries.get(key) {
            content.push_str(key);
            content.push('=');
            content.push_str(value);
            content.push('\n');
        }
    }

    fs::write(dir.join(file_name), content)
}
