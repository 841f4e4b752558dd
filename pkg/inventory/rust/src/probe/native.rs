// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::Result;
use elf::ElfStream;
use elf::abi::{PF_W, PF_X, PT_LOAD};
use elf::endian::AnyEndian;
use memchr::memmem;

use crate::probe::{Fingerprint, Probe, ProbeContext};

/// Classifies compiled binaries: Go executables through their embedded build
/// info, GraalVM native images through the `.svm_heap` section, plus a raw
/// string scan for the Quarkus marker inside native images.
///
/// Only runs for processes no other probe claims. Any failure opening or
/// parsing the ELF structure counts as non-detection.
pub struct NativeExecutable;

impl Probe for NativeExecutable {
    fn name(&self) -> &'static str {
        "native-executable"
    }

    fn detect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Fingerprint>> {
        if ctx.is_java() || ctx.rules.executable_kind(&ctx.process_name).is_some() {
            return Ok(Vec::new());
        }
        let Some(executable) = ctx.executable() else {
            return Ok(Vec::new());
        };

        let path = ctx.resolve(executable);
        Ok(classify(&path).unwrap_or_default())
    }
}

fn classify(path: &Path) -> Option<Vec<Fingerprint>> {
    if !has_elf_magic(path) {
        return None;
    }

    let mut elf_file = File::open(path).ok()?;
    let mut elf = ElfStream::<AnyEndian, _>::open_stream(&mut elf_file).ok()?;

    // Go build info takes priority over the native-image heuristics.
    if let Some(version) = go_build_version(path, &mut elf)
        && !version.is_empty()
    {
        let mut entries = HashMap::new();
        entries.insert("runtime-kind".to_string(), "Golang".to_string());
        entries.insert("runtime-kind-version".to_string(), version);
        return Some(vec![Fingerprint::runtime_kind(entries)]);
    }

    // GraalVM native images carry their heap in a dedicated section.
    elf.section_header_by_name(".svm_heap").ok()??;

    let mut entries = HashMap::new();
    entries.insert("runtime-kind".to_string(), "GraalVM".to_string());
    let mut fingerprints = vec![Fingerprint::runtime_kind(entries)];

    let file = File::open(path).ok()?;
    if contains_marker(BufReader::new(file), b"quarkus.native", 14) {
        let mut entries = HashMap::new();
        entries.insert("Quarkus".to_string(), String::new());
        fingerprints.push(Fingerprint::framework("quarkus", entries));
    }

    Some(fingerprints)
}

fn has_elf_magic(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).is_ok() && &magic == b"\x7fELF"
}

const BUILD_INFO_MAGIC: &[u8] = b"\xff Go buildinf:";
const BUILD_INFO_SIZE: usize = 32;
const BUILD_INFO_ALIGN: usize = 16;
// Strings are stored inline after the header since Go 1.18; the older
// pointer-indirected layout is not decoded.
const FLAG_INLINE_STRINGS: u8 = 0x2;

/// Extracts the Go toolchain version embedded by the Go linker, following
/// the layout of Go's `debug/buildinfo` package: the `.go.buildinfo` section
/// when present, otherwise a scan near the start of the first writable,
/// non-executable load segment.
fn go_build_version<S>(path: &Path, elf: &mut ElfStream<AnyEndian, S>) -> Option<String>
where
    S: Read + Seek,
{
    const ELF_READ_LIMIT: usize = 64 * 1024; // 64KiB

    if let Some(shdr) = elf.section_header_by_name(".go.buildinfo").ok()? {
        let shdr = *shdr;
        let (data, _) = elf.section_data(&shdr).ok()?;
        return parse_build_info(data);
    }

    let data_phdr = elf
        .segments()
        .iter()
        .find(|e| e.p_type == PT_LOAD && e.p_flags & (PF_X | PF_W) == PF_W)?;

    let read_size = std::cmp::min(usize::try_from(data_phdr.p_filesz).ok()?, ELF_READ_LIMIT);
    let mut segment_buffer = vec![0u8; read_size];

    // Reopen the file for the manual read; the stream belongs to the parser.
    let mut file = File::open(path).ok()?;
    file.seek(SeekFrom::Start(data_phdr.p_offset)).ok()?;
    file.read_exact(&mut segment_buffer).ok()?;

    // The magic is 16-byte aligned within the segment.
    let mut data = segment_buffer.as_slice();
    let finder = memmem::Finder::new(BUILD_INFO_MAGIC);
    loop {
        let i = finder.find(data)?;
        if data.len() - i < BUILD_INFO_SIZE {
            return None;
        }
        if i % BUILD_INFO_ALIGN == 0 {
            return parse_build_info(data.get(i..)?);
        }
        data = data.get((i + BUILD_INFO_ALIGN - 1) & !(BUILD_INFO_ALIGN - 1)..)?;
    }
}

/// Decodes a build-info blob starting at the magic: 14 magic bytes, pointer
/// size, flags, then (with inline strings) a uvarint-length-prefixed version
/// string at offset 32.
fn parse_build_info(data: &[u8]) -> Option<String> {
    if !data.starts_with(BUILD_INFO_MAGIC) {
        return None;
    }
    let flags = *data.get(15)?;
    if flags & FLAG_INLINE_STRINGS == 0 {
        return None;
    }

    let rest = data.get(BUILD_INFO_SIZE..)?;
    let (len, prefix) = read_uvarint(rest)?;
    let bytes = rest.get(prefix..prefix.checked_add(usize::try_from(len).ok()?)?)?;
    Some(String::from_utf8_lossy(bytes).to_string())
}

/// Little-endian base-128 varint, as emitted by Go's `binary.PutUvarint`.
fn read_uvarint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
    }
    None
}

/// Scans the byte stream for maximal printable runs of at least `min_run`
/// bytes and reports whether any such run contains `marker`. Printable means
/// the byte-oriented Latin-1 alphabet; bytes 0xFF and beyond the single-byte
/// range never qualify.
fn contains_marker<R: Read>(reader: R, marker: &[u8], min_run: usize) -> bool {
    // keep the run buffer bounded; carry a marker-sized tail across flushes
    const FLUSH_THRESHOLD: usize = 4096;

    let finder = memmem::Finder::new(marker);
    let mut run: Vec<u8> = Vec::new();
    let mut run_len = 0usize;

    for byte in reader.bytes() {
        let Ok(byte) = byte else {
            break;
        };

        if is_printable(byte) {
            run.push(byte);
            run_len += 1;
            if run.len() >= FLUSH_THRESHOLD {
                if run_len >= min_run && finder.find(&run).is_some() {
                    return true;
                }
                let tail_start = run.len().saturating_sub(marker.len().saturating_sub(1));
                run.drain(..tail_start);
            }
        } else {
            if run_len >= min_run && finder.find(&run).is_some() {
                return true;
            }
            run.clear();
            run_len = 0;
        }
    }

    run_len >= min_run && finder.find(&run).is_some()
}

fn is_printable(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E | 0xA1..=0xFE) && byte != 0xAD
}
