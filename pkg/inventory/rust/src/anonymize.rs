// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Length of the truncated digest. 12 base64 characters keep the collision
/// probability across 1 billion values around 0.0001.
const HASH_LEN: usize = 12;

/// Replaces `value` with a deterministic, truncated digest: SHA-256 over the
/// UTF-8 bytes, base64-URL-encoded without padding, first 12 characters.
/// With `enabled` false the value passes through unchanged.
pub fn anonymize(enabled: bool, value: &str) -> String {
    if !enabled {
        return value.to_string();
    }

    let digest = Sha256::digest(value.as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    // a SHA-256 digest always encodes to 43 characters
    encoded.get(..HASH_LEN).unwrap_or(&encoded).to_string()
}
