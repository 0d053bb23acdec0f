// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document fingerprints: SHA-256 over the submitted bytes, so a report can be
// tied back to exactly the file that was analysed.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// First 12 hex digits, enough to tell documents apart in log lines.
pub fn short_id(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
