//! Challenge/salt-bound password proof.
//!
//! The producer proves knowledge of the shared password without sending it:
//!
//! ```text
//! intermediate = base64(sha256(password + salt))
//! proof        = base64(sha256(intermediate + challenge))
//! ```
//!
//! Both digests use standard base64 with padding. The exact byte layout is
//! fixed by the producer implementation and must not change.

use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::constants::NONCE_BYTES;

fn digest_b64(first: &str, second: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Compute the proof a producer must present for this salt and challenge.
pub fn compute_proof(password: &str, salt: &str, challenge: &str) -> String {
    let intermediate = digest_b64(password, salt);
    digest_b64(&intermediate, challenge)
}

/// Check a candidate proof against the expected one in constant time.
pub fn verify_proof(candidate: &str, password: &str, salt: &str, challenge: &str) -> bool {
    let expected = compute_proof(password, salt, challenge);
    constant_time_eq(candidate.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Fresh random nonce for a challenge or salt, as lowercase hex.
pub fn random_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(NONCE_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
