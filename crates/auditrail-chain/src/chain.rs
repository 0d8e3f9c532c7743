//! Hash engines and the entry signer.
//!
//! Hash input layout (bytes, in order):
//!   1. canonical JSON of the event without `hash` and `signature`
//!   2. `prev_hash` as UTF-8 bytes (empty for the first event)
//!
//! `Sha256HashEngine` is the default.  `ChecksumHashEngine` exists for
//! environments that cannot afford SHA-256; it detects accidental
//! corruption but not deliberate forgery, and every report built from it
//! says so.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use auditrail_contracts::{
    config::HashMode,
    error::{AuditError, AuditResult},
};
use auditrail_core::traits::{EntrySigner, HashEngine};

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 over the canonical event bytes.  Lowercase 64-char hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256HashEngine;

impl HashEngine for Sha256HashEngine {
    fn mode(&self) -> HashMode {
        HashMode::Sha256
    }

    fn digest(&self, input: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input);
        hex::encode(hasher.finalize())
    }
}

/// FNV-1a 64-bit rolling checksum.  Lowercase 16-char hex.
///
/// Not collision resistant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumHashEngine;

impl ChecksumHashEngine {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
}

impl HashEngine for ChecksumHashEngine {
    fn mode(&self) -> HashMode {
        HashMode::Checksum
    }

    fn digest(&self, input: &[u8]) -> String {
        let checksum = input.iter().fold(Self::OFFSET_BASIS, |acc, byte| {
            (acc ^ u64::from(*byte)).wrapping_mul(Self::PRIME)
        });
        format!("{:016x}", checksum)
    }
}

/// Engine for `mode`, or `None` when tamper detection is disabled.
pub fn engine_for(mode: HashMode) -> Option<Box<dyn HashEngine>> {
    match mode {
        HashMode::Sha256 => Some(Box::new(Sha256HashEngine)),
        HashMode::Checksum => Some(Box::new(ChecksumHashEngine)),
        HashMode::Disabled => None,
    }
}

/// HMAC-SHA256 signatures over event hashes.
#[derive(Clone)]
pub struct HmacSigner {
    mac: HmacSha256,
}

impl HmacSigner {
    /// # Errors
    ///
    /// `AuditError::Config` if the key is rejected.
    pub fn new(key: impl AsRef<[u8]>) -> AuditResult<Self> {
        let mac = HmacSha256::new_from_slice(key.as_ref()).map_err(|e| AuditError::Config {
            reason: format!("invalid signing key: {}", e),
        })?;
        Ok(Self { mac })
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl EntrySigner for HmacSigner {
    fn sign(&self, hash: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(hash.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, hash: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(hash.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}
