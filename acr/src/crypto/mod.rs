//! Crypto collaborator interface.
//!
//! The orchestrator only sequences calls into a [`CryptoEngine`]; the engine
//! itself (SCP, SHA, AES, the signature verifier) lives outside this crate.
//! `SoftCrypto`, behind the `sim` feature, is a software stand-in used by the
//! simulator and tests.

use acr_contract::manifest::HEADER_LEN;
use acr_contract::{UcodeManifest, SIGNATURE_LEN};

use crate::errors::Result;

#[cfg(any(test, feature = "sim"))]
mod soft;
#[cfg(any(test, feature = "sim"))]
pub use soft::SoftCrypto;

pub type Digest = [u8; 32];
pub type Tag = [u8; 32];

/// Length of the block a ucode signature covers.
pub const SIGNED_BLOCK_LEN: usize = HEADER_LEN + 32;

/// Signature verification keys, selected by the manifest key index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    Production(u8),
    Debug(u8),
}

/// HMAC secrets held inside the crypto engine, never exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSlot {
    Handoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
}

pub trait CryptoEngine {
    fn verify_signature(
        &mut self,
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
        key: KeySlot,
    ) -> Verdict;
    fn hash(&mut self, data: &[u8]) -> Digest;
    fn hmac(&mut self, key: SecretSlot, data: &[u8]) -> Tag;
    fn random_word(&mut self) -> Result<u32>;
}

/// Build the block a ucode signature covers: manifest header, then payload digest.
pub fn signed_block(manifest: &UcodeManifest, payload_digest: &Digest, out: &mut [u8; SIGNED_BLOCK_LEN]) {
    out[..HEADER_LEN].copy_from_slice(&manifest.header_bytes());
    out[HEADER_LEN..].copy_from_slice(payload_digest);
}
