//! Software crypto engine for the simulator and tests.

use acr_contract::SIGNATURE_LEN;
use ed25519_dalek::{Signature, VerifyingKey};

use super::{CryptoEngine, Digest, KeySlot, SecretSlot, Tag, Verdict};
use crate::errors::{AcrError, Poll, Result};

const KEY_SLOTS: usize = 4;

/// Software crypto engine: ed25519 signatures, blake3 digests and keyed-hash MACs.
pub struct SoftCrypto {
    production: [Option<VerifyingKey>; KEY_SLOTS],
    debug: [Option<VerifyingKey>; KEY_SLOTS],
    handoff_secret: [u8; 32],
    rng_state: u32,
    trng_failed: bool,
}

impl SoftCrypto {
    pub fn new(handoff_secret: [u8; 32], seed: u32) -> Self {
        Self {
            production: [None; KEY_SLOTS],
            debug: [None; KEY_SLOTS],
            handoff_secret,
            rng_state: seed | 1,
            trng_failed: false,
        }
    }

    pub fn with_key(mut self, slot: KeySlot, key: VerifyingKey) -> Self {
        match slot {
            KeySlot::Production(index) => self.production[index as usize % KEY_SLOTS] = Some(key),
            KeySlot::Debug(index) => self.debug[index as usize % KEY_SLOTS] = Some(key),
        }
        self
    }

    /// Make every later `random_word` call time out.
    pub fn fail_trng(&mut self) {
        self.trng_failed = true;
    }

    fn key(&self, slot: KeySlot) -> Option<&VerifyingKey> {
        match slot {
            KeySlot::Production(index) => self.production.get(index as usize)?.as_ref(),
            KeySlot::Debug(index) => self.debug.get(index as usize)?.as_ref(),
        }
    }
}

impl CryptoEngine for SoftCrypto {
    fn verify_signature(
        &mut self,
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
        key: KeySlot,
    ) -> Verdict {
        let Some(key) = self.key(key) else {
            return Verdict::Invalid;
        };
        let signature = Signature::from_bytes(signature);
        match key.verify_strict(message, &signature) {
            Ok(()) => Verdict::Valid,
            Err(_) => Verdict::Invalid,
        }
    }

    fn hash(&mut self, data: &[u8]) -> Digest {
        *blake3::hash(data).as_bytes()
    }

    fn hmac(&mut self, key: SecretSlot, data: &[u8]) -> Tag {
        match key {
            SecretSlot::Handoff => *blake3::keyed_hash(&self.handoff_secret, data).as_bytes(),
        }
    }

    fn random_word(&mut self) -> Result<u32> {
        if self.trng_failed {
            return Err(AcrError::HardwareTimeout(Poll::Trng));
        }
        // xorshift32; stands in for the SCP TRNG
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        Ok(x)
    }
}
