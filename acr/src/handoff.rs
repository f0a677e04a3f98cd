//! Handoff between cooperating binaries through the secure scratch registers.
//!
//! The record word sits in one privilege-gated scratch register and its tag,
//! the leading four bytes of an HMAC under an engine-held secret, in the next.

use acr_contract::{BootPhase, HandoffRecord};
use subtle::ConstantTimeEq;

use crate::crypto::{CryptoEngine, SecretSlot};
use crate::errors::{AcrError, Result};
use crate::hal::{regs, Falcon};
use crate::scrub::Scratch;

/// One execution's view of the handoff registers: at most one read, at most one write.
#[derive(Debug, Default)]
pub struct HandoffChannel {
    checked: bool,
    written: bool,
}

impl HandoffChannel {
    pub const fn new() -> Self {
        Self {
            checked: false,
            written: false,
        }
    }

    /// Read the predecessor's record and require that `producer` completed.
    /// Absent, forged, failed or foreign records are all the same error.
    pub fn check<H: Falcon, C: CryptoEngine>(
        &mut self,
        hal: &mut H,
        crypto: &mut C,
        scratch: &mut Scratch,
        producer: BootPhase,
    ) -> Result<HandoffRecord> {
        if self.checked {
            return Err(AcrError::HandoffMissingOrMismatched);
        }
        self.checked = true;

        let word = hal.bar0_read(regs::SECURE_SCRATCH_HANDOFF)?;
        let stored_tag = hal.bar0_read(regs::SECURE_SCRATCH_HANDOFF_TAG)?;

        let expected_tag = seal(crypto, scratch, word);
        let tag_ok: bool = expected_tag.to_le_bytes().ct_eq(&stored_tag.to_le_bytes()).into();
        if !tag_ok {
            log::warn!("handoff tag mismatch");
            return Err(AcrError::HandoffMissingOrMismatched);
        }

        let record =
            HandoffRecord::from_word(word).map_err(|_| AcrError::HandoffMissingOrMismatched)?;
        if !record.is_completed_by(producer) {
            log::warn!("handoff record {:#010x} does not show {:?} completed", word, producer);
            return Err(AcrError::HandoffMissingOrMismatched);
        }
        Ok(record)
    }

    /// Publish this execution's record. Tag first, so a torn write never
    /// pairs a fresh word with a stale tag.
    pub fn write<H: Falcon, C: CryptoEngine>(
        &mut self,
        hal: &mut H,
        crypto: &mut C,
        scratch: &mut Scratch,
        record: HandoffRecord,
    ) -> Result<()> {
        if self.written {
            return Err(AcrError::HandoffMissingOrMismatched);
        }
        self.written = true;

        let word = record.to_word();
        let tag = seal(crypto, scratch, word);
        hal.bar0_write(regs::SECURE_SCRATCH_HANDOFF, 0)?;
        hal.bar0_write(regs::SECURE_SCRATCH_HANDOFF_TAG, tag)?;
        hal.bar0_write(regs::SECURE_SCRATCH_HANDOFF, word)?;
        Ok(())
    }
}

/// Paired binaries ship together: a record left by any other build is a mismatch.
pub fn require_build(record: &HandoffRecord, build_version: u32) -> Result<()> {
    if u32::from(record.version) != build_version {
        log::warn!(
            "handoff from build {} cannot pair with build {}",
            record.version,
            build_version
        );
        return Err(AcrError::HandoffMissingOrMismatched);
    }
    Ok(())
}

/// Tag for a record word, as stored in the tag register.
pub fn seal<C: CryptoEngine>(crypto: &mut C, scratch: &mut Scratch, word: u32) -> u32 {
    scratch.record = word.to_le_bytes();
    scratch.tag = crypto.hmac(SecretSlot::Handoff, &scratch.record);
    u32::from_le_bytes([scratch.tag[0], scratch.tag[1], scratch.tag[2], scratch.tag[3]])
}
