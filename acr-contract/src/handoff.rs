//! Handoff record word stored in the secure scratch register.
//!
//! Layout, most significant bits first:
//!
//! | bits    | field            |
//! |---------|------------------|
//! | 31..24  | magic (`0xAC`)   |
//! | 23..20  | producer phase   |
//! | 19..16  | outcome          |
//! | 15..0   | build version    |
//!
//! The authentication tag lives in a second scratch register and is not part
//! of this word.

use crate::{BootPhase, ContractError, INVALID_VERSION};

pub const HANDOFF_MAGIC: u8 = 0xAC;

const VERSION_INVALID_FIELD: u16 = 0xFFFF;

/// Largest build version a record can carry.
pub const MAX_RECORD_VERSION: u32 = VERSION_INVALID_FIELD as u32 - 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    Completed = 0x0,
    Failed = 0xF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffRecord {
    pub producer: u8,
    pub outcome: HandoffOutcome,
    pub version: u16,
}

impl HandoffRecord {
    pub fn completed(producer: BootPhase, version: u32) -> Self {
        Self {
            producer: producer.tag(),
            outcome: HandoffOutcome::Completed,
            version: version_field(version),
        }
    }

    pub fn failed(producer: BootPhase) -> Self {
        Self {
            producer: producer.tag(),
            outcome: HandoffOutcome::Failed,
            version: VERSION_INVALID_FIELD,
        }
    }

    pub fn to_word(&self) -> u32 {
        (HANDOFF_MAGIC as u32) << 24
            | ((self.producer & 0xF) as u32) << 20
            | ((self.outcome as u8 & 0xF) as u32) << 16
            | self.version as u32
    }

    pub fn from_word(word: u32) -> Result<Self, ContractError> {
        if (word >> 24) as u8 != HANDOFF_MAGIC {
            return Err(ContractError::InvalidMagic);
        }
        let outcome = match ((word >> 16) & 0xF) as u8 {
            0x0 => HandoffOutcome::Completed,
            0xF => HandoffOutcome::Failed,
            _ => return Err(ContractError::InvalidVersion),
        };
        Ok(Self {
            producer: ((word >> 20) & 0xF) as u8,
            outcome,
            version: (word & 0xFFFF) as u16,
        })
    }

    /// True when `phase` produced this record and finished successfully.
    pub fn is_completed_by(&self, phase: BootPhase) -> bool {
        self.producer == phase.tag()
            && self.outcome == HandoffOutcome::Completed
            && self.version != VERSION_INVALID_FIELD
    }
}

// Versions beyond the 16-bit field cannot be represented and read back as invalid.
fn version_field(version: u32) -> u16 {
    if version == INVALID_VERSION || version > MAX_RECORD_VERSION {
        VERSION_INVALID_FIELD
    } else {
        version as u16
    }
}
