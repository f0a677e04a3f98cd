//! Secret scrubbing.

use zeroize::Zeroize;

use crate::crypto::{Digest, Tag, SIGNED_BLOCK_LEN};
use crate::hal::Falcon;

/// Buffers that may hold secret or trust-critical bytes during a run.
/// Owned by the orchestrator and wiped in cleanup.
#[derive(Zeroize)]
pub struct Scratch {
    pub digest: Digest,
    pub signed_block: [u8; SIGNED_BLOCK_LEN],
    pub tag: Tag,
    pub record: [u8; 4],
}

impl Scratch {
    pub const fn new() -> Self {
        Self {
            digest: [0u8; 32],
            signed_block: [0u8; SIGNED_BLOCK_LEN],
            tag: [0u8; 32],
            record: [0u8; 4],
        }
    }

    pub fn is_clear(&self) -> bool {
        self.digest.iter().all(|&b| b == 0)
            && self.signed_block.iter().all(|&b| b == 0)
            && self.tag.iter().all(|&b| b == 0)
            && self.record.iter().all(|&b| b == 0)
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop residual signature state and zero the SCP and general-purpose registers.
pub fn scrub_registers<H: Falcon>(hal: &mut H) {
    hal.scp_forget_signature();
    hal.scp_zero_registers();
    hal.zero_gprs();
}

/// Full wipe before halt: registers, scratch buffers, stack.
pub fn scrub_all<H: Falcon>(hal: &mut H, scratch: &mut Scratch) {
    scratch.zeroize();
    scrub_registers(hal);
    hal.scrub_stack();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroize_clears_every_buffer() {
        let mut scratch = Scratch::new();
        scratch.digest = [0xAA; 32];
        scratch.signed_block[10] = 1;
        scratch.tag[31] = 2;
        scratch.record = [1, 2, 3, 4];
        assert!(!scratch.is_clear());
        scratch.zeroize();
        assert!(scratch.is_clear());
    }
}
