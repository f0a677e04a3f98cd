//! Secure mutex arbiter: at most one ACR binary active per arbitration domain.
//!
//! Only this module writes the hardware mutex registers.

use crate::errors::{AcrError, Result};
use crate::hal::{bits, regs, Falcon};

/// Proof of ownership of one arbitration domain.
///
/// Not `Clone`: the only way to give it up is [`release`], which consumes it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a held secure mutex must be released"]
pub struct SecureMutexToken {
    domain: u8,
    owner: u8,
}

impl SecureMutexToken {
    pub fn domain(&self) -> u8 {
        self.domain
    }

    pub fn owner(&self) -> u8 {
        self.owner
    }
}

/// Try once to take `domain`. Another holder yields `MutexBusy`; nothing waits.
pub fn acquire<H: Falcon>(hal: &mut H, domain: u8) -> Result<SecureMutexToken> {
    if domain >= regs::MUTEX_DOMAINS {
        return Err(AcrError::MutexBusy);
    }

    let id = hal.bar0_read(regs::MUTEX_ID_ACQUIRE)? & 0xff;
    if id == bits::MUTEX_ID_NONE || id == bits::MUTEX_ID_EXHAUSTED {
        log::warn!("mutex id pool exhausted");
        return Err(AcrError::MutexBusy);
    }

    let reg = regs::mutex(domain);
    if let Err(err) = hal.bar0_write(reg, id) {
        let _ = hal.bar0_write(regs::MUTEX_ID_RELEASE, id);
        return Err(err);
    }
    let owner = match hal.bar0_read(reg) {
        Ok(owner) => owner,
        Err(err) => {
            // The claim may have landed and cannot be confirmed; give it back.
            log::error!("mutex domain {} unreadable after claim", domain);
            let _ = hal.bar0_write(reg, bits::MUTEX_UNLOCKED);
            let _ = hal.bar0_write(regs::MUTEX_ID_RELEASE, id);
            return Err(err);
        }
    };
    if owner != id {
        hal.bar0_write(regs::MUTEX_ID_RELEASE, id)?;
        log::warn!("mutex domain {} busy", domain);
        return Err(AcrError::MutexBusy);
    }

    Ok(SecureMutexToken {
        domain,
        owner: id as u8,
    })
}

/// Give the domain back. A token that no longer matches the hardware (stale)
/// fails with `MutexReleaseFailed` and leaves the register alone.
pub fn release<H: Falcon>(hal: &mut H, token: SecureMutexToken) -> Result<()> {
    let reg = regs::mutex(token.domain);
    let current = hal
        .bar0_read(reg)
        .map_err(|_| AcrError::MutexReleaseFailed)?;
    if current != token.owner as u32 {
        log::error!("mutex domain {} not held by owner {}", token.domain, token.owner);
        return Err(AcrError::MutexReleaseFailed);
    }
    hal.bar0_write(reg, bits::MUTEX_UNLOCKED)
        .map_err(|_| AcrError::MutexReleaseFailed)?;
    hal.bar0_write(regs::MUTEX_ID_RELEASE, token.owner as u32)
        .map_err(|_| AcrError::MutexReleaseFailed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AcrConfig;
    use crate::sim::SimFalcon;

    fn sim() -> SimFalcon {
        SimFalcon::new(&AcrConfig::default())
    }

    #[test]
    fn acquire_then_release() {
        let mut sim = sim();
        let token = acquire(&mut sim, 5).unwrap();
        assert_eq!(token.domain(), 5);
        assert_eq!(sim.bar0_peek(regs::mutex(5)), token.owner() as u32);

        release(&mut sim, token).unwrap();
        assert_eq!(sim.bar0_peek(regs::mutex(5)), bits::MUTEX_UNLOCKED);
        assert_eq!(sim.mutex_releases(), 1);
    }

    #[test]
    fn second_acquire_is_busy() {
        let mut sim = sim();
        let token = acquire(&mut sim, 5).unwrap();
        assert_eq!(acquire(&mut sim, 5), Err(AcrError::MutexBusy));
        // other domains are independent
        let other = acquire(&mut sim, 6).unwrap();
        release(&mut sim, other).unwrap();
        release(&mut sim, token).unwrap();
    }

    #[test]
    fn busy_when_held_elsewhere() {
        let mut sim = sim();
        sim.hold_mutex(5, 0x42);
        assert_eq!(acquire(&mut sim, 5), Err(AcrError::MutexBusy));
        assert_eq!(sim.bar0_peek(regs::mutex(5)), 0x42);
    }

    #[test]
    fn exhausted_id_pool_is_busy() {
        let mut sim = sim();
        sim.faults.mutex_ids_exhausted = true;
        assert_eq!(acquire(&mut sim, 5), Err(AcrError::MutexBusy));
    }

    #[test]
    fn unreadable_claim_is_undone() {
        let mut sim = sim();
        sim.faults.bar0_read_timeout_at = Some(regs::mutex(5));
        assert!(matches!(acquire(&mut sim, 5), Err(AcrError::HardwareTimeout(_))));
        assert_eq!(sim.bar0_peek(regs::mutex(5)), bits::MUTEX_UNLOCKED);
        assert_eq!(sim.mutex_releases(), 1);
        assert_eq!(sim.write_count(regs::MUTEX_ID_RELEASE), 1);
    }

    #[test]
    fn stale_token_fails_release() {
        let mut sim = sim();
        let token = acquire(&mut sim, 5).unwrap();
        // someone force-cleared and re-took the domain
        sim.hold_mutex(5, 0x77);
        assert_eq!(release(&mut sim, token), Err(AcrError::MutexReleaseFailed));
        assert_eq!(sim.bar0_peek(regs::mutex(5)), 0x77);
    }
}
