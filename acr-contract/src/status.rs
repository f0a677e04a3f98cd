//! Result-channel values and boot phases.

use crate::EngineId;

/// Version written back when a run did not complete. Never a real build version.
pub const INVALID_VERSION: u32 = 0xFFFF_FFFF;

const FAILURE_BASE: u32 = 0xAC00_0000;

/// Value of MAILBOX0 as observed by the next stage or the host driver.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusCode {
    Success = 0,
    /// Written before any real work; never the value left behind by a halted run.
    StartedNotFinished = 0xACAC_5A5A,

    HardwareTimeout = FAILURE_BASE + 1,
    MutexBusy = FAILURE_BASE + 2,
    TrustCheckFailed = FAILURE_BASE + 3,
    SignatureInvalid = FAILURE_BASE + 4,
    HandoffMissingOrMismatched = FAILURE_BASE + 5,
    MemoryRangeNotConfigured = FAILURE_BASE + 6,
    MutexReleaseFailed = FAILURE_BASE + 7,
}

impl StatusCode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(StatusCode::Success),
            0xACAC_5A5A => Some(StatusCode::StartedNotFinished),
            v if v == FAILURE_BASE + 1 => Some(StatusCode::HardwareTimeout),
            v if v == FAILURE_BASE + 2 => Some(StatusCode::MutexBusy),
            v if v == FAILURE_BASE + 3 => Some(StatusCode::TrustCheckFailed),
            v if v == FAILURE_BASE + 4 => Some(StatusCode::SignatureInvalid),
            v if v == FAILURE_BASE + 5 => Some(StatusCode::HandoffMissingOrMismatched),
            v if v == FAILURE_BASE + 6 => Some(StatusCode::MemoryRangeNotConfigured),
            v if v == FAILURE_BASE + 7 => Some(StatusCode::MutexReleaseFailed),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }

    /// True for every code a finished run may leave behind.
    pub fn is_terminal(self) -> bool {
        self != StatusCode::StartedNotFinished
    }
}

impl From<StatusCode> for u32 {
    fn from(status: StatusCode) -> u32 {
        status as u32
    }
}

/// The single job one ACR execution performs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootPhase {
    /// Verify, load and raise every managed falcon.
    Bootstrap,
    /// Start one already-bootstrapped falcon.
    Subordinate(EngineId),
    /// Fast re-lock after power-gate exit.
    PowerGateLock,
    /// Lower every bootstrapped falcon back to untrusted.
    Unload,
    /// Same as `Unload`, with the teardown proxied by a co-processor.
    UnloadViaCoprocessor,
}

impl BootPhase {
    /// Four-bit tag used in the handoff record.
    pub const fn tag(self) -> u8 {
        match self {
            BootPhase::Bootstrap => 0x1,
            BootPhase::Subordinate(_) => 0x2,
            BootPhase::PowerGateLock => 0x3,
            BootPhase::Unload => 0x4,
            BootPhase::UnloadViaCoprocessor => 0x5,
        }
    }

    /// Phases that may only run after a successful Bootstrap.
    pub const fn requires_bootstrap(self) -> bool {
        !matches!(self, BootPhase::Bootstrap)
    }

    /// Phase whose handoff record this phase writes, if any.
    pub const fn produces_handoff(self) -> Option<BootPhase> {
        match self {
            BootPhase::Bootstrap => Some(BootPhase::Bootstrap),
            BootPhase::Unload | BootPhase::UnloadViaCoprocessor => Some(BootPhase::Unload),
            BootPhase::Subordinate(_) | BootPhase::PowerGateLock => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_decode() {
        let all = [
            StatusCode::Success,
            StatusCode::StartedNotFinished,
            StatusCode::HardwareTimeout,
            StatusCode::MutexBusy,
            StatusCode::TrustCheckFailed,
            StatusCode::SignatureInvalid,
            StatusCode::HandoffMissingOrMismatched,
            StatusCode::MemoryRangeNotConfigured,
            StatusCode::MutexReleaseFailed,
        ];
        for status in all {
            assert_eq!(StatusCode::from_u32(status.into()), Some(status));
        }
        assert_eq!(StatusCode::from_u32(0xdead_beef), None);
    }

    #[test]
    fn sentinel_is_not_terminal() {
        assert!(!StatusCode::StartedNotFinished.is_terminal());
        assert!(StatusCode::MutexBusy.is_terminal());
        assert!(!StatusCode::MutexBusy.is_success());
    }

    #[test]
    fn only_unload_flavours_share_a_producer() {
        assert_eq!(
            BootPhase::UnloadViaCoprocessor.produces_handoff(),
            BootPhase::Unload.produces_handoff()
        );
        assert_eq!(BootPhase::PowerGateLock.produces_handoff(), None);
        assert!(!BootPhase::Bootstrap.requires_bootstrap());
        assert!(BootPhase::Subordinate(EngineId::Fecs).requires_bootstrap());
    }
}
