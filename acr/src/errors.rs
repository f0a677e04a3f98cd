// acr/src/errors.rs
// Error taxonomy of the secure-boot path and its mapping onto the result channel.

use acr_contract::{ContractError, EngineId, StatusCode};
use thiserror::Error;

/// Bounded hardware polls that can run out of budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// A BAR0 access to this address never completed.
    Bar0(u32),
    /// Target IMEM/DMEM scrub after reset.
    TargetScrub(EngineId),
    /// Target did not report halted after reset.
    TargetHalt(EngineId),
    /// Co-processor never acknowledged a proxied command, or refused it.
    CoprocessorAck(EngineId),
    /// DMA of a ucode segment into this target never completed.
    Dma(EngineId),
    /// The SCP true-random generator produced no word.
    Trng,
}

/// Which earlier boot stage failed to leave a success record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Bootloader,
    FirmwareSecurity,
}

/// Reasons the trust validator refuses to let the run continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrustFailure {
    #[error("chip {0:#05x} is not supported by this build")]
    ChipMismatch(u16),
    #[error("running on engine {found:#x}, built for {expected:?}")]
    EngineMismatch { expected: EngineId, found: u32 },
    #[error("build version unavailable")]
    VersionUnavailable,
    #[error("build version {build} below fuse floor {floor}")]
    FuseRevoked { build: u32, floor: u32 },
    #[error("build version {build} below FPF floor {floor}")]
    FpfRevoked { build: u32, floor: u32 },
    #[error("{falcon:?} ucode version {version} below revocation floor {floor}")]
    ImageRevoked {
        falcon: EngineId,
        version: u32,
        floor: u32,
    },
    #[error("{0:?} stage did not record success")]
    ChainBroken(Stage),
    #[error("production fuse blown but protections {missing:#x} are off")]
    ProductionPolicy { missing: u32 },
    #[error("debug-signed ucode for {0:?} on production hardware")]
    DebugSignedOnProduction(EngineId),
    #[error("manifest names falcon {found:#x}, slot belongs to {expected:?}")]
    FalconMismatch { expected: EngineId, found: u8 },
    #[error("{0:?} is not managed by this boot table")]
    TargetNotManaged(EngineId),
    #[error("{0:?} is not running light-secure firmware")]
    TargetNotSecure(EngineId),
    #[error("malformed ucode: {0}")]
    Manifest(ContractError),
}

/// Every recoverable failure of an ACR run. Each maps to exactly one `StatusCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcrError {
    #[error("hardware poll exhausted its budget: {0:?}")]
    HardwareTimeout(Poll),
    #[error("secure mutex is held by another binary")]
    MutexBusy,
    #[error("trust check failed: {0}")]
    TrustCheckFailed(TrustFailure),
    #[error("ucode signature for {0:?} rejected")]
    SignatureInvalid(EngineId),
    #[error("handoff record missing or mismatched")]
    HandoffMissingOrMismatched,
    #[error("protected memory region not configured")]
    MemoryRangeNotConfigured,
    #[error("secure mutex could not be released")]
    MutexReleaseFailed,
}

/// Fail-stop causes raised before a trusted result channel exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unrecoverable {
    #[error("cpuctl alias stayed enabled")]
    AliasStuck,
    #[error("SCP sequencer reset never completed")]
    ScpResetTimeout,
    #[error("SCP TRNG failed while deriving the stack canary")]
    TrngFailure,
    #[error("DMEM has no room for a stack")]
    NoStack,
}

impl From<TrustFailure> for AcrError {
    fn from(reason: TrustFailure) -> Self {
        AcrError::TrustCheckFailed(reason)
    }
}

impl From<ContractError> for AcrError {
    fn from(error: ContractError) -> Self {
        AcrError::TrustCheckFailed(TrustFailure::Manifest(error))
    }
}

impl From<AcrError> for StatusCode {
    fn from(error: AcrError) -> Self {
        match error {
            AcrError::HardwareTimeout(_) => StatusCode::HardwareTimeout,
            AcrError::MutexBusy => StatusCode::MutexBusy,
            AcrError::TrustCheckFailed(_) => StatusCode::TrustCheckFailed,
            AcrError::SignatureInvalid(_) => StatusCode::SignatureInvalid,
            AcrError::HandoffMissingOrMismatched => StatusCode::HandoffMissingOrMismatched,
            AcrError::MemoryRangeNotConfigured => StatusCode::MemoryRangeNotConfigured,
            AcrError::MutexReleaseFailed => StatusCode::MutexReleaseFailed,
        }
    }
}

/// Result type alias for ACR operations
pub type Result<T> = core::result::Result<T, AcrError>;
