#![cfg_attr(not(any(feature = "std", test)), no_std)]

//! ACR: the secure-boot orchestrator that runs on the GPU's HS falcon.
//!
//! It authenticates and bootstraps every light-secure falcon before the host
//! may touch them, starts them on request, re-locks them after power-gate
//! exit and lowers them back to untrusted on unload. Hardware is reached only
//! through [`hal::Falcon`]; crypto and DMA are collaborators behind
//! [`crypto::CryptoEngine`] and [`loader::UcodeLoader`]. The `sim` feature
//! adds a simulated chip and software crypto for running it off-hardware.

pub mod config;
pub mod crypto;
pub mod entry_guard;
pub mod errors;
pub mod hal;
pub mod handoff;
pub mod loader;
pub mod mutex;
pub mod orchestrator;
pub mod scrub;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod status;
pub mod trust;

pub use config::AcrConfig;
pub use crypto::{CryptoEngine, KeySlot, SecretSlot, Verdict};
#[cfg(any(test, feature = "sim"))]
pub use crypto::SoftCrypto;
pub use errors::{AcrError, Poll, Result, Stage, TrustFailure, Unrecoverable};
pub use hal::{Csb, Falcon};
pub use loader::{Segment, UcodeLoader};
pub use mutex::SecureMutexToken;
pub use orchestrator::{enter, Acr, BootTable, BootTarget, Terminal};
pub use status::Report;

pub use acr_contract::{BootPhase, EngineId, StatusCode, INVALID_VERSION};
