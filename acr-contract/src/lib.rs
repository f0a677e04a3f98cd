#![cfg_attr(not(feature = "std"), no_std)]

//! Contract shared by the ACR binaries, the host driver and the bootloader stages.
//!
//! Everything in here is a fixed binary or register layout: the engine
//! descriptor table, the ucode manifest, the result-channel status codes and
//! the handoff record word. Nothing here touches hardware.

pub mod descriptor;
pub mod handoff;
pub mod manifest;
pub mod status;

pub use descriptor::{
    aperture, descriptor_for, EngineDescriptor, EngineId, PlmAddresses, ENGINE_DESCRIPTORS,
};
pub use handoff::{HandoffOutcome, HandoffRecord, HANDOFF_MAGIC, MAX_RECORD_VERSION};
pub use manifest::{UcodeImage, UcodeManifest, MANIFEST_LEN, SIGNATURE_LEN};
pub use status::{BootPhase, StatusCode, INVALID_VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractError {
    InvalidLength,
    InvalidMagic,
    InvalidVersion,
    InvalidEntryPoint,
    ReservedFieldNonZero,
    UnknownEngine,
    SegmentOutOfBounds,
}

impl core::fmt::Display for ContractError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ContractError::InvalidLength => write!(f, "invalid length"),
            ContractError::InvalidMagic => write!(f, "invalid magic"),
            ContractError::InvalidVersion => write!(f, "unsupported layout version"),
            ContractError::InvalidEntryPoint => write!(f, "entry point outside code segment"),
            ContractError::ReservedFieldNonZero => write!(f, "reserved field is non-zero"),
            ContractError::UnknownEngine => write!(f, "unknown engine id"),
            ContractError::SegmentOutOfBounds => write!(f, "segment outside image"),
        }
    }
}

impl core::error::Error for ContractError {}

pub(crate) fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
