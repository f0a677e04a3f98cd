//! Ucode manifest: the fixed header that precedes every LS falcon image in the WPR.
//!
//! ```text
//! 0x00  magic "ACRM"        0x04  layout version   0x05  falcon id
//! 0x06  key index           0x07  flags
//! 0x08  code offset         0x0c  code size
//! 0x10  data offset         0x14  data size
//! 0x18  entry point         0x1c  ucode version
//! 0x20  signature (64 bytes)
//! 0x60  reserved (32 bytes, zero)
//! ```
//!
//! The signature covers the 32 header bytes followed by the digest of
//! everything after the manifest.

use crate::{read_u32, write_u32, ContractError, EngineId};

pub const MANIFEST_LEN: usize = 128;
pub const HEADER_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;
pub const MAGIC_MANIFEST: [u8; 4] = *b"ACRM";
pub const LAYOUT_VERSION: u8 = 0x01;

/// IMEM/DMEM are filled in blocks of this many bytes.
pub const BLOCK_LEN: u32 = 256;

pub const FLAG_LOAD_CODE_AT_ZERO: u8 = 0b0000_0001;
pub const FLAG_FORCE_PRIV_LOAD: u8 = 0b0000_0010;
pub const FLAG_DEBUG_SIGNED: u8 = 0b0000_0100;
const FLAGS_KNOWN: u8 = FLAG_LOAD_CODE_AT_ZERO | FLAG_FORCE_PRIV_LOAD | FLAG_DEBUG_SIGNED;

const SIGNATURE_OFFSET: usize = HEADER_LEN;
const RESERVED_OFFSET: usize = SIGNATURE_OFFSET + SIGNATURE_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UcodeManifest {
    pub magic: [u8; 4],
    pub version: u8,
    pub falcon_id: u8,
    pub key_index: u8,
    pub flags: u8,
    pub code_offset: u32,
    pub code_size: u32,
    pub data_offset: u32,
    pub data_size: u32,
    pub entry_point: u32,
    pub ucode_version: u32,
    pub signature: [u8; SIGNATURE_LEN],
    pub reserved: [u8; 32],
}

impl UcodeManifest {
    pub fn new(
        falcon: EngineId,
        key_index: u8,
        code_size: u32,
        data_size: u32,
        entry_point: u32,
        ucode_version: u32,
    ) -> Self {
        let code_offset = MANIFEST_LEN as u32;
        Self {
            magic: MAGIC_MANIFEST,
            version: LAYOUT_VERSION,
            falcon_id: falcon.as_u8(),
            key_index,
            flags: 0,
            code_offset,
            code_size,
            data_offset: code_offset + code_size,
            data_size,
            entry_point,
            ucode_version,
            signature: [0u8; SIGNATURE_LEN],
            reserved: [0u8; 32],
        }
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_signature(mut self, signature: [u8; SIGNATURE_LEN]) -> Self {
        self.signature = signature;
        self
    }

    pub fn header_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.magic);
        out[4] = self.version;
        out[5] = self.falcon_id;
        out[6] = self.key_index;
        out[7] = self.flags;
        write_u32(&mut out, 8, self.code_offset);
        write_u32(&mut out, 12, self.code_size);
        write_u32(&mut out, 16, self.data_offset);
        write_u32(&mut out, 20, self.data_size);
        write_u32(&mut out, 24, self.entry_point);
        write_u32(&mut out, 28, self.ucode_version);
        out
    }

    pub fn to_bytes(&self) -> [u8; MANIFEST_LEN] {
        let mut out = [0u8; MANIFEST_LEN];
        out[0..HEADER_LEN].copy_from_slice(&self.header_bytes());
        out[SIGNATURE_OFFSET..RESERVED_OFFSET].copy_from_slice(&self.signature);
        out[RESERVED_OFFSET..MANIFEST_LEN].copy_from_slice(&self.reserved);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContractError> {
        if bytes.len() != MANIFEST_LEN {
            return Err(ContractError::InvalidLength);
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&bytes[SIGNATURE_OFFSET..RESERVED_OFFSET]);
        let mut reserved = [0u8; 32];
        reserved.copy_from_slice(&bytes[RESERVED_OFFSET..MANIFEST_LEN]);
        let manifest = Self {
            magic,
            version: bytes[4],
            falcon_id: bytes[5],
            key_index: bytes[6],
            flags: bytes[7],
            code_offset: read_u32(bytes, 8),
            code_size: read_u32(bytes, 12),
            data_offset: read_u32(bytes, 16),
            data_size: read_u32(bytes, 20),
            entry_point: read_u32(bytes, 24),
            ucode_version: read_u32(bytes, 28),
            signature,
            reserved,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        if self.magic != MAGIC_MANIFEST {
            return Err(ContractError::InvalidMagic);
        }
        if self.version != LAYOUT_VERSION {
            return Err(ContractError::InvalidVersion);
        }
        EngineId::from_u8(self.falcon_id)?;
        if self.code_size == 0 || self.code_size % BLOCK_LEN != 0 || self.data_size % BLOCK_LEN != 0 {
            return Err(ContractError::InvalidLength);
        }
        if (self.code_offset as usize) < MANIFEST_LEN || (self.data_offset as usize) < MANIFEST_LEN {
            return Err(ContractError::SegmentOutOfBounds);
        }
        if self.entry_point >= self.code_size {
            return Err(ContractError::InvalidEntryPoint);
        }
        if self.flags & !FLAGS_KNOWN != 0 || self.reserved != [0u8; 32] {
            return Err(ContractError::ReservedFieldNonZero);
        }
        Ok(())
    }

    pub fn falcon(&self) -> Result<EngineId, ContractError> {
        EngineId::from_u8(self.falcon_id)
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// A manifest together with the bytes it describes, as found in the WPR.
#[derive(Debug, Clone, Copy)]
pub struct UcodeImage<'a> {
    pub manifest: UcodeManifest,
    blob: &'a [u8],
    /// Offset of `blob` from the start of video memory.
    pub fb_offset: u64,
}

impl<'a> UcodeImage<'a> {
    pub fn parse(blob: &'a [u8], fb_offset: u64) -> Result<Self, ContractError> {
        if blob.len() < MANIFEST_LEN {
            return Err(ContractError::InvalidLength);
        }
        let manifest = UcodeManifest::from_bytes(&blob[..MANIFEST_LEN])?;
        let code_end = manifest.code_offset as usize + manifest.code_size as usize;
        let data_end = manifest.data_offset as usize + manifest.data_size as usize;
        if code_end > blob.len() || data_end > blob.len() {
            return Err(ContractError::SegmentOutOfBounds);
        }
        Ok(Self {
            manifest,
            blob,
            fb_offset,
        })
    }

    pub fn code(&self) -> &'a [u8] {
        let start = self.manifest.code_offset as usize;
        &self.blob[start..start + self.manifest.code_size as usize]
    }

    pub fn data(&self) -> &'a [u8] {
        let start = self.manifest.data_offset as usize;
        &self.blob[start..start + self.manifest.data_size as usize]
    }

    /// Everything after the manifest; its digest is part of the signed block.
    pub fn payload(&self) -> &'a [u8] {
        &self.blob[MANIFEST_LEN..]
    }

    pub fn len(&self) -> u64 {
        self.blob.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }

    /// Video-memory range `[start, end)` occupied by the image.
    pub fn fb_range(&self) -> (u64, u64) {
        (self.fb_offset, self.fb_offset + self.len())
    }
}
