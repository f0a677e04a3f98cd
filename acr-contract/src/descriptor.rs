//! Static description of every falcon the ACR may manage.

use crate::ContractError;

/// Capability bits describing how a falcon reaches memory. A falcon without
/// a frame-buffer interface is filled over the priv bus.
pub mod aperture {
    /// Falcon owns a frame-buffer interface and can DMA on its own.
    pub const FBIF: u8 = 1 << 0;
}

/// Falcon identifiers as they appear in ucode manifests and in the
/// executing falcon's ENGINE_ID register.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EngineId {
    Pmu = 0,
    Fecs = 2,
    Gpccs = 3,
    Nvdec = 4,
    Sec2 = 7,
    Gsp = 11,
}

impl EngineId {
    pub fn from_u8(value: u8) -> Result<Self, ContractError> {
        match value {
            0 => Ok(EngineId::Pmu),
            2 => Ok(EngineId::Fecs),
            3 => Ok(EngineId::Gpccs),
            4 => Ok(EngineId::Nvdec),
            7 => Ok(EngineId::Sec2),
            11 => Ok(EngineId::Gsp),
            _ => Err(ContractError::UnknownEngine),
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

// Offsets of the privilege-level-mask registers inside a falcon's BAR0 window.
const IMEM_PLM: u32 = 0x1410;
const DMEM_PLM: u32 = 0x1414;
const CPUCTL_PLM: u32 = 0x1418;
const EXE_PLM: u32 = 0x141c;
const IRQTMR_PLM: u32 = 0x1420;
const SCTL_PLM: u32 = 0x1424;

/// Absolute BAR0 addresses of the PLM registers a target owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlmAddresses {
    pub imem: u32,
    pub dmem: u32,
    pub cpuctl: u32,
    pub exe: u32,
    pub irqtmr: u32,
    pub sctl: u32,
}

impl PlmAddresses {
    pub const fn at(base: u32) -> Self {
        Self {
            imem: base + IMEM_PLM,
            dmem: base + DMEM_PLM,
            cpuctl: base + CPUCTL_PLM,
            exe: base + EXE_PLM,
            irqtmr: base + IRQTMR_PLM,
            sctl: base + SCTL_PLM,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        [self.imem, self.dmem, self.cpuctl, self.exe, self.irqtmr, self.sctl].into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineDescriptor {
    pub id: EngineId,
    /// Falcon register window as seen from BAR0.
    pub bar0_base: u32,
    pub plm: PlmAddresses,
    /// The ACR, not the host, drives this engine's reset line.
    pub reset_owned: bool,
    pub aperture: u8,
}

impl EngineDescriptor {
    const fn new(id: EngineId, bar0_base: u32, reset_owned: bool, aperture: u8) -> Self {
        Self {
            id,
            bar0_base,
            plm: PlmAddresses::at(bar0_base),
            reset_owned,
            aperture,
        }
    }

    pub fn has_aperture(&self, bits: u8) -> bool {
        self.aperture & bits == bits
    }

    /// BAR0 address of a register at `offset` inside this falcon's window.
    pub const fn reg(&self, offset: u32) -> u32 {
        self.bar0_base + offset
    }
}

pub static ENGINE_DESCRIPTORS: [EngineDescriptor; 6] = [
    EngineDescriptor::new(EngineId::Pmu, 0x0010_a000, true, aperture::FBIF),
    EngineDescriptor::new(EngineId::Fecs, 0x0040_9000, true, 0),
    EngineDescriptor::new(EngineId::Gpccs, 0x0041_a000, true, 0),
    EngineDescriptor::new(EngineId::Nvdec, 0x0008_4000, true, aperture::FBIF),
    EngineDescriptor::new(EngineId::Sec2, 0x0084_0000, false, aperture::FBIF),
    EngineDescriptor::new(EngineId::Gsp, 0x0011_0000, false, aperture::FBIF),
];

pub fn descriptor_for(id: EngineId) -> &'static EngineDescriptor {
    // The table is indexed by construction; every EngineId has exactly one entry.
    match id {
        EngineId::Pmu => &ENGINE_DESCRIPTORS[0],
        EngineId::Fecs => &ENGINE_DESCRIPTORS[1],
        EngineId::Gpccs => &ENGINE_DESCRIPTORS[2],
        EngineId::Nvdec => &ENGINE_DESCRIPTORS[3],
        EngineId::Sec2 => &ENGINE_DESCRIPTORS[4],
        EngineId::Gsp => &ENGINE_DESCRIPTORS[5],
    }
}
