//! Register sequences applied to one managed falcon.

use acr_contract::manifest::{FLAG_FORCE_PRIV_LOAD, FLAG_LOAD_CODE_AT_ZERO};
use acr_contract::{aperture, descriptor_for, EngineDescriptor, EngineId, UcodeImage};

use crate::errors::{AcrError, Poll, Result};
use crate::hal::{bits, poll, regs, Falcon};
use crate::loader::{Segment, UcodeLoader};

/// A managed falcon and the ucode it boots from.
#[derive(Debug, Clone, Copy)]
pub struct BootTarget<'a> {
    pub descriptor: &'static EngineDescriptor,
    pub image: UcodeImage<'a>,
}

impl<'a> BootTarget<'a> {
    pub fn new(id: EngineId, image: UcodeImage<'a>) -> Self {
        Self {
            descriptor: descriptor_for(id),
            image,
        }
    }

    /// Parse the ucode found at `fb_offset` in the WPR for falcon `id`.
    pub fn parse(id: EngineId, blob: &'a [u8], fb_offset: u64) -> Result<Self> {
        Ok(Self::new(id, UcodeImage::parse(blob, fb_offset)?))
    }

    pub fn id(&self) -> EngineId {
        self.descriptor.id
    }

    /// IMEM address the code segment is loaded at.
    pub fn code_base(&self) -> u32 {
        if self.image.manifest.has_flag(FLAG_LOAD_CODE_AT_ZERO) {
            0
        } else {
            self.image.manifest.code_offset
        }
    }

    pub fn boot_vector(&self) -> u32 {
        self.code_base() + self.image.manifest.entry_point
    }

    fn loads_over_priv(&self) -> bool {
        self.image.manifest.has_flag(FLAG_FORCE_PRIV_LOAD)
            || !self.descriptor.has_aperture(aperture::FBIF)
    }
}

/// The targets one execution acts on.
#[derive(Debug, Clone, Copy)]
pub struct BootTable<'a> {
    targets: &'a [BootTarget<'a>],
}

impl<'a> BootTable<'a> {
    pub const fn new(targets: &'a [BootTarget<'a>]) -> Self {
        Self { targets }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a BootTarget<'a>> {
        self.targets.iter()
    }

    pub fn find(&self, id: EngineId) -> Option<&'a BootTarget<'a>> {
        self.targets.iter().find(|target| target.id() == id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Put the target into reset and wait until it is halted with scrubbed memories.
/// Targets whose reset line belongs to the host must already be held in reset.
pub fn reset<H: Falcon>(hal: &mut H, desc: &EngineDescriptor, budget: u32) -> Result<()> {
    if desc.reset_owned {
        hal.bar0_write(desc.reg(regs::FALCON_ENGINE), bits::ENGINE_RESET)?;
        hal.bar0_write(desc.reg(regs::FALCON_ENGINE), 0)?;
    }

    let scrubbing = bits::DMACTL_DMEM_SCRUBBING | bits::DMACTL_IMEM_SCRUBBING;
    let dmactl = desc.reg(regs::FALCON_DMACTL);
    if !poll(budget, || hal.bar0_read(dmactl), |v| v & scrubbing == 0)? {
        return Err(AcrError::HardwareTimeout(Poll::TargetScrub(desc.id)));
    }

    let cpuctl = desc.reg(regs::FALCON_CPUCTL);
    if !poll(budget, || hal.bar0_read(cpuctl), |v| v & bits::CPUCTL_HALTED != 0)? {
        return Err(AcrError::HardwareTimeout(Poll::TargetHalt(desc.id)));
    }
    Ok(())
}

pub fn set_plms<H: Falcon>(hal: &mut H, desc: &EngineDescriptor, mask: u32) -> Result<()> {
    for addr in desc.plm.iter() {
        hal.bar0_write(addr, mask)?;
    }
    Ok(())
}

/// Copy code and data into the target, over DMA when it can, else over the priv bus.
pub fn load<H: Falcon, L: UcodeLoader>(
    hal: &mut H,
    loader: &mut L,
    target: &BootTarget<'_>,
) -> Result<()> {
    let desc = target.descriptor;
    let manifest = &target.image.manifest;
    let code_base = target.code_base();

    if target.loads_over_priv() {
        priv_load(hal, desc, Segment::Code, code_base, target.image.code())?;
        priv_load(hal, desc, Segment::Data, 0, target.image.data())?;
    } else {
        let fb = target.image.fb_offset;
        loader.dma_load(
            desc,
            Segment::Code,
            fb + manifest.code_offset as u64,
            code_base,
            manifest.code_size,
        )?;
        if manifest.data_size > 0 {
            loader.dma_load(
                desc,
                Segment::Data,
                fb + manifest.data_offset as u64,
                0,
                manifest.data_size,
            )?;
        }
    }
    Ok(())
}

/// Fill IMEM or DMEM through the auto-incrementing port. IMEM blocks are
/// tagged and marked secure.
fn priv_load<H: Falcon>(
    hal: &mut H,
    desc: &EngineDescriptor,
    segment: Segment,
    dst: u32,
    bytes: &[u8],
) -> Result<()> {
    let (ctrl, data) = match segment {
        Segment::Code => (regs::FALCON_IMEMC, regs::FALCON_IMEMD),
        Segment::Data => (regs::FALCON_DMEMC, regs::FALCON_DMEMD),
    };
    let mut memc = dst | bits::MEMC_AINCW;
    if segment == Segment::Code {
        memc |= bits::MEMC_SECURE;
    }
    hal.bar0_write(desc.reg(ctrl), memc)?;

    for (i, word) in bytes.chunks_exact(4).enumerate() {
        let offset = (i * 4) as u32;
        if segment == Segment::Code && offset % 256 == 0 {
            hal.bar0_write(desc.reg(regs::FALCON_IMEMT), (dst + offset) >> 8)?;
        }
        let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        hal.bar0_write(desc.reg(data), value)?;
    }
    Ok(())
}

pub fn set_boot_vector<H: Falcon>(hal: &mut H, target: &BootTarget<'_>) -> Result<()> {
    hal.bar0_write(target.descriptor.reg(regs::FALCON_BOOTVEC), target.boot_vector())
}

pub fn raise_ls<H: Falcon>(hal: &mut H, desc: &EngineDescriptor) -> Result<()> {
    let addr = desc.reg(regs::FALCON_SCTL);
    let sctl = hal.bar0_read(addr)? & !bits::SCTL_LSMODE_LEVEL_MASK;
    let level = bits::LS_LEVEL << bits::SCTL_LSMODE_LEVEL_SHIFT;
    hal.bar0_write(addr, sctl | bits::SCTL_LSMODE | level)
}

pub fn lower_ls<H: Falcon>(hal: &mut H, desc: &EngineDescriptor) -> Result<()> {
    let addr = desc.reg(regs::FALCON_SCTL);
    let sctl = hal.bar0_read(addr)?;
    hal.bar0_write(addr, sctl & !(bits::SCTL_LSMODE | bits::SCTL_LSMODE_LEVEL_MASK))
}

pub fn is_ls<H: Falcon>(hal: &mut H, desc: &EngineDescriptor) -> Result<bool> {
    Ok(hal.bar0_read(desc.reg(regs::FALCON_SCTL))? & bits::SCTL_LSMODE != 0)
}

pub fn start_cpu<H: Falcon>(hal: &mut H, desc: &EngineDescriptor) -> Result<()> {
    hal.bar0_write(desc.reg(regs::FALCON_CPUCTL), bits::CPUCTL_STARTCPU)
}

/// Ask the co-processor to tear `target` down and wait for its answer. A
/// refusal is reported the same way as silence.
pub fn coprocessor_unload<H: Falcon>(
    hal: &mut H,
    coprocessor: &EngineDescriptor,
    target: EngineId,
    budget: u32,
) -> Result<()> {
    let mailbox0 = coprocessor.reg(regs::FALCON_MAILBOX0);
    let mailbox1 = coprocessor.reg(regs::FALCON_MAILBOX1);
    let timeout = AcrError::HardwareTimeout(Poll::CoprocessorAck(target));

    hal.bar0_write(mailbox1, 0)?;
    let command = (bits::COPROC_CMD_UNLOAD << bits::COPROC_CMD_SHIFT) | target.as_u8() as u32;
    hal.bar0_write(mailbox0, command)?;

    let mut answer = 0;
    let acked = poll(
        budget,
        || {
            answer = hal.bar0_read(mailbox1)?;
            Ok(answer)
        },
        |v| v & bits::COPROC_ACK != 0,
    )?;
    if !acked {
        return Err(timeout);
    }
    if answer & bits::COPROC_RESULT_MASK != 0 {
        log::warn!("co-processor refused unload of {:?}: {:#x}", target, answer);
        return Err(timeout);
    }
    Ok(())
}
