//! Register-level falcon simulator.
//!
//! Models the executing falcon, the chip-level registers the orchestrator
//! reads and the managed targets' register windows, closely enough to run
//! every phase end to end without hardware. Fault switches in [`Faults`]
//! make individual hardware behaviours misbehave.

use acr_contract::{
    descriptor_for, ContractError, EngineDescriptor, EngineId, UcodeManifest, ENGINE_DESCRIPTORS,
    MANIFEST_LEN,
};
use ed25519_dalek::{Signer, SigningKey};

use crate::config::AcrConfig;
use crate::crypto::{signed_block, SIGNED_BLOCK_LEN};
use crate::errors::{AcrError, Poll, Result};
use crate::hal::{bits, regs, Csb, Falcon};
use crate::loader::{Segment, UcodeLoader};

const BAR0_SLOTS: usize = 256;
const MAILBOX_LOG: usize = 8;
const SCP_REGS: usize = 8;
const GPRS: usize = 16;
const DMEM_BLOCKS: u32 = 256;
const TARGET_WINDOW: u32 = 0x2000;

/// Default WPR, in 4 KiB units: [1 MiB, 2 MiB).
pub const WPR_START_UNITS: u32 = 0x100;
pub const WPR_END_UNITS: u32 = 0x200;

#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// CPUCTL alias enable bit ignores writes.
    pub alias_stuck: bool,
    /// SCP sequencer reset never completes.
    pub scp_reset_stuck: bool,
    /// The mutex id pool has no free ids.
    pub mutex_ids_exhausted: bool,
    /// Any BAR0 access to this address times out.
    pub bar0_timeout_at: Option<u32>,
    /// Only reads of this address time out; writes land.
    pub bar0_read_timeout_at: Option<u32>,
    /// This target never finishes its post-reset memory scrub.
    pub scrub_stuck: Option<EngineId>,
    /// The co-processor ignores mailbox commands.
    pub coprocessor_silent: bool,
}

/// Executing-falcon state that is not reachable through registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub sp: u32,
    pub stack_bottom: u32,
    pub fail_stop_vector: bool,
    pub interrupts_enabled: bool,
    pub canary: Option<u32>,
    pub scp: [u32; SCP_REGS],
    pub scp_signature: bool,
    pub gprs: [u32; GPRS],
    pub stack_dirty: bool,
    pub mailbox0: u32,
    pub mailbox1: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    addr: u32,
    value: u32,
    writes: u32,
    used: bool,
}

pub struct SimFalcon {
    csb: [u32; Csb::COUNT],
    bar0: [Slot; BAR0_SLOTS],
    sp: u32,
    stack_bottom: u32,
    fail_stop_vector: bool,
    interrupts_enabled: bool,
    canary: Option<u32>,
    scp: [u32; SCP_REGS],
    scp_signature: bool,
    gprs: [u32; GPRS],
    stack_dirty: bool,
    bus_ops: usize,
    next_mutex_id: u32,
    mutex_releases: u32,
    mailbox0_log: [u32; MAILBOX_LOG],
    mailbox0_writes: usize,
    coprocessor: EngineId,
    mutex_domain: u8,
    mutex_at_handoff: Option<u32>,
    pub faults: Faults,
}

impl SimFalcon {
    /// A freshly reset falcon on a supported, non-production chip with the
    /// WPR configured and both earlier boot stages reporting success.
    pub fn new(config: &AcrConfig) -> Self {
        let mut scp = [0u32; SCP_REGS];
        let mut gprs = [0u32; GPRS];
        for (i, reg) in scp.iter_mut().enumerate() {
            *reg = 0x5ec0_0000 | i as u32;
        }
        for (i, reg) in gprs.iter_mut().enumerate() {
            *reg = 0xdead_0000 | i as u32;
        }

        let mut sim = Self {
            csb: [0; Csb::COUNT],
            bar0: [Slot::default(); BAR0_SLOTS],
            sp: 0,
            stack_bottom: 0,
            fail_stop_vector: false,
            interrupts_enabled: true,
            canary: None,
            scp,
            scp_signature: true,
            gprs,
            stack_dirty: true,
            bus_ops: 0,
            next_mutex_id: 1,
            mutex_releases: 0,
            mailbox0_log: [0; MAILBOX_LOG],
            mailbox0_writes: 0,
            coprocessor: config.coprocessor,
            mutex_domain: config.mutex_domain,
            mutex_at_handoff: None,
            faults: Faults::default(),
        };

        sim.csb[Csb::Hwcfg.index()] = DMEM_BLOCKS << bits::HWCFG_DMEM_SIZE_SHIFT;
        sim.csb[Csb::EngineId.index()] = config.engine.as_u8() as u32;
        sim.csb[Csb::Sctl.index()] = bits::SCTL_HSMODE | config.production_protections;
        sim.csb[Csb::CpuctlAlias.index()] = bits::CPUCTL_ALIAS_EN;
        sim.csb[Csb::ResetPlm.index()] = bits::PLM_OPEN;

        sim.set_chip(config.supported_chips.first().copied().unwrap_or(0));
        sim.set_wpr(WPR_START_UNITS, WPR_END_UNITS);
        sim.set_stage_status(bits::STAGE_SUCCESS, bits::STAGE_SUCCESS);
        for desc in ENGINE_DESCRIPTORS.iter() {
            for plm in desc.plm.iter() {
                sim.bar0_poke(plm, bits::PLM_OPEN);
            }
            sim.bar0_poke(desc.reg(regs::FALCON_CPUCTL), bits::CPUCTL_HALTED);
        }
        sim
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sp: self.sp,
            stack_bottom: self.stack_bottom,
            fail_stop_vector: self.fail_stop_vector,
            interrupts_enabled: self.interrupts_enabled,
            canary: self.canary,
            scp: self.scp,
            scp_signature: self.scp_signature,
            gprs: self.gprs,
            stack_dirty: self.stack_dirty,
            mailbox0: self.csb[Csb::Mailbox0.index()],
            mailbox1: self.csb[Csb::Mailbox1.index()],
        }
    }

    /// Raw register value, without bus side effects.
    pub fn bar0_peek(&self, addr: u32) -> u32 {
        self.slot(addr).map_or(0, |slot| slot.value)
    }

    /// Set a register directly, without bus side effects or write counting.
    pub fn bar0_poke(&mut self, addr: u32, value: u32) {
        if let Ok(slot) = self.slot_mut(addr) {
            slot.value = value;
        }
    }

    /// Bus writes the orchestrator issued to `addr`.
    pub fn write_count(&self, addr: u32) -> u32 {
        self.slot(addr).map_or(0, |slot| slot.writes)
    }

    /// Every value written to MAILBOX0 so far, oldest first (first few only).
    pub fn mailbox0_log(&self) -> &[u32] {
        &self.mailbox0_log[..self.mailbox0_writes.min(MAILBOX_LOG)]
    }

    pub fn mailbox0_writes(&self) -> usize {
        self.mailbox0_writes
    }

    /// Another binary holds `domain` with owner `id`.
    pub fn hold_mutex(&mut self, domain: u8, id: u32) {
        self.bar0_poke(regs::mutex(domain), id);
    }

    pub fn mutex_releases(&self) -> u32 {
        self.mutex_releases
    }

    /// Owner of the configured mutex domain when a handoff word last landed.
    pub fn mutex_at_handoff(&self) -> Option<u32> {
        self.mutex_at_handoff
    }

    pub fn set_chip(&mut self, chip: u16) {
        let value = (chip as u32 & bits::BOOT_42_CHIP_MASK) << bits::BOOT_42_CHIP_SHIFT;
        self.bar0_poke(regs::PMC_BOOT_42, value);
    }

    /// Burn fuses up to revocation floor `floor`.
    pub fn set_fuse_floor(&mut self, floor: u32) {
        self.bar0_poke(regs::FUSE_OPT_UCODE_REV, thermometer(floor));
    }

    pub fn set_fpf_floor(&mut self, floor: u32) {
        self.bar0_poke(regs::FPF_UCODE_REV, thermometer(floor));
    }

    /// Blow or clear the PRIV_SEC fuse.
    pub fn set_production(&mut self, production: bool) {
        let value = if production { bits::PRIV_SEC_EN } else { 0 };
        self.bar0_poke(regs::FUSE_OPT_PRIV_SEC_EN, value);
    }

    /// WPR bounds in 4 KiB units.
    pub fn set_wpr(&mut self, lo: u32, hi: u32) {
        self.bar0_poke(regs::PFB_WPR_ADDR_LO, lo);
        self.bar0_poke(regs::PFB_WPR_ADDR_HI, hi);
    }

    pub fn set_stage_status(&mut self, bootloader: u32, fwsec: u32) {
        self.bar0_poke(regs::SECURE_SCRATCH_BL_STATUS, bootloader);
        self.bar0_poke(regs::SECURE_SCRATCH_FWSEC_STATUS, fwsec);
    }

    pub fn csb_poke(&mut self, reg: Csb, value: u32) {
        self.csb[reg.index()] = value;
    }

    /// Target SCTL shows light-secure mode.
    pub fn is_ls(&self, id: EngineId) -> bool {
        let sctl = self.bar0_peek(descriptor_for(id).reg(regs::FALCON_SCTL));
        sctl & bits::SCTL_LSMODE != 0
    }

    /// Target CPU was started and has not been reset since.
    pub fn is_running(&self, id: EngineId) -> bool {
        let cpuctl = self.bar0_peek(descriptor_for(id).reg(regs::FALCON_CPUCTL));
        cpuctl & bits::CPUCTL_HALTED == 0
    }

    fn slot(&self, addr: u32) -> Option<&Slot> {
        self.bar0.iter().find(|slot| slot.used && slot.addr == addr)
    }

    fn slot_mut(&mut self, addr: u32) -> Result<&mut Slot> {
        let index = match self.bar0.iter().position(|slot| slot.used && slot.addr == addr) {
            Some(index) => index,
            None => {
                let free = self
                    .bar0
                    .iter()
                    .position(|slot| !slot.used)
                    .ok_or(AcrError::HardwareTimeout(Poll::Bar0(addr)))?;
                self.bar0[free] = Slot {
                    addr,
                    value: 0,
                    writes: 0,
                    used: true,
                };
                free
            }
        };
        Ok(&mut self.bar0[index])
    }

    fn check_bus(&self, addr: u32) -> Result<()> {
        if self.faults.bar0_timeout_at == Some(addr) {
            return Err(AcrError::HardwareTimeout(Poll::Bar0(addr)));
        }
        Ok(())
    }

    // Every bus access moves its value through a general-purpose register and
    // spills onto the stack.
    fn touch(&mut self, value: u32) {
        self.gprs[self.bus_ops % GPRS] = value;
        self.bus_ops = self.bus_ops.wrapping_add(1);
        self.stack_dirty = true;
    }

    fn allocate_mutex_id(&mut self) -> u32 {
        if self.faults.mutex_ids_exhausted {
            return bits::MUTEX_ID_EXHAUSTED;
        }
        let id = self.next_mutex_id;
        self.next_mutex_id = self.next_mutex_id % (bits::MUTEX_ID_EXHAUSTED - 1) + 1;
        id
    }

    fn write_mutex(&mut self, addr: u32, value: u32) -> Result<()> {
        let slot = self.slot_mut(addr)?;
        slot.writes += 1;
        let current = slot.value;
        if value == bits::MUTEX_UNLOCKED {
            slot.value = bits::MUTEX_UNLOCKED;
            if current != bits::MUTEX_UNLOCKED {
                self.mutex_releases += 1;
            }
        } else if current == bits::MUTEX_UNLOCKED {
            slot.value = value;
        }
        Ok(())
    }

    fn reset_target(&mut self, desc: &EngineDescriptor) {
        self.bar0_poke(desc.reg(regs::FALCON_SCTL), 0);
        self.bar0_poke(desc.reg(regs::FALCON_CPUCTL), bits::CPUCTL_HALTED);
        self.bar0_poke(desc.reg(regs::FALCON_BOOTVEC), 0);
        self.bar0_poke(
            desc.reg(regs::FALCON_DMACTL),
            bits::DMACTL_DMEM_SCRUBBING | bits::DMACTL_IMEM_SCRUBBING,
        );
    }

    fn coprocessor_command(&mut self, command: u32) {
        if self.faults.coprocessor_silent {
            return;
        }
        let target = EngineId::from_u8((command & 0xff) as u8);
        let result = match (command >> bits::COPROC_CMD_SHIFT, target) {
            (bits::COPROC_CMD_UNLOAD, Ok(id)) => {
                let desc = descriptor_for(id);
                self.reset_target(desc);
                self.bar0_poke(desc.reg(regs::FALCON_DMACTL), 0);
                for plm in desc.plm.iter() {
                    self.bar0_poke(plm, bits::PLM_OPEN);
                }
                0
            }
            _ => 1,
        };
        let coproc = descriptor_for(self.coprocessor);
        self.bar0_poke(coproc.reg(regs::FALCON_MAILBOX1), bits::COPROC_ACK | result);
    }
}

fn thermometer(floor: u32) -> u32 {
    if floor >= 32 {
        u32::MAX
    } else {
        (1u32 << floor) - 1
    }
}

fn target_at(addr: u32) -> Option<(&'static EngineDescriptor, u32)> {
    ENGINE_DESCRIPTORS
        .iter()
        .find(|desc| addr >= desc.bar0_base && addr < desc.bar0_base + TARGET_WINDOW)
        .map(|desc| (desc, addr - desc.bar0_base))
}

fn is_mutex_register(addr: u32) -> bool {
    let end = regs::mutex(regs::MUTEX_DOMAINS);
    (regs::MUTEX_BASE..end).contains(&addr) && (addr - regs::MUTEX_BASE) % 4 == 0
}

impl Falcon for SimFalcon {
    fn csb_read(&mut self, reg: Csb) -> u32 {
        self.csb[reg.index()]
    }

    fn csb_write(&mut self, reg: Csb, value: u32) {
        match reg {
            Csb::CpuctlAlias if self.faults.alias_stuck => {}
            Csb::ScpCtl if !self.faults.scp_reset_stuck => {
                let reset = bits::SCPCTL_SEQ_CLEAR | bits::SCPCTL_PIPE_RESET;
                if value & reset != 0 {
                    self.scp = [0; SCP_REGS];
                }
                self.csb[reg.index()] = value & !reset;
            }
            Csb::Mailbox0 => {
                if self.mailbox0_writes < MAILBOX_LOG {
                    self.mailbox0_log[self.mailbox0_writes] = value;
                }
                self.mailbox0_writes += 1;
                self.csb[reg.index()] = value;
            }
            _ => self.csb[reg.index()] = value,
        }
    }

    fn bar0_read(&mut self, addr: u32) -> Result<u32> {
        self.check_bus(addr)?;
        if self.faults.bar0_read_timeout_at == Some(addr) {
            return Err(AcrError::HardwareTimeout(Poll::Bar0(addr)));
        }
        let value = if addr == regs::MUTEX_ID_ACQUIRE {
            self.allocate_mutex_id()
        } else {
            let value = self.bar0_peek(addr);
            if let Some((desc, regs::FALCON_DMACTL)) = target_at(addr) {
                // scrub finishes one read after it is observed
                if self.faults.scrub_stuck != Some(desc.id) {
                    let scrubbing = bits::DMACTL_DMEM_SCRUBBING | bits::DMACTL_IMEM_SCRUBBING;
                    self.bar0_poke(addr, value & !scrubbing);
                }
            }
            value
        };
        self.touch(value);
        Ok(value)
    }

    fn bar0_write(&mut self, addr: u32, value: u32) -> Result<()> {
        self.check_bus(addr)?;
        self.touch(value);
        if is_mutex_register(addr) {
            return self.write_mutex(addr, value);
        }

        let slot = self.slot_mut(addr)?;
        slot.value = value;
        slot.writes += 1;

        if addr == regs::SECURE_SCRATCH_HANDOFF && value != 0 {
            self.mutex_at_handoff = Some(self.bar0_peek(regs::mutex(self.mutex_domain)));
        }
        if let Some((desc, offset)) = target_at(addr) {
            match offset {
                regs::FALCON_ENGINE if value & bits::ENGINE_RESET != 0 => self.reset_target(desc),
                regs::FALCON_MAILBOX0 if desc.id == self.coprocessor => {
                    self.coprocessor_command(value)
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn set_stack_pointer(&mut self, sp: u32) {
        self.sp = sp;
    }

    fn set_stack_bottom(&mut self, bottom: u32) {
        self.stack_bottom = bottom;
    }

    fn install_fail_stop_vector(&mut self) {
        self.fail_stop_vector = true;
    }

    fn clear_interrupt_enables(&mut self) {
        self.interrupts_enabled = false;
    }

    fn set_stack_canary(&mut self, canary: u32) {
        self.canary = Some(canary);
    }

    fn scp_forget_signature(&mut self) {
        self.scp_signature = false;
    }

    fn scp_zero_registers(&mut self) {
        self.scp = [0; SCP_REGS];
    }

    fn zero_gprs(&mut self) {
        self.gprs = [0; GPRS];
    }

    fn scrub_stack(&mut self) {
        self.stack_dirty = false;
    }

    fn halt(&mut self) -> ! {
        panic!(
            "falcon halted, MAILBOX0={:#010x}",
            self.csb[Csb::Mailbox0.index()]
        );
    }
}

/// One completed DMA transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaLoad {
    pub target: EngineId,
    pub segment: Segment,
    pub fb_offset: u64,
    pub dst: u32,
    pub len: u32,
}

const DMA_LOG: usize = 32;

/// DMA engine that records transfers instead of moving bytes.
#[derive(Debug, Default)]
pub struct SimDma {
    loads: [Option<DmaLoad>; DMA_LOG],
    count: usize,
    /// Transfers into this target never complete.
    pub fail_on: Option<EngineId>,
}

impl SimDma {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loads(&self) -> impl Iterator<Item = &DmaLoad> {
        self.loads[..self.count.min(DMA_LOG)].iter().flatten()
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl UcodeLoader for SimDma {
    fn dma_load(
        &mut self,
        target: &EngineDescriptor,
        segment: Segment,
        fb_offset: u64,
        dst: u32,
        len: u32,
    ) -> Result<()> {
        if self.fail_on == Some(target.id) {
            return Err(AcrError::HardwareTimeout(Poll::Dma(target.id)));
        }
        if self.count < DMA_LOG {
            self.loads[self.count] = Some(DmaLoad {
                target: target.id,
                segment,
                fb_offset,
                dst,
                len,
            });
        }
        self.count += 1;
        Ok(())
    }
}

/// Lay out a signed ucode image in `out`: manifest, then code and data filled
/// with a per-falcon pattern. Returns the image length; parse exactly
/// `&out[..len]`, since the signature covers everything after the manifest.
pub fn build_image(
    out: &mut [u8],
    manifest: UcodeManifest,
    key: &SigningKey,
) -> core::result::Result<usize, ContractError> {
    manifest.validate()?;
    let code_end = manifest.code_offset as usize + manifest.code_size as usize;
    let data_end = manifest.data_offset as usize + manifest.data_size as usize;
    let len = code_end.max(data_end);
    if out.len() < len {
        return Err(ContractError::InvalidLength);
    }

    for (i, byte) in out[MANIFEST_LEN..len].iter_mut().enumerate() {
        *byte = (i as u8) ^ manifest.falcon_id;
    }

    let digest = blake3::hash(&out[MANIFEST_LEN..len]);
    let mut block = [0u8; SIGNED_BLOCK_LEN];
    signed_block(&manifest, digest.as_bytes(), &mut block);
    let signature = key.sign(&block).to_bytes();
    out[..MANIFEST_LEN].copy_from_slice(&manifest.with_signature(signature).to_bytes());
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use acr_contract::UcodeImage;

    #[test]
    fn mutex_register_only_takes_when_unlocked() {
        let mut sim = SimFalcon::new(&AcrConfig::default());
        let reg = regs::mutex(3);
        sim.bar0_write(reg, 7).unwrap();
        sim.bar0_write(reg, 9).unwrap();
        assert_eq!(sim.bar0_peek(reg), 7);
        sim.bar0_write(reg, bits::MUTEX_UNLOCKED).unwrap();
        assert_eq!(sim.mutex_releases(), 1);
        assert_eq!(sim.write_count(reg), 3);
    }

    #[test]
    fn target_reset_scrubs_then_settles() {
        let mut sim = SimFalcon::new(&AcrConfig::default());
        let pmu = descriptor_for(EngineId::Pmu);
        sim.bar0_poke(pmu.reg(regs::FALCON_SCTL), bits::SCTL_LSMODE);
        sim.bar0_write(pmu.reg(regs::FALCON_ENGINE), bits::ENGINE_RESET).unwrap();

        assert!(!sim.is_ls(EngineId::Pmu));
        let first = sim.bar0_read(pmu.reg(regs::FALCON_DMACTL)).unwrap();
        assert_ne!(first & bits::DMACTL_IMEM_SCRUBBING, 0);
        assert_eq!(sim.bar0_read(pmu.reg(regs::FALCON_DMACTL)).unwrap(), 0);
    }

    #[test]
    fn injected_bus_timeout() {
        let mut sim = SimFalcon::new(&AcrConfig::default());
        sim.faults.bar0_timeout_at = Some(regs::PMC_BOOT_42);
        assert_eq!(
            sim.bar0_read(regs::PMC_BOOT_42),
            Err(AcrError::HardwareTimeout(Poll::Bar0(regs::PMC_BOOT_42)))
        );
    }

    #[test]
    fn built_image_parses() {
        let key = SigningKey::from_bytes(&[1; 32]);
        let mut buf = [0u8; 1024];
        let manifest = UcodeManifest::new(EngineId::Fecs, 0, 512, 256, 0, 4);
        let len = build_image(&mut buf, manifest, &key).unwrap();
        assert_eq!(len, MANIFEST_LEN + 768);
        let image = UcodeImage::parse(&buf[..len], 0x10_0000).unwrap();
        assert_eq!(image.code().len(), 512);
        assert_ne!(image.manifest.signature, [0u8; 64]);
    }
}
