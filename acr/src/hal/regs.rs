//! BAR0 register map.
//!
//! Falcon-relative offsets are added to `EngineDescriptor::bar0_base`; the
//! rest are absolute chip addresses.

// Falcon window.
pub const FALCON_MAILBOX0: u32 = 0x040;
pub const FALCON_MAILBOX1: u32 = 0x044;
pub const FALCON_CPUCTL: u32 = 0x100;
pub const FALCON_BOOTVEC: u32 = 0x104;
pub const FALCON_DMACTL: u32 = 0x10c;
pub const FALCON_IMEMC: u32 = 0x180;
pub const FALCON_IMEMD: u32 = 0x184;
pub const FALCON_IMEMT: u32 = 0x188;
pub const FALCON_DMEMC: u32 = 0x1c0;
pub const FALCON_DMEMD: u32 = 0x1c4;
pub const FALCON_SCTL: u32 = 0x240;
pub const FALCON_ENGINE: u32 = 0x3c0;

// Chip identification.
pub const PMC_BOOT_42: u32 = 0x0000_0a00;

// Fuses and the FPF shadow.
pub const FUSE_OPT_PRIV_SEC_EN: u32 = 0x0082_1434;
pub const FUSE_OPT_UCODE_REV: u32 = 0x0082_1500;
pub const FPF_UCODE_REV: u32 = 0x0082_0140;

// Write-protected region, 4 KiB granularity.
pub const PFB_WPR_ADDR_LO: u32 = 0x001f_a824;
pub const PFB_WPR_ADDR_HI: u32 = 0x001f_a828;
pub const WPR_ADDR_SHIFT: u32 = 12;

// Hardware mutex arbiter.
pub const MUTEX_ID_ACQUIRE: u32 = 0x0084_0488;
pub const MUTEX_ID_RELEASE: u32 = 0x0084_048c;
pub const MUTEX_BASE: u32 = 0x0084_0580;
pub const MUTEX_DOMAINS: u8 = 16;

pub const fn mutex(domain: u8) -> u32 {
    MUTEX_BASE + 4 * domain as u32
}

// Privilege-gated secure scratch registers.
pub const SECURE_SCRATCH_BL_STATUS: u32 = 0x0011_8300;
pub const SECURE_SCRATCH_FWSEC_STATUS: u32 = 0x0011_8304;
pub const SECURE_SCRATCH_HANDOFF: u32 = 0x0011_8308;
pub const SECURE_SCRATCH_HANDOFF_TAG: u32 = 0x0011_830c;
