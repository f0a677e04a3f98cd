//! Field values for the registers in [`super::regs`] and [`super::Csb`].

// HWCFG: DMEM size in 256-byte blocks.
pub const HWCFG_DMEM_SIZE_SHIFT: u32 = 9;
pub const HWCFG_DMEM_SIZE_MASK: u32 = 0x1ff;
pub const DMEM_BLOCK: u32 = 256;

pub const CPUCTL_STARTCPU: u32 = 1 << 1;
pub const CPUCTL_HALTED: u32 = 1 << 4;
pub const CPUCTL_ALIAS_EN: u32 = 1 << 6;

pub const DMACTL_REQUIRE_CTX: u32 = 1 << 0;
pub const DMACTL_DMEM_SCRUBBING: u32 = 1 << 1;
pub const DMACTL_IMEM_SCRUBBING: u32 = 1 << 2;

pub const SCTL_LSMODE: u32 = 1 << 0;
pub const SCTL_HSMODE: u32 = 1 << 1;
pub const SCTL_LSMODE_LEVEL_SHIFT: u32 = 4;
pub const SCTL_LSMODE_LEVEL_MASK: u32 = 0x3 << SCTL_LSMODE_LEVEL_SHIFT;
pub const SCTL_RESET_LVLM_EN: u32 = 1 << 9;
pub const SCTL_STALLREQ_CLR_EN: u32 = 1 << 10;
pub const SCTL_AUTH_EN: u32 = 1 << 14;

/// Level LS falcons run at.
pub const LS_LEVEL: u32 = 2;

pub const BUSERR_REPORT_EN: u32 = 1 << 0;
pub const BUSERR_REPORT_STRICT: u32 = 1 << 1;

pub const SCPCTL_SEQ_CLEAR: u32 = 1 << 0;
pub const SCPCTL_PIPE_RESET: u32 = 1 << 1;

pub const ENGINE_RESET: u32 = 1 << 0;

pub const MEMC_AINCW: u32 = 1 << 24;
pub const MEMC_SECURE: u32 = 1 << 28;

// Privilege level masks: read mask in bits 3..0, write mask in bits 7..4,
// bit n set = level n allowed.
pub const PLM_LEVEL3_ONLY: u32 = 0x88;
pub const PLM_LS: u32 = 0xcc;
pub const PLM_OPEN: u32 = 0xff;

pub const PRIV_SEC_EN: u32 = 1 << 0;

pub const MUTEX_UNLOCKED: u32 = 0;
pub const MUTEX_ID_NONE: u32 = 0;
pub const MUTEX_ID_EXHAUSTED: u32 = 0xff;

/// Value an earlier stage leaves in its secure scratch register on success.
pub const STAGE_SUCCESS: u32 = 0xac5e_c0de;

// PMC_BOOT_42: architecture and implementation.
pub const BOOT_42_CHIP_SHIFT: u32 = 20;
pub const BOOT_42_CHIP_MASK: u32 = 0x3ff;

// Co-processor mailbox protocol.
pub const COPROC_CMD_SHIFT: u32 = 16;
pub const COPROC_CMD_UNLOAD: u32 = 0x0a;
pub const COPROC_ACK: u32 = 1 << 31;
pub const COPROC_RESULT_MASK: u32 = 0xff;
