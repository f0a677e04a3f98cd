//! Compiled-in build facts.

use acr_contract::EngineId;

use crate::hal::bits;

/// Chips this build accepts, as PMC_BOOT_42 architecture/implementation values.
pub const DEFAULT_SUPPORTED_CHIPS: &[u16] = &[0x172, 0x174];

/// Everything a binary "knows" about itself and its platform at build time.
#[derive(Debug, Clone)]
pub struct AcrConfig {
    /// Falcon this binary was built to run on.
    pub engine: EngineId,
    pub supported_chips: &'static [u16],
    /// Trust level embedded in this binary; checked against both revocation floors.
    pub build_version: u32,
    /// DMEM top aliases address zero on this generation, so the stack starts one word lower.
    pub dmem_wraps_at_top: bool,
    /// Distance from top of DMEM to the stack-underflow trap.
    pub stack_size: u32,
    pub stack_canary: bool,
    /// Booted through HS loaders: the bootloader and FWSEC stages must have succeeded.
    pub require_prior_stages: bool,
    /// SCTL bits that must be set when the PRIV_SEC fuse is blown.
    pub production_protections: u32,
    /// Upper bound on iterations of every hardware poll.
    pub poll_budget: u32,
    pub bar0_timeout: u32,
    pub mutex_domain: u8,
    /// Co-processor that proxies `UnloadViaCoprocessor`.
    pub coprocessor: EngineId,
}

impl Default for AcrConfig {
    fn default() -> Self {
        Self {
            engine: EngineId::Sec2,
            supported_chips: DEFAULT_SUPPORTED_CHIPS,
            build_version: 1,
            dmem_wraps_at_top: false,
            stack_size: 0x800,
            stack_canary: cfg!(feature = "stack-canary"),
            require_prior_stages: false,
            production_protections: bits::SCTL_RESET_LVLM_EN
                | bits::SCTL_STALLREQ_CLR_EN
                | bits::SCTL_AUTH_EN,
            poll_budget: 0x1_0000,
            bar0_timeout: 0x400,
            mutex_domain: 5,
            coprocessor: EngineId::Gsp,
        }
    }
}
