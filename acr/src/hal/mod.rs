//! Hardware access for the executing falcon.
//!
//! Orchestration code never touches a raw pointer or an inline instruction; it
//! goes through [`Falcon`], implemented once per target core and once by the
//! simulator in [`crate::sim`].

use crate::errors::Result;

pub mod bits;
pub mod regs;

/// Registers on the executing falcon's local control bus.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Csb {
    Hwcfg,
    EngineId,
    Sctl,
    CpuctlAlias,
    BusErrCtl,
    ScpCtl,
    ResetPlm,
    Bar0Timeout,
    Mailbox0,
    Mailbox1,
}

impl Csb {
    pub const COUNT: usize = 10;

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// The narrow surface the orchestrator needs from a falcon core.
pub trait Falcon {
    fn csb_read(&mut self, reg: Csb) -> u32;
    fn csb_write(&mut self, reg: Csb, value: u32);

    /// System-bus read; a bus that never answers surfaces as `HardwareTimeout`.
    fn bar0_read(&mut self, addr: u32) -> Result<u32>;
    fn bar0_write(&mut self, addr: u32, value: u32) -> Result<()>;

    fn set_stack_pointer(&mut self, sp: u32);
    /// Stack-underflow trap boundary.
    fn set_stack_bottom(&mut self, bottom: u32);
    fn install_fail_stop_vector(&mut self);
    fn clear_interrupt_enables(&mut self);
    fn set_stack_canary(&mut self, canary: u32);

    fn scp_forget_signature(&mut self);
    fn scp_zero_registers(&mut self);
    fn zero_gprs(&mut self);
    fn scrub_stack(&mut self);

    fn halt(&mut self) -> !;
}

/// Poll `read` until `done` holds, at most `budget` times.
pub(crate) fn poll<F, D>(budget: u32, mut read: F, done: D) -> Result<bool>
where
    F: FnMut() -> Result<u32>,
    D: Fn(u32) -> bool,
{
    for _ in 0..budget {
        if done(read()?) {
            return Ok(true);
        }
    }
    Ok(false)
}
