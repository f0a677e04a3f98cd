//! Entry sanitization.
//!
//! Runs first, before the result channel is trusted and before any exception
//! handler exists. Nothing here can report an error: a step that cannot
//! complete ends the execution as [`Unrecoverable`], which the caller turns
//! into a fail-stop loop.

use acr_contract::BootPhase;

use crate::config::AcrConfig;
use crate::crypto::CryptoEngine;
use crate::errors::Unrecoverable;
use crate::hal::{bits, Csb, Falcon};
use crate::scrub;

/// Bring the falcon from reset into a known-safe state. Steps run in this
/// exact order.
pub fn sanitize<H: Falcon, C: CryptoEngine>(
    hal: &mut H,
    crypto: &mut C,
    config: &AcrConfig,
    phase: BootPhase,
) -> Result<(), Unrecoverable> {
    let top = stack_top(hal, config)?;
    hal.set_stack_pointer(top);

    scrub::scrub_registers(hal);
    enable_bus_error_reporting(hal);
    disable_cpuctl_alias(hal, config.poll_budget)?;

    hal.install_fail_stop_vector();
    hal.clear_interrupt_enables();
    hal.set_stack_bottom(top.saturating_sub(config.stack_size));

    reset_scp(hal, config.poll_budget)?;

    if canary_enabled(config, phase) {
        let canary = crypto.random_word().map_err(|_| Unrecoverable::TrngFailure)?;
        hal.set_stack_canary(canary);
    }

    lock_reset_privilege(hal);
    hal.csb_write(Csb::Bar0Timeout, config.bar0_timeout);

    log::debug!("entry sanitized, sp={:#x}", top);
    Ok(())
}

/// Top-of-DMEM stack pointer for this falcon. A falcon reporting no DMEM
/// cannot hold a stack at all.
pub fn stack_top<H: Falcon>(hal: &mut H, config: &AcrConfig) -> Result<u32, Unrecoverable> {
    let hwcfg = hal.csb_read(Csb::Hwcfg);
    let blocks = (hwcfg >> bits::HWCFG_DMEM_SIZE_SHIFT) & bits::HWCFG_DMEM_SIZE_MASK;
    let top = blocks
        .checked_mul(bits::DMEM_BLOCK)
        .filter(|&top| top != 0)
        .ok_or(Unrecoverable::NoStack)?;
    if config.dmem_wraps_at_top {
        top.checked_sub(4).ok_or(Unrecoverable::NoStack)
    } else {
        Ok(top)
    }
}

// Power-gate exit runs under a code-size budget that leaves no room for the canary.
fn canary_enabled(config: &AcrConfig, phase: BootPhase) -> bool {
    config.stack_canary && phase != BootPhase::PowerGateLock
}

/// Turn on strict CSB bus-error reporting. Already-enabled is fine.
pub fn enable_bus_error_reporting<H: Falcon>(hal: &mut H) {
    let ctl = hal.csb_read(Csb::BusErrCtl);
    let wanted = bits::BUSERR_REPORT_EN | bits::BUSERR_REPORT_STRICT;
    if ctl & wanted != wanted {
        hal.csb_write(Csb::BusErrCtl, ctl | wanted);
    }
}

/// The CPUCTL alias lets an outside agent restart this falcon mid-HS. Clear it
/// and keep clearing until the hardware agrees.
fn disable_cpuctl_alias<H: Falcon>(hal: &mut H, budget: u32) -> Result<(), Unrecoverable> {
    for _ in 0..budget {
        let alias = hal.csb_read(Csb::CpuctlAlias);
        if alias & bits::CPUCTL_ALIAS_EN == 0 {
            return Ok(());
        }
        hal.csb_write(Csb::CpuctlAlias, alias & !bits::CPUCTL_ALIAS_EN);
    }
    Err(Unrecoverable::AliasStuck)
}

fn reset_scp<H: Falcon>(hal: &mut H, budget: u32) -> Result<(), Unrecoverable> {
    let reset = bits::SCPCTL_SEQ_CLEAR | bits::SCPCTL_PIPE_RESET;
    hal.csb_write(Csb::ScpCtl, reset);
    for _ in 0..budget {
        if hal.csb_read(Csb::ScpCtl) & reset == 0 {
            return Ok(());
        }
    }
    Err(Unrecoverable::ScpResetTimeout)
}

/// Only level 3 may reset this falcon from here on.
pub fn lock_reset_privilege<H: Falcon>(hal: &mut H) {
    if hal.csb_read(Csb::ResetPlm) != bits::PLM_LEVEL3_ONLY {
        hal.csb_write(Csb::ResetPlm, bits::PLM_LEVEL3_ONLY);
    }
}
