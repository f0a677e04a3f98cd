//! The work each boot phase performs once the trust checks have passed.

use acr_contract::{descriptor_for, EngineId};

use crate::config::AcrConfig;
use crate::crypto::{signed_block, CryptoEngine, Verdict};
use crate::errors::{AcrError, Result, TrustFailure};
use crate::hal::{bits, Falcon};
use crate::loader::UcodeLoader;
use crate::scrub::Scratch;
use crate::trust;

use super::target::{self, BootTable, BootTarget};

/// Check one image's signature, then its version against the revocation
/// floors. The digest and signed block pass through `scratch` so cleanup can
/// wipe them.
pub fn verify<H: Falcon, C: CryptoEngine>(
    hal: &mut H,
    crypto: &mut C,
    scratch: &mut Scratch,
    target: &BootTarget<'_>,
) -> Result<()> {
    let production = trust::is_production(hal)?;
    let manifest = &target.image.manifest;
    let slot = trust::key_slot(manifest, production)?;

    scratch.digest = crypto.hash(target.image.payload());
    signed_block(manifest, &scratch.digest, &mut scratch.signed_block);
    match crypto.verify_signature(&scratch.signed_block, &manifest.signature, slot) {
        Verdict::Valid => {}
        Verdict::Invalid => {
            log::warn!("signature rejected for {:?}", target.id());
            return Err(AcrError::SignatureInvalid(target.id()));
        }
    }
    trust::check_image_version(hal, manifest)
}

/// Reset, lock, load and raise one target to LS mode.
fn load_and_raise<H: Falcon, L: UcodeLoader>(
    hal: &mut H,
    loader: &mut L,
    config: &AcrConfig,
    target: &BootTarget<'_>,
) -> Result<()> {
    let desc = target.descriptor;
    target::reset(hal, desc, config.poll_budget)?;
    target::set_plms(hal, desc, bits::PLM_LEVEL3_ONLY)?;
    target::load(hal, loader, target)?;
    target::set_boot_vector(hal, target)?;
    target::raise_ls(hal, desc)?;
    target::set_plms(hal, desc, bits::PLM_LS)?;
    log::debug!("{:?} raised to LS", desc.id);
    Ok(())
}

/// Verify every image, then bring up every target. Nothing is touched until
/// all signatures have passed.
pub fn bootstrap<H: Falcon, C: CryptoEngine, L: UcodeLoader>(
    hal: &mut H,
    crypto: &mut C,
    loader: &mut L,
    config: &AcrConfig,
    scratch: &mut Scratch,
    table: &BootTable<'_>,
) -> Result<()> {
    for target in table.iter() {
        verify(hal, crypto, scratch, target)?;
    }
    for target in table.iter() {
        load_and_raise(hal, loader, config, target)?;
    }
    Ok(())
}

pub fn subordinate<H: Falcon>(hal: &mut H, table: &BootTable<'_>, id: EngineId) -> Result<()> {
    let target = table.find(id).ok_or(TrustFailure::TargetNotManaged(id))?;
    if !target::is_ls(hal, target.descriptor)? {
        return Err(TrustFailure::TargetNotSecure(id).into());
    }
    target::set_boot_vector(hal, target)?;
    target::start_cpu(hal, target.descriptor)?;
    log::debug!("{:?} started at {:#x}", id, target.boot_vector());
    Ok(())
}

/// Re-lock after power-gate exit: the WPR contents were verified by Bootstrap.
pub fn power_gate_lock<H: Falcon, L: UcodeLoader>(
    hal: &mut H,
    loader: &mut L,
    config: &AcrConfig,
    table: &BootTable<'_>,
) -> Result<()> {
    for target in table.iter() {
        load_and_raise(hal, loader, config, target)?;
    }
    Ok(())
}

pub fn unload<H: Falcon>(hal: &mut H, config: &AcrConfig, table: &BootTable<'_>) -> Result<()> {
    for target in table.iter() {
        let desc = target.descriptor;
        target::reset(hal, desc, config.poll_budget)?;
        target::lower_ls(hal, desc)?;
        target::set_plms(hal, desc, bits::PLM_OPEN)?;
        log::debug!("{:?} lowered", desc.id);
    }
    Ok(())
}

pub fn unload_via_coprocessor<H: Falcon>(
    hal: &mut H,
    config: &AcrConfig,
    table: &BootTable<'_>,
) -> Result<()> {
    let coprocessor = descriptor_for(config.coprocessor);
    for target in table.iter() {
        target::coprocessor_unload(hal, coprocessor, target.id(), config.poll_budget)?;
        log::debug!("{:?} lowered by {:?}", target.id(), config.coprocessor);
    }
    Ok(())
}
