//! Revocation and trust validation.
//!
//! Every check is independently fatal and none is retried.

use acr_contract::{BootPhase, UcodeManifest, MAX_RECORD_VERSION};
use acr_contract::manifest::FLAG_DEBUG_SIGNED;

use crate::config::AcrConfig;
use crate::crypto::KeySlot;
use crate::errors::{AcrError, Result, Stage, TrustFailure};
use crate::hal::{bits, regs, Csb, Falcon};
use crate::orchestrator::BootTable;

/// Revocation floor encoded by a thermometer-coded fuse field: the number of
/// the highest set bit, so burning more fuses can only raise it.
pub fn fuse_floor(bits: u32) -> u32 {
    u32::BITS - bits.leading_zeros()
}

pub fn is_revoked(build_version: u32, floor: u32) -> bool {
    build_version < floor
}

/// Run the checks that apply to `phase`, in order. The predecessor handoff is
/// checked separately because it needs the crypto engine.
pub fn validate<H: Falcon>(
    hal: &mut H,
    config: &AcrConfig,
    phase: BootPhase,
    table: &BootTable<'_>,
) -> Result<()> {
    check_chip(hal, config)?;
    check_engine(hal, config)?;
    check_revocation(hal, config.build_version)?;
    if config.require_prior_stages {
        check_chain(hal)?;
    }
    check_production_policy(hal, config)?;
    check_table(table)?;
    if phase == BootPhase::Bootstrap {
        check_memory_range(hal, table)?;
    }
    log::debug!("trust checks passed for {:?}", phase);
    Ok(())
}

pub fn check_chip<H: Falcon>(hal: &mut H, config: &AcrConfig) -> Result<()> {
    let boot42 = hal.bar0_read(regs::PMC_BOOT_42)?;
    let chip = ((boot42 >> bits::BOOT_42_CHIP_SHIFT) & bits::BOOT_42_CHIP_MASK) as u16;
    if !config.supported_chips.contains(&chip) {
        log::warn!("unsupported chip {:#x}", chip);
        return Err(TrustFailure::ChipMismatch(chip).into());
    }
    Ok(())
}

pub fn check_engine<H: Falcon>(hal: &mut H, config: &AcrConfig) -> Result<()> {
    let found = hal.csb_read(Csb::EngineId);
    if found != config.engine.as_u8() as u32 {
        log::warn!("engine id {:#x} does not match build", found);
        return Err(TrustFailure::EngineMismatch {
            expected: config.engine,
            found,
        }
        .into());
    }
    Ok(())
}

/// Build version against both anchors. A floor that cannot be read, or a
/// build with no version (or one too large to hand off), is treated as revoked.
pub fn check_revocation<H: Falcon>(hal: &mut H, build_version: u32) -> Result<()> {
    if build_version == 0 || build_version > MAX_RECORD_VERSION {
        return Err(TrustFailure::VersionUnavailable.into());
    }
    let fuse = read_floor(hal, regs::FUSE_OPT_UCODE_REV)?;
    if is_revoked(build_version, fuse) {
        log::warn!("build {} revoked by fuse floor {}", build_version, fuse);
        return Err(TrustFailure::FuseRevoked {
            build: build_version,
            floor: fuse,
        }
        .into());
    }
    let fpf = read_floor(hal, regs::FPF_UCODE_REV)?;
    if is_revoked(build_version, fpf) {
        log::warn!("build {} revoked by FPF floor {}", build_version, fpf);
        return Err(TrustFailure::FpfRevoked {
            build: build_version,
            floor: fpf,
        }
        .into());
    }
    Ok(())
}

/// A ucode image older than either floor must not reach LS mode, whatever
/// the build running it.
pub fn check_image_version<H: Falcon>(hal: &mut H, manifest: &UcodeManifest) -> Result<()> {
    let fuse = read_floor(hal, regs::FUSE_OPT_UCODE_REV)?;
    let fpf = read_floor(hal, regs::FPF_UCODE_REV)?;
    let floor = fuse.max(fpf);
    if is_revoked(manifest.ucode_version, floor) {
        let falcon = manifest.falcon()?;
        log::warn!(
            "{:?} ucode {} revoked by floor {}",
            falcon,
            manifest.ucode_version,
            floor
        );
        return Err(TrustFailure::ImageRevoked {
            falcon,
            version: manifest.ucode_version,
            floor,
        }
        .into());
    }
    Ok(())
}

fn read_floor<H: Falcon>(hal: &mut H, addr: u32) -> Result<u32> {
    hal.bar0_read(addr)
        .map(fuse_floor)
        .map_err(|_| TrustFailure::VersionUnavailable.into())
}

pub fn check_chain<H: Falcon>(hal: &mut H) -> Result<()> {
    let stages = [
        (regs::SECURE_SCRATCH_BL_STATUS, Stage::Bootloader),
        (regs::SECURE_SCRATCH_FWSEC_STATUS, Stage::FirmwareSecurity),
    ];
    for (addr, stage) in stages {
        if hal.bar0_read(addr)? != bits::STAGE_SUCCESS {
            log::warn!("{:?} stage left no success record", stage);
            return Err(TrustFailure::ChainBroken(stage).into());
        }
    }
    Ok(())
}

/// PRIV_SEC fuse blown.
pub fn is_production<H: Falcon>(hal: &mut H) -> Result<bool> {
    Ok(hal.bar0_read(regs::FUSE_OPT_PRIV_SEC_EN)? & bits::PRIV_SEC_EN != 0)
}

pub fn check_production_policy<H: Falcon>(hal: &mut H, config: &AcrConfig) -> Result<()> {
    if !is_production(hal)? {
        return Ok(());
    }
    let sctl = hal.csb_read(Csb::Sctl);
    let missing = config.production_protections & !sctl;
    if missing != 0 {
        log::warn!("production part missing protections {:#x}", missing);
        return Err(TrustFailure::ProductionPolicy { missing }.into());
    }
    Ok(())
}

/// Every manifest must name the falcon its slot describes.
pub fn check_table(table: &BootTable<'_>) -> Result<()> {
    for target in table.iter() {
        let found = target.image.manifest.falcon_id;
        if found != target.descriptor.id.as_u8() {
            return Err(TrustFailure::FalconMismatch {
                expected: target.descriptor.id,
                found,
            }
            .into());
        }
    }
    Ok(())
}

/// The WPR as programmed into the frame-buffer controller, `[start, end)`.
pub fn wpr_range<H: Falcon>(hal: &mut H) -> Result<(u64, u64)> {
    let lo = hal.bar0_read(regs::PFB_WPR_ADDR_LO)?;
    let hi = hal.bar0_read(regs::PFB_WPR_ADDR_HI)?;
    let start = (lo as u64) << regs::WPR_ADDR_SHIFT;
    let end = (hi as u64) << regs::WPR_ADDR_SHIFT;
    if start == 0 || end <= start {
        return Err(AcrError::MemoryRangeNotConfigured);
    }
    Ok((start, end))
}

pub fn check_memory_range<H: Falcon>(hal: &mut H, table: &BootTable<'_>) -> Result<()> {
    let (start, end) = wpr_range(hal)?;
    for target in table.iter() {
        let (image_start, image_end) = target.image.fb_range();
        if image_start < start || image_end > end {
            log::warn!(
                "{:?} image [{:#x}, {:#x}) outside WPR",
                target.descriptor.id,
                image_start,
                image_end
            );
            return Err(AcrError::MemoryRangeNotConfigured);
        }
    }
    Ok(())
}

/// Key slot a manifest's signature must verify under.
pub fn key_slot(manifest: &UcodeManifest, production: bool) -> Result<KeySlot> {
    if manifest.has_flag(FLAG_DEBUG_SIGNED) {
        if production {
            let falcon = manifest.falcon()?;
            return Err(TrustFailure::DebugSignedOnProduction(falcon).into());
        }
        return Ok(KeySlot::Debug(manifest.key_index));
    }
    Ok(KeySlot::Production(manifest.key_index))
}
