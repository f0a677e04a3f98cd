// acr/tests/integration_test.rs
// End-to-end runs of every phase against the simulated chip.

mod common;

use acr::hal::{bits, regs};
use acr::{BootPhase, EngineId, Report, StatusCode, Terminal, Unrecoverable, INVALID_VERSION};
use acr_contract::{descriptor_for, HandoffRecord};
use common::{Fixture, BUILD_VERSION, TARGETS};

fn report(terminal: Terminal) -> Report {
    match terminal {
        Terminal::Halted(report) => report,
        other => panic!("expected a reported halt, got {:?}", other),
    }
}

fn handoff_record(f: &Fixture) -> HandoffRecord {
    HandoffRecord::from_word(f.sim.bar0_peek(regs::SECURE_SCRATCH_HANDOFF)).unwrap()
}

fn assert_untouched(f: &Fixture) {
    for id in TARGETS {
        let desc = descriptor_for(id);
        assert_eq!(f.sim.write_count(desc.reg(regs::FALCON_ENGINE)), 0, "{:?} reset", id);
        assert!(!f.sim.is_ls(id), "{:?} raised", id);
        for plm in desc.plm.iter() {
            assert_eq!(f.sim.write_count(plm), 0, "{:?} PLM written", id);
        }
    }
    assert_eq!(f.dma.count(), 0);
}

fn assert_scrubbed(f: &Fixture) {
    let snap = f.sim.snapshot();
    assert!(snap.gprs.iter().all(|&r| r == 0));
    assert!(snap.scp.iter().all(|&r| r == 0));
    assert!(!snap.scp_signature);
    assert!(!snap.stack_dirty);
}

#[test]
fn bootstrap_success() {
    let mut f = Fixture::new();
    f.sim.set_fuse_floor(3);
    f.sim.set_fpf_floor(4);

    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::Success);
    assert_eq!(report.version, BUILD_VERSION);
    assert_eq!(
        f.sim.mailbox0_log(),
        &[StatusCode::StartedNotFinished as u32, StatusCode::Success as u32]
    );
    assert_eq!(f.sim.snapshot().mailbox1, BUILD_VERSION);

    for id in TARGETS {
        let desc = descriptor_for(id);
        assert!(f.sim.is_ls(id));
        assert!(!f.sim.is_running(id));
        for plm in desc.plm.iter() {
            assert_eq!(f.sim.bar0_peek(plm), bits::PLM_LS);
        }
    }

    // PMU over DMA, FECS over the priv bus
    assert_eq!(f.dma.count(), 2);
    assert!(f.dma.loads().all(|load| load.target == EngineId::Pmu));
    let fecs = descriptor_for(EngineId::Fecs);
    assert_eq!(f.sim.write_count(fecs.reg(regs::FALCON_IMEMD)), 512 / 4);
    assert_eq!(f.sim.write_count(fecs.reg(regs::FALCON_DMEMD)), 256 / 4);

    assert!(handoff_record(&f).is_completed_by(BootPhase::Bootstrap));
    assert_eq!(f.sim.mutex_releases(), 1);
    assert_eq!(f.sim.bar0_peek(regs::mutex(f.config.mutex_domain)), bits::MUTEX_UNLOCKED);
    assert_scrubbed(&f);
}

#[test]
fn handoff_is_published_under_the_mutex() {
    let mut f = Fixture::new();
    assert_eq!(report(f.run(BootPhase::Bootstrap)).status, StatusCode::Success);
    let owner = f.sim.mutex_at_handoff().unwrap();
    assert_ne!(owner, bits::MUTEX_UNLOCKED);
    assert_eq!(f.sim.bar0_peek(regs::mutex(f.config.mutex_domain)), bits::MUTEX_UNLOCKED);
}

#[test]
fn invalid_signature_touches_nothing() {
    let mut f = Fixture::new();
    f.corrupt_payload(1);

    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::SignatureInvalid);
    assert_eq!(report.version, INVALID_VERSION);
    assert_untouched(&f);
    assert!(!handoff_record(&f).is_completed_by(BootPhase::Bootstrap));
    assert_eq!(f.sim.mutex_releases(), 1);
    assert_scrubbed(&f);
}

#[test]
fn unload_without_handoff() {
    let mut f = Fixture::new();
    let report = report(f.run(BootPhase::Unload));
    assert_eq!(report.status, StatusCode::HandoffMissingOrMismatched);
    assert_eq!(report.version, INVALID_VERSION);
    assert_untouched(&f);
    assert_eq!(f.sim.mutex_releases(), 1);
}

#[test]
fn busy_mutex() {
    let mut f = Fixture::new();
    let domain = f.config.mutex_domain;
    f.sim.hold_mutex(domain, 0x42);

    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::MutexBusy);
    assert_eq!(report.version, INVALID_VERSION);
    assert_eq!(f.sim.bar0_peek(regs::mutex(domain)), 0x42);
    assert_eq!(f.sim.mutex_releases(), 0);
    assert_eq!(f.sim.write_count(regs::SECURE_SCRATCH_HANDOFF), 0);
    assert_untouched(&f);
}

#[test]
fn subordinate_starts_bootstrapped_target() {
    let mut f = Fixture::new();
    assert_eq!(report(f.run(BootPhase::Bootstrap)).status, StatusCode::Success);

    let report = report(f.run(BootPhase::Subordinate(EngineId::Fecs)));
    assert_eq!(report.status, StatusCode::Success);
    assert_eq!(report.version, BUILD_VERSION);
    assert!(f.sim.is_running(EngineId::Fecs));
    assert!(!f.sim.is_running(EngineId::Pmu));

    let fecs = descriptor_for(EngineId::Fecs);
    assert_eq!(
        f.sim.bar0_peek(fecs.reg(regs::FALCON_BOOTVEC)),
        acr_contract::MANIFEST_LEN as u32 + 0x20
    );
    // subordinate runs leave the bootstrap record in place
    assert!(handoff_record(&f).is_completed_by(BootPhase::Bootstrap));
}

#[test]
fn subordinate_rejects_unmanaged_or_unbooted_targets() {
    let mut f = Fixture::new();
    let report1 = report(f.run(BootPhase::Subordinate(EngineId::Fecs)));
    assert_eq!(report1.status, StatusCode::HandoffMissingOrMismatched);

    let mut f = Fixture::new();
    f.seed_bootstrap_handoff();
    let report2 = report(f.run(BootPhase::Subordinate(EngineId::Gpccs)));
    assert_eq!(report2.status, StatusCode::TrustCheckFailed);

    // handoff present but the target was never raised
    let report3 = report(f.run(BootPhase::Subordinate(EngineId::Fecs)));
    assert_eq!(report3.status, StatusCode::TrustCheckFailed);
    assert!(!f.sim.is_running(EngineId::Fecs));
}

#[test]
fn unload_lowers_every_target_and_revokes_handoff() {
    let mut f = Fixture::new();
    assert_eq!(report(f.run(BootPhase::Bootstrap)).status, StatusCode::Success);

    let report1 = report(f.run(BootPhase::Unload));
    assert_eq!(report1.status, StatusCode::Success);
    for id in TARGETS {
        let desc = descriptor_for(id);
        assert!(!f.sim.is_ls(id));
        for plm in desc.plm.iter() {
            assert_eq!(f.sim.bar0_peek(plm), bits::PLM_OPEN);
        }
        assert_eq!(f.sim.write_count(desc.reg(regs::FALCON_ENGINE)), 4);
    }
    assert!(handoff_record(&f).is_completed_by(BootPhase::Unload));

    let report2 = report(f.run(BootPhase::Subordinate(EngineId::Fecs)));
    assert_eq!(report2.status, StatusCode::HandoffMissingOrMismatched);
}

#[test]
fn unload_via_coprocessor() {
    let mut f = Fixture::new();
    assert_eq!(report(f.run(BootPhase::Bootstrap)).status, StatusCode::Success);

    let report = report(f.run(BootPhase::UnloadViaCoprocessor));
    assert_eq!(report.status, StatusCode::Success);
    for id in TARGETS {
        assert!(!f.sim.is_ls(id));
    }
    let gsp = descriptor_for(f.config.coprocessor);
    assert_eq!(f.sim.write_count(gsp.reg(regs::FALCON_MAILBOX0)), 2);
    assert!(handoff_record(&f).is_completed_by(BootPhase::Unload));
}

#[test]
fn silent_coprocessor_times_out() {
    let mut f = Fixture::new();
    f.seed_bootstrap_handoff();
    f.sim.faults.coprocessor_silent = true;

    let report = report(f.run(BootPhase::UnloadViaCoprocessor));
    assert_eq!(report.status, StatusCode::HardwareTimeout);
    assert_eq!(report.version, INVALID_VERSION);
    assert!(!handoff_record(&f).is_completed_by(BootPhase::Unload));
    assert_eq!(f.sim.mutex_releases(), 1);
}

#[test]
fn power_gate_relock_skips_signatures_and_canary() {
    let mut f = Fixture::new();
    f.seed_bootstrap_handoff();
    f.corrupt_payload(0);

    let report = report(f.run(BootPhase::PowerGateLock));
    assert_eq!(report.status, StatusCode::Success);
    assert_eq!(f.sim.snapshot().canary, None);
    for id in TARGETS {
        assert!(f.sim.is_ls(id));
    }
    // power-gate runs publish no record of their own
    assert!(handoff_record(&f).is_completed_by(BootPhase::Bootstrap));
}

#[test]
fn revoked_build_is_refused() {
    let mut f = Fixture::new();
    f.sim.set_fuse_floor(BUILD_VERSION + 1);
    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::TrustCheckFailed);
    assert_eq!(report.version, INVALID_VERSION);
    assert_untouched(&f);
}

#[test]
fn unconfigured_wpr_is_refused() {
    let mut f = Fixture::new();
    f.sim.set_wpr(0, 0);
    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::MemoryRangeNotConfigured);
    assert_untouched(&f);
}

#[test]
fn bus_timeout_mid_bootstrap_still_releases() {
    let mut f = Fixture::new();
    let fecs = descriptor_for(EngineId::Fecs);
    f.sim.faults.bar0_timeout_at = Some(fecs.reg(regs::FALCON_BOOTVEC));

    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::HardwareTimeout);
    assert_eq!(report.version, INVALID_VERSION);
    assert_eq!(f.sim.mutex_releases(), 1);
    assert!(!handoff_record(&f).is_completed_by(BootPhase::Bootstrap));
    assert_scrubbed(&f);
}

#[test]
fn dma_failure_aborts_phase() {
    let mut f = Fixture::new();
    f.dma.fail_on = Some(EngineId::Pmu);
    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::HardwareTimeout);
    assert!(!f.sim.is_ls(EngineId::Fecs));
}

#[test]
fn stuck_alias_halts_without_reporting() {
    let mut f = Fixture::new();
    f.sim.faults.alias_stuck = true;

    assert_eq!(
        f.run(BootPhase::Bootstrap),
        Terminal::HaltedUnrecoverable(Unrecoverable::AliasStuck)
    );
    assert_eq!(f.sim.mailbox0_writes(), 0);
    assert_eq!(f.sim.write_count(regs::mutex(f.config.mutex_domain)), 0);
    assert_untouched(&f);
}

#[test]
fn unreadable_mutex_claim_is_given_back() {
    let mut f = Fixture::new();
    let reg = regs::mutex(f.config.mutex_domain);
    f.sim.faults.bar0_read_timeout_at = Some(reg);

    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::HardwareTimeout);
    assert_eq!(f.sim.bar0_peek(reg), bits::MUTEX_UNLOCKED);
    assert_eq!(f.sim.mutex_releases(), 1);
    assert_untouched(&f);
}

#[test]
fn image_below_revocation_floor_is_refused() {
    let mut f = Fixture::new();
    f.sim.set_fuse_floor(4);
    f.sim.set_fpf_floor(4);
    f.resign_image(0, 1);

    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::TrustCheckFailed);
    assert_eq!(report.version, INVALID_VERSION);
    assert_untouched(&f);
}

#[test]
fn build_too_large_for_handoff_is_refused() {
    let mut f = Fixture::with_config(acr::AcrConfig {
        build_version: 0x1_0000,
        ..common::config()
    });
    let report = report(f.run(BootPhase::Bootstrap));
    assert_eq!(report.status, StatusCode::TrustCheckFailed);
    assert_untouched(&f);
}

#[test]
fn unload_from_another_build_does_not_pair() {
    let mut f = Fixture::new();
    assert_eq!(report(f.run(BootPhase::Bootstrap)).status, StatusCode::Success);

    f.config.build_version = BUILD_VERSION + 1;
    let report = report(f.run(BootPhase::Unload));
    assert_eq!(report.status, StatusCode::HandoffMissingOrMismatched);
    for id in TARGETS {
        assert!(f.sim.is_ls(id));
    }
    assert!(handoff_record(&f).is_completed_by(BootPhase::Bootstrap));
}

#[test]
fn refused_unload_keeps_bootstrap_record() {
    let mut f = Fixture::new();
    assert_eq!(report(f.run(BootPhase::Bootstrap)).status, StatusCode::Success);

    f.sim.set_fpf_floor(BUILD_VERSION + 1);
    let refused = report(f.run(BootPhase::Unload));
    assert_eq!(refused.status, StatusCode::TrustCheckFailed);
    assert!(handoff_record(&f).is_completed_by(BootPhase::Bootstrap));

    f.sim.set_fpf_floor(0);
    let report = report(f.run(BootPhase::Unload));
    assert_eq!(report.status, StatusCode::Success);
    for id in TARGETS {
        assert!(!f.sim.is_ls(id));
    }
}
