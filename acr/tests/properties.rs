// acr/tests/properties.rs
// Result-channel, mutex and scrub properties over randomized chip states.

mod common;

use acr::hal::regs;
use acr::{BootPhase, EngineId, StatusCode, Terminal, INVALID_VERSION};
use common::{config, Fixture};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Fault {
    None,
    Busy,
    BadSignature,
    NoWpr,
    DmaStuck,
    ScrubStuck,
    BusTimeout,
}

fn fault() -> impl Strategy<Value = Fault> {
    prop_oneof![
        Just(Fault::None),
        Just(Fault::Busy),
        Just(Fault::BadSignature),
        Just(Fault::NoWpr),
        Just(Fault::DmaStuck),
        Just(Fault::ScrubStuck),
        Just(Fault::BusTimeout),
    ]
}

fn phase() -> impl Strategy<Value = BootPhase> {
    prop_oneof![
        Just(BootPhase::Bootstrap),
        Just(BootPhase::Subordinate(EngineId::Fecs)),
        Just(BootPhase::PowerGateLock),
        Just(BootPhase::Unload),
        Just(BootPhase::UnloadViaCoprocessor),
    ]
}

fn inject(f: &mut Fixture, fault: Fault) {
    match fault {
        Fault::None => {}
        Fault::Busy => {
            let domain = f.config.mutex_domain;
            f.sim.hold_mutex(domain, 0x42);
        }
        Fault::BadSignature => f.corrupt_payload(0),
        Fault::NoWpr => f.sim.set_wpr(0, 0),
        Fault::DmaStuck => f.dma.fail_on = Some(EngineId::Pmu),
        Fault::ScrubStuck => f.sim.faults.scrub_stuck = Some(EngineId::Fecs),
        Fault::BusTimeout => f.sim.faults.bar0_timeout_at = Some(regs::PMC_BOOT_42),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_run_ends_in_one_terminal_status(
        build in 1u32..12,
        fuse in 0u32..12,
        fpf in 0u32..12,
        seeded in any::<bool>(),
        phase in phase(),
        fault in fault(),
    ) {
        let mut f = Fixture::with_config(acr::AcrConfig { build_version: build, ..config() });
        f.sim.set_fuse_floor(fuse);
        f.sim.set_fpf_floor(fpf);
        if seeded {
            f.seed_bootstrap_handoff();
        }
        inject(&mut f, fault);

        let report = match f.run(phase) {
            Terminal::Halted(report) => report,
            other => return Err(TestCaseError::fail(format!("unexpected {:?}", other))),
        };

        // sentinel first, exactly one final status, and it is what MAILBOX0 holds
        let log = f.sim.mailbox0_log();
        prop_assert_eq!(log.len(), 2);
        prop_assert_eq!(log[0], StatusCode::StartedNotFinished as u32);
        prop_assert_eq!(log[1], report.status as u32);
        prop_assert!(report.status.is_terminal());

        let snap = f.sim.snapshot();
        prop_assert_eq!(snap.mailbox1, report.version);
        if report.status.is_success() {
            prop_assert_eq!(report.version, build);
        } else {
            prop_assert_eq!(report.version, INVALID_VERSION);
        }

        // revocation is decided before any phase work
        if build < fuse || build < fpf {
            prop_assert_ne!(report.status, StatusCode::Success);
        }

        // the mutex is released exactly when it was taken
        let busy = matches!(fault, Fault::Busy);
        prop_assert_eq!(f.sim.mutex_releases(), if busy { 0 } else { 1 });
        if busy {
            prop_assert_eq!(report.status, StatusCode::MutexBusy);
        }

        // nothing secret survives
        prop_assert!(snap.gprs.iter().all(|&r| r == 0));
        prop_assert!(snap.scp.iter().all(|&r| r == 0));
        prop_assert!(!snap.scp_signature);
        prop_assert!(!snap.stack_dirty);
    }

    #[test]
    fn clean_bootstrap_succeeds_iff_not_revoked(
        build in 1u32..12,
        fuse in 0u32..12,
        fpf in 0u32..12,
    ) {
        let mut f = Fixture::with_config(acr::AcrConfig { build_version: build, ..config() });
        f.sim.set_fuse_floor(fuse);
        f.sim.set_fpf_floor(fpf);

        let status = match f.run(BootPhase::Bootstrap) {
            Terminal::Halted(report) => report.status,
            other => return Err(TestCaseError::fail(format!("unexpected {:?}", other))),
        };
        let revoked = build < fuse || build < fpf;
        prop_assert_eq!(status.is_success(), !revoked);
        if revoked {
            prop_assert_eq!(status, StatusCode::TrustCheckFailed);
        }
    }
}
