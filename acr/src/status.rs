//! Result channel and cleanup.
//!
//! MAILBOX0 carries the status and MAILBOX1 the build version. The sentinel
//! goes out before any real work; the final status is the last write of the
//! run, after which every secret is scrubbed.

use acr_contract::{BootPhase, HandoffRecord, StatusCode, INVALID_VERSION};

use crate::crypto::CryptoEngine;
use crate::errors::Result;
use crate::hal::{Csb, Falcon};
use crate::handoff::HandoffChannel;
use crate::mutex::{self, SecureMutexToken};
use crate::scrub::{self, Scratch};

/// What a finished run left in the result channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub status: StatusCode,
    pub version: u32,
}

pub fn begin<H: Falcon>(hal: &mut H) {
    hal.csb_write(Csb::Mailbox1, INVALID_VERSION);
    hal.csb_write(Csb::Mailbox0, StatusCode::StartedNotFinished.into());
}

/// Hand off, release, report, scrub. Runs on every exit path once `begin` has.
///
/// The record is published while the mutex is still held, and only once the
/// phase's own work has `started`: a run refused before that leaves its
/// predecessor's record in place. A failed run that did start replaces any
/// stale success. A failed release only overrides success and never
/// re-publishes.
#[allow(clippy::too_many_arguments)]
pub fn finish<H: Falcon, C: CryptoEngine>(
    hal: &mut H,
    crypto: &mut C,
    scratch: &mut Scratch,
    channel: &mut HandoffChannel,
    phase: BootPhase,
    build_version: u32,
    token: Option<SecureMutexToken>,
    started: bool,
    outcome: Result<()>,
) -> Report {
    let mut outcome = outcome;

    if let (true, Some(producer)) = (started && token.is_some(), phase.produces_handoff()) {
        let record = match outcome {
            Ok(()) => HandoffRecord::completed(producer, build_version),
            Err(_) => HandoffRecord::failed(producer),
        };
        if let Err(err) = channel.write(hal, crypto, scratch, record) {
            outcome = outcome.and(Err(err));
        }
    }

    if let Some(token) = token {
        if let Err(err) = mutex::release(hal, token) {
            outcome = outcome.and(Err(err));
        }
    }

    let report = match outcome {
        Ok(()) => Report {
            status: StatusCode::Success,
            version: build_version,
        },
        Err(err) => {
            log::error!("{:?} failed: {}", phase, err);
            Report {
                status: err.into(),
                version: INVALID_VERSION,
            }
        }
    };

    hal.csb_write(Csb::Mailbox1, report.version);
    hal.csb_write(Csb::Mailbox0, report.status.into());
    scrub::scrub_all(hal, scratch);
    report
}
