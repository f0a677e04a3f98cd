//! Boot orchestrator.
//!
//! An [`Acr`] is bound to one [`BootPhase`] when it is built and runs it once.
//! The run always follows the same spine: entry sanitization, the started
//! sentinel, mutex acquisition, trust checks, the phase's own work, then
//! cleanup. The first failure skips straight to cleanup; only a run that
//! reached its phase work publishes a handoff record.

mod phases;
pub mod target;

pub use target::{BootTable, BootTarget};

use acr_contract::BootPhase;

use crate::config::AcrConfig;
use crate::crypto::CryptoEngine;
use crate::entry_guard;
use crate::errors::{Result, Unrecoverable};
use crate::hal::Falcon;
use crate::handoff::{self, HandoffChannel};
use crate::loader::UcodeLoader;
use crate::mutex::{self, SecureMutexToken};
use crate::scrub::Scratch;
use crate::status::{self, Report};
use crate::trust;

/// How an execution ended. Both variants are final: the falcon halts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Result channel written, secrets scrubbed.
    Halted(Report),
    /// Entry sanitization could not finish; nothing was reported.
    HaltedUnrecoverable(Unrecoverable),
}

pub struct Acr<'a, H, C, L> {
    phase: BootPhase,
    hal: &'a mut H,
    crypto: &'a mut C,
    loader: &'a mut L,
    config: &'a AcrConfig,
    table: BootTable<'a>,
    scratch: Scratch,
    handoff: HandoffChannel,
    started: bool,
}

impl<'a, H, C, L> Acr<'a, H, C, L>
where
    H: Falcon,
    C: CryptoEngine,
    L: UcodeLoader,
{
    pub fn new(
        phase: BootPhase,
        hal: &'a mut H,
        crypto: &'a mut C,
        loader: &'a mut L,
        config: &'a AcrConfig,
        table: BootTable<'a>,
    ) -> Self {
        Self {
            phase,
            hal,
            crypto,
            loader,
            config,
            table,
            scratch: Scratch::new(),
            handoff: HandoffChannel::new(),
            started: false,
        }
    }

    pub fn phase(&self) -> BootPhase {
        self.phase
    }

    pub fn execute(mut self) -> Terminal {
        if let Err(cause) = entry_guard::sanitize(self.hal, self.crypto, self.config, self.phase) {
            log::error!("entry sanitization failed: {}", cause);
            return Terminal::HaltedUnrecoverable(cause);
        }
        status::begin(self.hal);

        let mut token = None;
        let outcome = self.run(&mut token);
        let report = status::finish(
            self.hal,
            self.crypto,
            &mut self.scratch,
            &mut self.handoff,
            self.phase,
            self.config.build_version,
            token,
            self.started,
            outcome,
        );
        log::debug!("{:?} finished: {:?}", self.phase, report);
        Terminal::Halted(report)
    }

    fn run(&mut self, token: &mut Option<SecureMutexToken>) -> Result<()> {
        *token = Some(mutex::acquire(self.hal, self.config.mutex_domain)?);

        trust::validate(self.hal, self.config, self.phase, &self.table)?;
        if self.phase.requires_bootstrap() {
            let record =
                self.handoff
                    .check(self.hal, self.crypto, &mut self.scratch, BootPhase::Bootstrap)?;
            handoff::require_build(&record, self.config.build_version)?;
        }

        self.started = true;
        match self.phase {
            BootPhase::Bootstrap => phases::bootstrap(
                self.hal,
                self.crypto,
                self.loader,
                self.config,
                &mut self.scratch,
                &self.table,
            ),
            BootPhase::Subordinate(id) => phases::subordinate(self.hal, &self.table, id),
            BootPhase::PowerGateLock => {
                phases::power_gate_lock(self.hal, self.loader, self.config, &self.table)
            }
            BootPhase::Unload => phases::unload(self.hal, self.config, &self.table),
            BootPhase::UnloadViaCoprocessor => {
                phases::unload_via_coprocessor(self.hal, self.config, &self.table)
            }
        }
    }
}

/// Run `phase` and stop the falcon. A fail-stop spins forever rather than
/// halting, so nothing can resume it.
pub fn enter<H, C, L>(
    phase: BootPhase,
    hal: &mut H,
    crypto: &mut C,
    loader: &mut L,
    config: &AcrConfig,
    table: BootTable<'_>,
) -> !
where
    H: Falcon,
    C: CryptoEngine,
    L: UcodeLoader,
{
    match Acr::new(phase, hal, crypto, loader, config, table).execute() {
        Terminal::Halted(_) => hal.halt(),
        Terminal::HaltedUnrecoverable(_) => loop {
            core::hint::spin_loop();
        },
    }
}
