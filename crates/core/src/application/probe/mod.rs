// Probe Loop - measurement cycle, control polling and shutdown sequencing

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken, StopTrigger};

use crate::application::record_builder::RecordBuilder;
use crate::domain::ControlState;
use crate::port::{ControlSignal, RecordStore, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Lifecycle of one probe process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Running,
    Draining,
    Terminated,
}

/// Why a requested stop happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Control file no longer says "start"
    ControlFile,
    /// Process signal
    Signal(StopTrigger),
}

/// Terminal result of a probe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Operator asked for it; not a failure
    Stopped(StopReason),
    /// The control file could not be read or written
    ControlSignalFailure(String),
    /// A record could not be persisted
    CycleFailure(String),
    /// Connect, schema or the initial "start" write failed
    StartupFailure(String),
}

impl ProbeOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            ProbeOutcome::Stopped(_) => EXIT_REQUESTED_STOP,
            ProbeOutcome::ControlSignalFailure(_) => EXIT_CONTROL_SIGNAL_FAILURE,
            ProbeOutcome::CycleFailure(_) => EXIT_CYCLE_FAILURE,
            ProbeOutcome::StartupFailure(_) => EXIT_STARTUP_FAILURE,
        }
    }

    pub fn is_requested_stop(&self) -> bool {
        matches!(self, ProbeOutcome::Stopped(_))
    }
}

/// Probe loop owning the record store for the whole process lifetime
pub struct ProbeLoop {
    builder: RecordBuilder,
    store: Box<dyn RecordStore>,
    control: Arc<dyn ControlSignal>,
    time_provider: Arc<dyn TimeProvider>,
    interval: Duration,
    state: LoopState,
}

impl ProbeLoop {
    /// Create a probe loop around an already connected store
    pub fn new(
        builder: RecordBuilder,
        store: Box<dyn RecordStore>,
        control: Arc<dyn ControlSignal>,
        time_provider: Arc<dyn TimeProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            builder,
            store,
            control,
            time_provider,
            interval,
            state: LoopState::Init,
        }
    }

    /// Run until a stop request or a fatal error
    ///
    /// Consumes the loop: the final "stop" write and the store release
    /// happen exactly once, whatever path ends the run.
    pub async fn run(mut self, mut shutdown: ShutdownToken) -> ProbeOutcome {
        if let Err(e) = self.control.write(ControlState::Start).await {
            error!(error = %e, "Unable to write start state");
            self.store.close().await;
            self.transition(LoopState::Terminated);
            return ProbeOutcome::StartupFailure(e.to_string());
        }
        self.transition(LoopState::Running);
        info!(
            primary = %self.builder.primary(),
            backup = %self.builder.backup(),
            interval_secs = self.interval.as_secs(),
            "Probe loop started"
        );

        let outcome = self.run_cycles(&mut shutdown).await;
        self.drain(outcome).await
    }

    async fn run_cycles(&mut self, shutdown: &mut ShutdownToken) -> ProbeOutcome {
        let mut cycles: u64 = 0;
        loop {
            if let Some(trigger) = shutdown.trigger() {
                info!(?trigger, "Stopping loop (signal-triggered)");
                return ProbeOutcome::Stopped(StopReason::Signal(trigger));
            }

            // One timestamp per cycle, shared by primary and backup
            let now = self.time_provider.now_local();
            let record = tokio::select! {
                record = self.builder.build(now) => record,
                trigger = shutdown.wait() => {
                    info!(?trigger, "Measurement interrupted, stopping loop (signal-triggered)");
                    return ProbeOutcome::Stopped(StopReason::Signal(trigger));
                }
            };

            if let Err(e) = self.store.insert(&record).await {
                error!(error = %e, "Unable to commit new record");
                return ProbeOutcome::CycleFailure(e.to_string());
            }
            cycles += 1;
            let (date, hour) = record.key();
            info!(date = %date, hour = %hour, cycle = cycles, "Record stored");
            debug!(record = ?record.to_row(), "New record");

            tokio::select! {
                _ = sleep(self.interval) => {}
                trigger = shutdown.wait() => {
                    info!(?trigger, "Stopping loop (signal-triggered)");
                    return ProbeOutcome::Stopped(StopReason::Signal(trigger));
                }
            }

            match self.control.read().await {
                Ok(ControlState::Start) => {}
                Ok(ControlState::Stop) => {
                    info!("Stopping loop (control file-triggered)");
                    return ProbeOutcome::Stopped(StopReason::ControlFile);
                }
                Err(e) => {
                    error!(error = %e, "Unable to get running state");
                    return ProbeOutcome::ControlSignalFailure(e.to_string());
                }
            }
        }
    }

    /// Single cleanup path: write "stop", release the store
    async fn drain(mut self, outcome: ProbeOutcome) -> ProbeOutcome {
        self.transition(LoopState::Draining);

        let outcome = match self.control.write(ControlState::Stop).await {
            Ok(()) => outcome,
            Err(e) => {
                error!(error = %e, "Unable to write stop state");
                // A supervisor would still see "start"; a clean stop is no longer clean
                match outcome {
                    ProbeOutcome::Stopped(_) => ProbeOutcome::ControlSignalFailure(e.to_string()),
                    failure => failure,
                }
            }
        };

        self.store.close().await;
        info!("Connection to the database closed");

        self.transition(LoopState::Terminated);
        info!(exit_code = outcome.exit_code(), outcome = ?outcome, "Probe loop terminated");
        outcome
    }

    fn transition(&mut self, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "Probe state transition");
        self.state = next;
    }
}
