//! Solo worker that owns the engine.
//!
//! Receives commands via a channel, runs ticks on host events, timer
//! deadlines and a fallback scan interval, and publishes outcomes on the
//! [`EventBus`]. All engine state lives on this task, so ticks and commands
//! never interleave.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use solo_core::{
    ClearSummary, SessionId, SessionOutcome, SessionUpdate, SoloConfig, SoloEngine, SoloError,
    StatusReport, SubjectId, TickReport,
};

use crate::clock::Clock;
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::events::{BuffEvent, Event, EventBus, TickEvent};
use crate::memory::Host;
use crate::metrics::TickMetrics;
use crate::throttle::{ErrorThrottle, KeyedThrottle};

/// Host-side changes that warrant an immediate re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostEvent {
    Connected(SessionId),
    Disconnected(SessionId),
    ClanChanged(SessionId),
    /// The session now controls a different character, or none.
    SubjectChanged(SessionId),
}

impl HostEvent {
    pub fn session(&self) -> SessionId {
        match *self {
            Self::Connected(session)
            | Self::Disconnected(session)
            | Self::ClanChanged(session)
            | Self::SubjectChanged(session) => session,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Disconnected(_) => "disconnected",
            Self::ClanChanged(_) => "clan_changed",
            Self::SubjectChanged(_) => "subject_changed",
        }
    }
}

/// Commands that can be sent to the solo worker.
pub(crate) enum Command {
    HostEvent(HostEvent),
    Rescan {
        reply: oneshot::Sender<Result<TickReport>>,
    },
    Status {
        session: SessionId,
        reply: oneshot::Sender<Result<StatusReport>>,
    },
    OptIn {
        session: SessionId,
        reply: oneshot::Sender<Result<SessionUpdate>>,
    },
    OptOut {
        session: SessionId,
        reply: oneshot::Sender<Result<SessionUpdate>>,
    },
    /// `None` re-reads the configured file.
    Reload {
        config: Option<SoloConfig>,
        reply: oneshot::Sender<Result<ClearSummary>>,
    },
    DebugDump {
        session: SessionId,
        reply: oneshot::Sender<Result<String>>,
    },
    CarrierSpawned {
        subject: SubjectId,
    },
    Shutdown {
        reply: oneshot::Sender<Result<ClearSummary>>,
    },
}

pub(crate) struct SoloWorker<H: Host> {
    engine: SoloEngine,
    host: Arc<H>,
    clock: Arc<dyn Clock>,
    config: RuntimeConfig,
    command_rx: mpsc::Receiver<Command>,
    event_bus: EventBus,
    metrics: Arc<TickMetrics>,
    throttle: ErrorThrottle,
    session_throttle: KeyedThrottle<SessionId>,
    /// Next timer window close, or an immediate refresh after a reload.
    deadline: Option<Instant>,
}

impl<H: Host> SoloWorker<H> {
    pub(crate) fn new(
        config: RuntimeConfig,
        host: Arc<H>,
        clock: Arc<dyn Clock>,
        command_rx: mpsc::Receiver<Command>,
        event_bus: EventBus,
        metrics: Arc<TickMetrics>,
    ) -> Self {
        Self {
            engine: SoloEngine::new(config.solo.clone()),
            throttle: ErrorThrottle::new(config.error_log_cooldown),
            session_throttle: KeyedThrottle::new(config.error_log_cooldown),
            host,
            clock,
            config,
            command_rx,
            event_bus,
            metrics,
            deadline: None,
        }
    }

    /// Main worker loop.
    ///
    /// Exits on a shutdown command or once every handle has been dropped;
    /// either way the buffs it handed out are stripped first.
    pub(crate) async fn run(mut self) {
        info!(
            target: "solo::worker",
            threshold_minutes = self.engine.config().offline_threshold_minutes,
            scan_interval_ms = self.config.scan_interval.as_millis() as u64,
            "solo worker started"
        );
        self.warn_clamped();
        let _ = self.tick("startup");

        let period = self.config.scan_interval;
        let mut scan = tokio::time::interval_at(Instant::now() + period, period);
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        let result = self.shutdown();
                        if reply.send(result).is_err() {
                            debug!(target: "solo::worker", "Shutdown reply channel closed (caller dropped)");
                        }
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        let _ = self.shutdown();
                        break;
                    }
                },
                _ = scan.tick() => {
                    let _ = self.tick("scan");
                }
                _ = sleep_until(self.deadline) => {
                    self.deadline = None;
                    let _ = self.tick("deadline");
                }
            }
        }

        info!(target: "solo::worker", "solo worker stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::HostEvent(event) => {
                debug!(
                    target: "solo::commands",
                    session = %event.session(),
                    event = event.label(),
                    "host event"
                );
                let _ = self.tick(event.label());
            }
            Command::Rescan { reply } => {
                let result = self.tick("rescan");
                if reply.send(result).is_err() {
                    debug!(target: "solo::commands", "Rescan reply channel closed (caller dropped)");
                }
            }
            Command::Status { session, reply } => {
                let host = Arc::clone(&self.host);
                let result = self
                    .engine
                    .status(&host.env(), session, self.clock.now())
                    .map_err(RuntimeError::from);
                if reply.send(result).is_err() {
                    debug!(target: "solo::commands", "Status reply channel closed (caller dropped)");
                }
            }
            Command::OptIn { session, reply } => {
                let result = self.set_opt_out(session, false);
                if reply.send(result).is_err() {
                    debug!(target: "solo::commands", "OptIn reply channel closed (caller dropped)");
                }
            }
            Command::OptOut { session, reply } => {
                let result = self.set_opt_out(session, true);
                if reply.send(result).is_err() {
                    debug!(target: "solo::commands", "OptOut reply channel closed (caller dropped)");
                }
            }
            Command::Reload { config, reply } => {
                let result = self.reload(config);
                if reply.send(result).is_err() {
                    debug!(target: "solo::commands", "Reload reply channel closed (caller dropped)");
                }
            }
            Command::DebugDump { session, reply } => {
                let result = self.debug_dump(session);
                if reply.send(result).is_err() {
                    debug!(target: "solo::commands", "DebugDump reply channel closed (caller dropped)");
                }
            }
            Command::CarrierSpawned { subject } => {
                let host = Arc::clone(&self.host);
                match self.engine.on_carrier_spawned(&host.env(), subject) {
                    Ok(true) => {
                        debug!(target: "solo::commands", %subject, "carrier entries restored");
                    }
                    Ok(false) => {}
                    Err(err) => warn!(
                        target: "solo::commands",
                        %subject,
                        code = err.error_code(),
                        "failed to restore carrier entries: {err}"
                    ),
                }
            }
            Command::Shutdown { reply } => {
                // Intercepted by the run loop.
                if reply.send(Ok(ClearSummary::default())).is_err() {
                    debug!(target: "solo::commands", "Shutdown reply channel closed (caller dropped)");
                }
            }
        }
    }

    /// Runs one engine tick and schedules the next timer deadline.
    fn tick(&mut self, trigger: &'static str) -> Result<TickReport> {
        let host = Arc::clone(&self.host);
        let env = host.env();
        let started = std::time::Instant::now();

        match self.engine.tick(&env, self.clock.now()) {
            Ok(report) => {
                self.metrics.record_tick(&report, started.elapsed());
                let now = Instant::now();
                self.deadline = report.next_wakeup.map(|wait| now + wait);

                for failure in &report.failures {
                    let admitted = self.session_throttle.admit(failure.session, now);
                    self.metrics.record_error_log(admitted.is_some());
                    if let Some(suppressed) = admitted {
                        warn!(
                            target: "solo::worker",
                            session = %failure.session,
                            code = failure.error.error_code(),
                            suppressed,
                            "session update failed: {}",
                            failure.error
                        );
                    }
                }
                self.session_throttle.prune(now);
                if report.refreshed {
                    info!(
                        target: "solo::worker",
                        applied = report.applied.len(),
                        "reapplied solo buffs after config reload"
                    );
                }
                debug!(
                    target: "solo::worker",
                    trigger,
                    evaluated = report.evaluated,
                    solo = report.solo,
                    applied = report.applied.len(),
                    cleared = report.cleared.len(),
                    next_wakeup_ms = report.next_wakeup.map(|wait| wait.as_millis() as u64),
                    "tick complete"
                );

                self.event_bus.publish_tick(&report);
                Ok(report)
            }
            Err(err) => {
                self.metrics.record_failure();
                // The scan interval retries; a stale deadline would spin.
                self.deadline = None;
                let admitted = self.throttle.admit(Instant::now());
                self.metrics.record_error_log(admitted.is_some());
                if let Some(suppressed) = admitted {
                    warn!(
                        target: "solo::worker",
                        trigger,
                        code = err.error_code(),
                        severity = err.severity().as_str(),
                        suppressed,
                        "tick failed: {err}"
                    );
                }
                self.event_bus.publish(Event::Tick(TickEvent::Failed {
                    code: err.error_code().to_owned(),
                    severity: err.severity(),
                }));
                Err(err.into())
            }
        }
    }

    fn set_opt_out(&mut self, session: SessionId, opted_out: bool) -> Result<SessionUpdate> {
        let host = Arc::clone(&self.host);
        let env = host.env();
        let now = self.clock.now();
        let update = if opted_out {
            self.engine.opt_out(&env, session, now)?
        } else {
            self.engine.opt_in(&env, session, now)?
        };

        info!(
            target: "solo::commands",
            %session,
            opted_out,
            state = %update.state,
            outcome = %update.outcome,
            "solo buff preference changed"
        );
        match update.outcome {
            SessionOutcome::Applied => self
                .event_bus
                .publish(Event::Buff(BuffEvent::Applied { session })),
            SessionOutcome::Cleared => self
                .event_bus
                .publish(Event::Buff(BuffEvent::Cleared { session })),
            SessionOutcome::Unchanged | SessionOutcome::Skipped => {}
        }
        Ok(update)
    }

    fn reload(&mut self, config: Option<SoloConfig>) -> Result<ClearSummary> {
        let config = match config {
            Some(config) => config,
            None => self.config.load_solo()?,
        };
        let host = Arc::clone(&self.host);
        let summary = self.engine.reload(&host.env(), config.clone())?;
        self.config.solo = config;

        info!(
            target: "solo::commands",
            cleared = summary.cleared,
            failures = summary.failures.len(),
            threshold_minutes = self.engine.config().offline_threshold_minutes,
            "config reloaded"
        );
        self.warn_clamped();
        self.log_clear_failures(&summary);
        self.event_bus.publish(Event::Tick(TickEvent::Reloaded {
            cleared: summary.cleared,
        }));

        // Reapply on the next loop turn, after the reply went out.
        self.deadline = Some(Instant::now());
        Ok(summary)
    }

    fn debug_dump(&self, session: SessionId) -> Result<String> {
        let host = Arc::clone(&self.host);
        let dump = self.engine.debug_dump(&host.env(), session)?;
        serde_json::to_string_pretty(&dump).map_err(RuntimeError::Encode)
    }

    fn shutdown(&mut self) -> Result<ClearSummary> {
        let host = Arc::clone(&self.host);
        let summary = self.engine.shutdown(&host.env())?;
        info!(
            target: "solo::worker",
            cleared = summary.cleared,
            failures = summary.failures.len(),
            "solo buffs cleared for shutdown"
        );
        self.log_clear_failures(&summary);
        self.event_bus.publish(Event::Tick(TickEvent::ShutDown {
            cleared: summary.cleared,
        }));
        Ok(summary)
    }

    fn warn_clamped(&self) {
        for adjustment in self.engine.bonuses().clamped() {
            warn!(
                target: "solo::worker",
                stat = %adjustment.stat,
                kind = %adjustment.kind,
                configured = adjustment.configured,
                effective = adjustment.effective,
                "configured bonus out of range, clamped"
            );
        }
    }

    fn log_clear_failures(&self, summary: &ClearSummary) {
        for failure in &summary.failures {
            warn!(
                target: "solo::worker",
                subject = %failure.subject,
                code = failure.error.error_code(),
                "failed to restore attributes: {}",
                failure.error
            );
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
