//! Cloneable façade for issuing commands to the solo worker.
//!
//! [`RuntimeHandle`] hides channel plumbing. Host adapters forward world
//! changes through [`RuntimeHandle::notify`]; chat commands map onto the
//! query and preference helpers.
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use solo_core::{
    ClearSummary, SessionId, SessionUpdate, SoloConfig, StatusReport, SubjectId, TickReport,
};

use crate::error::{Result, RuntimeError};
use crate::events::{Event, EventBus, Topic};
use crate::metrics::{MetricsSnapshot, TickMetrics};
use crate::worker::{Command, HostEvent};

#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
    metrics: Arc<TickMetrics>,
}

impl RuntimeHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<Command>,
        event_bus: EventBus,
        metrics: Arc<TickMetrics>,
    ) -> Self {
        Self {
            command_tx,
            event_bus,
            metrics,
        }
    }

    /// Reports a host-side change; the worker re-evaluates right away.
    pub async fn notify(&self, event: HostEvent) -> Result<()> {
        self.send(Command::HostEvent(event)).await
    }

    pub async fn connected(&self, session: SessionId) -> Result<()> {
        self.notify(HostEvent::Connected(session)).await
    }

    pub async fn disconnected(&self, session: SessionId) -> Result<()> {
        self.notify(HostEvent::Disconnected(session)).await
    }

    pub async fn clan_changed(&self, session: SessionId) -> Result<()> {
        self.notify(HostEvent::ClanChanged(session)).await
    }

    /// Tells the worker the host (re)created the carrier on `subject`.
    pub async fn carrier_spawned(&self, subject: SubjectId) -> Result<()> {
        self.send(Command::CarrierSpawned { subject }).await
    }

    /// Forces a full evaluation pass and returns its report.
    pub async fn rescan(&self) -> Result<TickReport> {
        self.request(|reply| Command::Rescan { reply }).await
    }

    pub async fn status(&self, session: SessionId) -> Result<StatusReport> {
        self.request(|reply| Command::Status { session, reply }).await
    }

    pub async fn opt_in(&self, session: SessionId) -> Result<SessionUpdate> {
        self.request(|reply| Command::OptIn { session, reply }).await
    }

    pub async fn opt_out(&self, session: SessionId) -> Result<SessionUpdate> {
        self.request(|reply| Command::OptOut { session, reply }).await
    }

    /// Swaps in `config`. Bundles are cleared now and reapplied on the
    /// worker's next turn.
    pub async fn reload(&self, config: SoloConfig) -> Result<ClearSummary> {
        self.request(|reply| Command::Reload {
            config: Some(config),
            reply,
        })
        .await
    }

    /// Re-reads the config file named in the runtime config.
    pub async fn reload_from_disk(&self) -> Result<ClearSummary> {
        self.request(|reply| Command::Reload {
            config: None,
            reply,
        })
        .await
    }

    /// Pretty-printed JSON describing the session's subject and ledger state.
    pub async fn debug_dump(&self, session: SessionId) -> Result<String> {
        self.request(|reply| Command::DebugDump { session, reply }).await
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) async fn shutdown(&self) -> Result<ClearSummary> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx)).await?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }
}
