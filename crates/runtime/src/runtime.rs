//! Runtime orchestrator.
//!
//! Owns the solo worker task, wires up command and event channels, and
//! exposes a builder-based API for host adapters.
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use solo_core::ClearSummary;

use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::events::{Event, EventBus, Topic};
use crate::handle::RuntimeHandle;
use crate::memory::Host;
use crate::metrics::TickMetrics;
use crate::worker::SoloWorker;

/// Running solo system.
///
/// [`RuntimeHandle`] provides a cloneable façade for clients; the runtime
/// itself is kept by whoever is responsible for shutdown.
pub struct SoloRuntime {
    handle: RuntimeHandle,
    worker: JoinHandle<()>,
}

impl SoloRuntime {
    pub fn builder() -> SoloRuntimeBuilder {
        SoloRuntimeBuilder::new()
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.handle.subscribe(topic)
    }

    /// Strips every buff the worker handed out and stops it.
    pub async fn shutdown(self) -> Result<ClearSummary> {
        let summary = self.handle.shutdown().await?;
        self.worker.await.map_err(RuntimeError::WorkerJoin)?;
        Ok(summary)
    }
}

pub struct SoloRuntimeBuilder {
    config: RuntimeConfig,
    clock: Arc<dyn Clock>,
}

impl SoloRuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Spawns the worker on the current tokio runtime.
    pub fn start<H: Host>(self, host: Arc<H>) -> SoloRuntime {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer_size);
        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);
        let metrics = Arc::new(TickMetrics::new());

        let worker = SoloWorker::new(
            self.config,
            host,
            self.clock,
            command_rx,
            event_bus.clone(),
            Arc::clone(&metrics),
        );
        let worker = tokio::spawn(worker.run());

        SoloRuntime {
            handle: RuntimeHandle::new(command_tx, event_bus, metrics),
            worker,
        }
    }
}
