//! Async runtime around the solo engine.
//!
//! This crate hosts [`solo_core::SoloEngine`] on a background task and
//! exposes it to a game server through [`RuntimeHandle`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`handle`] and [`events`] are what host adapters talk to
//! - [`config`] and [`logging`] cover process setup
//! - [`memory`] provides an in-memory host for tests and prototyping
//! - the worker stays internal to the crate
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod handle;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod runtime;
pub mod throttle;

mod worker;

pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{ConfigLoader, RuntimeConfig};
pub use error::{Result, RuntimeError};
pub use events::{BuffEvent, Event, EventBus, TickEvent, Topic};
pub use handle::RuntimeHandle;
pub use logging::setup_logging;
pub use memory::{Host, MemoryHost};
pub use metrics::{MetricsSnapshot, TickMetrics};
pub use runtime::{SoloRuntime, SoloRuntimeBuilder};
pub use throttle::{ErrorThrottle, KeyedThrottle};
pub use worker::HostEvent;
