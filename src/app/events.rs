//! Outbound application events.
//!
//! The [`App`](super::service::App) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, blink a debug LED,
//! record them in a test.

use crate::config::Channel;
use crate::error::Error;
use crate::fsm::ModeId;
use crate::memory::PersistedState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The app has booted (carries the boot mode).
    Started { mode: ModeId, restored: bool },

    /// The active mode changed.
    ModeChanged { from: ModeId, to: ModeId },

    /// State was written to a persistence slot.
    Committed { state: PersistedState, slot: u8 },

    ConfigSaved,

    /// The thermal cap changed (`None` = lifted).
    Throttle { cap: Option<u8> },

    /// A recoverable error was absorbed (failed read or write).
    Recoverable(Error),
}

/// A point-in-time view of the light, suitable for logging or display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub mode: ModeId,
    pub base_mode: ModeId,
    pub stack_depth: usize,
    pub level: u8,
    pub output_level: u8,
    pub memorized: u8,
    pub channel: Channel,
    pub locked: bool,
    pub thermal_cap: Option<u8>,
    pub fault_flags: u8,
    pub voltage_mv: Option<u16>,
    pub temperature_c: Option<i16>,
}
