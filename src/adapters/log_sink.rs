//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events through the
//! `log` facade (serial console on a board, `env_logger` in the
//! simulator).  Anything else that wants the events implements the same
//! trait.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::error::Error;

/// Adapter that logs every [`AppEvent`] as a single line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { mode, restored } => {
                info!(
                    "START | mode={:?} | {}",
                    mode,
                    if *restored { "restored" } else { "defaults" }
                );
            }
            AppEvent::ModeChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::Committed { state, slot } => {
                info!(
                    "SAVE  | slot={} mode={:?} level={} channel={:?} locked={}",
                    slot, state.mode, state.level, state.channel, state.locked
                );
            }
            AppEvent::ConfigSaved => {
                info!("SAVE  | config");
            }
            AppEvent::Throttle { cap: Some(cap) } => {
                info!("THERM | cap={}", cap);
            }
            AppEvent::Throttle { cap: None } => {
                info!("THERM | cap lifted");
            }
            // Sensor reads fail transiently; keep them out of the console.
            AppEvent::Recoverable(e @ Error::HardwareRead(_)) => {
                debug!("ERROR | {}", e);
            }
            AppEvent::Recoverable(e) => {
                warn!("ERROR | {}", e);
            }
        }
    }
}
