//! Shared context threaded through every mode handler, and the actions
//! handlers return.
//!
//! `FsmContext` is the single struct that mode handlers read from; only the
//! engine writes to it, by applying [`Action`]s.  It holds the light state
//! (level, memory, channel, lockout), the thermal cap, timing, the UI
//! configuration and the requests the app services after each dispatch.
//! Think of it as the "blackboard" in a blackboard architecture.

use heapless::Vec;

use crate::config::{Channel, ConfigItem, UiConfig};
use crate::memory::PersistedState;
use crate::ramp::MAX_LEVEL;

use super::ModeId;
use super::modes::Mode;

// ---------------------------------------------------------------------------
// Actions (returned by handlers; applied by the engine)
// ---------------------------------------------------------------------------

/// One effect requested by a mode handler or a global shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Set the requested ramp level (0 = off).
    SetLevel(u8),
    /// Remember the current level for the next turn-on.
    Memorize,
    SetChannel(Channel),
    /// Replace the whole mode stack with a new base mode.
    ChangeMode(Mode),
    /// Enter a temporary mode over the current one.
    Push(Mode),
    /// Leave the temporary mode on top of the stack.
    Pop,
    SetLock(bool),
    /// Flash `n` times as feedback.
    Blink(u8),
    /// Ask the memory manager to persist the current state.
    Commit,
    /// [`Action::Commit`] for the idle timeout; latched until the next input.
    IdleCommit,
    AdjustConfig { item: ConfigItem, up: bool },
    /// Ask the memory manager to persist the configuration.
    SaveConfig,
    ThermalStepDown,
    ThermalStepUp,
}

/// Actions returned by one handler call, applied in order.
pub type Actions = Vec<Action, 4>;

/// Build an [`Actions`] list from a slice.
pub fn actions(list: &[Action]) -> Actions {
    let mut out = Actions::new();
    for a in list {
        if out.push(*a).is_err() {
            log::warn!("action list full, dropped {a:?}");
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Blink feedback
// ---------------------------------------------------------------------------

/// Ticks for each half (flash / rest) of one blink.
pub const BLINK_HALF_TICKS: u32 = 6;

/// Level flashed when a blink is requested while the light is off.
pub const BLINK_OFF_LEVEL: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkTrain {
    pub remaining: u8,
    pub started: u32,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every mode handler.
pub struct FsmContext {
    // -- Timing --
    /// Current tick.
    pub now: u32,
    /// Ticks elapsed since the top mode was entered.
    pub ticks_in_state: u32,
    /// Ticks elapsed since the last button event.
    pub idle_ticks: u32,
    /// The idle commit already ran since the last button event.
    pub idle_committed: bool,

    // -- Light state --
    /// Requested ramp level; 0 = off.
    pub level: u8,
    /// Level restored on the next turn-on.
    pub memorized: u8,
    pub channel: Channel,
    pub locked: bool,
    /// Upper limit on output imposed by thermal regulation.
    pub thermal_cap: Option<u8>,
    pub blink: Option<BlinkTrain>,

    // -- Configuration --
    pub config: UiConfig,

    // -- Requests for the app --
    pub commit_requested: bool,
    pub save_config_requested: bool,
}

impl FsmContext {
    /// Create a new context with the given configuration.
    pub fn new(config: UiConfig) -> Self {
        let (floor, _) = config.ramp_limits();
        Self {
            now: 0,
            ticks_in_state: 0,
            idle_ticks: 0,
            idle_committed: false,
            level: 0,
            memorized: floor,
            channel: config.default_channel,
            locked: false,
            thermal_cap: None,
            blink: None,
            config,
            commit_requested: false,
            save_config_requested: false,
        }
    }

    /// Active (floor, ceiling), honouring the simple UI.
    pub fn limits(&self) -> (u8, u8) {
        self.config.ramp_limits()
    }

    /// Level actually driven: the requested level under the thermal cap.
    pub fn output_level(&self) -> u8 {
        match self.thermal_cap {
            Some(cap) if self.level > 0 => self.level.min(cap).max(1),
            _ => self.level,
        }
    }

    /// Output with blink feedback applied.
    pub fn rendered_level(&self) -> u8 {
        let out = self.output_level();
        let Some(blink) = self.blink else {
            return out;
        };
        let phase = self.now.wrapping_sub(blink.started) % (2 * BLINK_HALF_TICKS);
        if phase >= BLINK_HALF_TICKS {
            out
        } else if out > 0 {
            out / 2
        } else {
            BLINK_OFF_LEVEL
        }
    }

    pub fn start_blink(&mut self, n: u8) {
        self.blink = (n > 0).then_some(BlinkTrain {
            remaining: n,
            started: self.now,
        });
    }

    /// Drop the blink train once it has finished.
    pub fn advance_blink(&mut self) {
        if let Some(b) = self.blink {
            let total = u32::from(b.remaining) * 2 * BLINK_HALF_TICKS;
            if self.now.wrapping_sub(b.started) >= total {
                self.blink = None;
            }
        }
    }

    /// Lower the thermal cap by one step below the current output.
    /// Never raises an existing cap; does nothing while the light is off.
    pub fn thermal_step_down(&mut self) {
        let out = self.output_level();
        if out == 0 {
            return;
        }
        let (floor, _) = self.limits();
        let target = out.saturating_sub(self.config.thermal_step).max(floor);
        self.thermal_cap = Some(self.thermal_cap.map_or(target, |c| c.min(target)));
    }

    /// Relax the thermal cap by one recovery step; lift it at the ceiling.
    pub fn thermal_step_up(&mut self) {
        let Some(cap) = self.thermal_cap else {
            return;
        };
        let (_, ceiling) = self.limits();
        let next = cap.saturating_add(self.config.thermal_recover_step);
        self.thermal_cap = (next < ceiling).then_some(next);
    }

    /// Clamp a level into the active ramp range.
    pub fn clamp_level(&self, level: u8) -> u8 {
        let (floor, ceiling) = self.limits();
        level.clamp(floor, ceiling.min(MAX_LEVEL))
    }

    /// Snapshot of the durable state for `base` as the persisted mode.
    pub fn persisted(&self, base: ModeId) -> PersistedState {
        PersistedState {
            mode: base.persisted(),
            level: self.memorized,
            channel: self.channel,
            locked: self.locked,
        }
    }

    /// Seconds-to-ticks at the configured tick rate.
    pub fn ticks(&self, secs: u16) -> u32 {
        self.config.ticks_from_secs(secs)
    }
}
