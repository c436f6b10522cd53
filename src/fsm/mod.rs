//! Mode-stack finite state machine engine.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Mode stack (max 4)                          │
//! │  ┌───┬──────────────────────┐                │
//! │  │ 3 │ (free)               │                │
//! │  │ 2 │ (free)               │                │
//! │  │ 1 │ Ramping   ◀── top: receives events    │
//! │  │ 0 │ SteadyOn  ◀── base: persisted         │
//! │  └───┴──────────────────────┘                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Each dispatch first offers the event to the **global shortcuts**
//! (lockout, critical voltage, power loss, thermal steps, low-voltage
//! warning), then to the top mode's [`Mode::handle_event`].  The returned
//! [`Action`]s are applied in order; enter/exit actions produced by stack
//! changes are queued behind them and applied within the same dispatch.
//! An event nobody handles yields [`Error::UnrecognizedEvent`], which the
//! caller drops.
//!
//! All handlers receive `&FsmContext`; only the engine mutates it.

pub mod context;
pub mod modes;

use heapless::{Deque, Vec};
use log::{debug, info, warn};

use crate::error::Error;
use crate::events::{Event, EventKind};
use crate::memory::PersistedState;
use crate::ramp::MAX_LEVEL;
use context::{Action, Actions, FsmContext, actions};
use modes::{Mode, StrobeKind};

/// Maximum mode stack depth.
pub const MAX_DEPTH: usize = 4;

/// Actions pending in one dispatch, including queued enter/exit actions.
const ACTION_QUEUE_CAP: usize = 16;

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Flat identity of a [`Mode`], used for persistence and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModeId {
    Off = 0,
    SteadyOn = 1,
    Ramping = 2,
    Locked = 3,
    Strobe = 4,
    ConfigMenu = 5,
    ChannelSelect = 6,
}

impl ModeId {
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0 => Self::Off,
            1 => Self::SteadyOn,
            2 => Self::Ramping,
            3 => Self::Locked,
            4 => Self::Strobe,
            5 => Self::ConfigMenu,
            6 => Self::ChannelSelect,
            _ => return None,
        })
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// The id stored for this mode.  Temporary modes persist as the base
    /// they normally sit on.
    pub fn persisted(self) -> Self {
        match self {
            Self::Ramping | Self::ChannelSelect => Self::SteadyOn,
            Self::ConfigMenu => Self::Off,
            other => other,
        }
    }

    /// Whether a stored record may name this mode.
    pub fn is_persistable(self) -> bool {
        self.persisted() == self
    }
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The mode-stack engine.
pub struct Fsm {
    stack: Vec<Mode, MAX_DEPTH>,
    /// Monotonic tick of the last `tick()` call.
    tick_count: u32,
    /// Tick at which the top mode was entered.
    state_entry_tick: u32,
    /// Tick of the last button event.
    last_input_tick: u32,
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm {
    /// An engine sitting in `Off`.  Call [`Fsm::boot`] before dispatching.
    pub fn new() -> Self {
        let mut stack = Vec::new();
        let _ = stack.push(Mode::Off);
        Self {
            stack,
            tick_count: 0,
            state_entry_tick: 0,
            last_input_tick: 0,
        }
    }

    /// Enter the boot mode from the persisted state (or defaults when
    /// absent).  Enter actions run, but booting never requests a commit.
    pub fn boot(&mut self, restored: Option<PersistedState>, now: u32, ctx: &mut FsmContext) {
        self.tick_count = now;
        self.state_entry_tick = now;
        self.last_input_tick = now;
        ctx.now = now;
        ctx.level = 0;

        let base = match restored {
            Some(state) => {
                ctx.memorized = ctx.clamp_level(state.level);
                ctx.channel = state.channel;
                if state.locked {
                    Mode::Locked
                } else {
                    match state.mode {
                        ModeId::SteadyOn => {
                            ctx.level = ctx.memorized;
                            Mode::SteadyOn
                        }
                        ModeId::Strobe => Mode::Strobe(StrobeKind::Party),
                        _ => Mode::Off,
                    }
                }
            }
            None => {
                ctx.memorized = ctx.limits().0;
                ctx.channel = ctx.config.default_channel;
                Mode::Off
            }
        };

        info!("FSM starting in mode: {:?}", base.id());
        self.stack.clear();
        let _ = self.stack.push(base);
        let enter = base.on_enter(ctx);
        self.apply(enter, ctx);
        ctx.commit_requested = false;
        ctx.ticks_in_state = 0;
        ctx.idle_ticks = 0;
        ctx.idle_committed = false;
    }

    /// Advance timing to `now`.  Call once per main-loop tick, before the
    /// `Tick` event is dispatched.
    pub fn tick(&mut self, now: u32, ctx: &mut FsmContext) {
        self.tick_count = now;
        ctx.now = now;
        ctx.ticks_in_state = now.wrapping_sub(self.state_entry_tick);
        ctx.idle_ticks = now.wrapping_sub(self.last_input_tick);
        ctx.advance_blink();
    }

    /// Offer one event to the global shortcuts, then the top mode.
    pub fn dispatch(&mut self, ev: &Event, ctx: &mut FsmContext) -> Result<(), Error> {
        if ev.kind.is_input() {
            self.last_input_tick = ev.tick;
            ctx.idle_ticks = 0;
            ctx.idle_committed = false;
        }

        let list = match global_shortcut(ev, self.current_mode(), ctx) {
            Some(list) => list,
            None => {
                let Some(top) = self.stack.last_mut() else {
                    return Err(Error::UnrecognizedEvent);
                };
                top.handle_event(ev, ctx).ok_or(Error::UnrecognizedEvent)?
            }
        };
        self.apply(list, ctx);
        Ok(())
    }

    /// The top (active) mode.
    pub fn current_mode(&self) -> ModeId {
        self.stack.last().map_or(ModeId::Off, Mode::id)
    }

    /// The persistent base mode.
    pub fn base_mode(&self) -> ModeId {
        self.stack.first().map_or(ModeId::Off, Mode::id)
    }

    /// Full stack, base first.
    pub fn stack(&self) -> &[Mode] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// How many ticks the top mode has been active.
    pub fn ticks_in_current_state(&self) -> u32 {
        self.tick_count.wrapping_sub(self.state_entry_tick)
    }

    /// Force a new base mode (used by the app, e.g. on a config reload).
    pub fn force_transition(&mut self, next: Mode, ctx: &mut FsmContext) {
        self.apply(actions(&[Action::ChangeMode(next)]), ctx);
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn apply(&mut self, list: Actions, ctx: &mut FsmContext) {
        let mut queue: Deque<Action, ACTION_QUEUE_CAP> = Deque::new();
        enqueue(&mut queue, list);

        while let Some(action) = queue.pop_front() {
            match action {
                Action::SetLevel(level) => ctx.level = level.min(MAX_LEVEL),
                Action::Memorize => {
                    if ctx.level > 0 {
                        ctx.memorized = ctx.level;
                    }
                }
                Action::SetChannel(ch) => {
                    debug!("channel -> {:?}", ch);
                    ctx.channel = ch;
                }
                Action::ChangeMode(next) => {
                    let from = self.current_mode();
                    while let Some(old) = self.stack.pop() {
                        enqueue(&mut queue, old.on_exit(ctx));
                    }
                    let _ = self.stack.push(next);
                    self.entered(from, ctx);
                    enqueue(&mut queue, next.on_enter(ctx));
                }
                Action::Push(next) => {
                    let from = self.current_mode();
                    if self.stack.push(next).is_err() {
                        warn!("mode stack full, cannot enter {:?}", next.id());
                        continue;
                    }
                    self.entered(from, ctx);
                    enqueue(&mut queue, next.on_enter(ctx));
                }
                Action::Pop => {
                    if self.stack.len() <= 1 {
                        debug!("pop on base mode ignored");
                        continue;
                    }
                    let from = self.current_mode();
                    if let Some(old) = self.stack.pop() {
                        enqueue(&mut queue, old.on_exit(ctx));
                    }
                    self.entered(from, ctx);
                }
                Action::SetLock(locked) => ctx.locked = locked,
                Action::Blink(n) => ctx.start_blink(n),
                Action::Commit => ctx.commit_requested = true,
                Action::IdleCommit => {
                    ctx.commit_requested = true;
                    ctx.idle_committed = true;
                }
                Action::AdjustConfig { item, up } => {
                    item.adjust(&mut ctx.config, up);
                    debug!("config {:?} adjusted", item);
                }
                Action::SaveConfig => ctx.save_config_requested = true,
                Action::ThermalStepDown => ctx.thermal_step_down(),
                Action::ThermalStepUp => ctx.thermal_step_up(),
            }
        }
    }

    /// Bookkeeping after the top of the stack changed.
    fn entered(&mut self, from: ModeId, ctx: &mut FsmContext) {
        let to = self.current_mode();
        info!("FSM transition: {:?} -> {:?}", from, to);
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;
    }
}

fn enqueue(queue: &mut Deque<Action, ACTION_QUEUE_CAP>, list: Actions) {
    for a in list {
        if queue.push_back(a).is_err() {
            warn!("action queue full, dropped {:?}", a);
        }
    }
}

/// Shortcuts that apply in every mode and take precedence over it.
fn global_shortcut(ev: &Event, top: ModeId, ctx: &FsmContext) -> Option<Actions> {
    match ev.kind {
        EventKind::Click { count: 4 } if !ctx.locked => Some(actions(&[Action::ChangeMode(Mode::Locked)])),
        EventKind::VoltageCritical => {
            if ctx.locked || top == ModeId::Off {
                Some(actions(&[Action::SetLevel(0)]))
            } else {
                Some(actions(&[Action::ChangeMode(Mode::Off)]))
            }
        }
        EventKind::PowerLoss => Some(actions(&[Action::Commit])),
        EventKind::ThermalHigh => Some(actions(&[Action::ThermalStepDown])),
        EventKind::ThermalRecover => Some(actions(&[Action::ThermalStepUp])),
        EventKind::VoltageLow => {
            if ctx.output_level() > 0 {
                Some(actions(&[Action::Blink(3)]))
            } else {
                Some(Actions::new())
            }
        }
        _ => None,
    }
}
