//! The UI modes, one variant per mode, one `handle_event` per variant.
//!
//! Each handler inspects the event and the read-only [`FsmContext`] and
//! returns the [`Actions`] to apply, or `None` when the mode has no use for
//! the event.  Handlers never touch hardware or the stack directly.
//!
//! | Mode          | 1C        | 2C          | 3C            | 1H        | other                 |
//! |---------------|-----------|-------------|---------------|-----------|-----------------------|
//! | Off           | on (mem)  | on (ceil)   | config menu   | moon→ramp | 3H strobe, autolock, 10C/10H simple UI on/off |
//! | SteadyOn      | off       | ceil ↔ mem  | channel sel.  | ramp      | 2H ramp down, idle commit |
//! | Ramping       |           |             |               | step      | release → memorize    |
//! | Locked        |           |             |               | momentary | 4C unlock             |
//! | Strobe        | off       | next kind   |               |           |                       |
//! | ConfigMenu    | value +   | value −     | next item     | save+exit |                       |
//! | ChannelSelect | next ch.  | confirm     |               | confirm   | 3 s auto-exit         |

use crate::config::ConfigItem;
use crate::events::{Event, EventKind};

use super::ModeId;
use super::context::{Action, Actions, FsmContext, actions};

/// Inactivity after which channel select closes on its own.
const CHANNEL_SELECT_TIMEOUT_MS: u32 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampDirection {
    Up,
    Down,
}

/// Ramping state: direction and whether the limit blink was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ramp {
    pub direction: RampDirection,
    pub limit_blinked: bool,
}

impl Ramp {
    pub fn new(direction: RampDirection) -> Self {
        Self {
            direction,
            limit_blinked: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrobeKind {
    /// Fast, short flashes that freeze motion.
    Party,
    /// Slower, longer flashes.
    Tactical,
    /// One flash every two seconds at the memorized level.
    Beacon,
}

impl StrobeKind {
    pub fn next(self) -> Self {
        match self {
            Self::Party => Self::Tactical,
            Self::Tactical => Self::Beacon,
            Self::Beacon => Self::Party,
        }
    }

    /// (on ticks, period ticks)
    fn timing(self) -> (u32, u32) {
        match self {
            Self::Party => (1, 6),
            Self::Tactical => (3, 8),
            Self::Beacon => (6, 125),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuCursor {
    pub item: ConfigItem,
}

impl Default for MenuCursor {
    fn default() -> Self {
        Self {
            item: ConfigItem::ALL[0],
        }
    }
}

/// A UI mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Off,
    SteadyOn,
    Ramping(Ramp),
    Locked,
    Strobe(StrobeKind),
    ConfigMenu(MenuCursor),
    ChannelSelect,
}

impl Mode {
    pub fn id(&self) -> ModeId {
        match self {
            Self::Off => ModeId::Off,
            Self::SteadyOn => ModeId::SteadyOn,
            Self::Ramping(_) => ModeId::Ramping,
            Self::Locked => ModeId::Locked,
            Self::Strobe(_) => ModeId::Strobe,
            Self::ConfigMenu(_) => ModeId::ConfigMenu,
            Self::ChannelSelect => ModeId::ChannelSelect,
        }
    }

    /// Actions run when the mode becomes active.
    pub fn on_enter(&self, ctx: &FsmContext) -> Actions {
        match self {
            Self::Off => actions(&[Action::SetLevel(0), Action::Commit]),
            Self::Locked => actions(&[Action::SetLevel(0), Action::SetLock(true), Action::Commit]),
            Self::Strobe(_) => actions(&[Action::SetLevel(0)]),
            Self::ConfigMenu(cursor) => actions(&[Action::Blink(cursor.item.number())]),
            Self::SteadyOn if ctx.level == 0 => actions(&[Action::SetLevel(ctx.clamp_level(ctx.memorized))]),
            Self::SteadyOn | Self::Ramping(_) | Self::ChannelSelect => Actions::new(),
        }
    }

    /// Actions run when the mode is left.
    pub fn on_exit(&self, _ctx: &FsmContext) -> Actions {
        match self {
            Self::Locked => actions(&[Action::SetLock(false)]),
            _ => Actions::new(),
        }
    }

    /// Handle one event.  `None` = not recognised by this mode.
    pub fn handle_event(&mut self, ev: &Event, ctx: &FsmContext) -> Option<Actions> {
        match self {
            Self::Off => off(ev, ctx),
            Self::SteadyOn => steady_on(ev, ctx),
            Self::Ramping(ramp) => ramping(ramp, ev, ctx),
            Self::Locked => locked(ev, ctx),
            Self::Strobe(kind) => strobe(*kind, ev, ctx),
            Self::ConfigMenu(cursor) => config_menu(cursor, ev),
            Self::ChannelSelect => channel_select(ev, ctx),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn off(ev: &Event, ctx: &FsmContext) -> Option<Actions> {
    let (floor, ceiling) = ctx.limits();
    let simple = ctx.config.simple_ui;
    Some(match ev.kind {
        EventKind::Click { count: 1 } => actions(&[
            Action::SetLevel(ctx.clamp_level(ctx.memorized)),
            Action::ChangeMode(Mode::SteadyOn),
        ]),
        EventKind::Click { count: 2 } => actions(&[Action::SetLevel(ceiling), Action::ChangeMode(Mode::SteadyOn)]),
        EventKind::Click { count: 3 } if !simple => actions(&[Action::Push(Mode::ConfigMenu(MenuCursor::default()))]),
        EventKind::HoldTick { count: 1, ticks: 0 } => actions(&[
            Action::SetLevel(floor),
            Action::ChangeMode(Mode::SteadyOn),
            Action::Push(Mode::Ramping(Ramp::new(RampDirection::Up))),
        ]),
        EventKind::HoldTick { count: 3, ticks: 0 } if !simple => {
            actions(&[Action::ChangeMode(Mode::Strobe(StrobeKind::Party))])
        }
        EventKind::Click { count: 10 } if !simple => set_simple_ui(true),
        // The only way out of the simple UI.
        EventKind::HoldTick { count: 10, ticks: 0 } if simple => set_simple_ui(false),
        EventKind::Tick => {
            let timeout = ctx.config.autolock_timeout_secs;
            if timeout > 0 && ctx.ticks_in_state >= ctx.ticks(timeout) {
                actions(&[Action::ChangeMode(Mode::Locked)])
            } else {
                Actions::new()
            }
        }
        _ => return None,
    })
}

fn set_simple_ui(on: bool) -> Actions {
    actions(&[
        Action::AdjustConfig {
            item: ConfigItem::SimpleUi,
            up: on,
        },
        Action::SaveConfig,
        Action::Blink(if on { 1 } else { 2 }),
    ])
}

fn steady_on(ev: &Event, ctx: &FsmContext) -> Option<Actions> {
    let (_, ceiling) = ctx.limits();
    Some(match ev.kind {
        EventKind::Click { count: 1 } => actions(&[Action::ChangeMode(Mode::Off)]),
        EventKind::Click { count: 2 } => {
            if ctx.level >= ceiling {
                actions(&[Action::SetLevel(ctx.clamp_level(ctx.memorized))])
            } else {
                actions(&[Action::SetLevel(ceiling)])
            }
        }
        EventKind::Click { count: 3 } if !ctx.config.simple_ui => actions(&[Action::Push(Mode::ChannelSelect)]),
        EventKind::HoldTick { count: 1, ticks: 0 } => {
            let direction = if ctx.level >= ceiling {
                RampDirection::Down
            } else {
                RampDirection::Up
            };
            actions(&[Action::Push(Mode::Ramping(Ramp::new(direction)))])
        }
        EventKind::HoldTick { count: 2, ticks: 0 } => {
            actions(&[Action::Push(Mode::Ramping(Ramp::new(RampDirection::Down)))])
        }
        EventKind::Tick => {
            let due = ctx.idle_ticks > 0 && ctx.idle_ticks >= ctx.ticks(ctx.config.idle_commit_secs);
            if due && !ctx.idle_committed {
                actions(&[Action::IdleCommit])
            } else {
                Actions::new()
            }
        }
        _ => return None,
    })
}

fn ramping(ramp: &mut Ramp, ev: &Event, ctx: &FsmContext) -> Option<Actions> {
    Some(match ev.kind {
        EventKind::HoldTick { ticks, .. } => {
            let step = u16::from(ctx.config.ramp_step_ticks.max(1));
            if ticks == 0 || ticks % step != 0 {
                return Some(Actions::new());
            }
            let (floor, ceiling) = ctx.limits();
            let next = match ramp.direction {
                RampDirection::Up => ctx.level.saturating_add(1).min(ceiling),
                RampDirection::Down => ctx.level.saturating_sub(1).max(floor),
            };
            if next == ctx.level {
                if ramp.limit_blinked {
                    Actions::new()
                } else {
                    ramp.limit_blinked = true;
                    actions(&[Action::Blink(1)])
                }
            } else {
                actions(&[Action::SetLevel(next)])
            }
        }
        EventKind::HoldRelease { .. } => actions(&[Action::Memorize, Action::Pop]),
        EventKind::Tick => Actions::new(),
        _ => return None,
    })
}

fn locked(ev: &Event, ctx: &FsmContext) -> Option<Actions> {
    let (floor, _) = ctx.limits();
    Some(match ev.kind {
        EventKind::Click { count: 4 } => actions(&[Action::ChangeMode(Mode::Off)]),
        EventKind::HoldTick { count: 1, ticks: 0 } => actions(&[Action::SetLevel(floor)]),
        EventKind::HoldRelease { count: 1, .. } => actions(&[Action::SetLevel(0)]),
        EventKind::Tick => Actions::new(),
        _ => return None,
    })
}

fn strobe(kind: StrobeKind, ev: &Event, ctx: &FsmContext) -> Option<Actions> {
    Some(match ev.kind {
        EventKind::Click { count: 1 } => actions(&[Action::ChangeMode(Mode::Off)]),
        EventKind::Click { count: 2 } => actions(&[Action::ChangeMode(Mode::Strobe(kind.next()))]),
        EventKind::Tick => {
            let (on_ticks, period) = kind.timing();
            let flash = match kind {
                StrobeKind::Beacon => ctx.clamp_level(ctx.memorized),
                StrobeKind::Party | StrobeKind::Tactical => ctx.limits().1,
            };
            let want = if ctx.ticks_in_state % period < on_ticks { flash } else { 0 };
            if want == ctx.level {
                Actions::new()
            } else {
                actions(&[Action::SetLevel(want)])
            }
        }
        _ => return None,
    })
}

fn config_menu(cursor: &mut MenuCursor, ev: &Event) -> Option<Actions> {
    let item = cursor.item;
    Some(match ev.kind {
        EventKind::Click { count: 1 } => actions(&[Action::AdjustConfig { item, up: true }, Action::Blink(1)]),
        EventKind::Click { count: 2 } => actions(&[Action::AdjustConfig { item, up: false }, Action::Blink(1)]),
        EventKind::Click { count: 3 } => match item.next() {
            Some(next) => {
                cursor.item = next;
                actions(&[Action::Blink(next.number())])
            }
            None => actions(&[Action::SaveConfig, Action::Pop]),
        },
        EventKind::HoldTick { count: 1, ticks: 0 } => actions(&[Action::SaveConfig, Action::Pop]),
        EventKind::Tick => Actions::new(),
        _ => return None,
    })
}

fn channel_select(ev: &Event, ctx: &FsmContext) -> Option<Actions> {
    Some(match ev.kind {
        EventKind::Click { count: 1 } => {
            let next = ctx.channel.next_enabled(ctx.config.channels_enabled);
            actions(&[Action::SetChannel(next), Action::Blink(1)])
        }
        EventKind::Click { count: 2 } | EventKind::HoldTick { count: 1, ticks: 0 } => {
            actions(&[Action::Pop, Action::Commit])
        }
        EventKind::Tick => {
            if ctx.idle_ticks >= ctx.config.ticks_from_ms(CHANNEL_SELECT_TIMEOUT_MS) {
                actions(&[Action::Pop])
            } else {
                Actions::new()
            }
        }
        _ => return None,
    })
}
