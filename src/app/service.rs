//! Application service: the hexagonal core.
//!
//! [`App`] owns the FSM, click sequencer, regulator, memory manager and
//! ramp table.  It exposes a clean, board-agnostic API.  All I/O flows
//! through port traits injected at call sites, making the whole light
//! testable with the in-memory [`SimBoard`](crate::adapters::sim::SimBoard).
//!
//! ```text
//!  EdgeQueue ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                │              App              │
//!  SensorPort ──▶│ Sequencer · FSM · Regulator   │──▶ OutputPort / AuxLedPort
//!                │   Memory · Ramp · Aux LEDs    │◀─▶ PersistPort
//!                └──────────────────────────────┘
//! ```
//!
//! One call to [`App::tick`] is one dispatch cycle:
//!
//! 1. advance FSM timing to `now`
//! 2. drain raw edges through the sequencer, poll it, dispatch `Tick`
//! 3. run the regulator when its interval is due
//! 4. service commit / config-save requests
//! 5. render the main emitters and aux LEDs (HAL writes only on change)

use heapless::Vec;
use log::{debug, info, trace, warn};

use crate::config::{AuxWhileOn, Channel, UiConfig};
use crate::drivers::aux_led::{AuxLedEngine, AuxRequest, Rgb};
use crate::drivers::button::{ClickSequencer, SeqEvents};
use crate::error::Error;
use crate::events::{Event, EventKind, RawEdge};
use crate::fsm::context::FsmContext;
use crate::fsm::{Fsm, ModeId};
use crate::memory::{CommitOutcome, MemoryManager};
use crate::ramp::{MAX_PATHS, PathId, RampTable, aux_intensity};
use crate::safety::{RegEvents, Regulator};

use super::events::{AppEvent, Snapshot};
use super::ports::{AuxDrive, AuxLed, EventSink, Hal, SwitchPort};

// ───────────────────────────────────────────────────────────────
// App
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct App {
    fsm: Fsm,
    ctx: FsmContext,
    sequencer: ClickSequencer,
    regulator: Regulator,
    memory: MemoryManager,
    ramp: RampTable,
    aux: AuxLedEngine,
    /// Current tick.
    now: u32,
    last_render: u32,
    /// Last switch level seen by [`App::sample_switch`].
    last_switch: bool,
    // Last values written to the HAL.
    last_drive: Option<Vec<u16, MAX_PATHS>>,
    last_rgb: Option<Rgb>,
    last_button: Option<u8>,
}

impl App {
    /// Construct the app from a configuration and the board's ramp table.
    ///
    /// Does **not** boot the FSM; call [`App::start`] next.
    pub fn new(config: UiConfig, ramp: RampTable) -> Result<Self, Error> {
        config.validate()?;
        let sequencer = ClickSequencer::new(config.input);
        Ok(Self {
            fsm: Fsm::new(),
            ctx: FsmContext::new(config),
            sequencer,
            regulator: Regulator::new(),
            memory: MemoryManager::new(),
            ramp,
            aux: AuxLedEngine::new(),
            now: 0,
            last_render: 0,
            last_switch: false,
            last_drive: None,
            last_rgb: None,
            last_button: None,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the stored configuration and state, seed the sequencer from
    /// the switch level and enter the boot mode.  Booting never commits.
    pub fn start(&mut self, hal: &mut impl Hal, sink: &mut impl EventSink) {
        match self.memory.load_config(&*hal) {
            Ok(Some(config)) => {
                self.sequencer.set_timing(config.input);
                self.ctx.config = config;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("stored config ignored: {e}");
                sink.emit(&AppEvent::Recoverable(e));
            }
        }

        let restored = match self.memory.load(&*hal) {
            Ok(state) => state,
            Err(e) => {
                warn!("stored state ignored: {e}");
                sink.emit(&AppEvent::Recoverable(e));
                None
            }
        };

        let pressed = hal.read_switch();
        self.sequencer.seed(pressed);
        self.last_switch = pressed;

        self.fsm.boot(restored, self.now, &mut self.ctx);
        self.render(hal);

        let mode = self.fsm.current_mode();
        sink.emit(&AppEvent::Started {
            mode,
            restored: restored.is_some(),
        });
        info!("App started in {:?} (level {})", mode, self.level());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one dispatch cycle at tick `now`.
    ///
    /// `edges` are the raw switch edges captured since the last call,
    /// usually drained from the [`EdgeQueue`](crate::events::EdgeQueue).
    pub fn tick(
        &mut self,
        now: u32,
        edges: impl IntoIterator<Item = RawEdge>,
        hal: &mut impl Hal,
        sink: &mut impl EventSink,
    ) {
        self.now = now;

        // 1. Timing
        self.fsm.tick(now, &mut self.ctx);

        // 2. Input edges, sequencer timeouts, Tick
        let mut seq = SeqEvents::new();
        for edge in edges {
            self.sequencer.on_edge(edge, &mut seq);
            self.dispatch_all(&mut seq, sink);
        }
        self.sequencer.poll(now, &mut seq);
        self.dispatch_all(&mut seq, sink);
        self.dispatch(Event::new(EventKind::Tick, now), sink);

        // 3. Regulator
        if self.regulator.due(now, &self.ctx.config) {
            self.regulator.set_throttled(self.ctx.thermal_cap.is_some());
            let mut out = RegEvents::new();
            if let Err(e) = self.regulator.check(now, hal, &self.ctx.config, &mut out) {
                debug!("regulator: {e}");
                sink.emit(&AppEvent::Recoverable(e));
            }
            for ev in out {
                self.dispatch(ev, sink);
            }
        }

        // 4. Persistence
        self.service_requests(hal, sink);

        // 5. Outputs
        self.render(hal);
    }

    /// Poll the switch level and return an edge when it changed.  For
    /// boards without a pin-change interrupt; pass the edge to
    /// [`App::tick`].
    pub fn sample_switch(&mut self, now: u32, hal: &mut impl SwitchPort) -> Option<RawEdge> {
        let pressed = hal.read_switch();
        if pressed == self.last_switch {
            return None;
        }
        self.last_switch = pressed;
        Some(RawEdge { pressed, tick: now })
    }

    /// Inject an event directly (bypassing the sequencer / regulator).
    pub fn handle_event(&mut self, ev: Event, hal: &mut impl Hal, sink: &mut impl EventSink) {
        self.dispatch(ev, sink);
        self.service_requests(hal, sink);
        self.render(hal);
    }

    // ── Queries ───────────────────────────────────────────────

    /// Active (top) mode.
    pub fn mode(&self) -> ModeId {
        self.fsm.current_mode()
    }

    pub fn base_mode(&self) -> ModeId {
        self.fsm.base_mode()
    }

    /// Requested level while lit; the memorized level while off.
    pub fn level(&self) -> u8 {
        if self.ctx.level > 0 {
            self.ctx.level
        } else {
            self.ctx.memorized
        }
    }

    /// Level actually driven (thermal cap applied, 0 = dark).
    pub fn output_level(&self) -> u8 {
        self.ctx.output_level()
    }

    pub fn channel(&self) -> Channel {
        self.ctx.channel
    }

    pub fn is_locked(&self) -> bool {
        self.ctx.locked
    }

    pub fn thermal_cap(&self) -> Option<u8> {
        self.ctx.thermal_cap
    }

    pub fn config(&self) -> &UiConfig {
        &self.ctx.config
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.fsm.current_mode(),
            base_mode: self.fsm.base_mode(),
            stack_depth: self.fsm.depth(),
            level: self.ctx.level,
            output_level: self.ctx.output_level(),
            memorized: self.ctx.memorized,
            channel: self.ctx.channel,
            locked: self.ctx.locked,
            thermal_cap: self.ctx.thermal_cap,
            fault_flags: self.regulator.faults(),
            voltage_mv: self.regulator.last_voltage(),
            temperature_c: self.regulator.last_temperature(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn dispatch_all(&mut self, events: &mut SeqEvents, sink: &mut impl EventSink) {
        for ev in events.iter().copied() {
            self.dispatch(ev, sink);
        }
        events.clear();
    }

    fn dispatch(&mut self, ev: Event, sink: &mut impl EventSink) {
        let from = self.fsm.current_mode();
        let cap = self.ctx.thermal_cap;

        match self.fsm.dispatch(&ev, &mut self.ctx) {
            Ok(()) => {}
            Err(Error::UnrecognizedEvent) => trace!("dropped {:?} in {:?}", ev.kind, from),
            Err(e) => {
                warn!("dispatch {:?}: {e}", ev.kind);
                sink.emit(&AppEvent::Recoverable(e));
            }
        }

        let to = self.fsm.current_mode();
        if to != from {
            sink.emit(&AppEvent::ModeChanged { from, to });
        }
        if self.ctx.thermal_cap != cap {
            sink.emit(&AppEvent::Throttle {
                cap: self.ctx.thermal_cap,
            });
        }
    }

    /// Run the commits and config saves the FSM asked for.  Failures keep
    /// the light running; the next trigger retries.
    fn service_requests(&mut self, hal: &mut impl Hal, sink: &mut impl EventSink) {
        if self.ctx.commit_requested {
            self.ctx.commit_requested = false;
            let state = self.ctx.persisted(self.fsm.base_mode());
            match self.memory.commit(hal, state) {
                Ok(CommitOutcome::Written { slot }) => {
                    sink.emit(&AppEvent::Committed { state, slot });
                }
                Ok(CommitOutcome::Unchanged) => {}
                Err(e) => {
                    warn!("commit failed: {e}");
                    sink.emit(&AppEvent::Recoverable(e));
                }
            }
        }

        if self.ctx.save_config_requested {
            self.ctx.save_config_requested = false;
            self.sequencer.set_timing(self.ctx.config.input);
            match self.memory.save_config(hal, &self.ctx.config) {
                Ok(true) => sink.emit(&AppEvent::ConfigSaved),
                Ok(false) => {}
                Err(e) => {
                    warn!("config save failed: {e}");
                    sink.emit(&AppEvent::Recoverable(e));
                }
            }
        }
    }

    /// Translate the rendered level into port calls.
    fn render(&mut self, hal: &mut impl Hal) {
        let delta_ms = self
            .now
            .wrapping_sub(self.last_render)
            .saturating_mul(u32::from(self.ctx.config.tick_interval_ms));
        self.last_render = self.now;

        let level = self.ctx.rendered_level();
        let path_count = hal.path_count().clamp(1, MAX_PATHS);

        // ── Main emitters / aux channel ──────────────────────
        let (frame, request) = match self.ctx.channel.aux_color() {
            Some(color) if level > 0 => (
                Default::default(),
                AuxRequest::Channel {
                    color,
                    intensity: aux_intensity(level),
                },
            ),
            Some(_) => (Default::default(), self.aux_request(0)),
            None => (
                self.ramp.physical_output(level, path_count),
                self.aux_request(level),
            ),
        };
        let drive: Vec<u16, MAX_PATHS> = (0..path_count)
            .map(|id| {
                frame
                    .iter()
                    .find(|(path, _)| usize::from(*path) == id)
                    .map_or(0, |&(_, units)| units)
            })
            .collect();

        if self.last_drive.as_ref() != Some(&drive) {
            for (id, &units) in drive.iter().enumerate() {
                hal.set_output(id as PathId, units);
            }
            self.last_drive = Some(drive);
        }

        // ── Aux LEDs ──────────────────────────────────────────
        let voltage = self.regulator.last_voltage().unwrap_or(0);
        let rgb = self.aux.tick(delta_ms, request, voltage);
        if self.last_rgb != Some(rgb) {
            hal.set_aux_led(AuxLed::Rgb, AuxDrive::Color(rgb));
            self.last_rgb = Some(rgb);
        }
        let button = self.aux.button_intensity(request);
        if self.last_button != Some(button) {
            hal.set_aux_led(AuxLed::Button, AuxDrive::Intensity(button));
            self.last_button = Some(button);
        }
    }

    fn aux_request(&self, level: u8) -> AuxRequest {
        let cfg = &self.ctx.config;
        if level > 0 {
            return match cfg.aux_led_while_on {
                AuxWhileOn::Off => AuxRequest::Dark,
                AuxWhileOn::On { high_above_level } => AuxRequest::WhileOn {
                    bright: level > high_above_level,
                },
            };
        }
        match self.fsm.base_mode() {
            ModeId::Locked => AuxRequest::Resting(cfg.rgb_lockout),
            ModeId::Off => AuxRequest::Resting(cfg.rgb_off),
            _ => AuxRequest::Dark,
        }
    }
}
