//! Mock board for integration tests.
//!
//! Records every HAL call so tests can assert on the full output history
//! without a real driver, and wraps the `App` in a small harness that
//! turns "click twice" / "hold for N ticks" into timed switch edges.

use std::collections::HashMap;

use lumefw::app::events::AppEvent;
use lumefw::app::ports::{
    AuxDrive, AuxLed, AuxLedPort, EventSink, OutputPort, PersistArea, PersistPort, SensorPort,
    StorageError, SwitchPort,
};
use lumefw::app::service::App;
use lumefw::config::UiConfig;
use lumefw::error::HalReadError;
use lumefw::events::RawEdge;
use lumefw::ramp::{PathId, RampTable};

// ── HAL call record ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HalCall {
    SetOutput { path: PathId, intensity: u16 },
    SetAux { led: AuxLed, drive: AuxDrive },
    PersistWrite { area: PersistArea, len: usize },
}

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    pub calls: Vec<HalCall>,
    pub paths: usize,
    pub switch: bool,
    pub voltage: Result<u16, HalReadError>,
    pub temperature: Result<i16, HalReadError>,
    pub store: HashMap<PersistArea, Vec<u8>>,
    pub fail_writes: u32,
    pub fail_reads: bool,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new(paths: usize) -> Self {
        Self {
            calls: Vec::new(),
            paths,
            switch: false,
            voltage: Ok(3900),
            temperature: Ok(25),
            store: HashMap::new(),
            fail_writes: 0,
            fail_reads: false,
        }
    }

    /// Latest intensity written to `path`.
    pub fn output(&self, path: PathId) -> u16 {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                HalCall::SetOutput { path: p, intensity } if *p == path => Some(*intensity),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub fn is_dark(&self) -> bool {
        (0..self.paths).all(|p| self.output(p as PathId) == 0)
    }

    pub fn state_writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, HalCall::PersistWrite { area: PersistArea::State(_), .. }))
            .count()
    }

    pub fn config_writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, HalCall::PersistWrite { area: PersistArea::Config, .. }))
            .count()
    }

    pub fn output_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, HalCall::SetOutput { .. }))
            .count()
    }

    /// Simulate a power cycle: keep durable storage, lose everything else.
    pub fn power_cycle(&self) -> Self {
        let mut next = Self::new(self.paths);
        next.store = self.store.clone();
        next
    }
}

impl OutputPort for MockBoard {
    fn set_output(&mut self, path: PathId, intensity: u16) {
        self.calls.push(HalCall::SetOutput { path, intensity });
    }

    fn path_count(&self) -> usize {
        self.paths
    }
}

impl SwitchPort for MockBoard {
    fn read_switch(&mut self) -> bool {
        self.switch
    }
}

impl SensorPort for MockBoard {
    fn read_voltage_mv(&mut self) -> Result<u16, HalReadError> {
        self.voltage
    }

    fn read_temperature_c(&mut self) -> Result<i16, HalReadError> {
        self.temperature
    }
}

impl AuxLedPort for MockBoard {
    fn set_aux_led(&mut self, led: AuxLed, drive: AuxDrive) {
        self.calls.push(HalCall::SetAux { led, drive });
    }
}

impl PersistPort for MockBoard {
    fn persist_write(&mut self, area: PersistArea, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(StorageError::IoError);
        }
        self.calls.push(HalCall::PersistWrite {
            area,
            len: data.len(),
        });
        self.store.insert(area, data.to_vec());
        Ok(())
    }

    fn persist_read(&self, area: PersistArea, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
        if self.fail_reads {
            return Err(StorageError::IoError);
        }
        Ok(self.store.get(&area).map(|d| {
            let n = d.len().min(buf.len());
            buf[..n].copy_from_slice(&d[..n]);
            n
        }))
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Rig {
    pub app: App,
    pub hw: MockBoard,
    pub sink: RecordingSink,
    pub now: u32,
    /// Configuration the app was built with (before any stored override).
    initial: UiConfig,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: UiConfig) -> Self {
        Self::with_board(config, MockBoard::new(3))
    }

    pub fn with_board(config: UiConfig, mut hw: MockBoard) -> Self {
        let mut app = App::new(config.clone(), RampTable::lume_x1()).expect("valid config");
        let mut sink = RecordingSink::default();
        app.start(&mut hw, &mut sink);
        Self {
            app,
            hw,
            sink,
            now: 0,
            initial: config,
        }
    }

    /// Reboot on the same storage.
    pub fn reboot(self) -> Self {
        Self::with_board(self.initial, self.hw.power_cycle())
    }

    fn edge(&mut self, pressed: bool) {
        self.now += 1;
        let edge = RawEdge {
            pressed,
            tick: self.now,
        };
        self.app.tick(self.now, [edge], &mut self.hw, &mut self.sink);
    }

    pub fn idle(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.now += 1;
            self.app.tick(self.now, [], &mut self.hw, &mut self.sink);
        }
    }

    /// One loop iteration that advances the clock by `ticks` at once.
    pub fn step(&mut self, ticks: u32) {
        self.now += ticks;
        self.app.tick(self.now, [], &mut self.hw, &mut self.sink);
    }

    /// Run until the click sequence has resolved.
    pub fn settle(&mut self) {
        let quiet = u32::from(self.app.config().input.release_ticks) + 2;
        self.idle(quiet);
    }

    /// `n` quick clicks, then wait for the sequence to resolve.
    pub fn clicks(&mut self, n: u8) {
        for _ in 0..n {
            self.edge(true);
            self.idle(2);
            self.edge(false);
            self.idle(2);
        }
        self.settle();
    }

    /// `clicks` short presses followed by a press held `held` ticks past
    /// the hold threshold, then release and settle.
    pub fn click_hold(&mut self, clicks: u8, held: u32) {
        for _ in 0..clicks {
            self.edge(true);
            self.idle(2);
            self.edge(false);
            self.idle(2);
        }
        self.press_for(u32::from(self.app.config().input.hold_ticks) + held);
        self.settle();
    }

    /// Hold the switch down for `ticks` ticks (press edge included).
    pub fn press_for(&mut self, ticks: u32) {
        self.edge(true);
        self.idle(ticks.saturating_sub(1));
        self.edge(false);
    }

    pub fn mode_changes(&self) -> Vec<(lumefw::fsm::ModeId, lumefw::fsm::ModeId)> {
        self.sink
            .events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ModeChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }
}
