//! In-memory board for host simulation and tests.
//!
//! Implements every HAL port over plain memory: outputs are recorded,
//! sensors return injectable values (or injectable read failures), and the
//! persistence areas live in a `HashMap` with write counting and
//! injectable write failures.

use std::collections::HashMap;

use log::trace;

use crate::app::ports::{
    AuxDrive, AuxLed, AuxLedPort, OutputPort, PersistArea, PersistPort, SensorPort, StorageError,
    SwitchPort,
};
use crate::drivers::aux_led::{BLACK, Rgb};
use crate::error::HalReadError;
use crate::ramp::{MAX_PATHS, PathId};

/// Resting battery voltage of a fresh simulated cell.
const SIM_VOLTAGE_MV: u16 = 4000;
const SIM_TEMPERATURE_C: i16 = 25;

pub struct SimBoard {
    outputs: [u16; MAX_PATHS],
    path_count: usize,
    switch: bool,
    voltage: Result<u16, HalReadError>,
    temperature: Result<i16, HalReadError>,
    aux_rgb: Rgb,
    button_led: u8,
    store: HashMap<PersistArea, Vec<u8>>,
    writes: u32,
    output_writes: u32,
    failing_writes: u32,
    failing_reads: bool,
}

impl SimBoard {
    /// A board with `path_count` power paths (clamped to 1..=4).
    pub fn new(path_count: usize) -> Self {
        Self {
            outputs: [0; MAX_PATHS],
            path_count: path_count.clamp(1, MAX_PATHS),
            switch: false,
            voltage: Ok(SIM_VOLTAGE_MV),
            temperature: Ok(SIM_TEMPERATURE_C),
            aux_rgb: BLACK,
            button_led: 0,
            store: HashMap::new(),
            writes: 0,
            output_writes: 0,
            failing_writes: 0,
            failing_reads: false,
        }
    }

    // ── Inputs ────────────────────────────────────────────────

    pub fn set_switch(&mut self, pressed: bool) {
        self.switch = pressed;
    }

    pub fn set_voltage_mv(&mut self, mv: u16) {
        self.voltage = Ok(mv);
    }

    pub fn set_temperature_c(&mut self, c: i16) {
        self.temperature = Ok(c);
    }

    /// Make voltage reads fail until the next `set_voltage_mv`.
    pub fn fail_voltage(&mut self, err: HalReadError) {
        self.voltage = Err(err);
    }

    /// Make temperature reads fail until the next `set_temperature_c`.
    pub fn fail_temperature(&mut self, err: HalReadError) {
        self.temperature = Err(err);
    }

    /// Fail the next `n` persistence writes with `StorageError::IoError`.
    pub fn fail_next_writes(&mut self, n: u32) {
        self.failing_writes = n;
    }

    /// Make every storage read fail until cleared.
    pub fn fail_reads(&mut self, fail: bool) {
        self.failing_reads = fail;
    }

    // ── Outputs ───────────────────────────────────────────────

    pub fn output(&self, path: usize) -> u16 {
        self.outputs.get(path).copied().unwrap_or(0)
    }

    pub fn outputs(&self) -> &[u16] {
        &self.outputs[..self.path_count]
    }

    pub fn is_dark(&self) -> bool {
        self.outputs().iter().all(|&u| u == 0)
    }

    pub fn aux_rgb(&self) -> Rgb {
        self.aux_rgb
    }

    pub fn button_led(&self) -> u8 {
        self.button_led
    }

    /// Number of `set_output` calls so far.
    pub fn output_writes(&self) -> u32 {
        self.output_writes
    }

    // ── Storage ───────────────────────────────────────────────

    /// Successful persistence writes so far.
    pub fn writes(&self) -> u32 {
        self.writes
    }

    pub fn stored(&self, area: PersistArea) -> Option<&[u8]> {
        self.store.get(&area).map(Vec::as_slice)
    }

    /// Store raw bytes without counting a write.
    pub fn write_raw(&mut self, area: PersistArea, data: &[u8]) {
        self.store.insert(area, data.to_vec());
    }

    /// Flip every bit of one stored byte.
    pub fn corrupt(&mut self, area: PersistArea, index: usize) {
        if let Some(b) = self.store.get_mut(&area).and_then(|d| d.get_mut(index)) {
            *b ^= 0xFF;
        }
    }

    /// Forget everything stored (a fresh, never-written part).
    pub fn erase(&mut self) {
        self.store.clear();
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new(1)
    }
}

impl OutputPort for SimBoard {
    fn set_output(&mut self, path: PathId, intensity: u16) {
        if let Some(slot) = self.outputs.get_mut(usize::from(path)) {
            *slot = intensity;
            self.output_writes += 1;
            trace!("sim: path {path} = {intensity}");
        }
    }

    fn path_count(&self) -> usize {
        self.path_count
    }
}

impl SwitchPort for SimBoard {
    fn read_switch(&mut self) -> bool {
        self.switch
    }
}

impl SensorPort for SimBoard {
    fn read_voltage_mv(&mut self) -> Result<u16, HalReadError> {
        self.voltage
    }

    fn read_temperature_c(&mut self) -> Result<i16, HalReadError> {
        self.temperature
    }
}

impl AuxLedPort for SimBoard {
    fn set_aux_led(&mut self, led: AuxLed, drive: AuxDrive) {
        match (led, drive) {
            (AuxLed::Rgb, AuxDrive::Color(rgb)) => self.aux_rgb = rgb,
            (AuxLed::Rgb, AuxDrive::Intensity(i)) => self.aux_rgb = (i, i, i),
            (AuxLed::Button, AuxDrive::Intensity(i)) => self.button_led = i,
            (AuxLed::Button, AuxDrive::Color((r, g, b))) => self.button_led = r.max(g).max(b),
        }
    }
}

impl PersistPort for SimBoard {
    fn persist_write(&mut self, area: PersistArea, data: &[u8]) -> Result<(), StorageError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(StorageError::IoError);
        }
        self.store.insert(area, data.to_vec());
        self.writes += 1;
        Ok(())
    }

    fn persist_read(&self, area: PersistArea, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
        if self.failing_reads {
            return Err(StorageError::IoError);
        }
        let Some(data) = self.store.get(&area) else {
            return Ok(None);
        };
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(Some(n))
    }
}
