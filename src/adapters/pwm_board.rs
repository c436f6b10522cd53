//! Generic `embedded-hal` board adapter.
//!
//! Bridges real peripherals to the HAL port traits.  Each power path is
//! one PWM (or DAC-backed) channel implementing
//! [`SetDutyCycle`](embedded_hal::pwm::SetDutyCycle); the driver enable,
//! the aux R/G/B LEDs and the button LED are plain
//! [`OutputPin`]s; the e-switch is an active-low [`InputPin`].  Sensor
//! and storage services differ too much between MCUs to abstract here, so
//! they are injected as ready-made [`SensorPort`] / [`PersistPort`]
//! implementations.
//!
//! Pin errors are logged and swallowed: a light that cannot toggle its
//! button LED should keep lighting.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use heapless::Vec;
use log::warn;

use crate::app::ports::{
    AuxDrive, AuxLed, AuxLedPort, OutputPort, PersistArea, PersistPort, SensorPort, StorageError,
    SwitchPort,
};
use crate::error::HalReadError;
use crate::ramp::{MAX_PATHS, PathId};

/// One power path: its PWM channel and the intensity that means 100 %.
pub struct PathChannel<P> {
    pub pwm: P,
    pub full_scale: u16,
}

/// Indicator pins.
pub struct AuxPins<O> {
    pub red: O,
    pub green: O,
    pub blue: O,
    pub button: O,
}

pub struct PwmBoard<P, O, I, S, M> {
    paths: Vec<PathChannel<P>, MAX_PATHS>,
    lit: [bool; MAX_PATHS],
    enable: O,
    aux: AuxPins<O>,
    switch: I,
    sensors: S,
    storage: M,
}

impl<P, O, I, S, M> PwmBoard<P, O, I, S, M>
where
    P: SetDutyCycle,
    O: OutputPin,
    I: InputPin,
    S: SensorPort,
    M: PersistPort,
{
    /// Build the board.  Paths beyond [`MAX_PATHS`] are ignored.  All
    /// outputs start dark with the driver disabled.
    pub fn new(
        paths: impl IntoIterator<Item = PathChannel<P>>,
        enable: O,
        aux: AuxPins<O>,
        switch: I,
        sensors: S,
        storage: M,
    ) -> Self {
        let mut list = Vec::new();
        for path in paths {
            if list.push(path).is_err() {
                warn!("board: more than {MAX_PATHS} power paths, extra ignored");
                break;
            }
        }
        let mut board = Self {
            paths: list,
            lit: [false; MAX_PATHS],
            enable,
            aux,
            switch,
            sensors,
            storage,
        };
        for id in 0..board.paths.len() {
            board.set_output(id as PathId, 0);
        }
        drive_pin(&mut board.enable, false, "enable");
        board.set_aux_led(AuxLed::Rgb, AuxDrive::Color((0, 0, 0)));
        board.set_aux_led(AuxLed::Button, AuxDrive::Intensity(0));
        board
    }

    /// Give the peripherals back.
    pub fn release(self) -> (Vec<PathChannel<P>, MAX_PATHS>, O, AuxPins<O>, I, S, M) {
        (self.paths, self.enable, self.aux, self.switch, self.sensors, self.storage)
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub fn storage_mut(&mut self) -> &mut M {
        &mut self.storage
    }
}

fn drive_pin<O: OutputPin>(pin: &mut O, on: bool, name: &str) {
    let result = if on { pin.set_high() } else { pin.set_low() };
    if result.is_err() {
        warn!("board: {name} pin write failed");
    }
}

impl<P, O, I, S, M> OutputPort for PwmBoard<P, O, I, S, M>
where
    P: SetDutyCycle,
    O: OutputPin,
{
    fn set_output(&mut self, path: PathId, intensity: u16) {
        let id = usize::from(path);
        let Some(ch) = self.paths.get_mut(id) else {
            return;
        };
        let full = ch.full_scale.max(1);
        if ch.pwm.set_duty_cycle_fraction(intensity.min(full), full).is_err() {
            warn!("board: path {path} duty write failed");
        }

        let was_on = self.lit.iter().any(|&l| l);
        self.lit[id] = intensity > 0;
        let is_on = self.lit.iter().any(|&l| l);
        if was_on != is_on {
            drive_pin(&mut self.enable, is_on, "enable");
        }
    }

    fn path_count(&self) -> usize {
        self.paths.len()
    }
}

impl<P, O, I, S, M> SwitchPort for PwmBoard<P, O, I, S, M>
where
    I: InputPin,
{
    fn read_switch(&mut self) -> bool {
        // Active low; a failed read counts as released.
        self.switch.is_low().unwrap_or(false)
    }
}

impl<P, O, I, S, M> SensorPort for PwmBoard<P, O, I, S, M>
where
    S: SensorPort,
{
    fn read_voltage_mv(&mut self) -> Result<u16, HalReadError> {
        self.sensors.read_voltage_mv()
    }

    fn read_temperature_c(&mut self) -> Result<i16, HalReadError> {
        self.sensors.read_temperature_c()
    }
}

impl<P, O, I, S, M> AuxLedPort for PwmBoard<P, O, I, S, M>
where
    O: OutputPin,
{
    fn set_aux_led(&mut self, led: AuxLed, drive: AuxDrive) {
        match (led, drive) {
            (AuxLed::Rgb, AuxDrive::Color((r, g, b))) => {
                drive_pin(&mut self.aux.red, r > 0, "aux red");
                drive_pin(&mut self.aux.green, g > 0, "aux green");
                drive_pin(&mut self.aux.blue, b > 0, "aux blue");
            }
            (AuxLed::Rgb, AuxDrive::Intensity(i)) => {
                drive_pin(&mut self.aux.red, i > 0, "aux red");
                drive_pin(&mut self.aux.green, i > 0, "aux green");
                drive_pin(&mut self.aux.blue, i > 0, "aux blue");
            }
            (AuxLed::Button, AuxDrive::Intensity(i)) => {
                drive_pin(&mut self.aux.button, i > 0, "button");
            }
            (AuxLed::Button, AuxDrive::Color((r, g, b))) => {
                drive_pin(&mut self.aux.button, r > 0 || g > 0 || b > 0, "button");
            }
        }
    }
}

impl<P, O, I, S, M> PersistPort for PwmBoard<P, O, I, S, M>
where
    M: PersistPort,
{
    fn persist_write(&mut self, area: PersistArea, data: &[u8]) -> Result<(), StorageError> {
        self.storage.persist_write(area, data)
    }

    fn persist_read(&self, area: PersistArea, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
        self.storage.persist_read(area, buf)
    }
}
