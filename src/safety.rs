//! Thermal / voltage regulator.
//!
//! The regulator runs **every `regulator_interval_ticks`**, reads the
//! driver temperature and battery voltage through the [`SensorPort`], keeps
//! a latched fault bitmask and emits events for the FSM to act on.
//!
//! ## Thermal loop
//!
//! ```text
//!   temp > ceiling                 ──▶ ThermalHigh   (every check)
//!   ceiling-hyst ≤ temp ≤ ceiling  ──▶ (hold)
//!   temp < ceiling-hyst, throttled ──▶ ThermalRecover (every check)
//! ```
//!
//! Each `ThermalHigh` lowers the FSM's output cap one step; each
//! `ThermalRecover` raises it one smaller step until it lifts.  A failed
//! temperature read counts as over the ceiling.
//!
//! ## Battery
//!
//! | Condition                           | Event             |
//! |-------------------------------------|-------------------|
//! | `v < critical`                      | `VoltageCritical` |
//! | `v < low` (once; re-armed +100 mV)  | `VoltageLow`      |
//! | drop > `voltage_cliff_mv` per check | `PowerLoss`       |
//!
//! Failed voltage reads are skipped and retried at the next check.

use core::fmt;

use heapless::Vec;
use log::{error, info};

use crate::app::ports::SensorPort;
use crate::config::UiConfig;
use crate::error::Error;
use crate::events::{Event, EventKind};

/// Margin above `low_voltage_mv` before another warning can fire.
const LOW_VOLTAGE_REARM_MV: u16 = 100;

/// Events produced by one regulator check.
pub type RegEvents = Vec<Event, 4>;

/// Regulator fault bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegulatorFault {
    OverTemperature = 0,
    LowVoltage = 1,
    CriticalVoltage = 2,
    SensorFault = 3,
}

impl RegulatorFault {
    pub fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for RegulatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverTemperature => write!(f, "over temperature"),
            Self::LowVoltage => write!(f, "low voltage"),
            Self::CriticalVoltage => write!(f, "critical voltage"),
            Self::SensorFault => write!(f, "sensor read failure"),
        }
    }
}

/// Thermal / voltage regulator.
pub struct Regulator {
    /// Latched fault bitmask.
    faults: u8,
    /// Whether the FSM currently holds a thermal cap.
    throttled: bool,
    last_voltage: Option<u16>,
    last_temperature: Option<i16>,
    low_armed: bool,
    last_check: Option<u32>,
}

impl Default for Regulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Regulator {
    pub fn new() -> Self {
        Self {
            faults: 0,
            throttled: false,
            last_voltage: None,
            last_temperature: None,
            low_armed: true,
            last_check: None,
        }
    }

    /// Whether a check is due at `now`.
    pub fn due(&self, now: u32, cfg: &UiConfig) -> bool {
        self.last_check
            .is_none_or(|t| now.wrapping_sub(t) >= u32::from(cfg.regulator_interval_ticks))
    }

    /// Tell the regulator whether output is currently capped, so recovery
    /// events stop once the cap lifts.
    pub fn set_throttled(&mut self, throttled: bool) {
        self.throttled = throttled;
    }

    /// Run one check.  Events are pushed to `out` even when a read failed;
    /// the first read failure is returned.
    pub fn check(
        &mut self,
        now: u32,
        sensors: &mut impl SensorPort,
        cfg: &UiConfig,
        out: &mut RegEvents,
    ) -> Result<(), Error> {
        self.last_check = Some(now);
        let mut read_err = None;

        // ── Temperature ───────────────────────────────────────────
        let temp = sensors.read_temperature_c();
        let over = match temp {
            Ok(t) => {
                self.last_temperature = Some(t);
                t > cfg.thermal_ceiling_c
            }
            Err(e) => {
                read_err = Some(e);
                true
            }
        };
        self.eval_fault(RegulatorFault::OverTemperature, over);
        if over {
            self.throttled = true;
            push(out, EventKind::ThermalHigh, now);
        } else if let Ok(t) = temp {
            if self.throttled && t < cfg.thermal_ceiling_c - cfg.thermal_hysteresis_c {
                push(out, EventKind::ThermalRecover, now);
            }
        }

        // ── Battery ───────────────────────────────────────────────
        match sensors.read_voltage_mv() {
            Ok(v) => {
                if let Some(prev) = self.last_voltage {
                    if prev.saturating_sub(v) > cfg.voltage_cliff_mv {
                        push(out, EventKind::PowerLoss, now);
                    }
                }
                self.last_voltage = Some(v);

                let critical = v < cfg.critical_voltage_mv;
                self.eval_fault(RegulatorFault::CriticalVoltage, critical);
                if critical {
                    push(out, EventKind::VoltageCritical, now);
                }

                let low = v < cfg.low_voltage_mv;
                self.eval_fault(RegulatorFault::LowVoltage, low);
                if low && self.low_armed {
                    self.low_armed = false;
                    push(out, EventKind::VoltageLow, now);
                } else if v >= cfg.low_voltage_mv.saturating_add(LOW_VOLTAGE_REARM_MV) {
                    self.low_armed = true;
                }
            }
            Err(e) => {
                read_err = read_err.or(Some(e));
            }
        }

        self.eval_fault(RegulatorFault::SensorFault, read_err.is_some());
        match read_err {
            Some(e) => Err(Error::HardwareRead(e)),
            None => Ok(()),
        }
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: RegulatorFault) -> bool {
        self.faults & fault.mask() != 0
    }

    /// Last good battery reading.
    pub fn last_voltage(&self) -> Option<u16> {
        self.last_voltage
    }

    pub fn last_temperature(&self) -> Option<i16> {
        self.last_temperature
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: RegulatorFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("REGULATOR FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("REGULATOR FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}

fn push(out: &mut RegEvents, kind: EventKind, now: u32) {
    if out.push(Event::new(kind, now)).is_err() {
        log::warn!("regulator output full, dropped {kind:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim::SimBoard;
    use crate::error::HalReadError;

    fn run(reg: &mut Regulator, hw: &mut SimBoard, cfg: &UiConfig) -> (std::vec::Vec<EventKind>, Result<(), Error>) {
        let mut out = RegEvents::new();
        let r = reg.check(0, hw, cfg, &mut out);
        (out.iter().map(|e| e.kind).collect(), r)
    }

    #[test]
    fn nominal_conditions_are_quiet() {
        let cfg = UiConfig::default();
        let mut hw = SimBoard::new(1);
        let mut reg = Regulator::new();
        let (ev, r) = run(&mut reg, &mut hw, &cfg);
        assert!(ev.is_empty());
        assert_eq!(r, Ok(()));
        assert_eq!(reg.faults(), 0);
    }

    #[test]
    fn over_ceiling_emits_thermal_high_each_check() {
        let cfg = UiConfig::default();
        let mut hw = SimBoard::new(1);
        hw.set_temperature_c(cfg.thermal_ceiling_c + 1);
        let mut reg = Regulator::new();
        for _ in 0..3 {
            assert_eq!(run(&mut reg, &mut hw, &cfg).0, vec![EventKind::ThermalHigh]);
        }
        assert!(reg.has_fault(RegulatorFault::OverTemperature));
    }

    #[test]
    fn recovery_waits_for_hysteresis() {
        let cfg = UiConfig::default();
        let mut hw = SimBoard::new(1);
        let mut reg = Regulator::new();
        hw.set_temperature_c(cfg.thermal_ceiling_c + 2);
        let _ = run(&mut reg, &mut hw, &cfg);

        hw.set_temperature_c(cfg.thermal_ceiling_c - 1);
        assert!(run(&mut reg, &mut hw, &cfg).0.is_empty());
        assert!(!reg.has_fault(RegulatorFault::OverTemperature));

        hw.set_temperature_c(cfg.thermal_ceiling_c - cfg.thermal_hysteresis_c - 1);
        assert_eq!(run(&mut reg, &mut hw, &cfg).0, vec![EventKind::ThermalRecover]);

        reg.set_throttled(false);
        assert!(run(&mut reg, &mut hw, &cfg).0.is_empty());
    }

    #[test]
    fn failed_temperature_read_assumes_worst_case() {
        let cfg = UiConfig::default();
        let mut hw = SimBoard::new(1);
        hw.fail_temperature(HalReadError::AdcTimeout);
        let mut reg = Regulator::new();
        let (ev, r) = run(&mut reg, &mut hw, &cfg);
        assert_eq!(ev, vec![EventKind::ThermalHigh]);
        assert_eq!(r, Err(Error::HardwareRead(HalReadError::AdcTimeout)));
        assert!(reg.has_fault(RegulatorFault::SensorFault));
    }

    #[test]
    fn low_voltage_warns_once_until_rearmed() {
        let cfg = UiConfig::default();
        let mut hw = SimBoard::new(1);
        let mut reg = Regulator::new();
        hw.set_voltage_mv(cfg.low_voltage_mv - 10);
        assert_eq!(run(&mut reg, &mut hw, &cfg).0, vec![EventKind::VoltageLow]);
        assert!(run(&mut reg, &mut hw, &cfg).0.is_empty());

        hw.set_voltage_mv(cfg.low_voltage_mv + 50);
        let _ = run(&mut reg, &mut hw, &cfg);
        hw.set_voltage_mv(cfg.low_voltage_mv - 10);
        assert!(run(&mut reg, &mut hw, &cfg).0.is_empty());

        hw.set_voltage_mv(cfg.low_voltage_mv + LOW_VOLTAGE_REARM_MV);
        let _ = run(&mut reg, &mut hw, &cfg);
        hw.set_voltage_mv(cfg.low_voltage_mv - 10);
        assert_eq!(run(&mut reg, &mut hw, &cfg).0, vec![EventKind::VoltageLow]);
    }

    #[test]
    fn critical_voltage_reported_every_check() {
        let cfg = UiConfig::default();
        let mut hw = SimBoard::new(1);
        let mut reg = Regulator::new();
        hw.set_voltage_mv(cfg.critical_voltage_mv - 1);
        let (ev, _) = run(&mut reg, &mut hw, &cfg);
        assert_eq!(ev, vec![EventKind::VoltageCritical, EventKind::VoltageLow]);
        let (ev, _) = run(&mut reg, &mut hw, &cfg);
        assert_eq!(ev, vec![EventKind::VoltageCritical]);
    }

    #[test]
    fn voltage_cliff_signals_power_loss() {
        let cfg = UiConfig::default();
        let mut hw = SimBoard::new(1);
        let mut reg = Regulator::new();
        hw.set_voltage_mv(4000);
        let _ = run(&mut reg, &mut hw, &cfg);
        hw.set_voltage_mv(4000 - cfg.voltage_cliff_mv - 1);
        assert_eq!(run(&mut reg, &mut hw, &cfg).0, vec![EventKind::PowerLoss]);
        assert_eq!(reg.last_voltage(), Some(4000 - cfg.voltage_cliff_mv - 1));
    }

    #[test]
    fn failed_voltage_read_is_skipped() {
        let cfg = UiConfig::default();
        let mut hw = SimBoard::new(1);
        let mut reg = Regulator::new();
        let _ = run(&mut reg, &mut hw, &cfg);
        let before = reg.last_voltage();
        hw.fail_voltage(HalReadError::OutOfRange);
        let (ev, r) = run(&mut reg, &mut hw, &cfg);
        assert!(ev.is_empty());
        assert!(r.is_err());
        assert_eq!(reg.last_voltage(), before);
    }

    #[test]
    fn due_follows_interval() {
        let cfg = UiConfig::default();
        let mut hw = SimBoard::new(1);
        let mut reg = Regulator::new();
        assert!(reg.due(0, &cfg));
        let mut out = RegEvents::new();
        reg.check(10, &mut hw, &cfg, &mut out).unwrap();
        assert!(!reg.due(10 + u32::from(cfg.regulator_interval_ticks) - 1, &cfg));
        assert!(reg.due(10 + u32::from(cfg.regulator_interval_ticks), &cfg));
    }
}
