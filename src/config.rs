//! Runtime UI configuration
//!
//! Every user-tunable option of the light, constructed once at startup and
//! validated before use.  Values can be overridden by the stored config
//! record (see [`memory`](crate::memory)) or edited in the config menu.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::ramp::MAX_LEVEL;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Which LED group the current output is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    /// The main emitters, driven through the power paths.
    Main = 0,
    AuxRed = 1,
    AuxYellow = 2,
    AuxGreen = 3,
    AuxCyan = 4,
    AuxBlue = 5,
    AuxPurple = 6,
    AuxWhite = 7,
}

impl Channel {
    pub const COUNT: u8 = 8;

    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0 => Self::Main,
            1 => Self::AuxRed,
            2 => Self::AuxYellow,
            3 => Self::AuxGreen,
            4 => Self::AuxCyan,
            5 => Self::AuxBlue,
            6 => Self::AuxPurple,
            7 => Self::AuxWhite,
            _ => return None,
        })
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Bit of this channel in a `channels_enabled` mask.
    pub fn mask(self) -> u8 {
        1 << self.to_byte()
    }

    /// Next channel enabled in `mask`, wrapping.  Returns `self` when no
    /// other channel is enabled.
    pub fn next_enabled(self, mask: u8) -> Self {
        let start = self.to_byte();
        for step in 1..=Self::COUNT {
            let idx = (start + step) % Self::COUNT;
            if mask & (1 << idx) != 0 {
                if let Some(ch) = Self::from_byte(idx) {
                    return ch;
                }
            }
        }
        self
    }

    /// Aux colour shown by an aux channel; `None` for the main emitters.
    pub fn aux_color(self) -> Option<AuxColor> {
        match self {
            Self::Main => None,
            Self::AuxRed => Some(AuxColor::Red),
            Self::AuxYellow => Some(AuxColor::Yellow),
            Self::AuxGreen => Some(AuxColor::Green),
            Self::AuxCyan => Some(AuxColor::Cyan),
            Self::AuxBlue => Some(AuxColor::Blue),
            Self::AuxPurple => Some(AuxColor::Purple),
            Self::AuxWhite => Some(AuxColor::White),
        }
    }
}

// ---------------------------------------------------------------------------
// Aux LED settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuxPattern {
    Off = 0,
    Low = 1,
    High = 2,
    Blinking = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuxColor {
    Red = 0,
    Yellow = 1,
    Green = 2,
    Cyan = 3,
    Blue = 4,
    Purple = 5,
    White = 6,
    /// Random colour change every few hundred milliseconds.
    Disco = 7,
    /// Slow hue rotation.
    Rainbow = 8,
    /// Colour tracks battery voltage.
    Voltage = 9,
}

impl AuxColor {
    const ALL: [Self; 10] = [
        Self::Red,
        Self::Yellow,
        Self::Green,
        Self::Cyan,
        Self::Blue,
        Self::Purple,
        Self::White,
        Self::Disco,
        Self::Rainbow,
        Self::Voltage,
    ];

    fn from_index(i: u8) -> Option<Self> {
        Self::ALL.get(i as usize).copied()
    }
}

/// Aux RGB behaviour in a resting mode, stored as `pattern << 4 | color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxSetting {
    pub pattern: AuxPattern,
    pub color: AuxColor,
}

impl AuxSetting {
    pub fn from_byte(b: u8) -> Option<Self> {
        let pattern = match b >> 4 {
            0 => AuxPattern::Off,
            1 => AuxPattern::Low,
            2 => AuxPattern::High,
            3 => AuxPattern::Blinking,
            _ => return None,
        };
        let color = AuxColor::from_index(b & 0x0F)?;
        Some(Self { pattern, color })
    }

    pub fn to_byte(self) -> u8 {
        ((self.pattern as u8) << 4) | self.color as u8
    }

    /// Step through every colour, then advance the pattern.
    pub fn cycle(self, up: bool) -> Self {
        let total = 4 * AuxColor::ALL.len() as u8;
        let flat = (self.pattern as u8) * AuxColor::ALL.len() as u8 + self.color as u8;
        let next = if up { (flat + 1) % total } else { (flat + total - 1) % total };
        let per = AuxColor::ALL.len() as u8;
        let pattern = match next / per {
            0 => AuxPattern::Off,
            1 => AuxPattern::Low,
            2 => AuxPattern::High,
            _ => AuxPattern::Blinking,
        };
        let color = AuxColor::from_index(next % per).unwrap_or(AuxColor::Voltage);
        Self { pattern, color }
    }
}

/// Aux LED behaviour while the main emitter is lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuxWhileOn {
    Off,
    /// Show the battery colour; bright above the given ramp level, dim below.
    On { high_above_level: u8 },
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Button timing thresholds, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTiming {
    /// An edge must hold its level this long before it is accepted.
    pub debounce_ticks: u8,
    /// Press duration after which a press becomes a hold.
    pub hold_ticks: u16,
    /// Quiet time after a release that ends a click sequence.
    pub release_ticks: u16,
}

impl Default for InputTiming {
    fn default() -> Self {
        Self {
            debounce_ticks: 1,
            hold_ticks: 24,    // ~400 ms at 16 ms/tick
            release_ticks: 18, // ~300 ms
        }
    }
}

/// Accuracy class of the board's temperature sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalSensor {
    /// Coarse on-die sensor; needs a bigger error margin.
    Coarse,
    /// Accurate sensor; can regulate closer to the limit.
    Precise,
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Core UI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    // --- Ramp ---
    /// Lowest level of the full ramp
    pub ramp_floor: u8,
    /// Highest level of the full ramp
    pub ramp_ceiling: u8,
    /// Ticks per level step while ramping
    pub ramp_step_ticks: u8,

    // --- Simple UI ---
    /// Restrict the UI to on/off/ramp/lockout
    pub simple_ui: bool,
    pub simple_floor: u8,
    pub simple_ceiling: u8,

    // --- Channels ---
    pub default_channel: Channel,
    /// Bit `n` set = channel `n` selectable
    pub channels_enabled: u8,

    // --- Thermal ---
    /// Try not to get hotter than this (Celsius)
    pub thermal_ceiling_c: i16,
    /// Recovery starts below `ceiling - hysteresis`
    pub thermal_hysteresis_c: i16,
    /// Levels removed per over-temperature check
    pub thermal_step: u8,
    /// Levels restored per recovery check
    pub thermal_recover_step: u8,

    // --- Battery ---
    pub low_voltage_mv: u16,
    /// Below this the output is shut off
    pub critical_voltage_mv: u16,
    /// A drop this large between checks means power is going away
    pub voltage_cliff_mv: u16,

    // --- Memory / lockout ---
    /// Auto-lock after this long in Off (0 = never)
    pub autolock_timeout_secs: u16,
    /// Commit after this long steady-on without input
    pub idle_commit_secs: u16,

    // --- Aux LEDs ---
    pub aux_led_while_on: AuxWhileOn,
    pub rgb_lockout: AuxSetting,
    pub rgb_off: AuxSetting,

    // --- Timing ---
    /// Main loop tick period (milliseconds)
    pub tick_interval_ms: u16,
    pub input: InputTiming,
    /// Ticks between regulator checks
    pub regulator_interval_ticks: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self::for_sensor(ThermalSensor::Precise)
    }
}

impl UiConfig {
    /// Defaults for a board with the given temperature sensor.
    pub fn for_sensor(sensor: ThermalSensor) -> Self {
        Self {
            // Ramp
            ramp_floor: 1,
            ramp_ceiling: MAX_LEVEL,
            ramp_step_ticks: 1,

            // Simple UI
            simple_ui: false,
            simple_floor: 10,
            simple_ceiling: 120,

            // Channels
            default_channel: Channel::Main,
            channels_enabled: 0b0000_0001,

            // Thermal
            thermal_ceiling_c: match sensor {
                ThermalSensor::Coarse => 40,
                ThermalSensor::Precise => 45,
            },
            thermal_hysteresis_c: 3,
            thermal_step: 8,
            thermal_recover_step: 2,

            // Battery
            low_voltage_mv: 3000,
            critical_voltage_mv: 2800,
            voltage_cliff_mv: 400,

            // Memory / lockout
            autolock_timeout_secs: 300, // 5 min
            idle_commit_secs: 10,

            // Aux LEDs
            aux_led_while_on: AuxWhileOn::On { high_above_level: 25 },
            rgb_lockout: AuxSetting {
                pattern: AuxPattern::Off,
                color: AuxColor::Voltage,
            }, // 0x09
            rgb_off: AuxSetting {
                pattern: AuxPattern::Blinking,
                color: AuxColor::Voltage,
            }, // 0x39

            // Timing
            tick_interval_ms: 16, // ~62 Hz
            input: InputTiming::default(),
            regulator_interval_ticks: 31, // ~0.5 s
        }
    }

    /// Reject values the UI cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = MAX_LEVEL;
        if self.ramp_floor == 0 || self.ramp_floor >= self.ramp_ceiling || self.ramp_ceiling > max {
            return Err(ConfigError::ValidationFailed("ramp floor/ceiling"));
        }
        if self.simple_floor == 0 || self.simple_floor >= self.simple_ceiling || self.simple_ceiling > max {
            return Err(ConfigError::ValidationFailed("simple floor/ceiling"));
        }
        if self.ramp_step_ticks == 0 {
            return Err(ConfigError::ValidationFailed("ramp_step_ticks must be > 0"));
        }
        if self.channels_enabled & self.default_channel.mask() == 0 {
            return Err(ConfigError::ValidationFailed("default channel not enabled"));
        }
        if !(THERMAL_CEILING_MIN..=THERMAL_CEILING_MAX).contains(&self.thermal_ceiling_c) {
            return Err(ConfigError::ValidationFailed("thermal ceiling out of range"));
        }
        if self.thermal_hysteresis_c <= 0 || self.thermal_hysteresis_c >= self.thermal_ceiling_c {
            return Err(ConfigError::ValidationFailed("thermal hysteresis"));
        }
        if self.thermal_step == 0 || self.thermal_recover_step == 0 {
            return Err(ConfigError::ValidationFailed("thermal steps must be > 0"));
        }
        if self.critical_voltage_mv >= self.low_voltage_mv {
            return Err(ConfigError::ValidationFailed("critical voltage must be below low voltage"));
        }
        if self.voltage_cliff_mv == 0 {
            return Err(ConfigError::ValidationFailed("voltage_cliff_mv must be > 0"));
        }
        if self.autolock_timeout_secs > AUTOLOCK_MAX_SECS {
            return Err(ConfigError::ValidationFailed("autolock timeout too long"));
        }
        if self.idle_commit_secs == 0 {
            return Err(ConfigError::ValidationFailed("idle_commit_secs must be > 0"));
        }
        if self.tick_interval_ms == 0 || self.regulator_interval_ticks == 0 {
            return Err(ConfigError::ValidationFailed("tick intervals must be > 0"));
        }
        let debounce = u16::from(self.input.debounce_ticks);
        if self.input.hold_ticks <= debounce || self.input.release_ticks <= debounce {
            return Err(ConfigError::ValidationFailed("hold/release must exceed debounce"));
        }
        Ok(())
    }

    /// Convert seconds to ticks at the configured tick rate.
    pub fn ticks_from_secs(&self, secs: u16) -> u32 {
        u32::from(secs) * 1000 / u32::from(self.tick_interval_ms.max(1))
    }

    /// Convert milliseconds to ticks, rounding up to at least one tick.
    pub fn ticks_from_ms(&self, ms: u32) -> u32 {
        ms.div_ceil(u32::from(self.tick_interval_ms.max(1))).max(1)
    }

    /// Active ramp limits, honouring the simple UI.
    pub fn ramp_limits(&self) -> (u8, u8) {
        if self.simple_ui {
            (self.simple_floor, self.simple_ceiling)
        } else {
            (self.ramp_floor, self.ramp_ceiling)
        }
    }
}

pub const THERMAL_CEILING_MIN: i16 = 30;
pub const THERMAL_CEILING_MAX: i16 = 70;
pub const AUTOLOCK_MAX_SECS: u16 = 60 * 60;

// ---------------------------------------------------------------------------
// Config menu items
// ---------------------------------------------------------------------------

/// Options editable from the config menu, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigItem {
    ThermalCeiling,
    AutolockMinutes,
    AuxWhileOn,
    SimpleUi,
    LockoutColor,
    OffColor,
}

impl ConfigItem {
    pub const ALL: [Self; 6] = [
        Self::ThermalCeiling,
        Self::AutolockMinutes,
        Self::AuxWhileOn,
        Self::SimpleUi,
        Self::LockoutColor,
        Self::OffColor,
    ];

    /// 1-based menu position, blinked out when the item is selected.
    pub fn number(self) -> u8 {
        Self::ALL.iter().position(|i| *i == self).map_or(0, |p| p as u8 + 1)
    }

    pub fn next(self) -> Option<Self> {
        let idx = self.number() as usize;
        Self::ALL.get(idx).copied()
    }

    /// Nudge this option one step up or down, clamped to its valid range.
    pub fn adjust(self, cfg: &mut UiConfig, up: bool) {
        match self {
            Self::ThermalCeiling => {
                let v = if up { cfg.thermal_ceiling_c + 1 } else { cfg.thermal_ceiling_c - 1 };
                let lo = THERMAL_CEILING_MIN.max(cfg.thermal_hysteresis_c + 1);
                cfg.thermal_ceiling_c = v.clamp(lo, THERMAL_CEILING_MAX);
            }
            Self::AutolockMinutes => {
                let v = if up {
                    cfg.autolock_timeout_secs.saturating_add(60)
                } else {
                    cfg.autolock_timeout_secs.saturating_sub(60)
                };
                cfg.autolock_timeout_secs = v.min(AUTOLOCK_MAX_SECS);
            }
            Self::AuxWhileOn => {
                cfg.aux_led_while_on = match (cfg.aux_led_while_on, up) {
                    (AuxWhileOn::Off, true) => AuxWhileOn::On { high_above_level: 25 },
                    (AuxWhileOn::On { high_above_level }, true) => AuxWhileOn::On {
                        high_above_level: high_above_level.saturating_add(5).min(MAX_LEVEL),
                    },
                    (AuxWhileOn::On { high_above_level }, false) if high_above_level > 5 => {
                        AuxWhileOn::On {
                            high_above_level: high_above_level - 5,
                        }
                    }
                    (_, false) => AuxWhileOn::Off,
                };
            }
            Self::SimpleUi => cfg.simple_ui = up,
            Self::LockoutColor => cfg.rgb_lockout = cfg.rgb_lockout.cycle(up),
            Self::OffColor => cfg.rgb_off = cfg.rgb_off.cycle(up),
        }
    }
}
