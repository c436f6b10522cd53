//! Aux LED pattern engine.
//!
//! Generates time-varying RGB values for the aux LEDs under the optic and a
//! brightness for the lighted e-switch.  The app calls `tick()` once per
//! main-loop tick with the current request and battery voltage.
//!
//! ## Requests
//!
//! | Request    | Source                                   |
//! |------------|------------------------------------------|
//! | `Dark`     | everything off (strobe, config menu)     |
//! | `Resting`  | `rgb_off` / `rgb_lockout` setting        |
//! | `WhileOn`  | battery colour while the main LEDs run   |
//! | `Channel`  | an aux channel is the selected output    |
//!
//! ## Patterns
//!
//! | Pattern  | Description                          |
//! |----------|--------------------------------------|
//! | Low      | Constant colour, dim                 |
//! | High     | Constant colour, full                |
//! | Blinking | 100 ms flash every 2 s, full         |
//!
//! Colours `Disco`, `Rainbow` and `Voltage` animate or track the battery
//! on top of the pattern.

use crate::config::{AuxColor, AuxPattern, AuxSetting};

/// Colour as (R, G, B) tuple, each 0–255.
pub type Rgb = (u8, u8, u8);

pub const BLACK: Rgb = (0, 0, 0);

/// Brightness used by the `Low` pattern.
const LOW_BRIGHTNESS: u8 = 32;
const BLINK_PERIOD_MS: u32 = 2000;
const BLINK_ON_MS: u32 = 100;
const DISCO_STEP_MS: u32 = 200;
const RAINBOW_STEP_MS: u32 = 400;

/// Battery voltage (mV) at which the voltage colour steps to the next hue.
const VOLTAGE_STEPS_MV: [u16; 5] = [3300, 3500, 3700, 3900, 4100];

/// What the aux LEDs should show this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxRequest {
    Dark,
    Resting(AuxSetting),
    /// Voltage colour while lit; `bright` above the configured level.
    WhileOn { bright: bool },
    /// An aux channel is the selected output.
    Channel { color: AuxColor, intensity: u8 },
}

/// Aux LED pattern engine. Stack-allocated, no heap.
pub struct AuxLedEngine {
    phase_ms: u32,
    active: AuxRequest,
    seed: u32,
}

impl Default for AuxLedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AuxLedEngine {
    pub fn new() -> Self {
        Self {
            phase_ms: 0,
            active: AuxRequest::Dark,
            seed: 0x2545_F491,
        }
    }

    /// Advance the pattern phase and return the current RGB output.
    /// `delta_ms` is the time since the last call.
    pub fn tick(&mut self, delta_ms: u32, request: AuxRequest, voltage_mv: u16) -> Rgb {
        if request != self.active {
            self.phase_ms = 0;
            self.active = request;
        } else {
            self.phase_ms = self.phase_ms.wrapping_add(delta_ms);
        }

        match request {
            AuxRequest::Dark => BLACK,
            AuxRequest::Resting(setting) => self.generate(setting, voltage_mv),
            AuxRequest::WhileOn { bright } => {
                let pattern = if bright { AuxPattern::High } else { AuxPattern::Low };
                self.generate(
                    AuxSetting {
                        pattern,
                        color: AuxColor::Voltage,
                    },
                    voltage_mv,
                )
            }
            AuxRequest::Channel { color, intensity } => {
                let (r, g, b) = self.colour(color, voltage_mv);
                scale((r, g, b), intensity)
            }
        }
    }

    /// Button LED brightness for the current request.
    pub fn button_intensity(&self, request: AuxRequest) -> u8 {
        match request {
            AuxRequest::Dark => 0,
            AuxRequest::Resting(s) => match s.pattern {
                AuxPattern::Off => 0,
                AuxPattern::Low => LOW_BRIGHTNESS,
                AuxPattern::High => u8::MAX,
                AuxPattern::Blinking => {
                    if self.blink_on() {
                        u8::MAX
                    } else {
                        0
                    }
                }
            },
            AuxRequest::WhileOn { bright } => {
                if bright {
                    u8::MAX
                } else {
                    LOW_BRIGHTNESS
                }
            }
            AuxRequest::Channel { .. } => LOW_BRIGHTNESS,
        }
    }

    fn blink_on(&self) -> bool {
        self.phase_ms % BLINK_PERIOD_MS < BLINK_ON_MS
    }

    fn generate(&mut self, setting: AuxSetting, voltage_mv: u16) -> Rgb {
        let brightness = match setting.pattern {
            AuxPattern::Off => return BLACK,
            AuxPattern::Low => LOW_BRIGHTNESS,
            AuxPattern::High => u8::MAX,
            AuxPattern::Blinking => {
                if !self.blink_on() {
                    return BLACK;
                }
                u8::MAX
            }
        };
        let colour = self.colour(setting.color, voltage_mv);
        scale(colour, brightness)
    }

    fn colour(&mut self, color: AuxColor, voltage_mv: u16) -> Rgb {
        match color {
            AuxColor::Red => (255, 0, 0),
            AuxColor::Yellow => (255, 255, 0),
            AuxColor::Green => (0, 255, 0),
            AuxColor::Cyan => (0, 255, 255),
            AuxColor::Blue => (0, 0, 255),
            AuxColor::Purple => (255, 0, 255),
            AuxColor::White => (255, 255, 255),
            AuxColor::Disco => {
                let step = self.phase_ms / DISCO_STEP_MS;
                hue(self.random(step) % 6)
            }
            AuxColor::Rainbow => hue(self.phase_ms / RAINBOW_STEP_MS % 6),
            AuxColor::Voltage => voltage_colour(voltage_mv),
        }
    }

    /// xorshift32, re-seeded per step so a colour holds for the whole step.
    fn random(&mut self, step: u32) -> u32 {
        let mut x = self.seed ^ step.wrapping_mul(0x9E37_79B9);
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        x
    }
}

/// One of six primary/secondary hues, red first.
fn hue(idx: u32) -> Rgb {
    match idx {
        0 => (255, 0, 0),
        1 => (255, 255, 0),
        2 => (0, 255, 0),
        3 => (0, 255, 255),
        4 => (0, 0, 255),
        _ => (255, 0, 255),
    }
}

/// Battery colour: red when nearly empty through purple when full.
pub fn voltage_colour(voltage_mv: u16) -> Rgb {
    let idx = VOLTAGE_STEPS_MV.iter().filter(|&&v| voltage_mv >= v).count();
    hue(idx as u32)
}

fn scale(colour: Rgb, brightness: u8) -> Rgb {
    let br = brightness as u16;
    let (r, g, b) = colour;
    (
        ((r as u16 * br) / 255) as u8,
        ((g as u16 * br) / 255) as u8,
        ((b as u16 * br) / 255) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(b: u8) -> AuxSetting {
        AuxSetting::from_byte(b).unwrap()
    }

    #[test]
    fn dark_request_is_black() {
        let mut engine = AuxLedEngine::new();
        assert_eq!(engine.tick(16, AuxRequest::Dark, 4000), BLACK);
        assert_eq!(engine.button_intensity(AuxRequest::Dark), 0);
    }

    #[test]
    fn off_pattern_is_black() {
        let mut engine = AuxLedEngine::new();
        assert_eq!(engine.tick(16, AuxRequest::Resting(setting(0x09)), 4000), BLACK);
    }

    #[test]
    fn high_pattern_returns_exact_colour() {
        let mut engine = AuxLedEngine::new();
        assert_eq!(engine.tick(16, AuxRequest::Resting(setting(0x24)), 4000), (0, 0, 255));
    }

    #[test]
    fn low_pattern_is_dim() {
        let mut engine = AuxLedEngine::new();
        assert_eq!(engine.tick(16, AuxRequest::Resting(setting(0x10)), 4000), (32, 0, 0));
    }

    #[test]
    fn blinking_flashes_then_rests() {
        let mut engine = AuxLedEngine::new();
        let req = AuxRequest::Resting(setting(0x36));
        assert_eq!(engine.tick(16, req, 4000), (255, 255, 255)); // phase reset
        assert_eq!(engine.tick(200, req, 4000), BLACK);
        assert_eq!(engine.button_intensity(req), 0);
        assert_eq!(engine.tick(1800, req, 4000), (255, 255, 255)); // 2000 ms → next flash
    }

    #[test]
    fn voltage_colour_tracks_battery() {
        assert_eq!(voltage_colour(2900), (255, 0, 0));
        assert_eq!(voltage_colour(3600), (0, 255, 0));
        assert_eq!(voltage_colour(4200), (255, 0, 255));
    }

    #[test]
    fn while_on_brightness_follows_level() {
        let mut engine = AuxLedEngine::new();
        let bright = engine.tick(16, AuxRequest::WhileOn { bright: true }, 3600);
        let dim = engine.tick(16, AuxRequest::WhileOn { bright: false }, 3600);
        assert_eq!(bright, (0, 255, 0));
        assert_eq!(dim, (0, 32, 0));
    }

    #[test]
    fn rainbow_rotates() {
        let mut engine = AuxLedEngine::new();
        let req = AuxRequest::Resting(setting(0x28));
        let first = engine.tick(0, req, 4000);
        let second = engine.tick(RAINBOW_STEP_MS, req, 4000);
        assert_ne!(first, second);
    }

    #[test]
    fn channel_scales_colour() {
        let mut engine = AuxLedEngine::new();
        let req = AuxRequest::Channel {
            color: AuxColor::Green,
            intensity: 255,
        };
        assert_eq!(engine.tick(16, req, 4000), (0, 255, 0));
    }
}
