//! Port traits: the hexagonal boundary between the UI core and the board.
//!
//! ```text
//!   Board adapter ──▶ Port trait ──▶ App (domain)
//! ```
//!
//! Each board variant implements these traits once (see
//! [`adapters`](crate::adapters)); the [`App`](super::service::App)
//! consumes them via generics, so the core never touches registers.
//! Every call is non-blocking or bounded-duration.

use crate::drivers::aux_led::Rgb;
use crate::error::HalReadError;
use crate::ramp::PathId;

// ───────────────────────────────────────────────────────────────
// Output port (domain → main emitter power paths)
// ───────────────────────────────────────────────────────────────

/// Drives the main emitters, one intensity per power path.
pub trait OutputPort {
    /// Set the drive intensity of one power path (0 = path off).
    fn set_output(&mut self, path: PathId, intensity: u16);

    /// Number of power paths populated on this board.
    fn path_count(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Switch port (board → domain)
// ───────────────────────────────────────────────────────────────

/// Current e-switch level.  Edges normally arrive through the
/// [`EdgeQueue`](crate::events::EdgeQueue); this is for boot seeding and
/// boards without a pin-change interrupt.
pub trait SwitchPort {
    /// `true` while the button is physically pressed.
    fn read_switch(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (board → domain)
// ───────────────────────────────────────────────────────────────

pub trait SensorPort {
    /// Battery voltage in millivolts.
    fn read_voltage_mv(&mut self) -> Result<u16, HalReadError>;

    /// Driver temperature in whole degrees Celsius.
    fn read_temperature_c(&mut self) -> Result<i16, HalReadError>;
}

// ───────────────────────────────────────────────────────────────
// Aux LED port (domain → indicator LEDs)
// ───────────────────────────────────────────────────────────────

/// Indicator LEDs that are not part of the main emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxLed {
    /// The lighted e-switch.
    Button,
    /// RGB aux LEDs under the optic.
    Rgb,
}

/// What to show on an aux LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxDrive {
    /// Single-colour brightness (button LED).
    Intensity(u8),
    /// Per-channel brightness (RGB aux).
    Color(Rgb),
}

pub trait AuxLedPort {
    fn set_aux_led(&mut self, led: AuxLed, drive: AuxDrive);
}

// ───────────────────────────────────────────────────────────────
// Persistence port (domain ↔ EEPROM / flash)
// ───────────────────────────────────────────────────────────────

/// Independent durable areas.  State slots rotate for wear levelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistArea {
    /// User configuration (written rarely).
    Config,
    /// One of the rotating state slots.
    State(u8),
}

/// Durable byte storage.
///
/// Writes MUST replace the whole area atomically from the caller's point of
/// view; a torn write must fail the record checksum on the next read.
pub trait PersistPort {
    /// Write `data` to `area`.
    fn persist_write(&mut self, area: PersistArea, data: &[u8]) -> Result<(), StorageError>;

    /// Read `area` into `buf`.  `Ok(None)` when the area was never written.
    fn persist_read(&self, area: PersistArea, buf: &mut [u8]) -> Result<Option<usize>, StorageError>;
}

// ───────────────────────────────────────────────────────────────
// The whole board
// ───────────────────────────────────────────────────────────────

/// Everything the core needs from a board.  Implemented automatically for
/// any type providing all capability traits.
pub trait Hal: OutputPort + SwitchPort + SensorPort + AuxLedPort + PersistPort {}

impl<T> Hal for T where T: OutputPort + SwitchPort + SensorPort + AuxLedPort + PersistPort {}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from configuration validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

/// Errors from [`PersistPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The area cannot hold the record.
    Full,
    /// Generic I/O error (write verify failed, bus error).
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
