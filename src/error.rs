//! Unified error types for the flashlight firmware core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! dispatch loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the regulator, the FSM and the event sink without
//! allocation.
//!
//! Nothing here is fatal: every variant maps to a "keep lighting" recovery.
//!
//! | Variant                 | Recovery                                   |
//! |-------------------------|--------------------------------------------|
//! | `HardwareRead`          | retried on the next regulator check        |
//! | `StorageRead`           | area treated as empty, defaults used       |
//! | `StorageWrite`          | retried on the next commit trigger         |
//! | `InvalidPersistedState` | record ignored, default mode used          |
//! | `UnrecognizedEvent`     | dropped                                    |
//! | `Config`                | rejected, previous/default config kept     |

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A HAL sensor read failed.
    HardwareRead(HalReadError),
    /// Reading durable storage failed at boot.
    StorageRead(StorageError),
    /// A durable write failed; the state stays uncommitted.
    StorageWrite(StorageError),
    /// A stored record failed validation and was treated as absent.
    InvalidPersistedState(DecodeError),
    /// The active mode had no handler for an event.
    UnrecognizedEvent,
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareRead(e) => write!(f, "hardware read: {e}"),
            Self::StorageRead(e) => write!(f, "storage read: {e}"),
            Self::StorageWrite(e) => write!(f, "storage write: {e}"),
            Self::InvalidPersistedState(e) => write!(f, "persisted state: {e}"),
            Self::UnrecognizedEvent => write!(f, "unrecognized event"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// HAL read errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalReadError {
    /// ADC conversion did not complete in time.
    AdcTimeout,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// The board has no such sensor.
    Unavailable,
}

impl fmt::Display for HalReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcTimeout => write!(f, "ADC timeout"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Unavailable => write!(f, "sensor unavailable"),
        }
    }
}

impl From<HalReadError> for Error {
    fn from(e: HalReadError) -> Self {
        Self::HardwareRead(e)
    }
}

/// Write path only; read failures are mapped to [`Error::StorageRead`] where
/// they happen.
impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::StorageWrite(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Persisted record decode errors
// ---------------------------------------------------------------------------

/// Why a stored record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the smallest valid record.
    Truncated,
    /// CRC-16 mismatch.
    Checksum,
    /// Written by an incompatible layout version.
    Version(u8),
    /// The payload did not deserialize.
    Malformed,
    /// A field is outside its valid range.
    Field(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "record truncated"),
            Self::Checksum => write!(f, "checksum mismatch"),
            Self::Version(v) => write!(f, "unsupported record version {v}"),
            Self::Malformed => write!(f, "malformed payload"),
            Self::Field(name) => write!(f, "field out of range: {name}"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::InvalidPersistedState(e)
    }
}
