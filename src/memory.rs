//! Memory / persistence manager.
//!
//! Owns the durable copy of the light's state and configuration.
//!
//! ## Record layout
//!
//! ```text
//! ┌────────────────────────────────────────┬──────────┐
//! │ postcard(record)                       │ CRC-16   │
//! │ version | seq | mode | level | ch | lk │ (LE)     │
//! └────────────────────────────────────────┴──────────┘
//! ```
//!
//! A record with a bad length, checksum, version or field is treated as
//! absent.  State records rotate over [`STATE_SLOTS`] areas with a wrapping
//! sequence number; boot picks the newest valid slot.  A commit identical to
//! the last durable state performs no write, and a failed write is retried
//! once in the next slot before the error is reported.

use heapless::Vec;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{PersistArea, PersistPort, StorageError};
use crate::config::{Channel, UiConfig};
use crate::error::{DecodeError, Error};
use crate::fsm::ModeId;
use crate::ramp::MAX_LEVEL;

/// Layout version of [`StateRecord`].
pub const STATE_RECORD_VERSION: u8 = 1;
/// Layout version of the stored configuration.
pub const CONFIG_RECORD_VERSION: u8 = 1;
/// Rotating state slots.
pub const STATE_SLOTS: u8 = 4;

const CRC_LEN: usize = 2;
/// Largest encoded state record.
pub const STATE_RECORD_MAX: usize = 32;
/// Largest encoded config record.
pub const CONFIG_RECORD_MAX: usize = 128;

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// The durable part of the light's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedState {
    /// Base mode to return to at boot.
    pub mode: ModeId,
    /// Memorized ramp level.
    pub level: u8,
    pub channel: Channel,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct StateRecord {
    version: u8,
    seq: u16,
    mode: u8,
    level: u8,
    channel: u8,
    locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigRecord {
    version: u8,
    config: UiConfig,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// CRC-16/CCITT (init 0xFFFF), nibble-wise.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in data {
        crc = (crc >> 8 & 0x00FF) | (crc << 8 & 0xFF00);
        crc ^= b as u16;
        crc ^= (crc & 0x00FF) >> 4;
        crc ^= (crc << 8) << 4;
        crc ^= ((crc & 0x00FF) << 4) << 1;
    }
    crc
}

/// Serialize `value` and append its CRC.
fn seal<T: Serialize, const N: usize>(value: &T) -> Result<Vec<u8, N>, StorageError> {
    let mut buf = [0u8; N];
    let used = postcard::to_slice(value, &mut buf[..N - CRC_LEN])
        .map_err(|_| StorageError::Full)?
        .len();
    let crc = crc16(&buf[..used]).to_le_bytes();
    buf[used..used + CRC_LEN].copy_from_slice(&crc);
    Vec::from_slice(&buf[..used + CRC_LEN]).map_err(|()| StorageError::Full)
}

/// Check the CRC and the leading version byte; returns the payload.
fn unseal(bytes: &[u8], version: u8) -> Result<&[u8], DecodeError> {
    if bytes.len() <= CRC_LEN {
        return Err(DecodeError::Truncated);
    }
    let (payload, crc) = bytes.split_at(bytes.len() - CRC_LEN);
    if crc16(payload).to_le_bytes() != crc {
        return Err(DecodeError::Checksum);
    }
    match payload.first() {
        Some(&v) if v == version => Ok(payload),
        Some(&v) => Err(DecodeError::Version(v)),
        None => Err(DecodeError::Truncated),
    }
}

/// Deserialize exactly `payload`; trailing bytes are malformed.
fn decode_exact<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T, DecodeError> {
    match postcard::take_from_bytes::<T>(payload) {
        Ok((value, [])) => Ok(value),
        Ok(_) => Err(DecodeError::Malformed),
        Err(postcard::Error::DeserializeUnexpectedEnd) => Err(DecodeError::Truncated),
        Err(_) => Err(DecodeError::Malformed),
    }
}

/// Encode a state record with sequence number `seq`.
pub fn encode_state(state: &PersistedState, seq: u16) -> Result<Vec<u8, STATE_RECORD_MAX>, StorageError> {
    seal(&StateRecord {
        version: STATE_RECORD_VERSION,
        seq,
        mode: state.mode.to_byte(),
        level: state.level,
        channel: state.channel.to_byte(),
        locked: state.locked,
    })
}

/// Decode and validate a state record; returns the state and its sequence.
pub fn decode_state(bytes: &[u8]) -> Result<(PersistedState, u16), DecodeError> {
    let payload = unseal(bytes, STATE_RECORD_VERSION)?;
    let rec: StateRecord = decode_exact(payload)?;
    let mode = ModeId::from_byte(rec.mode)
        .filter(|m| m.is_persistable())
        .ok_or(DecodeError::Field("mode"))?;
    if rec.level == 0 || rec.level > MAX_LEVEL {
        return Err(DecodeError::Field("level"));
    }
    let channel = Channel::from_byte(rec.channel).ok_or(DecodeError::Field("channel"))?;
    if rec.locked != (mode == ModeId::Locked) {
        return Err(DecodeError::Field("locked"));
    }
    Ok((
        PersistedState {
            mode,
            level: rec.level,
            channel,
            locked: rec.locked,
        },
        rec.seq,
    ))
}

pub fn encode_config(config: &UiConfig) -> Result<Vec<u8, CONFIG_RECORD_MAX>, StorageError> {
    seal(&ConfigRecord {
        version: CONFIG_RECORD_VERSION,
        config: config.clone(),
    })
}

/// Decode a config record.  Range validation is the caller's job.
pub fn decode_config(bytes: &[u8]) -> Result<UiConfig, DecodeError> {
    let payload = unseal(bytes, CONFIG_RECORD_VERSION)?;
    let rec: ConfigRecord = decode_exact(payload)?;
    Ok(rec.config)
}

/// `a` is newer than `b` under wrapping sequence numbers.
fn seq_newer(a: u16, b: u16) -> bool {
    (a.wrapping_sub(b) as i16) > 0
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Result of a commit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Written { slot: u8 },
    /// Identical to the durable copy; nothing written.
    Unchanged,
}

pub struct MemoryManager {
    next_slot: u8,
    seq: u16,
    last_committed: Option<PersistedState>,
    last_config: Option<UiConfig>,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager {
    pub fn new() -> Self {
        Self {
            next_slot: 0,
            seq: 0,
            last_committed: None,
            last_config: None,
        }
    }

    /// Read every state slot and return the newest valid one.
    ///
    /// `Ok(None)` when nothing was ever stored; `Err` when records exist but
    /// none is valid.  Either way the caller boots with defaults.
    pub fn load(&mut self, store: &impl PersistPort) -> Result<Option<PersistedState>, Error> {
        let mut best: Option<(PersistedState, u16, u8)> = None;
        let mut first_err: Option<Error> = None;
        let mut buf = [0u8; STATE_RECORD_MAX];

        for slot in 0..STATE_SLOTS {
            let n = match store.persist_read(PersistArea::State(slot), &mut buf) {
                Ok(Some(n)) => n.min(buf.len()),
                Ok(None) => continue,
                Err(e) => {
                    warn!("state slot {slot}: read failed: {e}");
                    first_err = first_err.or(Some(Error::StorageRead(e)));
                    continue;
                }
            };
            match decode_state(&buf[..n]) {
                Ok((state, seq)) => {
                    debug!("state slot {slot}: seq {seq} {state:?}");
                    if best.is_none_or(|(_, best_seq, _)| seq_newer(seq, best_seq)) {
                        best = Some((state, seq, slot));
                    }
                }
                Err(e) => {
                    warn!("state slot {slot}: ignored ({e})");
                    first_err = first_err.or(Some(e.into()));
                }
            }
        }

        match best {
            Some((state, seq, slot)) => {
                info!("restored state from slot {slot} (seq {seq}): {state:?}");
                self.seq = seq;
                self.next_slot = (slot + 1) % STATE_SLOTS;
                self.last_committed = Some(state);
                Ok(Some(state))
            }
            None => match first_err {
                Some(e) => Err(e),
                None => {
                    info!("no stored state, using defaults");
                    Ok(None)
                }
            },
        }
    }

    /// Persist `state` unless it matches the durable copy.
    pub fn commit(&mut self, store: &mut impl PersistPort, state: PersistedState) -> Result<CommitOutcome, Error> {
        if self.last_committed == Some(state) {
            debug!("commit skipped, state unchanged");
            return Ok(CommitOutcome::Unchanged);
        }
        let seq = self.seq.wrapping_add(1);
        let record = encode_state(&state, seq)?;

        let mut last_err = StorageError::IoError;
        for _attempt in 0..2 {
            let slot = self.next_slot;
            self.next_slot = (slot + 1) % STATE_SLOTS;
            match store.persist_write(PersistArea::State(slot), &record) {
                Ok(()) => {
                    self.seq = seq;
                    self.last_committed = Some(state);
                    info!("committed {state:?} to slot {slot} (seq {seq})");
                    return Ok(CommitOutcome::Written { slot });
                }
                Err(e) => {
                    warn!("state write to slot {slot} failed: {e}");
                    last_err = e;
                }
            }
        }
        Err(Error::StorageWrite(last_err))
    }

    /// The last state known to be durable.
    pub fn last_committed(&self) -> Option<PersistedState> {
        self.last_committed
    }

    /// Read the stored configuration.  `Ok(None)` when none was stored;
    /// `Err` when the stored record is corrupt or fails validation.
    pub fn load_config(&mut self, store: &impl PersistPort) -> Result<Option<UiConfig>, Error> {
        let mut buf = [0u8; CONFIG_RECORD_MAX];
        let Some(n) = store
            .persist_read(PersistArea::Config, &mut buf)
            .map_err(Error::StorageRead)?
        else {
            return Ok(None);
        };
        let config = decode_config(&buf[..n.min(buf.len())])?;
        config.validate()?;
        info!("loaded stored configuration");
        self.last_config = Some(config.clone());
        Ok(Some(config))
    }

    /// Persist `config` unless it matches the stored copy.  Returns `true`
    /// when a write happened.
    pub fn save_config(&mut self, store: &mut impl PersistPort, config: &UiConfig) -> Result<bool, Error> {
        config.validate()?;
        if self.last_config.as_ref() == Some(config) {
            debug!("config unchanged, not saved");
            return Ok(false);
        }
        let record = encode_config(config)?;
        store.persist_write(PersistArea::Config, &record)?;
        self.last_config = Some(config.clone());
        info!("configuration saved ({} bytes)", record.len());
        Ok(true)
    }
}
