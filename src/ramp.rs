//! Level/ramp table engine.
//!
//! Maps a perceptual brightness index (`0..=MAX_LEVEL`) to physical drive
//! intensities on one or more power paths.  Each path has a fixed gain
//! relative to the lowest one, so the light produced by a frame is
//! `Σ intensity × gain` (the *aggregate*).
//!
//! ```text
//!   aggregate
//!      ▲                                    ┌──── path 2 solo
//!      │                        blend 1+2 ──┤
//!      │              ┌── path 1 solo       │
//!      │   blend 0+1 ─┤                     │
//!      │ path 0 solo  │                     │
//!      └──────────────┴─────────────────────┴──────▶ index
//! ```
//!
//! Index → target aggregate follows a cubic curve.  Inside a blend zone the
//! upper path carries whole units of its gain and the lower path carries the
//! remainder, so a path engages without a visible step; above `solo_at` the
//! upper path runs alone.  Either way the frame's aggregate is the smallest
//! multiple of the active resolution that is ≥ the target, and the active
//! resolution only ever grows with the index, which makes the output
//! monotone by construction.

use core::fmt;

use heapless::Vec;

/// Highest brightness index.
pub const MAX_LEVEL: u8 = 150;

/// Maximum number of power paths on any board.
pub const MAX_PATHS: usize = 4;

/// Power path index; 0 is the lowest-gain path.
pub type PathId = u8;

/// One frame of output, ordered by path id.  Empty = off.
pub type OutputFrame = Vec<(PathId, u16), MAX_PATHS>;

/// Calibration data for one power path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerPath {
    /// Light per intensity unit, relative to path 0.
    pub gain: u32,
    /// Full-scale drive value (DAC/PWM top).
    pub max_intensity: u16,
    /// Aggregate at which this path starts blending in.
    pub engage_at: u32,
    /// Aggregate from which this path runs alone.
    pub solo_at: u32,
}

impl PowerPath {
    /// Aggregate produced at full intensity.
    pub fn capacity(&self) -> u32 {
        self.gain.saturating_mul(u32::from(self.max_intensity))
    }

    fn checked_capacity(&self) -> Option<u32> {
        self.gain.checked_mul(u32::from(self.max_intensity))
    }
}

/// Invalid calibration data; reported once, at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampError {
    /// Zero or more than [`MAX_PATHS`] paths.
    PathCount(usize),
    /// Path `n` has a zero gain or range, or its gain is not a multiple of
    /// the path below it, or the lower path cannot carry the remainder.
    Gain(usize),
    /// Path `n` engages out of order or beyond the lower path's capacity.
    Engage(usize),
    /// Path `n` goes solo outside its own range.
    Solo(usize),
}

impl fmt::Display for RampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathCount(n) => write!(f, "unsupported path count {n}"),
            Self::Gain(i) => write!(f, "path {i}: invalid gain"),
            Self::Engage(i) => write!(f, "path {i}: invalid engage point"),
            Self::Solo(i) => write!(f, "path {i}: invalid solo point"),
        }
    }
}

impl std::error::Error for RampError {}

/// Validated multi-path ramp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampTable {
    paths: Vec<PowerPath, MAX_PATHS>,
}

impl RampTable {
    pub fn new(paths: &[PowerPath]) -> Result<Self, RampError> {
        if paths.is_empty() || paths.len() > MAX_PATHS {
            return Err(RampError::PathCount(paths.len()));
        }
        for (i, p) in paths.iter().enumerate() {
            if p.gain == 0 || p.max_intensity == 0 || p.checked_capacity().is_none() {
                return Err(RampError::Gain(i));
            }
            if i == 0 {
                if p.engage_at != 0 || p.solo_at != 0 {
                    return Err(RampError::Engage(0));
                }
                continue;
            }
            let lower = &paths[i - 1];
            if p.gain <= lower.gain
                || p.gain % lower.gain != 0
                || p.gain / lower.gain > u32::from(lower.max_intensity)
            {
                return Err(RampError::Gain(i));
            }
            if p.engage_at <= lower.engage_at || p.engage_at > lower.capacity() {
                return Err(RampError::Engage(i));
            }
            if p.solo_at < p.engage_at || p.solo_at > p.capacity() {
                return Err(RampError::Solo(i));
            }
        }
        let mut table = Vec::new();
        // Length checked above.
        let _ = table.extend_from_slice(paths);
        Ok(Self { paths: table })
    }

    /// Three-path UDR calibration for the Lume X1 40 W boost driver
    /// (8-bit DAC per path, ×128 gain between paths).
    pub fn lume_x1() -> Self {
        const PATHS: [PowerPath; 3] = [
            PowerPath {
                gain: 1,
                max_intensity: 255,
                engage_at: 0,
                solo_at: 0,
            },
            PowerPath {
                gain: 128,
                max_intensity: 255,
                engage_at: 192,
                solo_at: 4096,
            },
            PowerPath {
                gain: 16384,
                max_intensity: 255,
                engage_at: 24576,
                solo_at: 524_288,
            },
        ];
        let mut paths = Vec::new();
        let _ = paths.extend_from_slice(&PATHS);
        Self { paths }
    }

    /// A board with one linear output of `max_intensity` steps.
    pub fn single_path(max_intensity: u16) -> Result<Self, RampError> {
        Self::new(&[PowerPath {
            gain: 1,
            max_intensity,
            engage_at: 0,
            solo_at: 0,
        }])
    }

    pub fn paths(&self) -> &[PowerPath] {
        &self.paths
    }

    /// Paths actually usable with `path_count` populated outputs.
    fn usable(&self, path_count: usize) -> usize {
        path_count.clamp(1, self.paths.len())
    }

    /// Full-scale aggregate with `path_count` paths.
    pub fn capacity(&self, path_count: usize) -> u32 {
        self.paths[self.usable(path_count) - 1].capacity()
    }

    /// Cubic perceptual curve: index → target aggregate.
    pub fn target_brightness(&self, index: u8, path_count: usize) -> u32 {
        let index = index.min(MAX_LEVEL);
        if index == 0 {
            return 0;
        }
        let cap = u64::from(self.capacity(path_count));
        let max = u64::from(MAX_LEVEL);
        let i = u64::from(index);
        let t = cap * i * i * i / (max * max * max);
        (t as u32).max(1)
    }

    /// Physical drive for `index`.  Out-of-range indices clamp silently.
    pub fn physical_output(&self, index: u8, path_count: usize) -> OutputFrame {
        let mut frame = OutputFrame::new();
        let target = self.target_brightness(index, path_count);
        if target == 0 {
            return frame;
        }
        let usable = &self.paths[..self.usable(path_count)];
        let top = usable.iter().rposition(|p| p.engage_at <= target).unwrap_or(0);
        let upper = &usable[top];

        if top == 0 || target >= upper.solo_at {
            let units = target.div_ceil(upper.gain);
            let _ = frame.push((top as PathId, units as u16));
        } else {
            let lower = &usable[top - 1];
            let units = target / upper.gain;
            let rest = target - units * upper.gain;
            let lower_units = rest.div_ceil(lower.gain);
            if lower_units > 0 {
                let _ = frame.push(((top - 1) as PathId, lower_units as u16));
            }
            if units > 0 {
                let _ = frame.push((top as PathId, units as u16));
            }
        }
        frame
    }

    /// Light produced by a frame, in path-0 units.
    pub fn aggregate(&self, frame: &OutputFrame) -> u64 {
        frame
            .iter()
            .filter_map(|&(id, units)| {
                self.paths
                    .get(id as usize)
                    .map(|p| u64::from(p.gain) * u64::from(units))
            })
            .sum()
    }
}

/// Ramp level → 0..=255 drive for single-colour aux channels.
/// Any non-zero level gives at least 1.
pub fn aux_intensity(level: u8) -> u8 {
    let level = level.min(MAX_LEVEL);
    if level == 0 {
        return 0;
    }
    ((u16::from(level) * 255 / u16::from(MAX_LEVEL)) as u8).max(1)
}
