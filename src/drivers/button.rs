//! E-switch debounce and click/hold sequencer.
//!
//! ## Hardware
//!
//! Momentary e-switch on a pin-change interrupt.  The ISR pushes every raw
//! transition into the [`EdgeQueue`](crate::events::EdgeQueue); the main
//! loop feeds them to [`ClickSequencer::on_edge`] and calls
//! [`ClickSequencer::poll`] once per tick.  All timing is in ticks.
//!
//! ## Event stream
//!
//! | Input                                  | Events                              |
//! |----------------------------------------|-------------------------------------|
//! | press                                  | `ButtonDown{n}`                     |
//! | release before `hold_ticks`            | `ButtonUp{n}`                       |
//! | still pressed at `hold_ticks`          | `HoldTick{n, 0}`, then one per tick |
//! | release of a hold                      | `HoldRelease{n, ticks}`             |
//! | `release_ticks` quiet after `ButtonUp` | `Click{n}`                          |
//! | `release_ticks` quiet after a hold     | `Timeout`                           |
//!
//! `n` counts presses in the current sequence, so three quick taps produce a
//! single `Click{3}` and click-click-hold produces `HoldTick{3, ..}`.

use heapless::Vec;

use crate::config::InputTiming;
use crate::events::{Event, EventKind, RawEdge};

/// Events produced by one sequencer call.  Dispatch them before the next
/// call.
pub type SeqEvents = Vec<Event, 4>;

/// Gesture state between accepted (debounced) transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pressed {
        count: u8,
        since: u32,
        /// Tick the hold was recognised, once it was.
        hold_start: Option<u32>,
        last_hold_tick: u32,
    },
    Released { count: u8, since: u32 },
    AfterHold { since: u32 },
    /// Button was already down at boot; swallow until released.
    Ignoring,
}

pub struct ClickSequencer {
    timing: InputTiming,
    /// Last accepted level.
    stable: bool,
    /// Level change waiting out the debounce window.
    candidate: Option<(bool, u32)>,
    phase: Phase,
}

impl ClickSequencer {
    pub fn new(timing: InputTiming) -> Self {
        Self {
            timing,
            stable: false,
            candidate: None,
            phase: Phase::Idle,
        }
    }

    /// Take the switch level at boot so a button held through power-on
    /// does not count as a press.
    pub fn seed(&mut self, pressed: bool) {
        self.stable = pressed;
        self.candidate = None;
        self.phase = if pressed { Phase::Ignoring } else { Phase::Idle };
    }

    pub fn set_timing(&mut self, timing: InputTiming) {
        self.timing = timing;
    }

    /// `true` while no sequence is in progress.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle && self.candidate.is_none()
    }

    /// Feed one raw edge.
    pub fn on_edge(&mut self, edge: RawEdge, out: &mut SeqEvents) {
        let debounce = u32::from(self.timing.debounce_ticks);
        if let Some((level, since)) = self.candidate {
            if edge.tick.wrapping_sub(since) >= debounce {
                self.candidate = None;
                self.accept(level, since, out);
            }
        }

        if edge.pressed == self.stable {
            // Bounced back before the window elapsed.
            self.candidate = None;
        } else if debounce == 0 {
            self.accept(edge.pressed, edge.tick, out);
        } else {
            self.candidate = Some((edge.pressed, edge.tick));
        }
    }

    /// Advance timers.  Call once per tick.
    pub fn poll(&mut self, now: u32, out: &mut SeqEvents) {
        if let Some((level, since)) = self.candidate {
            if now.wrapping_sub(since) >= u32::from(self.timing.debounce_ticks) {
                self.candidate = None;
                self.accept(level, since, out);
            }
        }

        match self.phase {
            Phase::Pressed {
                count,
                since,
                hold_start,
                last_hold_tick,
            } => match hold_start {
                None if now.wrapping_sub(since) >= u32::from(self.timing.hold_ticks) => {
                    self.phase = Phase::Pressed {
                        count,
                        since,
                        hold_start: Some(now),
                        last_hold_tick: now,
                    };
                    emit(out, EventKind::HoldTick { count, ticks: 0 }, now);
                }
                Some(start) if now != last_hold_tick => {
                    self.phase = Phase::Pressed {
                        count,
                        since,
                        hold_start,
                        last_hold_tick: now,
                    };
                    let ticks = clamp_ticks(now.wrapping_sub(start));
                    emit(out, EventKind::HoldTick { count, ticks }, now);
                }
                _ => {}
            },
            Phase::Released { count, since }
                if self.candidate.is_none()
                    && now.wrapping_sub(since) >= u32::from(self.timing.release_ticks) =>
            {
                self.phase = Phase::Idle;
                emit(out, EventKind::Click { count }, now);
            }
            Phase::AfterHold { since }
                if self.candidate.is_none()
                    && now.wrapping_sub(since) >= u32::from(self.timing.release_ticks) =>
            {
                self.phase = Phase::Idle;
                emit(out, EventKind::Timeout, now);
            }
            _ => {}
        }
    }

    fn accept(&mut self, pressed: bool, tick: u32, out: &mut SeqEvents) {
        self.stable = pressed;
        if pressed {
            let count = match self.phase {
                Phase::Released { count, .. } => count.saturating_add(1),
                Phase::Ignoring => return,
                _ => 1,
            };
            self.phase = Phase::Pressed {
                count,
                since: tick,
                hold_start: None,
                last_hold_tick: tick,
            };
            emit(out, EventKind::ButtonDown { count }, tick);
            return;
        }

        match self.phase {
            Phase::Pressed {
                count,
                hold_start: Some(start),
                ..
            } => {
                let ticks = clamp_ticks(tick.wrapping_sub(start));
                self.phase = Phase::AfterHold { since: tick };
                emit(out, EventKind::HoldRelease { count, ticks }, tick);
            }
            Phase::Pressed { count, since, .. } => {
                let held = tick.wrapping_sub(since);
                let hold = u32::from(self.timing.hold_ticks);
                if held >= hold {
                    // The hold was never polled; report it at release.
                    emit(out, EventKind::HoldTick { count, ticks: 0 }, since.wrapping_add(hold));
                    self.phase = Phase::AfterHold { since: tick };
                    emit(
                        out,
                        EventKind::HoldRelease {
                            count,
                            ticks: clamp_ticks(held - hold),
                        },
                        tick,
                    );
                } else {
                    self.phase = Phase::Released { count, since: tick };
                    emit(out, EventKind::ButtonUp { count }, tick);
                }
            }
            Phase::Ignoring => self.phase = Phase::Idle,
            _ => {}
        }
    }
}

fn emit(out: &mut SeqEvents, kind: EventKind, tick: u32) {
    if out.push(Event::new(kind, tick)).is_err() {
        log::warn!("sequencer output full, dropped {kind:?}");
    }
}

fn clamp_ticks(t: u32) -> u16 {
    t.min(u32::from(u16::MAX)) as u16
}
