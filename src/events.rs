//! Interrupt-driven input and the canonical UI event stream.
//!
//! Raw switch edges are captured in interrupt context and pushed into a
//! small lock-free queue; the main loop drains it between dispatch cycles,
//! feeds the edges through the [`ClickSequencer`](crate::drivers::button::ClickSequencer)
//! and dispatches the resulting [`Event`]s.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────┐     ┌─────┐
//! │ Switch ISR  │────▶│  Edge Queue  │────▶│ Sequencer  │────▶│ FSM │
//! │ (producer)  │     │  (SPSC, 16)  │     │ (debounce) │     │     │
//! └─────────────┘     └──────────────┘     └────────────┘     └─────┘
//!                                                  ▲
//!                           Regulator ─────────────┘ (sensor events)
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::spsc::{Consumer, Producer, Queue};

/// Slots in the edge ring buffer.  One slot is kept free, so at most
/// `EDGE_QUEUE_CAP - 1` edges can be pending.
pub const EDGE_QUEUE_CAP: usize = 16;

/// One UI event, stamped with the tick it was produced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub tick: u32,
}

impl Event {
    pub fn new(kind: EventKind, tick: u32) -> Self {
        Self { kind, tick }
    }
}

/// Event types.  Button events carry the number of presses in the
/// current sequence (1 for the first press).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // ── Button ────────────────────────────────────────────
    /// Debounced press, `count`-th in the sequence.
    ButtonDown { count: u8 },
    /// Debounced release of a press that did not become a hold.
    ButtonUp { count: u8 },
    /// Emitted once per tick while held; the first carries `ticks == 0`.
    HoldTick { count: u8, ticks: u16 },
    /// A hold ended after `ticks` ticks.
    HoldRelease { count: u8, ticks: u16 },
    /// `count` short presses, the sequence ended without a hold.
    Click { count: u8 },
    /// A sequence that ended in a hold has gone quiet.
    Timeout,

    // ── Housekeeping ──────────────────────────────────────
    /// Dispatched once per main-loop tick.
    Tick,

    // ── Regulator ─────────────────────────────────────────
    VoltageLow,
    VoltageCritical,
    /// Voltage fell off a cliff; power is about to disappear.
    PowerLoss,
    ThermalHigh,
    ThermalRecover,
}

impl EventKind {
    /// `true` for events produced by the button.
    pub fn is_input(self) -> bool {
        matches!(
            self,
            Self::ButtonDown { .. }
                | Self::ButtonUp { .. }
                | Self::HoldTick { .. }
                | Self::HoldRelease { .. }
                | Self::Click { .. }
        )
    }
}

/// A raw switch transition as seen by the pin-change interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEdge {
    /// Level after the transition (`true` = pressed).
    pub pressed: bool,
    pub tick: u32,
}

// ── Lock-free SPSC edge queue ─────────────────────────────────
//
// The ISR writes (produces), the main loop reads (consumes).  The board
// owns the queue and splits it once at init; the producer half moves into
// the interrupt handler.

pub struct EdgeQueue {
    queue: Queue<RawEdge, EDGE_QUEUE_CAP>,
    dropped: AtomicU32,
}

impl EdgeQueue {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Split into the interrupt-side and main-loop-side halves.
    pub fn split(&mut self) -> (EdgeProducer<'_>, EdgeConsumer<'_>) {
        let Self { queue, dropped } = self;
        let dropped: &AtomicU32 = dropped;
        let (producer, consumer) = queue.split();
        (
            EdgeProducer {
                inner: producer,
                dropped,
            },
            EdgeConsumer {
                inner: consumer,
                dropped,
            },
        )
    }
}

impl Default for EdgeQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EdgeProducer<'a> {
    inner: Producer<'a, RawEdge, EDGE_QUEUE_CAP>,
    dropped: &'a AtomicU32,
}

impl EdgeProducer<'_> {
    /// Push an edge.  Safe to call from ISR context (never blocks).
    /// Returns `false` if the queue is full (edge dropped and counted).
    pub fn push(&mut self, edge: RawEdge) -> bool {
        if self.inner.enqueue(edge).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

pub struct EdgeConsumer<'a> {
    inner: Consumer<'a, RawEdge, EDGE_QUEUE_CAP>,
    dropped: &'a AtomicU32,
}

impl EdgeConsumer<'_> {
    /// Drain all pending edges in FIFO order.
    pub fn drain(&mut self) -> impl Iterator<Item = RawEdge> + '_ {
        core::iter::from_fn(move || self.inner.dequeue())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Edges lost to overflow since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}
