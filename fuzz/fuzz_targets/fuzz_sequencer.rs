//! Fuzz target: `ClickSequencer`
//!
//! Interprets the input as a stream of (gap, level) switch edges and runs
//! the sequencer over it, asserting that press counts stay consistent and
//! that every click count matches the presses that made it.
//!
//! cargo fuzz run fuzz_sequencer

#![no_main]

use libfuzzer_sys::fuzz_target;
use lumefw::config::InputTiming;
use lumefw::drivers::button::{ClickSequencer, SeqEvents};
use lumefw::events::{EventKind, RawEdge};

fuzz_target!(|data: &[u8]| {
    let mut seq = ClickSequencer::new(InputTiming::default());
    let mut out = SeqEvents::new();
    let mut now = 0u32;
    let mut last_down = 0u8;

    for &byte in data {
        let gap = u32::from(byte & 0x3F);
        let pressed = byte & 0x80 != 0;
        for _ in 0..gap {
            now += 1;
            seq.poll(now, &mut out);
            check(&out, &mut last_down);
            out.clear();
        }
        seq.on_edge(RawEdge { pressed, tick: now }, &mut out);
        check(&out, &mut last_down);
        out.clear();
    }
});

fn check(events: &SeqEvents, last_down: &mut u8) {
    for ev in events {
        match ev.kind {
            EventKind::ButtonDown { count } => {
                assert!(count == 1 || count == last_down.saturating_add(1));
                *last_down = count;
            }
            EventKind::Click { count } | EventKind::HoldTick { count, .. } => {
                assert_eq!(count, *last_down, "count disagrees with presses");
            }
            _ => {}
        }
    }
}
