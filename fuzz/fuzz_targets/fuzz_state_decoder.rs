//! Fuzz target: persisted record decoding
//!
//! Feeds arbitrary bytes to the state and config decoders, and loads them
//! from every state slot, asserting that nothing panics and that any
//! accepted state is within range.
//!
//! cargo fuzz run fuzz_state_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use lumefw::adapters::sim::SimBoard;
use lumefw::app::ports::PersistArea;
use lumefw::fsm::ModeId;
use lumefw::memory::{MemoryManager, STATE_SLOTS, decode_config, decode_state};
use lumefw::ramp::MAX_LEVEL;

fuzz_target!(|data: &[u8]| {
    if let Ok((state, _seq)) = decode_state(data) {
        assert!(state.level >= 1 && state.level <= MAX_LEVEL, "level out of range");
        assert_eq!(state.locked, state.mode == ModeId::Locked);
    }
    if let Ok(config) = decode_config(data) {
        // Range checks are the loader's job; they must not panic either.
        let _ = config.validate();
    }

    // Split the input across the slots and boot from it.
    let mut board = SimBoard::new(3);
    let chunk = data.len().div_ceil(usize::from(STATE_SLOTS)).max(1);
    for (slot, bytes) in data.chunks(chunk).enumerate() {
        board.write_raw(PersistArea::State(slot as u8), bytes);
    }
    let mut memory = MemoryManager::new();
    let _ = memory.load(&board);
});
