//! Application core: pure domain logic, zero I/O.
//!
//! Ties the click sequencer, the mode-stack FSM, the regulator, the ramp
//! engine and the memory manager into one dispatch loop.  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
