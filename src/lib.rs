//! lumefw: flashlight UI firmware core.
//!
//! A ramping / event state machine for e-switch flashlights: raw switch
//! edges become click and hold events, a mode stack turns them into light
//! output across several power paths, and a regulator throttles on heat
//! and low battery.  Boards plug in through the port traits in
//! [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod memory;
pub mod ramp;
pub mod safety;
