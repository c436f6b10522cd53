//! Pure-logic peripheral drivers: the e-switch click sequencer and the
//! aux LED pattern engine.

pub mod aux_led;
pub mod button;
