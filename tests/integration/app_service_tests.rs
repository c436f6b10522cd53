//! Integration tests for the switch → sequencer → FSM → outputs pipeline.
//!
//! These run on the host and drive the full `App` loop with timed switch
//! edges against the recording mock board.

use lumefw::app::events::AppEvent;
use lumefw::app::ports::{AuxDrive, AuxLed};
use lumefw::config::{Channel, ConfigItem, UiConfig};
use lumefw::fsm::ModeId;

use super::mock_hw::{HalCall, MockBoard, Rig};

fn rig() -> Rig {
    Rig::new(UiConfig::default())
}

/// Ramp from off to `level` with a single hold.
fn ramp_to(r: &mut Rig, level: u8) {
    let floor = r.app.config().ramp_floor;
    r.click_hold(0, u32::from(level - floor));
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_without_stored_state_is_off_at_floor() {
    let r = rig();
    assert_eq!(r.app.mode(), ModeId::Off);
    assert_eq!(r.app.level(), UiConfig::default().ramp_floor);
    assert!(r.hw.is_dark());
    assert_eq!(r.hw.state_writes(), 0, "booting must not commit");
    assert_eq!(
        r.sink.events.first(),
        Some(&AppEvent::Started {
            mode: ModeId::Off,
            restored: false
        })
    );
}

#[test]
fn button_held_through_power_on_is_ignored() {
    let mut hw = MockBoard::new(3);
    hw.switch = true;
    let mut r = Rig::with_board(UiConfig::default(), hw);
    // Release the held button: no click, no ramp.
    r.press_for(1);
    r.settle();
    assert_eq!(r.app.mode(), ModeId::Off);
}

// ── Basic UI ──────────────────────────────────────────────────

#[test]
fn click_turns_on_and_off_and_commits_on_off() {
    let mut r = rig();
    r.clicks(1);
    assert_eq!(r.app.mode(), ModeId::SteadyOn);
    assert!(!r.hw.is_dark());
    assert_eq!(r.hw.state_writes(), 0);

    r.clicks(1);
    assert_eq!(r.app.mode(), ModeId::Off);
    assert!(r.hw.is_dark());
    assert_eq!(r.hw.state_writes(), 1);
    assert_eq!(
        r.mode_changes(),
        vec![(ModeId::Off, ModeId::SteadyOn), (ModeId::SteadyOn, ModeId::Off)]
    );
}

#[test]
fn hold_from_off_ramps_up_from_floor_and_memorizes() {
    let mut r = rig();
    ramp_to(&mut r, 40);
    assert_eq!(r.app.mode(), ModeId::SteadyOn);
    assert_eq!(r.app.level(), 40);

    r.clicks(1);
    assert_eq!(r.app.mode(), ModeId::Off);
    r.clicks(1);
    assert_eq!(r.app.level(), 40, "turn-on uses the memorized level");
}

#[test]
fn hold_at_ceiling_ramps_down() {
    let mut r = rig();
    r.clicks(2);
    assert_eq!(r.app.level(), 150);
    r.click_hold(0, 10);
    assert_eq!(r.app.level(), 140);
}

#[test]
fn ramp_stops_at_ceiling() {
    let mut r = rig();
    r.click_hold(0, 400);
    assert_eq!(r.app.level(), 150);
    assert_eq!(r.app.mode(), ModeId::SteadyOn);
}

#[test]
fn double_click_toggles_ceiling() {
    let mut r = rig();
    ramp_to(&mut r, 30);
    r.clicks(2);
    assert_eq!(r.app.level(), 150);
    r.clicks(2);
    assert_eq!(r.app.level(), 30);
}

#[test]
fn triple_click_from_off_opens_config_menu_never_steady() {
    let mut r = rig();
    r.clicks(3);
    assert_eq!(r.app.mode(), ModeId::ConfigMenu);
    assert_eq!(r.app.base_mode(), ModeId::Off);
    assert!(r.mode_changes().iter().all(|&(_, to)| to != ModeId::SteadyOn));
}

#[test]
fn simple_ui_ignores_triple_click() {
    let mut cfg = UiConfig::default();
    cfg.simple_ui = true;
    let mut r = Rig::new(cfg);
    r.clicks(3);
    assert_eq!(r.app.mode(), ModeId::Off);
}

#[test]
fn simple_ui_from_config_menu_survives_reboot_and_can_be_left() {
    let mut r = rig();
    r.clicks(3);
    let index = ConfigItem::ALL.iter().position(|&i| i == ConfigItem::SimpleUi).unwrap_or(0);
    for _ in 0..index {
        r.clicks(3);
    }
    r.clicks(1);
    r.click_hold(0, 0);
    assert_eq!(r.app.mode(), ModeId::Off);

    let mut r = r.reboot();
    assert!(r.app.config().simple_ui);
    r.clicks(2);
    assert_eq!(r.app.level(), r.app.config().simple_ceiling);
    r.clicks(1);
    r.clicks(3);
    assert_eq!(r.app.mode(), ModeId::Off, "menu is gated in the simple UI");

    // 10H from off restores the full UI.
    r.click_hold(9, 0);
    assert!(!r.app.config().simple_ui);
    assert_eq!(r.app.mode(), ModeId::Off);

    let mut r = r.reboot();
    assert!(!r.app.config().simple_ui);
    r.clicks(3);
    assert_eq!(r.app.mode(), ModeId::ConfigMenu);
}

#[test]
fn ten_clicks_enable_simple_ui() {
    let mut r = rig();
    r.clicks(10);
    assert_eq!(r.app.mode(), ModeId::Off);
    assert!(r.app.config().simple_ui);
    assert!(r.sink.events.contains(&AppEvent::ConfigSaved));
    assert!(r.reboot().app.config().simple_ui);
}

// ── Lockout ───────────────────────────────────────────────────

#[test]
fn four_clicks_lock_from_any_mode_and_unlock() {
    let mut r = rig();
    r.clicks(1);
    r.clicks(4);
    assert_eq!(r.app.mode(), ModeId::Locked);
    assert!(r.app.is_locked());
    assert!(r.hw.is_dark());

    r.clicks(4);
    assert_eq!(r.app.mode(), ModeId::Off);
    assert!(!r.app.is_locked());
}

#[test]
fn lockout_cancels_pushed_mode() {
    let mut r = rig();
    r.clicks(3);
    assert_eq!(r.app.mode(), ModeId::ConfigMenu);
    r.clicks(4);
    assert_eq!(r.app.mode(), ModeId::Locked);
    assert_eq!(r.app.snapshot().stack_depth, 1);
}

#[test]
fn locked_hold_gives_momentary_moonlight() {
    let mut r = rig();
    r.clicks(4);
    r.press_for(40);
    assert_eq!(r.app.output_level(), UiConfig::default().ramp_floor);
    r.settle();
    assert_eq!(r.app.output_level(), 0);
    assert_eq!(r.app.mode(), ModeId::Locked);
}

#[test]
fn lock_state_survives_reboot() {
    let mut r = rig();
    r.clicks(4);
    let r = r.reboot();
    assert_eq!(r.app.mode(), ModeId::Locked);
    assert!(r.app.is_locked());
}

// ── Strobe ────────────────────────────────────────────────────

#[test]
fn triple_hold_enters_strobe_which_flashes() {
    let mut r = rig();
    r.click_hold(2, 0);
    assert_eq!(r.app.mode(), ModeId::Strobe);

    let before = r.hw.output_calls();
    r.idle(50);
    assert!(r.hw.output_calls() > before, "strobe must toggle the output");

    r.clicks(1);
    assert_eq!(r.app.mode(), ModeId::Off);
}

// ── Config menu ───────────────────────────────────────────────

#[test]
fn config_menu_adjusts_saves_and_persists() {
    let mut r = rig();
    let ceiling = r.app.config().thermal_ceiling_c;
    r.clicks(3);
    r.clicks(1);
    r.clicks(1);
    assert_eq!(r.app.config().thermal_ceiling_c, ceiling + 2);

    // Hold saves and leaves the menu.
    r.click_hold(0, 0);
    assert_eq!(r.app.mode(), ModeId::Off);
    assert_eq!(r.hw.config_writes(), 1);
    assert!(r.sink.events.contains(&AppEvent::ConfigSaved));

    let r = r.reboot();
    assert_eq!(r.app.config().thermal_ceiling_c, ceiling + 2);
}

#[test]
fn config_menu_walks_every_item_then_exits() {
    let mut r = rig();
    r.clicks(3);
    for _ in 1..ConfigItem::ALL.len() {
        r.clicks(3);
        assert_eq!(r.app.mode(), ModeId::ConfigMenu);
    }
    r.clicks(3);
    assert_eq!(r.app.mode(), ModeId::Off);
}

// ── Channels ──────────────────────────────────────────────────

#[test]
fn channel_select_routes_output_to_aux() {
    let mut cfg = UiConfig::default();
    cfg.channels_enabled = Channel::Main.mask() | Channel::AuxRed.mask();
    let mut r = Rig::new(cfg);
    r.clicks(2);
    r.clicks(3);
    assert_eq!(r.app.mode(), ModeId::ChannelSelect);
    r.clicks(1);
    assert_eq!(r.app.channel(), Channel::AuxRed);
    r.clicks(2);
    assert_eq!(r.app.mode(), ModeId::SteadyOn);

    r.idle(20);
    assert!(r.hw.is_dark());
    let last_rgb = r.hw.calls.iter().rev().find_map(|c| match c {
        HalCall::SetAux {
            led: AuxLed::Rgb,
            drive: AuxDrive::Color(rgb),
        } => Some(*rgb),
        _ => None,
    });
    assert_eq!(last_rgb, Some((255, 0, 0)));
    assert_eq!(r.hw.state_writes(), 1, "confirming a channel commits");
}

#[test]
fn channel_select_times_out() {
    let mut r = rig();
    r.clicks(1);
    r.clicks(3);
    assert_eq!(r.app.mode(), ModeId::ChannelSelect);
    r.idle(UiConfig::default().ticks_from_ms(3000) + 1);
    assert_eq!(r.app.mode(), ModeId::SteadyOn);
}

// ── Regulation ────────────────────────────────────────────────

#[test]
fn thermal_high_steps_down_and_recovers_gradually() {
    let mut r = rig();
    ramp_to(&mut r, 50);
    let cfg = r.app.config().clone();
    let interval = u32::from(cfg.regulator_interval_ticks);

    r.hw.temperature = Ok(cfg.thermal_ceiling_c + 10);
    r.idle(interval);
    assert_eq!(r.app.output_level(), 50 - cfg.thermal_step);

    // Below the ceiling but inside the hysteresis band: no recovery.
    r.hw.temperature = Ok(cfg.thermal_ceiling_c - 1);
    r.idle(interval * 3);
    assert_eq!(r.app.output_level(), 50 - cfg.thermal_step);

    r.hw.temperature = Ok(cfg.thermal_ceiling_c - cfg.thermal_hysteresis_c - 1);
    r.idle(interval);
    assert_eq!(
        r.app.output_level(),
        50 - cfg.thermal_step + cfg.thermal_recover_step
    );

    // Eventually the cap lifts and the requested level is back.
    r.idle(interval * 80);
    assert_eq!(r.app.thermal_cap(), None);
    assert_eq!(r.app.output_level(), 50);
}

#[test]
fn failed_temperature_reads_throttle() {
    let mut r = rig();
    ramp_to(&mut r, 80);
    r.hw.temperature = Err(lumefw::error::HalReadError::AdcTimeout);
    r.idle(u32::from(r.app.config().regulator_interval_ticks));
    assert!(r.app.output_level() < 80);
    assert_eq!(r.app.level(), 80);
}

#[test]
fn low_voltage_warns_without_disabling_output() {
    let mut r = rig();
    ramp_to(&mut r, 60);
    r.hw.voltage = Ok(r.app.config().low_voltage_mv - 20);
    r.idle(u32::from(r.app.config().regulator_interval_ticks));
    assert_eq!(r.app.mode(), ModeId::SteadyOn);
    assert_eq!(r.app.output_level(), 60);
}

#[test]
fn critical_voltage_turns_off() {
    let mut r = rig();
    ramp_to(&mut r, 60);
    r.hw.voltage = Ok(r.app.config().critical_voltage_mv - 20);
    r.idle(u32::from(r.app.config().regulator_interval_ticks));
    assert_eq!(r.app.mode(), ModeId::Off);
    assert!(r.hw.is_dark());
}

// ── HAL traffic ───────────────────────────────────────────────

#[test]
fn steady_output_is_not_rewritten_every_tick() {
    let mut r = rig();
    r.clicks(1);
    let before = r.hw.output_calls();
    r.idle(100);
    assert_eq!(r.hw.output_calls(), before);
}
