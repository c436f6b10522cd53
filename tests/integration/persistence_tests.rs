//! Integration tests for durable state: commit triggers, wear levelling,
//! and recovery from bad storage.

use lumefw::app::events::AppEvent;
use lumefw::app::ports::{PersistArea, StorageError};
use lumefw::config::{Channel, UiConfig};
use lumefw::error::Error;
use lumefw::fsm::ModeId;
use lumefw::memory::PersistedState;

use super::mock_hw::{MockBoard, Rig};

fn rig() -> Rig {
    Rig::new(UiConfig::default())
}

fn ramp_to(r: &mut Rig, level: u8) {
    let floor = r.app.config().ramp_floor;
    r.click_hold(0, u32::from(level - floor));
}

fn committed(r: &Rig) -> Vec<(PersistedState, u8)> {
    r.sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Committed { state, slot } => Some((*state, *slot)),
            _ => None,
        })
        .collect()
}

fn recoverable(r: &Rig) -> Vec<Error> {
    r.sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Recoverable(err) => Some(*err),
            _ => None,
        })
        .collect()
}

#[test]
fn steady_on_survives_power_loss() {
    let mut r = rig();
    ramp_to(&mut r, 60);
    assert_eq!(r.hw.state_writes(), 0);

    // A sudden sag between two checks means the cell is being pulled.
    r.hw.voltage = Ok(3400);
    r.idle(u32::from(r.app.config().regulator_interval_ticks));
    assert_eq!(r.hw.state_writes(), 1);
    assert_eq!(
        committed(&r),
        vec![(
            PersistedState {
                mode: ModeId::SteadyOn,
                level: 60,
                channel: Channel::Main,
                locked: false,
            },
            0
        )]
    );

    let r = r.reboot();
    assert_eq!(r.app.mode(), ModeId::SteadyOn);
    assert_eq!(r.app.level(), 60);
    assert_eq!(r.app.output_level(), 60);
    assert!(!r.hw.is_dark());
    assert_eq!(
        r.sink.events.first(),
        Some(&AppEvent::Started {
            mode: ModeId::SteadyOn,
            restored: true
        })
    );
}

#[test]
fn idle_steady_on_commits_once() {
    let mut r = rig();
    r.clicks(1);
    let idle = r.app.config().ticks_from_secs(r.app.config().idle_commit_secs);

    r.idle(idle - 30);
    assert_eq!(r.hw.state_writes(), 0);
    r.idle(30);
    assert_eq!(r.hw.state_writes(), 1);

    r.idle(idle * 2);
    assert_eq!(r.hw.state_writes(), 1, "idle commit must not repeat");
}

#[test]
fn unchanged_state_is_not_rewritten() {
    let mut r = rig();
    for _ in 0..3 {
        r.clicks(1);
        r.clicks(1);
    }
    assert_eq!(r.app.mode(), ModeId::Off);
    assert_eq!(r.hw.state_writes(), 1);
}

#[test]
fn commits_rotate_through_slots_and_newest_wins() {
    let mut r = rig();
    for level in [10u8, 20, 30, 40, 50] {
        ramp_to(&mut r, level);
        r.clicks(1);
    }
    let slots: Vec<u8> = committed(&r).iter().map(|&(_, slot)| slot).collect();
    assert_eq!(slots, vec![0, 1, 2, 3, 0]);

    let r = r.reboot();
    assert_eq!(r.app.mode(), ModeId::Off);
    assert_eq!(r.app.level(), 50);
}

#[test]
fn corrupt_slot_falls_back_to_older_record() {
    let mut r = rig();
    ramp_to(&mut r, 20);
    r.clicks(1);
    ramp_to(&mut r, 70);
    r.clicks(1);

    // Damage the newest record's checksum.
    if let Some(bytes) = r.hw.store.get_mut(&PersistArea::State(1)) {
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
    }
    let r = r.reboot();
    assert_eq!(r.app.level(), 20);
    assert!(recoverable(&r).is_empty(), "one good slot is a clean restore");
}

#[test]
fn corrupt_storage_boots_with_defaults() {
    let mut r = rig();
    ramp_to(&mut r, 90);
    r.clicks(1);
    for bytes in r.hw.store.values_mut() {
        bytes[0] ^= 0xFF;
    }

    let r = r.reboot();
    assert_eq!(r.app.mode(), ModeId::Off);
    assert!(matches!(recoverable(&r).as_slice(), [Error::InvalidPersistedState(_)]));
}

#[test]
fn failed_commit_is_retried_on_next_trigger() {
    let mut r = rig();
    r.clicks(1);
    r.hw.fail_writes = 2;
    r.clicks(1);
    assert_eq!(r.app.mode(), ModeId::Off, "a failed write never blocks the UI");
    assert_eq!(r.hw.state_writes(), 0);
    assert!(matches!(recoverable(&r).as_slice(), [Error::StorageWrite(_)]));

    r.clicks(1);
    r.clicks(1);
    assert_eq!(r.hw.state_writes(), 1);
}

#[test]
fn single_write_failure_retries_next_slot() {
    let mut r = rig();
    r.clicks(1);
    r.hw.fail_writes = 1;
    r.clicks(1);
    assert_eq!(r.hw.state_writes(), 1);
    assert!(recoverable(&r).is_empty());
    assert_eq!(committed(&r).first().map(|&(_, slot)| slot), Some(1));
}

#[test]
fn corrupt_config_is_ignored_at_boot() {
    let mut r = rig();
    r.clicks(3);
    r.clicks(1);
    r.click_hold(0, 0);
    assert_eq!(r.hw.config_writes(), 1);

    if let Some(bytes) = r.hw.store.get_mut(&PersistArea::Config) {
        bytes[2] ^= 0xFF;
    }
    let r = r.reboot();
    assert_eq!(r.app.config(), &UiConfig::default());
    assert!(!recoverable(&r).is_empty());
}

#[test]
fn unreadable_storage_boots_with_defaults() {
    let mut r = rig();
    ramp_to(&mut r, 90);
    r.clicks(1);
    assert_eq!(r.hw.state_writes(), 1);

    let mut hw: MockBoard = r.hw.power_cycle();
    assert!(hw.store.contains_key(&PersistArea::State(0)));
    hw.fail_reads = true;
    let r = Rig::with_board(UiConfig::default(), hw);
    assert_eq!(r.app.mode(), ModeId::Off);
    assert_eq!(
        recoverable(&r),
        vec![
            Error::StorageRead(StorageError::IoError),
            Error::StorageRead(StorageError::IoError)
        ],
        "config and state reads both fail, neither is a write error"
    );
}

#[test]
fn idle_commit_survives_a_coarse_tick_clock() {
    let mut r = rig();
    r.clicks(1);
    assert_eq!(r.app.mode(), ModeId::SteadyOn);

    // Main loop running late: `now` advances 7 ticks per call.
    for _ in 0..200 {
        r.step(7);
    }
    assert_eq!(r.hw.state_writes(), 1);
    for _ in 0..200 {
        r.step(7);
    }
    assert_eq!(r.hw.state_writes(), 1, "idle commit is latched until the next input");
}
