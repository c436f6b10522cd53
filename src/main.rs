//! lumefw host simulator.
//!
//! Runs a scripted session against the in-memory [`SimBoard`]: switch
//! edges go through the same lock-free edge queue a board's pin-change
//! interrupt would feed, and every tick runs the full dispatch cycle.
//!
//! ```text
//! ┌──────────────┐  push   ┌───────────┐ drain ┌──────────────────┐
//! │ Script (ISR) │───────▶ │ EdgeQueue │──────▶│ App::tick        │──▶ SimBoard
//! └──────────────┘         └───────────┘       └──────────────────┘
//! ```
//!
//! Usage: `lumefw-sim [config.json]`.  Set `RUST_LOG=debug` for detail.

use anyhow::{Context, Result, anyhow};
use log::info;

use lumefw::adapters::log_sink::LogEventSink;
use lumefw::adapters::sim::SimBoard;
use lumefw::app::service::App;
use lumefw::config::UiConfig;
use lumefw::events::{EdgeQueue, RawEdge};
use lumefw::ramp::RampTable;

/// One scripted stimulus.
#[derive(Debug, Clone, Copy)]
enum Step {
    Press,
    Release,
    Temperature(i16),
    Voltage(u16),
    Report(&'static str),
}

/// Build the session as (time in ms, step) pairs.
fn script() -> Vec<(u32, Step)> {
    let mut s = Vec::new();
    let click = |at: u32, s: &mut Vec<(u32, Step)>| {
        s.push((at, Step::Press));
        s.push((at + 60, Step::Release));
    };

    // Click on, then hold to ramp up.
    click(200, &mut s);
    s.push((1_000, Step::Report("after 1C from off")));
    s.push((1_200, Step::Press));
    s.push((3_200, Step::Release));
    s.push((3_800, Step::Report("after ramping up")));

    // Heat soak, then cool down.
    s.push((4_000, Step::Temperature(60)));
    s.push((6_000, Step::Report("hot")));
    s.push((6_000, Step::Temperature(30)));
    s.push((12_000, Step::Report("cooled")));

    // Double click to the ceiling, then off.
    click(12_200, &mut s);
    click(12_400, &mut s);
    s.push((13_000, Step::Report("after 2C")));
    click(13_200, &mut s);
    s.push((14_000, Step::Report("after 1C off")));

    // Four clicks to lock out.
    for i in 0..4 {
        click(14_200 + i * 200, &mut s);
    }
    s.push((16_000, Step::Report("after 4C")));

    // Sagging battery.
    s.push((16_200, Step::Voltage(2950)));
    s.push((17_000, Step::Report("low battery")));

    s.sort_by_key(|&(at, _)| at);
    s
}

fn load_config() -> Result<UiConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(UiConfig::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config: UiConfig =
        serde_json::from_str(&text).map_err(|e| anyhow!("parsing {path}: {e}"))?;
    info!("loaded config from {path}");
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("lumefw-sim v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let tick_ms = u32::from(config.tick_interval_ms);
    let mut app = App::new(config, RampTable::lume_x1()).context("invalid configuration")?;

    let mut board = SimBoard::new(RampTable::lume_x1().paths().len());
    let mut sink = LogEventSink::new();
    let mut queue = EdgeQueue::new();
    let (mut producer, mut consumer) = queue.split();

    app.start(&mut board, &mut sink);

    let steps = script();
    let end_ms = steps.last().map_or(0, |&(at, _)| at) + 500;
    let mut next = steps.iter().peekable();

    for tick in 0..=end_ms / tick_ms {
        let now_ms = tick * tick_ms;
        while let Some(&&(at, step)) = next.peek() {
            if at > now_ms {
                break;
            }
            next.next();
            match step {
                Step::Press | Step::Release => {
                    let edge = RawEdge {
                        pressed: matches!(step, Step::Press),
                        tick,
                    };
                    if !producer.push(edge) {
                        log::warn!("edge queue full at tick {tick}");
                    }
                }
                Step::Temperature(c) => board.set_temperature_c(c),
                Step::Voltage(mv) => board.set_voltage_mv(mv),
                Step::Report(label) => {
                    let s = app.snapshot();
                    info!(
                        "[{:>6} ms] {label}: mode={:?} level={} out={} cap={:?} ch={:?} locked={} drive={:?}",
                        now_ms,
                        s.mode,
                        s.level,
                        s.output_level,
                        s.thermal_cap,
                        s.channel,
                        s.locked,
                        board.outputs(),
                    );
                }
            }
        }
        app.tick(tick, consumer.drain(), &mut board, &mut sink);
    }

    info!(
        "done: {} state writes, {} output writes, {} edges dropped",
        board.writes(),
        board.output_writes(),
        consumer.dropped()
    );
    Ok(())
}
