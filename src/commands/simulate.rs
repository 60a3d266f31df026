//! Implementation of the `simulate` command.
//!
//! Runs a full screen rotation against the headless compositor with a
//! simulated clock, stepping one display frame at a time. Every phase change
//! is logged, which makes the command handy for checking how parameter file
//! changes affect the rotation timing without a real window manager.

use anyhow::{Result, bail};
use std::sync::Arc;
use std::time::Duration;

use crate::args::SimulateOptions;
use crate::audio::{LogOnlyAudio, SoundCue};
use crate::backend::{Compositor, HeadlessCompositor};
use crate::common::constants::{LANDSCAPE_HEIGHT, LANDSCAPE_WIDTH, TIMELINE_FPS};
use crate::config::ParamSource;
use crate::core::rotation::Phase;
use crate::core::{TransitionParams, Transitions};
use crate::time_source::{SimulatedTimeSource, TimeSource};

/// Simulated time after which a rotation is considered stuck.
const SIMULATION_LIMIT: Duration = Duration::from_secs(30);

/// Counter request is sent this long into the first fade.
const FLIP_DELAY: Duration = Duration::from_millis(100);

/// What happened during a simulated rotation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimulationReport {
    pub fade_outs: u32,
    pub fade_ins: u32,
    pub damage_events: u32,
    pub ignored_damage: u32,
    /// Orientations requested from the hardware, in order (`true` = portrait)
    pub orientation_requests: Vec<bool>,
    pub ended_portrait: bool,
    pub elapsed: Duration,
    pub leaked_node_refs: i64,
}

/// Run one rotation to completion.
pub fn run_simulation(
    settings: Box<dyn ParamSource>,
    options: &SimulateOptions,
) -> Result<SimulationReport> {
    let clock = Arc::new(SimulatedTimeSource::new());
    let mut wm = HeadlessCompositor::new(LANDSCAPE_WIDTH, LANDSCAPE_HEIGHT);
    if !options.goto_portrait {
        wm.set_screen_size(LANDSCAPE_HEIGHT, LANDSCAPE_WIDTH);
    }

    let mut transitions = Transitions::new(TransitionParams {
        settings,
        clock: clock.clone(),
        sound: SoundCue::new(Box::new(LogOnlyAudio)),
    });

    let mut report = SimulationReport::default();
    let frame = Duration::from_secs_f64(1.0 / TIMELINE_FPS as f64);

    if !transitions.rotate_screen(&mut wm, options.goto_portrait) {
        bail!("Screen is already in the requested orientation");
    }
    let mut phase = transitions.rotation().phase();
    log_phase(&mut report, phase, clock.now());

    let mut flipped = false;
    let mut last_damage = Duration::ZERO;

    while phase != Phase::Idle || !transitions.sessions().is_empty() {
        clock.advance(frame);
        let now = clock.now();
        if now > SIMULATION_LIMIT {
            bail!("Rotation did not settle within {}s", SIMULATION_LIMIT.as_secs());
        }

        if options.flip && !flipped && phase == Phase::FadeOut && now >= FLIP_DELAY {
            log_decorated!("{:>6} ms  counter request", now.as_millis());
            transitions.rotate_screen(&mut wm, !options.goto_portrait);
            flipped = true;
        }

        if let Some(interval) = options.damage_interval_ms.map(Duration::from_millis)
            && phase == Phase::Waiting
            && now.saturating_sub(last_damage) >= interval
        {
            last_damage = now;
            report.damage_events += 1;
            if transitions.rotate_ignore_damage(&mut wm) {
                report.ignored_damage += 1;
            }
        }

        transitions.tick(&mut wm);

        let next = transitions.rotation().phase();
        if next != phase {
            phase = next;
            log_phase(&mut report, phase, now);
        }
    }

    report.orientation_requests = wm.orientation_requests().to_vec();
    report.ended_portrait = wm.screen_size().1 > wm.screen_size().0;
    report.elapsed = clock.now();
    report.leaked_node_refs = wm.outstanding_node_refs();
    Ok(report)
}

fn log_phase(report: &mut SimulationReport, phase: Phase, now: Duration) {
    match phase {
        Phase::FadeOut => report.fade_outs += 1,
        Phase::FadeIn => report.fade_ins += 1,
        Phase::Idle | Phase::Waiting => {}
    }
    log_decorated!("{:>6} ms  {phase:?}", now.as_millis());
}

/// Handle the `simulate` command.
pub fn handle_simulate_command(
    options: SimulateOptions,
    config_path: Option<&str>,
    debug_enabled: bool,
) -> Result<()> {
    log_version!();
    if debug_enabled {
        log_pipe!();
        log_debug!("Debug mode enabled - showing every rotation step");
    }

    log_block_start!("Simulation Mode");
    let settings = super::open_settings(config_path);
    log_indented!(
        "Rotating to {}{}",
        if options.goto_portrait { "portrait" } else { "landscape" },
        if options.flip { " and back" } else { "" }
    );
    if let Some(ms) = options.damage_interval_ms {
        log_indented!("Damage every {ms} ms while blanked");
    }

    log_block_start!("Phases:");
    let report = run_simulation(Box::new(settings), &options)?;

    log_block_start!("Summary:");
    log_indented!("Fade outs: {}, fade ins: {}", report.fade_outs, report.fade_ins);
    log_indented!(
        "Damage events: {} ({} ignored)",
        report.damage_events,
        report.ignored_damage
    );
    log_indented!("Hardware orientation changes: {}", report.orientation_requests.len());
    log_indented!(
        "Final orientation: {}",
        if report.ended_portrait { "portrait" } else { "landscape" }
    );
    log_indented!("Total time: {} ms", report.elapsed.as_millis());
    if report.leaked_node_refs != 0 {
        log_pipe!();
        log_warning!("{} scene node references were not released", report.leaked_node_refs);
    }
    log_end!();
    Ok(())
}

/// Display detailed help for the simulate command (help subcommand)
pub fn display_help() {
    log_version!();
    log_block_start!("simulate - Run a headless screen rotation");
    log_block_start!("Usage: wmfx simulate [portrait|landscape] [--flip] [--damage <ms>]");
    log_block_start!("Arguments:");
    log_indented!("portrait|landscape  Orientation to rotate to (default: portrait)");
    log_block_start!("Options:");
    log_indented!("--flip              Request the opposite orientation during the fade out");
    log_indented!("--damage <ms>       Report screen damage this often while blanked");
    log_block_start!("Examples:");
    log_indented!("# Plain rotation to portrait");
    log_indented!("wmfx simulate");
    log_pipe!();
    log_indented!("# A client that keeps redrawing while the screen is blanked");
    log_indented!("wmfx --debug simulate landscape --damage 20");
    log_end!();
}
