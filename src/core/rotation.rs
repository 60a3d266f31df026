//! Orientation rotation state machine.
//!
//! Rotating the screen is a four-phase sequence:
//!
//! ```text
//! IDLE ──request──▶ FADE_OUT ──faded──▶ WAITING ──quiet──▶ FADE_IN ──faded──▶ IDLE
//! ```
//!
//! - **FADE_OUT**: the scene tilts away and dims to black
//! - **WAITING**: the scene is hidden while the hardware switches orientation.
//!   The switch only reports progress through damage notifications, so the
//!   phase ends once no damage has arrived for `damage_timeout` ms. The whole
//!   phase never lasts longer than `damage_timeout_max` ms.
//! - **FADE_IN**: the scene tilts back in the new orientation
//!
//! A new request may arrive at any time. It only overwrites the requested
//! direction; each phase re-reads it when it ends and diverts if it changed,
//! so quick back-and-forth requests play at most one fade out and one fade in.
//!
//! The controller performs no side effects itself. Everything goes through a
//! [`RotationHost`], which the transition manager implements on top of the
//! compositor and its effect arena.

use std::time::Duration;

use crate::backend::UiState;
use crate::core::session::EffectId;

/// Phase of the rotation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    FadeOut,
    Waiting,
    FadeIn,
}

/// Orientation a rotation is heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn from_portrait(portrait: bool) -> Self {
        if portrait {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    pub fn is_portrait(self) -> bool {
        self == Orientation::Portrait
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Landscape => write!(f, "landscape"),
            Orientation::Portrait => write!(f, "portrait"),
        }
    }
}

/// Side effects the rotation controller asks for.
#[cfg_attr(test, mockall::automock)]
pub trait RotationHost {
    /// Start one half of the rotation animation. The host must call
    /// [`OrientationController::step`] when it completes.
    fn fade_and_rotate(&mut self, first_part: bool, goto_portrait: bool);

    /// Complete a parked effect session, releasing its resources.
    fn complete_parked(&mut self, id: EffectId);

    fn set_ui_state(&mut self, state: UiState);

    /// Blank the screen by hiding the render root.
    fn hide_scene(&mut self);

    fn show_scene(&mut self);

    /// Ask the hardware to switch orientation.
    fn change_orientation(&mut self, portrait: bool);

    /// Re-evaluate what is visible and blurred.
    fn restack(&mut self);

    /// Whether the screen is currently in portrait orientation.
    fn is_portrait(&self) -> bool;

    /// Quiet period that ends WAITING.
    fn damage_timeout(&mut self) -> Duration;

    /// Upper bound on the time spent in WAITING.
    fn damage_timeout_max(&mut self) -> Duration;

    fn now(&self) -> Duration;
}

/// Owner of the rotation sequence state.
#[derive(Debug, Default)]
pub struct OrientationController {
    /// Where the running sequence is going
    direction: Orientation,
    /// Latest request; checked at the end of every phase
    new_direction: Orientation,
    phase: Phase,
    /// UI state to switch to once faded out (`Undefined` means none)
    goto_state: UiState,
    /// When the WAITING timeout fires
    damage_deadline: Option<Duration>,
    /// When WAITING was entered
    waiting_since: Option<Duration>,
    /// Sessions kept on screen until the rotation has faded out
    parked: Vec<EffectId>,
}

impl OrientationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn direction(&self) -> Orientation {
        self.direction
    }

    /// Latest requested direction.
    pub fn requested_direction(&self) -> Orientation {
        self.new_direction
    }

    pub fn is_rotating(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// When the damage timeout will fire, if armed.
    pub fn damage_deadline(&self) -> Option<Duration> {
        self.damage_deadline
    }

    pub fn parked(&self) -> &[EffectId] {
        &self.parked
    }

    /// Keep `id` alive until the next FADE_OUT completes.
    pub fn park(&mut self, id: EffectId) {
        self.parked.push(id);
    }

    /// Switch to `state` once faded out, if it suits the new orientation.
    pub fn change_state_when_faded(&mut self, state: UiState) {
        self.goto_state = state;
    }

    /// Request a rotation. Returns `false` if nothing will happen because the
    /// screen already has the requested orientation.
    pub fn request(&mut self, host: &mut dyn RotationHost, goto_portrait: bool) -> bool {
        log_debug!(
            "Rotation requested to {}",
            Orientation::from_portrait(goto_portrait)
        );

        if self.phase == Phase::Idle && goto_portrait == host.is_portrait() {
            log_warning!(
                "Already in {} mode",
                Orientation::from_portrait(goto_portrait)
            );
            return false;
        }

        self.new_direction = Orientation::from_portrait(goto_portrait);
        if self.phase == Phase::Idle {
            self.step(host);
        } else {
            log_debug!("Diverting rotation in {:?} to {}", self.phase, self.new_direction);
        }
        true
    }

    /// Handle a damage notification. Returns whether damage should be ignored
    /// because the screen is blanked.
    ///
    /// While WAITING this also restarts the quiet-period timeout, never past
    /// the cap measured from when WAITING began.
    pub fn ignore_damage(&mut self, host: &mut dyn RotationHost) -> bool {
        if self.phase != Phase::Waiting {
            return false;
        }

        let now = host.now();
        let since = self.waiting_since.unwrap_or(now);
        let max = host.damage_timeout_max();
        if now.saturating_sub(since) < max {
            let deadline = now
                .saturating_add(host.damage_timeout())
                .min(since.saturating_add(max));
            self.damage_deadline = Some(deadline);
        }
        true
    }

    /// Whether the damage timeout has fired by `now`.
    pub fn damage_timeout_due(&self, now: Duration) -> bool {
        self.phase == Phase::Waiting && self.damage_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Advance the sequence. Called when a phase ends: a rotation fade
    /// completed or the damage timeout fired.
    pub fn step(&mut self, host: &mut dyn RotationHost) {
        log_debug!(
            "Rotation step: phase={:?} direction={} new_direction={}",
            self.phase,
            self.direction,
            self.new_direction
        );

        // Entering here always disarms the timeout
        self.damage_deadline = None;
        self.waiting_since = None;

        match self.phase {
            Phase::Idle => {
                self.phase = Phase::FadeOut;
                self.direction = self.new_direction;
                host.fade_and_rotate(true, self.direction.is_portrait());
            }
            Phase::FadeOut => {
                let state = std::mem::take(&mut self.goto_state);
                if state.suits_orientation(self.new_direction.is_portrait()) {
                    log_debug!("Switching UI state to {state}");
                    host.set_ui_state(state);
                } else if state != UiState::Undefined {
                    log_debug!("Dropping UI state {state}, unsuitable for {}", self.new_direction);
                }

                for id in std::mem::take(&mut self.parked) {
                    host.complete_parked(id);
                }

                if self.direction == self.new_direction {
                    self.phase = Phase::Waiting;
                    host.hide_scene();
                    host.change_orientation(self.direction.is_portrait());
                    let now = host.now();
                    self.damage_deadline = Some(now.saturating_add(host.damage_timeout()));
                    self.waiting_since = Some(now);
                    return;
                }

                // Turned around while fading out: nothing to reconfigure
                self.direction = self.new_direction;
                self.leave_waiting(host);
            }
            Phase::Waiting => self.leave_waiting(host),
            Phase::FadeIn => {
                self.phase = Phase::Idle;
                if self.direction != self.new_direction {
                    self.step(host);
                }
            }
        }
    }

    fn leave_waiting(&mut self, host: &mut dyn RotationHost) {
        if self.direction == self.new_direction {
            self.phase = Phase::FadeIn;
            host.show_scene();
            host.fade_and_rotate(false, self.direction.is_portrait());
            host.restack();
        } else {
            // Reconfigure again without another fade
            self.direction = self.new_direction;
            self.phase = Phase::FadeOut;
            self.step(host);
        }
    }
}
