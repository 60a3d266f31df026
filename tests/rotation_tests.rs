use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use wmfx::audio::SoundCue;
use wmfx::backend::{
    ClientFlags, ClientKind, Compositor, Container, Geometry, HeadlessCompositor, RotationAxis,
    UiState,
};
use wmfx::backend::headless::NodeKind;
use wmfx::config::TransitionSettings;
use wmfx::core::rotation::Phase;
use wmfx::core::session::EffectKind;
use wmfx::time_source::{SimulatedTimeSource, TimeSource};
use wmfx::{TransitionParams, Transitions};

const TICK_MS: u64 = 16;

struct Harness {
    wm: HeadlessCompositor,
    transitions: Transitions,
    clock: Arc<SimulatedTimeSource>,
    /// Phases entered so far, in order
    phases: Vec<Phase>,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(TransitionSettings::defaults_only())
    }

    fn with_settings(settings: TransitionSettings) -> Self {
        let clock = Arc::new(SimulatedTimeSource::new());
        let transitions = Transitions::new(TransitionParams {
            settings: Box::new(settings),
            clock: clock.clone(),
            sound: SoundCue::disabled(),
        });
        Self {
            wm: HeadlessCompositor::default(),
            transitions,
            clock,
            phases: Vec::new(),
        }
    }

    fn portrait() -> Self {
        let mut h = Self::new();
        h.wm.set_screen_size(480, 800);
        h
    }

    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn phase(&self) -> Phase {
        self.transitions.rotation().phase()
    }

    fn rotate(&mut self, goto_portrait: bool) -> bool {
        let started = self.transitions.rotate_screen(&mut self.wm, goto_portrait);
        self.record_phase();
        started
    }

    fn record_phase(&mut self) {
        let phase = self.phase();
        if self.phases.last() != Some(&phase) {
            self.phases.push(phase);
        }
    }

    fn tick(&mut self) {
        self.clock.advance_ms(TICK_MS);
        self.transitions.tick(&mut self.wm);
        self.record_phase();
    }

    fn run_until(&mut self, phase: Phase) {
        for _ in 0..500 {
            if self.phase() == phase {
                return;
            }
            self.tick();
        }
        panic!("rotation never reached {phase:?}, stuck in {:?}", self.phase());
    }

    fn run_to_idle(&mut self) {
        self.run_until(Phase::Idle);
        assert!(self.transitions.sessions().is_empty());
    }

    fn root_visible(&self) -> bool {
        self.wm.node(self.wm.render_root()).unwrap().visible
    }
}

#[test]
fn test_full_rotation_to_portrait() {
    let mut h = Harness::new();
    let root = h.wm.render_root();

    assert!(h.rotate(true));
    assert_eq!(h.phase(), Phase::FadeOut);
    assert_eq!(h.transitions.sessions().len(), 1);

    h.run_until(Phase::Waiting);
    assert!(!h.root_visible());
    assert_eq!(h.wm.orientation_requests(), &[true]);
    assert_eq!(h.wm.screen_size(), (480, 800));
    assert_eq!(h.wm.restack_count(), 0);

    h.run_until(Phase::FadeIn);
    assert!(h.root_visible());
    assert_eq!(h.wm.restack_count(), 1);

    h.run_to_idle();
    assert_eq!(h.phases, vec![Phase::FadeOut, Phase::Waiting, Phase::FadeIn, Phase::Idle]);

    // Tilted back flat around the portrait centre
    let state = h.wm.node(root).unwrap();
    assert_eq!(state.rotation, Some((RotationAxis::Y, 0.0, 240.0, 400.0)));
    assert_eq!(state.depth, 0.0);
    assert_eq!(h.wm.children(Container::Stage), &[root]);

    assert_eq!(h.wm.outstanding_node_refs(), 0);
    assert_eq!(h.wm.outstanding_client_refs(), 0);
    // Rotation fades never count as running effects
    assert!(h.wm.effect_running_signals().is_empty());
}

#[test]
fn test_rotation_tilts_and_dims_while_fading_out() {
    let mut h = Harness::new();
    let root = h.wm.render_root();
    h.rotate(true);
    for _ in 0..10 {
        h.tick();
    }

    let state = h.wm.node(root).unwrap();
    let (axis, angle, _, _) = state.rotation.unwrap();
    assert_eq!(axis, RotationAxis::X);
    assert!(angle < 0.0);
    assert!(state.depth < 0.0);

    // Dimmer sits on the stage above the scene
    let dimmer = *h.wm.children(Container::Stage).last().unwrap();
    assert_ne!(dimmer, root);
    assert_eq!(
        h.wm.node(dimmer).unwrap().kind,
        NodeKind::Rectangle(wmfx::backend::Color::BLACK)
    );
}

#[test]
fn test_rotation_to_landscape_masks_portrait_strip() {
    let mut h = Harness::portrait();
    let root = h.wm.render_root();

    assert!(h.rotate(false));
    let masks: Vec<_> = h
        .wm
        .children(Container::Node(root))
        .iter()
        .filter_map(|&node| h.wm.node(node))
        .filter(|state| matches!(state.kind, NodeKind::Rectangle(_)))
        .cloned()
        .collect();
    assert_eq!(masks.len(), 1);
    assert_eq!(masks[0].position, (480.0, 0.0));
    assert_eq!(masks[0].size, (320.0, 480.0));
    assert!(masks[0].visible);

    h.run_to_idle();
    assert_eq!(h.wm.orientation_requests(), &[false]);
    assert_eq!(h.wm.screen_size(), (800, 480));
    assert_eq!(h.wm.outstanding_node_refs(), 0);
    assert!(h.wm.children(Container::Node(root)).is_empty());
}

#[test]
fn test_request_for_current_orientation_is_refused() {
    let mut h = Harness::portrait();
    assert!(!h.rotate(true));
    assert_eq!(h.phase(), Phase::Idle);
    assert!(h.transitions.sessions().is_empty());

    let mut h = Harness::new();
    assert!(!h.rotate(false));
    assert_eq!(h.transitions.next_deadline(), None);
}

#[test]
fn test_counter_request_during_fade_out_skips_reconfiguration() {
    let mut h = Harness::new();
    assert!(h.rotate(true));
    for _ in 0..6 {
        h.tick();
    }
    // Already landscape, but a rotation is running so this is a divert
    assert!(h.rotate(false));
    assert_eq!(h.phase(), Phase::FadeOut);

    h.run_to_idle();
    assert_eq!(h.phases, vec![Phase::FadeOut, Phase::FadeIn, Phase::Idle]);
    assert!(h.wm.orientation_requests().is_empty());
    assert_eq!(h.wm.screen_size(), (800, 480));
    assert!(h.root_visible());
}

#[test]
fn test_counter_request_while_waiting_reconfigures_again() {
    let mut h = Harness::new();
    h.rotate(true);
    h.run_until(Phase::Waiting);

    assert!(h.rotate(false));
    h.run_to_idle();

    assert_eq!(h.phases, vec![Phase::FadeOut, Phase::Waiting, Phase::FadeIn, Phase::Idle]);
    assert_eq!(h.wm.orientation_requests(), &[true, false]);
    assert_eq!(h.wm.screen_size(), (800, 480));
}

#[test]
fn test_counter_request_during_fade_in_starts_new_rotation() {
    let mut h = Harness::new();
    h.rotate(true);
    h.run_until(Phase::FadeIn);

    assert!(h.rotate(false));
    // The second rotation starts in the same tick the fade in ends
    h.run_to_idle();

    assert_eq!(
        h.phases,
        vec![
            Phase::FadeOut,
            Phase::Waiting,
            Phase::FadeIn,
            Phase::FadeOut,
            Phase::Waiting,
            Phase::FadeIn,
            Phase::Idle
        ]
    );
    assert_eq!(h.wm.orientation_requests(), &[true, false]);
}

#[test]
fn test_quiet_period_ends_waiting() {
    let mut h = Harness::new();
    h.rotate(true);
    h.run_until(Phase::Waiting);
    let entered = h.now();

    assert_eq!(
        h.transitions.next_deadline(),
        Some(entered + Duration::from_millis(50))
    );

    h.run_until(Phase::FadeIn);
    let waited = h.now() - entered;
    assert!(waited >= Duration::from_millis(50));
    assert!(waited < Duration::from_millis(50 + TICK_MS));
}

#[test]
fn test_continuous_damage_is_capped() {
    let mut h = Harness::new();
    assert!(!h.transitions.rotate_ignore_damage(&mut h.wm));

    h.rotate(true);
    assert!(!h.transitions.rotate_ignore_damage(&mut h.wm));
    h.run_until(Phase::Waiting);
    let entered = h.now();

    let mut ignored = 0;
    while h.phase() == Phase::Waiting {
        assert!(h.now() - entered <= Duration::from_secs(2));
        if h.transitions.rotate_ignore_damage(&mut h.wm) {
            ignored += 1;
        }
        let deadline = h.transitions.rotation().damage_deadline().unwrap();
        assert!(deadline <= entered + Duration::from_millis(1000));
        h.tick();
    }

    let waited = h.now() - entered;
    assert!(ignored > 50);
    assert!(waited >= Duration::from_millis(1000));
    assert!(waited < Duration::from_millis(1000 + TICK_MS));
    assert_eq!(h.phase(), Phase::FadeIn);
    assert!(!h.transitions.rotate_ignore_damage(&mut h.wm));
}

#[test]
fn test_damage_extends_quiet_period() {
    let mut h = Harness::new();
    h.rotate(true);
    h.run_until(Phase::Waiting);
    let entered = h.now();

    h.clock.advance_ms(40);
    assert!(h.transitions.rotate_ignore_damage(&mut h.wm));
    assert_eq!(
        h.transitions.rotation().damage_deadline(),
        Some(entered + Duration::from_millis(90))
    );

    // The original deadline has passed but the new one has not
    h.clock.advance_ms(20);
    h.transitions.tick(&mut h.wm);
    assert_eq!(h.phase(), Phase::Waiting);

    h.clock.advance_ms(30);
    h.transitions.tick(&mut h.wm);
    assert_eq!(h.phase(), Phase::FadeIn);
}

#[test]
fn test_state_change_applied_once_faded_out() {
    let mut h = Harness::new();
    h.rotate(true);
    h.transitions.rotate_screen_and_change_state(UiState::AppPortrait);
    assert_eq!(h.wm.ui_state(), UiState::App);

    h.run_until(Phase::Waiting);
    assert_eq!(h.wm.ui_state(), UiState::AppPortrait);
}

#[test]
fn test_unsuitable_state_change_is_dropped() {
    let mut h = Harness::new();
    h.rotate(true);
    h.transitions.rotate_screen_and_change_state(UiState::Home);

    h.run_until(Phase::Waiting);
    assert_eq!(h.wm.ui_state(), UiState::App);

    // Not carried over to the next rotation either
    h.run_to_idle();
    h.rotate(false);
    h.run_to_idle();
    assert_eq!(h.wm.ui_state(), UiState::App);
}

#[test]
fn test_parked_close_released_when_faded_out() {
    let mut h = Harness::portrait();
    let client = h.wm.add_client(ClientKind::App, Geometry::new(0, 0, 480, 800));
    let actor = h.wm.client_actor(client).unwrap();

    let id = h
        .transitions
        .start_close_before_rotate(&mut h.wm, client)
        .unwrap();
    assert_eq!(
        h.transitions.sessions().get(id).unwrap().kind,
        EffectKind::CloseBeforeRotate
    );
    assert_eq!(h.transitions.rotation().parked(), &[id]);
    assert_eq!(h.wm.parent_of(actor), Some(Container::FrontGroup));
    assert_eq!(h.wm.children(Container::FrontGroup).len(), 2);
    assert!(h.wm.client_flags(client).contains(ClientFlags::DONT_SHOW));

    // Parked sessions are not the caller's to stop
    h.transitions.stop(&mut h.wm, client);
    assert!(h.transitions.sessions().contains(id));

    h.rotate(false);
    for _ in 0..5 {
        h.tick();
    }
    assert!(h.transitions.sessions().contains(id));

    h.run_until(Phase::Waiting);
    assert!(!h.transitions.sessions().contains(id));
    assert!(h.transitions.rotation().parked().is_empty());
    assert_eq!(h.wm.parent_of(actor), None);
    assert!(h.wm.children(Container::FrontGroup).is_empty());
    // Only the effect flags are cleared
    assert_eq!(h.wm.client_flags(client), ClientFlags::DONT_SHOW);

    h.run_to_idle();
    assert_eq!(h.wm.outstanding_node_refs(), 0);
    assert_eq!(h.wm.outstanding_client_refs(), 0);
    assert_eq!(h.wm.effect_running_signals(), &[true, false]);
}

#[test]
fn test_parked_close_skips_unsuitable_windows() {
    let mut h = Harness::portrait();
    let menu = h.wm.add_client(ClientKind::Menu, Geometry::new(0, 0, 200, 200));
    assert!(h.transitions.start_close_before_rotate(&mut h.wm, menu).is_none());

    let hidden = h.wm.add_client(ClientKind::App, Geometry::new(0, 0, 480, 800));
    let actor = h.wm.client_actor(hidden).unwrap();
    h.wm.hide(actor);
    assert!(h.transitions.start_close_before_rotate(&mut h.wm, hidden).is_none());

    assert!(h.transitions.rotation().parked().is_empty());
}

#[test]
fn test_rotation_parameters_come_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[rotate]\nduration_in = 600\nangle = 30").unwrap();

    let mut h = Harness::with_settings(TransitionSettings::new(file.path()));
    h.rotate(true);

    let id = h.transitions.sessions().ids()[0];
    let session = h.transitions.sessions().get(id).unwrap();
    assert_eq!(session.kind, EffectKind::RotateScreen);
    assert_eq!(session.angle, -30.0);
    assert_eq!(session.timeline.as_ref().unwrap().n_frames(), 36);
}

#[test]
fn test_unusable_damage_timeouts_fall_back_to_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[rotate]\ndamage_timeout = inf\ndamage_timeout_max = 1e300").unwrap();

    let mut h = Harness::with_settings(TransitionSettings::new(file.path()));
    h.rotate(true);
    h.run_until(Phase::Waiting);
    let entered = h.now();
    assert_eq!(
        h.transitions.rotation().damage_deadline(),
        Some(entered + Duration::from_millis(50))
    );
    assert!(h.transitions.rotate_ignore_damage(&mut h.wm));

    h.run_to_idle();
    assert!(h.wm.is_portrait());
    assert!(h.root_visible());
}
