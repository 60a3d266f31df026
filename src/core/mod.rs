//! Transition engine: effect launch API, scheduler and rotation sequencing.
//!
//! [`Transitions`] owns every in-flight effect session and the orientation
//! rotation controller. The window manager calls the `start_*` functions when
//! clients map or unmap, forwards damage notifications through
//! [`Transitions::rotate_ignore_damage`], and calls [`Transitions::tick`]
//! whenever [`Transitions::next_deadline`] comes due.
//!
//! The compositor is passed into every call instead of being stored, so the
//! engine never holds on to the window manager between events.
//!
//! Launch functions never fail. A request that cannot be honoured (missing
//! actor, wrong window type, tiny window) is skipped and reported at debug
//! level; the window manager then shows or hides the client without an effect.

pub mod easing;
pub mod frames;
pub mod rotation;
pub mod session;
pub mod timeline;

use std::sync::Arc;
use std::time::Duration;

use crate::audio::SoundCue;
use crate::backend::{
    ClientFlags, ClientId, ClientKind, Color, Compositor, Container, NodeId, UiState,
};
use crate::common::constants::*;
use crate::config::ParamSource;
use crate::core::rotation::{OrientationController, RotationHost};
use crate::core::session::{
    Continuation, Direction, EffectArena, EffectId, EffectKind, EffectSession, Endpoint,
    EndpointSlot,
};
use crate::core::timeline::{Frame, Timeline};
use crate::time_source::TimeSource;

/// Dependencies needed to create a [`Transitions`] engine.
pub struct TransitionParams {
    pub settings: Box<dyn ParamSource>,
    pub clock: Arc<dyn TimeSource>,
    pub sound: SoundCue,
}

/// Owner of all effect sessions and the rotation state.
pub struct Transitions {
    settings: Box<dyn ParamSource>,
    clock: Arc<dyn TimeSource>,
    sound: SoundCue,
    arena: EffectArena,
    rotation: OrientationController,
}

impl Transitions {
    pub fn new(params: TransitionParams) -> Self {
        Self {
            settings: params.settings,
            clock: params.clock,
            sound: params.sound,
            arena: EffectArena::new(),
            rotation: OrientationController::new(),
        }
    }

    pub fn sessions(&self) -> &EffectArena {
        &self.arena
    }

    pub fn rotation(&self) -> &OrientationController {
        &self.rotation
    }

    /// Session currently animating `client`.
    pub fn current_effect(&self, client: ClientId) -> Option<EffectId> {
        self.arena.current_effect(client)
    }

    /// Slide a window in from (or out to) the nearest screen edge.
    pub fn start_popup(
        &mut self,
        backend: &mut dyn Compositor,
        client: ClientId,
        direction: Direction,
    ) -> Option<EffectId> {
        let actor = backend.client_actor(client)?;

        let mut session = EffectSession::new(EffectKind::Popup, direction);
        session.geometry = backend.geometry(actor);
        session.primary = Some(Endpoint::acquire_with_actor(backend, client, actor));

        // Covers the gap behind the window when it bounces past its resting place
        let background = backend.background_color();
        session.auxiliary[0] = backend.create_rectangle(background);

        Some(self.launch(backend, session, TRANSITION_POPUP, DEFAULT_POPUP_DURATION))
    }

    /// Fade a window in or out.
    pub fn start_fade(
        &mut self,
        backend: &mut dyn Compositor,
        client: ClientId,
        direction: Direction,
    ) -> Option<EffectId> {
        let actor = backend.client_actor(client)?;
        let mut session = EffectSession::new(EffectKind::Fade, direction);
        session.primary = Some(Endpoint::acquire_with_actor(backend, client, actor));
        Some(self.launch(backend, session, TRANSITION_FADE, DEFAULT_FADE_DURATION))
    }

    /// Fold an application window away and throw sparks.
    pub fn start_close(
        &mut self,
        backend: &mut dyn Compositor,
        client: ClientId,
    ) -> Option<EffectId> {
        if !can_close(backend, client) {
            return None;
        }

        let app_stacked = backend.client_stack_index(client) > 0;
        if app_stacked && !backend.client_is_leader(client) {
            log_debug!("Skipping close effect for non-leading secondary window {client}");
            return None;
        }

        let actor = visible_actor(backend, client)?;
        let geometry = backend.geometry(actor);
        if geometry.width < CLOSE_MIN_SIZE || geometry.height < CLOSE_MIN_SIZE {
            return None;
        }

        // The screen may change orientation before the effect ends
        let mut session = EffectSession::new(EffectKind::Close, Direction::Unmap);
        session.geometry = geometry;
        session.screen_size = Some(backend.screen_size());
        session.primary = Some(Endpoint::acquire_with_actor(backend, client, actor));

        // Stay visible when the render manager switches views
        backend.reparent(actor, Container::FrontGroup);
        backend.lower_bottom(actor);
        backend.move_anchor_to_center(actor);

        for slot in session.auxiliary.iter_mut().take(CLOSE_PARTICLES) {
            *slot = backend.create_particle();
            if let Some(spark) = *slot {
                backend.set_anchor_to_center(spark);
                backend.add_to(Container::FrontGroup, spark);
                backend.hide(spark);
            }
        }

        let duration = self
            .settings
            .get_int(TRANSITION_APP_CLOSE, KEY_DURATION, DEFAULT_APP_CLOSE_DURATION);
        let id = launch_session(
            backend,
            &mut self.arena,
            self.clock.as_ref(),
            session,
            Timeline::new(duration),
        );

        self.play_sound(WINDOW_CLOSED_SOUND);
        Some(id)
    }

    /// Keep a closing window on screen, inert, until a rotation has faded out.
    ///
    /// Used when an application that forced an orientation exits: the screen
    /// rotates back right away, so the window cannot animate.
    pub fn start_close_before_rotate(
        &mut self,
        backend: &mut dyn Compositor,
        client: ClientId,
    ) -> Option<EffectId> {
        if !can_close(backend, client) {
            return None;
        }
        let actor = visible_actor(backend, client)?;

        let mut session = EffectSession::new(EffectKind::CloseBeforeRotate, Direction::Unmap);
        session.flags = ClientFlags::EFFECT | ClientFlags::DONT_SHOW;
        session.primary = Some(Endpoint::acquire_with_actor(backend, client, actor));
        backend.set_client_flags(client, session.flags);

        backend.reparent(actor, Container::FrontGroup);
        backend.lower_bottom(actor);

        // The real title bar goes away with the application
        session.auxiliary[0] = backend.create_fake_title_bar(LANDSCAPE_HEIGHT);
        if let Some(title_bar) = session.auxiliary[0] {
            backend.add_to(Container::FrontGroup, title_bar);
        }

        let id = self.arena.insert(backend, session);
        self.rotation.park(id);
        log_debug!("Parked {id} for {client} until the rotation fades out");

        self.play_sound(WINDOW_CLOSED_SOUND);
        Some(id)
    }

    /// Arc a notification in from the corner, or shrink it into the task button.
    pub fn start_notification(
        &mut self,
        backend: &mut dyn Compositor,
        client: ClientId,
        direction: Direction,
    ) -> Option<EffectId> {
        let actor = backend.client_actor(client)?;
        let mut session = EffectSession::new(EffectKind::Notification, direction);
        session.primary = Some(Endpoint::acquire_with_actor(backend, client, actor));
        Some(self.launch(
            backend,
            session,
            TRANSITION_NOTIFICATION,
            DEFAULT_NOTIFICATION_DURATION,
        ))
    }

    /// Slide between an application's main view and one of its subviews.
    ///
    /// `Map` slides the subview in over the main view, `Unmap` slides it back
    /// out. If the outgoing view is itself still sliding in from a previous
    /// request, the running effect is retargeted instead of starting a second
    /// one. Returns the id of the effect now driving the slide.
    pub fn start_subview(
        &mut self,
        backend: &mut dyn Compositor,
        subview: ClientId,
        mainview: ClientId,
        direction: Direction,
    ) -> Option<EffectId> {
        if subview == mainview {
            log_error!("Subview transition requested with mainview == subview == {subview}");
            return None;
        }
        if backend.client_actor(subview).is_none()
            || backend.client_actor(mainview).is_none()
            || !backend.ui_state().is_app()
        {
            return None;
        }

        let subview_busy = backend
            .client_flags(subview)
            .contains(ClientFlags::EFFECT_RUNNING);
        let mainview_busy = backend
            .client_flags(mainview)
            .contains(ClientFlags::EFFECT_RUNNING);

        if subview_busy && mainview_busy {
            return None;
        }
        if mainview_busy {
            // Pushing again while the view we leave is still sliding in
            let id = self.subview_effect(mainview, Direction::Map, EndpointSlot::Primary)?;
            if direction != Direction::Map {
                return None;
            }
            log_debug!("Retargeting {id} from {mainview} to {subview}");
            self.arena
                .splice(backend, id, EndpointSlot::Primary, subview)
                .then_some(id)
        } else if subview_busy {
            // Popping again while the view we leave is still the target
            let id = self.subview_effect(subview, Direction::Unmap, EndpointSlot::Secondary)?;
            if direction != Direction::Unmap {
                return None;
            }
            log_debug!("Retargeting {id} from {subview} to {mainview}");
            self.arena
                .splice(backend, id, EndpointSlot::Secondary, mainview)
                .then_some(id)
        } else {
            let mut session = EffectSession::new(EffectKind::Subview, direction);
            session.primary = Some(Endpoint::acquire(backend, subview));
            session.secondary = Some(Endpoint::acquire(backend, mainview));
            Some(self.launch(backend, session, TRANSITION_SUBVIEW, DEFAULT_SUBVIEW_DURATION))
        }
    }

    /// Subview effect running in `direction` with `client` at `slot`.
    fn subview_effect(
        &self,
        client: ClientId,
        direction: Direction,
        slot: EndpointSlot,
    ) -> Option<EffectId> {
        let id = self.arena.current_effect(client)?;
        let session = self.arena.get(id)?;
        let at_slot = match slot {
            EndpointSlot::Primary => session.primary_client(),
            EndpointSlot::Secondary => session.secondary_client(),
        };
        (session.kind == EffectKind::Subview
            && session.direction == direction
            && at_slot == Some(client))
        .then_some(id)
    }

    /// Finish the effect running on `client` immediately, in its end state.
    pub fn stop(&mut self, backend: &mut dyn Compositor, client: ClientId) {
        let Some(id) = self.arena.current_effect(client) else {
            return;
        };
        let Some(session) = self.arena.get_mut(id) else {
            return;
        };
        // Parked sessions belong to the rotation
        let Some(timeline) = session.timeline.as_mut() else {
            return;
        };

        log_debug!("Stopping {} {id} on {client}", session.kind);
        let frame = timeline.stop();
        frames::apply(backend, session, frame);
        self.finish(backend, id);
    }

    /// Start rotating the screen. Returns `false` if the screen already has
    /// the requested orientation and nothing will happen.
    pub fn rotate_screen(&mut self, backend: &mut dyn Compositor, goto_portrait: bool) -> bool {
        let (rotation, mut host) = self.split(backend);
        rotation.request(&mut host, goto_portrait)
    }

    /// Switch the render manager to `state` once the running rotation has
    /// faded out, if `state` suits the orientation being entered.
    pub fn rotate_screen_and_change_state(&mut self, state: UiState) {
        self.rotation.change_state_when_faded(state);
    }

    /// Report a damage notification. Returns whether it should be ignored
    /// because the screen is blanked for a rotation.
    pub fn rotate_ignore_damage(&mut self, backend: &mut dyn Compositor) -> bool {
        let (rotation, mut host) = self.split(backend);
        rotation.ignore_damage(&mut host)
    }

    /// Whether `node` only lives until its client's unmap effect ends.
    pub fn actor_will_go_away(&self, backend: &dyn Compositor, node: NodeId) -> bool {
        let Some(client) = backend.client_for_node(node) else {
            return false;
        };
        let Some(session) = self
            .arena
            .current_effect(client)
            .and_then(|id| self.arena.get(id))
        else {
            return false;
        };
        session.direction == Direction::Unmap && session.primary_client() == Some(client)
    }

    /// Play a sound cue without blocking on its outcome.
    pub fn play_sound(&mut self, file: &str) {
        self.sound.play(file);
    }

    /// Advance every running effect to the current time and fire a due
    /// damage timeout.
    pub fn tick(&mut self, backend: &mut dyn Compositor) {
        let now = self.clock.now();

        for id in self.arena.ids() {
            // A newer effect on the same client draws instead
            let superseded = self.arena.is_superseded(id);
            // Completing one session can complete others (parked ones)
            let Some(session) = self.arena.get_mut(id) else {
                continue;
            };
            if session.kind == EffectKind::Close {
                frames::follow_screen_size(backend, session);
            }
            let Some(frame) = session.timeline.as_mut().and_then(|t| t.advance(now)) else {
                continue;
            };
            if !superseded {
                frames::apply(backend, session, frame);
            }
            if frame.is_last() {
                self.finish(backend, id);
            }
        }

        if self.rotation.damage_timeout_due(now) {
            log_debug!("No damage for a while, continuing rotation");
            self.step_rotation(backend);
        }
    }

    /// When [`Transitions::tick`] should next be called, if anything is pending.
    pub fn next_deadline(&self) -> Option<Duration> {
        let frame_deadlines = self
            .arena
            .ids()
            .into_iter()
            .filter_map(|id| self.arena.get(id))
            .filter_map(|session| session.timeline.as_ref())
            .filter_map(Timeline::next_frame_due);
        frame_deadlines
            .chain(self.rotation.damage_deadline())
            .min()
    }

    fn launch(
        &mut self,
        backend: &mut dyn Compositor,
        session: EffectSession,
        transition: &str,
        default_ms: i64,
    ) -> EffectId {
        let duration = duration_for(self.settings.as_mut(), transition, session.direction, default_ms);
        launch_session(
            backend,
            &mut self.arena,
            self.clock.as_ref(),
            session,
            Timeline::new(duration),
        )
    }

    /// Complete `id` and run its continuation.
    fn finish(&mut self, backend: &mut dyn Compositor, id: EffectId) {
        let Some(session) = self.arena.complete(backend, id) else {
            return;
        };
        log_debug!("Completed {} {id}", session.kind);
        if session.continuation == Continuation::RotationStep {
            self.step_rotation(backend);
        }
    }

    fn step_rotation(&mut self, backend: &mut dyn Compositor) {
        let (rotation, mut host) = self.split(backend);
        rotation.step(&mut host);
    }

    /// Borrow the rotation controller next to a host over everything else.
    fn split<'a>(
        &'a mut self,
        backend: &'a mut dyn Compositor,
    ) -> (&'a mut OrientationController, RotationContext<'a>) {
        (
            &mut self.rotation,
            RotationContext {
                backend,
                settings: self.settings.as_mut(),
                arena: &mut self.arena,
                clock: self.clock.as_ref(),
            },
        )
    }
}

fn can_close(backend: &dyn Compositor, client: ClientId) -> bool {
    if backend.client_kind(client) != ClientKind::App {
        return false;
    }
    // The task navigator animates closing windows itself
    backend.ui_state() != UiState::TaskNav
}

fn visible_actor(backend: &dyn Compositor, client: ClientId) -> Option<NodeId> {
    backend
        .client_actor(client)
        .filter(|&actor| backend.is_visible(actor))
}

fn duration_for(
    settings: &mut dyn ParamSource,
    transition: &str,
    direction: Direction,
    default_ms: i64,
) -> i64 {
    let key = match direction {
        Direction::Map => KEY_DURATION_IN,
        Direction::Unmap => KEY_DURATION_OUT,
    };
    settings.get_int(transition, key, default_ms)
}

/// Convert a millisecond parameter, falling back to `default` when it does
/// not fit a [`Duration`].
fn millis(key: &str, value: f64, default: f64) -> Duration {
    match Duration::try_from_secs_f64(value.max(0.0) / 1000.0) {
        Ok(duration) => duration,
        Err(e) => {
            log_warning!("Ignoring {TRANSITION_ROTATE}::{key} = {value} ({e}), using {default} ms");
            Duration::try_from_secs_f64(default / 1000.0).unwrap_or_default()
        }
    }
}

/// Flag the endpoints, draw the first frame and start the timeline.
fn launch_session(
    backend: &mut dyn Compositor,
    arena: &mut EffectArena,
    clock: &dyn TimeSource,
    mut session: EffectSession,
    mut timeline: Timeline,
) -> EffectId {
    for client in [session.primary_client(), session.secondary_client()]
        .into_iter()
        .flatten()
    {
        backend.set_client_flags(client, session.flags);
    }

    // Draw frame zero now so the pre-effect state never flashes
    frames::apply(backend, &session, Frame::new(0, timeline.n_frames()));
    timeline.start(clock.now());
    session.timeline = Some(timeline);

    let kind = session.kind;
    let direction = session.direction;
    let id = arena.insert(backend, session);
    log_debug!("Started {kind} {direction} as {id}");
    id
}

/// Rotation host backed by the compositor and the effect arena.
struct RotationContext<'a> {
    backend: &'a mut dyn Compositor,
    settings: &'a mut dyn ParamSource,
    arena: &'a mut EffectArena,
    clock: &'a dyn TimeSource,
}

impl RotationHost for RotationContext<'_> {
    fn fade_and_rotate(&mut self, first_part: bool, goto_portrait: bool) {
        // Tilt away while fading out, tilt back in while fading in
        let direction = if first_part {
            Direction::Map
        } else {
            Direction::Unmap
        };
        let duration = duration_for(
            &mut *self.settings,
            TRANSITION_ROTATE,
            direction,
            DEFAULT_ROTATE_DURATION,
        );

        let mut session = EffectSession::new(EffectKind::RotateScreen, direction);
        session.counts_as_running = false;
        session.continuation = Continuation::RotationStep;

        let angle = self
            .settings
            .get_double(TRANSITION_ROTATE, KEY_ANGLE, DEFAULT_ROTATE_ANGLE) as f32;
        // Rotate backwards on the way back to landscape
        session.angle = if first_part == goto_portrait { -angle } else { angle };

        let (screen_width, screen_height) = self.backend.screen_size();
        session.auxiliary[0] = self.backend.create_rectangle(Color::BLACK);
        if let Some(dimmer) = session.auxiliary[0] {
            self.backend
                .set_size(dimmer, screen_width as f32, screen_height as f32);
            self.backend.add_to(Container::Stage, dimmer);
            self.backend.show(dimmer);
        }

        if !goto_portrait && first_part {
            // Home applets are not repositioned, so hide the landscape-only strip
            session.auxiliary[1] = self.backend.create_rectangle(Color::BLACK);
            if let Some(mask) = session.auxiliary[1] {
                let root = self.backend.render_root();
                self.backend.set_position(mask, LANDSCAPE_HEIGHT as f32, 0.0);
                self.backend.set_size(
                    mask,
                    (LANDSCAPE_WIDTH - LANDSCAPE_HEIGHT) as f32,
                    LANDSCAPE_HEIGHT as f32,
                );
                self.backend.add_to(Container::Node(root), mask);
                self.backend.show(mask);
            }
        }

        launch_session(
            &mut *self.backend,
            &mut *self.arena,
            self.clock,
            session,
            Timeline::new(duration),
        );
    }

    fn complete_parked(&mut self, id: EffectId) {
        if self.arena.complete(&mut *self.backend, id).is_some() {
            log_debug!("Released parked {id}");
        }
    }

    fn set_ui_state(&mut self, state: UiState) {
        self.backend.set_ui_state(state);
    }

    fn hide_scene(&mut self) {
        let root = self.backend.render_root();
        self.backend.hide(root);
    }

    fn show_scene(&mut self) {
        let root = self.backend.render_root();
        self.backend.show(root);
    }

    fn change_orientation(&mut self, portrait: bool) {
        self.backend.request_orientation(portrait);
    }

    fn restack(&mut self) {
        self.backend.restack();
    }

    fn is_portrait(&self) -> bool {
        self.backend.is_portrait()
    }

    fn damage_timeout(&mut self) -> Duration {
        let value = self
            .settings
            .get_double(TRANSITION_ROTATE, KEY_DAMAGE_TIMEOUT, DEFAULT_DAMAGE_TIMEOUT);
        millis(KEY_DAMAGE_TIMEOUT, value, DEFAULT_DAMAGE_TIMEOUT)
    }

    fn damage_timeout_max(&mut self) -> Duration {
        let value = self
            .settings
            .get_double(TRANSITION_ROTATE, KEY_DAMAGE_TIMEOUT_MAX, DEFAULT_DAMAGE_TIMEOUT_MAX);
        millis(KEY_DAMAGE_TIMEOUT_MAX, value, DEFAULT_DAMAGE_TIMEOUT_MAX)
    }

    fn now(&self) -> Duration {
        self.clock.now()
    }
}
