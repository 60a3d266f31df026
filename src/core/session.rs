//! Effect sessions and the arena that owns them.
//!
//! A session bundles everything one animated effect holds on to: the clients
//! and nodes it animates, a geometry snapshot, its timeline and any
//! decorative nodes it created. Sessions live in an [`EffectArena`] and are
//! addressed by generational [`EffectId`]s, so a stale id can never reach a
//! recycled slot.
//!
//! The arena also keeps the "current effect" association from a client to the
//! session animating it, and counts running sessions so the render manager can
//! be told when the last one ends.
//!
//! Every reference a session takes is released in [`EffectArena::complete`],
//! which can run only once per session because it removes the session from
//! the arena.

use std::collections::HashMap;
use std::fmt;

use crate::backend::{ClientFlags, ClientId, Compositor, Geometry, NodeId};
use crate::common::constants::AUX_SLOTS;
use crate::core::timeline::Timeline;

/// Stable handle of a session in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId {
    index: u32,
    generation: u32,
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Popup,
    Fade,
    Close,
    /// Close of a window that vanished while the screen was forced to an orientation
    CloseBeforeRotate,
    Notification,
    Subview,
    RotateScreen,
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EffectKind::Popup => "popup",
            EffectKind::Fade => "fade",
            EffectKind::Close => "close",
            EffectKind::CloseBeforeRotate => "close-before-rotate",
            EffectKind::Notification => "notification",
            EffectKind::Subview => "subview",
            EffectKind::RotateScreen => "rotate",
        };
        write!(f, "{name}")
    }
}

/// Whether the effect shows or removes its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Map,
    Unmap,
}

impl Direction {
    /// Progress as seen by the easing curve: unmap runs time-reversed.
    pub fn apply(self, progress: f32) -> f32 {
        match self {
            Direction::Map => progress,
            Direction::Unmap => 1.0 - progress,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Map => write!(f, "map"),
            Direction::Unmap => write!(f, "unmap"),
        }
    }
}

/// What to do after a session completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Continuation {
    #[default]
    None,
    /// Advance the orientation rotation state machine
    RotationStep,
}

/// A client animated by a session, with the node that draws it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub client: ClientId,
    pub actor: Option<NodeId>,
}

impl Endpoint {
    /// Take references on `client` and its actor.
    pub fn acquire(backend: &mut dyn Compositor, client: ClientId) -> Self {
        backend.acquire_client(client);
        let actor = backend.client_actor(client);
        if let Some(actor) = actor {
            backend.acquire_node(actor);
        }
        Self { client, actor }
    }

    /// Take references on a known actor without asking the client for it.
    pub fn acquire_with_actor(
        backend: &mut dyn Compositor,
        client: ClientId,
        actor: NodeId,
    ) -> Self {
        backend.acquire_client(client);
        backend.acquire_node(actor);
        Self {
            client,
            actor: Some(actor),
        }
    }
}

/// State of one in-flight effect.
#[derive(Debug, Clone)]
pub struct EffectSession {
    pub kind: EffectKind,
    pub direction: Direction,
    /// `None` for parked sessions, which never animate
    pub timeline: Option<Timeline>,
    /// The animated client (the incoming view for subview effects)
    pub primary: Option<Endpoint>,
    /// The other side of a subview effect
    pub secondary: Option<Endpoint>,
    /// Geometry captured at start, in the current screen frame
    pub geometry: Geometry,
    /// Rotation effects only
    pub angle: f32,
    /// Decorative nodes created for this effect, each holding one reference
    pub auxiliary: [Option<NodeId>; AUX_SLOTS],
    /// Screen size the geometry snapshot refers to, for effects that must
    /// follow an orientation change
    pub screen_size: Option<(u32, u32)>,
    /// Flags set on the endpoint clients
    pub flags: ClientFlags,
    /// Whether the session counts toward the render manager's effect-running signal
    pub counts_as_running: bool,
    pub continuation: Continuation,
}

impl EffectSession {
    pub fn new(kind: EffectKind, direction: Direction) -> Self {
        Self {
            kind,
            direction,
            timeline: None,
            primary: None,
            secondary: None,
            geometry: Geometry::default(),
            angle: 0.0,
            auxiliary: [None; AUX_SLOTS],
            screen_size: None,
            flags: ClientFlags::EFFECT,
            counts_as_running: true,
            continuation: Continuation::None,
        }
    }

    pub fn primary_actor(&self) -> Option<NodeId> {
        self.primary.and_then(|endpoint| endpoint.actor)
    }

    pub fn secondary_actor(&self) -> Option<NodeId> {
        self.secondary.and_then(|endpoint| endpoint.actor)
    }

    pub fn primary_client(&self) -> Option<ClientId> {
        self.primary.map(|endpoint| endpoint.client)
    }

    pub fn secondary_client(&self) -> Option<ClientId> {
        self.secondary.map(|endpoint| endpoint.client)
    }

    /// Whether the session waits to be completed by someone else.
    pub fn is_parked(&self) -> bool {
        self.timeline.is_none()
    }

    fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.primary_client()
            .into_iter()
            .chain(self.secondary_client())
    }
}

/// Which endpoint of a session to splice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSlot {
    Primary,
    Secondary,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    session: Option<EffectSession>,
}

/// Owner of every live effect session.
#[derive(Debug, Default)]
pub struct EffectArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    current: HashMap<ClientId, EffectId>,
    running: usize,
}

impl EffectArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `session` and register it as the current effect of
    /// its endpoint clients.
    pub fn insert(&mut self, backend: &mut dyn Compositor, session: EffectSession) -> EffectId {
        let counts_as_running = session.counts_as_running;
        let clients: Vec<ClientId> = session.clients().collect();

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.session = Some(session);
                EffectId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    session: Some(session),
                });
                EffectId {
                    index,
                    generation: 0,
                }
            }
        };

        for client in clients {
            self.current.insert(client, id);
        }

        if counts_as_running {
            self.running += 1;
            if self.running == 1 {
                backend.set_effect_running(true);
            }
        }
        id
    }

    pub fn get(&self, id: EffectId) -> Option<&EffectSession> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.session.as_ref())
    }

    pub fn get_mut(&mut self, id: EffectId) -> Option<&mut EffectSession> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.session.as_mut())
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.get(id).is_some()
    }

    /// Ids of every live session, oldest slot first.
    pub fn ids(&self) -> Vec<EffectId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.session.is_some())
            .map(|(index, slot)| EffectId {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.session.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sessions counting toward the effect-running signal.
    pub fn running_count(&self) -> usize {
        self.running
    }

    /// Session currently animating `client`.
    pub fn current_effect(&self, client: ClientId) -> Option<EffectId> {
        self.current
            .get(&client)
            .copied()
            .filter(|&id| self.contains(id))
    }

    /// Whether a newer session has taken over a client `id` animates.
    pub fn is_superseded(&self, id: EffectId) -> bool {
        self.get(id).is_some_and(|session| {
            session
                .clients()
                .any(|client| self.current.get(&client) != Some(&id))
        })
    }

    /// Forget `id` as the current effect of `client`. Returns `false` when a
    /// newer session has taken the client over, in which case the node and
    /// its flags belong to that session.
    fn clear_current(&mut self, client: ClientId, id: EffectId) -> bool {
        if self.current.get(&client) == Some(&id) {
            self.current.remove(&client);
            true
        } else {
            false
        }
    }

    /// Swap one endpoint of a running session for `client`, keeping its timeline.
    ///
    /// The old endpoint's node is hidden and reset, its flags are cleared and
    /// its references dropped; the new endpoint is referenced and flagged.
    pub fn splice(
        &mut self,
        backend: &mut dyn Compositor,
        id: EffectId,
        slot: EndpointSlot,
        client: ClientId,
    ) -> bool {
        let Some(session) = self.get_mut(id) else {
            return false;
        };
        let flags = session.flags;
        let endpoint = match slot {
            EndpointSlot::Primary => &mut session.primary,
            EndpointSlot::Secondary => &mut session.secondary,
        };

        let old = endpoint.take();
        *endpoint = Some(Endpoint::acquire(backend, client));
        backend.set_client_flags(client, flags);

        if let Some(old) = old {
            let owned = self.clear_current(old.client, id);
            if let Some(actor) = old.actor {
                if owned {
                    backend.hide(actor);
                    backend.set_anchor(actor, 0.0, 0.0);
                }
                backend.release_node(actor);
            }
            if owned {
                backend.unset_client_flags(old.client, ClientFlags::EFFECT);
            }
            backend.release_client(old.client);
        }

        self.current.insert(client, id);
        true
    }

    /// Tear down a session and release everything it holds.
    ///
    /// Returns the session (with its references already dropped) so the
    /// caller can act on its continuation, or `None` if it was already
    /// completed.
    pub fn complete(
        &mut self,
        backend: &mut dyn Compositor,
        id: EffectId,
    ) -> Option<EffectSession> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let mut session = slot.session.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        if let Some(primary) = session.primary {
            let owned = self.clear_current(primary.client, id);
            if owned {
                backend.unset_client_flags(primary.client, ClientFlags::EFFECT);
            }
            backend.release_client(primary.client);
            if let Some(actor) = primary.actor {
                if owned
                    && session.direction == Direction::Unmap
                    && backend.parent_of(actor).is_some()
                {
                    backend.remove_from_parent(actor);
                }
                backend.release_node(actor);
            }
        }

        if let Some(secondary) = session.secondary {
            if self.clear_current(secondary.client, id) {
                backend.unset_client_flags(secondary.client, ClientFlags::EFFECT);
            }
            backend.release_client(secondary.client);
            if let Some(actor) = secondary.actor {
                backend.release_node(actor);
            }
        }

        for node in session.auxiliary.iter_mut().filter_map(Option::take) {
            if backend.parent_of(node).is_some() {
                backend.remove_from_parent(node);
            }
            backend.release_node(node);
        }

        session.timeline = None;

        if session.counts_as_running {
            self.running = self.running.saturating_sub(1);
            if self.running == 0 {
                backend.set_effect_running(false);
            }
        }

        Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ClientKind, Container, HeadlessCompositor};

    fn fade_session(wm: &mut HeadlessCompositor, client: ClientId) -> EffectSession {
        let mut session = EffectSession::new(EffectKind::Fade, Direction::Unmap);
        session.primary = Some(Endpoint::acquire(wm, client));
        wm.set_client_flags(client, session.flags);
        session
    }

    #[test]
    fn test_complete_releases_everything_once() {
        let mut wm = HeadlessCompositor::default();
        let client = wm.add_client(ClientKind::App, Geometry::new(0, 0, 100, 100));
        let mut arena = EffectArena::new();

        let mut session = fade_session(&mut wm, client);
        let spark = wm.create_particle().unwrap();
        wm.add_to(Container::FrontGroup, spark);
        session.auxiliary[3] = Some(spark);

        let id = arena.insert(&mut wm, session);
        assert_eq!(arena.current_effect(client), Some(id));
        assert!(wm.effect_running());

        let done = arena.complete(&mut wm, id).unwrap();
        assert!(done.auxiliary.iter().all(Option::is_none));
        assert!(arena.complete(&mut wm, id).is_none());

        assert_eq!(wm.outstanding_node_refs(), 0);
        assert_eq!(wm.outstanding_client_refs(), 0);
        assert_eq!(wm.client_flags(client), ClientFlags::NONE);
        assert_eq!(wm.parent_of(spark), None);
        assert_eq!(arena.current_effect(client), None);
        assert!(!wm.effect_running());
    }

    #[test]
    fn test_unmap_completion_detaches_actor() {
        let mut wm = HeadlessCompositor::default();
        let client = wm.add_client(ClientKind::App, Geometry::new(0, 0, 100, 100));
        let actor = wm.client_actor(client).unwrap();
        let mut arena = EffectArena::new();

        let session = fade_session(&mut wm, client);
        let id = arena.insert(&mut wm, session);
        arena.complete(&mut wm, id);

        assert_eq!(wm.parent_of(actor), None);
    }

    #[test]
    fn test_superseded_session_leaves_client_to_newer_one() {
        let mut wm = HeadlessCompositor::default();
        let client = wm.add_client(ClientKind::App, Geometry::new(0, 0, 100, 100));
        let actor = wm.client_actor(client).unwrap();
        let root = wm.render_root();
        let mut arena = EffectArena::new();

        let unmap = fade_session(&mut wm, client);
        let older = arena.insert(&mut wm, unmap);
        let mut map = EffectSession::new(EffectKind::Fade, Direction::Map);
        map.primary = Some(Endpoint::acquire(&mut wm, client));
        let newer = arena.insert(&mut wm, map);
        assert!(arena.is_superseded(older));
        assert!(!arena.is_superseded(newer));

        arena.complete(&mut wm, older);
        assert_eq!(arena.current_effect(client), Some(newer));
        assert!(wm.client_flags(client).contains(ClientFlags::EFFECT));
        assert_eq!(wm.parent_of(actor), Some(Container::Node(root)));

        arena.complete(&mut wm, newer);
        assert_eq!(wm.client_flags(client), ClientFlags::NONE);
        assert_eq!(wm.parent_of(actor), Some(Container::Node(root)));
        assert_eq!(wm.outstanding_node_refs(), 0);
        assert_eq!(wm.outstanding_client_refs(), 0);
    }

    #[test]
    fn test_stale_ids_do_not_reach_recycled_slots() {
        let mut wm = HeadlessCompositor::default();
        let mut arena = EffectArena::new();

        let first = arena.insert(&mut wm, EffectSession::new(EffectKind::Fade, Direction::Map));
        arena.complete(&mut wm, first);
        let second = arena.insert(&mut wm, EffectSession::new(EffectKind::Popup, Direction::Map));

        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second).unwrap().kind, EffectKind::Popup);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_running_signal_follows_last_session() {
        let mut wm = HeadlessCompositor::default();
        let mut arena = EffectArena::new();

        let a = arena.insert(&mut wm, EffectSession::new(EffectKind::Fade, Direction::Map));
        let b = arena.insert(&mut wm, EffectSession::new(EffectKind::Fade, Direction::Map));
        let mut rotation = EffectSession::new(EffectKind::RotateScreen, Direction::Map);
        rotation.counts_as_running = false;
        let r = arena.insert(&mut wm, rotation);
        assert_eq!(arena.running_count(), 2);

        arena.complete(&mut wm, a);
        assert!(wm.effect_running());
        arena.complete(&mut wm, r);
        assert!(wm.effect_running());
        arena.complete(&mut wm, b);
        assert!(!wm.effect_running());
        assert_eq!(wm.effect_running_signals(), &[true, false]);
    }

    #[test]
    fn test_splice_moves_references_and_flags() {
        let mut wm = HeadlessCompositor::default();
        let old = wm.add_client(ClientKind::App, Geometry::new(0, 0, 800, 480));
        let new = wm.add_client(ClientKind::App, Geometry::new(0, 0, 800, 480));
        let old_actor = wm.client_actor(old).unwrap();
        let mut arena = EffectArena::new();

        let mut session = EffectSession::new(EffectKind::Subview, Direction::Map);
        session.primary = Some(Endpoint::acquire(&mut wm, old));
        wm.set_client_flags(old, session.flags);
        wm.set_anchor(old_actor, -300.0, 0.0);
        let id = arena.insert(&mut wm, session);

        assert!(arena.splice(&mut wm, id, EndpointSlot::Primary, new));

        assert_eq!(arena.get(id).unwrap().primary_client(), Some(new));
        assert_eq!(arena.current_effect(old), None);
        assert_eq!(arena.current_effect(new), Some(id));
        assert!(wm.client_flags(new).contains(ClientFlags::EFFECT));
        assert!(wm.client_flags(old).is_empty());
        assert!(!wm.is_visible(old_actor));
        assert_eq!(wm.node(old_actor).unwrap().anchor, (0.0, 0.0));
        assert_eq!(wm.node(old_actor).unwrap().refs, 0);

        arena.complete(&mut wm, id);
        assert_eq!(wm.outstanding_node_refs(), 0);
        assert_eq!(wm.outstanding_client_refs(), 0);
    }
}
