//! In-memory compositor that records everything the engine does.
//!
//! There is no rendering. Every node keeps the last value set for each
//! property, and every reference taken or dropped by the engine is counted so
//! callers can verify that effects leave nothing behind.

use std::collections::{BTreeMap, HashMap};

use super::{
    ClientFlags, ClientId, ClientKind, Color, Compositor, Container, Geometry, NodeId,
    RotationAxis, UiState,
};
use crate::common::constants::{LANDSCAPE_HEIGHT, LANDSCAPE_WIDTH};

/// What a node was created as.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Drawn by a client window
    Actor,
    /// The render root group
    Group,
    Rectangle(Color),
    Particle,
    TitleBar,
}

/// Last applied state of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub kind: NodeKind,
    /// Cleared by [`HeadlessCompositor::destroy_node`]
    pub valid: bool,
    pub parent: Option<Container>,
    pub position: (f32, f32),
    pub size: (f32, f32),
    pub opacity: u8,
    pub scale: (f32, f32),
    pub anchor: (f32, f32),
    /// Axis, degrees and rotation centre
    pub rotation: Option<(RotationAxis, f32, f32, f32)>,
    pub depth: f32,
    pub visible: bool,
    /// References currently held by the engine
    pub refs: i64,
}

impl NodeState {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            valid: true,
            parent: None,
            position: (0.0, 0.0),
            size: (0.0, 0.0),
            opacity: 255,
            scale: (1.0, 1.0),
            anchor: (0.0, 0.0),
            rotation: None,
            depth: 0.0,
            visible: false,
            refs: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct ClientState {
    actor: Option<NodeId>,
    kind: ClientKind,
    stack_index: u32,
    leader: bool,
    flags: ClientFlags,
    refs: i64,
}

/// Headless [`Compositor`] for tests and simulations.
pub struct HeadlessCompositor {
    nodes: BTreeMap<NodeId, NodeState>,
    children: HashMap<Container, Vec<NodeId>>,
    clients: BTreeMap<ClientId, ClientState>,
    next_node: u32,
    next_client: u32,
    render_root: NodeId,
    screen: (u32, u32),
    ui_state: UiState,
    background: Color,
    /// Swap the screen size as soon as an orientation is requested
    follow_orientation_requests: bool,
    /// Make every `create_*` call fail
    fail_creation: bool,
    orientation_requests: Vec<bool>,
    restacks: u32,
    effect_running: bool,
    effect_running_signals: Vec<bool>,
    node_acquires: u64,
    node_releases: u64,
    client_acquires: u64,
    client_releases: u64,
}

impl HeadlessCompositor {
    /// A landscape screen of the given size, showing an application.
    pub fn new(width: u32, height: u32) -> Self {
        let mut compositor = Self {
            nodes: BTreeMap::new(),
            children: HashMap::new(),
            clients: BTreeMap::new(),
            next_node: 1,
            next_client: 1,
            render_root: NodeId(0),
            screen: (width, height),
            ui_state: UiState::App,
            background: Color::rgba(0x20, 0x20, 0x20, 0xff),
            follow_orientation_requests: true,
            fail_creation: false,
            orientation_requests: Vec::new(),
            restacks: 0,
            effect_running: false,
            effect_running_signals: Vec::new(),
            node_acquires: 0,
            node_releases: 0,
            client_acquires: 0,
            client_releases: 0,
        };

        let root = compositor.alloc_node(NodeKind::Group);
        compositor.render_root = root;
        compositor.add_to(Container::Stage, root);
        if let Some(state) = compositor.nodes.get_mut(&root) {
            state.size = (width as f32, height as f32);
            state.visible = true;
        }
        compositor
    }

    fn alloc_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, NodeState::new(kind));
        id
    }

    /// Create a node owned by the engine (one reference held).
    fn create_owned(&mut self, kind: NodeKind) -> Option<NodeId> {
        if self.fail_creation {
            return None;
        }
        let id = self.alloc_node(kind);
        if let Some(state) = self.nodes.get_mut(&id) {
            state.refs = 1;
        }
        self.node_acquires += 1;
        Some(id)
    }

    fn live_node(&mut self, node: NodeId) -> Option<&mut NodeState> {
        self.nodes.get_mut(&node).filter(|state| state.valid)
    }

    // # Scenario setup

    /// Map a new client window with a visible actor placed in the render root.
    pub fn add_client(&mut self, kind: ClientKind, geometry: Geometry) -> ClientId {
        let actor = self.alloc_node(NodeKind::Actor);
        if let Some(state) = self.nodes.get_mut(&actor) {
            state.position = (geometry.x as f32, geometry.y as f32);
            state.size = (geometry.width as f32, geometry.height as f32);
            state.visible = true;
        }
        let root = self.render_root;
        self.add_to(Container::Node(root), actor);
        self.insert_client(kind, Some(actor))
    }

    /// Add a client that has no actor.
    pub fn add_client_without_actor(&mut self, kind: ClientKind) -> ClientId {
        self.insert_client(kind, None)
    }

    fn insert_client(&mut self, kind: ClientKind, actor: Option<NodeId>) -> ClientId {
        let id = ClientId(self.next_client);
        self.next_client += 1;
        self.clients.insert(
            id,
            ClientState {
                actor,
                kind,
                stack_index: 0,
                leader: true,
                flags: ClientFlags::NONE,
                refs: 0,
            },
        );
        id
    }

    /// Place a client in its application's window stack.
    pub fn set_client_stacking(&mut self, client: ClientId, stack_index: u32, leader: bool) {
        if let Some(state) = self.clients.get_mut(&client) {
            state.stack_index = stack_index;
            state.leader = leader;
        }
    }

    /// Destroy a node behind the engine's back.
    #[cfg(any(test, feature = "testing-support"))]
    pub fn destroy_node(&mut self, node: NodeId) {
        self.remove_from_parent(node);
        if let Some(state) = self.nodes.get_mut(&node) {
            state.valid = false;
        }
    }

    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.screen = (width, height);
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background = color;
    }

    /// Whether `request_orientation` flips the screen size immediately.
    pub fn set_follow_orientation_requests(&mut self, follow: bool) {
        self.follow_orientation_requests = follow;
    }

    /// Make node creation fail, as when textures cannot be loaded.
    #[cfg(any(test, feature = "testing-support"))]
    pub fn set_fail_creation(&mut self, fail: bool) {
        self.fail_creation = fail;
    }

    // # Inspection

    pub fn node(&self, node: NodeId) -> Option<&NodeState> {
        self.nodes.get(&node)
    }

    /// Children of `container`, bottom first.
    pub fn children(&self, container: Container) -> &[NodeId] {
        self.children
            .get(&container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// References the engine currently holds on nodes.
    pub fn outstanding_node_refs(&self) -> i64 {
        self.nodes.values().map(|state| state.refs).sum()
    }

    /// References the engine currently holds on clients.
    pub fn outstanding_client_refs(&self) -> i64 {
        self.clients.values().map(|state| state.refs).sum()
    }

    pub fn node_acquires(&self) -> u64 {
        self.node_acquires
    }

    pub fn node_releases(&self) -> u64 {
        self.node_releases
    }

    pub fn client_acquires(&self) -> u64 {
        self.client_acquires
    }

    pub fn client_releases(&self) -> u64 {
        self.client_releases
    }

    /// Orientations requested so far (`true` is portrait).
    pub fn orientation_requests(&self) -> &[bool] {
        &self.orientation_requests
    }

    pub fn restack_count(&self) -> u32 {
        self.restacks
    }

    /// Last value passed to `set_effect_running`.
    pub fn effect_running(&self) -> bool {
        self.effect_running
    }

    /// Every value passed to `set_effect_running`, in order.
    pub fn effect_running_signals(&self) -> &[bool] {
        &self.effect_running_signals
    }
}

impl Default for HeadlessCompositor {
    fn default() -> Self {
        Self::new(LANDSCAPE_WIDTH, LANDSCAPE_HEIGHT)
    }
}

impl Compositor for HeadlessCompositor {
    fn node_is_valid(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|state| state.valid)
    }

    fn acquire_node(&mut self, node: NodeId) {
        if let Some(state) = self.nodes.get_mut(&node) {
            state.refs += 1;
            self.node_acquires += 1;
        }
    }

    fn release_node(&mut self, node: NodeId) {
        if let Some(state) = self.nodes.get_mut(&node) {
            state.refs -= 1;
            self.node_releases += 1;
        }
    }

    fn create_rectangle(&mut self, color: Color) -> Option<NodeId> {
        self.create_owned(NodeKind::Rectangle(color))
    }

    fn create_particle(&mut self) -> Option<NodeId> {
        let id = self.create_owned(NodeKind::Particle)?;
        if let Some(state) = self.nodes.get_mut(&id) {
            state.size = (16.0, 16.0);
            state.visible = true;
        }
        Some(id)
    }

    fn create_fake_title_bar(&mut self, height: u32) -> Option<NodeId> {
        let id = self.create_owned(NodeKind::TitleBar)?;
        let width = self.screen.0.max(self.screen.1);
        if let Some(state) = self.nodes.get_mut(&id) {
            state.size = (width as f32, height as f32);
            state.visible = true;
        }
        Some(id)
    }

    fn render_root(&self) -> NodeId {
        self.render_root
    }

    fn parent_of(&self, node: NodeId) -> Option<Container> {
        self.nodes.get(&node).and_then(|state| state.parent)
    }

    fn add_to(&mut self, container: Container, node: NodeId) {
        if self.parent_of(node).is_some() {
            self.remove_from_parent(node);
        }
        let Some(state) = self.nodes.get_mut(&node) else {
            return;
        };
        state.parent = Some(container);
        self.children.entry(container).or_default().push(node);
    }

    fn remove_from_parent(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get_mut(&node).and_then(|state| state.parent.take()) else {
            return;
        };
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|&child| child != node);
        }
    }

    fn reparent(&mut self, node: NodeId, container: Container) {
        self.remove_from_parent(node);
        self.add_to(container, node);
    }

    fn geometry(&self, node: NodeId) -> Geometry {
        self.nodes
            .get(&node)
            .map(|state| Geometry {
                x: state.position.0.round() as i32,
                y: state.position.1.round() as i32,
                width: state.size.0.max(0.0).round() as u32,
                height: state.size.1.max(0.0).round() as u32,
            })
            .unwrap_or_default()
    }

    fn set_position(&mut self, node: NodeId, x: f32, y: f32) {
        if let Some(state) = self.live_node(node) {
            state.position = (x, y);
        }
    }

    fn set_size(&mut self, node: NodeId, width: f32, height: f32) {
        if let Some(state) = self.live_node(node) {
            state.size = (width, height);
        }
    }

    fn set_opacity(&mut self, node: NodeId, opacity: u8) {
        if let Some(state) = self.live_node(node) {
            state.opacity = opacity;
        }
    }

    fn set_scale(&mut self, node: NodeId, scale_x: f32, scale_y: f32) {
        if let Some(state) = self.live_node(node) {
            state.scale = (scale_x, scale_y);
        }
    }

    fn set_anchor(&mut self, node: NodeId, x: f32, y: f32) {
        if let Some(state) = self.live_node(node) {
            state.anchor = (x, y);
        }
    }

    fn set_rotation(
        &mut self,
        node: NodeId,
        axis: RotationAxis,
        degrees: f32,
        center_x: f32,
        center_y: f32,
    ) {
        if let Some(state) = self.live_node(node) {
            state.rotation = Some((axis, degrees, center_x, center_y));
        }
    }

    fn set_depth(&mut self, node: NodeId, depth: f32) {
        if let Some(state) = self.live_node(node) {
            state.depth = depth;
        }
    }

    fn show(&mut self, node: NodeId) {
        if let Some(state) = self.live_node(node) {
            state.visible = true;
        }
    }

    fn hide(&mut self, node: NodeId) {
        if let Some(state) = self.live_node(node) {
            state.visible = false;
        }
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|state| state.valid && state.visible)
    }

    fn raise_top(&mut self, node: NodeId) {
        let Some(parent) = self.parent_of(node) else {
            return;
        };
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|&child| child != node);
            siblings.push(node);
        }
    }

    fn lower_bottom(&mut self, node: NodeId) {
        let Some(parent) = self.parent_of(node) else {
            return;
        };
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|&child| child != node);
            siblings.insert(0, node);
        }
    }

    fn move_anchor_to_center(&mut self, node: NodeId) {
        if let Some(state) = self.live_node(node) {
            let anchor = (state.size.0 / 2.0, state.size.1 / 2.0);
            state.position.0 += anchor.0 - state.anchor.0;
            state.position.1 += anchor.1 - state.anchor.1;
            state.anchor = anchor;
        }
    }

    fn set_anchor_to_center(&mut self, node: NodeId) {
        if let Some(state) = self.live_node(node) {
            state.anchor = (state.size.0 / 2.0, state.size.1 / 2.0);
        }
    }

    fn acquire_client(&mut self, client: ClientId) {
        if let Some(state) = self.clients.get_mut(&client) {
            state.refs += 1;
            self.client_acquires += 1;
        }
    }

    fn release_client(&mut self, client: ClientId) {
        if let Some(state) = self.clients.get_mut(&client) {
            state.refs -= 1;
            self.client_releases += 1;
        }
    }

    fn client_actor(&self, client: ClientId) -> Option<NodeId> {
        self.clients.get(&client).and_then(|state| state.actor)
    }

    fn client_kind(&self, client: ClientId) -> ClientKind {
        self.clients
            .get(&client)
            .map_or(ClientKind::Other, |state| state.kind)
    }

    fn client_stack_index(&self, client: ClientId) -> u32 {
        self.clients
            .get(&client)
            .map_or(0, |state| state.stack_index)
    }

    fn client_is_leader(&self, client: ClientId) -> bool {
        self.clients.get(&client).is_some_and(|state| state.leader)
    }

    fn client_flags(&self, client: ClientId) -> ClientFlags {
        self.clients
            .get(&client)
            .map_or(ClientFlags::NONE, |state| state.flags)
    }

    fn set_client_flags(&mut self, client: ClientId, flags: ClientFlags) {
        if let Some(state) = self.clients.get_mut(&client) {
            state.flags.insert(flags);
        }
    }

    fn unset_client_flags(&mut self, client: ClientId, flags: ClientFlags) {
        if let Some(state) = self.clients.get_mut(&client) {
            state.flags.remove(flags);
        }
    }

    fn client_for_node(&self, node: NodeId) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, state)| state.actor == Some(node))
            .map(|(&id, _)| id)
    }

    fn ui_state(&self) -> UiState {
        self.ui_state
    }

    fn set_ui_state(&mut self, state: UiState) {
        self.ui_state = state;
    }

    fn restack(&mut self) {
        self.restacks += 1;
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }

    fn request_orientation(&mut self, portrait: bool) {
        self.orientation_requests.push(portrait);
        if self.follow_orientation_requests && portrait != self.is_portrait() {
            self.screen = (self.screen.1, self.screen.0);
        }
    }

    fn background_color(&self) -> Color {
        self.background
    }

    fn set_effect_running(&mut self, running: bool) {
        self.effect_running = running;
        self.effect_running_signals.push(running);
    }
}
