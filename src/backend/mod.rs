//! Collaborator interface between the transition engine and the compositor.
//!
//! The engine never owns scene nodes or window clients. It drives them through
//! the [`Compositor`] trait, which bundles the three services an effect needs:
//!
//! - **Scene graph**: create, reference, reparent and mutate visual nodes
//! - **Window model**: introspect clients (kind, stacking, flags) and map
//!   between a client and the node that draws it
//! - **Render manager**: the current UI state, the screen size, the hardware
//!   orientation request and the process-wide "effect running" signal
//!
//! A window manager plugs in by implementing the trait; [`headless`] provides
//! an in-memory implementation used by the tests and the `simulate` command.
//!
//! ## Reference counting
//!
//! Every `acquire_*` call made by the engine is paired with exactly one
//! `release_*` call. Nodes returned by the `create_*` methods arrive with one
//! reference already held by the caller.

pub mod headless;

use std::fmt;
use std::ops::BitOr;

pub use headless::HeadlessCompositor;

/// Handle of a visual node in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Handle of a window-manager client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Position and size of a node, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre point, rounded towards the origin.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }
}

/// RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0x00, 0x00, 0x00, 0xff);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAxis {
    X,
    Y,
    Z,
}

/// Where a node can be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// Top-level stage, above everything the render manager draws
    Stage,
    /// Group that stays visible across view switches
    FrontGroup,
    /// Any other node acting as a group (including the render root)
    Node(NodeId),
}

/// Window type of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    App,
    Menu,
    Notification,
    Dialog,
    Other,
}

/// Compositor-side flags on a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ClientFlags(u8);

impl ClientFlags {
    pub const NONE: ClientFlags = ClientFlags(0);
    /// The compositor must not update the node from the window's contents
    pub const DONT_UPDATE: ClientFlags = ClientFlags(1 << 0);
    /// The compositor must not show the node
    pub const DONT_SHOW: ClientFlags = ClientFlags(1 << 1);
    /// An effect is animating the node
    pub const EFFECT_RUNNING: ClientFlags = ClientFlags(1 << 2);

    /// Flags every effect session sets on the clients it animates.
    pub const EFFECT: ClientFlags = ClientFlags(Self::DONT_UPDATE.0 | Self::EFFECT_RUNNING.0);

    pub fn contains(self, other: ClientFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: ClientFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: ClientFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ClientFlags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ClientFlags {
    type Output = ClientFlags;

    fn bitor(self, rhs: ClientFlags) -> ClientFlags {
        ClientFlags(self.0 | rhs.0)
    }
}

/// Application-level UI state owned by the render manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiState {
    #[default]
    Undefined,
    Home,
    HomeEdit,
    HomePortrait,
    App,
    AppPortrait,
    TaskNav,
    Launcher,
    Loading,
    LoadingSubwin,
    NonComposited,
    NonCompositedPortrait,
}

impl UiState {
    /// States that are laid out for a portrait screen.
    pub fn is_portrait(self) -> bool {
        matches!(
            self,
            UiState::HomePortrait | UiState::AppPortrait | UiState::NonCompositedPortrait
        )
    }

    /// Landscape states that can be shown on a portrait screen.
    pub fn is_portrait_capable(self) -> bool {
        matches!(
            self,
            UiState::App | UiState::NonComposited | UiState::Loading | UiState::LoadingSubwin
        )
    }

    /// States in which an application window is in front.
    pub fn is_app(self) -> bool {
        matches!(
            self,
            UiState::App
                | UiState::AppPortrait
                | UiState::NonComposited
                | UiState::NonCompositedPortrait
                | UiState::LoadingSubwin
        )
    }

    /// Whether switching to this state is compatible with the screen
    /// orientation being entered.
    pub fn suits_orientation(self, portrait: bool) -> bool {
        if portrait {
            self.is_portrait() || self.is_portrait_capable()
        } else {
            !self.is_portrait() && self != UiState::Undefined
        }
    }
}

impl fmt::Display for UiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UiState::Undefined => "undefined",
            UiState::Home => "home",
            UiState::HomeEdit => "home-edit",
            UiState::HomePortrait => "home-portrait",
            UiState::App => "app",
            UiState::AppPortrait => "app-portrait",
            UiState::TaskNav => "task-nav",
            UiState::Launcher => "launcher",
            UiState::Loading => "loading",
            UiState::LoadingSubwin => "loading-subwin",
            UiState::NonComposited => "non-composited",
            UiState::NonCompositedPortrait => "non-composited-portrait",
        };
        write!(f, "{name}")
    }
}

/// Services the transition engine consumes from the window manager.
///
/// Methods taking a node or client that no longer exists must not panic; the
/// engine checks [`Compositor::node_is_valid`] before animating, but teardown
/// still releases references to nodes that have gone away.
pub trait Compositor {
    // # Scene graph

    /// Whether `node` still exists.
    fn node_is_valid(&self, node: NodeId) -> bool;

    /// Take a strong reference on `node`.
    fn acquire_node(&mut self, node: NodeId);

    /// Drop a reference taken with [`Compositor::acquire_node`] or returned by a `create_*` call.
    fn release_node(&mut self, node: NodeId);

    /// Create a solid rectangle.
    fn create_rectangle(&mut self, color: Color) -> Option<NodeId>;

    /// Create one spark of the close effect.
    fn create_particle(&mut self) -> Option<NodeId>;

    /// Create a stand-in title bar background of the given height.
    fn create_fake_title_bar(&mut self, height: u32) -> Option<NodeId>;

    /// The node that draws the whole scene below the stage.
    fn render_root(&self) -> NodeId;

    fn parent_of(&self, node: NodeId) -> Option<Container>;

    /// Attach a detached node to `container`.
    fn add_to(&mut self, container: Container, node: NodeId);

    /// Detach `node` from its parent, if it has one.
    fn remove_from_parent(&mut self, node: NodeId);

    /// Move `node` to `container`, keeping it alive across the move.
    fn reparent(&mut self, node: NodeId, container: Container);

    /// Position and size, not counting anchor, scale or rotation.
    fn geometry(&self, node: NodeId) -> Geometry;

    fn set_position(&mut self, node: NodeId, x: f32, y: f32);
    fn set_size(&mut self, node: NodeId, width: f32, height: f32);
    fn set_opacity(&mut self, node: NodeId, opacity: u8);
    fn set_scale(&mut self, node: NodeId, scale_x: f32, scale_y: f32);
    fn set_anchor(&mut self, node: NodeId, x: f32, y: f32);

    /// Rotate `node` by `degrees` around `axis` through the point (`center_x`, `center_y`).
    fn set_rotation(
        &mut self,
        node: NodeId,
        axis: RotationAxis,
        degrees: f32,
        center_x: f32,
        center_y: f32,
    );

    fn set_depth(&mut self, node: NodeId, depth: f32);
    fn show(&mut self, node: NodeId);
    fn hide(&mut self, node: NodeId);
    fn is_visible(&self, node: NodeId) -> bool;
    fn raise_top(&mut self, node: NodeId);
    fn lower_bottom(&mut self, node: NodeId);

    /// Move the anchor to the node's centre and shift its position so it stays put on screen.
    fn move_anchor_to_center(&mut self, node: NodeId);

    /// Move the anchor to the node's centre without compensating the position.
    fn set_anchor_to_center(&mut self, node: NodeId);

    // # Window model

    fn acquire_client(&mut self, client: ClientId);
    fn release_client(&mut self, client: ClientId);

    /// Node that draws `client`, if it has one.
    fn client_actor(&self, client: ClientId) -> Option<NodeId>;

    fn client_kind(&self, client: ClientId) -> ClientKind;

    /// Position of the window within its application's window stack (0 is the bottom).
    fn client_stack_index(&self, client: ClientId) -> u32;

    /// Whether the window leads its application's window stack.
    fn client_is_leader(&self, client: ClientId) -> bool;

    fn client_flags(&self, client: ClientId) -> ClientFlags;
    fn set_client_flags(&mut self, client: ClientId, flags: ClientFlags);
    fn unset_client_flags(&mut self, client: ClientId, flags: ClientFlags);

    /// Client drawn by `node`, if any.
    fn client_for_node(&self, node: NodeId) -> Option<ClientId>;

    // # Render manager

    fn ui_state(&self) -> UiState;
    fn set_ui_state(&mut self, state: UiState);

    /// Re-evaluate which nodes are visible or blurred.
    fn restack(&mut self);

    /// Current screen size in pixels.
    fn screen_size(&self) -> (u32, u32);

    /// Whether the screen is currently in portrait orientation.
    fn is_portrait(&self) -> bool {
        let (width, height) = self.screen_size();
        height > width
    }

    /// Ask the hardware to switch orientation. Completion is signalled only
    /// indirectly, through damage notifications.
    fn request_orientation(&mut self, portrait: bool);

    /// Background colour of popup fillers.
    fn background_color(&self) -> Color;

    /// Tell the render manager whether any effect is running.
    fn set_effect_running(&mut self, running: bool);
}
