//! Application-wide constants and compiled-in defaults.
//!
//! Durations are in milliseconds unless noted otherwise. The parameter file
//! can override every default listed under "Transition parameters".

// # Parameter file

/// File name of the transition parameter file.
pub const TRANSITIONS_FILE_NAME: &str = "transitions.toml";

/// Directory name used below the user's config directory.
pub const CONFIG_DIR_NAME: &str = "wmfx";

/// System-wide location of the transition parameter file.
pub const SYSTEM_TRANSITIONS_PATH: &str = "/usr/share/wmfx/transitions.toml";

// # Transition names (tables in the parameter file)

pub const TRANSITION_POPUP: &str = "popup";
pub const TRANSITION_FADE: &str = "fade";
pub const TRANSITION_NOTIFICATION: &str = "notification";
pub const TRANSITION_SUBVIEW: &str = "subview";
pub const TRANSITION_ROTATE: &str = "rotate";
pub const TRANSITION_APP_CLOSE: &str = "app_close";

// # Parameter keys

pub const KEY_DURATION_IN: &str = "duration_in";
pub const KEY_DURATION_OUT: &str = "duration_out";
pub const KEY_DURATION: &str = "duration";
pub const KEY_ANGLE: &str = "angle";
pub const KEY_DAMAGE_TIMEOUT: &str = "damage_timeout";
pub const KEY_DAMAGE_TIMEOUT_MAX: &str = "damage_timeout_max";

// # Transition parameters (defaults)

pub const DEFAULT_POPUP_DURATION: i64 = 250;
pub const DEFAULT_FADE_DURATION: i64 = 250;
pub const DEFAULT_NOTIFICATION_DURATION: i64 = 500;
pub const DEFAULT_SUBVIEW_DURATION: i64 = 250;
pub const DEFAULT_ROTATE_DURATION: i64 = 300;
pub const DEFAULT_APP_CLOSE_DURATION: i64 = 500;
/// Degrees the scene tilts away during a rotation fade.
pub const DEFAULT_ROTATE_ANGLE: f64 = 40.0;
/// Quiet period after the last damage event before fading back in.
pub const DEFAULT_DAMAGE_TIMEOUT: f64 = 50.0;
/// Upper bound on the whole WAITING phase.
pub const DEFAULT_DAMAGE_TIMEOUT_MAX: f64 = 1000.0;

// # Timeline

/// Frame rate used to quantise timelines into frames.
pub const TIMELINE_FPS: u32 = 60;

// # Screen geometry

pub const LANDSCAPE_WIDTH: u32 = 800;
pub const LANDSCAPE_HEIGHT: u32 = 480;
/// Width of the task-switcher button in the top-left corner.
pub const TOP_LEFT_BUTTON_WIDTH: u32 = 112;

// # Effect decoration

/// Number of auxiliary decorative slots an effect session carries.
pub const AUX_SLOTS: usize = 8;
/// Number of sparks used by the close effect (one per auxiliary slot).
pub const CLOSE_PARTICLES: usize = AUX_SLOTS;
/// Windows smaller than this in either dimension get no close effect.
pub const CLOSE_MIN_SIZE: u32 = 16;
/// Perceived depth (scene units) the scene is pushed back at full rotation.
pub const ROTATE_PUSHBACK_DEPTH: f32 = 150.0;

// # Notification animation

/// Fraction of the unmap timeline spent moving into the task button.
pub const NOTIFICATION_MOVE_FRACTION: f32 = 400.0 / (150.0 + 400.0);
pub const NOTIFICATION_TARGET_X: f32 = 8.0;
pub const NOTIFICATION_TARGET_Y: f32 = 17.0;
pub const NOTIFICATION_TARGET_WIDTH: f32 = 96.0;
pub const NOTIFICATION_TARGET_HEIGHT: f32 = 23.0;
pub const NOTIFICATION_TARGET_OPACITY: f32 = 0.75;

// # Audio

/// Sound played when an application window closes.
pub const WINDOW_CLOSED_SOUND: &str = "/usr/share/sounds/ui-window_close.wav";
/// Playback calls slower than this are reported.
pub const SLOW_SOUND_CALL_MS: u128 = 100;

// # Exit codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
