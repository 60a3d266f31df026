//! # wmfx Library
//!
//! Transition effects and screen rotation sequencing for a compositing window
//! manager.
//!
//! The library is driven by a window manager through [`Transitions`]: it
//! launches map/unmap/close effects on clients, runs the portrait/landscape
//! rotation sequence and releases every scene reference it takes. The `wmfx`
//! binary wraps it for headless simulation.
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Engine**: `core` with the launch API, effect sessions, frame handlers,
//!   easing curves, timelines and the rotation state machine
//! - **Collaborators**: `backend` with the compositor trait the engine drives
//!   and an in-memory implementation
//! - **Configuration**: `config` for the TOML transition parameter file with
//!   hot reload
//! - **Commands**: `commands` for the CLI subcommands (simulate, params)
//! - **Infrastructure**: logging, sound cues, time sources and constants

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod audio;
pub mod backend;
pub mod commands;
pub mod common;
pub mod config;
pub mod core;
pub mod time_source;

pub use crate::core::{TransitionParams, Transitions};
