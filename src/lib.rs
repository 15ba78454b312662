#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # Meridian: the window-management core of a Wayland desktop shell
//!
//! This crate contains the state machine deciding what a desktop shell shows and where:
//! windows and their interactive move and resize, the scene graph they are stacked in,
//! workspaces laid out on a grid, keyboard focus and activation, pointer grabs, and the
//! surfaces of the privileged desktop client (background, panels, lock screen).
//!
//! It does not speak the Wayland protocol nor render anything. The compositor embedding
//! it translates client requests and input events into calls on a [`shell::Shell`], and
//! after each call dispatches the [`shell::ShellEvent`]s it emitted: configure a surface,
//! move the keyboard focus, send pointer events, repaint an output, and so on.
//!
//! ## Structure of the crate
//!
//! - [`shell`] holds the [`Shell`](shell::Shell) itself and the window requests.
//! - [`scene`] is the graph of views, their transforms and the stacking layers.
//! - [`input`] contains seats, the pointer and its grabs.
//! - [`focus`] handles activation scopes.
//! - [`workspace`] contains workspaces and the pager switching between them.
//! - [`output`] and [`surface`] are the records of screens and client surfaces.
//! - [`animation`] provides the time-driven interpolation used for transitions.
//!
//! ## General principles
//!
//! ### The event loop and state handling
//!
//! The shell is driven sequentially from the compositor's event loop and never blocks,
//! spawns threads or sleeps. Time only advances through [`Shell::tick`](shell::Shell::tick),
//! which the compositor calls on every repaint of an output with a timestamp from its
//! clock (see [`utils::Clock`]).
//!
//! ### Logging
//!
//! Meridian makes extensive use of [`tracing`] for its internal logging. It never installs
//! a subscriber itself. Every shell owns a span that all its log records are attached to.
//!
//! For release builds it is recommended to limit the log level during compile time, by
//! enabling the corresponding features of [`tracing`] in your binary crate:
//!
//! ```toml
//! [dependencies]
//! tracing = { version = "0.1", features = ["max_level_trace", "release_max_level_debug"] }
//! ```

pub mod animation;
pub mod config;
pub mod focus;
pub mod input;
pub mod output;
pub mod scene;
pub mod shell;
pub mod surface;
pub mod utils;
pub mod workspace;
