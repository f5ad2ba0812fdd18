//! # rndemon-app - Orchestration
//!
//! Wires the packager supervisor to the user: settings, the command
//! router, the engine loop, terminal notifiers and input sources.
//!
//! ## Public API
//!
//! - [`Engine`] - Control loop owning the supervisor and the router
//! - [`DevCommands`] - Start/stop and packager sub-commands
//! - [`Message`] - User messages consumed by the engine
//! - [`ConsoleNotifier`], [`HeadlessNotifier`] - stdout notifiers
//! - [`config`] - `.rndemon/config.toml` loading

pub mod browser;
pub mod commands;
pub mod config;
pub mod engine;
pub mod input;
pub mod message;
pub mod notifier;
pub mod router;
pub mod signals;

pub use browser::{open_url_in_browser, SystemBrowser, UrlOpener};
pub use commands::{CommandCallback, CommandDescriptor, CommandRegistry, DEV_COMMANDS};
pub use engine::Engine;
pub use input::{parse_command, spawn_stdin_reader, ParseOutcome};
pub use message::Message;
pub use notifier::{ConsoleNotifier, HeadlessEvent, HeadlessNotifier};
pub use router::{DevCommands, PackagerUpdate, RouterOptions};
