//! # rndemon-daemon - Packager Process Management
//!
//! Spawns the React Native packager, moves its raw stdio through channels,
//! and supervises its lifecycle: at most one live process, subscriptions
//! that survive until a process exists, and line-segmented output.
//!
//! Depends on [`rndemon_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Supervision
//! - [`ProcessSupervisor`] - start/stop/send-command and event subscriptions
//! - [`SupervisorConfig`] - program, line break and stop timeout
//!
//! ### Process Management
//! - [`PackagerProcess`] - The child process and its I/O tasks
//! - [`TaggedEvent`] - A process event tagged with its session generation
//!
//! ### Control Sequences
//! - [`INTERRUPT`], [`RELOAD`], [`DEV_MENU`]

pub mod commands;
pub mod process;
pub mod supervisor;

pub use commands::{DEV_MENU, INTERRUPT, RELOAD};
pub use process::{PackagerProcess, SpawnSpec, TaggedEvent};
pub use supervisor::{
    ProcessSupervisor, Subscription, SupervisorConfig, DEFAULT_PROGRAM, DEFAULT_STOP_TIMEOUT,
    NOT_RUNNING_MESSAGE, STARTING_MESSAGE, STOPPED_MESSAGE, WORKSPACE_NOT_FOUND_MESSAGE,
};
