//! # rndemon-core - Core Domain Types
//!
//! Foundation crate for RN Demon. Provides error handling, logging setup,
//! process event definitions, line segmentation of raw output, noise
//! filtering, and project discovery.
//!
//! This crate has **zero internal dependencies**.
//!
//! ## Public API
//!
//! ### Output Protocol
//! - [`LineBuffer`] - Re-segments raw chunks into complete lines
//! - [`OutputFilter`], [`DenyList`], [`LinePredicate`] - Noise filtering
//! - [`extract_profiler_url()`] - Profiler announcement scan
//!
//! ### Events (`events`)
//! - [`ProcessEvent`] - Raw output/exit/error events from the packager
//! - [`OutputStream`] - stdout vs stderr
//!
//! ### Boundaries
//! - [`Notifier`], [`Notification`] - User-notification sink
//! - [`WorkspaceResolver`], [`MarkerResolver`] - Project root lookup
//!
//! ### Error Handling (`error`)
//! - [`Error`], [`Result`], [`ResultExt`]
//!
//! ## Prelude
//!
//! ```rust
//! use rndemon_core::prelude::*;
//! ```

pub mod ansi;
pub mod discovery;
pub mod error;
pub mod events;
pub mod line_buffer;
pub mod logging;
pub mod notify;
pub mod output_filter;
pub mod prelude;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use ansi::strip_ansi_codes;
pub use discovery::{
    closest_path, find_workspace_folder, find_workspace_folders, FixedResolver, MarkerResolver,
    WorkspaceResolver, DEFAULT_MARKER, DEFAULT_MAX_DEPTH,
};
pub use error::{Error, Result, ResultExt};
pub use events::{is_expected_exit, OutputStream, ProcessEvent};
pub use line_buffer::{LineBuffer, DEFAULT_LINE_BREAK};
pub use notify::{Notification, Notifier};
pub use output_filter::{
    extract_profiler_url, reduce_space, DenyList, LinePredicate, OutputFilter, ProcessedOutput,
    DENYLIST_VERSION,
};
