//! Configuration types for RN Demon

use std::time::Duration;

use serde::{Deserialize, Serialize};

use rndemon_core::prelude::*;
use rndemon_core::{DenyList, OutputFilter, DEFAULT_LINE_BREAK, DEFAULT_MARKER, DEFAULT_MAX_DEPTH};
use rndemon_daemon::{SupervisorConfig, DEFAULT_PROGRAM};

/// Global application settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub packager: PackagerSettings,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub devtools: DevToolsSettings,
}

impl Settings {
    /// Reject values the supervisor cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.packager.program.trim().is_empty() {
            return Err(Error::config_invalid("packager.program must not be empty"));
        }
        if self.packager.line_break.is_empty() {
            return Err(Error::config_invalid("packager.line_break must not be empty"));
        }
        if self.packager.stop_timeout_ms == 0 {
            return Err(Error::config_invalid("packager.stop_timeout_ms must be positive"));
        }
        glob::Pattern::new(&self.packager.marker).map_err(|e| {
            Error::config_invalid(format!("packager.marker is not a valid pattern: {e}"))
        })?;
        self.output_filter()?;
        Ok(())
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            program: self.packager.program.clone(),
            line_break: self.packager.line_break.clone(),
            stop_timeout: Duration::from_millis(self.packager.stop_timeout_ms),
        }
    }

    /// Output filter with the built-in denylist plus configured extras
    pub fn output_filter(&self) -> Result<OutputFilter> {
        let denylist = DenyList::with_extras(&self.output.extra_denylist)?;
        debug!(
            "Denylist v{} with {} extra predicate(s)",
            denylist.version(),
            self.output.extra_denylist.len()
        );
        Ok(OutputFilter::new(denylist).with_strip_ansi(self.output.strip_ansi))
    }
}

/// How the packager is launched and stopped
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackagerSettings {
    /// Executable to run (looked up in PATH)
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the user's `start` arguments
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// File name glob identifying the project root
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Directory levels searched below the workspace root
    #[serde(default = "default_search_depth")]
    pub search_depth: usize,

    /// How long to wait for the killed packager to exit
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    #[serde(default = "default_line_break")]
    pub line_break: String,
}

impl Default for PackagerSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            marker: default_marker(),
            search_depth: default_search_depth(),
            stop_timeout_ms: default_stop_timeout_ms(),
            line_break: default_line_break(),
        }
    }
}

fn default_program() -> String {
    DEFAULT_PROGRAM.to_string()
}

fn default_args() -> Vec<String> {
    vec!["start".to_string()]
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_search_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

fn default_line_break() -> String {
    DEFAULT_LINE_BREAK.to_string()
}

fn default_true() -> bool {
    true
}

/// Output presentation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    /// Remove ANSI escape sequences before filtering
    #[serde(default = "default_true")]
    pub strip_ansi: bool,

    /// Surface stderr lines as well as stdout
    #[serde(default)]
    pub show_stderr: bool,

    /// Additional denylist entries (`exact:`, `prefix:`, `regex:`; bare = prefix)
    #[serde(default)]
    pub extra_denylist: Vec<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            strip_ansi: true,
            show_stderr: false,
            extra_denylist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DevToolsSettings {
    /// Browser to use (empty = system default)
    #[serde(default)]
    pub browser: String,
}
