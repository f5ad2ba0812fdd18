//! Domain event definitions

use serde::Serialize;

/// One of the two output channels of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw events produced by a running packager process
///
/// Output arrives as raw chunks exactly as read from the pipe; turning them
/// into lines is the job of [`crate::LineBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of bytes read from stdout or stderr
    Output { stream: OutputStream, chunk: Vec<u8> },

    /// The process exited. `None` means it was terminated by a signal.
    Exited { code: Option<i32> },

    /// The process could not be spawned or failed while running
    Error { message: String },
}

impl ProcessEvent {
    pub fn stdout(chunk: impl Into<Vec<u8>>) -> Self {
        Self::Output {
            stream: OutputStream::Stdout,
            chunk: chunk.into(),
        }
    }

    pub fn stderr(chunk: impl Into<Vec<u8>>) -> Self {
        Self::Output {
            stream: OutputStream::Stderr,
            chunk: chunk.into(),
        }
    }

    /// True for events after which the process is gone
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessEvent::Exited { .. } | ProcessEvent::Error { .. })
    }
}

/// Exit codes 0 and 1 are what the CLI returns on a normal quit or Ctrl+C
pub fn is_expected_exit(code: Option<i32>) -> bool {
    matches!(code, Some(0) | Some(1))
}
