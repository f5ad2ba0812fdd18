//! Control sequences written to the packager's stdin
//!
//! The React Native CLI reads single-key commands from its terminal. Each
//! command is the key followed by a line break.

/// Soft stop request written before the process is force-killed
pub const INTERRUPT: &[u8] = b"^C\n";

/// Reload the running app
pub const RELOAD: &[u8] = b"r\n";

/// Open the in-app developer menu
pub const DEV_MENU: &[u8] = b"d\n";
