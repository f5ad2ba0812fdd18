//! ANSI escape code handling
//!
//! Metro and the React Native CLI color their terminal output even when
//! stdout is a pipe. Those escape sequences have to go before the output is
//! whitespace-normalized and matched against the denylist.

use regex::Regex;
use std::sync::LazyLock;

/// Regex pattern for ANSI escape sequences.
///
/// Covers CSI sequences (colors, cursor movement), OSC sequences (titles,
/// hyperlinks) terminated by BEL or ST, and two-byte escapes.
static ANSI_ESCAPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \x1b\[[0-9;?]*[A-Za-z]               # CSI sequences
        | \x1b\][^\x07\x1b]*(?:\x07|\x1b\\)  # OSC sequences
        | \x1b[A-Za-z]                       # Simple escapes
        ",
    )
    .expect("ANSI regex pattern is valid")
});

/// Strip all ANSI escape sequences from a string.
///
/// # Examples
///
/// ```
/// use rndemon_core::strip_ansi_codes;
///
/// let input = "\x1b[32mBUNDLE\x1b[0m ./index.js";
/// assert_eq!(strip_ansi_codes(input), "BUNDLE ./index.js");
/// ```
pub fn strip_ansi_codes(input: &str) -> String {
    ANSI_ESCAPE_PATTERN.replace_all(input, "").into_owned()
}
