//! Noise filtering and signal extraction for packager output
//!
//! The React Native / Flutter toolchains print a lot of chatter that is
//! useless in an editor notification: log-level tagged device logs,
//! hot-reload progress, key-command help banners and stack frames. The
//! [`OutputFilter`] normalizes each line and drops anything matched by its
//! [`DenyList`]. Separately, every raw line is scanned for the profiler
//! announcement so the debugger URL can be opened later.

use regex::Regex;
use std::sync::LazyLock;

use crate::ansi::strip_ansi_codes;
use crate::error::{Error, Result};

/// Version of the built-in denylist
///
/// Bump whenever [`DenyList::default`] changes so config-provided extras
/// can be reviewed against the new wording.
pub const DENYLIST_VERSION: u32 = 1;

/// Announcement carrying the debugger/profiler URL
static PROFILER_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*An Observatory debugger and profiler on .* is available at:\s*(https?://127\.0\.0\.1:\d+/.+/)$",
    )
    .expect("Profiler URL regex pattern is valid")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Whitespace regex pattern is valid"));

/// Built-in prefixes of known-noisy toolchain output
const DEFAULT_NOISE_PREFIXES: &[&str] = &[
    "🔥 To hot reload",
    "An Observatory debugger and profiler",
    "For a more detailed help message, press \"h\"",
    "Initializing hot reload",
    "Performing hot reload",
    "Reloaded ",
    "Flutter run key commands.",
    "r Hot reload. 🔥🔥🔥",
    "R Hot restart.",
    "h Repeat this help message.",
    "d Detach (terminate \"flutter run\" but leave application running).",
    "c Clear the screen",
    "q Quit (terminate the application on the device).",
    "flutter: Another exception was thrown:",
    "An Observatory debugger and profiler on",
];

/// A single denylist predicate, matched against a normalized line
#[derive(Debug, Clone)]
pub enum LinePredicate {
    /// Line equals the text exactly
    Exact(String),
    /// Line starts with the text
    Prefix(String),
    /// Line matches the regular expression
    Pattern(Regex),
}

impl LinePredicate {
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    pub fn prefix(text: impl Into<String>) -> Self {
        Self::Prefix(text.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| Error::config_invalid(format!("bad denylist pattern {pattern:?}: {e}")))
    }

    /// Parse a predicate from its config form.
    ///
    /// `exact:<text>`, `prefix:<text>` and `regex:<pattern>` select the kind
    /// explicitly; anything else is treated as a prefix.
    pub fn parse(entry: &str) -> Result<Self> {
        if let Some(text) = entry.strip_prefix("exact:") {
            Ok(Self::exact(text))
        } else if let Some(text) = entry.strip_prefix("prefix:") {
            Ok(Self::prefix(text))
        } else if let Some(pattern) = entry.strip_prefix("regex:") {
            Self::pattern(pattern)
        } else {
            Ok(Self::prefix(entry))
        }
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            LinePredicate::Exact(text) => line == text,
            LinePredicate::Prefix(text) => line.starts_with(text.as_str()),
            LinePredicate::Pattern(regex) => regex.is_match(line),
        }
    }
}

/// Ordered set of predicates identifying lines to suppress
///
/// A line is dropped if ANY predicate matches.
#[derive(Debug, Clone)]
pub struct DenyList {
    version: u32,
    predicates: Vec<LinePredicate>,
}

impl Default for DenyList {
    fn default() -> Self {
        let mut predicates = Vec::with_capacity(DEFAULT_NOISE_PREFIXES.len() + 2);
        // Android logcat style level tags: D/..., I/..., W/...
        predicates.push(LinePredicate::Pattern(
            Regex::new(r"^[DIW]/").expect("Log tag regex pattern is valid"),
        ));
        predicates.extend(DEFAULT_NOISE_PREFIXES.iter().map(|p| LinePredicate::prefix(*p)));
        // Dart stack frames printed through the flutter: logger
        predicates.push(LinePredicate::Pattern(
            Regex::new(r"^flutter: #\d+ +.+$").expect("Stack frame regex pattern is valid"),
        ));
        Self {
            version: DENYLIST_VERSION,
            predicates,
        }
    }
}

impl DenyList {
    pub fn new(version: u32, predicates: Vec<LinePredicate>) -> Self {
        Self {
            version,
            predicates,
        }
    }

    /// A denylist that drops nothing
    pub fn empty() -> Self {
        Self::new(DENYLIST_VERSION, Vec::new())
    }

    /// The built-in list followed by user supplied predicates
    pub fn with_extras<S: AsRef<str>>(extras: &[S]) -> Result<Self> {
        let mut list = Self::default();
        for entry in extras {
            list.push(LinePredicate::parse(entry.as_ref())?);
        }
        Ok(list)
    }

    pub fn push(&mut self, predicate: LinePredicate) {
        self.predicates.push(predicate);
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, line: &str) -> bool {
        self.predicates.iter().any(|p| p.matches(line))
    }
}

/// Collapse internal whitespace runs to a single space and trim the ends
pub fn reduce_space(line: &str) -> String {
    WHITESPACE_RUN.replace_all(line.trim(), " ").into_owned()
}

/// Extract the profiler URL from a raw (un-normalized) line
pub fn extract_profiler_url(line: &str) -> Option<String> {
    PROFILER_URL_PATTERN
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Result of running a batch of raw lines through the filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedOutput {
    /// Normalized lines that survived the denylist
    pub lines: Vec<String>,
    /// Last profiler URL announced in the batch, if any
    pub profiler_url: Option<String>,
}

/// Line normalizer + denylist
#[derive(Debug, Clone)]
pub struct OutputFilter {
    denylist: DenyList,
    strip_ansi: bool,
}

impl Default for OutputFilter {
    fn default() -> Self {
        Self::new(DenyList::default())
    }
}

impl OutputFilter {
    pub fn new(denylist: DenyList) -> Self {
        Self {
            denylist,
            strip_ansi: true,
        }
    }

    /// Enable or disable ANSI stripping before normalization
    pub fn with_strip_ansi(mut self, strip_ansi: bool) -> Self {
        self.strip_ansi = strip_ansi;
        self
    }

    pub fn denylist(&self) -> &DenyList {
        &self.denylist
    }

    /// Normalize one line the way [`filter`](Self::filter) does
    pub fn normalize(&self, line: &str) -> String {
        if self.strip_ansi {
            reduce_space(&strip_ansi_codes(line))
        } else {
            reduce_space(line)
        }
    }

    /// Normalize, then drop empty and denylisted lines
    pub fn filter<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        lines
            .iter()
            .map(|line| self.normalize(line.as_ref()))
            .filter(|line| !line.is_empty() && !self.denylist.matches(line))
            .collect()
    }

    /// Scan raw lines for the profiler URL and filter them.
    ///
    /// The scan sees every line, including the ones the denylist drops.
    pub fn process<S: AsRef<str>>(&self, raw: &[S]) -> ProcessedOutput {
        let profiler_url = raw
            .iter()
            .filter_map(|line| extract_profiler_url(line.as_ref()))
            .last();
        ProcessedOutput {
            lines: self.filter(raw),
            profiler_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILER_LINE: &str =
        "An Observatory debugger and profiler on Pixel is available at: http://127.0.0.1:41000/abc123/";

    #[test]
    fn test_reduce_space() {
        assert_eq!(reduce_space("  BUNDLE   ./index.js \t 100% "), "BUNDLE ./index.js 100%");
        assert_eq!(reduce_space("\t \r"), "");
    }

    #[test]
    fn test_empty_lines_dropped() {
        let filter = OutputFilter::default();
        assert!(filter.filter(&["", "   ", "\t"]).is_empty());
    }

    #[test]
    fn test_log_tags_dropped() {
        let filter = OutputFilter::default();
        let out = filter.filter(&["D/EGL_emulation: eglMakeCurrent", "I/flutter: hi", "W/Gralloc"]);
        assert!(out.is_empty());
        // E/ is not in the list
        assert_eq!(filter.filter(&["E/AndroidRuntime: FATAL"]), vec!["E/AndroidRuntime: FATAL"]);
    }

    #[test]
    fn test_hot_reload_chatter_dropped() {
        let filter = OutputFilter::default();
        let lines = [
            "🔥  To hot reload changes while running, press \"r\".",
            "Initializing hot reload...",
            "Performing hot reload...",
            "Reloaded 1 of 469 libraries in 261ms.",
            "For a more detailed help message, press \"h\". To quit, press \"q\".",
        ];
        assert!(filter.filter(&lines).is_empty());
    }

    #[test]
    fn test_help_banner_dropped() {
        let filter = OutputFilter::default();
        let lines = [
            "Flutter run key commands.",
            "r Hot reload. 🔥🔥🔥",
            "R Hot restart.",
            "h Repeat this help message.",
            "d Detach (terminate \"flutter run\" but leave application running).",
            "c Clear the screen",
            "q Quit (terminate the application on the device).",
        ];
        assert!(filter.filter(&lines).is_empty());
    }

    #[test]
    fn test_stack_frames_dropped() {
        let filter = OutputFilter::default();
        let lines = [
            "flutter: #0      main (package:app/main.dart:10:3)",
            "flutter: Another exception was thrown: RangeError",
            "flutter: regular print output",
        ];
        assert_eq!(filter.filter(&lines), vec!["flutter: regular print output"]);
    }

    #[test]
    fn test_signal_lines_kept_and_normalized() {
        let filter = OutputFilter::default();
        let lines = ["  Welcome   to Metro  ", "\x1b[32mBUNDLE\x1b[0m  ./index.js"];
        assert_eq!(
            filter.filter(&lines),
            vec!["Welcome to Metro", "BUNDLE ./index.js"]
        );
    }

    #[test]
    fn test_ansi_kept_when_disabled() {
        let filter = OutputFilter::default().with_strip_ansi(false);
        assert_eq!(filter.filter(&["\x1b[1mbold\x1b[0m"]), vec!["\x1b[1mbold\x1b[0m"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = OutputFilter::default();
        let lines = [
            "  Loading   dependency graph, done.",
            "I/flutter: noise",
            "",
            "\x1b[33mwarn\x1b[0m: something   odd",
            "Reloaded 2 of 3 libraries",
            "BUNDLE ./index.js",
        ];
        let once = filter.filter(&lines);
        let twice = filter.filter(once.as_slice());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_profiler_url_extracted_and_line_dropped() {
        let filter = OutputFilter::default();
        let out = filter.process(&[PROFILER_LINE]);
        assert_eq!(out.profiler_url.as_deref(), Some("http://127.0.0.1:41000/abc123/"));
        assert!(out.lines.is_empty());
    }

    #[test]
    fn test_profiler_url_last_match_wins() {
        let filter = OutputFilter::default();
        let second = PROFILER_LINE.replace("41000/abc123", "42000/def456");
        let out = filter.process(&[PROFILER_LINE.to_string(), "hello".to_string(), second]);
        assert_eq!(out.profiler_url.as_deref(), Some("http://127.0.0.1:42000/def456/"));
        assert_eq!(out.lines, vec!["hello"]);
    }

    #[test]
    fn test_profiler_url_requires_loopback() {
        assert_eq!(
            extract_profiler_url(
                "An Observatory debugger and profiler on Pixel is available at: http://10.0.2.2:41000/x/"
            ),
            None
        );
    }

    #[test]
    fn test_profiler_scan_ignores_unrelated_lines() {
        assert_eq!(extract_profiler_url("Welcome to Metro"), None);
    }

    #[test]
    fn test_predicate_parse() {
        assert!(matches!(LinePredicate::parse("exact:done").unwrap(), LinePredicate::Exact(t) if t == "done"));
        assert!(matches!(LinePredicate::parse("prefix:info").unwrap(), LinePredicate::Prefix(t) if t == "info"));
        assert!(matches!(LinePredicate::parse("regex:^a+$").unwrap(), LinePredicate::Pattern(_)));
        assert!(matches!(LinePredicate::parse("bare").unwrap(), LinePredicate::Prefix(t) if t == "bare"));
        assert!(LinePredicate::parse("regex:(").is_err());
    }

    #[test]
    fn test_exact_predicate_only_matches_whole_line() {
        let predicate = LinePredicate::exact("info Done");
        assert!(predicate.matches("info Done"));
        assert!(!predicate.matches("info Done in 3s"));
    }

    #[test]
    fn test_denylist_with_extras() {
        let list = DenyList::with_extras(&["info ", "regex:^warn Package"]).unwrap();
        assert_eq!(list.len(), DenyList::default().len() + 2);
        assert_eq!(list.version(), DENYLIST_VERSION);

        let filter = OutputFilter::new(list);
        let out = filter.filter(&["info Reloading app...", "warn Package foo is deprecated", "error boom"]);
        assert_eq!(out, vec!["error boom"]);
    }

    #[test]
    fn test_empty_denylist_keeps_everything_non_empty() {
        let filter = OutputFilter::new(DenyList::empty());
        assert_eq!(filter.filter(&["I/flutter: x", ""]), vec!["I/flutter: x"]);
    }
}
