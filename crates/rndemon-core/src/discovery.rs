//! React Native project discovery
//!
//! Locates the project root the packager must run in: the closest
//! directory under the editor workspace that contains a marker file
//! (`app.json` by default). "Closest" means fewest path segments.

use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, trace, warn};

/// Default maximum search depth, in directory levels below the start
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Marker file identifying a React Native project root
pub const DEFAULT_MARKER: &str = "app.json";

/// Directories to skip during search
const SKIP_DIRECTORIES: &[&str] = &[
    "node_modules",
    ".git",
    ".idea",
    ".vscode",
    "build",
    "Pods",
    ".gradle",
    ".expo",
    "target",
];

/// Working-directory resolution boundary
///
/// Returns the directory the packager must be spawned in, or `None` when
/// no project could be located.
pub trait WorkspaceResolver: Send + Sync {
    fn resolve(&self) -> Option<PathBuf>;
}

/// Resolver that always answers with a fixed directory
#[derive(Debug, Clone)]
pub struct FixedResolver(pub Option<PathBuf>);

impl WorkspaceResolver for FixedResolver {
    fn resolve(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}

/// Resolver that searches below `root` for a directory containing the marker
#[derive(Debug, Clone)]
pub struct MarkerResolver {
    root: PathBuf,
    marker: String,
    max_depth: usize,
}

impl MarkerResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            marker: DEFAULT_MARKER.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl WorkspaceResolver for MarkerResolver {
    fn resolve(&self) -> Option<PathBuf> {
        let root = dunce::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        find_workspace_folder(&root, &[self.marker.as_str()], self.max_depth)
    }
}

/// Find every directory under `cwd` holding a file whose name matches one
/// of `patterns` (glob syntax, e.g. `app.json` or `*.config.js`).
///
/// Entries are visited in name order so results are deterministic.
pub fn find_workspace_folders(cwd: &Path, patterns: &[&str], max_depth: usize) -> Vec<PathBuf> {
    let compiled: Vec<Pattern> = patterns
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!("Ignoring invalid marker pattern {:?}: {}", p, e);
                None
            }
        })
        .collect();

    let mut found = Vec::new();
    if !compiled.is_empty() {
        search_directory(cwd, &compiled, 0, max_depth, &mut found);
    }
    debug!(
        "Found {} candidate workspace folder(s) under {}",
        found.len(),
        cwd.display()
    );
    found
}

fn search_directory(
    dir: &Path,
    patterns: &[Pattern],
    depth: usize,
    max_depth: usize,
    found: &mut Vec<PathBuf>,
) {
    let mut entries: Vec<_> = match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).collect(),
        Err(e) => {
            trace!("Cannot read {}: {}", dir.display(), e);
            return;
        }
    };
    entries.sort_by_key(|e| e.file_name());

    let mut subdirs = Vec::new();
    let mut matched = false;

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            if !should_skip_directory(&name) {
                subdirs.push(path);
            }
        } else if !matched && patterns.iter().any(|p| p.matches(&name)) {
            trace!("Marker {} found in {}", name, dir.display());
            matched = true;
        }
    }

    if matched {
        found.push(dir.to_path_buf());
    }

    if depth < max_depth {
        for subdir in subdirs {
            search_directory(&subdir, patterns, depth + 1, max_depth, found);
        }
    }
}

fn should_skip_directory(name: &str) -> bool {
    SKIP_DIRECTORIES.contains(&name)
}

/// Pick the path with the fewest segments; the first one wins ties
pub fn closest_path(paths: &[PathBuf]) -> Option<PathBuf> {
    paths
        .iter()
        .min_by_key(|p| p.components().count())
        .cloned()
}

/// Closest directory under `cwd` containing a marker file
pub fn find_workspace_folder(cwd: &Path, patterns: &[&str], max_depth: usize) -> Option<PathBuf> {
    closest_path(&find_workspace_folders(cwd, patterns, max_depth))
}
