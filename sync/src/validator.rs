//! Destination guardrails: path syntax, protected system roots and the save-path heuristic
//!
//! Every check here is a predicate. Paths that cannot be parsed evaluate to `false`
//! (or to "not a system directory"), they never produce an error.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static WINDOWS_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[A-Za-z]:[\\/](?:[^\\/:*?"<>|\x00-\x1F\x7F]+[\\/]?)*$"#)
        .expect("windows path pattern is valid")
});

static POSIX_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^/(?:[^\\/:*?"<>|\x00-\x1F\x7F]+/?)*$"#).expect("posix path pattern is valid")
});

/// Marker segments expected somewhere in a game save directory.
pub const DEFAULT_SAVE_MARKERS: [&str; 3] = ["storage", "steam", "user"];

/// Outcome of the pre-flight guardrail checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationVerdict {
    Valid,
    InvalidSyntax,
    EmptyOrMissing,
    SystemDirectory,
    /// Source and destination are the same directory or one is nested in the other.
    OverlappingPaths,
    /// Advisory: the caller may confirm and retry with the heuristic bypassed.
    LikelyWrongTarget,
}

impl ValidationVerdict {
    /// Whether the user can override this verdict by confirming.
    pub fn is_advisory(self) -> bool {
        matches!(self, Self::LikelyWrongTarget)
    }

    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for ValidationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "path is valid"),
            Self::InvalidSyntax => write!(f, "path is not a valid absolute path"),
            Self::EmptyOrMissing => write!(f, "directory is empty or does not exist"),
            Self::SystemDirectory => write!(f, "path is a protected system directory"),
            Self::OverlappingPaths => write!(f, "path overlaps the other side of the pair"),
            Self::LikelyWrongTarget => write!(f, "path does not look like an application save directory"),
        }
    }
}

/// Which path grammar the validator enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStyle {
    /// `<drive>:\segment\segment`, either separator accepted
    Windows,
    /// `/segment/segment`
    Posix,
}

impl PathStyle {
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// How far the protection of a root reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootScope {
    /// The root and everything nested under it
    Subtree,
    /// Only the root itself; application data legitimately lives below it
    Exact,
}

/// A directory the engine must never be pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedRoot {
    pub path: String,
    pub scope: RootScope,
}

impl ProtectedRoot {
    pub fn subtree(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scope: RootScope::Subtree,
        }
    }

    pub fn exact(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scope: RootScope::Exact,
        }
    }
}

/// A path reduced to its drive and case-folded segments, with `.` and `..` resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    drive: Option<char>,
    segments: Vec<String>,
}

impl NormalizedPath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True for `C:\` or `/`.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    fn starts_with(&self, other: &NormalizedPath) -> bool {
        self.drive == other.drive && self.segments.starts_with(&other.segments)
    }
}

/// Stateless guardrail checks configured with a path grammar, protected roots and
/// save-path marker segments.
#[derive(Debug, Clone)]
pub struct PathValidator {
    style: PathStyle,
    protected_roots: Vec<ProtectedRoot>,
    save_markers: Vec<String>,
}

impl PathValidator {
    pub fn new(style: PathStyle, protected_roots: Vec<ProtectedRoot>, save_markers: Vec<String>) -> Self {
        Self {
            style,
            protected_roots,
            save_markers: save_markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    /// Validator for the host platform, reading well-known directories from the environment.
    pub fn from_env() -> Self {
        match PathStyle::native() {
            PathStyle::Windows => Self::windows_from_env(),
            PathStyle::Posix => Self::posix_from_env(),
        }
    }

    /// Windows rules with protected roots taken from the process environment.
    pub fn windows_from_env() -> Self {
        Self::windows_with_lookup(env_lookup)
    }

    /// Windows rules with protected roots resolved through `lookup`, falling back to the
    /// stock install locations for any variable that is unset.
    pub fn windows_with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, fallback: &str| lookup(name).unwrap_or_else(|| fallback.to_string());

        let system_root = var("SYSTEMROOT", r"C:\Windows");
        let user_profile = var("USERPROFILE", r"C:\Users");

        let mut roots = vec![
            ProtectedRoot::subtree(system_root),
            ProtectedRoot::subtree(var("PROGRAMFILES", r"C:\Program Files")),
            ProtectedRoot::subtree(var("PROGRAMFILES(X86)", r"C:\Program Files (x86)")),
            ProtectedRoot::exact(user_profile.clone()),
            ProtectedRoot::exact(r"C:\Users"),
        ];
        // The directory holding every profile is as sensitive as a single profile.
        if let Some(parent) = Path::new(&user_profile.replace('\\', "/")).parent() {
            let parent = parent.to_string_lossy();
            if !parent.is_empty() {
                roots.push(ProtectedRoot::exact(parent.replace('/', "\\")));
            }
        }

        Self::new(
            PathStyle::Windows,
            roots,
            DEFAULT_SAVE_MARKERS.iter().map(|m| m.to_string()).collect(),
        )
    }

    /// Unix rules: system trees are protected entirely, home and data parents exactly.
    pub fn posix_from_env() -> Self {
        let mut roots: Vec<ProtectedRoot> = [
            "/bin", "/boot", "/dev", "/etc", "/lib", "/lib32", "/lib64", "/opt", "/proc",
            "/sbin", "/sys", "/usr", "/System", "/Library", "/Applications",
        ]
        .into_iter()
        .map(ProtectedRoot::subtree)
        .collect();

        roots.extend(["/var", "/home", "/root", "/Users"].into_iter().map(ProtectedRoot::exact));

        if let Some(home) = dirs::home_dir() {
            roots.push(ProtectedRoot::exact(home.to_string_lossy().into_owned()));
        }

        Self::new(
            PathStyle::Posix,
            roots,
            DEFAULT_SAVE_MARKERS.iter().map(|m| m.to_string()).collect(),
        )
    }

    /// Replace the marker segments used by the save-path heuristic.
    pub fn with_save_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.save_markers = markers.into_iter().map(|m| m.into().to_lowercase()).collect();
        self
    }

    /// Add another protected root.
    pub fn with_protected_root(mut self, root: ProtectedRoot) -> Self {
        self.protected_roots.push(root);
        self
    }

    pub fn style(&self) -> PathStyle {
        self.style
    }

    pub fn protected_roots(&self) -> &[ProtectedRoot] {
        &self.protected_roots
    }

    pub fn save_markers(&self) -> &[String] {
        &self.save_markers
    }

    /// Accepts only absolute paths whose segments avoid reserved and control characters.
    pub fn validate_syntax(&self, path: &str) -> bool {
        match self.style {
            PathStyle::Windows => WINDOWS_PATH.is_match(path),
            PathStyle::Posix => POSIX_PATH.is_match(path),
        }
    }

    /// True when `path` is a drive/filesystem root, or equals or sits beneath a protected root.
    pub fn is_system_directory(&self, path: &str) -> bool {
        let Some(normalized) = self.normalize(path) else {
            return false;
        };

        if normalized.is_root() {
            return true;
        }

        self.protected_roots.iter().any(|root| {
            let Some(root_path) = self.normalize(&root.path) else {
                return false;
            };
            match root.scope {
                RootScope::Subtree => normalized.starts_with(&root_path),
                RootScope::Exact => normalized == root_path,
            }
        })
    }

    /// Soft heuristic: every marker segment appears somewhere in the path.
    pub fn looks_like_application_save_path(&self, path: &str) -> bool {
        let Some(normalized) = self.normalize(path) else {
            return false;
        };

        self.save_markers
            .iter()
            .all(|marker| normalized.segments.iter().any(|segment| segment == marker))
    }

    /// True when both paths name the same directory or one lies beneath the other.
    pub fn paths_overlap(&self, first: &str, second: &str) -> bool {
        match (self.normalize(first), self.normalize(second)) {
            (Some(first), Some(second)) => first.starts_with(&second) || second.starts_with(&first),
            _ => false,
        }
    }

    /// Resolve `.`/`..`, unify separators and case-fold. `None` for relative or malformed paths.
    pub fn normalize(&self, path: &str) -> Option<NormalizedPath> {
        let (drive, rest) = match self.style {
            PathStyle::Windows => {
                let mut chars = path.chars();
                let letter = chars.next().filter(|c| c.is_ascii_alphabetic())?;
                if chars.next() != Some(':') {
                    return None;
                }
                let rest = chars.as_str();
                if !rest.starts_with(['\\', '/']) {
                    return None;
                }
                (Some(letter.to_ascii_lowercase()), rest)
            }
            PathStyle::Posix => {
                if !path.starts_with('/') {
                    return None;
                }
                (None, path)
            }
        };

        let separators: &[char] = match self.style {
            PathStyle::Windows => &['\\', '/'],
            PathStyle::Posix => &['/'],
        };

        let mut segments: Vec<String> = Vec::new();
        for segment in rest.split(separators) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.to_lowercase()),
            }
        }

        Some(NormalizedPath { drive, segments })
    }
}

impl Default for PathValidator {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Existence check used by the controller: the directory must exist and hold at least one entry.
pub fn directory_verdict(path: &Path) -> ValidationVerdict {
    if !path.is_dir() {
        return ValidationVerdict::EmptyOrMissing;
    }

    match std::fs::read_dir(path) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                ValidationVerdict::Valid
            } else {
                ValidationVerdict::EmptyOrMissing
            }
        }
        Err(_) => ValidationVerdict::EmptyOrMissing,
    }
}
