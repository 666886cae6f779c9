//! Object key resolution.
//!
//! Every backend turns a caller-supplied relative key into a medium path
//! through [`Location`], so the filesystem and object-store backends agree
//! on key layout regardless of leading or trailing separators.
//!
//! Rules:
//! - Keys are split on `/`; empty and `.` segments are dropped.
//! - `..` is resolved lexically and never climbs above the store root.
//! - Resolution is idempotent: a key that already carries the root is not
//!   prefixed a second time. Under an absolute root only absolute keys are
//!   considered already rooted.

use crate::error::{Result, StorageError};

const SEPARATOR: char = '/';

/// A store root (filesystem directory or object-store prefix).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    segments: Vec<String>,
    absolute: bool,
}

impl Location {
    /// Create a location from a root directory or key prefix.
    ///
    /// Absolute roots keep their leading `/`; prefixes such as `"cache/"`
    /// are stored without separators at either end.
    pub fn new(root: impl AsRef<str>) -> Self {
        let root = root.as_ref();
        let absolute = root.starts_with(SEPARATOR);
        let segments = clean(root, !absolute)
            .into_iter()
            .map(str::to_string)
            .collect();
        Self { segments, absolute }
    }

    /// The normalized root as a string.
    #[must_use]
    pub fn root(&self) -> String {
        self.render(self.segments.iter().map(String::as_str))
    }

    /// Whether the root has no segments (bucket root or `/`).
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolve `key` against the root.
    ///
    /// Pure and infallible; use [`Location::object`] for keys that must name
    /// an object.
    #[must_use]
    pub fn resolve(&self, key: &str) -> String {
        if let Some(rooted) = self.already_rooted(key) {
            return self.render(rooted.into_iter());
        }
        let key_segments = clean(key, false);
        self.render(
            self.segments
                .iter()
                .map(String::as_str)
                .chain(key_segments),
        )
    }

    /// Validate `key` as an object name and resolve it.
    ///
    /// Rejects keys containing NUL bytes and keys that resolve to the root
    /// itself.
    pub fn object(&self, key: &str) -> Result<String> {
        if key.contains('\0') {
            return Err(StorageError::invalid_key(key, "contains a NUL byte"));
        }
        let resolved = self.resolve(key);
        if resolved == self.root() {
            return Err(StorageError::invalid_key(key, "does not name an object"));
        }
        Ok(resolved)
    }

    fn already_rooted<'k>(&self, key: &'k str) -> Option<Vec<&'k str>> {
        if self.segments.is_empty() || (self.absolute && !key.starts_with(SEPARATOR)) {
            return None;
        }
        let candidate = clean(key, !self.absolute);
        let rooted = candidate.len() >= self.segments.len()
            && candidate
                .iter()
                .zip(&self.segments)
                .all(|(k, r)| *k == r.as_str());
        rooted.then_some(candidate)
    }

    fn render<'a>(&self, parts: impl Iterator<Item = &'a str>) -> String {
        let joined = parts.collect::<Vec<_>>().join("/");
        if self.absolute {
            format!("{SEPARATOR}{joined}")
        } else {
            joined
        }
    }
}

/// Join `key` onto `root` using the same rules as [`Location::resolve`].
#[must_use]
pub fn join(root: &str, key: &str) -> String {
    Location::new(root).resolve(key)
}

/// Split and lexically clean a path.
///
/// With `keep_leading_parent`, leading `..` segments survive (relative
/// filesystem roots such as `../data`); otherwise they are clamped away.
fn clean(input: &str, keep_leading_parent: bool) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for segment in input.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => match out.last() {
                Some(&"..") | None => {
                    if keep_leading_parent {
                        out.push("..");
                    }
                }
                Some(_) => {
                    out.pop();
                }
            },
            s => out.push(s),
        }
    }
    out
}
