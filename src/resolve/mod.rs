//! Pattern Expansion
//!
//! Turns manifest entries into concrete `(local path, remote key)` pairs.
//! Remote keys always use `/` regardless of the host, since they are read
//! back on other platforms.

use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::types::PublishError;

/// A concrete file ready for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpload {
    pub local_path: PathBuf,
    pub remote_key: String,
    pub effective_acl: String,
}

/// A pattern match before an ACL is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedPath {
    pub local_path: PathBuf,
    pub remote_key: String,
}

impl ExpandedPath {
    pub fn with_acl(self, acl: &str) -> ResolvedUpload {
        ResolvedUpload {
            local_path: self.local_path,
            remote_key: self.remote_key,
            effective_acl: acl.to_string(),
        }
    }
}

/// Rewrite a raw relative path into a remote key fragment: backslashes
/// become `/`, repeated and leading/trailing separators are dropped.
pub fn normalize_separators(raw: &str) -> String {
    raw.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// `prefix` (trimmed of slashes) joined to `relative` with exactly one `/`.
pub fn join_remote_key(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{prefix}/{relative}")
    }
}

/// True when `path` names the manifest file itself.
pub fn is_manifest_file(path: &Path, manifest_name: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy() == manifest_name)
        .unwrap_or(false)
}

fn has_glob_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

/// Leading directory segments of `pattern` that contain no glob
/// metacharacters. The final segment is never part of the base.
pub fn literal_base(pattern: &str) -> PathBuf {
    let segments: Vec<&str> = pattern
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    let dirs = segments.len().saturating_sub(1);

    segments[..dirs]
        .iter()
        .take_while(|s| !has_glob_meta(s))
        .collect()
}

/// Lazily expands one glob entry against a root directory.
///
/// Each call to [`PatternExpansion::iter`] walks the filesystem again, so
/// the expansion is restartable and never cached across runs.
#[derive(Debug, Clone)]
pub struct PatternExpansion {
    pattern: String,
    remote_prefix: String,
    root: PathBuf,
    excluded_name: Option<String>,
}

impl PatternExpansion {
    pub fn new(pattern: impl Into<String>, remote_prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            pattern: pattern.into(),
            remote_prefix: remote_prefix.into(),
            root: root.into(),
            excluded_name: None,
        }
    }

    /// Skip any match whose file name equals `manifest_name`.
    pub fn excluding(mut self, manifest_name: impl Into<String>) -> Self {
        self.excluded_name = Some(manifest_name.into());
        self
    }

    fn glob_expression(&self) -> String {
        let root = Pattern::escape(&self.root.to_string_lossy());
        let pattern = self.pattern.trim_start_matches(['/', '\\']);
        format!("{}/{}", root.trim_end_matches(['/', '\\']), pattern)
    }

    /// Start a fresh expansion. An invalid pattern yields an error that
    /// callers treat as zero matches.
    pub fn try_iter(&self) -> Result<impl Iterator<Item = ExpandedPath> + '_, PublishError> {
        let expression = self.glob_expression();
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let paths = glob::glob_with(&expression, options).map_err(|e| PublishError::Glob {
            pattern: self.pattern.clone(),
            reason: e.to_string(),
        })?;
        let base = self.root.join(literal_base(&self.pattern));

        Ok(paths.filter_map(move |entry| {
            let local_path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(pattern = %self.pattern, "Skipping unreadable match: {}", e);
                    return None;
                }
            };
            if !local_path.is_file() {
                return None;
            }
            if let Some(name) = &self.excluded_name {
                if is_manifest_file(&local_path, name) {
                    debug!(path = %local_path.display(), "Skipping manifest file");
                    return None;
                }
            }

            let relative = local_path
                .strip_prefix(&base)
                .or_else(|_| local_path.strip_prefix(&self.root))
                .unwrap_or(local_path.as_path());
            let fragment = normalize_separators(&relative.to_string_lossy());

            Some(ExpandedPath {
                remote_key: join_remote_key(&self.remote_prefix, &fragment),
                local_path,
            })
        }))
    }

    /// Start a fresh expansion; an invalid pattern is logged and matches nothing.
    pub fn iter(&self) -> impl Iterator<Item = ExpandedPath> + Send + '_ {
        let matches = match self.try_iter() {
            Ok(iter) => Some(iter),
            Err(e) => {
                warn!("{}; treating as zero matches", e);
                None
            }
        };
        matches.into_iter().flatten()
    }
}
