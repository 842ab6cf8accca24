//! Manifest Model
//!
//! Typed representation of the `.publish.json` document. The on-disk shape
//! has no discriminator between literal and pattern entries, so decoding
//! goes through [`RawEntry`] and lands in the tagged [`Entry`] enum; nothing
//! past this module ever branches on string emptiness.

pub mod acl;

pub use acl::{resolve_acl, AclPrecedence, DEFAULT_ACL};

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::publish::FailurePolicy;
use crate::types::{PublishError, PublishResult};

/// Well-known manifest file name, looked up in the working directory.
pub const MANIFEST_FILE_NAME: &str = ".publish.json";

/// Bucket name written by `init`; never a real bucket.
pub const TEMPLATE_BUCKET: &str = "Change-Me";

/// A publish manifest. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawManifest", into = "RawManifest")]
pub struct Manifest {
    pub bucket: String,
    pub global_acl: Option<String>,
    pub entries: Vec<Entry>,
}

/// One manifest line item.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Literal(LiteralEntry),
    Pattern(PatternEntry),
}

/// Names exactly one local file and its exact remote key.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralEntry {
    pub path: String,
    pub remote: String,
    pub acl: Option<String>,
}

/// Glob expression whose matches are published under a remote prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternEntry {
    pub pattern: String,
    pub remote: String,
    pub acl: Option<String>,
}

impl Entry {
    pub fn remote(&self) -> &str {
        match self {
            Entry::Literal(e) => &e.remote,
            Entry::Pattern(e) => &e.remote,
        }
    }

    pub fn acl(&self) -> Option<&str> {
        match self {
            Entry::Literal(e) => e.acl.as_deref(),
            Entry::Pattern(e) => e.acl.as_deref(),
        }
    }

    /// Literal entries abort the run on failure, pattern entries record and move on.
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            Entry::Literal(_) => FailurePolicy::FailFast,
            Entry::Pattern(_) => FailurePolicy::BestEffort,
        }
    }

    /// Human-readable label used in logs.
    pub fn describe(&self) -> &str {
        match self {
            Entry::Literal(e) => &e.path,
            Entry::Pattern(e) => &e.pattern,
        }
    }
}

impl Manifest {
    /// Decode a manifest from JSON text.
    pub fn from_json(content: &str) -> PublishResult<Self> {
        serde_json::from_str(content).map_err(|e| PublishError::MalformedManifest(e.to_string()))
    }

    /// Read and decode a manifest file.
    pub async fn load(path: &Path) -> PublishResult<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            PublishError::MalformedManifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        let manifest = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            bucket = %manifest.bucket,
            entries = manifest.entries.len(),
            "Loaded manifest"
        );
        Ok(manifest)
    }

    /// Example manifest written by `init`.
    pub fn template() -> Self {
        Self {
            bucket: TEMPLATE_BUCKET.to_string(),
            global_acl: None,
            entries: vec![Entry::Literal(LiteralEntry {
                path: "example.txt".to_string(),
                remote: "example/example.txt".to_string(),
                acl: Some("public-read".to_string()),
            })],
        }
    }

    pub fn to_json_pretty(&self) -> PublishResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PublishError::MalformedManifest(e.to_string()))
    }

    /// Write the example manifest to `path`. Refuses to clobber an existing
    /// file unless `overwrite` is set.
    pub async fn write_template(path: &Path, overwrite: bool) -> PublishResult<()> {
        if !overwrite && fs::try_exists(path).await? {
            return Err(PublishError::ManifestExists(path.to_path_buf()));
        }

        let content = Self::template().to_json_pretty()?;
        fs::write(path, content).await?;
        info!(path = %path.display(), "Created manifest with example data");
        Ok(())
    }
}

// =============================================================================
// On-disk shape
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawManifest {
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    acl: Option<String>,
    #[serde(default)]
    files: Vec<RawEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default)]
    remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    acl: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<RawEntry> for Entry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let remote = raw.remote.ok_or("missing field `remote`")?.trim().to_string();
        let acl = non_empty(raw.acl);

        if let Some(pattern) = non_empty(raw.pattern) {
            return Ok(Entry::Pattern(PatternEntry { pattern, remote, acl }));
        }

        let path = non_empty(raw.path).ok_or("entry needs a non-empty `path` or `pattern`")?;
        if remote.is_empty() {
            return Err(format!("literal entry {path:?} has an empty `remote` key"));
        }
        Ok(Entry::Literal(LiteralEntry { path, remote, acl }))
    }
}

impl TryFrom<RawManifest> for Manifest {
    type Error = String;

    fn try_from(raw: RawManifest) -> Result<Self, Self::Error> {
        let bucket = non_empty(raw.bucket).ok_or("missing or empty `bucket`")?;
        let entries = raw
            .files
            .into_iter()
            .enumerate()
            .map(|(i, file)| Entry::try_from(file).map_err(|e| format!("files[{i}]: {e}")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Manifest {
            bucket,
            global_acl: non_empty(raw.acl),
            entries,
        })
    }
}

impl From<Entry> for RawEntry {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Literal(e) => RawEntry {
                path: Some(e.path),
                remote: Some(e.remote),
                acl: e.acl,
                ..Default::default()
            },
            Entry::Pattern(e) => RawEntry {
                pattern: Some(e.pattern),
                remote: Some(e.remote),
                acl: e.acl,
                ..Default::default()
            },
        }
    }
}

impl From<Manifest> for RawManifest {
    fn from(manifest: Manifest) -> Self {
        RawManifest {
            bucket: Some(manifest.bucket),
            acl: manifest.global_acl,
            files: manifest.entries.into_iter().map(RawEntry::from).collect(),
        }
    }
}
