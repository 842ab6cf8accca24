//! Upload Orchestration
//!
//! Walks the manifest in declaration order, resolves every entry to
//! concrete uploads and hands each one to the injected [`StorageAdapter`].
//!
//! Literal and pattern entries deliberately fail differently, see
//! [`FailurePolicy`]. Literal entries are always processed one at a time,
//! so a fail-fast abort never has in-flight work to cancel. Uploads within
//! a pattern entry may overlap up to the configured concurrency, but their
//! results are consumed in match order.

pub mod report;

pub use report::{Outcome, PublishReport, ReportEntry};

use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::manifest::{resolve_acl, Entry, LiteralEntry, Manifest, PatternEntry, MANIFEST_FILE_NAME};
use crate::resolve::{is_manifest_file, PatternExpansion, ResolvedUpload};
use crate::storage::{StorageAdapter, StorageError};
use crate::types::{PublishError, PublishResult};

/// How an upload failure affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole run with the error.
    FailFast,
    /// Record the failure in the report and continue with the next file.
    BestEffort,
}

pub struct Publisher<S> {
    storage: S,
    root: PathBuf,
    manifest_name: String,
    concurrency: usize,
    dry_run: bool,
}

impl<S: StorageAdapter> Publisher<S> {
    /// `root` is the directory literal paths and patterns are resolved against.
    pub fn new(storage: S, root: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            root: root.into(),
            manifest_name: MANIFEST_FILE_NAME.to_string(),
            concurrency: 1,
            dry_run: false,
        }
    }

    /// File name that is never published, normally the manifest's own.
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Maximum overlapping uploads within one pattern entry.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve everything but record each upload as skipped instead of sending it.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn literal_upload(&self, entry: &LiteralEntry, acl: &str) -> ResolvedUpload {
        ResolvedUpload {
            local_path: self.root.join(entry.path.trim_start_matches(['/', '\\'])),
            remote_key: entry.remote.clone(),
            effective_acl: acl.to_string(),
        }
    }

    fn expansion(&self, entry: &PatternEntry) -> PatternExpansion {
        PatternExpansion::new(&entry.pattern, &entry.remote, &self.root)
            .excluding(self.manifest_name.as_str())
    }

    /// Every upload the manifest resolves to, in publish order, without
    /// touching storage. The manifest file itself never appears.
    pub fn resolve(&self, manifest: &Manifest) -> Vec<ResolvedUpload> {
        let mut uploads = Vec::new();

        for entry in &manifest.entries {
            let acl = resolve_acl(entry.acl(), manifest.global_acl.as_deref());
            match entry {
                Entry::Literal(literal) => {
                    let upload = self.literal_upload(literal, &acl);
                    if !is_manifest_file(&upload.local_path, &self.manifest_name) {
                        uploads.push(upload);
                    }
                }
                Entry::Pattern(pattern) => {
                    uploads.extend(self.expansion(pattern).iter().map(|p| p.with_acl(&acl)));
                }
            }
        }

        uploads
    }

    /// Publish every entry of `manifest`.
    ///
    /// Returns `Err` only for fatal conditions: an empty bucket or a failed
    /// literal entry. Pattern-mode failures are inside the report.
    pub async fn publish(&self, manifest: &Manifest) -> PublishResult<PublishReport> {
        if manifest.bucket.trim().is_empty() {
            return Err(PublishError::MalformedManifest(
                "bucket must not be empty".to_string(),
            ));
        }

        let mut report = PublishReport::new();

        for entry in &manifest.entries {
            let acl = resolve_acl(entry.acl(), manifest.global_acl.as_deref());
            let policy = entry.failure_policy();
            debug!(entry = %entry.describe(), acl = %acl, ?policy, "Processing entry");

            match entry {
                Entry::Literal(literal) => {
                    let upload = self.literal_upload(literal, &acl);
                    self.publish_literal(&manifest.bucket, upload, policy, &mut report)
                        .await?;
                }
                Entry::Pattern(pattern) => {
                    self.publish_pattern(&manifest.bucket, pattern, &acl, policy, &mut report)
                        .await?;
                }
            }
        }

        info!(
            bucket = %manifest.bucket,
            uploaded = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Finished publishing assets"
        );
        Ok(report)
    }

    async fn publish_literal(
        &self,
        bucket: &str,
        upload: ResolvedUpload,
        policy: FailurePolicy,
        report: &mut PublishReport,
    ) -> PublishResult<()> {
        if is_manifest_file(&upload.local_path, &self.manifest_name) {
            debug!(path = %upload.local_path.display(), "Refusing to publish the manifest itself");
            report.record(upload.local_path, upload.remote_key, Outcome::Skipped);
            return Ok(());
        }

        let result = self.upload(bucket, &upload).await;
        self.settle(bucket, upload, result, policy, report)
    }

    async fn publish_pattern(
        &self,
        bucket: &str,
        entry: &PatternEntry,
        acl: &str,
        policy: FailurePolicy,
        report: &mut PublishReport,
    ) -> PublishResult<()> {
        let expansion = self.expansion(entry);
        let before = report.len();

        // Glob walking hits the filesystem synchronously.
        let matches = tokio::task::spawn_blocking(move || expansion.iter().collect::<Vec<_>>())
            .await
            .unwrap_or_else(|e| {
                warn!(pattern = %entry.pattern, "Pattern expansion failed: {}", e);
                Vec::new()
            });

        let mut results = stream::iter(matches.into_iter().map(|p| p.with_acl(acl)))
            .map(|upload| async move {
                let result = self.upload(bucket, &upload).await;
                (upload, result)
            })
            .buffered(self.concurrency);

        while let Some((upload, result)) = results.next().await {
            self.settle(bucket, upload, result, policy, report)?;
        }

        if report.len() == before {
            info!(pattern = %entry.pattern, "Pattern matched no files");
        }
        Ok(())
    }

    async fn upload(&self, bucket: &str, upload: &ResolvedUpload) -> Result<(), StorageError> {
        if self.dry_run {
            return Ok(());
        }
        self.storage
            .put(bucket, &upload.local_path, &upload.remote_key, &upload.effective_acl)
            .await
    }

    /// Apply `policy` to one upload result, recording it in `report`.
    fn settle(
        &self,
        bucket: &str,
        upload: ResolvedUpload,
        result: Result<(), StorageError>,
        policy: FailurePolicy,
        report: &mut PublishReport,
    ) -> PublishResult<()> {
        match result {
            Ok(()) if self.dry_run => {
                info!(
                    key = %upload.remote_key,
                    acl = %upload.effective_acl,
                    "Would upload {} to bucket {}",
                    upload.local_path.display(),
                    bucket
                );
                report.record(upload.local_path, upload.remote_key, Outcome::Skipped);
                Ok(())
            }
            Ok(()) => {
                info!(
                    key = %upload.remote_key,
                    "Uploaded {} to bucket {}",
                    upload.local_path.display(),
                    bucket
                );
                report.record(upload.local_path, upload.remote_key, Outcome::Success);
                Ok(())
            }
            Err(e) => match policy {
                FailurePolicy::FailFast => {
                    error!(key = %upload.remote_key, "Aborting publish: {}", e);
                    Err(e.into())
                }
                FailurePolicy::BestEffort => {
                    warn!(key = %upload.remote_key, "Upload failed, continuing: {}", e);
                    report.record(upload.local_path, upload.remote_key, Outcome::Failed(e.to_string()));
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::RecordingStorage;
    use std::collections::HashSet;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("contents of {relative}")).unwrap();
    }

    fn manifest(json: &str) -> Manifest {
        Manifest::from_json(json).unwrap()
    }

    #[test]
    fn test_resolve_literal_entry() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.txt");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());

        let uploads = publisher.resolve(&manifest(
            r#"{"bucket":"b","files":[{"path":"a.txt","remote":"x/a.txt","acl":"public-read"}]}"#,
        ));

        assert_eq!(
            uploads,
            vec![ResolvedUpload {
                local_path: temp_dir.path().join("a.txt"),
                remote_key: "x/a.txt".to_string(),
                effective_acl: "public-read".to_string(),
            }]
        );
    }

    #[test]
    fn test_absolute_literal_path_stays_under_root() {
        let temp_dir = TempDir::new().unwrap();
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());

        let uploads = publisher.resolve(&manifest(
            r#"{"bucket":"b","files":[
                {"path":"/etc/hostname","remote":"h"},
                {"path":"\\windows\\win.ini","remote":"w"}
            ]}"#,
        ));

        assert_eq!(uploads.len(), 2);
        assert!(uploads.iter().all(|u| u.local_path.starts_with(temp_dir.path())));
        assert_eq!(uploads[0].local_path, temp_dir.path().join("etc/hostname"));
    }

    #[test]
    fn test_global_acl_applies_to_every_upload() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.txt");
        touch(temp_dir.path(), "css/site.css");
        touch(temp_dir.path(), "css/print.css");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());

        let uploads = publisher.resolve(&manifest(
            r#"{
                "bucket": "b",
                "acl": "private",
                "files": [
                    { "path": "a.txt", "remote": "a.txt", "acl": "public-read" },
                    { "pattern": "css/*.css", "remote": "css", "acl": "public-read-write" },
                    { "pattern": "css/site.css", "remote": "again" }
                ]
            }"#,
        ));

        assert_eq!(uploads.len(), 4);
        assert!(uploads.iter().all(|u| u.effective_acl == "private"));
    }

    #[test]
    fn test_missing_acls_default_to_private() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "img/a.png");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());

        let uploads = publisher.resolve(&manifest(
            r#"{"bucket":"b","files":[
                {"path":"img/a.png","remote":"a.png"},
                {"pattern":"img/*","remote":"img","acl":""}
            ]}"#,
        ));

        assert_eq!(uploads.len(), 2);
        assert!(uploads.iter().all(|u| u.effective_acl == "private"));
    }

    #[test]
    fn test_manifest_never_resolved() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), ".publish.json");
        touch(temp_dir.path(), "index.html");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());

        let uploads = publisher.resolve(&manifest(
            r#"{"bucket":"b","files":[
                {"path":".publish.json","remote":"manifest.json"},
                {"pattern":"*","remote":"site"},
                {"pattern":".*","remote":"dot"}
            ]}"#,
        ));

        let keys: Vec<_> = uploads.iter().map(|u| u.remote_key.as_str()).collect();
        assert_eq!(keys, vec!["site/index.html"]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["assets/b.png", "assets/a.png", "assets/c.png", "readme.md"] {
            touch(temp_dir.path(), name);
        }
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());
        let manifest = manifest(
            r#"{"bucket":"b","files":[
                {"path":"readme.md","remote":"docs/readme.md"},
                {"pattern":"assets/*.png","remote":"img/"}
            ]}"#,
        );

        let first = publisher.resolve(&manifest);
        let second = publisher.resolve(&manifest);
        assert_eq!(first, second);

        let keys: HashSet<_> = first.iter().map(|u| &u.remote_key).collect();
        assert_eq!(keys.len(), first.len());
        assert!(first.iter().all(|u| !u.remote_key.contains('\\')));
    }

    #[tokio::test]
    async fn test_publish_pattern_keys_with_prefix() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "assets/a.png");
        touch(temp_dir.path(), "assets/b.png");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());

        let report = publisher
            .publish(&manifest(
                r#"{"bucket":"b","files":[{"pattern":"assets/*.png","remote":"img/","acl":"public-read"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(publisher.storage().keys(), vec!["img/a.png", "img/b.png"]);
        assert_eq!(report.succeeded(), 2);
        assert!(publisher.storage().uploads().iter().all(|u| u.bucket == "b" && u.acl == "public-read"));
    }

    #[tokio::test]
    async fn test_zero_match_pattern_completes() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.txt");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());

        let report = publisher
            .publish(&manifest(
                r#"{"bucket":"b","files":[
                    {"pattern":"nothing/*.bin","remote":"bin"},
                    {"path":"a.txt","remote":"a.txt"}
                ]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report.entries()[0].remote_key, "a.txt");
        assert_eq!(report.entries()[0].outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn test_missing_literal_file_aborts_run() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "later.txt");
        touch(temp_dir.path(), "first.txt");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());

        let err = publisher
            .publish(&manifest(
                r#"{"bucket":"b","files":[
                    {"path":"first.txt","remote":"first.txt"},
                    {"path":"missing.txt","remote":"missing.txt"},
                    {"path":"later.txt","remote":"later.txt"},
                    {"pattern":"*.txt","remote":"all"}
                ]}"#,
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::LocalRead { ref path, .. } if path.ends_with("missing.txt")));
        assert_eq!(publisher.storage().keys(), vec!["first.txt"]);
    }

    #[tokio::test]
    async fn test_literal_upload_failure_aborts_run() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.txt");
        touch(temp_dir.path(), "b.txt");
        let storage = RecordingStorage::new().failing_on("a.txt");
        let publisher = Publisher::new(storage, temp_dir.path());

        let err = publisher
            .publish(&manifest(
                r#"{"bucket":"b","files":[
                    {"path":"a.txt","remote":"a.txt"},
                    {"path":"b.txt","remote":"b.txt"}
                ]}"#,
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Upload { ref key, .. } if key == "a.txt"));
        assert!(publisher.storage().uploads().is_empty());
    }

    #[tokio::test]
    async fn test_pattern_failures_are_recorded_and_skipped_over() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.css", "b.css", "c.css"] {
            touch(temp_dir.path(), &format!("css/{name}"));
        }
        touch(temp_dir.path(), "after.txt");
        let storage = RecordingStorage::new().failing_on("static/b.css");
        let publisher = Publisher::new(storage, temp_dir.path());

        let report = publisher
            .publish(&manifest(
                r#"{"bucket":"b","files":[
                    {"pattern":"css/*.css","remote":"static"},
                    {"path":"after.txt","remote":"after.txt"}
                ]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(
            publisher.storage().keys(),
            vec!["static/a.css", "static/c.css", "after.txt"]
        );
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.failed(), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.remote_key, "static/b.css");
        assert!(matches!(&failure.outcome, Outcome::Failed(reason) if reason.contains("injected failure")));
    }

    #[tokio::test]
    async fn test_literal_manifest_entry_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), ".publish.json");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());

        let report = publisher
            .publish(&manifest(
                r#"{"bucket":"b","files":[{"path":".publish.json","remote":"leak.json"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(report.skipped(), 1);
        assert!(publisher.storage().uploads().is_empty());
    }

    #[tokio::test]
    async fn test_custom_manifest_name_is_excluded() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "deploy.json");
        touch(temp_dir.path(), "data.json");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path())
            .with_manifest_name("deploy.json");

        publisher
            .publish(&manifest(r#"{"bucket":"b","files":[{"pattern":"*.json","remote":""}]}"#))
            .await
            .unwrap();

        assert_eq!(publisher.storage().keys(), vec!["data.json"]);
    }

    #[tokio::test]
    async fn test_report_order_with_concurrency() {
        let temp_dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..20).map(|i| format!("files/{i:02}.txt")).collect();
        for name in &names {
            touch(temp_dir.path(), name);
        }
        let publisher = Publisher::new(RecordingStorage::new().failing_on("out/07.txt"), temp_dir.path())
            .with_concurrency(8);

        let report = publisher
            .publish(&manifest(r#"{"bucket":"b","files":[{"pattern":"files/*.txt","remote":"out"}]}"#))
            .await
            .unwrap();

        let keys: Vec<_> = report.entries().iter().map(|e| e.remote_key.clone()).collect();
        let expected: Vec<_> = (0..20).map(|i| format!("out/{i:02}.txt")).collect();
        assert_eq!(keys, expected);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 19);
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.txt");
        touch(temp_dir.path(), "img/logo.png");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path()).dry_run(true);

        let report = publisher
            .publish(&manifest(
                r#"{"bucket":"b","files":[
                    {"path":"a.txt","remote":"a.txt"},
                    {"pattern":"img/*","remote":"img"}
                ]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(report.skipped(), 2);
        assert!(publisher.storage().uploads().is_empty());
    }

    #[tokio::test]
    async fn test_empty_bucket_rejected_before_upload() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.txt");
        let publisher = Publisher::new(RecordingStorage::new(), temp_dir.path());
        let mut manifest = Manifest::template();
        manifest.bucket = String::new();

        let err = publisher.publish(&manifest).await.unwrap_err();
        assert!(matches!(err, PublishError::MalformedManifest(_)));
        assert!(publisher.storage().uploads().is_empty());
    }
}
