//! Best-effort checkpoints of the working tree in a version-control backend.
//!
//! History is an audit aid: every backend failure is logged and absorbed here, and never
//! reaches the operation that asked for the checkpoint.

use crate::config::SnapshotConfig;
use crate::error::{CoreError, Result};
use crate::models::Snapshot;
use crate::paths;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, error, info};

pub trait VersionControl: Send + Sync {
    /// True if anything differs from HEAD, untracked files included.
    fn is_dirty(&self) -> Result<bool>;
    fn stage_all(&self) -> Result<()>;
    /// Commits the staged tree and returns the new snapshot id.
    fn commit(&self, message: &str) -> Result<String>;
    /// Most recent first.
    fn log(&self, limit: usize) -> Result<Vec<Snapshot>>;
}

/// Drives the `git` executable against one working tree.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    author_name: String,
    author_email: String,
}

const FIELD_SEP: char = '\u{1f}';

impl GitCli {
    pub fn open(root: &Path, settings: &SnapshotConfig) -> Result<Self> {
        let git = Self::unchecked(root, settings);
        git.run(&["rev-parse", "--git-dir"])?;
        Ok(git)
    }

    pub fn init(root: &Path, settings: &SnapshotConfig) -> Result<Self> {
        info!("Initializing git repo in {}", root.display());
        let git = Self::unchecked(root, settings);
        git.run(&["init", "-q"])?;
        Ok(git)
    }

    /// Opens the repository at `root`, creating one if `root/.git` is missing.
    pub fn attach(root: &Path, settings: &SnapshotConfig) -> Result<Self> {
        if root.join(".git").exists() {
            Self::open(root, settings)
        } else {
            Self::init(root, settings)
        }
    }

    fn unchecked(root: &Path, settings: &SnapshotConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            author_name: settings.author_name.clone(),
            author_email: settings.author_email.clone(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .arg("-c")
            .arg(format!("user.name={}", self.author_name))
            .arg("-c")
            .arg(format!("user.email={}", self.author_email))
            .arg("-c")
            .arg("commit.gpgsign=false")
            .args(args)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .output()
            .map_err(|e| CoreError::VersionControl(format!("failed to run git: {}", e)))?;
        if !output.status.success() {
            return Err(CoreError::VersionControl(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn has_head(&self) -> bool {
        self.run(&["rev-parse", "--verify", "-q", "HEAD"]).is_ok()
    }
}

impl VersionControl for GitCli {
    fn is_dirty(&self) -> Result<bool> {
        let status = self.run(&["status", "--porcelain", "--untracked-files=all"])?;
        Ok(!status.trim().is_empty())
    }

    fn stage_all(&self) -> Result<()> {
        self.run(&["add", "-A", "--", "."])?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        self.run(&["commit", "-q", "--no-verify", "-m", message])?;
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    fn log(&self, limit: usize) -> Result<Vec<Snapshot>> {
        if !self.has_head() {
            return Ok(Vec::new());
        }
        let limit = limit.to_string();
        let out = self.run(&["log", "-n", &limit, "--format=%H%x1f%cI%x1f%s"])?;
        Ok(out.lines().filter_map(parse_log_line).collect())
    }
}

fn parse_log_line(line: &str) -> Option<Snapshot> {
    let mut fields = line.splitn(3, FIELD_SEP);
    let id = fields.next()?.trim();
    let timestamp = fields.next()?;
    let message = fields.next()?;
    if id.is_empty() {
        return None;
    }
    Some(Snapshot {
        id: id.to_string(),
        timestamp: timestamp.to_string(),
        message: message.to_string(),
    })
}

pub struct SnapshotStore {
    root: PathBuf,
    backend: Option<Box<dyn VersionControl>>,
    // Serializes backend commands; git refuses concurrent index writers.
    lock: Mutex<()>,
}

impl SnapshotStore {
    /// Attaches to (or initializes) the git repository at `root`. A missing root is an
    /// error; a backend that cannot be set up only leaves the store detached.
    pub fn ensure_repo(root: &Path, settings: &SnapshotConfig) -> Result<Self> {
        let root = paths::canonical_root(root)?;
        let backend: Option<Box<dyn VersionControl>> = match GitCli::attach(&root, settings) {
            Ok(git) => Some(Box::new(git)),
            Err(e) => {
                error!("Failed to init git repo: {}", e);
                None
            }
        };
        Ok(Self {
            root,
            backend,
            lock: Mutex::new(()),
        })
    }

    pub fn with_backend(root: &Path, backend: Box<dyn VersionControl>) -> Result<Self> {
        Ok(Self {
            root: paths::canonical_root(root)?,
            backend: Some(backend),
            lock: Mutex::new(()),
        })
    }

    /// A store that records nothing.
    pub fn detached(root: &Path) -> Result<Self> {
        Ok(Self {
            root: paths::canonical_root(root)?,
            backend: None,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_attached(&self) -> bool {
        self.backend.is_some()
    }

    /// Commits everything under the root if the tree is dirty. Returns the new snapshot,
    /// or `None` for a clean tree, a detached store or a failed commit.
    pub fn checkpoint(&self, message: &str) -> Option<Snapshot> {
        let backend = self.backend.as_ref()?;
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let timestamp = chrono::Local::now().to_rfc3339();
        let full_message = format!("{} - {}", message, timestamp);
        let result = backend.is_dirty().and_then(|dirty| {
            if !dirty {
                return Ok(None);
            }
            backend.stage_all()?;
            backend.commit(&full_message).map(Some)
        });

        match result {
            Ok(Some(id)) => {
                info!("Created git snapshot {} ({})", id, message);
                Some(Snapshot {
                    id,
                    timestamp,
                    message: full_message,
                })
            }
            Ok(None) => {
                debug!("Working tree clean, no snapshot for {:?}", message);
                None
            }
            Err(e) => {
                error!("Snapshot failed: {}", e);
                None
            }
        }
    }

    /// Up to `limit` snapshots, most recent first. Failures yield an empty list.
    pub fn history(&self, limit: usize) -> Vec<Snapshot> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        backend.log(limit).unwrap_or_else(|e| {
            error!("Reading snapshot history failed: {}", e);
            Vec::new()
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Arc;

    pub fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// In-memory backend that records every call.
    #[derive(Clone, Default)]
    pub struct RecordingBackend {
        pub calls: Arc<Mutex<Vec<String>>>,
        pub dirty: Arc<Mutex<bool>>,
        pub fail_commit: bool,
    }

    impl RecordingBackend {
        pub fn dirty() -> Self {
            let b = Self::default();
            *b.dirty.lock().unwrap() = true;
            b
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl VersionControl for RecordingBackend {
        fn is_dirty(&self) -> Result<bool> {
            self.calls.lock().unwrap().push("is_dirty".into());
            Ok(*self.dirty.lock().unwrap())
        }

        fn stage_all(&self) -> Result<()> {
            self.calls.lock().unwrap().push("stage_all".into());
            Ok(())
        }

        fn commit(&self, message: &str) -> Result<String> {
            self.calls.lock().unwrap().push(format!("commit:{}", message));
            if self.fail_commit {
                return Err(CoreError::VersionControl("disk full".into()));
            }
            Ok(format!("snap{}", self.calls.lock().unwrap().len()))
        }

        fn log(&self, _limit: usize) -> Result<Vec<Snapshot>> {
            Err(CoreError::VersionControl("no log".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{git_available, RecordingBackend};
    use super::*;
    use std::fs;

    #[test]
    fn clean_tree_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::default();
        let store = SnapshotStore::with_backend(dir.path(), Box::new(backend.clone())).unwrap();
        assert!(store.checkpoint("pre-change: a.py").is_none());
        assert_eq!(backend.calls(), vec!["is_dirty"]);
    }

    #[test]
    fn dirty_tree_stages_and_commits_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::dirty();
        let store = SnapshotStore::with_backend(dir.path(), Box::new(backend.clone())).unwrap();
        let snap = store.checkpoint("pre-change: a.py").unwrap();
        assert!(snap.message.starts_with("pre-change: a.py - "));
        let calls = backend.calls();
        assert_eq!(calls[0], "is_dirty");
        assert_eq!(calls[1], "stage_all");
        assert!(calls[2].starts_with("commit:pre-change: a.py - "));
    }

    #[test]
    fn commit_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend {
            fail_commit: true,
            ..RecordingBackend::dirty()
        };
        let store = SnapshotStore::with_backend(dir.path(), Box::new(backend)).unwrap();
        assert!(store.checkpoint("x").is_none());
        assert!(store.history(5).is_empty());
    }

    #[test]
    fn detached_store_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::detached(dir.path()).unwrap();
        assert!(!store.is_attached());
        assert!(store.checkpoint("x").is_none());
    }

    #[test]
    fn missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        assert!(matches!(
            SnapshotStore::ensure_repo(&gone, &SnapshotConfig::default()),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn parses_log_lines() {
        let line = format!("abc123{0}2026-01-02T03:04:05+00:00{0}post-change: a.py - t", FIELD_SEP);
        let snap = parse_log_line(&line).unwrap();
        assert_eq!(snap.id, "abc123");
        assert_eq!(snap.timestamp, "2026-01-02T03:04:05+00:00");
        assert_eq!(snap.message, "post-change: a.py - t");
        assert!(parse_log_line("garbage").is_none());
    }

    #[test]
    fn git_backend_commits_only_dirty_trees() {
        if !git_available() {
            eprintln!("git not found, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let settings = SnapshotConfig::default();
        let store = SnapshotStore::ensure_repo(dir.path(), &settings).unwrap();
        assert!(store.is_attached());
        assert!(dir.path().join(".git").exists());
        assert!(store.history(10).is_empty());

        assert!(store.checkpoint("empty").is_none());

        fs::write(dir.path().join("a.py"), "print(1)").unwrap();
        let snap = store.checkpoint("first").unwrap();
        assert!(store.checkpoint("clean again").is_none());

        let again = SnapshotStore::ensure_repo(dir.path(), &settings).unwrap();
        let history = again.history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, snap.id);
        assert!(history[0].message.starts_with("first - "));
    }
}
