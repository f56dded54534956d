//! Snapshot-guarded file writes confined to one project root.
//!
//! `apply` walks a fixed sequence:
//!
//! ```text
//! Idle -> Validating -> Failed(PathTraversal)
//!                    -> SnapshottingPre -> Writing -> Failed(Io)
//!                                                  -> SnapshottingPost -> Done
//! ```
//!
//! Validation happens before the per-root lock is taken and has no side effects. Writes
//! replace the whole file through a temp file and rename, so readers never see a
//! truncated file. Checkpoint outcomes never change the result.

use crate::error::{CoreError, Result};
use crate::models::{MutationResult, Snapshot};
use crate::paths;
use crate::snapshot::SnapshotStore;
use similar::TextDiff;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStage {
    Idle,
    Validating,
    SnapshottingPre,
    Writing,
    SnapshottingPost,
    Done,
    Failed,
}

pub struct SafeMutator {
    root: PathBuf,
    snapshots: Arc<SnapshotStore>,
    lock: Mutex<()>,
}

impl SafeMutator {
    pub fn new(root: &Path, snapshots: Arc<SnapshotStore>) -> Result<Self> {
        Ok(Self {
            root: paths::canonical_root(root)?,
            snapshots,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    /// Containment check: the absolute target for `relative_path`, which must name a
    /// location strictly inside the root.
    pub fn validate(&self, relative_path: &str) -> Result<PathBuf> {
        let target = paths::resolve_within(&self.root, relative_path)?;
        if target == self.root {
            return Err(CoreError::traversal(
                relative_path,
                "does not name a file inside the project root",
            ));
        }
        Ok(target)
    }

    /// Replaces the file at `relative_path` with `new_content`, bracketed by checkpoints.
    pub fn apply(&self, relative_path: &str, new_content: &str) -> MutationResult {
        trace_stage(relative_path, MutationStage::Validating);
        match self.validate(relative_path) {
            Ok(target) => self.apply_validated(relative_path, &target, new_content),
            Err(e) => {
                warn!("Rejected change to {:?}: {}", relative_path, e);
                trace_stage(relative_path, MutationStage::Failed);
                MutationResult::failed(relative_path, e.to_string())
            }
        }
    }

    /// Steps after validation. `target` must come from [`validate`](Self::validate).
    pub(crate) fn apply_validated(
        &self,
        relative_path: &str,
        target: &Path,
        new_content: &str,
    ) -> MutationResult {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        trace_stage(relative_path, MutationStage::SnapshottingPre);
        self.snapshots
            .checkpoint(&format!("pre-change: {}", relative_path));

        trace_stage(relative_path, MutationStage::Writing);
        if let Err(e) = write_atomic(target, new_content.as_bytes()) {
            error!("Failed to apply change to {}: {}", relative_path, e);
            trace_stage(relative_path, MutationStage::Failed);
            return MutationResult::failed(relative_path, e.to_string());
        }

        trace_stage(relative_path, MutationStage::SnapshottingPost);
        self.snapshots
            .checkpoint(&format!("post-change: {}", relative_path));

        trace_stage(relative_path, MutationStage::Done);
        info!("Updated {}", relative_path);
        MutationResult::ok(relative_path, format!("Updated {}", relative_path))
    }

    /// Manual checkpoint, serialized with [`apply`](Self::apply) so it never lands between
    /// a change's pre and post snapshots.
    pub fn checkpoint(&self, message: &str) -> Option<Snapshot> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.snapshots.checkpoint(message)
    }

    /// Current content of a file inside the root, decoded lossily.
    pub fn read(&self, relative_path: &str) -> Result<String> {
        let target = self.validate(relative_path)?;
        let bytes = fs::read(&target).map_err(|e| CoreError::io(&target, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Unified diff between two versions of `path`, for display only. Empty when equal.
pub fn diff(path: &str, original: &str, new: &str) -> String {
    TextDiff::from_lines(original, new)
        .unified_diff()
        .context_radius(3)
        .header(path, path)
        .to_string()
}

fn trace_stage(path: &str, stage: MutationStage) {
    debug!(path, ?stage, "mutation stage");
}

fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| CoreError::traversal(&target.to_string_lossy(), "no parent directory"))?;
    fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| CoreError::io(parent, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| CoreError::io(tmp.path(), e))?;

    match fs::metadata(target) {
        Ok(meta) => {
            fs::set_permissions(tmp.path(), meta.permissions())
                .map_err(|e| CoreError::io(tmp.path(), e))?;
        }
        Err(_) => set_new_file_permissions(tmp.path())?,
    }

    tmp.persist(target)
        .map_err(|e| CoreError::io(target, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_new_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644)).map_err(|e| CoreError::io(path, e))
}

#[cfg(not(unix))]
fn set_new_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
