//! Path containment: the single boundary every scan result and every write goes through.

use crate::error::{CoreError, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Canonical form of an existing root directory.
pub fn canonical_root(root: &Path) -> Result<PathBuf> {
    match fs::canonicalize(root) {
        Ok(p) if p.is_dir() => Ok(p),
        Ok(p) => Err(CoreError::NotFound(p)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CoreError::NotFound(root.into())),
        Err(e) => Err(CoreError::io(root, e)),
    }
}

/// Resolves `relative` against `root` and returns the absolute canonical target, which may
/// not exist yet. Fails with `PathTraversal` if the target lies outside the canonical root
/// or if any step of the resolution errors.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf> {
    let canonical_root = fs::canonicalize(root)
        .map_err(|e| CoreError::traversal(relative, format!("cannot resolve root: {}", e)))?;
    let resolved = resolve_lenient(&canonical_root, Path::new(relative))
        .map_err(|e| CoreError::traversal(relative, e.to_string()))?;
    if !resolved.starts_with(&canonical_root) {
        return Err(CoreError::traversal(
            relative,
            "resolves outside the project root",
        ));
    }
    Ok(resolved)
}

/// Like `canonicalize`, but tolerates a missing tail: existing components are resolved
/// through symlinks, missing ones are appended as-is.
fn resolve_lenient(base: &Path, relative: &Path) -> io::Result<PathBuf> {
    let mut resolved = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Prefix(prefix) => resolved = PathBuf::from(prefix.as_os_str()),
            Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                let candidate = resolved.join(name);
                resolved = match fs::symlink_metadata(&candidate) {
                    Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(&candidate)?,
                    Ok(_) => candidate,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => candidate,
                    Err(e) => return Err(e),
                };
            }
        }
    }
    Ok(resolved)
}

/// `path` relative to `root`, `/`-separated.
pub fn relative_display(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}
