//! Walks a project root and collects indexable documents.
//!
//! Ignored directories are pruned during the walk so nothing beneath them is visited.
//! Ignore rules are the built-in junk names from [`ScanConfig::ignore_dirs`] plus the
//! patterns of the root `.gitignore`.

use crate::config::ScanConfig;
use crate::models::{Document, EntryKind, TreeEntry};
use crate::paths;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

pub struct RepoScanner {
    root: PathBuf,
    extensions: HashSet<String>,
    builtin: GlobSet,
    gitignore: Option<Gitignore>,
}

impl RepoScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_config(root, &ScanConfig::default())
    }

    pub fn with_config(root: impl AsRef<Path>, cfg: &ScanConfig) -> Self {
        let root = root.as_ref().to_path_buf();
        let extensions = cfg
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        let builtin = build_name_set(&cfg.ignore_dirs);
        let gitignore = load_gitignore(&root);
        Self {
            root,
            extensions,
            builtin,
            gitignore,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Supported, non-ignored files under the root in depth-first, name-sorted order.
    pub fn scan(&self) -> Vec<Document> {
        if !self.root.is_dir() {
            error!("Root path {} does not exist", self.root.display());
            return Vec::new();
        }

        let mut documents = Vec::new();
        for entry in self.walk() {
            if !is_file_like(&entry) || !self.is_supported(entry.path()) {
                continue;
            }
            let Some(rel) = paths::relative_display(&self.root, entry.path()) else {
                continue;
            };
            if let Err(e) = paths::resolve_within(&self.root, &rel) {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
            match fs::read(entry.path()) {
                Ok(bytes) => documents.push(Document {
                    path: rel,
                    size: bytes.len() as u64,
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                }),
                Err(e) => error!("Error reading {}: {}", entry.path().display(), e),
            }
        }

        info!(
            "Scanned {} files in {}",
            documents.len(),
            self.root.display()
        );
        documents
    }

    /// Every non-ignored file and directory below the root, regardless of extension.
    pub fn list_entries(&self) -> Vec<TreeEntry> {
        if !self.root.is_dir() {
            error!("Root path {} does not exist", self.root.display());
            return Vec::new();
        }

        let mut entries = Vec::new();
        for entry in self.walk() {
            if entry.depth() == 0 {
                continue;
            }
            let Some(rel) = paths::relative_display(&self.root, entry.path()) else {
                continue;
            };
            let kind = if entry.file_type().is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(TreeEntry {
                path: rel,
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries
    }

    fn walk(&self) -> impl Iterator<Item = DirEntry> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| e.depth() == 0 || !self.is_ignored(e))
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!("Failed to read entry: {}", err);
                    None
                }
            })
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return true;
        };
        if self.builtin.is_match(rel) {
            debug!("Ignoring {} (built-in)", rel.display());
            return true;
        }
        if let Some(gi) = &self.gitignore {
            if gi.matched(path, entry.file_type().is_dir()).is_ignore() {
                debug!("Ignoring {} (.gitignore)", rel.display());
                return true;
            }
        }
        false
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(e))
            .unwrap_or(false)
    }
}

fn is_file_like(entry: &DirEntry) -> bool {
    let ft = entry.file_type();
    if ft.is_file() {
        return true;
    }
    // Symlinked files are indexed if they point at a regular file; containment is
    // checked separately.
    ft.is_symlink()
        && fs::metadata(entry.path())
            .map(|m| m.is_file())
            .unwrap_or(false)
}

fn build_name_set(names: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for name in names {
        match GlobBuilder::new(&format!("**/{}", name))
            .literal_separator(true)
            .build()
        {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("Invalid ignore name {:?}: {}", name, e),
        }
    }
    builder.build().unwrap_or_else(|e| {
        error!("Failed to build ignore set: {}", e);
        GlobSet::empty()
    })
}

fn load_gitignore(root: &Path) -> Option<Gitignore> {
    let path = root.join(".gitignore");
    if !path.is_file() {
        return None;
    }
    let mut builder = GitignoreBuilder::new(root);
    if let Some(e) = builder.add(&path) {
        error!("Error reading .gitignore: {}", e);
    }
    match builder.build() {
        Ok(gi) => Some(gi),
        Err(e) => {
            error!("Error reading .gitignore: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    fn paths_of(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.path.as_str()).collect()
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = RepoScanner::new(dir.path().join("nope"));
        assert!(scanner.scan().is_empty());
        assert!(scanner.list_entries().is_empty());
    }

    #[test]
    fn only_supported_extensions_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.py", b"print(1)");
        write(dir.path(), "notes.txt", b"skip me");
        write(dir.path(), "src/lib.rs", b"pub fn x() {}");
        write(dir.path(), "Makefile", b"all:");

        let docs = RepoScanner::new(dir.path()).scan();
        assert_eq!(paths_of(&docs), vec!["main.py", "src/lib.rs"]);
        assert_eq!(docs[0].content, "print(1)");
        assert_eq!(docs[0].size, 8);
    }

    #[test]
    fn builtin_dirs_are_pruned_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "node_modules/pkg/index.js", b"x");
        write(dir.path(), "a/b/__pycache__/c/d.py", b"x");
        write(dir.path(), ".git/hooks/pre-commit.sh", b"x");
        write(dir.path(), "a/keep.js", b"x");

        let docs = RepoScanner::new(dir.path()).scan();
        assert_eq!(paths_of(&docs), vec!["a/keep.js"]);
    }

    #[test]
    fn gitignore_patterns_apply() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".gitignore",
            b"build/\n*.generated.ts\n/top.md\n!keep.generated.ts\n",
        );
        write(dir.path(), "build/deep/nested/out.js", b"x");
        write(dir.path(), "src/build/also.js", b"x");
        write(dir.path(), "src/api.generated.ts", b"x");
        write(dir.path(), "src/keep.generated.ts", b"x");
        write(dir.path(), "top.md", b"x");
        write(dir.path(), "docs/top.md", b"x");
        write(dir.path(), "src/app.ts", b"x");

        let docs = RepoScanner::new(dir.path()).scan();
        assert_eq!(
            paths_of(&docs),
            vec!["docs/top.md", "src/app.ts", "src/keep.generated.ts"]
        );
    }

    #[test]
    fn negation_cannot_reach_into_a_pruned_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".gitignore", b"build/\n!build/keep.js\n");
        write(dir.path(), "build/keep.js", b"x");
        write(dir.path(), "build/drop.js", b"x");
        write(dir.path(), "src/app.js", b"x");

        let scanner = RepoScanner::new(dir.path());
        assert_eq!(paths_of(&scanner.scan()), vec!["src/app.js"]);
        assert!(scanner
            .list_entries()
            .iter()
            .all(|e| !e.path.starts_with("build")));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.py", &[b'o', b'k', 0xff, 0xfe, b'!']);
        let docs = RepoScanner::new(dir.path()).scan();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.starts_with("ok"));
        assert!(docs[0].content.ends_with('!'));
        assert_eq!(docs[0].size, 5);
    }

    #[test]
    fn repeated_scans_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["z.rs", "a.rs", "m/b.go", "m/a.go", "k.md"] {
            write(dir.path(), name, name.as_bytes());
        }
        let scanner = RepoScanner::new(dir.path());
        assert_eq!(scanner.scan(), scanner.scan());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_leaving_root_are_skipped() {
        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "secret.py", b"token = 1");
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "inside.py", b"x = 1");
        std::os::unix::fs::symlink(
            outside.path().join("secret.py"),
            dir.path().join("link.py"),
        )
        .unwrap();

        let docs = RepoScanner::new(dir.path()).scan();
        assert_eq!(paths_of(&docs), vec!["inside.py"]);
    }

    #[test]
    fn custom_config_changes_rules() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "vendor/lib.rs", b"x");
        write(dir.path(), "notes.txt", b"x");
        let cfg = ScanConfig {
            extensions: vec![".txt".into(), "rs".into()],
            ignore_dirs: vec!["vendor".into()],
        };
        let docs = RepoScanner::with_config(dir.path(), &cfg).scan();
        assert_eq!(paths_of(&docs), vec!["notes.txt"]);
    }

    #[test]
    fn list_entries_reports_dirs_and_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", b"x");
        write(dir.path(), "README", b"x");
        write(dir.path(), "node_modules/x.js", b"x");

        let entries = RepoScanner::new(dir.path()).list_entries();
        let listed: Vec<(&str, EntryKind)> =
            entries.iter().map(|e| (e.path.as_str(), e.kind)).collect();
        assert_eq!(
            listed,
            vec![
                ("README", EntryKind::File),
                ("src", EntryKind::Directory),
                ("src/main.rs", EntryKind::File),
            ]
        );
    }
}
