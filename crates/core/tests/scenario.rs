use codectx_core::config::AppConfig;
use codectx_core::mutator::SafeMutator;
use codectx_core::scanner::RepoScanner;
use codectx_core::snapshot::SnapshotStore;
use codectx_core::{AppContext, Document};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn config(snapshots: bool) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.embeddings.dimension = 128;
    cfg.snapshots.enabled = snapshots;
    cfg
}

fn messages(history: &[codectx_core::Snapshot]) -> Vec<String> {
    history
        .iter()
        .map(|s| s.message.split(" - ").next().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn empty_root_write_scan_search() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let ctx = AppContext::from_config(config(false)).unwrap();

    assert!(ctx.scan(root).await.unwrap().is_empty());

    let res = ctx.apply(root, "a.py", "print(1)".to_string()).await;
    assert!(res.success, "{:?}", res.error);
    assert_eq!(fs::read_to_string(root.join("a.py")).unwrap(), "print(1)");

    let docs = ctx.scan(root).await.unwrap();
    assert_eq!(
        docs,
        vec![Document {
            path: "a.py".into(),
            content: "print(1)".into(),
            size: 8,
        }]
    );

    ctx.index().build(docs).await.unwrap();
    let hits = ctx.index().search("print", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "a.py");
}

#[tokio::test]
async fn traversal_creates_nothing_anywhere() {
    let outer = tempfile::tempdir().unwrap();
    let root = outer.path().join("project");
    fs::create_dir(&root).unwrap();
    let ctx = AppContext::from_config(config(false)).unwrap();

    let res = ctx.apply(&root, "../../etc/passwd", "x".into()).await;
    assert!(!res.success);
    assert!(res.error.as_deref().unwrap_or_default().contains("path traversal"));

    let res = ctx.apply(&root, "../sibling.txt", "x".into()).await;
    assert!(!res.success);
    assert!(!outer.path().join("sibling.txt").exists());
    assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
}

#[tokio::test]
async fn ignored_trees_never_reach_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join(".gitignore"), "dist/\n").unwrap();
    for rel in [
        "dist/a/b/c/bundle.js",
        "node_modules/left-pad/index.js",
        "src/main.ts",
    ] {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, "export const value = 1;").unwrap();
    }

    let ctx = AppContext::from_config(config(false)).unwrap();
    assert_eq!(ctx.index_project(root).await.unwrap(), 1);
    let hits = ctx.retrieve("export const value", Some(10)).await;
    let paths: Vec<&str> = hits.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(paths, vec!["src/main.ts"]);
}

#[tokio::test]
async fn git_snapshots_bracket_each_change() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let ctx = AppContext::from_config(config(true)).unwrap();

    // Untracked work already in the tree makes the pre-change checkpoint fire.
    fs::write(root.join("notes.md"), "draft").unwrap();
    let res = ctx.apply(root, "new/dir/a.txt", "hello".into()).await;
    assert!(res.success, "{:?}", res.error);
    assert_eq!(
        fs::read_to_string(root.join("new/dir/a.txt")).unwrap(),
        "hello"
    );

    let history = ctx.history(root, 10).await;
    assert_eq!(
        messages(&history),
        vec!["post-change: new/dir/a.txt", "pre-change: new/dir/a.txt"]
    );

    // Clean tree: only the post-change checkpoint is recorded.
    let res = ctx.apply(root, "new/dir/a.txt", "hello again".into()).await;
    assert!(res.success);
    let history = ctx.history(root, 10).await;
    assert_eq!(history.len(), 3);
    assert!(history[0].message.starts_with("post-change: new/dir/a.txt - "));

    assert!(ctx.checkpoint(root, "manual").await.is_none());
}

#[test]
fn mutators_can_share_a_store_with_scanning() {
    let dir = tempfile::tempdir().unwrap();
    let root: &Path = dir.path();
    let store = Arc::new(SnapshotStore::detached(root).unwrap());
    let mutator = SafeMutator::new(root, store).unwrap();

    assert!(mutator.apply("pkg/mod.rs", "pub mod inner;").success);
    assert!(mutator.apply("pkg/mod.txt", "not indexed").success);

    let docs = RepoScanner::new(root).scan();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].path, "pkg/mod.rs");

    let before = mutator.read("pkg/mod.rs").unwrap();
    let diff = codectx_core::mutator::diff("pkg/mod.rs", &before, "pub mod other;\n");
    assert!(diff.contains("-pub mod inner;"));
    assert!(diff.contains("+pub mod other;"));
    // diff is display-only
    assert_eq!(mutator.read("pkg/mod.rs").unwrap(), "pub mod inner;");
}
