use anyhow::{Context, Result};
use codectx_core::models::TreeEntry;
use codectx_core::{mutator, paths};
use codectx_core::{AppContext, Document, MutationResult, Snapshot};
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct ScanView {
    pub root: String,
    pub files: usize,
    pub bytes: u64,
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HitView {
    pub path: String,
    pub size: u64,
    pub distance: f32,
    pub snippet: String,
}

const SNIPPET_CHARS: usize = 160;

pub async fn scan(ctx: &AppContext, root: &Path) -> Result<ScanView> {
    let docs = ctx
        .scan(root)
        .await
        .with_context(|| format!("scan {}", root.display()))?;
    Ok(ScanView {
        root: root.display().to_string(),
        files: docs.len(),
        bytes: docs.iter().map(|d| d.size).sum(),
        paths: docs.into_iter().map(|d| d.path).collect(),
    })
}

/// Non-ignored files and directories under `root`.
pub fn tree(ctx: &AppContext, root: &Path) -> Vec<TreeEntry> {
    ctx.scanner(root).list_entries()
}

/// Indexes `root` in-process, then answers `query` against it.
pub async fn search(
    ctx: &AppContext,
    root: &Path,
    query: &str,
    topk: usize,
) -> Result<Vec<HitView>> {
    ctx.index_project(root)
        .await
        .with_context(|| format!("index {}", root.display()))?;
    let hits = ctx
        .index()
        .search_scored(query, topk)
        .await
        .context("search")?;
    Ok(hits
        .into_iter()
        .map(|(doc, distance)| HitView {
            snippet: snippet(&doc),
            path: doc.path,
            size: doc.size,
            distance,
        })
        .collect())
}

pub async fn apply(
    ctx: &AppContext,
    root: &Path,
    path: &str,
    content: String,
) -> MutationResult {
    ctx.apply(root, path, content).await
}

/// Unified diff between the current file (empty if missing) and `new_content`.
pub fn diff(root: &Path, path: &str, new_content: &str) -> Result<String> {
    let target = paths::resolve_within(root, path)?;
    let original = match fs::read(&target) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("read {}", target.display())),
    };
    Ok(mutator::diff(path, &original, new_content))
}

pub async fn checkpoint(ctx: &AppContext, root: &Path, message: &str) -> Option<Snapshot> {
    ctx.checkpoint(root, message).await
}

pub async fn history(ctx: &AppContext, root: &Path, limit: usize) -> Vec<Snapshot> {
    ctx.history(root, limit).await
}

/// Content from `--content`, or from a file (`-` reads stdin).
pub fn read_content(inline: Option<String>, from_file: Option<&str>) -> Result<String> {
    match (inline, from_file) {
        (Some(text), _) => Ok(text),
        (None, Some("-")) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            Ok(buf)
        }
        (None, Some(file)) => fs::read_to_string(file).with_context(|| format!("read {}", file)),
        (None, None) => anyhow::bail!("either --content or --from-file is required"),
    }
}

fn snippet(doc: &Document) -> String {
    let first: String = doc.content.chars().take(SNIPPET_CHARS).collect();
    first.replace('\n', " ")
}
