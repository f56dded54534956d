use serde::{Deserialize, Serialize};

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "tsx", "jsx", "json", "md", "html", "css", "java", "c", "cpp", "rs", "go",
    "yml", "yaml", "sql", "sh",
];

pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".env",
    ".idea",
    ".vscode",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub embeddings: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub snapshots: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Extensions without the leading dot.
    pub extensions: Vec<String>,
    /// Directory or file names pruned wherever they appear.
    pub ignore_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `hashing` (local) or `openai` (any OpenAI-compatible endpoint).
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: crate::search::DEFAULT_MAX_RESULTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    pub author_name: String,
    pub author_email: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            author_name: "codectx".to_string(),
            author_email: "codectx@localhost".to_string(),
        }
    }
}

/// Layers `config/default` (optional), an explicit file and `CODECTX__*` env vars over
/// built-in defaults. List keys take comma-separated values, e.g.
/// `CODECTX__SCAN__EXTENSIONS=rs,toml`.
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("CODECTX")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("scan.extensions")
            .with_list_parse_key("scan.ignore_dirs"),
    );
    let cfg = settings.build()?;
    let app: AppConfig = cfg.try_deserialize()?;
    validate(&app)?;
    Ok(app)
}

fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.embeddings.dimension == 0 {
        anyhow::bail!("embeddings.dimension must be greater than zero");
    }
    if cfg.retrieval.max_results == 0 {
        anyhow::bail!("retrieval.max_results must be greater than zero");
    }
    Ok(())
}
