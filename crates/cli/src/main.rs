use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::commands;
use codectx_core::config;
use codectx_core::AppContext;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    let ctx = AppContext::from_config(cfg)?;

    match cli.command {
        Commands::Scan { root, json } => {
            let view = commands::scan(&ctx, &root).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                for p in &view.paths {
                    println!("{}", p);
                }
                println!("scan: {} files, {} bytes", view.files, view.bytes);
            }
        }
        Commands::Tree { root, json } => {
            let entries = commands::tree(&ctx, &root);
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for e in entries {
                    println!("{:?}\t{}", e.kind, e.path);
                }
            }
        }
        Commands::Search {
            root,
            query,
            topk,
            json,
        } => {
            let topk = topk.unwrap_or(ctx.config().retrieval.max_results);
            let hits = commands::search(&ctx, &root, &query, topk).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                for h in hits {
                    println!("{:.4}\t{}\t{}", h.distance, h.path, h.snippet);
                }
            }
        }
        Commands::Apply {
            root,
            path,
            content,
            from_file,
            json,
        } => {
            let content = commands::read_content(content, from_file.as_deref())?;
            let result = commands::apply(&ctx, &root, &path, content).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.success {
                println!("{}", result.message.as_deref().unwrap_or("ok"));
            } else {
                eprintln!("error: {}", result.error.as_deref().unwrap_or("unknown"));
            }
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Diff {
            root,
            path,
            content,
            from_file,
        } => {
            let content = commands::read_content(content, from_file.as_deref())?;
            print!("{}", commands::diff(&root, &path, &content)?);
        }
        Commands::Checkpoint {
            root,
            message,
            json,
        } => {
            let snap = commands::checkpoint(&ctx, &root, &message).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snap)?);
            } else {
                match snap {
                    Some(s) => println!("snapshot {}", s.id),
                    None => println!("no snapshot recorded"),
                }
            }
        }
        Commands::History { root, limit, json } => {
            let snaps = commands::history(&ctx, &root, limit).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snaps)?);
            } else {
                for s in snaps {
                    println!("{}\t{}\t{}", &s.id[..s.id.len().min(12)], s.timestamp, s.message);
                }
            }
        }
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "codectx")]
#[command(about = "Repository context indexing and safe file mutation", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the files that would be indexed
    Scan {
        root: PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List non-ignored files and directories
    Tree {
        root: PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Index a project and run a semantic query against it
    Search {
        root: PathBuf,
        /// Query text to embed and search
        query: String,
        /// Number of results (defaults to retrieval.max_results)
        #[arg(short, long)]
        topk: Option<usize>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a file inside the project, with snapshots before and after
    Apply {
        root: PathBuf,
        /// Path relative to root
        path: String,
        /// New file content
        #[arg(long, conflicts_with = "from_file")]
        content: Option<String>,
        /// Read new content from a file (`-` for stdin)
        #[arg(long)]
        from_file: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the unified diff a change would make, without applying it
    Diff {
        root: PathBuf,
        /// Path relative to root
        path: String,
        /// Proposed content
        #[arg(long, conflicts_with = "from_file")]
        content: Option<String>,
        /// Read proposed content from a file (`-` for stdin)
        #[arg(long)]
        from_file: Option<String>,
    },
    /// Snapshot the working tree if it has changes
    Checkpoint {
        root: PathBuf,
        #[arg(short, long, default_value = "manual checkpoint")]
        message: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent snapshots
    History {
        root: PathBuf,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}
