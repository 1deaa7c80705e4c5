//! # pdf-chat CLI
//!
//! ```bash
//! pdf-chat serve --bind 0.0.0.0:8000
//! pdf-chat extract report.pdf
//! pdf-chat ask --pdf report.pdf --pdf notes.pdf "What were the findings?"
//! ```
//!
//! `.env` in the working directory is loaded before anything else, so
//! `OPENAI_API_KEY` may live there.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pdf_chat::config::{self, Config};
use pdf_chat::extract::{extract_blocking, PdfExtractor};
use pdf_chat::server;
use pdf_chat::service::{ChatService, UploadedFile};

const DEFAULT_LOG_FILTER: &str = "pdf_chat=info,pdf_chat_core=info,tower_http=info";

/// Chat with your PDFs: upload documents, then ask questions about them.
#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when
    /// omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the text extracted from a PDF.
    Extract {
        file: PathBuf,
    },
    /// Ingest PDFs and answer one question.
    Ask {
        /// PDF to ingest; repeat for several.
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,
        question: String,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    cfg.validate()?;
    Ok(cfg)
}

fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile { name, bytes })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::Extract { file } => {
            let upload = read_upload(&file)?;
            let text = extract_blocking(Arc::new(PdfExtractor), upload.bytes)
                .await
                .with_context(|| format!("Failed to extract {}", upload.name))?;
            println!("{}", text);
        }
        Commands::Ask { pdfs, question } => {
            let service = ChatService::from_config(&cfg)?;
            let files = pdfs
                .iter()
                .map(|p| read_upload(p))
                .collect::<Result<Vec<_>>>()?;
            let summary = service.ingest(files).await?;
            eprintln!(
                "Indexed {} file(s): {} chars in {} chunks",
                summary.files, summary.corpus_chars, summary.chunks
            );
            let reply = service.chat(&question).await?;
            println!("{}", reply.text());
        }
    }

    Ok(())
}
