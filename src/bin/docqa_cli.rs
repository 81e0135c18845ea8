//! Command-line front end.
//!
//! Runs the same ingestion and LLM pipelines as the server against a local file, without the
//! browser UI. Configuration is shared with the server binary (`.env` and environment).
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docqa::{
    config, logging,
    processing::{DocumentService, UploadedFile},
};

#[derive(Parser)]
#[command(
    name = "docqa-cli",
    about = "Summarize a document or ask a question about it"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize every chunk and print the combined summary.
    Summarize {
        /// Document to load (.txt, .csv, or .pdf).
        #[arg(long)]
        file: PathBuf,
        /// Also write the final summary to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Answer a question from the full document text.
    Ask {
        /// Document to load (.txt, .csv, or .pdf).
        #[arg(long)]
        file: PathBuf,
        /// Question to answer.
        #[arg(long)]
        question: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    config::init_config().context("failed to load configuration")?;
    logging::init_tracing();

    let service = DocumentService::new().context("failed to initialize document service")?;
    let session = service.create_session();

    match cli.command {
        Command::Summarize { file, output } => {
            service.ingest(session, vec![read_upload(&file).await?]).await?;
            let outcome = service.summarize(session).await?;
            println!("{}", outcome.final_summary);
            if let Some(path) = output {
                tokio::fs::write(&path, &outcome.final_summary)
                    .await
                    .with_context(|| format!("failed to write summary to {}", path.display()))?;
            }
        }
        Command::Ask { file, question } => {
            if question.trim().is_empty() {
                bail!("question must not be empty");
            }
            service.ingest(session, vec![read_upload(&file).await?]).await?;
            println!("{}", service.answer(session, &question).await?);
        }
    }

    service.close_session(session);
    Ok(())
}

async fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    let content_type = mime_guess::from_path(path).first_raw().map(str::to_string);
    Ok(UploadedFile {
        name,
        content_type,
        bytes,
    })
}
