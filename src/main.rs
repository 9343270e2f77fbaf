//! # RAG Harness CLI (`rag`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag serve` | Read JSON requests from stdin, write responses to stdout |
//! | `rag parse <PDF>` | Extract and chunk one PDF, print the result |
//! | `rag tools` | List tools, functions and input schemas |
//! | `rag completions <SHELL>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Serve with the offline hash model
//! echo '{"tool":"embedding","function":"embed_texts","inputs":{"texts":["hi"]}}' \
//!   | rag --config ./rag.toml serve
//!
//! # Whole-document extraction, two sentences per chunk
//! rag parse report.pdf --parser-type default --chunk-size 2
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use rag_harness::config::{self, Config};
use rag_harness::extract::ParserKind;
use rag_harness::{logging, pdf_tool, server};

/// RAG Harness: PDF chunking, embedding and vector search over stdio.
#[derive(Parser)]
#[command(name = "rag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Without it, built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tool requests over stdin/stdout, one JSON object per line.
    ///
    /// Exits when stdin is closed.
    Serve,

    /// Parse one PDF into sentence chunks and print the result as JSON.
    Parse {
        /// Path to the PDF file.
        pdf: PathBuf,

        /// Extraction strategy: `default` (whole document) or `advanced` (per page).
        #[arg(long)]
        parser_type: Option<String>,

        /// Sentences per chunk.
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// List the available tools with their functions and input schemas.
    Tools,

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn load(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(p) => config::load_config(p),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "rag", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = load(cli.config.as_ref())?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Serve => {
            server::run_stdio(&cfg).await?;
        }
        Commands::Parse {
            pdf,
            parser_type,
            chunk_size,
        } => {
            let parser = ParserKind::parse(
                parser_type.as_deref().unwrap_or(&cfg.chunking.parser_type),
            )?;
            let chunk_size = chunk_size.unwrap_or(cfg.chunking.chunk_size);
            let parsed = tokio::task::spawn_blocking(move || {
                pdf_tool::parse_pdf(&pdf, parser, chunk_size)
            })
            .await?
            .context("Failed to parse PDF")?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Commands::Tools => {
            let registry = server::build_registry(&cfg)?;
            println!("{}", serde_json::to_string_pretty(&registry.describe())?);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
