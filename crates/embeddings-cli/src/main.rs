//! Embed CLI
//!
//! Command-line front end for computing embeddings with a local model.
//! Vectors go to stdout as one JSON array per line; logs go to stderr.

use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use embeddings_core::{EmbeddingsConfig, EmbeddingsHandle, ModelFiles};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

/// Embed - local text embeddings
#[derive(Parser)]
#[command(name = "embed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compute text embeddings with a local ONNX model")]
struct Cli {
    /// Model directory containing model.onnx and tokenizer.json
    #[arg(long, global = true, conflicts_with_all = ["model", "tokenizer"])]
    model_dir: Option<PathBuf>,

    /// Path to an ONNX model file
    #[arg(long, global = true, requires = "tokenizer")]
    model: Option<PathBuf>,

    /// Path to a tokenizer.json file
    #[arg(long, global = true, requires = "model")]
    tokenizer: Option<PathBuf>,

    /// JSON configuration file (EMBEDDINGS_* variables still apply on top)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Batch worker threads
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show model dimension, vocabulary and effective configuration
    Info {
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Encode texts and print one JSON vector per line
    Encode {
        /// Texts to encode
        texts: Vec<String>,

        /// Read texts from stdin, one per line
        #[arg(long)]
        stdin: bool,

        /// Encode in chunks of this many texts, logging progress
        #[arg(long)]
        chunk_size: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let files = resolve_files(&cli);
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Info { json } => run_info(&files, config, json),
        Commands::Encode {
            texts,
            stdin,
            chunk_size,
        } => run_encode(&files, config, texts, stdin, chunk_size),
    }
}

fn resolve_files(cli: &Cli) -> ModelFiles {
    match (&cli.model_dir, &cli.model, &cli.tokenizer) {
        (Some(dir), _, _) => ModelFiles::from_dir(dir),
        (None, Some(model), Some(tokenizer)) => ModelFiles::new(model, tokenizer),
        _ => ModelFiles::from_dir(ModelFiles::default_dir()),
    }
}

fn resolve_config(cli: &Cli) -> anyhow::Result<EmbeddingsConfig> {
    let mut config = match &cli.config {
        Some(path) => EmbeddingsConfig::from_file(path)?
            .with_overrides(|key| std::env::var(key).ok())?,
        None => EmbeddingsConfig::load()?,
    };
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    config.validate()?;
    Ok(config)
}

fn open(files: &ModelFiles, config: EmbeddingsConfig) -> anyhow::Result<EmbeddingsHandle> {
    EmbeddingsHandle::open_with_config(files, config)
        .with_context(|| format!("failed to open model {}", files.model.display()))
}

/// Run info command
fn run_info(files: &ModelFiles, config: EmbeddingsConfig, json: bool) -> anyhow::Result<()> {
    let handle = open(files, config)?;

    if json {
        let report = serde_json::json!({
            "model": files.model.display().to_string(),
            "tokenizer": files.tokenizer.display().to_string(),
            "metadata": files.metadata.as_ref().map(|path| path.display().to_string()),
            "backend": handle.describe(),
            "dimension": handle.dimension(),
            "vocab_size": handle.vocab_size(),
            "max_sequence_length": handle.max_sequence_length(),
            "config": handle.config(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let config = handle.config();
    println!("{}", "=== Embedding Model ===".cyan().bold());
    println!();
    println!("{}: {}", "Model".white().bold(), files.model.display());
    println!("{}: {}", "Tokenizer".white().bold(), files.tokenizer.display());
    if let Some(metadata) = &files.metadata {
        println!("{}: {}", "Metadata".white().bold(), metadata.display());
    }
    println!("{}: {}", "Backend".white().bold(), handle.describe());
    println!("{}: {}", "Dimension".white().bold(), handle.dimension().to_string().green());
    println!("{}: {}", "Vocabulary".white().bold(), handle.vocab_size());
    println!("{}: {}", "Max Tokens".white().bold(), handle.max_sequence_length());
    println!();
    println!("{}", "=== Configuration ===".yellow().bold());
    println!("  pooling: {:?}", config.pooling);
    println!("  normalize: {}", config.normalize);
    println!("  add_special_tokens: {}", config.add_special_tokens);
    println!("  threads: {}", config.threads);

    handle.close();
    Ok(())
}

/// Run encode command
fn run_encode(
    files: &ModelFiles,
    config: EmbeddingsConfig,
    mut texts: Vec<String>,
    from_stdin: bool,
    chunk_size: Option<usize>,
) -> anyhow::Result<()> {
    if from_stdin {
        for line in io::stdin().lock().lines() {
            texts.push(line.context("failed to read stdin")?);
        }
    }
    if texts.is_empty() {
        bail!("no input texts (pass TEXT arguments or --stdin)");
    }

    let handle = open(files, config)?;
    let batch = match chunk_size {
        Some(size) => handle.encode_batch_with_progress(&texts, size, |progress| {
            info!(
                "Chunk {}/{}: {}/{} texts ({:.0}%)",
                progress.chunk_index,
                progress.total_chunks,
                progress.processed,
                progress.total,
                progress.percentage()
            );
        })?,
        None => handle.encode_batch(&texts)?,
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for vector in batch.iter() {
        serde_json::to_writer(&mut out, vector)?;
        writeln!(out)?;
    }
    out.flush()?;

    handle.close();
    Ok(())
}
