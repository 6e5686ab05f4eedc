//! CLI entry point for the `docidx` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use docindex::cli::commands;
use docindex::IndexError;

#[derive(Parser)]
#[command(
    name = "docidx",
    about = "docidx: composite-key secondary indexes over JSON documents"
)]
struct Cli {
    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text")]
    format: String,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    /// Index definitions (TOML)
    #[arg(long, short = 'c', default_value = "indexes.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents into every index and report statistics
    Build {
        /// JSON-lines document file
        documents: PathBuf,
    },
    /// Exact-key lookup on one index
    Get {
        /// JSON-lines document file
        documents: PathBuf,
        /// Index name
        index: String,
        /// Query document (JSON) holding the key fields
        query: String,
    },
    /// Full-scan query on one index
    Scan {
        /// JSON-lines document file
        documents: PathBuf,
        /// Index name
        index: String,
        /// Query document (JSON)
        #[arg(default_value = "{}")]
        query: String,
    },
    /// Check whether a document could be inserted without violating uniqueness
    Check {
        /// JSON-lines document file
        documents: PathBuf,
        /// Candidate document (JSON)
        document: String,
        /// Previous version of the document, for updates (JSON)
        #[arg(long)]
        old: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    let json = cli.format == "json";

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let result = match &cli.command {
        Commands::Build { documents } => commands::cmd_build(&cli.config, documents, json),
        Commands::Get {
            documents,
            index,
            query,
        } => commands::cmd_get(&cli.config, documents, index, query, json),
        Commands::Scan {
            documents,
            index,
            query,
        } => commands::cmd_scan(&cli.config, documents, index, query, json),
        Commands::Check {
            documents,
            document,
            old,
        } => commands::cmd_check(&cli.config, documents, document, old.as_deref(), json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = match &e {
            IndexError::Io(_) => 1,
            IndexError::Config(_)
            | IndexError::TomlDe(_)
            | IndexError::TomlSer(_)
            | IndexError::Json(_)
            | IndexError::NotADocument(_)
            | IndexError::InvalidQuery(_)
            | IndexError::EmptyFields(_) => 2,
            IndexError::DuplicateKey { .. } => 3,
        };
        process::exit(code);
    }
}
