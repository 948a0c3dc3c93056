//! rageval CLI - batch evaluation of RAG pipelines with an LLM judge.
//!
//! Also carries the small utilities around it: record filtering, one-shot
//! completions against the serving endpoint, and a browser demo for it.

mod commands;
mod demo;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// rageval: evaluate retrieval-augmented generation pipelines
#[derive(Parser, Debug)]
#[command(name = "rageval", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds .rageval/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Evaluate one or more test-set CSV files with the configured metrics
    Eval {
        /// Test-set files (query, answer, contexts, reference_answer)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Rows to evaluate per file (0 evaluates every row)
        #[arg(short, long)]
        rows: Option<usize>,

        /// Comma-separated metric ids, e.g. faithfulness,contextual_recall
        #[arg(short, long, value_delimiter = ',')]
        metrics: Option<Vec<String>>,

        /// Write the flattened results as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write one CSV of flattened results per dataset into this directory
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// Drop records without a question and records with duplicated queries
    Filter {
        /// JSON array of records with a `query` field
        input: PathBuf,
        /// Where to write the filtered records
        output: PathBuf,
    },
    /// Send one prompt to the model serving endpoint and print the completion
    Complete {
        prompt: String,

        /// Serving endpoint (defaults to serving.model_url)
        #[arg(long)]
        url: Option<String>,

        /// Ask the server to use beam search
        #[arg(long)]
        beam_search: bool,
    },
    /// Serve a prompt completion web page backed by the serving endpoint
    Demo {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        model_url: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "rageval", "rageval")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "rageval.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_eval_args() {
        let cli = Cli::parse_from([
            "rageval",
            "-v",
            "eval",
            "a.csv",
            "b.csv",
            "--rows",
            "3",
            "--metrics",
            "faithfulness,contextual_recall",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Eval {
                files,
                rows,
                metrics,
                output,
                ..
            } => {
                assert_eq!(files, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
                assert_eq!(rows, Some(3));
                assert_eq!(
                    metrics,
                    Some(vec!["faithfulness".to_string(), "contextual_recall".to_string()])
                );
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_eval_requires_files() {
        assert!(Cli::try_parse_from(["rageval", "eval"]).is_err());
    }

    #[test]
    fn test_parse_demo_defaults() {
        let cli = Cli::parse_from(["rageval", "demo", "--port", "9000"]);
        match cli.command {
            Commands::Demo {
                host,
                port,
                model_url,
            } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
                assert_eq!(model_url, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
