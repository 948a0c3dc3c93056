//! CLI subcommand handlers.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use rageval_core::config::{RagEvalConfig, load_config, write_default_config};
use rageval_core::models::EmbeddingModel;
use rageval_core::providers::{OpenAiCompatibleEmbedder, OpenAiCompatibleProvider};
use rageval_core::records::{
    load_records, remove_duplicated_queries, remove_recs_without_query, save_records,
};
use rageval_core::{
    BatchRunner, EvaluateOptions, EvaluationModel, GenerateRequest, MetricEvaluator,
    NvidiaEmbeddingModel, ResultSummary, ServingClient, build_metrics, flatten_results,
};

use crate::{Commands, ConfigAction};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Eval {
            files,
            rows,
            metrics,
            output,
            csv_dir,
        } => {
            let mut config = load(workspace)?;
            if let Some(rows) = rows {
                config.evaluation.row_limit = (rows > 0).then_some(rows);
            }
            if let Some(metrics) = metrics {
                config.evaluation.metrics = metrics;
            }
            let summary = handle_eval(&config, &files).await?;
            print_summary(&summary);
            if let Some(path) = output {
                write_summary_json(&summary, &path)?;
                println!("Results written to: {}", path.display());
            }
            if let Some(dir) = csv_dir {
                for path in write_summary_csvs(&summary, &dir)? {
                    println!("Results written to: {}", path.display());
                }
            }
            Ok(())
        }
        Commands::Filter { input, output } => handle_filter(&input, &output),
        Commands::Complete {
            prompt,
            url,
            beam_search,
        } => {
            let config = load(workspace)?;
            let client = match url {
                Some(url) => ServingClient::new(url),
                None => ServingClient::from_config(&config.serving),
            };
            let mut request = GenerateRequest::new(prompt, config.serving.max_tokens);
            if beam_search {
                request.use_beam_search = Some(true);
            }
            let texts = client
                .complete(&request)
                .await
                .with_context(|| format!("Completion request to {} failed", client.url()))?;
            for text in texts {
                println!("{}", text);
            }
            Ok(())
        }
        Commands::Demo {
            host,
            port,
            model_url,
        } => {
            let mut serving = load(workspace)?.serving;
            if let Some(host) = host {
                serving.host = host;
            }
            if let Some(port) = port {
                serving.port = port;
            }
            if let Some(url) = model_url {
                serving.model_url = url;
            }
            crate::demo::run(&serving).await
        }
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load(workspace: &Path) -> anyhow::Result<RagEvalConfig> {
    let config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    for warning in config.validate() {
        warn!("{}", warning);
    }
    Ok(config)
}

async fn handle_eval(config: &RagEvalConfig, files: &[PathBuf]) -> anyhow::Result<ResultSummary> {
    let provider = OpenAiCompatibleProvider::new(&config.judge)
        .context("Failed to set up the judge model")?;
    let judge = Arc::new(EvaluationModel::new(Arc::new(provider)));

    let embedder: Option<Arc<dyn EmbeddingModel>> = if config
        .evaluation
        .metrics
        .iter()
        .any(|m| m == "semantic_similarity")
    {
        let backend = OpenAiCompatibleEmbedder::new(&config.embedding)
            .context("Failed to set up the embedding model")?;
        Some(Arc::new(NvidiaEmbeddingModel::new(
            Arc::new(backend),
            config.embedding.batch_size,
        )))
    } else {
        None
    };

    let metrics = build_metrics(
        &config.evaluation.metrics,
        judge,
        embedder,
        config.evaluation.threshold,
    )?;

    let evaluator = MetricEvaluator::new(EvaluateOptions {
        ignore_errors: config.evaluation.ignore_errors,
    });
    let runner = BatchRunner::new(evaluator, metrics)
        .with_row_limit(config.evaluation.row_limit)
        .with_malformed_rows(config.evaluation.malformed_rows);

    info!(files = files.len(), judge = %config.judge.model, "Starting batch evaluation");
    let evaluations = runner.run(files).await?;
    Ok(flatten_results(&evaluations))
}

/// Render mean score and error count per dataset and metric.
fn format_summary(summary: &ResultSummary) -> String {
    let mut out = String::new();
    for dataset in summary.datasets() {
        out.push_str(&format!("\n{}\n", dataset));
        for column in summary.columns(dataset).unwrap_or_default() {
            let mean = column
                .mean_score()
                .map(|m| format!("{:.3}", m))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "  {:<24} mean {:>6}  cases {:>3}  errors {:>3}\n",
                column.metric(),
                mean,
                column.len(),
                column.error_count()
            ));
        }
    }
    out
}

fn print_summary(summary: &ResultSummary) {
    print!("{}", format_summary(summary));
}

fn write_summary_json(summary: &ResultSummary, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn write_summary_csvs(summary: &ResultSummary, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for dataset in summary.datasets() {
        let path = dir.join(format!("{}__results.csv", dataset));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        summary.write_csv(dataset, file)?;
        written.push(path);
    }
    Ok(written)
}

fn handle_filter(input: &Path, output: &Path) -> anyhow::Result<()> {
    let records = load_records(input)
        .with_context(|| format!("Failed to load records from {}", input.display()))?;
    let total = records.len();

    let with_question = remove_recs_without_query(records);
    let without_question = total - with_question.len();
    let unique = remove_duplicated_queries(with_question);
    let duplicates = total - without_question - unique.len();

    save_records(output, &unique)?;
    println!(
        "Kept {} of {} records ({} without a question, {} duplicated) -> {}",
        unique.len(),
        total,
        without_question,
        duplicates,
        output.display()
    );
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            match write_default_config(workspace)? {
                Some(path) => println!("Created default configuration at: {}", path.display()),
                None => println!(
                    "Configuration file already exists at: {}",
                    rageval_core::config::workspace_config_path(workspace).display()
                ),
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rageval_core::config::workspace_config_path;
    use rageval_core::{DatasetEvaluation, MetricData, TestResult};
    use tempfile::TempDir;

    fn summary() -> ResultSummary {
        let data = |score: Option<f64>| MetricData {
            name: "Faithfulness".to_string(),
            threshold: 0.5,
            score,
            reason: score.map(|_| "ok".to_string()),
            error: score.is_none().then(|| "timeout".to_string()),
            success: score.is_some_and(|s| s >= 0.5),
        };
        flatten_results(&[DatasetEvaluation::new(
            "basic_rag",
            vec![
                TestResult {
                    input: "q1".into(),
                    metrics_data: vec![data(Some(1.0))],
                },
                TestResult {
                    input: "q2".into(),
                    metrics_data: vec![data(Some(0.5))],
                },
                TestResult {
                    input: "q3".into(),
                    metrics_data: vec![data(None)],
                },
            ],
        )])
    }

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();

        let content = std::fs::read_to_string(workspace_config_path(workspace)).unwrap();
        let parsed: RagEvalConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.evaluation.row_limit, Some(5));
        assert_eq!(parsed.serving.port, 8001);
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();
        let path = workspace_config_path(workspace);

        handle_config(ConfigAction::Init, workspace).unwrap();
        std::fs::write(&path, "[evaluation]\nrow_limit = 2\n").unwrap();
        handle_config(ConfigAction::Init, workspace).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[evaluation]\nrow_limit = 2\n"
        );
    }

    #[tokio::test]
    async fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(command, dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_filter_command() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("qa.json");
        let output = dir.path().join("filtered.json");
        std::fs::write(
            &input,
            r#"[
                {"query": "Who flew Vostok 1?", "answer": "Gagarin"},
                {"query": "Gagarin flew Vostok 1."},
                {"query": "Who flew Vostok 1?", "answer": "Yuri Gagarin"},
                {"query": "What was Luna 9?"}
            ]"#,
        )
        .unwrap();

        let command = Commands::Filter {
            input,
            output: output.clone(),
        };
        handle_command(command, dir.path()).await.unwrap();

        let kept = load_records(&output).unwrap();
        let queries: Vec<&str> = kept.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(queries, vec!["Who flew Vostok 1?", "What was Luna 9?"]);
        assert_eq!(kept[0].extra["answer"], "Gagarin");
    }

    #[tokio::test]
    async fn test_eval_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Eval {
            files: vec![dir.path().join("missing.csv")],
            rows: Some(1),
            metrics: None,
            output: None,
            csv_dir: None,
        };
        let err = handle_command(command, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("missing.csv"));
    }

    #[tokio::test]
    async fn test_eval_unknown_metric_fails() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Eval {
            files: vec![],
            rows: None,
            metrics: Some(vec!["bleu".to_string()]),
            output: None,
            csv_dir: None,
        };
        let err = handle_command(command, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("bleu"));
    }

    #[test]
    fn test_format_summary() {
        let text = format_summary(&summary());
        assert!(text.contains("basic_rag"));
        assert!(text.contains("Faithfulness"));
        assert!(text.contains("mean  0.750"));
        assert!(text.contains("cases   3"));
        assert!(text.contains("errors   1"));
    }

    #[test]
    fn test_write_outputs() {
        let dir = TempDir::new().unwrap();
        let summary = summary();

        let json_path = dir.path().join("summary.json");
        write_summary_json(&summary, &json_path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(
            value["basic_rag"]["Faithfulness Score"],
            serde_json::json!([1.0, 0.5, null])
        );

        let written = write_summary_csvs(&summary, &dir.path().join("csv")).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("basic_rag__results.csv"));
        let csv = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }
}
