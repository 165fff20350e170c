//! Quizgen CLI - Command-line interface for the generation daemon

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9631";

#[derive(Parser)]
#[command(name = "quizgen")]
#[command(about = "Quizgen generation daemon CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "QUIZGEN_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new generation job
    Submit {
        #[command(subcommand)]
        source: SourceArgs,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Cancel a running job
    Cancel {
        /// Job ID
        job_id: String,
    },

    /// Resubmit a job with its original parameters
    Retry {
        /// Job ID
        job_id: String,
    },

    /// Show one job in detail
    Status {
        /// Job ID
        job_id: String,

        /// Print the generated items as JSON
        #[arg(long)]
        items: bool,
    },

    /// List jobs
    List {
        /// Only jobs in this status
        #[arg(short, long, value_enum)]
        status: Option<StatusArg>,
    },

    /// Delete a finished job
    Delete {
        /// Job ID
        job_id: String,
    },
}

#[derive(Subcommand)]
enum SourceArgs {
    /// Topics of a syllabus subject (several topics split the count)
    Topics {
        subject: String,
        #[arg(required = true)]
        topics: Vec<String>,
    },
    /// A previously uploaded document
    Document {
        document_id: String,
        #[arg(long)]
        file_name: Option<String>,
    },
    /// Past exam questions
    Bank { year: u16, group: String },
    /// A mock exam pattern
    Mock { pattern_id: String },
}

#[derive(Args)]
struct ConfigArgs {
    /// Number of items to generate
    #[arg(short = 'n', long, global = true, default_value = "10")]
    count: u32,

    #[arg(short, long, global = true, value_enum, default_value = "medium")]
    difficulty: DifficultyArg,

    #[arg(short, long, global = true, value_enum, default_value = "practice")]
    mode: ModeArg,

    /// Time limit in minutes
    #[arg(long, global = true)]
    duration: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl DifficultyArg {
    fn wire_name(self) -> &'static str {
        match self {
            DifficultyArg::Easy => "Easy",
            DifficultyArg::Medium => "Medium",
            DifficultyArg::Hard => "Hard",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Practice,
    Exam,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Processing,
    Completed,
    Error,
}

impl StatusArg {
    fn wire_name(self) -> &'static str {
        match self {
            StatusArg::Processing => "PROCESSING",
            StatusArg::Completed => "COMPLETED",
            StatusArg::Error => "ERROR",
        }
    }
}

fn source_params(source: &SourceArgs) -> Value {
    match source {
        SourceArgs::Topics { subject, topics } => json!({
            "kind": "syllabus_topics",
            "subject": subject,
            "topics": topics,
        }),
        SourceArgs::Document {
            document_id,
            file_name,
        } => {
            let mut source = json!({
                "kind": "uploaded_document",
                "document_id": document_id,
            });
            if let Some(name) = file_name {
                source["file_name"] = json!(name);
            }
            source
        }
        SourceArgs::Bank { year, group } => json!({
            "kind": "question_bank",
            "year": year,
            "group": group,
        }),
        SourceArgs::Mock { pattern_id } => json!({
            "kind": "mock_pattern",
            "pattern_id": pattern_id,
        }),
    }
}

fn config_params(config: &ConfigArgs) -> Value {
    let mut params = json!({
        "count": config.count,
        "difficulty": config.difficulty.wire_name(),
        "mode": match config.mode {
            ModeArg::Practice => "practice",
            ModeArg::Exam => "exam",
        },
    });
    if let Some(minutes) = config.duration {
        params["duration_minutes"] = json!(minutes);
    }
    params
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct JobRow {
    job_id: String,
    source_kind: String,
    status: String,
    #[tabled(rename = "progress", display_with = "display_percent")]
    progress_percent: u8,
    #[tabled(rename = "items", display_with = "display_option")]
    item_count: Option<usize>,
    #[tabled(rename = "error", display_with = "display_option")]
    error_message: Option<String>,
}

fn display_percent(percent: &u8) -> String {
    format!("{}%", percent)
}

fn display_option<T: std::fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(T::to_string).unwrap_or_default()
}

fn colored_status(status: &str) -> String {
    match status {
        "COMPLETED" => status.green().to_string(),
        "ERROR" => status.red().to_string(),
        _ => status.yellow().to_string(),
    }
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit { source, config } => {
            let params = json!({
                "source": source_params(&source),
                "config": config_params(&config),
            });

            let result = call_rpc(&cli.rpc_url, "generation.submit.v1", params).await?;

            println!("{}", "✓ Job submitted".green().bold());
            println!("  {} {}", "Job ID:".bold(), result["job_id"].as_str().unwrap_or("?"));
        }

        Commands::Cancel { job_id } => {
            let result =
                call_rpc(&cli.rpc_url, "generation.cancel.v1", json!({ "job_id": job_id })).await?;

            if result["signalled"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Cancellation requested for {}", job_id).green().bold());
            } else {
                println!("{}", format!("Job {} is not running", job_id).yellow());
            }
        }

        Commands::Retry { job_id } => {
            let result =
                call_rpc(&cli.rpc_url, "generation.retry.v1", json!({ "job_id": job_id })).await?;

            println!("{}", "✓ Retry submitted".green().bold());
            println!("  {} {}", "Job ID:".bold(), result["job_id"].as_str().unwrap_or("?"));
            println!("  {} {}", "Retry of:".bold(), job_id);
        }

        Commands::Status { job_id, items } => {
            let record =
                call_rpc(&cli.rpc_url, "generation.observe.v1", json!({ "job_id": job_id }))
                    .await?;

            let status = record["status"].as_str().unwrap_or("UNKNOWN");
            println!("{}", format!("Job {}", job_id).cyan().bold());
            println!();
            println!("  {} {}", "Status:".bold(), colored_status(status));
            println!(
                "  {} {}% {}",
                "Progress:".bold(),
                record["progress_percent"],
                record["progress_label"].as_str().unwrap_or("")
            );
            if let Some(steps) = record["step_labels"].as_array().filter(|s| !s.is_empty()) {
                let current = record["step_index"].as_u64();
                for (i, step) in steps.iter().enumerate() {
                    let marker = if current == Some(i as u64) { "▶" } else { "•" };
                    println!("    {} {}", marker, step.as_str().unwrap_or(""));
                }
            }
            if let Some(message) = record["error_message"].as_str() {
                println!("  {} {}", "Error:".bold(), message.red());
            }
            if let Some(origin) = record["retry_of"].as_str() {
                println!("  {} {}", "Retry of:".bold(), origin);
            }
            if let Some(result) = record["result"].as_array() {
                println!("  {} {}", "Items:".bold(), result.len());
                if items {
                    println!();
                    println!("{}", serde_json::to_string_pretty(result)?);
                }
            }
        }

        Commands::List { status } => {
            let params = match status {
                Some(status) => json!({ "status": status.wire_name() }),
                None => json!({}),
            };
            let result = call_rpc(&cli.rpc_url, "generation.list.v1", params).await?;
            let rows: Vec<JobRow> = serde_json::from_value(result["jobs"].clone())?;

            if rows.is_empty() {
                println!("{}", "No jobs".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Delete { job_id } => {
            let result =
                call_rpc(&cli.rpc_url, "generation.delete.v1", json!({ "job_id": job_id })).await?;

            if result["deleted"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Job {} deleted", job_id).green().bold());
            } else {
                println!("{}", format!("Job {} not found", job_id).yellow());
            }
        }
    }

    Ok(())
}
