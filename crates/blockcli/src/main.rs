// crates/blockcli/src/main.rs

use anyhow::{Context, Result};
use blockcore::{
    block_types, Block, BlockEvent, ExecutionEvent, Schedule, SystemBlockCatalog, TriggerType,
    Workflow,
};
use blocknodes::HandlerLimits;
use blockruntime::{FlowRuntime, HandlerRegistry, RuntimeConfig};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "blockflow")]
#[command(about = "Block workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Variable overrides as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Maximum number of blocks visited before the run is truncated
        #[arg(long, default_value_t = 1000)]
        max_steps: usize,

        /// Longest delay a Wait block may request
        #[arg(long, default_value_t = 60_000)]
        max_wait_ms: u64,

        /// Default and maximum HttpRequest timeout
        #[arg(long, default_value_t = 30_000)]
        http_timeout_ms: u64,

        /// Cancel the whole run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List available block types
    Blocks,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },

    /// Compute when a schedule fires next
    NextRun {
        /// Schedule JSON file; overrides the other arguments
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// interval, once or daily
        #[arg(long, default_value = "interval")]
        trigger: String,

        /// RFC 3339 start time (defaults to now)
        #[arg(long)]
        start: Option<String>,

        /// Minutes between interval runs
        #[arg(long, default_value_t = 60)]
        interval_minutes: i64,

        /// RFC 3339 time of the last run
        #[arg(long)]
        last_run: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
            max_steps,
            max_wait_ms,
            http_timeout_ms,
            timeout_ms,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            let config = RuntimeConfig {
                max_steps,
                max_execution_time_ms: timeout_ms,
                ..RuntimeConfig::default()
            };
            let limits = HandlerLimits {
                max_wait_ms,
                http_timeout_ms,
                ..HandlerLimits::default()
            };
            run_workflow(file, input, config, limits).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Blocks => {
            list_blocks();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }

        Commands::NextRun {
            file,
            trigger,
            start,
            interval_minutes,
            last_run,
        } => {
            next_run(file, &trigger, start, interval_minutes, last_run)?;
        }
    }

    Ok(())
}

fn build_runtime(config: RuntimeConfig, limits: &HandlerLimits) -> FlowRuntime {
    let mut registry = HandlerRegistry::new();
    blocknodes::register_with_limits(&mut registry, limits);

    FlowRuntime::with_registry(
        Arc::new(registry),
        Arc::new(SystemBlockCatalog::standard()),
        config,
    )
}

fn load_workflow(file: &PathBuf) -> Result<Workflow> {
    let workflow_json = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)
        .with_context(|| format!("{} is not a workflow document", file.display()))?;
    Ok(workflow)
}

/// Overrides arrive as a JSON object; non-string values are kept as their JSON text
fn parse_inputs(input: Option<String>) -> Result<HashMap<String, String>> {
    let Some(input_str) = input else {
        return Ok(HashMap::new());
    };

    match serde_json::from_str::<serde_json::Value>(&input_str)? {
        serde_json::Value::Object(obj) => Ok(obj
            .into_iter()
            .map(|(k, v)| {
                let text = match v {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k, text)
            })
            .collect()),
        _ => Err(anyhow::anyhow!("Input must be a JSON object")),
    }
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    config: RuntimeConfig,
    limits: HandlerLimits,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(&file)?;
    let inputs = parse_inputs(input)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Blocks: {}", workflow.blocks.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let runtime = build_runtime(config, &limits);

    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted { .. } => {
                    println!("▶️  Workflow started");
                }
                ExecutionEvent::BlockStarted {
                    block_name,
                    block_type,
                    ..
                } => {
                    println!("  ⚡ {} ({})", block_name, block_type);
                }
                ExecutionEvent::BlockCompleted {
                    description,
                    is_error,
                    duration_ms,
                    ..
                } => {
                    let mark = if is_error { "↪️ " } else { "✅" };
                    println!("  {} {} [{}ms]", mark, description, duration_ms);
                }
                ExecutionEvent::BlockEvent { event, .. } => match event {
                    BlockEvent::Info { message } => println!("     ℹ️  {}", message),
                    BlockEvent::Warning { message } => println!("     ⚠️  {}", message),
                },
                ExecutionEvent::WorkflowCompleted {
                    outcome,
                    steps,
                    duration_ms,
                    ..
                } => {
                    println!("✨ Workflow {} after {} steps in {}ms", outcome, steps, duration_ms);
                }
            }
        }
    });

    let record = runtime.execute(&workflow, inputs).await?;

    // Let the listener drain before the summary
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Execution record:");
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    let runtime = build_runtime(RuntimeConfig::default(), &HandlerLimits::default());
    let report = runtime.validate(&workflow)?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Blocks: {}", report.blocks);
    println!("   Connections: {}", report.connections);
    if !report.end_reachable {
        println!("   ⚠️  No End block is reachable from Start");
    }

    Ok(())
}

fn list_blocks() {
    println!("📦 Available Block Types:");
    println!();

    let mut registry = HandlerRegistry::new();
    blocknodes::register_all(&mut registry);

    for block_type in registry.list_block_types() {
        if let Some(metadata) = registry.get_metadata(&block_type) {
            println!("  • {} ({})", block_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", block_type);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let catalog = SystemBlockCatalog::standard();
    let system_block = |block_type: &str| {
        catalog
            .id_of(block_type)
            .with_context(|| format!("{} missing from the standard catalog", block_type))
    };

    let mut workflow = Workflow::new("Example Calculation Workflow");
    workflow.description = Some("Adds two numbers and checks the total".to_string());

    let start = workflow.add_block(Block::new("Start", system_block(block_types::START)?));
    let add = workflow.add_block(
        Block::new("Add", system_block(block_types::CALCULATION)?).with_config(serde_json::json!({
            "Operation": "Add",
            "FirstVariable": "$A",
            "SecondVariable": "$B",
            "ResultVariable": "$C"
        })),
    );
    let check = workflow.add_block(
        Block::new("Over ten?", system_block(block_types::IF)?).with_config(serde_json::json!({
            "DataType": "Number",
            "First": "$C",
            "Second": "10",
            "Comparison": "greater"
        })),
    );
    let big = workflow.add_block(Block::new("Big", system_block(block_types::END)?));
    let small = workflow.add_block(Block::new("Small", system_block(block_types::END)?));

    workflow.connect(start, add);
    workflow.connect(add, check);
    workflow.connect(check, big);
    workflow.connect_on_error(check, small);

    workflow.add_variable("A", Some("2"));
    workflow.add_variable("B", Some("3"));
    workflow.add_variable("C", Some(""));

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  blockflow run --file {} --input '{{\"A\": \"7\", \"B\": \"8\"}}'",
        output.display()
    );

    Ok(())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("'{}' is not an RFC 3339 time", value))?
        .with_timezone(&Utc))
}

fn next_run(
    file: Option<PathBuf>,
    trigger: &str,
    start: Option<String>,
    interval_minutes: i64,
    last_run: Option<String>,
) -> Result<()> {
    let schedule: Schedule = match file {
        Some(file) => serde_json::from_str(&std::fs::read_to_string(&file)?)?,
        None => {
            let start_at = match start {
                Some(start) => parse_time(&start)?,
                None => Utc::now(),
            };
            let mut schedule = match trigger.to_ascii_lowercase().as_str() {
                "interval" => Schedule::interval(start_at, interval_minutes),
                "once" => Schedule::once(start_at),
                "daily" => Schedule::daily(start_at),
                other => return Err(anyhow::anyhow!("Unknown trigger type: {}", other)),
            };
            schedule.last_run_at = last_run.as_deref().map(parse_time).transpose()?;
            schedule
        }
    };

    let trigger = match schedule.trigger_type {
        TriggerType::Interval => format!("every {} minutes", schedule.interval_minutes),
        TriggerType::Once => "once".to_string(),
        TriggerType::Daily => "daily".to_string(),
    };

    match schedule.next_run_at() {
        Some(next) => println!("⏰ Next run ({}): {}", trigger, next.to_rfc3339()),
        None => println!("⏹️  No further runs ({})", trigger),
    }
    Ok(())
}
