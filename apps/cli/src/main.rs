//! taskforge CLI - inspect catalogs, validate workflows, and run tasks
//! against the scripted offline backend.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskforge_abstraction::AgentType;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "taskforge",
    author,
    version,
    about = "Agent task orchestration: model routing and workflow execution"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a workflow graph file
    ///
    /// Loads a JSON workflow specification, runs structural validation, and
    /// reports every violation found.
    Validate {
        /// Path to the workflow JSON file
        path: PathBuf,
    },

    /// Inspect a model catalog
    ///
    /// Loads a TOML catalog and lists its models. With a query, also shows
    /// which model the router would pick for it and why.
    Catalog {
        /// Path to the catalog TOML file
        path: PathBuf,

        /// Sample query to route against the catalog
        #[arg(long)]
        query: Option<String>,
    },

    /// Run a task against the scripted offline backend
    ///
    /// Routes the query through the catalog, executes a ReAct loop with the
    /// built-in tools, and prints the result.
    Run {
        /// The task query
        #[arg(long)]
        query: String,

        /// Path to the catalog TOML file
        #[arg(long)]
        catalog: PathBuf,

        /// Execution style (react, multi_agent, human_in_loop)
        #[arg(long, default_value = "react")]
        agent_type: String,

        /// Step bound for the ReAct loop
        #[arg(long, default_value_t = 10)]
        max_steps: u32,

        /// Metrics file to persist routing feedback across runs
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Trace file to append execution events to
        #[arg(long)]
        trace: Option<PathBuf>,
    },

    /// List the built-in tools
    Tools,
}

fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn parse_agent_type(s: &str) -> anyhow::Result<AgentType> {
    match s {
        "react" => Ok(AgentType::React),
        "multi_agent" => Ok(AgentType::MultiAgent),
        "human_in_loop" => Ok(AgentType::HumanInLoop),
        other => anyhow::bail!("Unknown agent type '{other}' (expected react, multi_agent, or human_in_loop)"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    match args.command {
        Command::Validate { path } => commands::validate::execute(&path),
        Command::Catalog { path, query } => commands::catalog::execute(&path, query.as_deref()),
        Command::Run { query, catalog, agent_type, max_steps, metrics, trace } => {
            let agent_type = parse_agent_type(&agent_type)?;
            commands::run::execute(commands::run::RunOptions {
                query,
                catalog,
                agent_type,
                max_steps,
                metrics,
                trace,
            })
            .await
        }
        Command::Tools => commands::tools::execute(),
    }
}
