use clap::{Parser, Subcommand};
use household_agent::llm::{LlmClient, MockLlmClient};
use household_agent::{AgentMode, Runtime};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "household-agent")]
#[command(author, version, about = "Household media agent demo CLI", long_about = None)]
struct Cli {
    /// Path to a RuntimeConfig TOML file (falls back to defaults if absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose diagnostic logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single conversational turn against a scripted mock LLM
    Converse {
        /// The user's utterance
        message: String,
    },
    /// Run a single read-only recommendation turn
    Recommend {
        /// What to recommend for
        message: String,
    },
}

/// A small scripted demo: the mock LLM is given exactly the turns needed to
/// search TMDb and answer, or to add a movie and validate it, based on
/// whether the utterance looks like a write request. A real deployment
/// swaps `MockLlmClient` for a provider-backed `LlmClient`.
fn demo_llm(message: &str) -> Arc<dyn LlmClient> {
    use household_agent::model::ToolCall;

    if household_agent::phase::infers_write_intent(message) {
        Arc::new(MockLlmClient::new(vec![
            MockLlmClient::tool_calls(vec![ToolCall {
                call_id: "1".to_string(),
                tool_name: "radarr_add_movie".to_string(),
                arguments: serde_json::json!({"tmdb_id": 603, "quality_profile_id": 1, "root_folder_path": "/movies"}),
            }]),
            MockLlmClient::tool_calls(vec![ToolCall {
                call_id: "2".to_string(),
                tool_name: "radarr_get_movies".to_string(),
                arguments: serde_json::json!({}),
            }]),
            MockLlmClient::text("Done — The Matrix is queued in Radarr."),
        ]))
    } else {
        Arc::new(MockLlmClient::new(vec![
            MockLlmClient::tool_calls(vec![ToolCall {
                call_id: "1".to_string(),
                tool_name: "tmdb_search".to_string(),
                arguments: serde_json::json!({"query": message}),
            }]),
            MockLlmClient::text("Here's what I found."),
        ]))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = match &cli.config {
        Some(path) => household_agent::config::RuntimeConfig::load_or_default(path),
        None => household_agent::config::RuntimeConfig::default(),
    };
    let runtime = Runtime::new(config).with_stdout_progress();

    let (message, mode) = match cli.command {
        Commands::Converse { message } => (message, AgentMode::Converse),
        Commands::Recommend { message } => (message, AgentMode::Recommend),
    };

    let llm = demo_llm(&message);
    let agent = runtime.agent_loop(llm);
    let outcome = agent.run_turn(&message, mode).await;

    println!("\n{}", outcome.reply);
    if cli.verbose {
        eprintln!(
            "llm_calls={} tool_calls={} elapsed_ms={} exhausted={}",
            outcome.llm_calls, outcome.tool_calls, outcome.elapsed_ms, outcome.iteration_budget_exhausted
        );
    }
}
