use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use agent_loop::SessionOutcome;
use webpilot_cli::{run_session, AppConfig};

#[derive(Parser)]
#[command(name = "webpilot", about = "LLM-driven web page agent", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one instruction against a live page.
    Run {
        /// The task, in plain language.
        instruction: String,

        /// Address to load before the session starts.
        #[arg(long)]
        url: Option<String>,

        /// Decision-service model name.
        #[arg(long)]
        model: Option<String>,

        /// Chat-completions endpoint.
        #[arg(long)]
        endpoint: Option<String>,

        /// Decision-call budget for the session.
        #[arg(long)]
        max_calls: Option<u32>,

        /// Show the browser window instead of running headless.
        #[arg(long)]
        headed: bool,

        /// Accept declared completions without a verification sub-call.
        #[arg(long)]
        no_verify: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            instruction,
            url,
            model,
            endpoint,
            max_calls,
            headed,
            no_verify,
        } => {
            let mut config = AppConfig::default();
            if let Some(url) = url {
                config.start_url = url;
            }
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(max_calls) = max_calls {
                config.loop_config.max_decision_calls = max_calls;
            }
            config.headless = !headed;
            config.loop_config.verify_completion = !no_verify;

            match run_session(config, instruction).await? {
                SessionOutcome::Completed { success, message } => {
                    println!(
                        "{}: {message}",
                        if success { "completed" } else { "declared failed" }
                    );
                    Ok(())
                }
                SessionOutcome::Aborted { reason } => {
                    eprintln!("aborted: {reason}");
                    std::process::exit(1);
                }
            }
        }
    }
}
