//! relay - replay agent event scripts through the A2A and AG-UI adapters

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use relay_a2a::{A2aExecutor, A2aMessage, MessageSendParams, StreamResponse};
use relay_agui::{AgUiAdapter, Event, RunAgentInput, codec};
use relay_core::ReplayRunner;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// relay - expose a scripted agent over A2A or AG-UI
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer one A2A message (message/send, or message/stream with --stream)
    A2a(A2aArgs),
    /// Stream one AG-UI run
    Agui(AgUiArgs),
}

#[derive(clap::Args, Debug)]
struct A2aArgs {
    /// Replay script: JSON array or JSON lines of events, errors and pauses
    script: PathBuf,

    /// User message text
    #[arg(short, long, default_value = "Hello")]
    text: String,

    /// File with `MessageSendParams` JSON (overrides --text)
    #[arg(long)]
    request: Option<PathBuf>,

    /// Stream task, status and artifact updates as JSON lines
    #[arg(long)]
    stream: bool,

    /// Surface tool results, thinking and tool calls
    #[arg(long)]
    internal_events: bool,

    /// Attach the answer to the completed status
    #[arg(long)]
    complete_message: bool,

    /// Run timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct AgUiArgs {
    /// Replay script: JSON array or JSON lines of events, errors and pauses
    script: PathBuf,

    /// User message text
    #[arg(short, long, default_value = "Hello")]
    text: String,

    /// File with `RunAgentInput` JSON (overrides --text)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Agent state reported by the replayed agent, as JSON
    #[arg(long)]
    agent_state: Option<String>,

    /// Send TOOL_CALL_ARGS after TOOL_CALL_START
    #[arg(long)]
    tool_args: bool,

    /// Send STATE_SNAPSHOT and STATE_DELTA
    #[arg(long)]
    state_events: bool,

    /// Stream thinking as reasoning messages
    #[arg(long)]
    reasoning: bool,

    /// Run timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Write Server-Sent Events instead of JSON lines
    #[arg(long)]
    sse: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        let path = config::Config::init().context("failed to create config file")?;
        println!("Config file at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let Some(command) = args.command else {
        anyhow::bail!("no command given, see `relay --help`");
    };
    let config = config::Config::load();

    match command {
        Command::A2a(a2a_args) => run_a2a(a2a_args, &config).await,
        Command::Agui(agui_args) => run_agui(agui_args, &config).await,
    }
}

/// Logs go to stderr; stdout carries only protocol output
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("relay=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_a2a(args: A2aArgs, config: &config::Config) -> Result<()> {
    let mut a2a_config = config.a2a_config();
    a2a_config.include_internal_events |= args.internal_events;
    a2a_config.complete_with_message |= args.complete_message;
    if let Some(secs) = args.timeout {
        a2a_config.run_timeout = Some(Duration::from_secs(secs));
    }

    let params = match &args.request {
        Some(path) => read_json::<MessageSendParams>(path)?,
        None => MessageSendParams::new(A2aMessage::user_text(&args.text)),
    };
    let runner = load_runner(&args.script, None)?;
    let executor = A2aExecutor::new(Arc::new(runner), a2a_config);

    if !args.stream {
        let reply = executor.send_message(params).await;
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    let stream = executor.stream_message(params);
    futures::pin_mut!(stream);
    let mut task_id = None;
    let mut cancel_sent = false;
    loop {
        tokio::select! {
            item = stream.next() => {
                let Some(item) = item else { break };
                if let StreamResponse::Task(task) = &item {
                    task_id = Some(task.id.clone());
                }
                print_json(&item)?;
            }
            signal = tokio::signal::ctrl_c(), if !cancel_sent => {
                signal.context("failed to listen for ctrl-c")?;
                cancel_sent = true;
                if let Some(task_id) = &task_id {
                    tracing::debug!(task_id, "cancelling task");
                    executor.cancel(task_id).await?;
                }
            }
        }
    }
    Ok(())
}

async fn run_agui(args: AgUiArgs, config: &config::Config) -> Result<()> {
    let mut agui_config = config.ag_ui_config();
    agui_config.emit_tool_call_args |= args.tool_args;
    agui_config.emit_state_events |= args.state_events;
    agui_config.enable_reasoning |= args.reasoning;
    if let Some(secs) = args.timeout {
        agui_config.run_timeout = Some(Duration::from_secs(secs));
    }

    let input = match &args.input {
        Some(path) => read_json::<RunAgentInput>(path)?,
        None => RunAgentInput::new(new_id(), new_id())
            .with_message(relay_agui::Message::user(&args.text)),
    };
    let request = codec::parse_run_input(&input).context("invalid run input")?;

    let agent_state = args
        .agent_state
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("--agent-state is not valid JSON")?;
    let runner = load_runner(&args.script, agent_state)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let stream = AgUiAdapter::for_input(&input, agui_config).run(Arc::new(runner), request, cancel);
    futures::pin_mut!(stream);
    while let Some(event) = stream.next().await {
        if args.sse {
            print_sse(&event)?;
        } else {
            print_json(&event)?;
        }
    }
    Ok(())
}

fn load_runner(script: &Path, state: Option<Value>) -> Result<ReplayRunner> {
    let runner = ReplayRunner::from_path(script)
        .with_context(|| format!("failed to load script {}", script.display()))?;
    Ok(match state {
        Some(state) => runner.with_state(state),
        None => runner,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn print_sse(event: &Event) -> Result<()> {
    println!(
        "event: {}\ndata: {}\n",
        event.event_type(),
        serde_json::to_string(event)?
    );
    Ok(())
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
