//! quire - artifact co-writing in the terminal

mod commands;
mod config;
mod session;

use clap::Parser;
use std::io::{self, Write};
use std::sync::Arc;

use commands::{ActionsCommand, CommandResult, VersionsCommand};
use quire_engine::{
    FileMemoryStore, FileThreadStore, Orchestrator, ProviderClient, TurnEvent, TurnOutcome,
};
use session::Session;
use tokio::task::JoinHandle;

/// quire - co-write documents and code with a model
#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model for routing and generation (default: claude-sonnet-4-5-20250929)
    #[arg(short, long)]
    model: Option<String>,

    /// Model for the note after each edit
    #[arg(long)]
    followup_model: Option<String>,

    /// Assistant whose memory and custom actions to use
    #[arg(short, long)]
    assistant: Option<String>,

    /// Resume a thread by ID
    #[arg(short, long)]
    thread: Option<String>,

    /// List stored threads
    #[arg(long)]
    threads: bool,

    /// Run a single turn and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Create a default config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("quire=debug")
            .with_writer(io::stderr)
            .init();
    }

    if args.init_config {
        let path = config::Config::init()?;
        println!("Config file: {}", path.display());
        return Ok(());
    }

    let cfg = config::Config::load();
    let data_dir = cfg.data_dir();

    let threads = Arc::new(FileThreadStore::new(&data_dir));
    if args.threads {
        for id in threads.list_threads().await? {
            println!("{}", id);
        }
        return Ok(());
    }

    let Some(api_key) = cfg.get_api_key() else {
        eprintln!("Error: No Anthropic API key found");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  1. Set API key: export ANTHROPIC_API_KEY=your-key");
        eprintln!("  2. Add to config: quire --init-config");
        std::process::exit(1);
    };

    let engine = cfg.engine_config(args.model.as_deref(), args.followup_model.as_deref());
    let client = Arc::new(ProviderClient::anthropic(Some(api_key.as_str()))?);
    let orchestrator = Arc::new(Orchestrator::new(
        client,
        Arc::new(FileMemoryStore::new(&data_dir)),
        threads.clone(),
        engine,
    ));

    let assistant_id = args
        .assistant
        .or(cfg.assistant.clone())
        .unwrap_or_else(|| "default".to_string());
    let mut session = Session::open(orchestrator, threads, assistant_id, args.thread).await?;

    let printer = spawn_printer(session.orchestrator().subscribe());

    let result = match args.command {
        Some(command) => run_command(&mut session, &command).await,
        None => run_interactive(&mut session).await,
    };

    session.close().await;
    printer.abort();
    result
}

/// Print streamed deltas as they arrive
fn spawn_printer(
    mut receiver: tokio::sync::broadcast::Receiver<TurnEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(TurnEvent::NodeStart { node }) => {
                    if node.mutates_artifact() {
                        println!("[{}...]", node.as_str());
                    }
                }
                Ok(TurnEvent::MessageDelta { node, delta }) => {
                    // mutating nodes stream raw tool JSON; the body prints with the new version
                    if !node.mutates_artifact() {
                        print!("{}", delta);
                        io::stdout().flush().ok();
                    }
                }
                Ok(TurnEvent::MessageEnd { node, .. }) => {
                    if !node.mutates_artifact() {
                        println!();
                    }
                }
                Ok(TurnEvent::Error { message }) => {
                    eprintln!("Error: {}", message);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event printer lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn run_command(session: &mut Session, command: &str) -> anyhow::Result<()> {
    println!("quire> {}", command);
    println!();

    if let Some(result) = commands::execute_command(command, session.artifact()) {
        handle_command(session, result).await;
        return Ok(());
    }
    let outcome = session.submit(Some(command.to_string()), None).await?;
    print_outcome(&outcome);
    Ok(())
}

async fn run_interactive(session: &mut Session) -> anyhow::Result<()> {
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!(
            "quire ({}) thread: {}",
            session.orchestrator().config().model.id,
            session.thread_id()
        );
        if let Some(doc) = session.artifact() {
            eprintln!("artifact at version {} of {}", doc.current_index(), doc.latest_index());
        }
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(input, session.artifact()) {
            if !handle_command(session, result).await {
                break;
            }
            println!();
            continue;
        }

        println!();
        match session.submit(Some(input.to_string()), None).await {
            Ok(outcome) => print_outcome(&outcome),
            // already reported by the event printer
            Err(e) => tracing::debug!("turn failed: {}", e),
        }
        println!();
    }

    Ok(())
}

/// Run a slash command. Returns `false` when the session should end.
async fn handle_command(session: &mut Session, result: CommandResult) -> bool {
    match result {
        CommandResult::Message(msg) => println!("{}", msg),
        CommandResult::Exit => return false,
        CommandResult::Unknown(cmd) => {
            println!("Unknown command: /{}", cmd);
            println!("Type /help for available commands.");
        }
        CommandResult::Turn {
            directive,
            instruction,
        } => match session.submit(instruction, Some(directive)).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => tracing::debug!("turn failed: {}", e),
        },
        CommandResult::Rewind(index) => match session.rewind(index) {
            Ok(()) => {
                if let CommandResult::Message(text) = VersionsCommand::show(session.artifact()) {
                    println!("{}", text);
                }
            }
            Err(e) => println!("Error: {}", e),
        },
        CommandResult::SwitchThread(thread_id) => match session.switch_thread(thread_id).await {
            Ok(()) => {
                println!("Thread: {}", session.thread_id());
                println!(
                    "{} messages, {}",
                    session.messages().len(),
                    match session.artifact() {
                        Some(doc) => format!("artifact at version {}", doc.current_index()),
                        None => "no artifact".to_string(),
                    }
                );
            }
            Err(e) => println!("Failed to open thread: {}", e),
        },
        CommandResult::ShowReflections => {
            match session
                .orchestrator()
                .reflections()
                .get(session.assistant_id())
                .await
            {
                Ok(reflections) => println!("{}", commands::reflections_text(&reflections)),
                Err(e) => println!("Error: {}", e),
            }
        }
        CommandResult::ClearReflections => {
            match session
                .orchestrator()
                .reflections()
                .clear(session.assistant_id())
                .await
            {
                Ok(()) => println!("Reflections cleared."),
                Err(e) => println!("Error: {}", e),
            }
        }
        CommandResult::ListActions => {
            match session
                .orchestrator()
                .custom_actions()
                .list(session.assistant_id())
                .await
            {
                Ok(actions) => println!("{}", ActionsCommand::list_text(&actions)),
                Err(e) => println!("Error: {}", e),
            }
        }
        CommandResult::AddAction(draft) => {
            match session
                .orchestrator()
                .custom_actions()
                .create(session.assistant_id(), draft)
                .await
            {
                Ok(action) => println!("Added {} ({})", action.title, action.id),
                Err(e) => println!("Error: {}", e),
            }
        }
        CommandResult::RemoveAction(id) => {
            match session
                .orchestrator()
                .custom_actions()
                .delete(session.assistant_id(), &id)
                .await
            {
                Ok(true) => println!("Removed {}", id),
                Ok(false) => println!("No custom action {}", id),
                Err(e) => println!("Error: {}", e),
            }
        }
    }
    true
}

fn print_outcome(outcome: &TurnOutcome) {
    if let Some(index) = outcome.new_version() {
        if let Some(content) = outcome.artifact.as_ref().and_then(|doc| doc.version(index)) {
            println!();
            println!("{}", VersionsCommand::render(content));
        }
    }
    tracing::debug!(
        node = outcome.node.as_str(),
        input_tokens = outcome.usage.input,
        output_tokens = outcome.usage.output,
        "turn complete"
    );
}
