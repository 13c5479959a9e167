use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use botflow::logging::LoggingConfig;
use botflow::{
    generator_from_fn, handler_from_fn, load_flows_from_path, BotEngine, Effect, EngineConfig,
    EngineReply, FlowRegistry, HandlerOutcome, HandlerRegistry, MemoryStore, OutgoingMessage,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "botflow", version, about = "Conversational flow engine CLI", author)]
struct Cli {
    /// Flow definition file (defaults to BOTFLOW_FLOWS)
    #[arg(long, global = true)]
    flows: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and statically validate flow definitions
    Validate,
    /// List registered flows with their steps
    List,
    /// Simulate a conversation on stdin with stub handlers
    Run {
        flow: String,
        #[arg(long, default_value = "cli")]
        session: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggingConfig::from_env().init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env()?;
    if let Some(path) = cli.flows {
        config = config.with_flows_path(path);
    }
    let path = config.flows_path()?.clone();
    let registry = load_flows_from_path(&path)
        .with_context(|| format!("failed to load flows from `{}`", path.display()))?;

    match cli.command {
        Command::Validate => handle_validate(&registry, &path),
        Command::List => handle_list(&registry),
        Command::Run { flow, session } => handle_run(registry, &config, &flow, &session).await?,
    }
    Ok(())
}

fn handle_validate(registry: &FlowRegistry, path: &PathBuf) {
    let (handlers, generators) = registry.callable_names();
    println!(
        "`{}`: {} flows OK ({} handlers, {} generators referenced)",
        path.display(),
        registry.len(),
        handlers.len(),
        generators.len()
    );
}

fn handle_list(registry: &FlowRegistry) {
    println!("{:<24} {:<32} {:<20} {}", "Flow", "Step", "Type", "Next");
    for name in registry.names() {
        let Some(flow) = registry.get_flow(name) else {
            continue;
        };
        for step in flow.steps() {
            println!(
                "{:<24} {:<32} {:<20} {}",
                flow.name,
                step.id,
                step.kind.type_name(),
                step.next().unwrap_or("-")
            );
        }
    }
}

/// 为所有被引用的回调注册占位实现
fn stub_handlers(registry: &FlowRegistry) -> HandlerRegistry {
    let (handlers, generators) = registry.callable_names();
    let mut stubs = HandlerRegistry::new();
    for name in handlers {
        stubs.register_handler(name, handler_from_fn(|_| Ok(HandlerOutcome::proceed())));
    }
    for name in generators {
        let label = format!("[{name}]");
        stubs.register_generator(
            name,
            generator_from_fn(move |_| Ok(OutgoingMessage::text(label.clone()))),
        );
    }
    stubs
}

async fn handle_run(
    registry: FlowRegistry,
    config: &EngineConfig,
    flow: &str,
    session: &str,
) -> anyhow::Result<()> {
    let handlers = stub_handlers(&registry);
    let engine = BotEngine::new(Arc::new(registry), handlers, Arc::new(MemoryStore::new()))?
        .with_max_handler_hops(config.max_handler_hops);

    render(&engine.start(session, flow).await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let reply = match line {
            "/quit" => break,
            "/retry" => engine.retry(session).await,
            _ if line.starts_with("/start ") => engine.start(session, line[7..].trim()).await,
            _ => engine.handle_input(session, line).await,
        };
        match reply {
            Ok(reply) => render(&reply),
            Err(err) => eprintln!("! {err}"),
        }
    }
    Ok(())
}

fn render(reply: &EngineReply) {
    for effect in &reply.effects {
        match effect {
            Effect::SendMessage { text, keyboard } => {
                println!("bot> {text}");
                if let Some(keyboard) = keyboard {
                    for row in &keyboard.rows {
                        let labels: Vec<_> = row
                            .iter()
                            .map(|button| format!("[{} => {}]", button.text, button.value()))
                            .collect();
                        println!("     {}", labels.join(" "));
                    }
                }
            }
            Effect::HandlerFailed { name, message } => println!("bot! {name}: {message}"),
            other => println!("  .. {other:?}"),
        }
    }
    println!("  == {} (forwarding: {})", reply.state, reply.forwarding);
}
