use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use onb_ai::evidence::{SourceDocument, SourceLibrary};
use onb_ai::grounded::GroundedAnswerProvider;
use onb_ai::llm::ollama_llm::OllamaLlm;
use onb_ai::ollama::OllamaClient;
use onb_ai::simulated::SimulatedAnswerProvider;
use onb_ai::{AnswerProvider, ChatSession, TurnOutcome};
use onb_core::config::ChatConfig;
use onb_core::domain::MessageId;
use onb_core::error::AppError;
use onb_core::sources::{
    input_placeholder, suggested_questions, welcome_message, InMemorySourceRegistry, Source,
    SourceRegistry, SourceStatus, SourceType,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::input::{ctrl_c, next_input, Input};

mod input;
mod render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    /// Canned answers, no model needed.
    Simulated,
    /// Local Ollama answering from the loaded sources.
    Ollama,
}

#[derive(Debug, Parser)]
#[command(name = "onb-chat")]
#[command(about = "Ask questions about notebook sources and get cited answers")]
struct Cli {
    /// JSON chat config; defaults apply when missing.
    #[arg(long, env = "ONB_CHAT_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "simulated")]
    provider: ProviderKind,

    /// Text file to load as a ready source (repeatable).
    #[arg(long = "source")]
    sources: Vec<PathBuf>,

    /// Delay simulated answers, in milliseconds.
    #[arg(long, default_value = "0")]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &ChatConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    // Logs go to stderr so the transcript on stdout stays clean.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn source_type_for(path: &Path) -> SourceType {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") => SourceType::Text,
        _ => SourceType::Document,
    }
}

fn load_sources(
    paths: &[PathBuf],
    registry: &InMemorySourceRegistry,
    library: &SourceLibrary,
) -> Result<(), AppError> {
    for (i, path) in paths.iter().enumerate() {
        let text = fs::read_to_string(path).map_err(|e| {
            AppError::new("SOURCE_READ_FAILED", "Failed to read source file")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;
        let id = format!("source-{}", i + 1);
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| id.clone());

        let mut source = Source::new(id.clone(), title.clone(), source_type_for(path), SourceStatus::Processing);
        source.word_count = Some(text.split_whitespace().count() as u64);
        registry.upsert(source);
        library.insert(SourceDocument {
            source_id: id.clone(),
            title,
            text,
        });
        registry.set_status(&id, SourceStatus::Ready)?;
        tracing::info!(source_id = %id, path = %path.display(), "source loaded");
    }
    Ok(())
}

async fn build_provider(
    kind: ProviderKind,
    config: &ChatConfig,
    registry: Arc<InMemorySourceRegistry>,
    library: Arc<SourceLibrary>,
    delay: Duration,
) -> Result<Arc<dyn AnswerProvider>, AppError> {
    match kind {
        ProviderKind::Simulated => Ok(Arc::new(SimulatedAnswerProvider::new(registry).with_delay(delay))),
        ProviderKind::Ollama => {
            let client = OllamaClient::new(&config.ollama.base_url)?
                .with_timeout(Duration::from_secs(config.ollama.timeout_secs));
            let checker = client.clone();
            tokio::task::spawn_blocking(move || checker.health_check())
                .await
                .map_err(|e| {
                    AppError::new("AI_OLLAMA_UNREACHABLE", "Health check did not complete")
                        .with_details(e.to_string())
                })??;
            tracing::info!(base_url = client.base_url(), model = %config.ollama.model, "ollama ready");
            Ok(Arc::new(GroundedAnswerProvider::new(
                OllamaLlm::new(client),
                library,
                &config.ollama,
            )))
        }
    }
}

fn print_intro(registry: &dyn SourceRegistry) {
    let sources = registry.sources();
    println!("{}", welcome_message(&sources));
    for q in suggested_questions(&sources) {
        println!("  - {q}");
    }
    println!("Commands: /cite <n>, /json, /clear, /quit");
}

fn print_answer(session: &ChatSession, message_id: &MessageId) -> Result<(), AppError> {
    let segments = session.segments(message_id)?;
    let snapshot = session.snapshot();
    let message = snapshot.iter().find(|m| &m.id == message_id).ok_or_else(|| {
        AppError::new("PREVIEW_MESSAGE_NOT_FOUND", "Message not found in transcript")
            .with_details(format!("message_id={message_id}"))
    })?;
    println!("{}", render::assistant_block(message, &segments));
    Ok(())
}

fn print_preview(session: &ChatSession, last_answer: Option<&MessageId>, arg: &str) {
    let Some(message_id) = last_answer else {
        println!("No answer to cite yet.");
        return;
    };
    let Ok(number) = arg.trim().parse::<u32>() else {
        println!("Usage: /cite <n>");
        return;
    };
    match session.preview(message_id, number) {
        Ok(p) => {
            println!("{}", p.label);
            if let Some(page) = p.page_number {
                println!("  page {page}");
            }
            println!("  \"{}\"", p.quote);
            println!("  {}% relevant", p.relevance_pct);
        }
        Err(e) => println!("{e}"),
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = match cli.config.as_deref() {
        Some(path) => ChatConfig::load(path)?,
        None => ChatConfig::default(),
    };
    init_logging(&config);

    let registry = Arc::new(InMemorySourceRegistry::default());
    let library = Arc::new(SourceLibrary::default());
    load_sources(&cli.sources, &registry, &library)?;

    let provider = build_provider(
        cli.provider,
        &config,
        Arc::clone(&registry),
        library,
        Duration::from_millis(cli.delay_ms),
    )
    .await?;
    let mut session = ChatSession::new(provider, registry.clone(), config);
    print_intro(registry.as_ref());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_answer: Option<MessageId> = None;
    loop {
        println!("{}", input_placeholder(&registry.sources()));
        // Once a Ctrl-C handler is installed SIGINT no longer exits on its
        // own, so an interrupt at the prompt ends the loop.
        let line = match next_input(&mut lines, ctrl_c()).await? {
            Input::Line(line) => line,
            Input::Eof | Input::Interrupted => break,
        };

        let trimmed = line.trim();
        match trimmed {
            "/quit" => break,
            "/clear" => {
                session.switch_notebook(registry.clone());
                last_answer = None;
                print_intro(registry.as_ref());
                continue;
            }
            "/json" => {
                let json = serde_json::to_string_pretty(&session.snapshot()).map_err(|e| {
                    AppError::new("CHAT_EXPORT_FAILED", "Failed to serialize transcript")
                        .with_details(e.to_string())
                })?;
                println!("{json}");
                continue;
            }
            _ => {}
        }
        if let Some(arg) = trimmed.strip_prefix("/cite") {
            print_preview(&session, last_answer.as_ref(), arg);
            continue;
        }

        let pending = match session.submit(&line) {
            Ok(p) => p,
            // A bare Enter just prompts again.
            Err(e) if e.is("CHAT_INVALID_INPUT") && trimmed.is_empty() => continue,
            Err(e) => {
                println!("{}", e.message);
                continue;
            }
        };
        println!("Thinking...");

        // Ctrl-C drops the pending answer, which records it as cancelled.
        let outcome = tokio::select! {
            outcome = pending.complete() => Some(outcome),
            _ = ctrl_c() => None,
        };
        match outcome {
            Some(TurnOutcome::Answered { message_id, warnings }) => {
                for w in warnings.iter() {
                    tracing::debug!(code = %w.code, "{}", w.message);
                }
                print_answer(&session, &message_id)?;
                last_answer = Some(message_id);
            }
            Some(TurnOutcome::Failed { message_id, error }) => {
                tracing::debug!(code = %error.code, "answer failed");
                print_answer(&session, &message_id)?;
            }
            Some(TurnOutcome::Discarded) => {}
            None => println!("{}", session.snapshot().last().map(|m| m.content.clone()).unwrap_or_default()),
        }
    }

    session.close();
    Ok(())
}
