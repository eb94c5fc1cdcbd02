mod backend;
mod config;
mod console;
mod gemini_adapter;
mod openai_adapter;
mod prompt_loader;

use crate::config::Config;
use crate::console::{
    CODE_POLL_INTERVAL, CodeFilePoller, ConsoleSynthesizer, ConsoleView, NoSpeechRecognizer,
};
use anyhow::{Context, Result};
use clap::Parser;
use preppal_core::aggregator::FragmentAggregator;
use preppal_core::clock::SystemClock;
use preppal_core::scheduler::BatchScheduler;
use preppal_core::session::{Question, SessionConfig, WorkspaceSnapshot};
use preppal_core::speech::{NarrationInterrupt, Narrator, RestartPolicy, supervise_recognizer};
use preppal_core::stages::PipelineHandles;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::fmt::time::ChronoLocal;

/// How long tasks get to wind down after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(version, about = "A text-mode mock coding interview")]
struct Cli {
    /// The candidate's name, used to address them
    candidate_name: String,
    /// Title of the interview question
    question_title: String,
    /// Full problem statement
    #[arg(long, default_value = "")]
    description: String,
    /// Reference solution, seen only by the interviewer
    #[arg(long, default_value = "")]
    editorial: String,
    /// Initial contents of the candidate's editor
    #[arg(long, default_value = "")]
    starter_code: String,
    /// File the candidate edits; polled for changes
    #[arg(long)]
    code_file: Option<PathBuf>,
    /// Directory of `<stage>.md` files overriding the built-in prompts
    #[arg(long)]
    prompts: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 2. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 3. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting interviewer service...");

    let session = SessionConfig::new(
        args.candidate_name,
        Question {
            title: args.question_title,
            description: args.description,
            editorial: args.editorial,
            starter_code: args.starter_code,
        },
    );

    // --- 4. Load Prompts ---
    let templates = prompt_loader::stage_templates(args.prompts.as_deref())
        .context("Failed to load LLM prompts")?;

    // --- 5. Initialize the Pipeline ---
    let model = backend::connect(&config);
    let pipeline = PipelineHandles::initialize(
        &session,
        model,
        templates,
        config.temperature,
        config.evaluation_format,
    );

    // --- 6. Application Setup ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    // Create the command channel to decouple core logic from the runtime.
    let (command_tx, mut command_rx) = mpsc::channel::<preppal_core::Command>(32);
    let (utterance_tx, utterance_rx) = mpsc::channel::<String>(8);

    let aggregator = Arc::new(FragmentAggregator::new());
    let workspace = Arc::new(WorkspaceSnapshot::new(session.question.starter_code.clone()));
    let interrupt = NarrationInterrupt::new();

    let scheduler = Arc::new(BatchScheduler::new(
        pipeline,
        aggregator.clone(),
        workspace.clone(),
        Arc::new(SystemClock::start()),
        command_tx,
    ));
    let scheduler_handle = tokio::spawn(
        scheduler
            .clone()
            .run(config.tick_interval, shutdown_rx.clone()),
    );

    // Speech out: a console reveal in place of a voice.
    let narrator = Narrator::new(
        Some(Arc::new(ConsoleSynthesizer::default())),
        Arc::new(ConsoleView::stdout()),
    );
    let narrator_handle = tokio::spawn(narrator.run(
        utterance_rx,
        interrupt.clone(),
        shutdown_rx.clone(),
    ));

    // This task handles commands from the core logic, executing side effects.
    let command_handler = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            match command {
                preppal_core::Command::SpeakText(text) => {
                    tracing::info!("Interviewer said: \"{}\"", text);
                    if let Err(e) = utterance_tx.send(text).await {
                        tracing::error!("Failed to hand utterance to narrator: {:?}", e);
                    }
                }
                preppal_core::Command::Evaluation(result) => {
                    tracing::info!("Evaluation received ({:?}).", result.mode);
                    println!("{}", console::render_evaluation(&result));
                }
            }
        }
    });

    // Speech in: terminals have no recognizer, so this degrades to text-only at once.
    let recognizer_handle = tokio::spawn(supervise_recognizer(
        Arc::new(NoSpeechRecognizer),
        aggregator.clone(),
        interrupt.clone(),
        RestartPolicy::default(),
        shutdown_rx.clone(),
    ));

    let input_handle = tokio::spawn(console::read_typed_input(
        console::spawn_stdin_reader(),
        aggregator.clone(),
        interrupt.clone(),
        shutdown_rx.clone(),
    ));

    let code_handle = match args.code_file {
        Some(path) => {
            let poller = CodeFilePoller::new(path, workspace.clone(), aggregator.clone());
            poller.seed().await.context("Failed to prepare code file")?;
            Some(tokio::spawn(
                poller.run(CODE_POLL_INTERVAL, shutdown_rx.clone()),
            ))
        }
        None => None,
    };

    println!(
        "Interview for {} started: {}. Type your answers and press Enter; Ctrl-C ends the session.",
        session.candidate_name, session.question.title
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Received Ctrl-C, shutting down...");

    // --- 7. Teardown ---
    // Stops the timer and every producer; an in-flight batch is discarded when its stage returns.
    let _ = shutdown_tx.send(true);
    let stopped = async {
        let _ = scheduler_handle.await;
        let _ = narrator_handle.await;
        let _ = recognizer_handle.await;
        if let Some(handle) = code_handle {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, stopped).await.is_err() {
        tracing::warn!("Some tasks did not stop within {:?}.", SHUTDOWN_GRACE);
    }
    let _ = input_handle.await;
    command_handler.abort();

    tracing::info!(
        "Session ended after {} exchange(s).",
        scheduler.history().len()
    );
    Ok(())
}
