//! Terminal front end for a text-only interview.
//!
//! Stands in for the browser collaborators: typed lines replace speech
//! recognition, a word-by-word console reveal replaces speech synthesis, and a
//! polled file replaces the code editor.

use async_trait::async_trait;
use preppal_core::aggregator::FragmentAggregator;
use preppal_core::code_watcher::CodeDeltaWatcher;
use preppal_core::evaluation::{EvaluationMode, EvaluationResult};
use preppal_core::session::WorkspaceSnapshot;
use preppal_core::speech::{
    AssistantView, NarrationInterrupt, RecognizerEvent, RevealEvent, SpeechError,
    SpeechRecognizer, SpeechSynthesizer,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Delay between revealed words.
pub const WORD_DELAY: Duration = Duration::from_millis(120);
/// How often the code file is re-read.
pub const CODE_POLL_INTERVAL: Duration = Duration::from_millis(500);

const ASSISTANT_PREFIX: &str = "Interviewer: ";

/// Prints the assistant message to a terminal, appending only what is new.
pub struct ConsoleView<W: Write + Send> {
    out: Mutex<ConsoleState<W>>,
}

struct ConsoleState<W> {
    writer: W,
    printed: String,
    open: bool,
}

impl ConsoleView<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleView<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: Mutex::new(ConsoleState {
                writer,
                printed: String::new(),
                open: false,
            }),
        }
    }

    fn write(&self, text: &str, close: bool) {
        let mut state = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let ConsoleState {
            writer,
            printed,
            open,
        } = &mut *state;

        let mut chunk = String::new();
        if !*open {
            chunk.push_str(ASSISTANT_PREFIX);
            printed.clear();
            *open = true;
        }
        match text.strip_prefix(printed.as_str()) {
            Some(rest) => chunk.push_str(rest),
            // The visible text moved backwards; start the line over.
            None => {
                chunk.push('\n');
                chunk.push_str(ASSISTANT_PREFIX);
                chunk.push_str(text);
            }
        }
        *printed = text.to_string();
        if close {
            chunk.push('\n');
            *open = false;
        }

        if let Err(e) = writer.write_all(chunk.as_bytes()).and_then(|_| writer.flush()) {
            tracing::warn!("Failed to write to console: {}", e);
        }
    }
}

impl<W: Write + Send> AssistantView for ConsoleView<W> {
    fn show(&self, text: &str) {
        self.write(text, false);
    }

    fn finalize(&self, text: &str) {
        self.write(text, true);
    }
}

/// Formats an evaluation for the candidate-facing panel.
pub fn render_evaluation(result: &EvaluationResult) -> String {
    let heading = match result.mode {
        EvaluationMode::Incremental => "Progress check",
        EvaluationMode::Final => "Final evaluation",
    };
    let mut out = format!("--- {heading} ---\n");
    if let Some(m) = &result.metrics {
        out.push_str(&format!(
            "DSA: {}/10  Logic: {}/10  Communication: {}/10  Testing: {}/10  Code cleanliness: {}/10\n",
            m.dsa, m.logic, m.communication, m.testing, m.code_cleanliness
        ));
    }
    if !result.feedback.is_empty() {
        out.push_str(&result.feedback);
        out.push('\n');
    }
    out
}

/// Reveals text one word at a time, as a speaking voice would.
pub struct ConsoleSynthesizer {
    word_delay: Duration,
    generation: Arc<AtomicU64>,
}

impl ConsoleSynthesizer {
    pub fn new(word_delay: Duration) -> Self {
        Self {
            word_delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for ConsoleSynthesizer {
    fn default() -> Self {
        Self::new(WORD_DELAY)
    }
}

/// Character offsets at the end of each word.
fn word_boundaries(text: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut in_word = false;
    for (i, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            if in_word {
                offsets.push(i);
            }
            in_word = false;
        } else {
            in_word = true;
        }
    }
    if in_word {
        offsets.push(text.chars().count());
    }
    offsets
}

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    async fn speak(&self, text: String) -> Result<mpsc::Receiver<RevealEvent>, SpeechError> {
        let (tx, rx) = mpsc::channel(16);
        let generation = self.generation.clone();
        let mine = generation.fetch_add(1, Ordering::AcqRel) + 1;
        let delay = self.word_delay;

        tokio::spawn(async move {
            for offset in word_boundaries(&text) {
                tokio::time::sleep(delay).await;
                if generation.load(Ordering::Acquire) != mine {
                    return;
                }
                if tx.send(RevealEvent::Progress { offset }).await.is_err() {
                    return;
                }
            }
            if generation.load(Ordering::Acquire) == mine {
                let _ = tx.send(RevealEvent::Complete).await;
            }
        });

        Ok(rx)
    }

    fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// A recognizer for terminals, which have no microphone pipeline.
pub struct NoSpeechRecognizer;

#[async_trait]
impl SpeechRecognizer for NoSpeechRecognizer {
    async fn start(&self) -> Result<mpsc::Receiver<RecognizerEvent>, SpeechError> {
        Err(SpeechError::Unsupported)
    }
}

/// Reads stdin lines on a dedicated thread.
///
/// Stdin reads cannot be cancelled, so they stay off the runtime's blocking
/// pool, which would otherwise hold up process exit.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to read input: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Pushes each non-empty typed line into the aggregator until input closes or shutdown.
pub async fn read_typed_input(
    mut lines: mpsc::Receiver<String>,
    aggregator: Arc<FragmentAggregator>,
    interrupt: NarrationInterrupt,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    tracing::info!("Input closed.");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                tracing::debug!("Typed input: \"{}\"", line);
                interrupt.interrupt();
                aggregator.push(line);
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Watches a source file standing in for the candidate's editor.
pub struct CodeFilePoller {
    path: PathBuf,
    workspace: Arc<WorkspaceSnapshot>,
    aggregator: Arc<FragmentAggregator>,
    watcher: CodeDeltaWatcher,
    last_seen: String,
}

impl CodeFilePoller {
    /// The baseline is the workspace's current code, normally the starter code.
    pub fn new(
        path: PathBuf,
        workspace: Arc<WorkspaceSnapshot>,
        aggregator: Arc<FragmentAggregator>,
    ) -> Self {
        let current = workspace.current();
        Self {
            path,
            watcher: CodeDeltaWatcher::new(&current),
            last_seen: current,
            workspace,
            aggregator,
        }
    }

    /// Writes the starter code to the file when it does not exist yet.
    pub async fn seed(&self) -> anyhow::Result<()> {
        if !tokio::fs::try_exists(&self.path).await? {
            tokio::fs::write(&self.path, &self.last_seen).await?;
            tracing::info!("Wrote starter code to {}", self.path.display());
        }
        Ok(())
    }

    /// Applies one observation of the file contents.
    ///
    /// Every change replaces the workspace snapshot; enough new lines also
    /// become an input fragment.
    pub fn apply(&mut self, code: String) -> Option<String> {
        if code == self.last_seen {
            return None;
        }
        self.workspace.replace(code.clone());
        let added = self.watcher.observe(&code);
        self.last_seen = code;

        if let Some(added) = &added {
            tracing::debug!("Candidate added code:\n{}", added);
            self.aggregator.push(added.clone());
        }
        added
    }

    pub async fn run(mut self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!("Watching {} for code changes.", self.path.display());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match tokio::fs::read_to_string(&self.path).await {
                        Ok(code) => {
                            self.apply(code);
                        }
                        Err(e) => tracing::debug!("Could not read {}: {}", self.path.display(), e),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("Code watcher stopped.");
    }
}
