//! Contracts for the speech collaborators and the two loops that drive them:
//! the recognizer supervisor (speech in) and the narrator (speech out).
//!
//! Platform speech APIs are injected through `SpeechRecognizer` and
//! `SpeechSynthesizer`, so a runtime without them still gets a working,
//! text-only interview.

use crate::aggregator::FragmentAggregator;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("speech capability is not available in this environment")]
    Unsupported,
    #[error("speech capability failed: {0}")]
    Failed(String),
}

/// Events emitted by a running recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// A finalized transcript chunk.
    Transcript(String),
    /// The platform stopped the stream. Not an error; the supervisor restarts it.
    Ended,
}

/// Speech-to-text capability.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start(&self) -> Result<mpsc::Receiver<RecognizerEvent>, SpeechError>;
}

/// Progress of a spoken utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealEvent {
    /// Everything up to `offset` characters has been spoken.
    Progress { offset: usize },
    Complete,
}

/// Text-to-speech capability.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: String) -> Result<mpsc::Receiver<RevealEvent>, SpeechError>;

    /// Stops whatever is currently being spoken. A no-op when idle.
    fn cancel(&self);
}

/// Where the assistant's message is displayed.
pub trait AssistantView: Send + Sync {
    /// Replaces the assistant message currently on screen.
    fn show(&self, text: &str);
    /// Marks the message as complete with its full text.
    fn finalize(&self, text: &str);
}

/// Tracks how much of the current utterance has been revealed.
///
/// Each progress event replaces the visible text with a prefix of the utterance;
/// it never appends, so out-of-order or repeated offsets cannot garble it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantDisplay {
    utterance: String,
    visible: String,
    finished: bool,
}

impl AssistantDisplay {
    pub fn begin(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            visible: String::new(),
            finished: false,
        }
    }

    pub fn visible(&self) -> &str {
        &self.visible
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn utterance(&self) -> &str {
        &self.utterance
    }

    pub fn apply(&mut self, event: RevealEvent) -> &str {
        match event {
            RevealEvent::Progress { offset } => {
                self.visible = self.utterance.chars().take(offset).collect();
            }
            RevealEvent::Complete => self.finish(),
        }
        &self.visible
    }

    pub fn finish(&mut self) {
        self.visible = self.utterance.clone();
        self.finished = true;
    }
}

/// Lets input producers stop an in-progress reveal.
///
/// Each interrupt bumps a generation counter, so one raised while the narrator
/// is busy elsewhere is still seen on its next wait.
#[derive(Debug, Clone)]
pub struct NarrationInterrupt {
    generation: Arc<watch::Sender<u64>>,
}

impl Default for NarrationInterrupt {
    fn default() -> Self {
        Self {
            generation: Arc::new(watch::channel(0).0),
        }
    }
}

impl NarrationInterrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the utterance being spoken right now, if any. Never affects a later one.
    pub fn interrupt(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

/// Speaks interviewer utterances one at a time.
pub struct Narrator {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    view: Arc<dyn AssistantView>,
}

impl Narrator {
    /// `synthesizer` is `None` when the runtime has no text-to-speech; utterances are then shown at once.
    pub fn new(
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        view: Arc<dyn AssistantView>,
    ) -> Self {
        Self { synthesizer, view }
    }

    /// Reveals each utterance from `utterances` until the channel closes or `shutdown` flips.
    ///
    /// A new utterance cancels the one still being revealed; so does an interrupt.
    /// Either way the cancelled message is finalized with its full text.
    pub async fn run(
        mut self,
        mut utterances: mpsc::Receiver<String>,
        interrupt: NarrationInterrupt,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut display: Option<AssistantDisplay> = None;
        let mut reveal: Option<mpsc::Receiver<RevealEvent>> = None;
        let mut interrupts = interrupt.subscribe();

        loop {
            tokio::select! {
                next = utterances.recv() => {
                    let Some(text) = next else { break };
                    self.cancel_current(&mut display, &mut reveal);
                    // Input from before this utterance was queued has nothing left to cut off.
                    let _ = interrupts.borrow_and_update();
                    reveal = self.start(&text).await;
                    let mut current = AssistantDisplay::begin(text);
                    if reveal.is_none() {
                        current.finish();
                        self.view.finalize(current.visible());
                    } else {
                        self.view.show(current.visible());
                    }
                    display = Some(current);
                }
                event = next_reveal(&mut reveal) => {
                    let Some(current) = display.as_mut() else {
                        reveal = None;
                        continue;
                    };
                    match event {
                        Some(RevealEvent::Complete) | None => {
                            current.finish();
                            self.view.finalize(current.visible());
                            reveal = None;
                        }
                        Some(event) => {
                            let visible = current.apply(event).to_string();
                            self.view.show(&visible);
                        }
                    }
                }
                Ok(()) = interrupts.changed() => {
                    if reveal.is_some() {
                        tracing::debug!("New input arrived; cancelling reveal.");
                        self.cancel_current(&mut display, &mut reveal);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        self.cancel_current(&mut display, &mut reveal);
        tracing::info!("Narrator stopped.");
    }

    async fn start(&mut self, text: &str) -> Option<mpsc::Receiver<RevealEvent>> {
        let synthesizer = self.synthesizer.as_ref()?;
        match synthesizer.speak(text.to_string()).await {
            Ok(events) => Some(events),
            Err(SpeechError::Unsupported) => {
                tracing::warn!("Speech synthesis unavailable; continuing text-only.");
                self.synthesizer = None;
                None
            }
            Err(e) => {
                tracing::warn!("Could not speak utterance: {}", e);
                None
            }
        }
    }

    fn cancel_current(
        &self,
        display: &mut Option<AssistantDisplay>,
        reveal: &mut Option<mpsc::Receiver<RevealEvent>>,
    ) {
        if reveal.take().is_some() {
            if let Some(synthesizer) = &self.synthesizer {
                synthesizer.cancel();
            }
            if let Some(current) = display.as_mut() {
                current.finish();
                self.view.finalize(current.visible());
            }
        }
    }
}

async fn next_reveal(reveal: &mut Option<mpsc::Receiver<RevealEvent>>) -> Option<RevealEvent> {
    match reveal {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

/// Retry behaviour for the recognizer supervisor.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    pub delay: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            max_consecutive_failures: 5,
        }
    }
}

/// Why the recognizer supervisor returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerExit {
    Shutdown,
    /// No speech-to-text here; the interview continues text-only.
    Unsupported,
    /// The very first start failed, so there is nothing to recover.
    NeverStarted,
    /// Restarts kept failing after the stream had been running.
    GaveUp,
}

/// Feeds recognized transcripts into the aggregator and keeps the recognizer alive.
///
/// A stream that ends is restarted, but only once the recognizer has started
/// successfully at least once. Every transcript also interrupts narration so the
/// candidate can talk over the interviewer.
pub async fn supervise_recognizer(
    recognizer: Arc<dyn SpeechRecognizer>,
    aggregator: Arc<FragmentAggregator>,
    interrupt: NarrationInterrupt,
    policy: RestartPolicy,
    mut shutdown: watch::Receiver<bool>,
) -> RecognizerExit {
    let mut started_once = false;
    let mut failures = 0;

    loop {
        if *shutdown.borrow() {
            return RecognizerExit::Shutdown;
        }

        let mut events = match recognizer.start().await {
            Ok(events) => {
                if started_once {
                    tracing::info!("Speech recognition restarted.");
                } else {
                    tracing::info!("Speech recognition started.");
                }
                started_once = true;
                failures = 0;
                events
            }
            Err(SpeechError::Unsupported) => {
                tracing::warn!("Speech recognition unsupported; continuing text-only.");
                return RecognizerExit::Unsupported;
            }
            Err(e) if !started_once => {
                tracing::warn!("Speech recognition failed to start ({}); continuing text-only.", e);
                return RecognizerExit::NeverStarted;
            }
            Err(e) => {
                failures += 1;
                if failures >= policy.max_consecutive_failures {
                    tracing::error!("Giving up on speech recognition after {} failures: {}", failures, e);
                    return RecognizerExit::GaveUp;
                }
                tracing::warn!("Speech recognition restart failed ({}); retrying.", e);
                tokio::select! {
                    _ = tokio::time::sleep(policy.delay) => continue,
                    _ = shutdown.changed() => return RecognizerExit::Shutdown,
                }
            }
        };

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(RecognizerEvent::Transcript(text)) => {
                        let text = text.trim();
                        if !text.is_empty() {
                            tracing::info!("Candidate said: \"{}\"", text);
                            interrupt.interrupt();
                            aggregator.push(text);
                        }
                    }
                    Some(RecognizerEvent::Ended) | None => {
                        tracing::debug!("Speech recognition stream ended.");
                        break;
                    }
                },
                _ = shutdown.changed() => return RecognizerExit::Shutdown,
            }
        }
    }
}
