use crate::Command;
use crate::aggregator::FragmentAggregator;
use crate::clock::Clock;
use crate::evaluation::EvaluationResult;
use crate::history::{ConversationHistory, ConversationTurn};
use crate::session::WorkspaceSnapshot;
use crate::stages::{EvaluationInput, InterviewInput, PipelineHandles, SummaryInput};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// How often the runtime drives `tick` unless configured otherwise.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(3);

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Another batch was still in flight; this tick did nothing.
    Busy,
    /// No fragments were waiting.
    Idle,
    /// The session was torn down while the batch was in flight; its results were discarded.
    Abandoned,
    /// A batch ran through every stage.
    Completed {
        batched_input: String,
        utterance: String,
        evaluation: Option<EvaluationResult>,
    },
}

#[derive(Debug, Default)]
struct SchedulerState {
    history: ConversationHistory,
    last_evaluated_minute: Option<u64>,
}

/// Clears the in-flight flag however the batch ends: success, early return or `?`.
struct BatchGuard<'a> {
    in_flight: &'a AtomicBool,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Drains buffered input on every tick and runs it through summarize, interview
/// and evaluate, one batch at a time.
///
/// The scheduler owns all session-scoped mutable state (history, rolling
/// summary, last evaluated minute). Results leave through the command channel.
pub struct BatchScheduler {
    pipeline: PipelineHandles,
    aggregator: Arc<FragmentAggregator>,
    workspace: Arc<WorkspaceSnapshot>,
    clock: Arc<dyn Clock>,
    commands: mpsc::Sender<Command>,
    in_flight: AtomicBool,
    torn_down: AtomicBool,
    state: Mutex<SchedulerState>,
}

impl BatchScheduler {
    pub fn new(
        pipeline: PipelineHandles,
        aggregator: Arc<FragmentAggregator>,
        workspace: Arc<WorkspaceSnapshot>,
        clock: Arc<dyn Clock>,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            pipeline,
            aggregator,
            workspace,
            clock,
            commands,
            in_flight: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn is_running_batch(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn history(&self) -> ConversationHistory {
        self.state().history.clone()
    }

    pub fn last_evaluated_minute(&self) -> Option<u64> {
        self.state().last_evaluated_minute
    }

    /// Ends the session. Later ticks do nothing, and a batch still in flight
    /// is discarded when its current stage returns.
    pub fn tear_down(&self) {
        self.torn_down.store(true, Ordering::Release);
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    fn abandoned(&self, stage: &str) -> bool {
        let torn_down = self.is_torn_down();
        if torn_down {
            tracing::info!("Session ended during {} stage; discarding batch.", stage);
        }
        torn_down
    }

    /// Runs one batch if none is in flight and input is waiting.
    ///
    /// On error the drained fragments are dropped, no turn is recorded and the
    /// in-flight flag is cleared so the next tick runs normally. After
    /// `tear_down`, nothing is recorded or published.
    pub async fn tick(&self) -> Result<TickOutcome> {
        if self.is_torn_down() {
            return Ok(TickOutcome::Abandoned);
        }
        let Some(_guard) = self.try_begin_batch() else {
            tracing::debug!("Previous batch still running; skipping tick.");
            return Ok(TickOutcome::Busy);
        };

        let fragments = self.aggregator.drain_all();
        if fragments.is_empty() {
            return Ok(TickOutcome::Idle);
        }
        let batched_input = fragments.join(" ");
        tracing::info!(
            "Processing batch of {} fragment(s): \"{}\"",
            fragments.len(),
            batched_input
        );

        // Stage 1: fold the conversation so far into the rolling summary.
        let (recent_history, prior_summary) = {
            let state = self.state();
            (
                state.history.recent_transcript(),
                state.history.summary().to_string(),
            )
        };
        let updated = self
            .pipeline
            .summarizer
            .summarize(SummaryInput {
                recent_history: recent_history.clone(),
                existing_summary: prior_summary.clone(),
            })
            .await
            .context("Summarizer stage failed")?;
        if self.abandoned("summarizer") {
            return Ok(TickOutcome::Abandoned);
        }
        let summary = if updated.trim().is_empty() {
            tracing::debug!("Summarizer returned nothing; keeping previous summary.");
            prior_summary
        } else {
            self.state().history.set_summary(updated.clone());
            updated
        };

        // Stage 2: decide what, if anything, the interviewer says.
        let workspace = self.workspace.current();
        let utterance = self
            .pipeline
            .interviewer
            .respond(InterviewInput {
                batched_input: batched_input.clone(),
                recent_history,
                summary: summary.clone(),
                workspace: workspace.clone(),
                elapsed_minutes: self.clock.elapsed_minutes(),
            })
            .await
            .context("Interviewer stage failed")?;
        if self.abandoned("interviewer") {
            return Ok(TickOutcome::Abandoned);
        }

        // Stage 3: at most one evaluation per elapsed minute.
        let minute = self.clock.elapsed_minutes();
        let evaluation = if self.state().last_evaluated_minute != Some(minute) {
            let result = self
                .pipeline
                .evaluator
                .evaluate(EvaluationInput {
                    elapsed_minutes: minute,
                    summary,
                    workspace,
                    recent_turns: ConversationTurn::new(batched_input.clone(), utterance.clone())
                        .render(),
                })
                .await
                .context("Evaluator stage failed")?;
            if self.abandoned("evaluator") {
                return Ok(TickOutcome::Abandoned);
            }
            self.state().last_evaluated_minute = Some(minute);
            if let Some(result) = &result {
                tracing::info!(
                    "Evaluation at minute {}: {}",
                    minute,
                    serde_json::to_string(result).unwrap_or_default()
                );
                self.publish(Command::Evaluation(result.clone())).await;
            }
            result
        } else {
            tracing::debug!("Minute {} already evaluated.", minute);
            None
        };

        self.state()
            .history
            .append_turn(batched_input.clone(), utterance.clone());

        if utterance.is_empty() {
            tracing::debug!("Interviewer chose to let the candidate continue.");
        } else {
            tracing::info!("Interviewer: \"{}\"", utterance);
            self.publish(Command::SpeakText(utterance.clone())).await;
        }

        Ok(TickOutcome::Completed {
            batched_input,
            utterance,
            evaluation,
        })
    }

    /// Fires `tick` every `period` until `shutdown` flips or its sender is dropped,
    /// then tears the session down.
    ///
    /// Each tick runs on its own task so a slow batch never holds up the timer;
    /// overlapping ticks are turned away by the in-flight flag instead.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("Batch scheduler started (every {:?}).", period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = scheduler.tick().await {
                            tracing::error!("Batch aborted, input dropped: {:?}", e);
                        }
                    });
                }
                _ = shutdown.changed() => break,
            }
        }
        self.tear_down();
        tracing::info!("Batch scheduler stopped.");
    }

    fn try_begin_batch(&self) -> Option<BatchGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BatchGuard {
                in_flight: &self.in_flight,
            })
    }

    async fn publish(&self, command: Command) {
        if let Err(e) = self.commands.send(command).await {
            tracing::warn!("Runtime is gone, dropping {:?}", e.0);
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
