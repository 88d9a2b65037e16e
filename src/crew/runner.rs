// Development loop - alternates developer and debugger calls until the
// candidate is approved or the iteration budget runs out.
//
// One run owns one IterationContext. Progress is pushed into a bounded mpsc
// channel; a closed receiver is treated as a client disconnect and ends the
// run before the next role call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::context::IterationContext;
use super::events::{
    iteration_progress, IterationStep, LoopResult, ProgressEvent, PROGRESS_DEPLOYING,
};
use super::verdict::Verdict;
use crate::config::{Config, LoopSettings};
use crate::providers::{LlmProvider, RoleCallError};
use crate::roles::tasks::{deployment_task, development_task, review_task};
use crate::roles::{AgentRole, Role, RoleProfile};

/// Buffered events per run before the loop waits on the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 32;

const CANCELLED_MESSAGE: &str = "Development process cancelled";

/// Coordinator settings
#[derive(Debug, Clone, Default)]
pub struct LoopConfig {
    /// Upper bound on a single role call; `None` waits indefinitely
    pub role_timeout: Option<Duration>,
}

impl LoopConfig {
    pub fn from_settings(settings: &LoopSettings) -> Self {
        Self {
            role_timeout: (settings.role_timeout_secs > 0)
                .then(|| Duration::from_secs(settings.role_timeout_secs)),
        }
    }
}

/// Why a run stopped before reaching a normal outcome.
#[derive(Debug)]
enum Stop {
    Role(RoleCallError),
    Cancelled,
    Disconnected,
}

/// The developer/debugger loop.
///
/// Runs share nothing but the two role handles, so one `DevelopmentLoop`
/// behind an `Arc` serves any number of concurrent runs.
pub struct DevelopmentLoop {
    developer: Arc<dyn Role>,
    debugger: Arc<dyn Role>,
    config: LoopConfig,
}

impl DevelopmentLoop {
    pub fn new(developer: Arc<dyn Role>, debugger: Arc<dyn Role>) -> Self {
        Self {
            developer,
            debugger,
            config: LoopConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Build both roles on a shared provider from the loaded config.
    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &Config) -> Self {
        let developer = AgentRole::new(
            Arc::clone(&provider),
            RoleProfile::developer(&config.developer),
        );
        let debugger = AgentRole::new(provider, RoleProfile::debugger(&config.debugger));

        Self::new(Arc::new(developer), Arc::new(debugger))
            .with_config(LoopConfig::from_settings(&config.run_loop))
    }

    /// Start a run on a background task and return its event stream.
    ///
    /// Dropping the receiver stops the run at its next event.
    pub fn spawn(
        self: &Arc<Self>,
        requirements: String,
        max_iterations: u32,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let this = Arc::clone(self);

        let handle = tokio::spawn(async move {
            this.run(&requirements, max_iterations, &tx, &cancel).await;
        });

        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!("Development run panicked: {:?}", e);
            }
        });

        rx
    }

    /// Drive one run to completion, sending every event to `events`.
    ///
    /// Exactly one terminal event (`completed` or `error`) is sent unless the
    /// receiver has gone away. A budget of 0 is treated as 1.
    pub async fn run(
        &self,
        requirements: &str,
        max_iterations: u32,
        events: &mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> LoopResult {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);

        async {
            info!(
                max_iterations,
                requirements_chars = requirements.len(),
                "Development run started"
            );

            let result = match self.drive(requirements, max_iterations, events, cancel).await {
                Ok(result) => result,
                Err(stop) => self.fail(stop, events).await,
            };

            match &result {
                LoopResult::Approved { .. } => info!("Development run approved"),
                LoopResult::BudgetExhausted { .. } => {
                    info!("Development run ended without approval")
                }
                LoopResult::Failed { error_message } => {
                    info!(error = %error_message, "Development run failed")
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        requirements: &str,
        max_iterations: u32,
        events: &mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<LoopResult, Stop> {
        let mut ctx = IterationContext::new(requirements, max_iterations);
        let max = ctx.max_iterations();

        emit(events, ProgressEvent::started()).await?;

        loop {
            let index = ctx.iteration_index;
            let n = ctx.iteration_number();
            let at = |step| iteration_progress(index, max, step);

            emit(
                events,
                ProgressEvent::processing(
                    format!("Starting iteration {n} of {max}"),
                    at(IterationStep::Start),
                ),
            )
            .await?;

            emit(
                events,
                ProgressEvent::processing(
                    format!("Developer agent generating code (iteration {n})"),
                    at(IterationStep::GenerateStart),
                ),
            )
            .await?;
            let task = development_task(&ctx.generation_prompt());
            let candidate = self.call(self.developer.as_ref(), &task, cancel).await?;
            ctx.record_candidate(candidate.clone());
            emit(
                events,
                ProgressEvent::processing(
                    format!("Developer completed code generation (iteration {n})"),
                    at(IterationStep::GenerateDone),
                ),
            )
            .await?;

            emit(
                events,
                ProgressEvent::processing(
                    format!("Debugger agent reviewing code (iteration {n})"),
                    at(IterationStep::ReviewStart),
                ),
            )
            .await?;
            let review = self
                .call(self.debugger.as_ref(), &review_task(&candidate), cancel)
                .await?;
            emit(
                events,
                ProgressEvent::processing(
                    format!("Debugger completed review (iteration {n})"),
                    at(IterationStep::ReviewDone),
                ),
            )
            .await?;

            let verdict = Verdict::parse(&review);
            match &verdict {
                Verdict::Approved => {
                    emit(
                        events,
                        ProgressEvent::processing(
                            format!("Code approved by debugger (iteration {n})"),
                            at(IterationStep::Verdict),
                        ),
                    )
                    .await?;
                    return self.deploy(candidate, events, cancel).await;
                }
                Verdict::Rejected { .. } => {
                    debug!(iteration = n, "Candidate rejected");
                    ctx.record_feedback(verdict.feedback().unwrap_or_default());
                    emit(
                        events,
                        ProgressEvent::processing(
                            format!("Code not approved, sending back to developer (iteration {n})"),
                            at(IterationStep::Verdict),
                        ),
                    )
                    .await?;
                }
                Verdict::Ambiguous { feedback } => {
                    warn!(
                        iteration = n,
                        review_chars = feedback.len(),
                        "Review contained no verdict marker; treating as rejection"
                    );
                    ctx.record_feedback(feedback.clone());
                    emit(
                        events,
                        ProgressEvent::warning(
                            format!(
                                "Neither approval nor rejection code found, treating as rejection (iteration {n})"
                            ),
                            at(IterationStep::Verdict),
                        ),
                    )
                    .await?;
                }
            }

            if !ctx.advance() {
                break;
            }
        }

        let result = LoopResult::BudgetExhausted {
            last_code: ctx.current_candidate.unwrap_or_default(),
            last_feedback: ctx.last_feedback.unwrap_or_default(),
        };
        emit_terminal(
            events,
            ProgressEvent::completed("Max iterations reached without approval", result.clone()),
        )
        .await;
        Ok(result)
    }

    /// Package an approved candidate with one more debugger call.
    async fn deploy(
        &self,
        candidate: String,
        events: &mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<LoopResult, Stop> {
        emit(
            events,
            ProgressEvent::processing("Deploying approved code", PROGRESS_DEPLOYING),
        )
        .await?;
        let deployment = self
            .call(self.debugger.as_ref(), &deployment_task(&candidate), cancel)
            .await?;

        let result = LoopResult::Approved {
            final_code: candidate,
            deployment_note: deployment,
        };
        emit_terminal(
            events,
            ProgressEvent::completed("Process completed successfully", result.clone()),
        )
        .await;
        Ok(result)
    }

    /// One role call, bounded by the configured timeout and the cancel token.
    async fn call(
        &self,
        role: &dyn Role,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, Stop> {
        debug!(role = role.name(), prompt_chars = prompt.len(), "Role call");

        let call = async {
            match self.config.role_timeout {
                Some(limit) => tokio::time::timeout(limit, role.complete(prompt))
                    .await
                    .unwrap_or(Err(RoleCallError::Timeout(limit))),
                None => role.complete(prompt).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Stop::Cancelled),
            outcome = call => outcome.map_err(|e| {
                error!(role = role.name(), error = %e, "Role call failed");
                Stop::Role(e)
            }),
        }
    }

    /// Turn an early stop into the run's terminal event and result.
    async fn fail(&self, stop: Stop, events: &mpsc::Sender<ProgressEvent>) -> LoopResult {
        let message = match stop {
            Stop::Role(e) => format!("Error occurred during development process: {e}"),
            Stop::Cancelled => CANCELLED_MESSAGE.to_string(),
            Stop::Disconnected => {
                debug!("Event receiver closed; stopping run");
                return LoopResult::Failed {
                    error_message: "Event receiver closed".to_string(),
                };
            }
        };

        emit_terminal(events, ProgressEvent::error(message.clone())).await;
        LoopResult::Failed {
            error_message: message,
        }
    }
}

async fn emit(events: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) -> Result<(), Stop> {
    events.send(event).await.map_err(|_| Stop::Disconnected)
}

async fn emit_terminal(events: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
    if events.send(event).await.is_err() {
        debug!("Event receiver closed before the terminal event");
    }
}
