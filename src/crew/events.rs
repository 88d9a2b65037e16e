// Progress events and run results streamed to clients

use serde::{Deserialize, Serialize};

/// Progress reported by the `started` event.
pub const PROGRESS_STARTED: u8 = 0;
/// Progress of the first event in iteration 0.
pub const PROGRESS_FIRST_ITERATION: u8 = 10;
/// Progress reported while the approved candidate is packaged.
pub const PROGRESS_DEPLOYING: u8 = 90;
/// Progress of a `completed` event.
pub const PROGRESS_COMPLETE: u8 = 100;
/// Progress of an `error` event, whatever point the run had reached.
pub const PROGRESS_ERROR: u8 = 0;

/// Share of the 0–100 range spread across all iterations.
const ITERATION_BAND: u64 = 80;

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Started,
    Processing,
    Warning,
    Completed,
    Error,
}

impl EventStatus {
    /// `completed` and `error` end the stream
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Error)
    }
}

/// Terminal payload of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum LoopResult {
    /// The debugger approved a candidate and it was packaged
    #[serde(rename = "approved")]
    Approved {
        #[serde(rename = "code")]
        final_code: String,
        #[serde(rename = "deployment")]
        deployment_note: String,
    },
    /// Every iteration was rejected
    #[serde(rename = "max_iterations_reached")]
    BudgetExhausted {
        #[serde(rename = "code")]
        last_code: String,
        #[serde(rename = "feedback")]
        last_feedback: String,
    },
    /// A role call failed or the run was cancelled
    #[serde(rename = "failed")]
    Failed {
        #[serde(rename = "error")]
        error_message: String,
    },
}

impl LoopResult {
    pub fn is_approved(&self) -> bool {
        matches!(self, LoopResult::Approved { .. })
    }
}

/// One ordered unit of run progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: EventStatus,
    pub message: String,
    /// Percent, 0–100
    pub progress: u8,
    /// Only present on terminal events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<LoopResult>,
}

impl ProgressEvent {
    pub fn new(status: EventStatus, message: impl Into<String>, progress: u8) -> Self {
        Self {
            status,
            message: message.into(),
            progress: progress.min(PROGRESS_COMPLETE),
            result: None,
        }
    }

    pub fn started() -> Self {
        Self::new(
            EventStatus::Started,
            "Starting development process...",
            PROGRESS_STARTED,
        )
    }

    pub fn processing(message: impl Into<String>, progress: u8) -> Self {
        Self::new(EventStatus::Processing, message, progress)
    }

    pub fn warning(message: impl Into<String>, progress: u8) -> Self {
        Self::new(EventStatus::Warning, message, progress)
    }

    pub fn completed(message: impl Into<String>, result: LoopResult) -> Self {
        Self::new(EventStatus::Completed, message, PROGRESS_COMPLETE).with_result(result)
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(EventStatus::Error, message.clone(), PROGRESS_ERROR).with_result(
            LoopResult::Failed {
                error_message: message,
            },
        )
    }

    pub fn with_result(mut self, result: LoopResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Frame the event as a server-sent event: `data: <json>\n\n`
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// Sub-phases of one iteration, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IterationStep {
    Start = 0,
    GenerateStart = 1,
    GenerateDone = 2,
    ReviewStart = 3,
    ReviewDone = 4,
    Verdict = 5,
}

const STEPS_PER_ITERATION: u64 = 6;

/// Map an iteration and sub-step to a progress percentage.
///
/// Iterations share the 10–90 band evenly. The result never decreases as
/// `(iteration, step)` increases, and is strictly increasing within an
/// iteration for budgets up to 13.
pub fn iteration_progress(iteration_index: u32, max_iterations: u32, step: IterationStep) -> u8 {
    // u64 keeps u32::MAX budgets from overflowing
    let max_iterations = u64::from(max_iterations.max(1));
    let iteration_index = u64::from(iteration_index).min(max_iterations - 1);
    let slot = iteration_index * STEPS_PER_ITERATION + step as u64;
    let total_slots = max_iterations * STEPS_PER_ITERATION;
    let offset = (ITERATION_BAND * slot) / total_slots;
    PROGRESS_FIRST_ITERATION + offset as u8
}
