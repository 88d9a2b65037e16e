// Verdict parsing - turn the debugger's free-text review into a decision

use serde::{Deserialize, Serialize};

/// Marker the debugger emits when the candidate is approved for deployment.
pub const APPROVAL_MARKER: &str = "-11";

/// Marker the debugger emits when the candidate needs fixes.
pub const REJECTION_MARKER: &str = "-00";

const REASON_LABEL: &str = "Reason:";
const PATCH_LABEL: &str = "Patch:";

/// Outcome of one review call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// `-11` appeared somewhere in the review
    Approved,
    /// `-00` appeared (and `-11` did not)
    Rejected {
        /// Text under the `Reason:` label; empty when the label is absent
        reason: String,
        /// Text under the `Patch:` label, or the whole review when neither
        /// label is present
        patch_or_feedback: String,
    },
    /// Neither marker appeared; the whole review is kept as feedback
    Ambiguous { feedback: String },
}

impl Verdict {
    /// Parse raw review text.
    ///
    /// Approval is checked first and short-circuits, so a review containing
    /// both markers is `Approved`.
    pub fn parse(raw_text: &str) -> Self {
        if raw_text.contains(APPROVAL_MARKER) {
            return Verdict::Approved;
        }

        if raw_text.contains(REJECTION_MARKER) {
            return parse_rejection(raw_text);
        }

        Verdict::Ambiguous {
            feedback: raw_text.to_string(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }

    /// Feedback to hand back to the developer, `None` for approvals.
    pub fn feedback(&self) -> Option<String> {
        match self {
            Verdict::Approved => None,
            Verdict::Rejected {
                reason,
                patch_or_feedback,
            } => Some(combine_feedback(reason, patch_or_feedback)),
            Verdict::Ambiguous { feedback } => Some(feedback.clone()),
        }
    }
}

fn parse_rejection(raw_text: &str) -> Verdict {
    let reason_at = raw_text.find(REASON_LABEL);
    let patch_at = match reason_at {
        Some(r) => raw_text[r..].find(PATCH_LABEL).map(|p| r + p),
        None => raw_text.find(PATCH_LABEL),
    };

    match (reason_at, patch_at) {
        (None, None) => Verdict::Rejected {
            reason: String::new(),
            patch_or_feedback: raw_text.to_string(),
        },
        (Some(r), None) => Verdict::Rejected {
            reason: raw_text[r + REASON_LABEL.len()..].trim().to_string(),
            patch_or_feedback: String::new(),
        },
        (None, Some(p)) => Verdict::Rejected {
            reason: String::new(),
            patch_or_feedback: raw_text[p + PATCH_LABEL.len()..].trim().to_string(),
        },
        (Some(r), Some(p)) => Verdict::Rejected {
            reason: raw_text[r + REASON_LABEL.len()..p].trim().to_string(),
            patch_or_feedback: raw_text[p + PATCH_LABEL.len()..].trim().to_string(),
        },
    }
}

fn combine_feedback(reason: &str, patch: &str) -> String {
    match (reason.is_empty(), patch.is_empty()) {
        (true, _) => patch.to_string(),
        (false, true) => format!("{REASON_LABEL}\n{reason}"),
        (false, false) => format!("{REASON_LABEL}\n{reason}\n\n{PATCH_LABEL}\n{patch}"),
    }
}
