// Iteration context - the per-run state threaded through the development loop

/// Mutable state owned by a single run.
///
/// Only the latest candidate and the latest feedback are kept; the next
/// generation prompt is derived from those and the original requirements,
/// never from the full history.
#[derive(Debug, Clone)]
pub struct IterationContext {
    original_requirements: String,
    max_iterations: u32,
    /// Last code produced by the developer
    pub current_candidate: Option<String>,
    /// Most recent rejection feedback, `None` on the first iteration
    pub last_feedback: Option<String>,
    /// 0-based; always `< max_iterations` while the run is live
    pub iteration_index: u32,
}

impl IterationContext {
    /// Create a context for a new run. `max_iterations` is raised to 1 if 0.
    pub fn new(requirements: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            original_requirements: requirements.into(),
            max_iterations: max_iterations.max(1),
            current_candidate: None,
            last_feedback: None,
            iteration_index: 0,
        }
    }

    pub fn requirements(&self) -> &str {
        &self.original_requirements
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// 1-based iteration number for display
    pub fn iteration_number(&self) -> u32 {
        self.iteration_index + 1
    }

    /// The context handed to the developer for the current iteration.
    ///
    /// Iteration 0 gets the requirements verbatim. Later iterations get the
    /// requirements, the previous candidate and the previous feedback.
    pub fn generation_prompt(&self) -> String {
        match (
            self.iteration_index,
            &self.current_candidate,
            &self.last_feedback,
        ) {
            (0, _, _) => self.original_requirements.clone(),
            (_, Some(candidate), Some(feedback)) => {
                compose_revision_prompt(&self.original_requirements, candidate, feedback)
            }
            _ => self.original_requirements.clone(),
        }
    }

    pub fn record_candidate(&mut self, code: String) {
        self.current_candidate = Some(code);
    }

    pub fn record_feedback(&mut self, feedback: String) {
        self.last_feedback = Some(feedback);
    }

    /// Move to the next iteration. Returns `false` (and leaves the index
    /// unchanged) when the budget is spent.
    pub fn advance(&mut self) -> bool {
        if self.iteration_index + 1 >= self.max_iterations {
            return false;
        }
        self.iteration_index += 1;
        true
    }
}

/// Build the revision prompt from the original requirements, the previous
/// candidate and the debugger's feedback, in that order and verbatim.
pub fn compose_revision_prompt(requirements: &str, candidate: &str, feedback: &str) -> String {
    format!(
        "\nOriginal requirements:\n{requirements}\n\n\
         Current code generated:\n{candidate}\n\n\
         Debugger feedback:\n{feedback}\n\n\
         Please fix the code based on the feedback above.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_iteration_uses_requirements_verbatim() {
        let ctx = IterationContext::new("build a login form", 3);
        assert_eq!(ctx.generation_prompt(), "build a login form");
        assert_eq!(ctx.iteration_number(), 1);
    }

    #[test]
    fn test_revision_prompt_order() {
        let prompt = compose_revision_prompt("REQ", "CODE", "FEEDBACK");
        let req = prompt.find("REQ").unwrap();
        let code = prompt.find("CODE").unwrap();
        let fb = prompt.find("FEEDBACK").unwrap();
        assert!(req < code && code < fb);
        assert!(prompt.contains("Original requirements:\nREQ\n"));
        assert!(prompt.contains("Current code generated:\nCODE\n"));
        assert!(prompt.contains("Debugger feedback:\nFEEDBACK\n"));
        assert!(prompt.trim_end().ends_with("Please fix the code based on the feedback above."));
    }

    #[test]
    fn test_revision_prompt_is_deterministic() {
        let a = compose_revision_prompt("r", "<file name=\"index.html\">x</file>", "Reason:\ny");
        let b = compose_revision_prompt("r", "<file name=\"index.html\">x</file>", "Reason:\ny");
        assert_eq!(a, b);
    }

    #[test]
    fn test_second_iteration_uses_latest_state_only() {
        let mut ctx = IterationContext::new("reqs", 3);
        ctx.record_candidate("v1".to_string());
        ctx.record_feedback("fix one".to_string());
        assert!(ctx.advance());

        ctx.record_candidate("v2".to_string());
        ctx.record_feedback("fix two".to_string());
        assert!(ctx.advance());

        let prompt = ctx.generation_prompt();
        assert_eq!(prompt, compose_revision_prompt("reqs", "v2", "fix two"));
        assert!(!prompt.contains("v1"));
        assert!(!prompt.contains("fix one"));
    }

    #[test]
    fn test_advance_respects_budget() {
        let mut ctx = IterationContext::new("reqs", 2);
        assert!(ctx.advance());
        assert_eq!(ctx.iteration_index, 1);
        assert!(!ctx.advance());
        assert_eq!(ctx.iteration_index, 1);
    }

    #[test]
    fn test_zero_budget_is_raised_to_one() {
        let mut ctx = IterationContext::new("reqs", 0);
        assert_eq!(ctx.max_iterations(), 1);
        assert!(!ctx.advance());
    }
}
