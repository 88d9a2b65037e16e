// Task prompts - the user message each role receives per call

/// Developer task wrapping the requirements (or revision context).
pub fn development_task(context: &str) -> String {
    format!(
        "Develop code based on the following requirements:\n\
         {context}\n\
         Your task is to create high-quality, well-structured code that meets these requirements.\n\
         Ensure your code follows best practices and is well-documented.\n"
    )
}

/// Debugger task asking for a review of `candidate`.
pub fn review_task(candidate: &str) -> String {
    format!(
        "Review the following code and identify any issues.\n\
         Test the functionality and provide detailed feedback for improvements.\n\
         If issues are found, clearly explain what needs to be fixed and why.\n\
         \n\
         IMPORTANT: End your response with one of these codes:\n\
         -00 if the code is NOT approved (needs fixes)\n\
         -11 if the code is approved for deployment\n\
         \n\
         Code to review:\n\
         {candidate}"
    )
}

/// Debugger task packaging an approved candidate.
pub fn deployment_task(approved_code: &str) -> String {
    format!(
        "The following code has been approved by the debugger agent. Prepare it for deployment.\n\
         Package the final code and provide it as the output.\n\
         \n\
         Approved code:\n\
         {approved_code}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::verdict::{APPROVAL_MARKER, REJECTION_MARKER};

    #[test]
    fn test_development_task_embeds_context() {
        let task = development_task("build a login form");
        assert!(task.starts_with("Develop code based on the following requirements:\nbuild a login form\n"));
    }

    #[test]
    fn test_review_task_names_both_markers() {
        let task = review_task("<file name=\"index.html\"></file>");
        assert!(task.contains(APPROVAL_MARKER));
        assert!(task.contains(REJECTION_MARKER));
        assert!(task.ends_with("Code to review:\n<file name=\"index.html\"></file>"));
    }

    #[test]
    fn test_deployment_task_embeds_code() {
        let task = deployment_task("CODE");
        assert!(task.contains("Approved code:\nCODE\n"));
    }
}
