//! Prompt construction for each phase of the solve loop.
//!
//! Kept in one place so the orchestrator reads as control flow and the prompt
//! text stays reviewable.

use crate::solve::Question;

/// System role used on every reasoning call.
pub const SYSTEM_ROLE: &str =
    "You are an intelligent agent designed to solve complex examination-style questions.";

/// Classification: task type plus key parameters, with the fact-based marker
/// the shortcut dispatch looks for.
pub fn classify(question: &Question) -> String {
    format!(
        "Identify the task type and extract key parameters from the following question: {}. \
         If the question is fact-based (e.g., 'What is the capital of the United Kingdom?'), \
         respond with 'fact-based' and the key parameters. Otherwise, respond with 'other'.",
        question.text
    )
}

/// Direct answer request for the fact-seeking shortcut.
pub fn direct_answer(question: &Question) -> String {
    format!("Answer the following question: {}", question.text)
}

/// Planning: break the task into logical steps.
pub fn plan(task_description: &str, question: &Question) -> String {
    format!(
        "Plan a solution for the following task: {}. Files: {:?}. Constraints: {}. \
         The solution should include steps for data extraction, analysis, code generation, \
         or any other necessary actions.",
        task_description,
        question.files,
        question.constraints.as_deref().unwrap_or("none"),
    )
}

/// Code generation from the current plan. The `result` binding convention and
/// the attached-file access path are part of the sandbox contract.
pub fn generate(plan: &str) -> String {
    format!(
        "Generate Python code that follows these requirements:\n\
         1. Strict PEP8 compliance\n\
         2. Proper indentation (4 spaces)\n\
         3. Includes necessary imports\n\
         4. Reads attached files from the provided `files` list\n\
         5. Includes error handling\n\
         6. Returns results in a 'result' variable\n\n\
         Problem: {}\n\n\
         Format your response as:\n```python\n# Your code here\n```",
        plan
    )
}

/// Plan adaptation after a logical failure.
pub fn adapt(plan: &str, error_message: &str) -> String {
    format!(
        "Adapt the following solution plan based on the error encountered: {}. Error: {}",
        plan, error_message
    )
}

/// Diagnostic notes for a failed execution.
pub fn debug(code: &str, error_message: &str) -> String {
    format!("Debug the following code: {}. Error: {}", code, error_message)
}
