//! Language executors.
//!
//! One executor per language, each driving one protocol: compile+run,
//! compile only, interpreted, batch, or validate-only. Executors never
//! fail with an error; every path ends in an `ExecutionOutcome`.

use async_trait::async_trait;

use crate::outcome::{ExecutionOutcome, Stage};
use crate::process::{ProcessOutput, RunFailure};
use crate::protocol::{Language, LanguageProtocol};

pub mod compiled;
pub mod interpreted;
pub mod markup;
pub mod python;
pub mod sql;

pub use compiled::CompiledExecutor;
pub use interpreted::InterpretedExecutor;
pub use markup::ValidateOnlyExecutor;
pub use python::PythonExecutor;
pub use sql::BatchExecutor;

/// One execution attempt. Immutable once dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub language: Language,
    /// Already normalized source text.
    pub source: String,
    /// Values for runtime input call sites, in source order.
    pub inputs: Vec<String>,
    /// Entry-point name for languages that need one.
    pub entry_point: Option<String>,
}

impl ExecutionRequest {
    pub fn new(language: Language, source: impl Into<String>) -> Self {
        Self {
            language,
            source: source.into(),
            inputs: Vec::new(),
            entry_point: None,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<String>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_entry_point(mut self, entry: impl Into<String>) -> Self {
        let entry = entry.into();
        self.entry_point = if entry.trim().is_empty() {
            None
        } else {
            Some(entry.trim().to_string())
        };
        self
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    fn protocol(&self) -> &LanguageProtocol;

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome;
}

/// Map a process-level failure of `stage` into an outcome.
pub(crate) fn failure_outcome(
    failure: RunFailure,
    stage: Stage,
    protocol: &LanguageProtocol,
) -> ExecutionOutcome {
    match failure {
        RunFailure::Timeout => ExecutionOutcome::Timeout {
            stage,
            limit: match stage {
                Stage::Compile => protocol.compile_timeout,
                Stage::Run => protocol.run_timeout,
            },
        },
        RunFailure::ToolUnavailable(tool) => ExecutionOutcome::tool_unavailable(tool),
        RunFailure::Io(e) => ExecutionOutcome::internal(format!("Execution error: {}", e)),
    }
}

/// Classify a finished run-stage process.
pub(crate) fn run_outcome(output: ProcessOutput, empty_output: &str) -> ExecutionOutcome {
    if !output.success() {
        return ExecutionOutcome::RuntimeFailure {
            diagnostic: diagnostic(&output),
        };
    }

    let stdout = output.stdout.trim();
    if stdout.is_empty() {
        ExecutionOutcome::success(empty_output)
    } else {
        ExecutionOutcome::success(stdout)
    }
}

/// The text shown for a failed process: stderr verbatim when present.
pub(crate) fn diagnostic(output: &ProcessOutput) -> String {
    if !output.stderr.trim().is_empty() {
        return output.stderr.clone();
    }
    if !output.stdout.trim().is_empty() {
        return output.stdout.clone();
    }
    match output.exit_code {
        Some(code) => format!("Process exited with code {}", code),
        None => "Process was terminated by a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn output(code: Option<i32>, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn zero_exit_with_output_is_trimmed_success() {
        let o = run_outcome(output(Some(0), "  42\n", ""), "none");
        assert_eq!(o, ExecutionOutcome::success("42"));
    }

    #[test]
    fn zero_exit_without_output_uses_marker_message() {
        let o = run_outcome(output(Some(0), "\n", "warning"), "Ran successfully, no output.");
        assert_eq!(o, ExecutionOutcome::success("Ran successfully, no output."));
    }

    #[test]
    fn non_zero_exit_is_runtime_failure_with_stderr() {
        let o = run_outcome(output(Some(1), "partial", "Traceback\n"), "");
        assert_eq!(
            o,
            ExecutionOutcome::RuntimeFailure {
                diagnostic: "Traceback\n".into()
            }
        );
    }

    #[test]
    fn signal_death_without_stderr_still_explains() {
        let o = run_outcome(output(None, "", ""), "");
        assert_eq!(
            o,
            ExecutionOutcome::RuntimeFailure {
                diagnostic: "Process was terminated by a signal".into()
            }
        );
    }

    #[test]
    fn blank_entry_point_is_ignored() {
        let r = ExecutionRequest::new(Language::Java, "").with_entry_point("  ");
        assert_eq!(r.entry_point, None);
        let r = ExecutionRequest::new(Language::Java, "").with_entry_point(" App ");
        assert_eq!(r.entry_point.as_deref(), Some("App"));
    }
}
