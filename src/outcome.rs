// src/outcome.rs

//! The closed set of terminal results an execution attempt can produce.
//!
//! Every executor returns exactly one `ExecutionOutcome`. Nothing below the
//! dispatcher is allowed to surface a raw OS or process error; it is mapped
//! into one of these variants first.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Marker prefixed to successful summaries.
pub const SUCCESS_MARKER: &str = "\u{2705}";

/// Marker prefixed to every failure summary.
pub const FAILURE_MARKER: &str = "\u{274c}";

/// Which blocking stage of a protocol hit its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success { output: String },
    CompileFailure { diagnostic: String },
    RuntimeFailure { diagnostic: String },
    Timeout {
        stage: Stage,
        #[serde(rename = "limit_ms", serialize_with = "serialize_millis")]
        limit: Duration,
    },
    ToolUnavailable { tool: String },
    InternalError { message: String },
}

fn serialize_millis<S>(limit: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))
}

impl ExecutionOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self::Success {
            output: output.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    pub fn tool_unavailable(tool: impl Into<String>) -> Self {
        Self::ToolUnavailable { tool: tool.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Short machine-friendly name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::CompileFailure { .. } => "compile_failure",
            Self::RuntimeFailure { .. } => "runtime_failure",
            Self::Timeout { .. } => "timeout",
            Self::ToolUnavailable { .. } => "tool_unavailable",
            Self::InternalError { .. } => "internal_error",
        }
    }

    /// Render the outcome as the single user-facing block the caller shows.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { output } => write!(f, "{} {}", SUCCESS_MARKER, output),
            Self::CompileFailure { diagnostic } => {
                write!(f, "{} Compilation Error:\n{}", FAILURE_MARKER, diagnostic)
            }
            Self::RuntimeFailure { diagnostic } => {
                write!(f, "{} Runtime Error:\n{}", FAILURE_MARKER, diagnostic)
            }
            Self::Timeout { stage, limit } => {
                let what = match stage {
                    Stage::Compile => "Compilation",
                    Stage::Run => "Execution",
                };
                write!(
                    f,
                    "{} {} timed out after {}.",
                    FAILURE_MARKER,
                    what,
                    format_limit(*limit)
                )
            }
            Self::ToolUnavailable { tool } => write!(
                f,
                "{} Toolchain unavailable: `{}` was not found on PATH.",
                FAILURE_MARKER, tool
            ),
            Self::InternalError { message } => write!(f, "{} {}", FAILURE_MARKER, message),
        }
    }
}

fn format_limit(limit: Duration) -> String {
    if limit.subsec_millis() == 0 && limit.as_secs() > 0 {
        format!("{}s", limit.as_secs())
    } else {
        format!("{}ms", limit.as_millis())
    }
}
