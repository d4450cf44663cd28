// src/executor/python.rs

//! Python: runtime inputs are baked into the source before it runs.
//!
//! Each `input(...)` call site is replaced, in source order, by a string
//! literal holding the matching runtime input. The rewritten source then
//! runs through the ordinary interpreter protocol in its own process.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::{ExecutionRequest, Executor, InterpretedExecutor};
use crate::outcome::ExecutionOutcome;
use crate::protocol::LanguageProtocol;

const DEFAULT_PROMPT: &str = "Enter value";

fn input_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\binput\s*\((.*?)\)").expect("input pattern is valid"))
}

/// Whether the code asks for runtime input at all.
pub fn requires_input(code: &str) -> bool {
    input_call_pattern().is_match(code)
}

/// Prompt text of every input call site, in source order.
///
/// Lets a caller ask the user for exactly as many values as the code
/// reads. Sites without a literal prompt get a generic one.
pub fn input_prompts(code: &str) -> Vec<String> {
    input_call_pattern()
        .captures_iter(code)
        .map(|c| {
            let prompt = c
                .get(1)
                .map(|m| m.as_str().trim().trim_matches(|ch| ch == '"' || ch == '\''))
                .unwrap_or("");
            if prompt.is_empty() {
                DEFAULT_PROMPT.to_string()
            } else {
                prompt.to_string()
            }
        })
        .collect()
}

/// Replace input call sites with literals from `inputs`.
///
/// A non-empty `inputs` shorter than the number of call sites is rejected.
/// An empty `inputs` fills every site with an empty string.
pub fn substitute_inputs(code: &str, inputs: &[String]) -> Result<String, ExecutionOutcome> {
    let sites = input_call_pattern().find_iter(code).count();

    if !inputs.is_empty() && inputs.len() < sites {
        return Err(ExecutionOutcome::internal(format!(
            "Not enough test inputs (expected {})",
            sites
        )));
    }

    let mut index = 0;
    let substituted = input_call_pattern().replace_all(code, |_: &regex::Captures<'_>| {
        let value = inputs.get(index).map(String::as_str).unwrap_or("");
        index += 1;
        python_literal(value)
    });

    Ok(substituted.into_owned())
}

/// Python string literal for `value`, quoted the way `repr` would.
pub fn python_literal(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[derive(Debug, Clone)]
pub struct PythonExecutor {
    inner: InterpretedExecutor,
}

impl PythonExecutor {
    pub fn new(inner: InterpretedExecutor) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Executor for PythonExecutor {
    fn protocol(&self) -> &LanguageProtocol {
        self.inner.protocol()
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let source = match substitute_inputs(&request.source, &request.inputs) {
            Ok(s) => s,
            Err(rejected) => {
                tracing::info!("rejected before execution: not enough inputs");
                return rejected;
            }
        };

        self.inner.run_source(&source).await
    }
}
