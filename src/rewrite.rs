// src/rewrite.rs

//! Interface to the external code-rewriting service.
//!
//! The service itself is not part of this crate. What lives here is the
//! contract around it: the prompt sent for each language, parsing of the
//! `code / ---EXPLANATION--- / text` response, and retry with backoff for
//! a flaky transport.

use anyhow::{Context, Result};
use async_trait::async_trait;
use retry_policies::policies::ExponentialBackoff;
use retry_policies::{Jitter, RetryDecision, RetryPolicy as _};
use std::future::Future;
use std::time::{Duration, SystemTime};

use crate::executor::compiled::declared_public_type;
use crate::protocol::Language;

pub const EXPLANATION_SEPARATOR: &str = "---EXPLANATION---";
pub const MISSING_EXPLANATION: &str = "Explanation not provided.";

/// Anything that turns a prompt into a raw model response.
#[async_trait]
pub trait CodeRewriter: Send + Sync {
    async fn rewrite(&self, prompt: &str) -> Result<String>;
}

/// A parsed rewriting-service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub code: String,
    pub explanation: String,
}

/// Build the instruction prompt for `code` in `language`.
pub fn rewrite_prompt(language: Language, code: &str) -> String {
    let (label, requirements) = match language {
        Language::Java => {
            let main_class = declared_public_type(code).unwrap_or("Main");
            (
                "Java",
                vec![
                    format!("Include main class '{}'", main_class),
                    "Add imports and fix syntax".to_string(),
                ],
            )
        }
        Language::Arduino => (
            "Arduino",
            vec![
                "Ensure setup() and loop() are present".to_string(),
                "Add comments and fix any syntax issues".to_string(),
            ],
        ),
        Language::Python => (
            "Python",
            vec![
                "Correct syntax or logical errors.".to_string(),
                "Do not convert string to int unless necessary.".to_string(),
                "Preserve operations like str * int.".to_string(),
            ],
        ),
        other => (
            display_name(other),
            vec![
                "Correct syntax or logical errors.".to_string(),
                "Keep the program's behavior otherwise unchanged.".to_string(),
            ],
        ),
    };

    let mut prompt = format!("Fix this {} code:\n{}\nRequirements:\n", label, code);
    for (i, req) in requirements.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, req));
    }
    prompt.push_str("Format:\n<corrected_code>\n");
    prompt.push_str(EXPLANATION_SEPARATOR);
    prompt.push_str("\n<explanation>");
    prompt
}

fn display_name(language: Language) -> &'static str {
    match language {
        Language::Python => "Python",
        Language::JavaScript => "JavaScript",
        Language::Ruby => "Ruby",
        Language::Bash => "Bash",
        Language::Java => "Java",
        Language::C => "C",
        Language::Cpp => "C++",
        Language::Rust => "Rust",
        Language::Arduino => "Arduino",
        Language::Sql => "SQL",
        Language::Html => "HTML",
        Language::Css => "CSS",
        Language::Xml => "XML",
    }
}

/// Split a raw response into corrected code and explanation.
pub fn parse_response(text: &str) -> Rewrite {
    let text = text.trim();
    match text.split_once(EXPLANATION_SEPARATOR) {
        Some((code, explanation)) => Rewrite {
            code: code.trim().to_string(),
            explanation: explanation.trim().to_string(),
        },
        None => Rewrite {
            code: text.to_string(),
            explanation: MISSING_EXPLANATION.to_string(),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Exponential schedule without jitter: `base_delay * multiplier^n`,
    /// at most `max_attempts - 1` retries.
    pub fn backoff(&self) -> ExponentialBackoff {
        let retries = self.max_attempts.max(1) - 1;
        let multiplier = self.multiplier.max(1);
        let ceiling = self
            .base_delay
            .saturating_mul(multiplier.saturating_pow(retries));

        ExponentialBackoff::builder()
            .jitter(Jitter::None)
            .base(multiplier)
            .retry_bounds(self.base_delay, ceiling)
            .build_with_max_retries(retries)
    }

    /// Wait before the next attempt after `past_retries` retries, or `None`
    /// once the attempts are used up.
    pub fn delay_for(&self, past_retries: u32) -> Option<Duration> {
        next_delay(&self.backoff(), SystemTime::now(), past_retries)
    }
}

fn next_delay(
    backoff: &ExponentialBackoff,
    started: SystemTime,
    past_retries: u32,
) -> Option<Duration> {
    match backoff.should_retry(started, past_retries) {
        RetryDecision::Retry { execute_after } => Some(
            execute_after
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        ),
        RetryDecision::DoNotRetry => None,
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is used up.
///
/// The last error is returned with the attempt count attached.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let backoff = policy.backoff();
    let started = SystemTime::now();
    let mut past_retries = 0;

    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match next_delay(&backoff, started, past_retries) {
                Some(delay) => {
                    tracing::warn!(attempt = past_retries + 1, delay = ?delay, error = %e, "rewrite attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    past_retries += 1;
                }
                None => {
                    return Err(e)
                        .with_context(|| format!("gave up after {} attempts", past_retries + 1));
                }
            },
        }
    }
}

/// Ask `rewriter` to fix `code`, retrying transport failures.
pub async fn rewrite_with_retry(
    rewriter: &dyn CodeRewriter,
    language: Language,
    code: &str,
    policy: &RetryPolicy,
) -> Result<Rewrite> {
    let prompt = rewrite_prompt(language, code);
    let raw = retry(policy, || rewriter.rewrite(&prompt)).await?;
    Ok(parse_response(&raw))
}
