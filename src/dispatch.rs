// src/dispatch.rs

//! The caller-facing entry point.
//!
//! `Dispatcher::execute` normalizes the code, picks the executor for the
//! language tag, runs it on its own task and renders the outcome as a
//! single marked block of text. It never fails: anything that escapes an
//! executor, panics included, becomes an `InternalError` summary.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::Config;
use crate::execution_id::ExecutionId;
use crate::executor::ExecutionRequest;
use crate::outcome::ExecutionOutcome;
use crate::preprocess::normalize;
use crate::registry::Registry;

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Self {
        Self::from_registry(Registry::from_config(config))
    }

    pub fn from_registry(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run `code` as `language` and return the rendered summary.
    pub async fn execute(
        &self,
        language: &str,
        code: &str,
        runtime_inputs: &[String],
        entry_point_hint: &str,
    ) -> String {
        self.run(language, code, runtime_inputs, entry_point_hint)
            .await
            .summary()
    }

    /// Same as `execute`, but returns the structured outcome.
    pub async fn run(
        &self,
        language: &str,
        code: &str,
        runtime_inputs: &[String],
        entry_point_hint: &str,
    ) -> ExecutionOutcome {
        let lang = self.registry.resolve(language);
        let request = ExecutionRequest::new(lang, normalize(code))
            .with_inputs(runtime_inputs.to_vec())
            .with_entry_point(entry_point_hint);

        self.dispatch(request).await
    }

    /// Run an already-built request. The source is normalized again, which
    /// is a no-op for text that came through `run`.
    pub async fn dispatch(&self, mut request: ExecutionRequest) -> ExecutionOutcome {
        request.source = normalize(&request.source);

        let Some(executor) = self.registry.get(request.language) else {
            return ExecutionOutcome::internal(format!(
                "Execution failed: no executor registered for {}",
                request.language
            ));
        };

        let execution_id = ExecutionId::new();
        let span = tracing::info_span!(
            "execution",
            id = %execution_id,
            language = %request.language,
        );

        let task = tokio::spawn(
            async move {
                tracing::info!("execution started");
                let outcome = executor.execute(&request).await;
                tracing::info!(kind = outcome.kind(), "execution finished");
                outcome
            }
            .instrument(span),
        );

        match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                let reason = panic_message(e.into_panic());
                tracing::error!(id = %execution_id, reason = %reason, "executor panicked");
                ExecutionOutcome::internal(format!("Execution failed: {}", reason))
            }
            Err(e) => {
                tracing::error!(id = %execution_id, error = %e, "executor task did not complete");
                ExecutionOutcome::internal(format!("Execution failed: {}", e))
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "executor panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LanguageOverride;
    use crate::executor::Executor;
    use crate::outcome::{FAILURE_MARKER, SUCCESS_MARKER};
    use crate::protocol::{CommandTemplate, Language, LanguageProtocol};
    use async_trait::async_trait;

    struct Exploding(LanguageProtocol);

    #[async_trait]
    impl Executor for Exploding {
        fn protocol(&self) -> &LanguageProtocol {
            &self.0
        }

        async fn execute(&self, _request: &ExecutionRequest) -> ExecutionOutcome {
            panic!("compiler wrapper blew up");
        }
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7_u8)), "executor panicked");
    }

    #[tokio::test]
    async fn panicking_executor_becomes_internal_error() {
        let mut registry = Registry::from_config(&Config::default());
        registry.register(Arc::new(Exploding(LanguageProtocol::builtin(Language::Java))));
        let dispatcher = Dispatcher::from_registry(registry);

        let outcome = dispatcher.run("java", "class A {}", &[], "").await;
        assert_eq!(
            outcome,
            ExecutionOutcome::internal("Execution failed: compiler wrapper blew up")
        );

        // Other languages are unaffected.
        let summary = dispatcher.execute("html", "<p>", &[], "").await;
        assert!(summary.starts_with(SUCCESS_MARKER));
    }

    #[tokio::test]
    async fn normalizes_before_dispatch() {
        let cfg = Config::default().with_override(
            Language::Bash,
            LanguageOverride {
                run: Some(CommandTemplate::new(["cat", "{source}"])),
                ..Default::default()
            },
        );
        let dispatcher = Dispatcher::new(&cfg);

        let summary = dispatcher
            .execute("sh", "```bash\n\techo hi\u{200b}\n...\n```", &[], "")
            .await;
        assert_eq!(summary, format!("{} echo hi", SUCCESS_MARKER));
    }

    #[tokio::test]
    async fn validate_only_languages_need_no_tools() {
        let dispatcher = Dispatcher::new(&Config::default());
        let summary = dispatcher.execute("css", "body { color: red }", &[], "").await;
        assert!(summary.starts_with(SUCCESS_MARKER));
        assert!(summary.contains("CSS"));
    }

    #[tokio::test]
    async fn missing_toolchain_is_reported_not_raised() {
        let cfg = Config::default().with_override(
            Language::Java,
            LanguageOverride {
                compile: Some(CommandTemplate::new(["debugrun-no-javac", "{source}"])),
                ..Default::default()
            },
        );
        let dispatcher = Dispatcher::new(&cfg);

        let summary = dispatcher.execute("java", "", &[], "Main").await;
        assert!(summary.starts_with(FAILURE_MARKER));
        assert!(summary.contains("`debugrun-no-javac`"));
    }
}
