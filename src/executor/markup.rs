// src/executor/markup.rs

use async_trait::async_trait;

use super::{ExecutionRequest, Executor};
use crate::outcome::ExecutionOutcome;
use crate::protocol::LanguageProtocol;

/// Markup and declarative-UI languages have nothing to run on their own.
#[derive(Debug, Clone)]
pub struct ValidateOnlyExecutor {
    protocol: LanguageProtocol,
}

impl ValidateOnlyExecutor {
    pub fn new(protocol: LanguageProtocol) -> Self {
        Self { protocol }
    }

    pub fn advisory(&self) -> String {
        format!(
            "{} has no standalone runtime and needs a hosting environment (such as a browser) to run. The corrected code is the deliverable.",
            self.protocol.language.name().to_uppercase()
        )
    }
}

#[async_trait]
impl Executor for ValidateOnlyExecutor {
    fn protocol(&self) -> &LanguageProtocol {
        &self.protocol
    }

    async fn execute(&self, _request: &ExecutionRequest) -> ExecutionOutcome {
        ExecutionOutcome::success(self.advisory())
    }
}
