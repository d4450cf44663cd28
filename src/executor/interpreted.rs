// src/executor/interpreted.rs

//! Run-only protocol: write the source to a single temp file and hand it to
//! an interpreter. The temp file is removed on every path, including a
//! missing interpreter.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{failure_outcome, run_outcome, ExecutionRequest, Executor};
use crate::outcome::{ExecutionOutcome, Stage};
use crate::process;
use crate::protocol::{LanguageProtocol, TemplateVars};

#[derive(Debug, Clone)]
pub struct InterpretedExecutor {
    protocol: LanguageProtocol,
    temp_root: Option<PathBuf>,
}

impl InterpretedExecutor {
    pub fn new(protocol: LanguageProtocol, temp_root: Option<PathBuf>) -> Self {
        Self {
            protocol,
            temp_root,
        }
    }

    /// Run `source` through the interpreter under the run deadline.
    pub async fn run_source(&self, source: &str) -> ExecutionOutcome {
        let protocol = &self.protocol;

        let Some(run) = &protocol.run else {
            return ExecutionOutcome::internal(format!(
                "No run command configured for {}",
                protocol.language
            ));
        };

        let file = match self.write_temp(source) {
            Ok(f) => f,
            Err(e) => {
                return ExecutionOutcome::internal(format!(
                    "Execution error: failed to write source file: {}",
                    e
                ))
            }
        };

        let path = file.path().to_path_buf();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("main")
            .to_string();

        let vars = TemplateVars {
            source: &path,
            source_dir: &dir,
            artifact: &path,
            workspace: &dir,
            entry: &stem,
        };
        let argv = run.render(&vars);
        tracing::info!(language = %protocol.language, "running");

        let outcome = match process::run(&argv, &dir, protocol.run_timeout).await {
            Ok(out) => run_outcome(out, protocol.empty_output),
            Err(failure) => failure_outcome(failure, Stage::Run, protocol),
        };

        if let Err(e) = file.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove source file");
        }

        outcome
    }

    fn write_temp(&self, source: &str) -> std::io::Result<NamedTempFile> {
        let suffix = format!(".{}", self.protocol.extension);
        let mut builder = tempfile::Builder::new();
        builder.prefix("debugrun-").suffix(&suffix);

        let mut file = match &self.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempfile_in(root)?
            }
            None => builder.tempfile()?,
        };
        file.write_all(source.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

#[async_trait]
impl Executor for InterpretedExecutor {
    fn protocol(&self) -> &LanguageProtocol {
        &self.protocol
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        self.run_source(&request.source).await
    }
}
