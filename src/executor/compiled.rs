// src/executor/compiled.rs

//! Compile-then-run (and compile-only) protocol.
//!
//! Source goes into a fresh workspace, the compiler runs under the compile
//! deadline, and only a clean compile lets the artifact run under its own,
//! independent deadline. The workspace is gone when `execute` returns.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::{diagnostic, failure_outcome, run_outcome, ExecutionRequest, Executor};
use crate::outcome::{ExecutionOutcome, Stage};
use crate::process;
use crate::protocol::{EntryPoint, LanguageProtocol, SourceLayout, TemplateVars};
use crate::workspace::with_workspace;

fn public_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\bpublic\s+(?:(?:final|abstract|static|sealed|strictfp)\s+)*(?:class|interface|enum|record)\s+([A-Za-z_$][A-Za-z0-9_$]*)",
        )
        .expect("public type pattern is valid")
    })
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
    })
}

/// Name of the first publicly declared type in `source`.
pub fn declared_public_type(source: &str) -> Option<&str> {
    public_type_pattern()
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone)]
pub struct CompiledExecutor {
    protocol: LanguageProtocol,
    workspace_root: Option<PathBuf>,
}

impl CompiledExecutor {
    pub fn new(protocol: LanguageProtocol, workspace_root: Option<PathBuf>) -> Self {
        Self {
            protocol,
            workspace_root,
        }
    }

    /// Pick the unit name the source file and artifact are named after.
    ///
    /// A declared public type always wins because the compiler insists on
    /// it; a caller hint is used only when the source declares none.
    pub fn entry_point(&self, request: &ExecutionRequest) -> String {
        match self.protocol.entry_point {
            EntryPoint::Fixed(name) => name.to_string(),
            EntryPoint::DeclaredPublicType { default } => declared_public_type(&request.source)
                .map(str::to_string)
                .or_else(|| {
                    request
                        .entry_point
                        .as_deref()
                        .filter(|hint| identifier_pattern().is_match(hint))
                        .map(str::to_string)
                })
                .unwrap_or_else(|| default.to_string()),
        }
    }

    async fn compile_and_run(&self, workspace: PathBuf, entry: String, source: &str) -> ExecutionOutcome {
        let protocol = &self.protocol;

        let source_dir = match protocol.layout {
            SourceLayout::Flat => workspace.clone(),
            SourceLayout::NamedFolder => workspace.join(&entry),
        };
        let source_path = source_dir.join(format!("{}.{}", entry, protocol.extension));
        let artifact = workspace.join(&entry);

        if let Err(e) = write_source(&source_dir, &source_path, source) {
            return ExecutionOutcome::internal(format!("Execution error: {}", e));
        }

        let vars = TemplateVars {
            source: &source_path,
            source_dir: &source_dir,
            artifact: &artifact,
            workspace: &workspace,
            entry: &entry,
        };

        if let Some(compile) = &protocol.compile {
            let argv = compile.render(&vars);
            tracing::info!(language = %protocol.language, "compiling");

            match process::run(&argv, &workspace, protocol.compile_timeout).await {
                Ok(out) if out.success() => {
                    tracing::debug!(duration = ?out.duration, "compiled");
                }
                Ok(out) => {
                    tracing::info!(exit_code = ?out.exit_code, "compilation failed");
                    return ExecutionOutcome::CompileFailure {
                        diagnostic: diagnostic(&out),
                    };
                }
                Err(failure) => return failure_outcome(failure, Stage::Compile, protocol),
            }
        }

        let Some(run) = &protocol.run else {
            return ExecutionOutcome::success(protocol.empty_output);
        };

        let argv = run.render(&vars);
        tracing::info!(language = %protocol.language, "running");

        match process::run(&argv, &workspace, protocol.run_timeout).await {
            Ok(out) => run_outcome(out, protocol.empty_output),
            Err(failure) => failure_outcome(failure, Stage::Run, protocol),
        }
    }
}

fn write_source(dir: &Path, path: &Path, source: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(path, source)
}

#[async_trait]
impl Executor for CompiledExecutor {
    fn protocol(&self) -> &LanguageProtocol {
        &self.protocol
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let entry = self.entry_point(request);
        let source = request.source.as_str();

        let result = with_workspace(self.workspace_root.as_deref(), |dir| {
            self.compile_and_run(dir, entry, source)
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::internal(format!("Execution error: {:#}", e)),
        }
    }
}
