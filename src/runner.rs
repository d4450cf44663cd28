// src/runner.rs

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::outcome::ExecutionOutcome;
use crate::process::{self, RunFailure};
use crate::protocol::{Language, LanguageProtocol};
use crate::registry::Registry;
use crate::rewrite::{parse_response, rewrite_prompt};
use crate::util::{first_line, read_source};

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Entry point from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            language,
            file,
            inputs,
            entry,
            config,
            from_response,
            json,
        } => {
            let cfg = Config::load_or_default(&config)?;
            let mut code = read_source(file.as_deref())?;

            if from_response {
                let parsed = parse_response(&code);
                eprintln!("{}", parsed.explanation);
                code = parsed.code;
            }

            let tag = resolve_language(language.as_deref(), file.as_deref(), &code);
            let dispatcher = Dispatcher::new(&cfg);
            let outcome = dispatcher
                .run(&tag, &code, &inputs, entry.as_deref().unwrap_or(""))
                .await;

            if json {
                let rendered = serde_json::to_string_pretty(&outcome)
                    .context("Failed to format outcome as JSON")?;
                println!("{}", rendered);
            } else {
                println!("{}", render_summary(&outcome, should_use_color()));
            }

            if !outcome.is_success() {
                bail!("Execution did not succeed ({})", outcome.kind());
            }
            Ok(())
        }

        Command::Languages { config } => {
            let cfg = Config::load_or_default(&config)?;
            let registry = Registry::from_config(&cfg);
            for line in language_table(&registry) {
                println!("{}", line);
            }
            Ok(())
        }

        Command::Doctor { config } => {
            let cfg = Config::load_or_default(&config)?;
            doctor(&Registry::from_config(&cfg), should_use_color()).await
        }

        Command::Prompt { language, file } => {
            let Some(lang) = Language::from_tag(&language) else {
                bail!("Unknown language '{}'", language);
            };
            let code = read_source(file.as_deref())?;
            println!("{}", rewrite_prompt(lang, code.trim_end()));
            Ok(())
        }
    }
}

/// Pick a language tag: explicit flag, then file extension, then the code.
fn resolve_language(explicit: Option<&str>, file: Option<&Path>, code: &str) -> String {
    if let Some(tag) = explicit {
        return tag.to_string();
    }
    file.and_then(Language::from_path)
        .unwrap_or_else(|| Language::guess_from_source(code))
        .name()
        .to_string()
}

fn render_summary(outcome: &ExecutionOutcome, use_color: bool) -> String {
    let summary = outcome.summary();
    let (head, rest) = match summary.split_once('\n') {
        Some((head, rest)) => (head, Some(rest)),
        None => (summary.as_str(), None),
    };

    let color = if outcome.is_success() { "32" } else { "31" };
    let mut out = paint(head, color, use_color);
    if let Some(rest) = rest {
        out.push('\n');
        out.push_str(rest);
    }
    out
}

fn language_table(registry: &Registry) -> Vec<String> {
    registry
        .protocols()
        .map(|p| {
            let tools = p.tools();
            let tools = if tools.is_empty() {
                "(built-in)".to_string()
            } else {
                tools.join(", ")
            };
            let default = if p.language == registry.default_language() {
                " (default)"
            } else {
                ""
            };
            format!(
                "{:<12} {:<14} {}{}",
                p.language.name(),
                p.kind.to_string(),
                tools,
                default
            )
        })
        .collect()
}

/* ---------------- doctor ---------------- */

#[derive(Debug, PartialEq, Eq)]
enum ToolStatus {
    Found(String),
    Missing,
    Broken(String),
}

fn version_flag(tool: &str) -> &'static str {
    let name = Path::new(tool)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(tool);
    match name {
        "java" | "javac" => "-version",
        "arduino-cli" => "version",
        _ => "--version",
    }
}

/// Every distinct tool named by the registered protocols, in first-use order.
fn distinct_tools(protocols: &[&LanguageProtocol]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut tools = Vec::new();
    for p in protocols {
        for tool in p.tools() {
            if seen.insert(tool.to_string()) {
                tools.push(tool.to_string());
            }
        }
    }
    tools
}

async fn check_tool(tool: &str) -> ToolStatus {
    let argv = vec![tool.to_string(), version_flag(tool).to_string()];
    let cwd = std::env::temp_dir();

    match process::run(&argv, &cwd, VERSION_TIMEOUT).await {
        Ok(output) => {
            // java prints its version on stderr
            let line = first_line(&output.stdout)
                .or_else(|| first_line(&output.stderr))
                .unwrap_or("(no version output)")
                .to_string();
            if output.success() {
                ToolStatus::Found(line)
            } else {
                ToolStatus::Broken(line)
            }
        }
        Err(RunFailure::ToolUnavailable(_)) => ToolStatus::Missing,
        Err(RunFailure::Timeout) => ToolStatus::Broken("version check timed out".to_string()),
        Err(RunFailure::Io(e)) => ToolStatus::Broken(e.to_string()),
    }
}

async fn doctor(registry: &Registry, use_color: bool) -> Result<()> {
    let protocols: Vec<&LanguageProtocol> = registry.protocols().collect();
    let tools = distinct_tools(&protocols);
    let mut missing = 0usize;

    for tool in &tools {
        let users: Vec<String> = protocols
            .iter()
            .filter(|p| p.tools().contains(&tool.as_str()))
            .map(|p| p.language.to_string())
            .collect();

        let line = match check_tool(tool).await {
            ToolStatus::Found(version) => {
                format!("{} {:<12} {}", paint("ok", "32", use_color), tool, version)
            }
            ToolStatus::Missing => {
                missing += 1;
                format!(
                    "{} {:<12} not found on PATH (needed by {})",
                    paint("missing", "31", use_color),
                    tool,
                    users.join(", ")
                )
            }
            ToolStatus::Broken(detail) => format!(
                "{} {:<12} {}",
                paint("broken", "33", use_color),
                tool,
                detail
            ),
        };
        println!("{}", line);
    }

    tracing::info!(tools = tools.len(), missing, "toolchain check finished");
    if missing > 0 {
        println!(
            "{} of {} toolchains missing; those languages report Toolchain unavailable.",
            missing,
            tools.len()
        );
    }
    Ok(())
}

/* ---------------- helpers ---------------- */

fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[{}m{}\x1b[0m", color, text)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LanguageOverride;
    use crate::protocol::CommandTemplate;

    #[test]
    fn explicit_language_wins() {
        let tag = resolve_language(Some("ruby"), Some(Path::new("a.java")), "print(1)");
        assert_eq!(tag, "ruby");
    }

    #[test]
    fn extension_then_source_guess() {
        assert_eq!(
            resolve_language(None, Some(Path::new("Main.java")), ""),
            "java"
        );
        assert_eq!(
            resolve_language(None, None, "void setup() {}\nvoid loop() {}"),
            "arduino"
        );
        assert_eq!(resolve_language(None, Some(Path::new("notes")), "x = 1"), "python");
    }

    #[test]
    fn summary_paints_only_the_head_line() {
        let outcome = ExecutionOutcome::RuntimeFailure {
            diagnostic: "boom".into(),
        };
        assert_eq!(render_summary(&outcome, false), outcome.summary());

        let painted = render_summary(&outcome, true);
        assert!(painted.starts_with("\x1b[31m"));
        assert!(painted.ends_with("\x1b[0m\nboom"));
    }

    #[test]
    fn version_flags_follow_tool_conventions() {
        assert_eq!(version_flag("javac"), "-version");
        assert_eq!(version_flag("/usr/bin/java"), "-version");
        assert_eq!(version_flag("arduino-cli"), "version");
        assert_eq!(version_flag("g++"), "--version");
    }

    #[test]
    fn tools_are_listed_once() {
        let cfg = Config::default().with_override(
            Language::Cpp,
            LanguageOverride {
                compile: Some(CommandTemplate::new(["gcc", "{source}", "-o", "{artifact}"])),
                ..Default::default()
            },
        );
        let registry = Registry::from_config(&cfg);
        let protocols: Vec<&LanguageProtocol> = registry.protocols().collect();
        let tools = distinct_tools(&protocols);

        assert_eq!(tools.iter().filter(|t| *t == "gcc").count(), 1);
        assert!(tools.contains(&"javac".to_string()));
        assert!(!tools.iter().any(|t| t.contains('{')));
    }

    #[test]
    fn language_table_marks_default_and_builtins() {
        let registry = Registry::from_config(&Config::default());
        let table = language_table(&registry);
        assert_eq!(table.len(), Language::ALL.len());
        assert!(table.iter().any(|l| l.starts_with("python") && l.ends_with("(default)")));
        assert!(table.iter().any(|l| l.starts_with("sql") && l.contains("(built-in)")));
    }

    #[tokio::test]
    async fn missing_tools_are_reported() {
        assert_eq!(check_tool("debugrun-no-such-tool").await, ToolStatus::Missing);
    }
}
