// src/protocol.rs

//! Static per-language run protocols.
//!
//! A `LanguageProtocol` says which stages a language goes through, which
//! tools it calls for each stage, and how long each stage may take. The
//! built-in table lives in `LanguageProtocol::builtin`; `config.yaml`
//! overrides are layered on top by the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Message returned when a program exits cleanly without printing anything.
pub const NO_OUTPUT_MESSAGE: &str = "Ran successfully, no output.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Ruby,
    Bash,
    Java,
    C,
    Cpp,
    Rust,
    Arduino,
    Sql,
    Html,
    Css,
    Xml,
}

impl Language {
    pub const ALL: [Language; 13] = [
        Language::Python,
        Language::JavaScript,
        Language::Ruby,
        Language::Bash,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::Rust,
        Language::Arduino,
        Language::Sql,
        Language::Html,
        Language::Css,
        Language::Xml,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Ruby => "ruby",
            Language::Bash => "bash",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Rust => "rust",
            Language::Arduino => "arduino",
            Language::Sql => "sql",
            Language::Html => "html",
            Language::Css => "css",
            Language::Xml => "xml",
        }
    }

    /// Every tag that selects this language, canonical name first.
    pub fn tags(self) -> &'static [&'static str] {
        match self {
            Language::Python => &["python", "py", "python3"],
            Language::JavaScript => &["javascript", "js", "node"],
            Language::Ruby => &["ruby", "rb"],
            Language::Bash => &["bash", "sh", "shell"],
            Language::Java => &["java"],
            Language::C => &["c"],
            Language::Cpp => &["cpp", "c++", "cxx", "cc"],
            Language::Rust => &["rust", "rs"],
            Language::Arduino => &["arduino", "ino"],
            Language::Sql => &["sql", "sqlite"],
            Language::Html => &["html", "htm"],
            Language::Css => &["css"],
            Language::Xml => &["xml", "svg"],
        }
    }

    /// Resolve a user-supplied tag, case-insensitively.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.tags().contains(&tag.as_str()))
    }

    /// Resolve a language from a source file's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "mjs" | "cjs" => Some(Language::JavaScript),
            "hpp" | "hh" => Some(Language::Cpp),
            "h" => Some(Language::C),
            other => Self::from_tag(other),
        }
    }

    /// Best-effort guess from the code itself.
    ///
    /// Only distinguishes the three shapes a rewritten snippet usually
    /// takes: an Arduino sketch, a Java class, or anything else (Python).
    pub fn guess_from_source(code: &str) -> Self {
        if code.contains("void setup()") || code.contains("void loop()") {
            Language::Arduino
        } else if code.contains("public class") || code.contains("class ") {
            Language::Java
        } else {
            Language::Python
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| anyhow::anyhow!("Unknown language: {}", s))
    }
}

/// File extension used when saving code for a language.
///
/// Used when the caller offers the corrected code as a download.
pub fn guess_extension(code: &str) -> &'static str {
    LanguageProtocol::builtin(Language::guess_from_source(code)).extension
}

/// The fixed sequence of stages a language follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolKind {
    /// Compile into the workspace, then run the artifact.
    Compiled,
    /// Compile only; the artifact needs hardware or a host to run.
    CompileOnly,
    /// Hand the source file straight to an interpreter.
    Interpreted,
    /// Statement-at-a-time execution against a throwaway store.
    Batch,
    /// No runnable form; the corrected code is the deliverable.
    ValidateOnly,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProtocolKind::Compiled => "compile + run",
            ProtocolKind::CompileOnly => "compile only",
            ProtocolKind::Interpreted => "interpreted",
            ProtocolKind::Batch => "batch",
            ProtocolKind::ValidateOnly => "validate only",
        };
        f.write_str(s)
    }
}

/// How the name of the compiled unit is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// Always the same name.
    Fixed(&'static str),
    /// The first publicly declared type in the source, else `default`.
    DeclaredPublicType { default: &'static str },
}

/// Where the source file goes inside the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    /// `<workspace>/<entry>.<ext>`
    Flat,
    /// `<workspace>/<entry>/<entry>.<ext>`, for toolchains that want the
    /// folder and file names to match.
    NamedFolder,
}

/// Values substituted into command templates.
#[derive(Debug, Clone)]
pub struct TemplateVars<'a> {
    pub source: &'a Path,
    pub source_dir: &'a Path,
    pub artifact: &'a Path,
    pub workspace: &'a Path,
    pub entry: &'a str,
}

/// An argument vector with `{placeholder}` substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(pub Vec<String>);

impl CommandTemplate {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(argv.into_iter().map(Into::into).collect())
    }

    /// The program as written in the template, before substitution.
    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Whether the program is a fixed tool name rather than a placeholder.
    pub fn names_tool(&self) -> bool {
        self.program().map_or(false, |p| !p.contains('{'))
    }

    pub fn render(&self, vars: &TemplateVars<'_>) -> Vec<String> {
        self.0
            .iter()
            .map(|arg| {
                arg.replace("{source_dir}", &vars.source_dir.to_string_lossy())
                    .replace("{source}", &vars.source.to_string_lossy())
                    .replace("{artifact}", &vars.artifact.to_string_lossy())
                    .replace("{workspace}", &vars.workspace.to_string_lossy())
                    .replace("{entry}", vars.entry)
            })
            .collect()
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Static description of how one language is executed.
#[derive(Debug, Clone)]
pub struct LanguageProtocol {
    pub language: Language,
    pub kind: ProtocolKind,
    pub extension: &'static str,
    pub layout: SourceLayout,
    pub entry_point: EntryPoint,
    pub compile: Option<CommandTemplate>,
    pub run: Option<CommandTemplate>,
    pub compile_timeout: Duration,
    pub run_timeout: Duration,
    /// Success message used when the program prints nothing.
    pub empty_output: &'static str,
}

impl LanguageProtocol {
    fn base(language: Language, kind: ProtocolKind, extension: &'static str) -> Self {
        Self {
            language,
            kind,
            extension,
            layout: SourceLayout::Flat,
            entry_point: EntryPoint::Fixed("main"),
            compile: None,
            run: None,
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            empty_output: NO_OUTPUT_MESSAGE,
        }
    }

    fn interpreted(language: Language, extension: &'static str, interpreter: &str) -> Self {
        Self {
            run: Some(CommandTemplate::new([interpreter, "{source}"])),
            ..Self::base(language, ProtocolKind::Interpreted, extension)
        }
    }

    fn native(language: Language, extension: &'static str, compile: CommandTemplate) -> Self {
        Self {
            compile: Some(compile),
            run: Some(CommandTemplate::new(["{artifact}"])),
            ..Self::base(language, ProtocolKind::Compiled, extension)
        }
    }

    /// The built-in protocol for a language.
    pub fn builtin(language: Language) -> Self {
        match language {
            Language::Python => Self::interpreted(language, "py", "python3"),
            Language::JavaScript => Self::interpreted(language, "js", "node"),
            Language::Ruby => Self::interpreted(language, "rb", "ruby"),
            Language::Bash => Self::interpreted(language, "sh", "bash"),
            Language::Java => Self {
                entry_point: EntryPoint::DeclaredPublicType { default: "Main" },
                compile: Some(CommandTemplate::new([
                    "javac",
                    "-encoding",
                    "UTF-8",
                    "{source}",
                ])),
                run: Some(CommandTemplate::new([
                    "java",
                    "-cp",
                    "{workspace}",
                    "{entry}",
                ])),
                ..Self::base(language, ProtocolKind::Compiled, "java")
            },
            Language::C => Self::native(
                language,
                "c",
                CommandTemplate::new(["gcc", "{source}", "-o", "{artifact}"]),
            ),
            Language::Cpp => Self::native(
                language,
                "cpp",
                CommandTemplate::new(["g++", "-std=c++17", "{source}", "-o", "{artifact}"]),
            ),
            Language::Rust => Self::native(
                language,
                "rs",
                CommandTemplate::new(["rustc", "{source}", "-o", "{artifact}"]),
            ),
            Language::Arduino => Self {
                layout: SourceLayout::NamedFolder,
                entry_point: EntryPoint::Fixed("sketch"),
                compile: Some(CommandTemplate::new([
                    "arduino-cli",
                    "compile",
                    "--fqbn",
                    "arduino:avr:uno",
                    "{source_dir}",
                ])),
                compile_timeout: Duration::from_secs(120),
                empty_output: "Arduino code compiled successfully.",
                ..Self::base(language, ProtocolKind::CompileOnly, "ino")
            },
            Language::Sql => Self::base(language, ProtocolKind::Batch, "sql"),
            Language::Html => Self::base(language, ProtocolKind::ValidateOnly, "html"),
            Language::Css => Self::base(language, ProtocolKind::ValidateOnly, "css"),
            Language::Xml => Self::base(language, ProtocolKind::ValidateOnly, "xml"),
        }
    }

    /// External tools this protocol calls, in stage order.
    pub fn tools(&self) -> Vec<&str> {
        [self.compile.as_ref(), self.run.as_ref()]
            .into_iter()
            .flatten()
            .filter(|t| t.names_tool())
            .filter_map(|t| t.program())
            .collect()
    }
}
