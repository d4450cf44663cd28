// src/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::protocol::{CommandTemplate, Language, LanguageProtocol};
use crate::util::read_to_string;

/// Root configuration loaded from `debugrun.yaml`.
///
/// Everything is optional. Without a file the built-in protocol table is
/// used as is.
///
/// Example:
///
/// default_language: python
/// workspace_root: /var/tmp/debugrun
/// languages:
///   java:
///     compile: ["/opt/jdk/bin/javac", "{source}"]
///     run_timeout_ms: 5000
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Language used for unknown or unsupported tags.
    #[serde(default)]
    pub default_language: Option<String>,

    /// Parent directory for per-attempt workspaces.
    ///
    /// Defaults to the system temp directory.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    /// Per-language overrides, keyed by any accepted language tag.
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageOverride>,
}

/// Replacement values for one language's built-in protocol.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageOverride {
    #[serde(default)]
    pub compile: Option<CommandTemplate>,

    #[serde(default)]
    pub run: Option<CommandTemplate>,

    #[serde(default)]
    pub compile_timeout_ms: Option<u64>,

    #[serde(default)]
    pub run_timeout_ms: Option<u64>,
}

impl LanguageOverride {
    pub fn apply(&self, protocol: &mut LanguageProtocol) {
        if let Some(c) = &self.compile {
            protocol.compile = Some(c.clone());
        }
        if let Some(r) = &self.run {
            protocol.run = Some(r.clone());
        }
        if let Some(ms) = self.compile_timeout_ms {
            protocol.compile_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.run_timeout_ms {
            protocol.run_timeout = Duration::from_millis(ms);
        }
    }
}

impl Config {
    /// Load and parse `debugrun.yaml` from disk.
    ///
    /// This performs:
    /// - File read
    /// - YAML deserialization
    /// - Validation of language names and command templates
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_to_string(path).context("Failed to load config file")?;

        Self::from_yaml(&raw)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(raw).context("Failed to parse YAML config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if let Some(tag) = &self.default_language {
            tag.parse::<Language>()
                .context("Invalid default_language")?;
        }

        for (tag, ov) in &self.languages {
            tag.parse::<Language>()
                .with_context(|| format!("Invalid key under languages: {}", tag))?;

            for (stage, template) in [("compile", &ov.compile), ("run", &ov.run)] {
                if let Some(t) = template {
                    if t.0.is_empty() {
                        bail!("languages.{}.{} must not be empty", tag, stage);
                    }
                }
            }

            for (field, ms) in [
                ("compile_timeout_ms", ov.compile_timeout_ms),
                ("run_timeout_ms", ov.run_timeout_ms),
            ] {
                if ms == Some(0) {
                    bail!("languages.{}.{} must be greater than zero", tag, field);
                }
            }
        }

        Ok(())
    }

    /// The fallback language, `python` unless configured.
    pub fn default_language(&self) -> Language {
        self.default_language
            .as_deref()
            .and_then(Language::from_tag)
            .unwrap_or(Language::Python)
    }

    /// Register an override in code, keyed by canonical language name.
    pub fn with_override(mut self, language: Language, ov: LanguageOverride) -> Self {
        self.languages.insert(language.name().to_string(), ov);
        self
    }

    /// Built-in protocol for `language` with any configured override applied.
    pub fn protocol_for(&self, language: Language) -> LanguageProtocol {
        let mut protocol = LanguageProtocol::builtin(language);
        for (tag, ov) in &self.languages {
            if Language::from_tag(tag) == Some(language) {
                ov.apply(&mut protocol);
            }
        }
        protocol
    }
}
