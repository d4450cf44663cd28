// src/registry.rs

//! Language tag to executor lookup, built once at startup.
//!
//! Adding a language means adding its protocol and registering one
//! executor here; the dispatcher never branches on language names.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::executor::{
    BatchExecutor, CompiledExecutor, Executor, InterpretedExecutor, PythonExecutor,
    ValidateOnlyExecutor,
};
use crate::protocol::{Language, LanguageProtocol, ProtocolKind};

pub struct Registry {
    executors: BTreeMap<Language, Arc<dyn Executor>>,
    default_language: Language,
}

impl Registry {
    /// Build one executor per supported language from `config`.
    pub fn from_config(config: &Config) -> Self {
        let executors = Language::ALL
            .into_iter()
            .map(|lang| (lang, build_executor(config.protocol_for(lang), config)))
            .collect();

        Self {
            executors,
            default_language: config.default_language(),
        }
    }

    /// Replace the executor for the language its protocol names.
    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        let language = executor.protocol().language;
        self.executors.insert(language, executor);
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    /// Resolve a tag, falling back to the default language when unknown.
    pub fn resolve(&self, tag: &str) -> Language {
        match Language::from_tag(tag) {
            Some(lang) if self.executors.contains_key(&lang) => lang,
            _ => {
                tracing::debug!(tag = %tag, fallback = %self.default_language, "unknown language tag");
                self.default_language
            }
        }
    }

    pub fn get(&self, language: Language) -> Option<Arc<dyn Executor>> {
        self.executors.get(&language).cloned()
    }

    /// Registered protocols, in language order.
    pub fn protocols(&self) -> impl Iterator<Item = &LanguageProtocol> {
        self.executors.values().map(|e| e.protocol())
    }
}

fn build_executor(protocol: LanguageProtocol, config: &Config) -> Arc<dyn Executor> {
    let root = config.workspace_root.clone();

    match protocol.kind {
        ProtocolKind::Compiled | ProtocolKind::CompileOnly => {
            Arc::new(CompiledExecutor::new(protocol, root))
        }
        ProtocolKind::Interpreted if protocol.language == Language::Python => Arc::new(
            PythonExecutor::new(InterpretedExecutor::new(protocol, root)),
        ),
        ProtocolKind::Interpreted => Arc::new(InterpretedExecutor::new(protocol, root)),
        ProtocolKind::Batch => Arc::new(BatchExecutor::new(protocol)),
        ProtocolKind::ValidateOnly => Arc::new(ValidateOnlyExecutor::new(protocol)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_language_has_an_executor() {
        let registry = Registry::from_config(&Config::default());
        for lang in Language::ALL {
            let exec = registry.get(lang).expect("registered");
            assert_eq!(exec.protocol().language, lang);
        }
        assert_eq!(registry.protocols().count(), Language::ALL.len());
    }

    #[test]
    fn unknown_tags_fall_back_to_default() {
        let registry = Registry::from_config(&Config::default());
        assert_eq!(registry.resolve("Java"), Language::Java);
        assert_eq!(registry.resolve("brainfuck"), Language::Python);
        assert_eq!(registry.resolve(""), Language::Python);
    }

    #[test]
    fn configured_default_is_used_for_fallback() {
        let cfg = Config::from_yaml("default_language: cpp\n").unwrap();
        let registry = Registry::from_config(&cfg);
        assert_eq!(registry.resolve("kotlin"), Language::Cpp);
    }
}
