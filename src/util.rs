// src/util.rs

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Read a UTF-8 file into a String with a clear error message.
///
/// Used for source files and `debugrun.yaml`.
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file {:?}", path))
}

/// Read source code from a file, or from stdin when no path is given.
pub fn read_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => read_to_string(p),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read source from stdin")?;
            Ok(buf)
        }
    }
}

/// Ensure a directory exists (create it if missing).
///
/// Used for a configured `workspace_root`.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("Failed to create directory {:?}", path))
}

/// First non-empty line of a block of text, trimmed.
pub fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}
