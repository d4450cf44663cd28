// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run code snippets in many languages and print one summary line block.
///
/// `debugrun.yaml` is optional; without it the built-in toolchain commands
/// are used.
#[derive(Parser, Debug)]
#[command(
    name = "debugrun",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// All supported CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a snippet and print the summary.
    ///
    /// Code is read from --file, or from stdin when no file is given.
    Run {
        /// Language tag (python, java, cpp, sql, ...)
        ///
        /// Inferred from the file extension, then from the code itself,
        /// when omitted.
        #[arg(short, long)]
        language: Option<String>,

        /// Source file to run
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Runtime input value (can be passed multiple times)
        ///
        /// Values fill input() call sites in order.
        #[arg(short, long = "input")]
        inputs: Vec<String>,

        /// Entry-point name for languages that need one (Java main class)
        #[arg(long)]
        entry: Option<String>,

        /// Path to config file
        #[arg(short, long, default_value = "debugrun.yaml")]
        config: PathBuf,

        /// Treat the input as a raw rewriting-service response
        ///
        /// The explanation is printed to stderr; the code part is run.
        #[arg(long)]
        from_response: bool,

        /// Print the outcome as JSON instead of the text summary
        #[arg(long)]
        json: bool,
    },

    /// List supported languages, their protocol and the tools they call.
    Languages {
        /// Path to config file
        #[arg(short, long, default_value = "debugrun.yaml")]
        config: PathBuf,
    },

    /// Check which toolchains are installed.
    Doctor {
        /// Path to config file
        #[arg(short, long, default_value = "debugrun.yaml")]
        config: PathBuf,
    },

    /// Print the prompt a rewriting service would be sent for this code.
    Prompt {
        /// Language tag
        #[arg(short, long)]
        language: String,

        /// Source file (stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
