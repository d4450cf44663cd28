//! Run untrusted-but-cooperative code snippets in many languages and report
//! the result as one marked summary.
//!
//! The public entry point is [`dispatch::Dispatcher`]; everything else is the
//! machinery behind it.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod execution_id;
pub mod executor;
pub mod outcome;
pub mod preprocess;
pub mod process;
pub mod protocol;
pub mod registry;
pub mod rewrite;
pub mod runner;
pub mod util;
pub mod workspace;

pub use config::Config;
pub use dispatch::Dispatcher;
pub use executor::ExecutionRequest;
pub use outcome::ExecutionOutcome;
pub use protocol::Language;
