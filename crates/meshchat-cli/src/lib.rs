//! MeshChat CLI library
//!
//! Loads layered configuration, parses replay scripts and drives them through
//! the MeshChat runtime.

pub mod cli;
pub mod config;
pub mod error;
pub mod replay;
pub mod script;

pub use cli::{Cli, Commands};
pub use config::CliAppConfig;
pub use error::{CliError, Result};
pub use replay::{replay, ReplayReport};
pub use script::{parse_script, ScriptStep};
