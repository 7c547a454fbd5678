//! Command-line interface for contrib-ingest
//!
//! The binary is a thin layer over the library: each command loads the configuration,
//! assembles the pipeline it needs, and reports through a [`Host`] so output can be captured
//! in tests.
//!
//! ## Commands
//!
//! - **collect**: collect contribution events for one or more repositories over a period and
//!   write them as JSON
//! - **clear-cache**: remove cached results, optionally by key prefix
//! - **checkpoint**: show (and optionally remove) a stored retry checkpoint
//! - **init**: generate a default configuration file
//! - **validate**: check a configuration file

mod checkpoint;
mod clear_cache;
mod collect;
mod common;
mod host;
mod init;
mod run;
mod validate;

pub use checkpoint::{CheckpointArgs, show_checkpoint};
pub use clear_cache::{ClearCacheArgs, clear_cache};
pub use collect::{CollectArgs, collect_contributions};
pub use common::{Common, CommonArgs, LogLevel};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
