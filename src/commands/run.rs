//! Command dispatch logic for contrib-ingest

use super::{
    CheckpointArgs, ClearCacheArgs, CollectArgs, CommonArgs, InitArgs, ValidateArgs, clear_cache, collect_contributions, init_config,
    show_checkpoint, validate_config,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "contrib-ingest", version, author, long_about = None)]
#[command(about = "Collect repository contribution activity through a rate-limited API")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect contribution events for repositories over a period
    Collect(Box<CollectArgs>),
    /// Remove cached results
    ClearCache(ClearCacheArgs),
    /// Show the checkpoint stored under a key
    Checkpoint(CheckpointArgs),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// This function parses the command-line arguments and executes the corresponding
/// subcommand. It's designed to be called from main.rs with the program arguments.
///
/// # Errors
///
/// Returns an error if the executed command fails
pub fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);

    match &cli.command {
        Command::Collect(collect_args) => collect_contributions(host, &cli.common, collect_args),
        Command::ClearCache(clear_args) => clear_cache(host, &cli.common, clear_args),
        Command::Checkpoint(checkpoint_args) => show_checkpoint(host, &cli.common, checkpoint_args),
        Command::Init(init_args) => init_config(host, init_args),
        Command::Validate(validate_args) => {
            validate_config(host, validate_args);
            Ok(())
        }
    }
}
