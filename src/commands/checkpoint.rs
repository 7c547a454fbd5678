use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct CheckpointArgs {
    /// Checkpoint key, such as `commit_owner_name_2024-01-01`
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Delete the checkpoint after showing it
    #[arg(long)]
    pub clear: bool,
}

pub fn show_checkpoint<H: Host>(host: &mut H, common_args: &CommonArgs, args: &CheckpointArgs) -> Result<()> {
    let common = Common::new(common_args)?;
    let store = common.checkpoint_store()?;

    let Some(checkpoint) = store.load(&args.key)? else {
        let _ = writeln!(host.output(), "No checkpoint stored under '{}'", args.key);
        return Ok(());
    };

    let _ = writeln!(host.output(), "{}", serde_json::to_string_pretty(&checkpoint)?);

    if args.clear {
        store.clear(&args.key)?;
        let _ = writeln!(host.error(), "Removed checkpoint '{}'", args.key);
    }

    Ok(())
}
