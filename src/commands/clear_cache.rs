use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ClearCacheArgs {
    /// Only remove entries whose key starts with this prefix
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,
}

pub fn clear_cache<H: Host>(host: &mut H, common_args: &CommonArgs, args: &ClearCacheArgs) -> Result<()> {
    let common = Common::new(common_args)?;
    let cache = common.open_cache()?;
    let removed = cache.clear(args.prefix.as_deref())?;

    let _ = match &args.prefix {
        Some(prefix) => writeln!(host.output(), "Removed {removed} cache entries starting with '{prefix}'"),
        None => writeln!(host.output(), "Removed {removed} cache entries"),
    };

    Ok(())
}
