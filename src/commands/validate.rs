use super::Host;
use crate::config::{Config, DEFAULT_CONFIG_FILE_NAME};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (default is `contrib-ingest.toml`)
    #[arg(value_name = "PATH")]
    pub path: Option<Utf8PathBuf>,
}

pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) {
    let config_path = args.path.as_ref();

    match Config::load(Utf8Path::new("."), config_path) {
        Ok(_) => {
            let _ = writeln!(host.output(), "Configuration file is valid");
            let shown = config_path.map_or(DEFAULT_CONFIG_FILE_NAME, |p| p.as_str());
            let _ = writeln!(host.output(), "Config file: {shown}");
        }
        Err(e) => {
            let _ = writeln!(host.error(), "Configuration validation failed: {e:#}");
            host.exit(1);
        }
    }
}
