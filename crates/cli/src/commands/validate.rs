//! The `validate` command: check a configuration file without running.

use anyhow::{bail, Result};
use config_loader::ConfigLoader;

use crate::cli::ValidateArgs;

/// Validate the configuration file and report the result
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    match ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": true,
                        "path": args.config.display().to_string(),
                        "mode": format!("{:?}", config.device.mode),
                    })
                );
            } else {
                println!("Configuration OK: {}", args.config.display());
            }
            Ok(())
        }
        Err(e) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "path": args.config.display().to_string(),
                        "error": e.to_string(),
                    })
                );
            }
            bail!("Configuration invalid: {e}")
        }
    }
}
