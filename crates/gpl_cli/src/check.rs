//! `gpl check-config`: validate a configuration file.

use std::error::Error;
use std::path::Path;

use crate::GlobalArgs;

/// Runs the `gpl check-config` command.
///
/// Parse and range errors are returned as errors; a valid file exits 0.
pub fn run(path: &str, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let config = gpl_config::load_config_file(Path::new(path))?;
    if !global.quiet {
        eprintln!("    Checked {path}");
        eprintln!(
            "      nesterov: target density {}, target overflow {}, max {} iterations",
            config.nesterov.target_density, config.nesterov.target_overflow, config.nesterov.max_iter
        );
        if config.routability.enabled {
            eprintln!(
                "      routability: check at overflow {}, target RC {}",
                config.routability.check_overflow, config.routability.target_rc_metric
            );
        }
        if config.timing.enabled {
            eprintln!(
                "      timing: checkpoints {:?}",
                config.timing.net_weight_overflows
            );
        }
    }
    Ok(0)
}
