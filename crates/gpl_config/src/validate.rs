//! Range validation for [`PlacerConfig`].
//!
//! Individual field checks are public so that runtime setters can apply the
//! same rules as a freshly loaded file.

use crate::error::ConfigError;
use crate::types::{
    DebugConfig, InitialPlaceConfig, NesterovConfig, PlacerConfig, RoutabilityConfig,
    TimingConfig,
};

const MAX_BIN_GRID: usize = 4096;

/// Validates every section of a configuration.
pub fn validate_config(config: &PlacerConfig) -> Result<(), ConfigError> {
    validate_initial_place(&config.initial_place)?;
    validate_nesterov(&config.nesterov)?;
    validate_routability(&config.routability)?;
    validate_timing(&config.timing)?;
    validate_debug(&config.debug)?;
    Ok(())
}

/// Checks a target density value.
pub fn check_target_density(value: f64) -> Result<(), ConfigError> {
    half_open_unit("nesterov.target_density", value)
}

/// Checks a target overflow value.
pub fn check_target_overflow(value: f64) -> Result<(), ConfigError> {
    half_open_unit("nesterov.target_overflow", value)
}

/// Checks a timing overflow checkpoint given in percent.
pub fn check_overflow_checkpoint(percent: u32) -> Result<(), ConfigError> {
    if (1..=100).contains(&percent) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(
            "timing.net_weight_overflows",
            percent,
            "a percentage in 1..=100",
        ))
    }
}

/// Checks one bin grid dimension (`0` selects automatic sizing).
pub fn check_bin_grid(field: &str, value: usize) -> Result<(), ConfigError> {
    if value <= MAX_BIN_GRID {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(
            field,
            value,
            format!("0 (automatic) or 1..={MAX_BIN_GRID}"),
        ))
    }
}

fn validate_initial_place(c: &InitialPlaceConfig) -> Result<(), ConfigError> {
    positive("initial_place.min_diff_length", c.min_diff_length)?;
    at_least("initial_place.max_solver_iter", c.max_solver_iter, 1)?;
    at_least("initial_place.max_fanout", c.max_fanout, 2)?;
    positive("initial_place.net_weight_scale", c.net_weight_scale)?;
    if !(c.solver_tolerance > 0.0 && c.solver_tolerance < 1.0) {
        return Err(ConfigError::out_of_range(
            "initial_place.solver_tolerance",
            c.solver_tolerance,
            "a value in (0, 1)",
        ));
    }
    positive("initial_place.convergence_error", c.convergence_error)
}

fn validate_nesterov(c: &NesterovConfig) -> Result<(), ConfigError> {
    at_least("nesterov.max_iter", c.max_iter, 1)?;
    check_bin_grid("nesterov.bin_grid_x", c.bin_grid_x)?;
    check_bin_grid("nesterov.bin_grid_y", c.bin_grid_y)?;
    check_target_density(c.target_density)?;
    check_target_overflow(c.target_overflow)?;
    positive("nesterov.init_density_penalty", c.init_density_penalty)?;
    positive("nesterov.init_wirelength_coef", c.init_wirelength_coef)?;
    half_open_unit("nesterov.min_phi_coef", c.min_phi_coef)?;
    if !(c.max_phi_coef >= 1.0 && c.max_phi_coef >= c.min_phi_coef) || !c.max_phi_coef.is_finite()
    {
        return Err(ConfigError::out_of_range(
            "nesterov.max_phi_coef",
            c.max_phi_coef,
            "a finite value >= 1 and >= nesterov.min_phi_coef",
        ));
    }
    positive("nesterov.reference_hpwl", c.reference_hpwl)?;
    at_least("nesterov.max_back_track", c.max_back_track, 1)?;
    positive(
        "nesterov.initial_prev_coordi_update_coef",
        c.initial_prev_coordi_update_coef,
    )?;
    positive("nesterov.min_step_length", c.min_step_length)?;
    if !(c.max_step_length > c.min_step_length) {
        return Err(ConfigError::out_of_range(
            "nesterov.max_step_length",
            c.max_step_length,
            "a value greater than nesterov.min_step_length",
        ));
    }
    non_negative("nesterov.pad_left", c.pad_left)?;
    non_negative("nesterov.pad_right", c.pad_right)
}

fn validate_routability(c: &RoutabilityConfig) -> Result<(), ConfigError> {
    half_open_unit("routability.check_overflow", c.check_overflow)?;
    half_open_unit("routability.max_density", c.max_density)?;
    positive("routability.target_rc_metric", c.target_rc_metric)?;
    positive("routability.inflation_ratio_coef", c.inflation_ratio_coef)?;
    if !(c.max_inflation_ratio >= 1.0) || !c.max_inflation_ratio.is_finite() {
        return Err(ConfigError::out_of_range(
            "routability.max_inflation_ratio",
            c.max_inflation_ratio,
            "a finite value >= 1",
        ));
    }
    let names = [
        "routability.rc_k1",
        "routability.rc_k2",
        "routability.rc_k3",
        "routability.rc_k4",
    ];
    for (name, k) in names.iter().zip(c.rc_coefficients()) {
        non_negative(name, k)?;
    }
    let sum: f64 = c.rc_coefficients().iter().sum();
    if sum <= 0.0 {
        return Err(ConfigError::out_of_range(
            "routability.rc_k1",
            sum,
            "RC coefficients with a positive sum",
        ));
    }
    Ok(())
}

fn validate_timing(c: &TimingConfig) -> Result<(), ConfigError> {
    for &percent in &c.net_weight_overflows {
        check_overflow_checkpoint(percent)?;
    }
    if !(c.net_weight_max >= 1.0) || !c.net_weight_max.is_finite() {
        return Err(ConfigError::out_of_range(
            "timing.net_weight_max",
            c.net_weight_max,
            "a finite value >= 1",
        ));
    }
    Ok(())
}

fn validate_debug(c: &DebugConfig) -> Result<(), ConfigError> {
    at_least("debug.pause_iterations", c.pause_iterations, 1)?;
    at_least("debug.update_iterations", c.update_iterations, 1)
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, "a finite value > 0"))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, "a finite value >= 0"))
    }
}

fn half_open_unit(field: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, "a value in (0, 1]"))
    }
}

fn at_least(field: &str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, format!("an integer >= {min}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ConfigError) -> String {
        err.field().unwrap_or_default().to_string()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&PlacerConfig::default()).is_ok());
    }

    #[test]
    fn target_density_bounds() {
        assert!(check_target_density(0.0).is_err());
        assert!(check_target_density(1.5).is_err());
        assert!(check_target_density(f64::NAN).is_err());
        assert!(check_target_density(0.7).is_ok());
        assert!(check_target_density(1.0).is_ok());
    }

    #[test]
    fn phi_range_must_be_ordered() {
        let mut config = PlacerConfig::default();
        config.nesterov.min_phi_coef = 1.0;
        config.nesterov.max_phi_coef = 0.99;
        let err = validate_config(&config).unwrap_err();
        assert_eq!(field_of(err), "nesterov.max_phi_coef");
    }

    #[test]
    fn checkpoints_are_percentages() {
        let mut config = PlacerConfig::default();
        config.timing.net_weight_overflows = vec![50, 0];
        let err = validate_config(&config).unwrap_err();
        assert_eq!(field_of(err), "timing.net_weight_overflows");
        assert!(check_overflow_checkpoint(100).is_ok());
        assert!(check_overflow_checkpoint(101).is_err());
    }

    #[test]
    fn bin_grid_limit() {
        assert!(check_bin_grid("nesterov.bin_grid_x", 0).is_ok());
        assert!(check_bin_grid("nesterov.bin_grid_x", 4096).is_ok());
        assert!(check_bin_grid("nesterov.bin_grid_x", 4097).is_err());
    }

    #[test]
    fn rc_coefficients_need_positive_sum() {
        let mut config = PlacerConfig::default();
        config.routability.rc_k1 = 0.0;
        config.routability.rc_k2 = 0.0;
        assert!(validate_config(&config).is_err());
        config.routability.rc_k4 = -1.0;
        let err = validate_config(&config).unwrap_err();
        assert_eq!(field_of(err), "routability.rc_k4");
    }

    #[test]
    fn solver_limits() {
        let mut config = PlacerConfig::default();
        config.initial_place.max_fanout = 1;
        assert_eq!(
            field_of(validate_config(&config).unwrap_err()),
            "initial_place.max_fanout"
        );
        let mut config = PlacerConfig::default();
        config.nesterov.max_step_length = config.nesterov.min_step_length;
        assert_eq!(
            field_of(validate_config(&config).unwrap_err()),
            "nesterov.max_step_length"
        );
    }
}
