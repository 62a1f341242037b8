//! Configuration types deserialized from `gpl.toml`.
//!
//! Every section carries `#[serde(default)]`, so an empty file yields the
//! stock configuration.

use serde::{Deserialize, Serialize};

/// The complete placer configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacerConfig {
    /// Settings for the quadratic initial placement.
    pub initial_place: InitialPlaceConfig,
    /// Settings for the Nesterov optimizer and the density model.
    pub nesterov: NesterovConfig,
    /// Routability-driven inflation settings.
    pub routability: RoutabilityConfig,
    /// Timing-driven net reweighting settings.
    pub timing: TimingConfig,
    /// Observer hook settings.
    pub debug: DebugConfig,
    /// Runs every kernel on the sequential backend even when threads are available.
    pub force_sequential: bool,
    /// Treats IO instances as fixed boundary anchors only.
    pub skip_io: bool,
}

/// Settings for the bound-to-bound initial placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitialPlaceConfig {
    /// Number of outer build-and-solve rounds.
    pub max_iter: usize,
    /// Minimum pin span used when weighting a connection, in database units.
    pub min_diff_length: f64,
    /// BiCGSTAB iteration cap per solve.
    pub max_solver_iter: usize,
    /// Nets with more pins than this are left out of the system.
    pub max_fanout: usize,
    /// Global multiplier on every connection weight.
    pub net_weight_scale: f64,
    /// Relative residual the linear solver aims for.
    pub solver_tolerance: f64,
    /// Outer rounds stop early once the worst residual drops below this.
    pub convergence_error: f64,
}

impl Default for InitialPlaceConfig {
    fn default() -> Self {
        Self {
            max_iter: 20,
            min_diff_length: 1500.0,
            max_solver_iter: 100,
            max_fanout: 200,
            net_weight_scale: 800.0,
            solver_tolerance: 1e-6,
            convergence_error: 1e-5,
        }
    }
}

/// Settings for the Nesterov optimizer and the bin grid it spreads over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NesterovConfig {
    /// Iteration cap.
    pub max_iter: usize,
    /// Bin count along x; `0` picks a size from the average instance area.
    pub bin_grid_x: usize,
    /// Bin count along y; `0` picks a size from the average instance area.
    pub bin_grid_y: usize,
    /// Fraction of each bin's free area that movable instances may fill.
    pub target_density: f64,
    /// Derive a single target from movable area over free core area.
    pub uniform_target_density: bool,
    /// The run succeeds once global overflow drops to this value.
    pub target_overflow: f64,
    /// Multiplier applied to the gradient-norm ratio that seeds the density penalty.
    pub init_density_penalty: f64,
    /// Base weighted-average wirelength coefficient, per average bin side.
    pub init_wirelength_coef: f64,
    /// Lower bound on the per-iteration penalty multiplier.
    pub min_phi_coef: f64,
    /// Upper bound on the per-iteration penalty multiplier.
    pub max_phi_coef: f64,
    /// HPWL delta that maps to one decade of penalty growth.
    pub reference_hpwl: f64,
    /// Backtracking attempts per iteration.
    pub max_back_track: usize,
    /// Scale of the synthetic previous point used to estimate the first step.
    pub initial_prev_coordi_update_coef: f64,
    /// How many times the synthetic previous point may be rescaled after a NaN step.
    pub max_recursion_init_slp_coef: usize,
    /// Smallest step length the optimizer accepts.
    pub min_step_length: f64,
    /// Largest step length the optimizer accepts.
    pub max_step_length: f64,
    /// Extra width added on the left of every movable instance for density.
    pub pad_left: f64,
    /// Extra width added on the right of every movable instance for density.
    pub pad_right: f64,
}

impl Default for NesterovConfig {
    fn default() -> Self {
        Self {
            max_iter: 5000,
            bin_grid_x: 0,
            bin_grid_y: 0,
            target_density: 1.0,
            uniform_target_density: false,
            target_overflow: 0.1,
            init_density_penalty: 8e-5,
            init_wirelength_coef: 0.25,
            min_phi_coef: 0.95,
            max_phi_coef: 1.05,
            reference_hpwl: 4.46e8,
            max_back_track: 10,
            initial_prev_coordi_update_coef: 100.0,
            max_recursion_init_slp_coef: 10,
            min_step_length: 1e-9,
            max_step_length: 1e12,
            pad_left: 0.0,
            pad_right: 0.0,
        }
    }
}

/// Settings for routability-driven cell inflation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutabilityConfig {
    /// Enables routability feedback.
    pub enabled: bool,
    /// Overflow at or below which the router is consulted.
    pub check_overflow: f64,
    /// Ceiling for target density raises.
    pub max_density: f64,
    /// Number of times the target density may be raised.
    pub max_bloat_iter: usize,
    /// Number of router calls that may inflate instances.
    pub max_inflation_iter: usize,
    /// Inflation stops once the RC metric falls below this value.
    pub target_rc_metric: f64,
    /// Exponent applied to tile congestion to get an inflation ratio.
    pub inflation_ratio_coef: f64,
    /// Cap on a single inflation ratio and on the cumulative ratio.
    pub max_inflation_ratio: f64,
    /// Weight of the top 0.5% tile average in the RC metric.
    pub rc_k1: f64,
    /// Weight of the top 1% tile average in the RC metric.
    pub rc_k2: f64,
    /// Weight of the top 2% tile average in the RC metric.
    pub rc_k3: f64,
    /// Weight of the top 5% tile average in the RC metric.
    pub rc_k4: f64,
}

impl Default for RoutabilityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            check_overflow: 0.2,
            max_density: 0.99,
            max_bloat_iter: 1,
            max_inflation_iter: 4,
            target_rc_metric: 1.25,
            inflation_ratio_coef: 2.5,
            max_inflation_ratio: 2.5,
            rc_k1: 1.0,
            rc_k2: 1.0,
            rc_k3: 0.0,
            rc_k4: 0.0,
        }
    }
}

impl RoutabilityConfig {
    /// The four RC coefficients in top-percentage order.
    pub fn rc_coefficients(&self) -> [f64; 4] {
        [self.rc_k1, self.rc_k2, self.rc_k3, self.rc_k4]
    }
}

/// Settings for timing-driven net reweighting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Enables timing feedback.
    pub enabled: bool,
    /// Overflow checkpoints, in percent, at which slack is queried.
    pub net_weight_overflows: Vec<u32>,
    /// Upper bound on any net weight after reweighting.
    pub net_weight_max: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            net_weight_overflows: vec![79, 64, 49, 29, 21, 15],
            net_weight_max: 1.9,
        }
    }
}

/// Settings for the optional placement observer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugConfig {
    /// Enables observer callbacks.
    pub enabled: bool,
    /// The observer is paused every this many iterations.
    pub pause_iterations: usize,
    /// The observer receives a frame every this many iterations.
    pub update_iterations: usize,
    /// Include per-bin density in frames.
    pub draw_bins: bool,
    /// Also observe the initial placement rounds.
    pub initial: bool,
    /// Name of a single instance to highlight.
    pub instance: Option<String>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pause_iterations: 10,
            update_iterations: 10,
            draw_bins: false,
            initial: false,
            instance: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PlacerConfig::default();
        assert_eq!(config.initial_place.max_iter, 20);
        assert_eq!(config.nesterov.max_iter, 5000);
        assert_eq!(config.nesterov.target_overflow, 0.1);
        assert_eq!(config.routability.rc_coefficients(), [1.0, 1.0, 0.0, 0.0]);
        assert_eq!(config.timing.net_weight_overflows, vec![79, 64, 49, 29, 21, 15]);
        assert!(!config.force_sequential);
        assert!(config.debug.instance.is_none());
    }

    #[test]
    fn json_roundtrip() {
        let mut config = PlacerConfig::default();
        config.nesterov.target_density = 0.7;
        config.debug.instance = Some("u_core/alu0".to_string());
        let json = serde_json::to_string(&config).unwrap();
        let back: PlacerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
