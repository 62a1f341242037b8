//! Routability feedback: congestion-driven instance inflation.
//!
//! Once the optimizer has spread the design far enough, an external router
//! estimates per-bin congestion. If the RC metric (a weighted mix of the
//! average congestion of the worst 0.5%, 1%, 2% and 5% of tiles) is above
//! target, instances sitting in congested bins are inflated so the density
//! force pushes their neighbours away. Positions are never touched here.

use crate::density::{BinGrid, DensityModel};
use crate::error::{EngineError, Phase, PlaceError, PlaceResult};
use crate::geom::Size;
use crate::model::{PlacementModel, PlacementView};
use gpl_config::RoutabilityConfig;
use gpl_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};

const ROUTABILITY_CHECK: DiagnosticCode = DiagnosticCode::new(Category::Routability, 201);
const INFLATION_APPLIED: DiagnosticCode = DiagnosticCode::new(Category::Routability, 202);
const ROUTABILITY_DONE: DiagnosticCode = DiagnosticCode::new(Category::Routability, 203);
pub(crate) const ENGINE_FAILURE: DiagnosticCode = DiagnosticCode::new(Category::Error, 401);

/// Tile fractions averaged for the RC metric, matching the four coefficients.
const TOP_FRACTIONS: [f64; 4] = [0.005, 0.01, 0.02, 0.05];

/// Per-bin routing congestion, usage over capacity.
#[derive(Clone, Debug, PartialEq)]
pub struct CongestionMap {
    nx: usize,
    ny: usize,
    horizontal: Vec<f64>,
    vertical: Vec<f64>,
}

impl CongestionMap {
    /// Builds a map from per-bin horizontal and vertical congestion in
    /// `iy * nx + ix` order.
    pub fn new(
        nx: usize,
        ny: usize,
        horizontal: Vec<f64>,
        vertical: Vec<f64>,
    ) -> Result<Self, EngineError> {
        if horizontal.len() != nx * ny || vertical.len() != nx * ny {
            return Err(EngineError::new(format!(
                "congestion map of {nx}x{ny} bins needs {} entries per direction",
                nx * ny
            )));
        }
        Ok(Self {
            nx,
            ny,
            horizontal,
            vertical,
        })
    }

    /// Bins along x.
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Bins along y.
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Congestion of bin `b`: the worse of its two directions.
    pub fn tile(&self, b: usize) -> f64 {
        self.horizontal[b].max(self.vertical[b])
    }

    /// The RC metric for the given four coefficients.
    pub fn rc_metric(&self, k: [f64; 4]) -> f64 {
        let mut tiles: Vec<f64> = (0..self.nx * self.ny).map(|b| self.tile(b)).collect();
        tiles.sort_by(|a, b| b.total_cmp(a));

        let mut weighted = 0.0;
        for (frac, coef) in TOP_FRACTIONS.iter().zip(k) {
            let count = ((frac * tiles.len() as f64).ceil() as usize).clamp(1, tiles.len().max(1));
            let avg = tiles.iter().take(count).sum::<f64>() / count as f64;
            weighted += coef * avg;
        }
        let total: f64 = k.iter().sum();
        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    }
}

/// Estimates routing congestion for the current placement.
pub trait GlobalRouter: Send {
    /// Returns congestion on exactly the bins of `grid`.
    fn estimate_congestion(
        &mut self,
        view: &PlacementView<'_>,
        grid: &BinGrid,
    ) -> Result<CongestionMap, EngineError>;
}

/// What a routability step did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RoutabilityEvent {
    /// Not due yet, or already finished.
    Idle,
    /// Instances were inflated; overflow must be recomputed.
    Inflated {
        /// RC metric that triggered the inflation.
        rc: f64,
        /// Number of instances that grew.
        instances: usize,
    },
    /// The RC metric met its target or the inflation budget ran out.
    Finished {
        /// Last RC metric measured.
        rc: f64,
    },
}

/// Routability feedback state for one run.
pub struct RoutabilityFeedback {
    config: RoutabilityConfig,
    router: Box<dyn GlobalRouter>,
    cumulative: Vec<f64>,
    inflation_iters: usize,
    bloat_iters: usize,
    router_calls: usize,
    finished: bool,
}

impl RoutabilityFeedback {
    /// Creates feedback for a model with `instances` instances.
    pub fn new(config: RoutabilityConfig, router: Box<dyn GlobalRouter>, instances: usize) -> Self {
        let finished = config.max_inflation_iter == 0;
        Self {
            config,
            router,
            cumulative: vec![1.0; instances],
            inflation_iters: 0,
            bloat_iters: 0,
            router_calls: 0,
            finished,
        }
    }

    /// Number of router invocations so far.
    pub fn router_calls(&self) -> usize {
        self.router_calls
    }

    /// Whether no further router calls will happen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Overflow at or below which the router is consulted.
    pub fn check_overflow(&self) -> f64 {
        self.config.check_overflow
    }

    pub(crate) fn into_router(self) -> Box<dyn GlobalRouter> {
        self.router
    }

    /// Runs one check at the given overflow.
    pub fn step(
        &mut self,
        model: &PlacementModel,
        density: &mut DensityModel,
        overflow: f64,
        iteration: usize,
        sink: &DiagnosticSink,
    ) -> PlaceResult<RoutabilityEvent> {
        if self.finished || overflow > self.config.check_overflow {
            return Ok(RoutabilityEvent::Idle);
        }

        self.router_calls += 1;
        let estimate = {
            let view = model.view();
            self.router.estimate_congestion(&view, density.grid())
        };
        let map = estimate
            .and_then(|map| {
                let grid = density.grid();
                if map.nx() == grid.nx() && map.ny() == grid.ny() {
                    Ok(map)
                } else {
                    Err(EngineError::new(format!(
                        "router returned {}x{} bins for a {}x{} grid",
                        map.nx(),
                        map.ny(),
                        grid.nx(),
                        grid.ny()
                    )))
                }
            })
            .map_err(|err| {
                sink.emit(
                    Diagnostic::error(ENGINE_FAILURE, format!("global router failed: {err}"))
                        .at_iteration(iteration),
                );
                PlaceError::engine(Phase::Routability, err)
            })?;

        let rc = map.rc_metric(self.config.rc_coefficients());
        sink.emit(
            Diagnostic::note(
                ROUTABILITY_CHECK,
                format!("routability check at overflow {overflow:.4}: RC {rc:.4}"),
            )
            .at_iteration(iteration),
        );

        if rc < self.config.target_rc_metric {
            self.finish(rc, iteration, "RC metric below target", sink);
            return Ok(RoutabilityEvent::Finished { rc });
        }

        let instances = self.inflate(model, density, &map);
        self.inflation_iters += 1;

        let mut note = None;
        if self.bloat_iters < self.config.max_bloat_iter {
            let netlist = model.netlist();
            let original = netlist.movable_area();
            let sizes = model.sizes();
            let inflated: f64 = netlist.movable().iter().map(|&i| sizes[i].area()).sum();
            if original > 0.0 {
                let current = density.effective_target();
                let target = (current * inflated / original).min(self.config.max_density);
                if target > current {
                    density.raise_target(target);
                    self.bloat_iters += 1;
                    note = Some(format!("target density raised to {target:.4}"));
                }
            }
        }

        let mut diag = Diagnostic::note(
            INFLATION_APPLIED,
            format!("inflated {instances} instances in congested bins (RC {rc:.4})"),
        )
        .at_iteration(iteration);
        if let Some(note) = note {
            diag = diag.with_note(note);
        }
        sink.emit(diag);

        if self.inflation_iters >= self.config.max_inflation_iter {
            self.finish(rc, iteration, "inflation limit reached", sink);
        }
        Ok(RoutabilityEvent::Inflated { rc, instances })
    }

    fn inflate(&mut self, model: &PlacementModel, density: &DensityModel, map: &CongestionMap) -> usize {
        let grid = density.grid();
        let centers = model.centers();
        let netlist = model.netlist();
        let mut count = 0;
        for &i in netlist.movable() {
            let (ix, iy) = grid.bin_at(centers[i]);
            let congestion = map.tile(grid.index(ix, iy));
            if !(congestion > 1.0) {
                continue;
            }
            let ratio = congestion
                .powf(self.config.inflation_ratio_coef)
                .min(self.config.max_inflation_ratio);
            let next = (self.cumulative[i] * ratio).min(self.config.max_inflation_ratio);
            if next <= self.cumulative[i] {
                continue;
            }
            self.cumulative[i] = next;
            let base = netlist.instances()[i].size;
            let scale = next.sqrt();
            model.set_size(i, Size::new(base.width * scale, base.height * scale));
            count += 1;
        }
        count
    }

    fn finish(&mut self, rc: f64, iteration: usize, reason: &str, sink: &DiagnosticSink) {
        self.finished = true;
        sink.emit(
            Diagnostic::note(
                ROUTABILITY_DONE,
                format!("routability feedback finished: {reason} (RC {rc:.4})"),
            )
            .at_iteration(iteration),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::design::{Design, Instance};
    use crate::geom::Rect;
    use gpl_config::NesterovConfig;

    struct HotSpot {
        value: f64,
    }

    impl GlobalRouter for HotSpot {
        fn estimate_congestion(
            &mut self,
            _view: &PlacementView<'_>,
            grid: &BinGrid,
        ) -> Result<CongestionMap, EngineError> {
            let n = grid.bin_count();
            let mut h = vec![0.5; n];
            h[0] = self.value;
            CongestionMap::new(grid.nx(), grid.ny(), h, vec![0.5; n])
        }
    }

    struct Broken;

    impl GlobalRouter for Broken {
        fn estimate_congestion(
            &mut self,
            _view: &PlacementView<'_>,
            _grid: &BinGrid,
        ) -> Result<CongestionMap, EngineError> {
            Err(EngineError::new("license unavailable"))
        }
    }

    fn setup() -> (PlacementModel, DensityModel) {
        let mut d = Design::new("top", Rect::new(0.0, 0.0, 40.0, 40.0));
        d.add_instance(Instance::new("hot", 2.0, 2.0).at(1.0, 1.0));
        d.add_instance(Instance::new("cold", 2.0, 2.0).at(30.0, 30.0));
        let model = PlacementModel::from_db(&d, false).unwrap();
        let density = DensityModel::new(
            model.netlist(),
            &model.centers(),
            &model.sizes(),
            BinGrid::new(d.core, 4, 4),
            &NesterovConfig {
                target_density: 0.5,
                ..NesterovConfig::default()
            },
            Backend::Sequential,
        );
        (model, density)
    }

    #[test]
    fn rc_metric_averages_top_tiles() {
        let mut h = vec![1.0; 200];
        h[0] = 3.0;
        let map = CongestionMap::new(20, 10, h, vec![0.0; 200]).unwrap();
        // top 0.5% and 1% of 200 tiles: 1 and 2 tiles
        assert!((map.rc_metric([1.0, 0.0, 0.0, 0.0]) - 3.0).abs() < 1e-12);
        assert!((map.rc_metric([0.0, 1.0, 0.0, 0.0]) - 2.0).abs() < 1e-12);
        assert!((map.rc_metric([1.0, 1.0, 0.0, 0.0]) - 2.5).abs() < 1e-12);
        assert!(CongestionMap::new(2, 2, vec![0.0; 3], vec![0.0; 4]).is_err());
    }

    #[test]
    fn idle_above_check_overflow() {
        let (model, mut density) = setup();
        let sink = DiagnosticSink::new();
        let mut fb = RoutabilityFeedback::new(
            RoutabilityConfig::default(),
            Box::new(HotSpot { value: 2.0 }),
            2,
        );
        let event = fb.step(&model, &mut density, 0.5, 3, &sink).unwrap();
        assert_eq!(event, RoutabilityEvent::Idle);
        assert_eq!(fb.router_calls(), 0);
    }

    #[test]
    fn inflates_hot_instances_and_bloats_target() {
        let (model, mut density) = setup();
        let sink = DiagnosticSink::new();
        let config = RoutabilityConfig {
            enabled: true,
            target_rc_metric: 1.0,
            max_inflation_iter: 1,
            ..RoutabilityConfig::default()
        };
        let mut fb = RoutabilityFeedback::new(config, Box::new(HotSpot { value: 2.0 }), 2);
        let event = fb.step(&model, &mut density, 0.1, 7, &sink).unwrap();
        assert!(matches!(event, RoutabilityEvent::Inflated { instances: 1, .. }));

        // 2^2.5 exceeds the cap, so the area ratio is exactly 2.5.
        let sizes = model.sizes();
        assert!((sizes[0].area() - 4.0 * 2.5).abs() < 1e-9);
        assert_eq!(sizes[1], Size::new(2.0, 2.0));
        assert_eq!(model.centers()[0].x, 2.0);

        // movable area 8 -> 14, target 0.5 -> 0.875
        assert!((density.target_density() - 0.875).abs() < 1e-9);
        assert!(fb.is_finished());
        assert!(sink.contains_code(202));
        assert!(sink.contains_code(203));
        assert_eq!(
            fb.step(&model, &mut density, 0.1, 8, &sink).unwrap(),
            RoutabilityEvent::Idle
        );
    }

    #[test]
    fn finishes_when_rc_is_met() {
        let (model, mut density) = setup();
        let sink = DiagnosticSink::new();
        let mut fb = RoutabilityFeedback::new(
            RoutabilityConfig::default(),
            Box::new(HotSpot { value: 0.9 }),
            2,
        );
        let event = fb.step(&model, &mut density, 0.1, 1, &sink).unwrap();
        assert!(matches!(event, RoutabilityEvent::Finished { .. }));
        assert_eq!(model.sizes()[0], Size::new(2.0, 2.0));
    }

    #[test]
    fn router_failure_aborts() {
        let (model, mut density) = setup();
        let sink = DiagnosticSink::new();
        let mut fb =
            RoutabilityFeedback::new(RoutabilityConfig::default(), Box::new(Broken), 2);
        let err = fb.step(&model, &mut density, 0.0, 1, &sink).unwrap_err();
        assert!(matches!(
            err,
            PlaceError::ExternalEngine {
                phase: Phase::Routability,
                ..
            }
        ));
        assert!(sink.has_errors());
    }
}
