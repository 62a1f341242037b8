//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use gpl_config::PlacerConfig;
use gpl_place::{
    BinGrid, CongestionMap, Design, EngineError, GlobalRouter, InstId, Instance, NetSlack,
    ObserverFrame, PlacementObserver, PlacementView, Point, Rect, RudyEstimator, TimingEngine,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Six 12x12 cells chained between two fixed pads in the lower-left corner
/// of a 40x40 core. Quadratic placement piles every cell into one bin.
pub fn benchmark() -> Design {
    let mut d = Design::new("bench8", Rect::new(0.0, 0.0, 40.0, 40.0));
    let west = d.add_instance(Instance::new("west", 2.0, 2.0).at(0.0, 0.0).fixed());
    let east = d.add_instance(Instance::new("east", 2.0, 2.0).at(10.0, 0.0).fixed());
    let cells: Vec<InstId> = (0..6)
        .map(|i| d.add_instance(Instance::new(format!("u{i}"), 12.0, 12.0)))
        .collect();
    d.connect("in", &[west, cells[0]]);
    for i in 0..5 {
        d.connect(format!("n{i}"), &[cells[i], cells[i + 1]]);
    }
    d.connect("out", &[cells[5], east]);
    d.connect("fan", &[cells[0], cells[2], cells[4]]);
    d
}

/// An 8x8 grid of 5x5 bins with a moderate iteration cap.
pub fn benchmark_config() -> PlacerConfig {
    let mut config = PlacerConfig::default();
    config.nesterov.bin_grid_x = 8;
    config.nesterov.bin_grid_y = 8;
    config.nesterov.max_iter = 600;
    config
}

/// Overflow of `design` on an `nx x ny` grid, measured on the true instance
/// rectangles: excess movable area over `target` times the free bin area,
/// divided by the total movable area.
pub fn real_overflow(design: &Design, nx: usize, ny: usize, target: f64) -> f64 {
    let grid = BinGrid::new(design.core, nx, ny);
    let mut movable = vec![0.0; grid.bin_count()];
    let mut fixed = vec![0.0; grid.bin_count()];
    let mut total = 0.0;
    for inst in &design.instances {
        let r = Rect::new(
            inst.location.x,
            inst.location.y,
            inst.location.x + inst.width,
            inst.location.y + inst.height,
        );
        let bins = if inst.fixed {
            &mut fixed
        } else {
            total += inst.width * inst.height;
            &mut movable
        };
        for iy in 0..ny {
            for ix in 0..nx {
                bins[grid.index(ix, iy)] += grid.bin_rect(ix, iy).overlap_area(&r);
            }
        }
    }
    let mut excess = 0.0;
    for iy in 0..ny {
        for ix in 0..nx {
            let b = grid.index(ix, iy);
            let area = grid.bin_area(ix, iy);
            excess += (movable[b] - target * (area - fixed[b].min(area))).max(0.0);
        }
    }
    if total > 0.0 {
        excess / total
    } else {
        0.0
    }
}

/// Instance centers in database order.
pub fn centers(design: &Design) -> Vec<Point> {
    design.instances.iter().map(|i| i.center()).collect()
}

/// Asserts every instance lies inside the core with finite coordinates.
pub fn assert_legal_bounds(design: &Design) {
    for inst in &design.instances {
        assert!(inst.location.is_finite(), "{} at {:?}", inst.name, inst.location);
        let r = Rect::new(
            inst.location.x,
            inst.location.y,
            inst.location.x + inst.width,
            inst.location.y + inst.height,
        );
        let core = design.core;
        assert!(
            r.lx >= core.lx - 1e-9
                && r.ly >= core.ly - 1e-9
                && r.ux <= core.ux + 1e-9
                && r.uy <= core.uy + 1e-9,
            "{} outside core: {r:?}",
            inst.name
        );
    }
}

/// Wraps the RUDY estimator and counts calls.
pub struct CountingRouter {
    pub inner: RudyEstimator,
    pub calls: Arc<AtomicUsize>,
}

impl CountingRouter {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Self {
            inner: RudyEstimator::new(0.5, 0.5),
            calls: Arc::clone(&calls),
        };
        (router, calls)
    }
}

impl GlobalRouter for CountingRouter {
    fn estimate_congestion(
        &mut self,
        view: &PlacementView<'_>,
        grid: &BinGrid,
    ) -> Result<CongestionMap, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.estimate_congestion(view, grid)
    }
}

/// A router that always fails.
pub struct BrokenRouter;

impl GlobalRouter for BrokenRouter {
    fn estimate_congestion(
        &mut self,
        _view: &PlacementView<'_>,
        _grid: &BinGrid,
    ) -> Result<CongestionMap, EngineError> {
        Err(EngineError::new("license server unreachable"))
    }
}

/// Reports the first net as violating and every other net as met.
pub struct FirstNetCritical {
    pub calls: Arc<AtomicUsize>,
}

impl TimingEngine for FirstNetCritical {
    fn net_slacks(&mut self, view: &PlacementView<'_>) -> Result<Vec<NetSlack>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..view.net_count())
            .map(|n| NetSlack {
                net: view.net_id(n),
                slack: if n == 0 { -0.4 } else { 0.1 },
            })
            .collect())
    }
}

/// Records the iteration and HPWL of every frame it sees.
#[derive(Clone, Default)]
pub struct Recorder {
    pub frames: Arc<Mutex<Vec<(usize, f64)>>>,
    pub pauses: Arc<AtomicUsize>,
}

impl PlacementObserver for Recorder {
    fn on_update(&mut self, frame: &ObserverFrame<'_>) {
        assert!(frame.centers.iter().all(|c| c.is_finite()));
        self.frames.lock().unwrap().push((frame.iteration, frame.hpwl));
    }

    fn on_pause(&mut self, _frame: &ObserverFrame<'_>) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }
}
