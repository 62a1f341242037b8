//! RUDY (rectangular uniform wire density) congestion estimator.
//!
//! Each net is assumed to spread its wiring uniformly over its bounding box:
//! horizontal demand density `1 / h` and vertical demand density `1 / w`.
//! Bin demand is compared against a per-direction track capacity.

use crate::density::BinGrid;
use crate::error::EngineError;
use crate::geom::Rect;
use crate::model::PlacementView;
use crate::routability::{CongestionMap, GlobalRouter};

/// A routing-free congestion estimate usable as a [`GlobalRouter`].
#[derive(Clone, Debug)]
pub struct RudyEstimator {
    horizontal_pitch: f64,
    vertical_pitch: f64,
}

impl RudyEstimator {
    /// Creates an estimator with the given routing track pitches.
    pub fn new(horizontal_pitch: f64, vertical_pitch: f64) -> Self {
        Self {
            horizontal_pitch,
            vertical_pitch,
        }
    }
}

impl GlobalRouter for RudyEstimator {
    fn estimate_congestion(
        &mut self,
        view: &PlacementView<'_>,
        grid: &BinGrid,
    ) -> Result<CongestionMap, EngineError> {
        if !(self.horizontal_pitch > 0.0 && self.vertical_pitch > 0.0) {
            return Err(EngineError::new("track pitch must be positive"));
        }
        let mut h_demand = vec![0.0; grid.bin_count()];
        let mut v_demand = vec![0.0; grid.bin_count()];

        for net in 0..view.net_count() {
            let Some(bbox) = view.net_bbox(net) else {
                continue;
            };
            if view.net_pin_locations(net).nth(1).is_none() {
                continue;
            }
            // Degenerate boxes are widened to one bin so they still carry demand.
            let w = bbox.width().max(grid.bin_width());
            let h = bbox.height().max(grid.bin_height());
            let c = bbox.center();
            let rect = Rect::new(c.x - 0.5 * w, c.y - 0.5 * h, c.x + 0.5 * w, c.y + 0.5 * h);
            let weight = view.net_weight(net);

            let (xs, ys) = grid.overlapping(&rect);
            for iy in ys {
                for ix in xs.clone() {
                    let overlap = grid.bin_rect(ix, iy).overlap_area(&rect);
                    if overlap <= 0.0 {
                        continue;
                    }
                    let b = grid.index(ix, iy);
                    h_demand[b] += weight * overlap / h;
                    v_demand[b] += weight * overlap / w;
                }
            }
        }

        for iy in 0..grid.ny() {
            for ix in 0..grid.nx() {
                let b = grid.index(ix, iy);
                let area = grid.bin_area(ix, iy);
                h_demand[b] /= area / self.horizontal_pitch;
                v_demand[b] /= area / self.vertical_pitch;
            }
        }

        CongestionMap::new(grid.nx(), grid.ny(), h_demand, v_demand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Design, Instance};
    use crate::model::PlacementModel;

    #[test]
    fn long_horizontal_net_loads_its_row() {
        let mut d = Design::new("top", Rect::new(0.0, 0.0, 40.0, 40.0));
        let a = d.add_instance(Instance::new("a", 1.0, 1.0).at(1.5, 4.5));
        let b = d.add_instance(Instance::new("b", 1.0, 1.0).at(37.5, 4.5));
        d.connect("n", &[a, b]);
        let model = PlacementModel::from_db(&d, false).unwrap();
        let grid = BinGrid::new(d.core, 4, 4);

        let mut rudy = RudyEstimator::new(1.0, 1.0);
        let map = rudy.estimate_congestion(&model.view(), &grid).unwrap();

        // Box is 36 wide, widened to 10 tall: the bottom row carries it.
        assert!(map.tile(grid.index(1, 0)) > 0.0);
        assert_eq!(map.tile(grid.index(1, 3)), 0.0);
        // One horizontal track per unit height over a 10-high band: 0.1 per bin.
        assert!((map.tile(grid.index(1, 0)) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_pitch() {
        let d = Design::new("top", Rect::new(0.0, 0.0, 10.0, 10.0));
        let model = PlacementModel::from_db(&d, false).unwrap();
        let grid = BinGrid::new(d.core, 2, 2);
        let mut rudy = RudyEstimator::new(0.0, 1.0);
        assert!(rudy.estimate_congestion(&model.view(), &grid).is_err());
    }
}
