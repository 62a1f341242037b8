//! The density model: bin occupancy, overflow and the spreading force.
//!
//! Movable instances are treated as positive charges. Each update scatters
//! their padded rectangles onto the [`BinGrid`] to measure the excess over the
//! target density. The charge density fed to the field solve uses footprints
//! stretched to at least `√2` bins so small cells always see a smooth field.
//! The density gradient of an instance is the field integrated over its
//! stretched footprint.

mod grid;
mod poisson;

pub use grid::{BinGrid, MAX_BINS_PER_AXIS};
pub use poisson::{Field, PoissonSolver};

use crate::backend::Backend;
use crate::geom::{Point, Rect, Size};
use crate::model::Netlist;
use gpl_config::NesterovConfig;
use std::f64::consts::SQRT_2;

/// A movable instance that charges the density grid.
#[derive(Clone, Copy, Debug)]
struct Charge {
    inst: usize,
    weight: f64,
}

/// The footprint one charge puts on the grid.
#[derive(Clone, Copy, Debug)]
struct Footprint {
    rect: Rect,
    scale: f64,
}

/// Occupancy and electrostatics over a bin grid.
#[derive(Debug, Clone)]
pub struct DensityModel {
    grid: BinGrid,
    backend: Backend,
    solver: PoissonSolver,
    charges: Vec<Charge>,
    pad_left: f64,
    pad_right: f64,
    target_density: f64,
    uniform: bool,
    uniform_target: f64,
    fixed_area: Vec<f64>,
    /// Padded instance area per bin, before stretching.
    movable_area: Vec<f64>,
    /// Stretched footprint area per bin.
    smoothed_area: Vec<f64>,
    rho: Vec<f64>,
    field: Field,
    overflow: f64,
    total_movable_area: f64,
}

impl DensityModel {
    /// Builds the model for `netlist` on `grid` with `sizes` as density sizes.
    ///
    /// Fixed instances that charge density are rasterized once here.
    pub fn new(
        netlist: &Netlist,
        centers: &[Point],
        sizes: &[Size],
        grid: BinGrid,
        config: &NesterovConfig,
        backend: Backend,
    ) -> Self {
        let mut fixed_area = vec![0.0; grid.bin_count()];
        for (i, inst) in netlist.instances().iter().enumerate() {
            if !inst.fixed || !inst.charges_density {
                continue;
            }
            let rect = Rect::centered(centers[i], inst.size);
            let (xs, ys) = grid.overlapping(&rect);
            for iy in ys {
                for ix in xs.clone() {
                    fixed_area[grid.index(ix, iy)] += grid.bin_rect(ix, iy).overlap_area(&rect);
                }
            }
        }
        for iy in 0..grid.ny() {
            for ix in 0..grid.nx() {
                let b = grid.index(ix, iy);
                fixed_area[b] = fixed_area[b].min(grid.bin_area(ix, iy));
            }
        }

        let charges = netlist
            .movable()
            .iter()
            .filter(|&&i| netlist.instances()[i].charges_density)
            .map(|&i| Charge {
                inst: i,
                weight: netlist.instances()[i].density_weight,
            })
            .collect();

        let solver = PoissonSolver::new(grid.nx(), grid.ny(), grid.bin_width(), grid.bin_height());
        let bins = grid.bin_count();
        let mut model = Self {
            grid,
            backend,
            solver,
            charges,
            pad_left: config.pad_left,
            pad_right: config.pad_right,
            target_density: config.target_density,
            uniform: config.uniform_target_density,
            uniform_target: config.target_density,
            fixed_area,
            movable_area: vec![0.0; bins],
            smoothed_area: vec![0.0; bins],
            rho: vec![0.0; bins],
            field: Field::default(),
            overflow: 0.0,
            total_movable_area: 0.0,
        };
        model.total_movable_area = model.charge_area(sizes);
        model.uniform_target = model.compute_uniform_target();
        model
    }

    /// The bin grid.
    pub fn grid(&self) -> &BinGrid {
        &self.grid
    }

    /// The configured target density.
    pub fn target_density(&self) -> f64 {
        self.target_density
    }

    /// Replaces the configured target density.
    pub fn set_target_density(&mut self, target: f64) {
        self.target_density = target;
    }

    /// Switches uniform target density mode.
    pub fn set_uniform(&mut self, uniform: bool) {
        self.uniform = uniform;
    }

    /// The density applied in uniform mode: movable area over free core
    /// area, rounded up to the next hundredth and capped at 1.
    pub fn uniform_target_density(&self) -> f64 {
        self.uniform_target
    }

    /// The target actually applied to every bin.
    pub fn effective_target(&self) -> f64 {
        if self.uniform {
            self.uniform_target_density()
        } else {
            self.target_density
        }
    }

    /// Global overflow from the last update.
    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Total area charged by movable instances, after padding and inflation.
    pub fn total_movable_area(&self) -> f64 {
        self.total_movable_area
    }

    /// Total fixed area inside the core.
    pub fn total_fixed_area(&self) -> f64 {
        self.fixed_area.iter().sum()
    }

    /// Per-bin utilization `(movable + fixed) / bin area` from the last update.
    pub fn bin_utilization(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.grid.bin_count());
        for iy in 0..self.grid.ny() {
            for ix in 0..self.grid.nx() {
                let b = self.grid.index(ix, iy);
                out.push((self.movable_area[b] + self.fixed_area[b]) / self.grid.bin_area(ix, iy));
            }
        }
        out
    }

    /// Per-instance density area, used by the preconditioner.
    pub fn instance_charge(&self, sizes: &[Size]) -> Vec<f64> {
        let mut out = vec![0.0; sizes.len()];
        for c in &self.charges {
            out[c.inst] = self.padded(sizes[c.inst]).area() * c.weight;
        }
        out
    }

    /// Recomputes occupancy and overflow only.
    pub fn update_occupancy(&mut self, centers: &[Point], sizes: &[Size]) {
        self.total_movable_area = self.charge_area(sizes);
        // Scattered sequentially so bin sums do not depend on the backend.
        let real = self.padded_rects(centers, sizes);
        scatter(&self.grid, &real, &mut self.movable_area);
        let smoothed = self.footprints(centers, sizes);
        scatter(&self.grid, &smoothed, &mut self.smoothed_area);

        let target = self.effective_target();
        let mut excess = 0.0;
        for iy in 0..self.grid.ny() {
            for ix in 0..self.grid.nx() {
                let b = self.grid.index(ix, iy);
                let area = self.grid.bin_area(ix, iy);
                let capacity = target * (area - self.fixed_area[b]);
                excess += (self.movable_area[b] - capacity).max(0.0);
                self.rho[b] = (self.smoothed_area[b] + self.fixed_area[b]) / area;
            }
        }
        self.overflow = if self.total_movable_area > 0.0 {
            excess / self.total_movable_area
        } else {
            0.0
        };
    }

    /// Recomputes occupancy, overflow and the electric field.
    pub fn update(&mut self, centers: &[Point], sizes: &[Size]) {
        self.update_occupancy(centers, sizes);
        self.field = self.solver.solve(&self.rho, self.backend);
    }

    /// Density gradient of every instance; zero for instances without charge.
    pub fn gradient(&self, centers: &[Point], sizes: &[Size]) -> Vec<Point> {
        let footprints = self.footprints(centers, sizes);
        let per_charge = self.backend.map(footprints.len(), |k| {
            let fp = footprints[k];
            let (xs, ys) = self.grid.overlapping(&fp.rect);
            let mut g = Point::default();
            for iy in ys {
                for ix in xs.clone() {
                    let overlap = self.grid.bin_rect(ix, iy).overlap_area(&fp.rect) * fp.scale;
                    let b = self.grid.index(ix, iy);
                    g.x -= overlap * self.field.x[b];
                    g.y -= overlap * self.field.y[b];
                }
            }
            g
        });
        let mut out = vec![Point::default(); centers.len()];
        for (c, g) in self.charges.iter().zip(per_charge) {
            out[c.inst] = g;
        }
        out
    }

    /// Raises the applied target density; never lowers it.
    pub(crate) fn raise_target(&mut self, target: f64) {
        if self.uniform {
            self.uniform_target = self.uniform_target.max(target);
        } else {
            self.target_density = self.target_density.max(target);
        }
    }

    fn padded(&self, size: Size) -> Size {
        Size::new(size.width + self.pad_left + self.pad_right, size.height)
    }

    fn charge_area(&self, sizes: &[Size]) -> f64 {
        self.charges
            .iter()
            .map(|c| self.padded(sizes[c.inst]).area() * c.weight)
            .sum()
    }

    /// Padded rectangles at their true size.
    fn padded_rects(&self, centers: &[Point], sizes: &[Size]) -> Vec<Footprint> {
        let shift = 0.5 * (self.pad_right - self.pad_left);
        self.charges
            .iter()
            .map(|c| {
                let center = Point::new(centers[c.inst].x + shift, centers[c.inst].y);
                Footprint {
                    rect: Rect::centered(center, self.padded(sizes[c.inst])),
                    scale: c.weight,
                }
            })
            .collect()
    }

    fn footprints(&self, centers: &[Point], sizes: &[Size]) -> Vec<Footprint> {
        let core = self.grid.core();
        let min_w = SQRT_2 * self.grid.bin_width();
        let min_h = SQRT_2 * self.grid.bin_height();
        self.charges
            .iter()
            .map(|c| {
                let padded = self.padded(sizes[c.inst]);
                let shift = 0.5 * (self.pad_right - self.pad_left);
                let center = Point::new(centers[c.inst].x + shift, centers[c.inst].y);
                let w = padded.width.max(min_w);
                let h = padded.height.max(min_h);
                let scale = if w * h > 0.0 {
                    padded.area() / (w * h) * c.weight
                } else {
                    0.0
                };
                Footprint {
                    rect: shift_inside(Rect::centered(center, Size::new(w, h)), core),
                    scale,
                }
            })
            .collect()
    }

    fn compute_uniform_target(&self) -> f64 {
        let whitespace = self.grid.core().area() - self.total_fixed_area();
        if whitespace <= 0.0 {
            return 1.0;
        }
        let ratio = self.total_movable_area / whitespace;
        ((ratio * 100.0).ceil() / 100.0).clamp(0.01, 1.0)
    }
}

fn scatter(grid: &BinGrid, footprints: &[Footprint], out: &mut [f64]) {
    out.iter_mut().for_each(|a| *a = 0.0);
    for fp in footprints {
        let (xs, ys) = grid.overlapping(&fp.rect);
        for iy in ys {
            for ix in xs.clone() {
                let overlap = grid.bin_rect(ix, iy).overlap_area(&fp.rect);
                out[grid.index(ix, iy)] += overlap * fp.scale;
            }
        }
    }
}

/// Moves `r` so it lies inside `core` where it fits; keeps its size.
fn shift_inside(r: Rect, core: Rect) -> Rect {
    let dx = if r.width() > core.width() {
        core.center().x - r.center().x
    } else if r.lx < core.lx {
        core.lx - r.lx
    } else if r.ux > core.ux {
        core.ux - r.ux
    } else {
        0.0
    };
    let dy = if r.height() > core.height() {
        core.center().y - r.center().y
    } else if r.ly < core.ly {
        core.ly - r.ly
    } else if r.uy > core.uy {
        core.uy - r.uy
    } else {
        0.0
    };
    Rect::new(r.lx + dx, r.ly + dy, r.ux + dx, r.uy + dy)
}
