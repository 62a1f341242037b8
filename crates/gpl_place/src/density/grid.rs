//! The uniform bin grid laid over the core area.

use crate::geom::{Point, Rect};

/// Largest bin count along either axis.
pub const MAX_BINS_PER_AXIS: usize = 1024;

/// A uniform `nx x ny` tiling of the core.
///
/// Bin `(ix, iy)` has flat index `iy * nx + ix`. The bins exactly tile the
/// core: the last row and column end on the core boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct BinGrid {
    core: Rect,
    nx: usize,
    ny: usize,
    bin_w: f64,
    bin_h: f64,
}

impl BinGrid {
    /// Creates an `nx x ny` grid over `core`. Zero counts are raised to one.
    pub fn new(core: Rect, nx: usize, ny: usize) -> Self {
        let nx = nx.max(1);
        let ny = ny.max(1);
        Self {
            core,
            nx,
            ny,
            bin_w: core.width() / nx as f64,
            bin_h: core.height() / ny as f64,
        }
    }

    /// Sizes the grid so an average bin holds about one average instance at
    /// `target_density`.
    ///
    /// The square count is the largest power of two whose square does not
    /// exceed the ideal bin count; it is then stretched along the longer core
    /// side by the nearest power of two of the aspect ratio.
    pub fn auto(core: Rect, average_instance_area: f64, target_density: f64) -> Self {
        let ideal_bin_area = average_instance_area / target_density;
        let ideal_count = if ideal_bin_area > 0.0 {
            core.area() / ideal_bin_area
        } else {
            0.0
        };

        let mut count = 2;
        while count < MAX_BINS_PER_AXIS && ((count * 2 * count * 2) as f64) <= ideal_count {
            count *= 2;
        }

        let aspect = core.width() / core.height();
        let stretch = 2usize.pow(aspect.max(1.0 / aspect).log2().round().max(0.0) as u32);
        let (nx, ny) = if aspect >= 1.0 {
            ((count * stretch).min(MAX_BINS_PER_AXIS), count)
        } else {
            (count, (count * stretch).min(MAX_BINS_PER_AXIS))
        };
        Self::new(core, nx, ny)
    }

    /// The core area this grid tiles.
    pub fn core(&self) -> Rect {
        self.core
    }

    /// Bin count along x.
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Bin count along y.
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Total number of bins.
    pub fn bin_count(&self) -> usize {
        self.nx * self.ny
    }

    /// Width of one bin.
    pub fn bin_width(&self) -> f64 {
        self.bin_w
    }

    /// Height of one bin.
    pub fn bin_height(&self) -> f64 {
        self.bin_h
    }

    /// Flat index of bin `(ix, iy)`.
    pub fn index(&self, ix: usize, iy: usize) -> usize {
        iy * self.nx + ix
    }

    /// The rectangle covered by bin `(ix, iy)`.
    pub fn bin_rect(&self, ix: usize, iy: usize) -> Rect {
        let lx = self.core.lx + ix as f64 * self.bin_w;
        let ly = self.core.ly + iy as f64 * self.bin_h;
        let ux = if ix + 1 == self.nx {
            self.core.ux
        } else {
            lx + self.bin_w
        };
        let uy = if iy + 1 == self.ny {
            self.core.uy
        } else {
            ly + self.bin_h
        };
        Rect::new(lx, ly, ux, uy)
    }

    /// Area of bin `(ix, iy)`.
    pub fn bin_area(&self, ix: usize, iy: usize) -> f64 {
        self.bin_rect(ix, iy).area()
    }

    /// The bin containing `p`, clamped to the grid.
    pub fn bin_at(&self, p: Point) -> (usize, usize) {
        (
            axis_bin(p.x - self.core.lx, self.bin_w, self.nx),
            axis_bin(p.y - self.core.ly, self.bin_h, self.ny),
        )
    }

    /// Half-open index ranges of the bins a rectangle may overlap.
    pub fn overlapping(&self, r: &Rect) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let x0 = axis_bin(r.lx - self.core.lx, self.bin_w, self.nx);
        let x1 = axis_bin(r.ux - self.core.lx, self.bin_w, self.nx);
        let y0 = axis_bin(r.ly - self.core.ly, self.bin_h, self.ny);
        let y1 = axis_bin(r.uy - self.core.ly, self.bin_h, self.ny);
        (x0..x1 + 1, y0..y1 + 1)
    }
}

fn axis_bin(offset: f64, size: f64, count: usize) -> usize {
    if !(offset > 0.0) {
        return 0;
    }
    ((offset / size).floor() as usize).min(count - 1)
}
