//! Quadratic initial placement.
//!
//! Every net is decomposed into a clique of two-pin connections, each
//! weighted inversely by its current span. Minimizing the resulting quadratic
//! wirelength gives one sparse linear system per axis, solved with
//! BiCGSTAB. The build-and-solve is repeated so each round's spans feed the
//! next round's weights.

use crate::backend::Backend;
use crate::geom::{BoundingBox, Point};
use crate::model::{Netlist, PlacementModel};
use crate::observer::{DebugHook, ObserverFrame, Stage};
use crate::sparse::{bicgstab, SolveReport, TripletBuilder};
use gpl_config::InitialPlaceConfig;
use gpl_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};

const PROGRESS: DiagnosticCode = DiagnosticCode::new(Category::Progress, 1);
const NOT_CONVERGED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 101);
const ANCHORLESS: DiagnosticCode = DiagnosticCode::new(Category::Warning, 102);

/// Rounds always run before the residual check may stop the loop.
const MIN_ROUNDS: usize = 5;

/// Summary of an initial placement run.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct InitialPlaceReport {
    /// Outer rounds performed.
    pub iterations: usize,
    /// Worst relative residual of the last round's solves.
    pub residual: f64,
    /// Whether the last round's solves reached the solver tolerance.
    pub converged: bool,
    /// Connected components without a fixed anchor, placed at their
    /// bounding-box center instead of solved.
    pub anchorless_components: usize,
    /// HPWL after placement.
    pub hpwl: f64,
}

/// The quadratic placer.
#[derive(Clone, Debug)]
pub struct InitialPlacer {
    config: InitialPlaceConfig,
    backend: Backend,
}

impl InitialPlacer {
    /// Creates a placer.
    pub fn new(config: InitialPlaceConfig, backend: Backend) -> Self {
        Self { config, backend }
    }

    /// Places every movable instance of `model`.
    pub fn place(&self, model: &PlacementModel, sink: &DiagnosticSink) -> InitialPlaceReport {
        self.place_observed(model, None, sink)
    }

    pub(crate) fn place_observed(
        &self,
        model: &PlacementModel,
        mut observer: Option<&mut DebugHook>,
        sink: &DiagnosticSink,
    ) -> InitialPlaceReport {
        let netlist = model.netlist();
        let core_center = netlist.core().center();

        let mut centers = model.centers();
        for &i in netlist.movable() {
            centers[i] = core_center;
        }

        let mut components = Components::build(netlist, self.config.max_fanout);
        let anchorless = components.place_anchorless(netlist, &mut centers);
        if anchorless > 0 {
            sink.emit(
                Diagnostic::warning(
                    ANCHORLESS,
                    format!("{anchorless} connected components have no fixed anchor"),
                )
                .with_note("they were placed at the center of their current bounding box"),
            );
        }
        model.set_centers(&centers);

        let vars = components.variables(netlist);
        let unknowns = vars.iter().filter(|v| v.is_some()).count();
        let mut report = InitialPlaceReport {
            iterations: 0,
            residual: 0.0,
            converged: true,
            anchorless_components: anchorless,
            hpwl: model.hpwl(),
        };
        if unknowns == 0 {
            return report;
        }

        for round in 0..self.config.max_iter {
            let centers = model.centers();
            let weights = model.net_weights();
            let System { x, y } = self.build(netlist, &centers, &weights, &vars, unknowns);

            let mut x0 = vec![0.0; unknowns];
            let mut y0 = vec![0.0; unknowns];
            for (i, v) in vars.iter().enumerate() {
                if let Some(v) = *v {
                    x0[v] = centers[i].x;
                    y0[v] = centers[i].y;
                }
            }
            let (xs, rx) = self.solve(x, &x0);
            let (ys, ry) = self.solve(y, &y0);

            let mut next = centers;
            for (i, v) in vars.iter().enumerate() {
                if let Some(v) = *v {
                    next[i] = Point::new(xs[v], ys[v]);
                }
            }
            model.set_centers(&next);

            report.iterations = round + 1;
            report.residual = rx.residual.max(ry.residual);
            report.converged = rx.converged && ry.converged;
            report.hpwl = model.hpwl();

            sink.emit(
                Diagnostic::note(
                    PROGRESS,
                    format!(
                        "initial placement round {}: residual {:.3e} HPWL {:.6e}",
                        round, report.residual, report.hpwl
                    ),
                )
                .at_iteration(round),
            );

            if let Some(hook) = observer.as_deref_mut() {
                if hook.observes(Stage::Initial) && hook.wants_frame(round) {
                    let focus = hook.focus();
                    let placed = model.centers();
                    hook.deliver(&ObserverFrame {
                        stage: Stage::Initial,
                        iteration: round,
                        overflow: 0.0,
                        hpwl: report.hpwl,
                        density_penalty: 0.0,
                        centers: &placed,
                        bins: None,
                        focus,
                    });
                }
            }

            if report.residual <= self.config.convergence_error && round + 1 >= MIN_ROUNDS {
                break;
            }
        }

        if !report.converged {
            sink.emit(
                Diagnostic::warning(
                    NOT_CONVERGED,
                    format!(
                        "initial placement solve did not converge (residual {:.3e})",
                        report.residual
                    ),
                )
                .at_iteration(report.iterations.saturating_sub(1))
                .with_note("the best approximate solution was kept")
                .with_help("raise initial_place.max_solver_iter"),
            );
        }
        report
    }

    fn solve(&self, axis: Axis, x0: &[f64]) -> (Vec<f64>, SolveReport) {
        let matrix = axis.matrix.build();
        bicgstab(
            &matrix,
            &axis.rhs,
            x0,
            self.config.max_solver_iter,
            self.config.solver_tolerance,
            self.backend,
        )
    }

    fn build(
        &self,
        netlist: &Netlist,
        centers: &[Point],
        weights: &[f64],
        vars: &[Option<usize>],
        unknowns: usize,
    ) -> System {
        let mut system = System {
            x: Axis::new(unknowns),
            y: Axis::new(unknowns),
        };
        let pins = netlist.pins();
        let instances = netlist.instances();

        for (n, net) in netlist.nets().iter().enumerate() {
            let k = net.pins.len();
            if k < 2 || k > self.config.max_fanout {
                continue;
            }
            let base = self.config.net_weight_scale * weights[n] / (k - 1) as f64;
            for (a, &p) in net.pins.iter().enumerate() {
                for &q in &net.pins[a + 1..] {
                    let (pp, pq) = (&pins[p], &pins[q]);
                    if pp.inst == pq.inst {
                        continue;
                    }
                    let (va, vb) = (vars[pp.inst], vars[pq.inst]);
                    if va.is_none() && vb.is_none() {
                        continue;
                    }
                    // Pins on instances outside the system act as anchors
                    // only when their instance is fixed.
                    let anchor_a = va.is_none() && instances[pp.inst].fixed;
                    let anchor_b = vb.is_none() && instances[pq.inst].fixed;
                    if (va.is_none() && !anchor_a) || (vb.is_none() && !anchor_b) {
                        continue;
                    }
                    let at_p = centers[pp.inst] + pp.offset;
                    let at_q = centers[pq.inst] + pq.offset;
                    let wx = base / (at_p.x - at_q.x).abs().max(self.config.min_diff_length);
                    let wy = base / (at_p.y - at_q.y).abs().max(self.config.min_diff_length);
                    system.x.connect(va, vb, wx, pp.offset.x, pq.offset.x, at_p.x, at_q.x);
                    system.y.connect(va, vb, wy, pp.offset.y, pq.offset.y, at_p.y, at_q.y);
                }
            }
        }
        system
    }
}

struct System {
    x: Axis,
    y: Axis,
}

/// One axis of the quadratic system.
struct Axis {
    matrix: TripletBuilder,
    rhs: Vec<f64>,
}

impl Axis {
    fn new(n: usize) -> Self {
        Self {
            matrix: TripletBuilder::new(n),
            rhs: vec![0.0; n],
        }
    }

    /// Adds `w (x_a + off_a - x_b - off_b)^2`. An absent variable is a fixed
    /// pin at the given absolute location.
    #[allow(clippy::too_many_arguments)]
    fn connect(
        &mut self,
        a: Option<usize>,
        b: Option<usize>,
        w: f64,
        off_a: f64,
        off_b: f64,
        at_a: f64,
        at_b: f64,
    ) {
        match (a, b) {
            (Some(a), Some(b)) => {
                self.matrix.add(a, a, w);
                self.matrix.add(b, b, w);
                self.matrix.add(a, b, -w);
                self.matrix.add(b, a, -w);
                self.rhs[a] -= w * (off_a - off_b);
                self.rhs[b] -= w * (off_b - off_a);
            }
            (Some(a), None) => {
                self.matrix.add(a, a, w);
                self.rhs[a] += w * (at_b - off_a);
            }
            (None, Some(b)) => {
                self.matrix.add(b, b, w);
                self.rhs[b] += w * (at_a - off_b);
            }
            (None, None) => {}
        }
    }
}

/// Connected components of movable instances over the nets the system uses.
struct Components {
    parent: Vec<usize>,
    anchored: Vec<bool>,
}

impl Components {
    fn build(netlist: &Netlist, max_fanout: usize) -> Self {
        let n = netlist.instances().len();
        let mut this = Self {
            parent: (0..n).collect(),
            anchored: vec![false; n],
        };
        let instances = netlist.instances();
        let pins = netlist.pins();

        let mut anchored_nets = Vec::new();
        for net in netlist.nets() {
            let k = net.pins.len();
            if k < 2 || k > max_fanout {
                continue;
            }
            let mut first = None;
            let mut has_fixed = false;
            for &p in &net.pins {
                let inst = pins[p].inst;
                if instances[inst].fixed {
                    has_fixed = true;
                    continue;
                }
                match first {
                    None => first = Some(inst),
                    Some(f) => this.union(f, inst),
                }
            }
            if let (Some(f), true) = (first, has_fixed) {
                anchored_nets.push(f);
            }
        }
        for f in anchored_nets {
            let root = this.find(f);
            this.anchored[root] = true;
        }
        this
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = ra.min(rb);
        }
    }

    fn is_anchored(&mut self, i: usize) -> bool {
        let root = self.find(i);
        self.anchored[root]
    }

    /// Moves every anchorless component to the center of its bounding box.
    /// Returns the number of such components.
    fn place_anchorless(&mut self, netlist: &Netlist, centers: &mut [Point]) -> usize {
        let mut boxes: Vec<Option<BoundingBox>> = vec![None; centers.len()];
        for &i in netlist.movable() {
            if self.is_anchored(i) {
                continue;
            }
            let root = self.find(i);
            boxes[root]
                .get_or_insert_with(BoundingBox::empty)
                .include(centers[i]);
        }
        let targets: Vec<Option<Point>> = boxes
            .into_iter()
            .map(|b| b.and_then(BoundingBox::finish).map(|r| r.center()))
            .collect();
        for &i in netlist.movable() {
            let root = self.find(i);
            if let Some(target) = targets[root] {
                centers[i] = target;
            }
        }
        targets.iter().filter(|t| t.is_some()).count()
    }

    /// Dense variable index per instance; `None` for fixed and anchorless.
    fn variables(&mut self, netlist: &Netlist) -> Vec<Option<usize>> {
        let mut vars = vec![None; netlist.instances().len()];
        let mut next = 0;
        for &i in netlist.movable() {
            if self.is_anchored(i) {
                vars[i] = Some(next);
                next += 1;
            }
        }
        vars
    }
}
