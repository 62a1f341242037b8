//! The Nesterov-accelerated global placement loop.
//!
//! The objective is `W(v) + λ N(v)`: a weighted-average wirelength plus the
//! electrostatic density energy scaled by the penalty `λ`. Each iteration
//! takes a preconditioned Nesterov step from the lookahead point, with the
//! step length estimated from successive gradient and position differences
//! and corrected by backtracking. `λ` is then multiplied by `φ`, derived from
//! the HPWL trend.
//!
//! State persists between calls to [`NesterovOptimizer::run`], so a run can
//! be resumed from any iteration.

mod divergence;
pub mod wirelength;

use crate::backend::{norm, Backend};
use crate::density::DensityModel;
use crate::error::PlaceResult;
use crate::geom::{Point, Rect, Size};
use crate::model::{clamp_center, Netlist, PlacementModel};
use crate::observer::{DebugHook, ObserverFrame, Stage};
use crate::routability::{RoutabilityEvent, RoutabilityFeedback};
use crate::timing::TimingFeedback;
use divergence::{DivergenceTracker, Verdict};
use gpl_config::NesterovConfig;
use gpl_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use wirelength::{wa_gradient, wa_wirelength, weighted_pin_count, wirelength_coef};

const PROGRESS: DiagnosticCode = DiagnosticCode::new(Category::Progress, 2);
const FINISHED: DiagnosticCode = DiagnosticCode::new(Category::Progress, 3);
const NOT_CONVERGED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 103);
const DIVERGED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 104);
const BACKTRACK_LIMIT: DiagnosticCode = DiagnosticCode::new(Category::Warning, 105);

const PROGRESS_EVERY: usize = 10;
const BACKTRACK_ACCEPT: f64 = 0.95;
/// The penalty never exceeds its initial value times this.
const MAX_PENALTY_GROWTH: f64 = 1e7;
const JITTER_SEED: u64 = 0x67_70_6c;
/// Tie-break amplitude as a fraction of the bin side.
const JITTER_FRACTION: f64 = 0.1;

/// How an optimization run ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NesterovStatus {
    /// Overflow reached the target.
    Converged,
    /// The iteration cap was hit first.
    MaxIterations,
    /// The run diverged and was rolled back to its best snapshot.
    Diverged,
}

/// Summary of an optimization run.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct NesterovOutcome {
    /// Termination reason.
    pub status: NesterovStatus,
    /// Iteration index reached (the next iteration a resume would run).
    pub iterations: usize,
    /// Overflow of the returned placement.
    pub overflow: f64,
    /// HPWL of the returned placement.
    pub hpwl: f64,
    /// HPWL of the placement the run started from.
    pub start_hpwl: f64,
    /// Density penalty at termination.
    pub density_penalty: f64,
}

impl NesterovOutcome {
    /// Whether the target overflow was reached.
    pub fn converged(&self) -> bool {
        self.status == NesterovStatus::Converged
    }
}

/// Everything the loop borrows from the orchestrator for one run.
pub struct RunContext<'a> {
    /// Shared placement state.
    pub model: &'a PlacementModel,
    /// Density model over the current grid.
    pub density: &'a mut DensityModel,
    /// Routability feedback, when enabled.
    pub routability: Option<&'a mut RoutabilityFeedback>,
    /// Timing feedback, when enabled.
    pub timing: Option<&'a mut TimingFeedback>,
    pub(crate) observer: Option<&'a mut DebugHook>,
    /// Diagnostic destination.
    pub sink: &'a DiagnosticSink,
}

#[derive(Clone, Debug)]
struct State {
    cur: Vec<Point>,
    cur_slp: Vec<Point>,
    cur_grad: Vec<Point>,
    a: f64,
    step: f64,
    penalty: f64,
    max_penalty: f64,
    wl_coef: f64,
    overflow: f64,
    hpwl: f64,
    prev_hpwl: f64,
}

#[derive(Clone, Debug)]
struct Snapshot {
    centers: Vec<Point>,
    overflow: f64,
    hpwl: f64,
    penalty: f64,
}

/// The optimizer and its resumable state.
#[derive(Debug)]
pub struct NesterovOptimizer {
    config: NesterovConfig,
    backend: Backend,
    base_wl_coef: f64,
    state: Option<State>,
    tracker: DivergenceTracker,
    snapshot: Option<Snapshot>,
    next_iteration: usize,
    start_hpwl: f64,
}

impl NesterovOptimizer {
    /// Creates an optimizer. The WA base coefficient is normalized by the
    /// average bin side of `density`'s grid.
    pub fn new(config: NesterovConfig, density: &DensityModel, backend: Backend) -> Self {
        let grid = density.grid();
        let base_wl_coef =
            config.init_wirelength_coef / (0.5 * (grid.bin_width() + grid.bin_height()));
        Self {
            config,
            backend,
            base_wl_coef,
            state: None,
            tracker: DivergenceTracker::new(),
            snapshot: None,
            next_iteration: 0,
            start_hpwl: 0.0,
        }
    }

    /// The iteration a resumed run starts from.
    pub fn next_iteration(&self) -> usize {
        self.next_iteration
    }

    /// Current density penalty, once initialized.
    pub fn density_penalty(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.penalty)
    }

    /// Replaces the target overflow for subsequent iterations.
    pub fn set_target_overflow(&mut self, target: f64) {
        self.config.target_overflow = target;
    }

    /// Whether the optimizer has initialized its state.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Runs iterations `start_iteration..max_iter`, initializing state from
    /// the model's current centers if this is the first call.
    pub fn run(
        &mut self,
        ctx: &mut RunContext<'_>,
        start_iteration: usize,
    ) -> PlaceResult<NesterovOutcome> {
        self.start_hpwl = ctx.model.hpwl();
        let (mut state, ready) = match self.state.take() {
            Some(state) => (state, true),
            None => self.initialize(ctx, start_iteration),
        };
        let result = if ready {
            self.iterate(&mut state, ctx, start_iteration)
        } else {
            self.next_iteration = start_iteration;
            Ok(self.diverge(&mut state, ctx, start_iteration))
        };
        self.state = Some(state);
        result
    }

    fn iterate(
        &mut self,
        state: &mut State,
        ctx: &mut RunContext<'_>,
        start_iteration: usize,
    ) -> PlaceResult<NesterovOutcome> {
        let netlist = ctx.model.netlist();
        let core = netlist.core();
        let mut backtrack_warned = false;

        let mut iteration = start_iteration;
        self.next_iteration = iteration;
        while iteration < self.config.max_iter {
            let sizes = ctx.model.sizes();
            let weights = ctx.model.net_weights();

            // Nesterov step with backtracking on the step length.
            let a_next = 0.5 * (1.0 + (4.0 * state.a * state.a + 1.0).sqrt());
            let coeff = (state.a - 1.0) / a_next;
            let mut next = Vec::new();
            let mut next_slp = Vec::new();
            let mut next_grad = Vec::new();
            let mut accepted = false;
            for _ in 0..self.config.max_back_track.max(1) {
                let step = state.step;
                next = state
                    .cur_slp
                    .iter()
                    .zip(&state.cur_grad)
                    .enumerate()
                    .map(|(i, (&p, &g))| clamp_movable(netlist, core, &sizes, i, p - scale(g, step)))
                    .collect::<Vec<_>>();
                next_slp = next
                    .iter()
                    .zip(&state.cur)
                    .enumerate()
                    .map(|(i, (&n, &c))| {
                        clamp_movable(netlist, core, &sizes, i, n + scale(n - c, coeff))
                    })
                    .collect();
                next_grad = combined_gradient(
                    netlist,
                    ctx.density,
                    &next_slp,
                    &sizes,
                    &weights,
                    state.wl_coef,
                    state.penalty,
                    self.backend,
                );
                let new_step = step_length(&state.cur_slp, &next_slp, &state.cur_grad, &next_grad)
                    .map(|s| s.clamp(self.config.min_step_length, self.config.max_step_length))
                    .unwrap_or(step);
                state.step = new_step;
                if new_step > BACKTRACK_ACCEPT * step {
                    accepted = true;
                    break;
                }
            }
            let finite = state.step.is_finite()
                && next.iter().chain(&next_slp).all(|p| p.is_finite())
                && next_grad.iter().all(|g| g.is_finite());
            if !finite {
                self.next_iteration = iteration + 1;
                return Ok(self.diverge(state, ctx, iteration));
            }
            if !accepted && !backtrack_warned {
                backtrack_warned = true;
                ctx.sink.emit(
                    Diagnostic::warning(
                        BACKTRACK_LIMIT,
                        format!(
                            "step length backtracking hit its limit of {} attempts",
                            self.config.max_back_track
                        ),
                    )
                    .at_iteration(iteration),
                );
            }

            state.cur = next;
            state.cur_slp = next_slp;
            state.cur_grad = next_grad;
            state.a = a_next;

            ctx.model.set_centers(&state.cur);
            ctx.density.update_occupancy(&state.cur, &sizes);
            state.overflow = ctx.density.overflow();
            state.prev_hpwl = state.hpwl;
            state.hpwl = ctx.model.hpwl();
            state.penalty = (state.penalty * phi(state.hpwl, state.prev_hpwl, &self.config))
                .min(state.max_penalty);
            state.wl_coef = wirelength_coef(state.overflow, self.base_wl_coef);

            if iteration % PROGRESS_EVERY == 0 {
                let wa = wa_wirelength(netlist, &state.cur, &weights, state.wl_coef);
                ctx.sink.emit(
                    Diagnostic::note(
                        PROGRESS,
                        format!(
                            "overflow {:.4} HPWL {:.6e} WA {:.6e} penalty {:.4e}",
                            state.overflow, state.hpwl, wa, state.penalty
                        ),
                    )
                    .at_iteration(iteration),
                );
            }

            if let Some(hook) = ctx.observer.as_deref_mut() {
                if hook.wants_frame(iteration) {
                    let bins = hook.draw_bins().then(|| ctx.density.bin_utilization());
                    let focus = hook.focus();
                    hook.deliver(&ObserverFrame {
                        stage: Stage::Nesterov,
                        iteration,
                        overflow: state.overflow,
                        hpwl: state.hpwl,
                        density_penalty: state.penalty,
                        centers: &state.cur,
                        bins: bins.as_deref(),
                        focus,
                    });
                }
            }

            if let Some(routability) = ctx.routability.as_deref_mut() {
                let event =
                    routability.step(ctx.model, ctx.density, state.overflow, iteration, ctx.sink)?;
                if let RoutabilityEvent::Inflated { .. } = event {
                    ctx.density.update_occupancy(&state.cur, &ctx.model.sizes());
                    state.overflow = ctx.density.overflow();
                    self.tracker.reset();
                }
            }

            if let Some(timing) = ctx.timing.as_deref_mut() {
                timing.step(ctx.model, state.overflow, iteration, ctx.sink)?;
            }

            let verdict = if state.penalty.is_finite() && state.hpwl.is_finite() {
                self.tracker.observe(state.overflow, state.hpwl)
            } else {
                Verdict::Diverged
            };
            match verdict {
                Verdict::Diverged => {
                    self.next_iteration = iteration + 1;
                    return Ok(self.diverge(state, ctx, iteration));
                }
                Verdict::NewMinimum => {
                    self.snapshot = Some(Snapshot {
                        centers: state.cur.clone(),
                        overflow: state.overflow,
                        hpwl: state.hpwl,
                        penalty: state.penalty,
                    });
                }
                Verdict::Steady => {}
            }

            iteration += 1;
            self.next_iteration = iteration;

            if state.overflow <= self.config.target_overflow {
                return Ok(self.finish(state, ctx, NesterovStatus::Converged, iteration));
            }
        }

        let status = if state.overflow <= self.config.target_overflow {
            NesterovStatus::Converged
        } else {
            NesterovStatus::MaxIterations
        };
        Ok(self.finish(state, ctx, status, iteration))
    }

    /// Builds the initial state from the model's centers. The flag is `false`
    /// when no finite initial step length could be found.
    fn initialize(&mut self, ctx: &mut RunContext<'_>, start_iteration: usize) -> (State, bool) {
        let netlist = ctx.model.netlist();
        let core = netlist.core();
        let sizes = ctx.model.sizes();
        let weights = ctx.model.net_weights();
        let mut cur = ctx.model.centers();
        let grid = ctx.density.grid();
        let amplitude = Point::new(
            JITTER_FRACTION * grid.bin_width(),
            JITTER_FRACTION * grid.bin_height(),
        );
        if break_ties(netlist, core, &sizes, &mut cur, amplitude) > 0 {
            ctx.model.set_centers(&cur);
        }

        ctx.density.update(&cur, &sizes);
        let overflow = ctx.density.overflow();
        let wl_coef = wirelength_coef(overflow, self.base_wl_coef);

        let wl = wa_gradient(netlist, &cur, &weights, wl_coef, self.backend);
        let dens = ctx.density.gradient(&cur, &sizes);
        let wl_sum = abs_sum(&wl);
        let dens_sum = abs_sum(&dens);
        let penalty = if dens_sum > 0.0 && wl_sum > 0.0 {
            wl_sum / dens_sum * self.config.init_density_penalty
        } else {
            self.config.init_density_penalty
        };

        let cur_grad = precondition(netlist, ctx.density, &wl, &dens, &sizes, &weights, penalty);
        let hpwl = ctx.model.hpwl();
        self.snapshot = Some(Snapshot {
            centers: cur.clone(),
            overflow,
            hpwl,
            penalty,
        });
        self.tracker.reset();
        self.next_iteration = start_iteration;

        let mut step = Some(self.config.min_step_length);
        if abs_sum(&cur_grad) > 0.0 {
            step = None;
            let mut coef = self.config.initial_prev_coordi_update_coef;
            for _ in 0..=self.config.max_recursion_init_slp_coef {
                let prev_slp: Vec<Point> = cur
                    .iter()
                    .zip(&cur_grad)
                    .enumerate()
                    .map(|(i, (&p, &g))| clamp_movable(netlist, core, &sizes, i, p + scale(g, coef)))
                    .collect();
                let prev_grad = combined_gradient(
                    netlist,
                    ctx.density,
                    &prev_slp,
                    &sizes,
                    &weights,
                    wl_coef,
                    penalty,
                    self.backend,
                );
                match step_length(&prev_slp, &cur, &prev_grad, &cur_grad) {
                    Some(s) if s > 0.0 => {
                        step = Some(s.clamp(self.config.min_step_length, self.config.max_step_length));
                        break;
                    }
                    _ => coef *= 10.0,
                }
            }
            // The trial point left its charge in the density field.
            ctx.density.update(&cur, &sizes);
        }

        let state = State {
            cur: cur.clone(),
            cur_slp: cur,
            cur_grad,
            a: 1.0,
            step: step.unwrap_or(self.config.min_step_length),
            penalty,
            max_penalty: penalty * MAX_PENALTY_GROWTH,
            wl_coef,
            overflow,
            hpwl,
            prev_hpwl: hpwl,
        };
        (state, step.is_some())
    }

    fn diverge(&self, state: &mut State, ctx: &RunContext<'_>, iteration: usize) -> NesterovOutcome {
        if let Some(snap) = &self.snapshot {
            ctx.model.set_centers(&snap.centers);
            state.cur = snap.centers.clone();
            state.cur_slp = snap.centers.clone();
            state.overflow = snap.overflow;
            state.hpwl = snap.hpwl;
            state.penalty = snap.penalty;
            state.a = 1.0;
        }
        ctx.sink.emit(
            Diagnostic::warning(DIVERGED, "placement diverged; restored the best snapshot")
                .at_iteration(iteration)
                .with_note(format!(
                    "restored overflow {:.4} HPWL {:.6e}",
                    state.overflow, state.hpwl
                ))
                .with_help("lower nesterov.max_phi_coef or raise nesterov.target_overflow"),
        );
        NesterovOutcome {
            status: NesterovStatus::Diverged,
            iterations: self.next_iteration,
            overflow: state.overflow,
            hpwl: state.hpwl,
            start_hpwl: self.start_hpwl,
            density_penalty: state.penalty,
        }
    }

    fn finish(
        &self,
        state: &State,
        ctx: &RunContext<'_>,
        status: NesterovStatus,
        iteration: usize,
    ) -> NesterovOutcome {
        if status == NesterovStatus::MaxIterations {
            ctx.sink.emit(
                Diagnostic::warning(
                    NOT_CONVERGED,
                    format!(
                        "nesterov placement stopped at iteration {iteration} above target overflow {}",
                        self.config.target_overflow
                    ),
                )
                .at_iteration(iteration)
                .with_note(format!("final overflow {:.4}", state.overflow))
                .with_help("raise nesterov.max_iter or lower the target density"),
            );
        }
        ctx.sink.emit(
            Diagnostic::note(
                FINISHED,
                format!(
                    "nesterov placement finished: overflow {:.4} HPWL {:.6e}",
                    state.overflow, state.hpwl
                ),
            )
            .at_iteration(iteration),
        );
        NesterovOutcome {
            status,
            iterations: iteration,
            overflow: state.overflow,
            hpwl: state.hpwl,
            start_hpwl: self.start_hpwl,
            density_penalty: state.penalty,
        }
    }
}

/// Penalty multiplier from the HPWL change of the last iteration.
fn phi(hpwl: f64, prev_hpwl: f64, config: &NesterovConfig) -> f64 {
    let scaled = (hpwl - prev_hpwl) / config.reference_hpwl;
    let value = if scaled < 0.0 {
        config.max_phi_coef
    } else {
        config.max_phi_coef * config.max_phi_coef.powf(-scaled)
    };
    value.clamp(config.min_phi_coef, config.max_phi_coef)
}

/// Nudges every movable coordinate shared with another movable instance by
/// up to `amplitude`. Coincident cells see identical density gradients and
/// never separate. Returns the number of instances moved.
fn break_ties(
    netlist: &Netlist,
    core: Rect,
    sizes: &[Size],
    centers: &mut [Point],
    amplitude: Point,
) -> usize {
    let mut xs: HashMap<u64, usize> = HashMap::new();
    let mut ys: HashMap<u64, usize> = HashMap::new();
    for &i in netlist.movable() {
        *xs.entry(centers[i].x.to_bits()).or_default() += 1;
        *ys.entry(centers[i].y.to_bits()).or_default() += 1;
    }
    let mut rng = StdRng::seed_from_u64(JITTER_SEED);
    let mut moved = 0;
    for &i in netlist.movable() {
        let mut p = centers[i];
        if xs.get(&p.x.to_bits()).copied().unwrap_or(0) > 1 {
            p.x += rng.gen_range(-1.0_f64..=1.0) * amplitude.x;
        }
        if ys.get(&p.y.to_bits()).copied().unwrap_or(0) > 1 {
            p.y += rng.gen_range(-1.0_f64..=1.0) * amplitude.y;
        }
        if p != centers[i] {
            centers[i] = clamp_center(core, sizes[i], p);
            moved += 1;
        }
    }
    moved
}

fn scale(p: Point, s: f64) -> Point {
    Point::new(p.x * s, p.y * s)
}

fn abs_sum(v: &[Point]) -> f64 {
    v.iter().fold(0.0, |acc, p| acc + p.x.abs() + p.y.abs())
}

fn clamp_movable(netlist: &Netlist, core: Rect, sizes: &[Size], i: usize, p: Point) -> Point {
    if netlist.instances()[i].fixed {
        return p;
    }
    clamp_center(core, sizes[i], p)
}

/// `|Δx| / |Δg|` over all coordinates, `None` when undefined.
fn step_length(prev_x: &[Point], x: &[Point], prev_g: &[Point], g: &[Point]) -> Option<f64> {
    let dx: Vec<f64> = prev_x
        .iter()
        .zip(x)
        .flat_map(|(a, b)| [b.x - a.x, b.y - a.y])
        .collect();
    let dg: Vec<f64> = prev_g
        .iter()
        .zip(g)
        .flat_map(|(a, b)| [b.x - a.x, b.y - a.y])
        .collect();
    let num = norm(&dx);
    let den = norm(&dg);
    let s = num / den;
    if den > 0.0 && s.is_finite() {
        Some(s)
    } else {
        None
    }
}

#[allow(clippy::too_many_arguments)]
fn combined_gradient(
    netlist: &Netlist,
    density: &mut DensityModel,
    at: &[Point],
    sizes: &[Size],
    weights: &[f64],
    wl_coef: f64,
    penalty: f64,
    backend: Backend,
) -> Vec<Point> {
    density.update(at, sizes);
    let wl = wa_gradient(netlist, at, weights, wl_coef, backend);
    let dens = density.gradient(at, sizes);
    precondition(netlist, density, &wl, &dens, sizes, weights, penalty)
}

fn precondition(
    netlist: &Netlist,
    density: &DensityModel,
    wl: &[Point],
    dens: &[Point],
    sizes: &[Size],
    weights: &[f64],
    penalty: f64,
) -> Vec<Point> {
    let pins = weighted_pin_count(netlist, weights);
    let charge = density.instance_charge(sizes);
    (0..wl.len())
        .map(|i| {
            if netlist.instances()[i].fixed {
                return Point::default();
            }
            let p = (pins[i] + penalty * charge[i]).max(1.0);
            Point::new(
                (wl[i].x + penalty * dens[i].x) / p,
                (wl[i].y + penalty * dens[i].y) / p,
            )
        })
        .collect()
}
