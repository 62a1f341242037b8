//! The [`GlobalPlacer`] orchestrator.
//!
//! Owns the caller's database and wires the placement model, density model,
//! feedback loops and optimizer together. Internal state is built lazily on
//! the first entry point that needs it and torn down by [`GlobalPlacer::reset`]
//! or by setters that change how it would be built. Positions are written back
//! to the database after every stage.

use crate::backend::Backend;
use crate::db::PlacementDb;
use crate::density::{BinGrid, DensityModel};
use crate::error::{Phase, PlaceError, PlaceResult};
use crate::initial::{InitialPlaceReport, InitialPlacer};
use crate::model::{Netlist, PlacementModel};
use crate::observer::{DebugHook, PlacementObserver};
use crate::optimizer::{NesterovOptimizer, NesterovOutcome, RunContext};
use crate::routability::{GlobalRouter, RoutabilityFeedback};
use crate::timing::{TimingEngine, TimingFeedback};
use gpl_config::validate::{
    check_bin_grid, check_overflow_checkpoint, check_target_density, check_target_overflow,
};
use gpl_config::{validate_config, PlacerConfig};
use gpl_diagnostics::DiagnosticSink;
use std::sync::Arc;

/// Result of a full [`GlobalPlacer::run`].
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PlaceOutcome {
    /// Initial placement summary.
    pub initial: InitialPlaceReport,
    /// Optimization summary.
    pub nesterov: NesterovOutcome,
}

/// Density, feedback and optimizer state for one optimization lifetime.
struct Optimization {
    backend: Backend,
    density: DensityModel,
    optimizer: NesterovOptimizer,
    routability: Option<RoutabilityFeedback>,
    timing: Option<TimingFeedback>,
}

/// Analytic global placer over a [`PlacementDb`].
pub struct GlobalPlacer<D: PlacementDb> {
    db: D,
    sink: Arc<DiagnosticSink>,
    config: PlacerConfig,
    router: Option<Box<dyn GlobalRouter>>,
    engine: Option<Box<dyn TimingEngine>>,
    hook: Option<DebugHook>,
    model: Option<Arc<PlacementModel>>,
    optimization: Option<Optimization>,
}

impl<D: PlacementDb> GlobalPlacer<D> {
    /// Creates a placer with the default configuration.
    pub fn new(db: D, sink: Arc<DiagnosticSink>) -> Self {
        Self {
            db,
            sink,
            config: PlacerConfig::default(),
            router: None,
            engine: None,
            hook: None,
            model: None,
            optimization: None,
        }
    }

    /// Supplies the router consulted in routability-driven mode.
    pub fn with_router(mut self, router: Box<dyn GlobalRouter>) -> Self {
        self.drop_optimization();
        self.router = Some(router);
        self
    }

    /// Supplies the engine consulted in timing-driven mode.
    pub fn with_timing_engine(mut self, engine: Box<dyn TimingEngine>) -> Self {
        self.drop_optimization();
        self.engine = Some(engine);
        self
    }

    /// Attaches an observer. It only receives frames when `debug.enabled`.
    pub fn with_observer(mut self, observer: Box<dyn PlacementObserver>) -> Self {
        let mut hook = DebugHook::new(observer, &self.config.debug);
        if let Some(model) = &self.model {
            hook.bind(model.netlist());
        }
        self.hook = Some(hook);
        self
    }

    /// Validates and installs a configuration, discarding built state.
    pub fn configure(&mut self, config: PlacerConfig) -> PlaceResult<()> {
        validate_config(&config)?;
        self.teardown();
        if let Some(hook) = self.hook.take() {
            self.hook = Some(DebugHook::new(hook.into_observer(), &config.debug));
        }
        self.config = config;
        Ok(())
    }

    /// The active configuration.
    pub fn config(&self) -> &PlacerConfig {
        &self.config
    }

    /// The diagnostic sink.
    pub fn sink(&self) -> &Arc<DiagnosticSink> {
        &self.sink
    }

    /// The database.
    pub fn db(&self) -> &D {
        &self.db
    }

    /// Consumes the placer and returns the database.
    pub fn into_db(self) -> D {
        self.db
    }

    /// The placement model, if built.
    pub fn model(&self) -> Option<Arc<PlacementModel>> {
        self.model.clone()
    }

    /// Sets the target density, in `(0, 1]`.
    pub fn set_target_density(&mut self, target: f64) -> PlaceResult<()> {
        check_target_density(target)?;
        self.config.nesterov.target_density = target;
        if let Some(opt) = self.optimization.as_mut() {
            opt.density.set_target_density(target);
        }
        Ok(())
    }

    /// The configured target density.
    pub fn target_density(&self) -> f64 {
        self.config.nesterov.target_density
    }

    /// Enables or disables uniform target density mode.
    pub fn set_uniform_target_density_mode(&mut self, uniform: bool) {
        self.config.nesterov.uniform_target_density = uniform;
        if let Some(opt) = self.optimization.as_mut() {
            opt.density.set_uniform(uniform);
        }
    }

    /// The target applied in uniform mode. Builds the density model if needed.
    pub fn uniform_target_density(&mut self) -> PlaceResult<f64> {
        let opt = self.optimization()?;
        Ok(opt.density.uniform_target_density())
    }

    /// Sets the overflow at which optimization stops, in `(0, 1]`.
    pub fn set_target_overflow(&mut self, target: f64) -> PlaceResult<()> {
        check_target_overflow(target)?;
        self.config.nesterov.target_overflow = target;
        if let Some(opt) = self.optimization.as_mut() {
            opt.optimizer.set_target_overflow(target);
        }
        Ok(())
    }

    /// Enables or disables routability-driven mode.
    pub fn set_routability_driven_mode(&mut self, enabled: bool) {
        if self.config.routability.enabled != enabled {
            self.config.routability.enabled = enabled;
            self.drop_optimization();
        }
    }

    /// Enables or disables timing-driven mode.
    pub fn set_timing_driven_mode(&mut self, enabled: bool) {
        if self.config.timing.enabled != enabled {
            self.config.timing.enabled = enabled;
            self.drop_optimization();
        }
    }

    /// Adds a timing reweight checkpoint, in percent overflow.
    pub fn add_timing_net_weight_overflow(&mut self, percent: u32) -> PlaceResult<()> {
        check_overflow_checkpoint(percent)?;
        if !self.config.timing.net_weight_overflows.contains(&percent) {
            self.config.timing.net_weight_overflows.push(percent);
        }
        if let Some(timing) = self.optimization.as_mut().and_then(|o| o.timing.as_mut()) {
            timing.add_checkpoint(percent);
        }
        Ok(())
    }

    /// Treats IO instances as fixed boundary terms. Rebuilds the model.
    pub fn set_skip_io_mode(&mut self, skip_io: bool) {
        if self.config.skip_io != skip_io {
            self.config.skip_io = skip_io;
            self.teardown();
        }
    }

    /// Forces the sequential backend. Rebuilds the model.
    pub fn set_force_sequential(&mut self, force: bool) {
        if self.config.force_sequential != force {
            self.config.force_sequential = force;
            self.teardown();
        }
    }

    /// Sets the bin grid dimensions; `0` selects automatic sizing per axis.
    pub fn set_bin_grid(&mut self, nx: usize, ny: usize) -> PlaceResult<()> {
        check_bin_grid("nesterov.bin_grid_x", nx)?;
        check_bin_grid("nesterov.bin_grid_y", ny)?;
        self.config.nesterov.bin_grid_x = nx;
        self.config.nesterov.bin_grid_y = ny;
        self.drop_optimization();
        Ok(())
    }

    /// Discards all built state and rebuilds the placement model from the
    /// database.
    pub fn reset(&mut self) -> PlaceResult<()> {
        self.teardown();
        self.ensure_model()?;
        Ok(())
    }

    /// Runs the quadratic initial placer once.
    pub fn run_initial_placement(&mut self) -> PlaceResult<InitialPlaceReport> {
        let model = self.ensure_model()?;
        self.drop_optimization();
        let placer = InitialPlacer::new(
            self.config.initial_place.clone(),
            Backend::select(self.config.force_sequential),
        );
        let hook = if self.config.debug.enabled {
            self.hook.as_mut()
        } else {
            None
        };
        let report = placer.place_observed(&model, hook, &self.sink);
        model.write_back(&mut self.db);
        Ok(report)
    }

    /// Runs the optimizer from `start_iteration`.
    ///
    /// Resumes the existing optimizer state if there is one.
    pub fn run_optimization(&mut self, start_iteration: usize) -> PlaceResult<NesterovOutcome> {
        let model = self.ensure_model()?;
        let mut opt = match self.optimization.take() {
            Some(opt) => opt,
            None => self.build_optimization(&model)?,
        };
        let observer = if self.config.debug.enabled {
            self.hook.as_mut()
        } else {
            None
        };
        let mut ctx = RunContext {
            model: &model,
            density: &mut opt.density,
            routability: opt.routability.as_mut(),
            timing: opt.timing.as_mut(),
            observer,
            sink: &self.sink,
        };
        let result = opt.optimizer.run(&mut ctx, start_iteration);
        self.optimization = Some(opt);
        model.write_back(&mut self.db);
        result
    }

    /// Re-enters optimization from the current positions without initial
    /// placement.
    ///
    /// An optimizer with iterations left resumes where it stopped; otherwise
    /// a fresh optimizer starts from iteration 0.
    pub fn run_incremental(&mut self) -> PlaceResult<NesterovOutcome> {
        let max_iter = self.config.nesterov.max_iter;
        let start = match self.optimization.as_mut() {
            Some(opt)
                if opt.optimizer.is_initialized() && opt.optimizer.next_iteration() < max_iter =>
            {
                opt.optimizer.next_iteration()
            }
            Some(opt) => {
                opt.optimizer =
                    NesterovOptimizer::new(self.config.nesterov.clone(), &opt.density, opt.backend);
                0
            }
            None => 0,
        };
        self.run_optimization(start)
    }

    /// Initial placement followed by optimization from iteration 0.
    pub fn run(&mut self) -> PlaceResult<PlaceOutcome> {
        let initial = self.run_initial_placement()?;
        let nesterov = self.run_optimization(0)?;
        Ok(PlaceOutcome { initial, nesterov })
    }

    fn ensure_model(&mut self) -> PlaceResult<Arc<PlacementModel>> {
        if let Some(model) = &self.model {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(PlacementModel::from_db(&self.db, self.config.skip_io)?);
        if let Some(hook) = self.hook.as_mut() {
            hook.bind(model.netlist());
        }
        self.model = Some(Arc::clone(&model));
        Ok(model)
    }

    fn optimization(&mut self) -> PlaceResult<&mut Optimization> {
        let model = self.ensure_model()?;
        let opt = match self.optimization.take() {
            Some(opt) => opt,
            None => self.build_optimization(&model)?,
        };
        Ok(self.optimization.insert(opt))
    }

    fn build_optimization(&mut self, model: &PlacementModel) -> PlaceResult<Optimization> {
        if self.config.routability.enabled && self.router.is_none() {
            return Err(PlaceError::MissingEngine {
                phase: Phase::Routability,
            });
        }
        if self.config.timing.enabled && self.engine.is_none() {
            return Err(PlaceError::MissingEngine {
                phase: Phase::Timing,
            });
        }

        let backend = Backend::select(self.config.force_sequential);
        let netlist = model.netlist();
        let grid = self.bin_grid(netlist);
        let density = DensityModel::new(
            netlist,
            &model.centers(),
            &model.sizes(),
            grid,
            &self.config.nesterov,
            backend,
        );
        let optimizer = NesterovOptimizer::new(self.config.nesterov.clone(), &density, backend);

        let routability = match self.router.take() {
            Some(router) if self.config.routability.enabled => Some(RoutabilityFeedback::new(
                self.config.routability.clone(),
                router,
                netlist.instances().len(),
            )),
            other => {
                self.router = other;
                None
            }
        };
        let timing = match self.engine.take() {
            Some(engine) if self.config.timing.enabled => Some(TimingFeedback::new(
                &self.config.timing,
                engine,
                self.config.skip_io,
            )),
            other => {
                self.engine = other;
                None
            }
        };

        Ok(Optimization {
            backend,
            density,
            optimizer,
            routability,
            timing,
        })
    }

    fn bin_grid(&self, netlist: &Netlist) -> BinGrid {
        let n = &self.config.nesterov;
        let core = netlist.core();
        if n.bin_grid_x > 0 && n.bin_grid_y > 0 {
            return BinGrid::new(core, n.bin_grid_x, n.bin_grid_y);
        }
        let movable = netlist.movable().len();
        let average = if movable > 0 {
            netlist.movable_area() / movable as f64
        } else {
            0.0
        };
        let auto = BinGrid::auto(core, average, n.target_density);
        let nx = if n.bin_grid_x > 0 { n.bin_grid_x } else { auto.nx() };
        let ny = if n.bin_grid_y > 0 { n.bin_grid_y } else { auto.ny() };
        BinGrid::new(core, nx, ny)
    }

    /// Drops optimizer state, returning collaborators and restoring sizes.
    fn drop_optimization(&mut self) {
        let Some(opt) = self.optimization.take() else {
            return;
        };
        if let Some(routability) = opt.routability {
            self.router = Some(routability.into_router());
        }
        if let Some(timing) = opt.timing {
            self.engine = Some(timing.into_engine());
        }
        if let Some(model) = &self.model {
            model.reset_sizes();
        }
    }

    fn teardown(&mut self) {
        self.drop_optimization();
        self.model = None;
    }
}
