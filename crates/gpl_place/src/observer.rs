//! Read-only observation of a placement run.
//!
//! A [`PlacementObserver`] receives [`ObserverFrame`]s from the initial
//! placer and the optimizer. Frames borrow the run's state; observers can
//! copy what they need but cannot change anything.

use crate::geom::Point;
use crate::model::Netlist;
use gpl_config::DebugConfig;

/// The stage that produced a frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    /// Quadratic initial placement.
    Initial,
    /// Nesterov optimization.
    Nesterov,
}

/// A snapshot handed to an observer.
#[derive(Debug)]
pub struct ObserverFrame<'a> {
    /// Producing stage.
    pub stage: Stage,
    /// Iteration within the stage.
    pub iteration: usize,
    /// Global overflow (zero during initial placement).
    pub overflow: f64,
    /// Total HPWL.
    pub hpwl: f64,
    /// Density penalty (zero during initial placement).
    pub density_penalty: f64,
    /// Instance centers in dense order.
    pub centers: &'a [Point],
    /// Per-bin utilization, when bin drawing is enabled.
    pub bins: Option<&'a [f64]>,
    /// Dense index of the instance of interest.
    pub focus: Option<usize>,
}

/// Receives frames during a run.
pub trait PlacementObserver: Send {
    /// Called on update iterations.
    fn on_update(&mut self, frame: &ObserverFrame<'_>);

    /// Called on pause iterations; interactive observers block here.
    fn on_pause(&mut self, _frame: &ObserverFrame<'_>) {}
}

/// Schedules observer calls according to the debug settings.
pub(crate) struct DebugHook {
    observer: Box<dyn PlacementObserver>,
    update_every: usize,
    pause_every: usize,
    draw_bins: bool,
    initial: bool,
    focus_name: Option<String>,
    focus: Option<usize>,
}

impl DebugHook {
    pub(crate) fn new(observer: Box<dyn PlacementObserver>, config: &DebugConfig) -> Self {
        Self {
            observer,
            update_every: config.update_iterations.max(1),
            pause_every: config.pause_iterations.max(1),
            draw_bins: config.draw_bins,
            initial: config.initial,
            focus_name: config.instance.clone(),
            focus: None,
        }
    }

    /// Resolves the focus instance against a freshly built netlist.
    pub(crate) fn bind(&mut self, netlist: &Netlist) {
        self.focus = self
            .focus_name
            .as_deref()
            .and_then(|name| netlist.instance_by_name(name));
    }

    pub(crate) fn observes(&self, stage: Stage) -> bool {
        stage == Stage::Nesterov || self.initial
    }

    pub(crate) fn draw_bins(&self) -> bool {
        self.draw_bins
    }

    pub(crate) fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub(crate) fn wants_frame(&self, iteration: usize) -> bool {
        due(iteration, self.update_every) || due(iteration, self.pause_every)
    }

    pub(crate) fn deliver(&mut self, frame: &ObserverFrame<'_>) {
        if !self.observes(frame.stage) {
            return;
        }
        if due(frame.iteration, self.update_every) {
            self.observer.on_update(frame);
        }
        if due(frame.iteration, self.pause_every) {
            self.observer.on_pause(frame);
        }
    }

    pub(crate) fn into_observer(self) -> Box<dyn PlacementObserver> {
        self.observer
    }
}

fn due(iteration: usize, every: usize) -> bool {
    iteration == 0 || (iteration + 1) % every == 0
}
