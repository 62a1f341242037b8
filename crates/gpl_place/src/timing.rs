//! Timing feedback: slack-driven net reweighting at overflow checkpoints.

use crate::error::{EngineError, Phase, PlaceError, PlaceResult};
use crate::ids::NetId;
use crate::model::{PlacementModel, PlacementView};
use crate::routability::ENGINE_FAILURE;
use gpl_config::TimingConfig;
use gpl_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};

const TIMING_REWEIGHT: DiagnosticCode = DiagnosticCode::new(Category::Timing, 301);

/// Slack of one net as reported by a timing engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetSlack {
    /// Database net ID.
    pub net: NetId,
    /// Worst slack over the net's sinks; negative is violating.
    pub slack: f64,
}

/// Computes per-net slack for the current placement.
pub trait TimingEngine: Send {
    /// Returns slacks for any subset of nets.
    fn net_slacks(&mut self, view: &PlacementView<'_>) -> Result<Vec<NetSlack>, EngineError>;
}

/// Timing feedback state for one run.
pub struct TimingFeedback {
    engine: Box<dyn TimingEngine>,
    checkpoints: Vec<u32>,
    max_weight: f64,
    skip_io: bool,
    calls: usize,
}

impl TimingFeedback {
    /// Creates feedback with the configured checkpoints.
    pub fn new(config: &TimingConfig, engine: Box<dyn TimingEngine>, skip_io: bool) -> Self {
        let mut feedback = Self {
            engine,
            checkpoints: Vec::new(),
            max_weight: config.net_weight_max,
            skip_io,
            calls: 0,
        };
        for &percent in &config.net_weight_overflows {
            feedback.add_checkpoint(percent);
        }
        feedback
    }

    /// Adds an overflow checkpoint in percent. Duplicates are ignored.
    pub fn add_checkpoint(&mut self, percent: u32) {
        if !self.checkpoints.contains(&percent) {
            self.checkpoints.push(percent);
            self.checkpoints.sort_unstable_by(|a, b| b.cmp(a));
        }
    }

    /// Remaining checkpoints, highest first.
    pub fn checkpoints(&self) -> &[u32] {
        &self.checkpoints
    }

    /// Number of timing engine invocations so far.
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub(crate) fn into_engine(self) -> Box<dyn TimingEngine> {
        self.engine
    }

    /// Reweights critical nets if `overflow` has crossed the next checkpoint.
    ///
    /// Returns the number of nets whose weight changed.
    pub fn step(
        &mut self,
        model: &PlacementModel,
        overflow: f64,
        iteration: usize,
        sink: &DiagnosticSink,
    ) -> PlaceResult<usize> {
        let Some(&next) = self.checkpoints.first() else {
            return Ok(0);
        };
        let percent = (overflow * 100.0).round();
        if percent > next as f64 {
            return Ok(0);
        }
        let crossed = self.checkpoints.iter().filter(|&&c| c as f64 >= percent).count();
        let fired = next;
        self.checkpoints.drain(..crossed);

        self.calls += 1;
        let updates = {
            let view = model.view();
            let slacks = self.engine.net_slacks(&view).map_err(|err| {
                sink.emit(
                    Diagnostic::error(ENGINE_FAILURE, format!("timing engine failed: {err}"))
                        .at_iteration(iteration),
                );
                PlaceError::engine(Phase::Timing, err)
            })?;
            self.reweight(&view, &slacks)
        };

        for &(net, weight) in &updates {
            model.set_net_weight(net, weight);
        }
        sink.emit(
            Diagnostic::note(
                TIMING_REWEIGHT,
                format!(
                    "timing checkpoint {fired}% at overflow {overflow:.4}: reweighted {} nets",
                    updates.len()
                ),
            )
            .at_iteration(iteration),
        );
        Ok(updates.len())
    }

    fn reweight(&self, view: &PlacementView<'_>, slacks: &[NetSlack]) -> Vec<(usize, f64)> {
        let netlist_slacks: Vec<(usize, f64)> = slacks
            .iter()
            .filter(|s| s.slack.is_finite())
            .filter_map(|s| view.net_index(s.net).map(|n| (n, s.slack)))
            .collect();
        let worst = netlist_slacks
            .iter()
            .map(|&(_, s)| s)
            .fold(0.0, f64::min);
        if worst >= 0.0 {
            return Vec::new();
        }

        let mut updates = Vec::new();
        for (net, slack) in netlist_slacks {
            if slack >= 0.0 || (self.skip_io && view.net_has_io(net)) {
                continue;
            }
            let criticality = slack / worst;
            let current = view.net_weight(net);
            let next = (current * (1.0 + (self.max_weight - 1.0) * criticality)).min(self.max_weight);
            if next > current {
                updates.push((net, next));
            }
        }
        updates
    }
}
