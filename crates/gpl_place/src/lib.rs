//! Analytic global placement for standard-cell designs.
//!
//! Given a netlist of sized instances in a core area, this crate finds
//! overlap-spread positions that minimize wirelength. The flow follows the
//! electrostatic formulation: instances are charges, bin overflow drives a
//! spreading field solved by spectral Poisson, and a Nesterov-accelerated
//! gradient loop trades wirelength against density.
//!
//! # Pipeline
//!
//! 1. **Model**: snapshot the [`PlacementDb`] into a [`PlacementModel`]
//! 2. **Initial placement**: clique-model quadratic solve with BiCGSTAB
//! 3. **Optimization**: Nesterov loop over WA wirelength plus density
//! 4. **Feedback**: optional congestion-driven inflation and timing-driven
//!    net reweighting at overflow checkpoints
//! 5. **Write-back**: positions return to the database after each stage
//!
//! # Usage
//!
//! ```ignore
//! use gpl_place::{Design, GlobalPlacer};
//!
//! let mut placer = GlobalPlacer::new(design, sink.clone());
//! placer.configure(config)?;
//! let outcome = placer.run()?;
//! let placed = placer.into_db();
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod db;
pub mod density;
pub mod design;
pub mod error;
pub mod geom;
pub mod ids;
pub mod initial;
pub mod model;
pub mod observer;
pub mod optimizer;
pub mod placer;
pub mod routability;
pub mod rudy;
pub mod sparse;
pub mod timing;

pub use backend::Backend;
pub use db::{InstanceRecord, NetRecord, PinRecord, PlacementDb};
pub use density::{BinGrid, DensityModel};
pub use design::{Design, Instance, Net, Pin};
pub use error::{EngineError, Phase, PlaceError, PlaceResult};
pub use geom::{Point, Rect, Size};
pub use ids::{InstId, NetId, PinId};
pub use initial::{InitialPlaceReport, InitialPlacer};
pub use model::{Netlist, PlacementModel, PlacementView};
pub use observer::{ObserverFrame, PlacementObserver, Stage};
pub use optimizer::{NesterovOptimizer, NesterovOutcome, NesterovStatus};
pub use placer::{GlobalPlacer, PlaceOutcome};
pub use routability::{CongestionMap, GlobalRouter, RoutabilityEvent, RoutabilityFeedback};
pub use rudy::RudyEstimator;
pub use timing::{NetSlack, TimingEngine, TimingFeedback};
