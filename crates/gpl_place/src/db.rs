//! The database interface the placer reads from and writes back to.
//!
//! The engine never holds on to database references: it copies what it needs
//! into its own model when a run starts, and writes lower-left locations back
//! through [`PlacementDb::set_instance_location`] when a stage finishes.

use crate::geom::{Point, Rect};
use crate::ids::{InstId, NetId, PinId};

/// Snapshot of one instance as the database sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceRecord {
    /// Database ID.
    pub id: InstId,
    /// Hierarchical instance name.
    pub name: String,
    /// Width in database units.
    pub width: f64,
    /// Height in database units.
    pub height: f64,
    /// Lower-left corner.
    pub location: Point,
    /// Fixed instances are never moved.
    pub is_fixed: bool,
    /// IO instances (pads, ports).
    pub is_io: bool,
    /// Multiplier on the area this instance charges to the density grid.
    pub density_weight: f64,
}

/// One pin of a net.
#[derive(Clone, Debug, PartialEq)]
pub struct PinRecord {
    /// Database ID.
    pub id: PinId,
    /// Owning instance.
    pub inst: InstId,
    /// Offset from the owning instance's center.
    pub offset: Point,
}

/// Snapshot of one net and its pins.
#[derive(Clone, Debug, PartialEq)]
pub struct NetRecord {
    /// Database ID.
    pub id: NetId,
    /// Net name.
    pub name: String,
    /// Base weight, strictly positive.
    pub weight: f64,
    /// Pins on this net.
    pub pins: Vec<PinRecord>,
}

/// A circuit database the placer can read geometry from and write locations to.
pub trait PlacementDb {
    /// The die outline.
    fn die_area(&self) -> Rect;

    /// The placeable core area, contained in the die.
    fn core_area(&self) -> Rect;

    /// All instances, in a stable order.
    fn instances(&self) -> Vec<InstanceRecord>;

    /// All nets, in a stable order.
    fn nets(&self) -> Vec<NetRecord>;

    /// Moves an instance so its lower-left corner sits at `location`.
    fn set_instance_location(&mut self, id: InstId, location: Point);
}
