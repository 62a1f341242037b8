//! The placement model: the engine's single source of positional truth.
//!
//! A [`PlacementModel`] pairs an immutable [`Netlist`] (identity, sizes,
//! connectivity, copied from the database once) with a lock-protected
//! [`PlacementStore`] holding everything that changes during a run: instance
//! centers, density sizes (inflated by routability feedback) and net weights
//! (raised by timing feedback). The orchestrator shares it through an `Arc`.
//!
//! All coordinates in the model are instance *centers*; conversion to the
//! database's lower-left convention happens only in [`PlacementModel::write_back`].

use crate::db::PlacementDb;
use crate::error::{PlaceError, PlaceResult};
use crate::geom::{BoundingBox, Point, Rect, Size};
use crate::ids::{InstId, NetId, PinId};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Identity and static attributes of one instance.
#[derive(Clone, Debug)]
pub struct ModelInstance {
    /// Database ID.
    pub id: InstId,
    /// Instance name.
    pub name: String,
    /// Size as read from the database.
    pub size: Size,
    /// Never moved by the engine (database-fixed, or IO under IO-skip mode).
    pub fixed: bool,
    /// IO instance flag from the database.
    pub is_io: bool,
    /// Charges area to the density grid.
    pub charges_density: bool,
    /// Density area multiplier.
    pub density_weight: f64,
}

/// A pin, addressed by dense instance and net indices.
#[derive(Clone, Debug)]
pub struct ModelPin {
    /// Database ID.
    pub id: PinId,
    /// Dense index of the owning instance.
    pub inst: usize,
    /// Dense index of the net.
    pub net: usize,
    /// Offset from the instance center.
    pub offset: Point,
}

/// A net, addressed by dense pin indices.
#[derive(Clone, Debug)]
pub struct ModelNet {
    /// Database ID.
    pub id: NetId,
    /// Net name.
    pub name: String,
    /// Dense indices into [`Netlist::pins`].
    pub pins: Vec<usize>,
    /// Touches an IO instance.
    pub has_io: bool,
}

/// Immutable connectivity and geometry for one run.
#[derive(Debug)]
pub struct Netlist {
    die: Rect,
    core: Rect,
    instances: Vec<ModelInstance>,
    pins: Vec<ModelPin>,
    nets: Vec<ModelNet>,
    inst_pins: Vec<Vec<usize>>,
    movable: Vec<usize>,
    inst_index: HashMap<InstId, usize>,
    net_index: HashMap<NetId, usize>,
}

impl Netlist {
    /// Die outline.
    pub fn die(&self) -> Rect {
        self.die
    }

    /// Core outline.
    pub fn core(&self) -> Rect {
        self.core
    }

    /// All instances in dense order.
    pub fn instances(&self) -> &[ModelInstance] {
        &self.instances
    }

    /// All pins in dense order.
    pub fn pins(&self) -> &[ModelPin] {
        &self.pins
    }

    /// All nets in dense order.
    pub fn nets(&self) -> &[ModelNet] {
        &self.nets
    }

    /// Dense pin indices of instance `inst`.
    pub fn instance_pins(&self, inst: usize) -> &[usize] {
        &self.inst_pins[inst]
    }

    /// Dense indices of movable instances, ascending.
    pub fn movable(&self) -> &[usize] {
        &self.movable
    }

    /// Dense index of a database instance.
    pub fn instance_index(&self, id: InstId) -> Option<usize> {
        self.inst_index.get(&id).copied()
    }

    /// Dense index of a database net.
    pub fn net_index(&self, id: NetId) -> Option<usize> {
        self.net_index.get(&id).copied()
    }

    /// Dense index of the instance called `name`.
    pub fn instance_by_name(&self, name: &str) -> Option<usize> {
        self.instances.iter().position(|inst| inst.name == name)
    }

    /// Total area of movable instances at their database size.
    pub fn movable_area(&self) -> f64 {
        self.movable
            .iter()
            .map(|&i| self.instances[i].size.area())
            .sum()
    }
}

/// Mutable per-run placement state.
#[derive(Clone, Debug)]
pub struct PlacementStore {
    /// Instance centers.
    pub centers: Vec<Point>,
    /// Sizes used for density; start at database size, grow with inflation.
    pub sizes: Vec<Size>,
    /// Current net weights.
    pub net_weights: Vec<f64>,
}

impl PlacementStore {
    fn pin_location(&self, netlist: &Netlist, pin: usize) -> Point {
        let pin = &netlist.pins[pin];
        self.centers[pin.inst] + pin.offset
    }

    fn net_bbox(&self, netlist: &Netlist, net: usize) -> Option<Rect> {
        let mut bb = BoundingBox::empty();
        for &pin in &netlist.nets[net].pins {
            bb.include(self.pin_location(netlist, pin));
        }
        bb.finish()
    }

    fn hpwl(&self, netlist: &Netlist) -> f64 {
        (0..netlist.nets.len())
            .filter_map(|n| self.net_bbox(netlist, n))
            .map(|r| r.half_perimeter())
            .sum()
    }
}

/// Shared placement state for one run.
#[derive(Debug)]
pub struct PlacementModel {
    netlist: Netlist,
    store: RwLock<PlacementStore>,
}

impl PlacementModel {
    /// Copies identity and locations out of a database.
    ///
    /// With `skip_io`, IO instances are treated as fixed anchors that take no
    /// part in density.
    pub fn from_db(db: &dyn PlacementDb, skip_io: bool) -> PlaceResult<Self> {
        let die = db.die_area();
        let core = db.core_area();
        if !core.is_valid() {
            return Err(PlaceError::InvalidDesign(format!(
                "core area {core:?} is empty"
            )));
        }

        let records = db.instances();
        let mut instances = Vec::with_capacity(records.len());
        let mut centers = Vec::with_capacity(records.len());
        let mut inst_index = HashMap::with_capacity(records.len());
        for (i, rec) in records.into_iter().enumerate() {
            if !(rec.width >= 0.0 && rec.height >= 0.0) || !rec.location.is_finite() {
                return Err(PlaceError::InvalidDesign(format!(
                    "instance '{}' has invalid geometry",
                    rec.name
                )));
            }
            if inst_index.insert(rec.id, i).is_some() {
                return Err(PlaceError::InvalidDesign(format!(
                    "instance id {} appears twice",
                    rec.id
                )));
            }
            let fixed = rec.is_fixed || (skip_io && rec.is_io);
            let size = Size::new(rec.width, rec.height);
            centers.push(Point::new(
                rec.location.x + 0.5 * rec.width,
                rec.location.y + 0.5 * rec.height,
            ));
            instances.push(ModelInstance {
                id: rec.id,
                name: rec.name,
                size,
                fixed,
                is_io: rec.is_io,
                charges_density: !(skip_io && rec.is_io),
                density_weight: rec.density_weight,
            });
        }

        let mut pins = Vec::new();
        let mut nets = Vec::new();
        let mut net_weights = Vec::new();
        let mut net_index = HashMap::new();
        let mut inst_pins = vec![Vec::new(); instances.len()];
        for (n, rec) in db.nets().into_iter().enumerate() {
            if !(rec.weight > 0.0) || !rec.weight.is_finite() {
                return Err(PlaceError::InvalidDesign(format!(
                    "net '{}' has non-positive weight {}",
                    rec.name, rec.weight
                )));
            }
            net_index.insert(rec.id, n);
            let mut net_pins = Vec::with_capacity(rec.pins.len());
            let mut has_io = false;
            for pin in rec.pins {
                let inst = inst_index.get(&pin.inst).copied().ok_or_else(|| {
                    PlaceError::InvalidDesign(format!(
                        "net '{}' references unknown instance {}",
                        rec.name, pin.inst
                    ))
                })?;
                has_io |= instances[inst].is_io;
                inst_pins[inst].push(pins.len());
                net_pins.push(pins.len());
                pins.push(ModelPin {
                    id: pin.id,
                    inst,
                    net: n,
                    offset: pin.offset,
                });
            }
            net_weights.push(rec.weight);
            nets.push(ModelNet {
                id: rec.id,
                name: rec.name,
                pins: net_pins,
                has_io,
            });
        }

        let movable = (0..instances.len())
            .filter(|&i| !instances[i].fixed)
            .collect();
        let sizes = instances.iter().map(|inst| inst.size).collect();

        let netlist = Netlist {
            die,
            core,
            instances,
            pins,
            nets,
            inst_pins,
            movable,
            inst_index,
            net_index,
        };
        let mut store = PlacementStore {
            centers,
            sizes,
            net_weights,
        };
        for &i in &netlist.movable {
            store.centers[i] = clamp_center(core, store.sizes[i], store.centers[i]);
        }

        Ok(Self {
            netlist,
            store: RwLock::new(store),
        })
    }

    /// The immutable netlist.
    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// Read access to the mutable store.
    pub fn store(&self) -> RwLockReadGuard<'_, PlacementStore> {
        self.store.read().unwrap()
    }

    fn store_mut(&self) -> RwLockWriteGuard<'_, PlacementStore> {
        self.store.write().unwrap()
    }

    /// A read-only view for external engines.
    pub fn view(&self) -> PlacementView<'_> {
        PlacementView {
            netlist: &self.netlist,
            store: self.store(),
        }
    }

    /// Copy of all instance centers.
    pub fn centers(&self) -> Vec<Point> {
        self.store().centers.clone()
    }

    /// Copy of all density sizes.
    pub fn sizes(&self) -> Vec<Size> {
        self.store().sizes.clone()
    }

    /// Copy of all net weights.
    pub fn net_weights(&self) -> Vec<f64> {
        self.store().net_weights.clone()
    }

    /// Moves movable instances to `centers`, clamped into the core.
    ///
    /// Entries for fixed instances are ignored.
    pub fn set_centers(&self, centers: &[Point]) {
        let core = self.netlist.core;
        let mut store = self.store_mut();
        for &i in &self.netlist.movable {
            if centers[i].is_finite() {
                store.centers[i] = clamp_center(core, store.sizes[i], centers[i]);
            }
        }
    }

    /// Clamps a candidate center for instance `inst` into the core.
    pub fn clamp(&self, inst: usize, center: Point) -> Point {
        if self.netlist.instances[inst].fixed {
            return self.store().centers[inst];
        }
        clamp_center(self.netlist.core, self.store().sizes[inst], center)
    }

    /// Replaces the density size of a movable instance.
    pub fn set_size(&self, inst: usize, size: Size) {
        if !self.netlist.instances[inst].fixed {
            self.store_mut().sizes[inst] = size;
        }
    }

    /// Restores every instance to its database size.
    pub fn reset_sizes(&self) {
        let mut store = self.store_mut();
        for (size, inst) in store.sizes.iter_mut().zip(&self.netlist.instances) {
            *size = inst.size;
        }
    }

    /// Sets the weight of net `net`; non-positive or non-finite weights are ignored.
    pub fn set_net_weight(&self, net: usize, weight: f64) {
        if weight > 0.0 && weight.is_finite() {
            self.store_mut().net_weights[net] = weight;
        }
    }

    /// Total half-perimeter wirelength at the current centers.
    pub fn hpwl(&self) -> f64 {
        self.store().hpwl(&self.netlist)
    }

    /// Writes lower-left locations of all movable instances to the database.
    pub fn write_back(&self, db: &mut dyn PlacementDb) {
        let store = self.store();
        for &i in &self.netlist.movable {
            let inst = &self.netlist.instances[i];
            let c = store.centers[i];
            db.set_instance_location(
                inst.id,
                Point::new(c.x - 0.5 * inst.size.width, c.y - 0.5 * inst.size.height),
            );
        }
    }
}

/// Clamps `center` so an object of `size` stays inside `core`.
///
/// Objects wider (or taller) than the core are centered on that axis. A NaN
/// coordinate stays NaN.
pub(crate) fn clamp_center(core: Rect, size: Size, center: Point) -> Point {
    fn axis(lo: f64, hi: f64, extent: f64, v: f64) -> f64 {
        let min = lo + 0.5 * extent;
        let max = hi - 0.5 * extent;
        if min > max {
            0.5 * (lo + hi)
        } else {
            v.clamp(min, max)
        }
    }
    Point::new(
        axis(core.lx, core.ux, size.width, center.x),
        axis(core.ly, core.uy, size.height, center.y),
    )
}

/// Read-only access to the placement for routers and timing engines.
///
/// Holds a read lock on the store for its lifetime.
pub struct PlacementView<'a> {
    netlist: &'a Netlist,
    store: RwLockReadGuard<'a, PlacementStore>,
}

impl PlacementView<'_> {
    /// Core outline.
    pub fn core(&self) -> Rect {
        self.netlist.core
    }

    /// Die outline.
    pub fn die(&self) -> Rect {
        self.netlist.die
    }

    /// Number of instances.
    pub fn instance_count(&self) -> usize {
        self.netlist.instances.len()
    }

    /// Database ID of instance `inst`.
    pub fn instance_id(&self, inst: usize) -> InstId {
        self.netlist.instances[inst].id
    }

    /// Name of instance `inst`.
    pub fn instance_name(&self, inst: usize) -> &str {
        &self.netlist.instances[inst].name
    }

    /// Current center of instance `inst`.
    pub fn instance_center(&self, inst: usize) -> Point {
        self.store.centers[inst]
    }

    /// Database size of instance `inst`.
    pub fn instance_size(&self, inst: usize) -> Size {
        self.netlist.instances[inst].size
    }

    /// Whether instance `inst` is held in place.
    pub fn is_fixed(&self, inst: usize) -> bool {
        self.netlist.instances[inst].fixed
    }

    /// Number of nets.
    pub fn net_count(&self) -> usize {
        self.netlist.nets.len()
    }

    /// Database ID of net `net`.
    pub fn net_id(&self, net: usize) -> NetId {
        self.netlist.nets[net].id
    }

    /// Name of net `net`.
    pub fn net_name(&self, net: usize) -> &str {
        &self.netlist.nets[net].name
    }

    /// Current weight of net `net`.
    pub fn net_weight(&self, net: usize) -> f64 {
        self.store.net_weights[net]
    }

    /// Whether net `net` touches an IO instance.
    pub fn net_has_io(&self, net: usize) -> bool {
        self.netlist.nets[net].has_io
    }

    /// Dense index of a database net.
    pub fn net_index(&self, id: NetId) -> Option<usize> {
        self.netlist.net_index(id)
    }

    /// Absolute pin locations of net `net`.
    pub fn net_pin_locations(&self, net: usize) -> impl Iterator<Item = Point> + '_ {
        self.netlist.nets[net]
            .pins
            .iter()
            .map(move |&pin| self.store.pin_location(self.netlist, pin))
    }

    /// Bounding box of net `net`'s pins, `None` for pinless nets.
    pub fn net_bbox(&self, net: usize) -> Option<Rect> {
        self.store.net_bbox(self.netlist, net)
    }

    /// Total half-perimeter wirelength.
    pub fn hpwl(&self) -> f64 {
        self.store.hpwl(self.netlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Design, Instance};

    fn make_design() -> Design {
        let mut d = Design::with_core(
            "top",
            Rect::new(0.0, 0.0, 120.0, 120.0),
            Rect::new(10.0, 10.0, 110.0, 110.0),
        );
        let a = d.add_instance(Instance::new("a", 4.0, 2.0).at(20.0, 20.0));
        let b = d.add_instance(Instance::new("b", 4.0, 2.0).at(60.0, 40.0));
        let io = d.add_instance(Instance::new("io", 2.0, 2.0).at(0.0, 50.0).io());
        let f = d.add_instance(Instance::new("macro", 20.0, 20.0).at(80.0, 80.0).fixed());
        d.connect("n0", &[a, b, io]);
        d.connect("n1", &[b, f]);
        d
    }

    #[test]
    fn centers_and_flags() {
        let d = make_design();
        let model = PlacementModel::from_db(&d, false).unwrap();
        let nl = model.netlist();
        assert_eq!(nl.movable(), &[0, 1, 2]);
        assert_eq!(model.centers()[0], Point::new(22.0, 21.0));
        assert!(nl.nets()[0].has_io);
        assert!(!nl.nets()[1].has_io);
        // io was outside the core and movable, so it got clamped in
        assert_eq!(model.centers()[2], Point::new(11.0, 51.0));
    }

    #[test]
    fn skip_io_fixes_io() {
        let d = make_design();
        let model = PlacementModel::from_db(&d, true).unwrap();
        assert_eq!(model.netlist().movable(), &[0, 1]);
        assert!(!model.netlist().instances()[2].charges_density);
        assert_eq!(model.centers()[2], Point::new(1.0, 51.0));
    }

    #[test]
    fn set_centers_clamps_and_skips_fixed() {
        let d = make_design();
        let model = PlacementModel::from_db(&d, true).unwrap();
        let mut centers = model.centers();
        centers[0] = Point::new(-100.0, 500.0);
        centers[3] = Point::new(0.0, 0.0);
        model.set_centers(&centers);
        let after = model.centers();
        assert_eq!(after[0], Point::new(12.0, 109.0));
        assert_eq!(after[3], Point::new(90.0, 90.0));
    }

    #[test]
    fn non_finite_centers_are_not_stored() {
        let d = make_design();
        let model = PlacementModel::from_db(&d, true).unwrap();
        let before = model.centers();
        let mut centers = before.clone();
        centers[0] = Point::new(f64::NAN, 5.0);
        centers[1] = Point::new(f64::INFINITY, 5.0);
        model.set_centers(&centers);
        let after = model.centers();
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], before[1]);

        let core = Rect::new(0.0, 0.0, 10.0, 10.0);
        let p = clamp_center(core, Size::new(2.0, 2.0), Point::new(f64::NAN, 3.0));
        assert!(p.x.is_nan());
        assert_eq!(p.y, 3.0);
    }

    #[test]
    fn oversized_instance_is_centered() {
        let core = Rect::new(0.0, 0.0, 10.0, 10.0);
        let p = clamp_center(core, Size::new(20.0, 2.0), Point::new(3.0, 3.0));
        assert_eq!(p, Point::new(5.0, 3.0));
    }

    #[test]
    fn write_back_uses_database_size() {
        let mut d = make_design();
        let model = PlacementModel::from_db(&d, true).unwrap();
        model.set_size(0, Size::new(8.0, 8.0));
        let mut centers = model.centers();
        centers[0] = Point::new(50.0, 50.0);
        model.set_centers(&centers);
        model.write_back(&mut d);
        assert_eq!(d.instances[0].location, Point::new(48.0, 49.0));
        assert_eq!(d.instances[3].location, Point::new(80.0, 80.0));
        model.reset_sizes();
        assert_eq!(model.sizes()[0], Size::new(4.0, 2.0));
    }

    #[test]
    fn view_matches_design_hpwl() {
        let d = make_design();
        let model = PlacementModel::from_db(&d, true).unwrap();
        let view = model.view();
        assert!((view.hpwl() - d.hpwl()).abs() < 1e-9);
        assert_eq!(view.net_pin_locations(1).count(), 2);
        assert_eq!(view.net_name(0), "n0");
        assert_eq!(view.net_index(NetId::from_raw(1)), Some(1));
    }

    #[test]
    fn net_weight_must_stay_positive() {
        let d = make_design();
        let model = PlacementModel::from_db(&d, false).unwrap();
        model.set_net_weight(0, -1.0);
        model.set_net_weight(1, 1.5);
        assert_eq!(model.net_weights(), vec![1.0, 1.5]);
    }
}
