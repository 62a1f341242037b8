//! In-memory circuit database.
//!
//! [`Design`] is a self-contained [`PlacementDb`] used by the command-line
//! tool and by tests. It serializes to JSON with serde; the name index is
//! rebuilt after loading with [`Design::rebuild_indices`].

use crate::db::{InstanceRecord, NetRecord, PinRecord, PlacementDb};
use crate::error::{PlaceError, PlaceResult};
use crate::geom::{BoundingBox, Point, Rect};
use crate::ids::{InstId, NetId, PinId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn unit_weight() -> f64 {
    1.0
}

/// A placeable instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Assigned by [`Design::add_instance`].
    pub id: InstId,
    /// Instance name, unique in the design.
    pub name: String,
    /// Width in database units.
    pub width: f64,
    /// Height in database units.
    pub height: f64,
    /// Lower-left corner.
    pub location: Point,
    /// Fixed instances keep their location.
    #[serde(default)]
    pub fixed: bool,
    /// Marks IO pads and ports.
    #[serde(default)]
    pub io: bool,
    /// Multiplier on the area charged to the density grid.
    #[serde(default = "unit_weight")]
    pub density_weight: f64,
}

impl Instance {
    /// Creates a movable, non-IO instance at the origin.
    pub fn new(name: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: InstId::from_raw(0),
            name: name.into(),
            width,
            height,
            location: Point::default(),
            fixed: false,
            io: false,
            density_weight: 1.0,
        }
    }

    /// Sets the lower-left location.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.location = Point::new(x, y);
        self
    }

    /// Marks the instance fixed.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Marks the instance as an IO.
    pub fn io(mut self) -> Self {
        self.io = true;
        self
    }

    /// Center of the instance at its current location.
    pub fn center(&self) -> Point {
        Point::new(
            self.location.x + 0.5 * self.width,
            self.location.y + 0.5 * self.height,
        )
    }
}

/// A connection point of an instance on a net.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    /// Assigned by [`Design::add_pin`].
    pub id: PinId,
    /// Owning instance.
    pub inst: InstId,
    /// Net this pin belongs to.
    pub net: NetId,
    /// Offset from the instance center.
    #[serde(default)]
    pub offset: Point,
}

/// A net connecting a set of pins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    /// Assigned by [`Design::add_net`].
    pub id: NetId,
    /// Net name.
    pub name: String,
    /// Base weight.
    #[serde(default = "unit_weight")]
    pub weight: f64,
    /// Pins on this net, filled by [`Design::add_pin`].
    #[serde(default)]
    pub pins: Vec<PinId>,
}

impl Net {
    /// Creates an empty net with unit weight.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NetId::from_raw(0),
            name: name.into(),
            weight: 1.0,
            pins: Vec::new(),
        }
    }
}

/// A complete design: outlines, instances, nets and pins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    /// Design name.
    pub name: String,
    /// Die outline.
    pub die: Rect,
    /// Placeable core area.
    pub core: Rect,
    /// All instances.
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// All nets.
    #[serde(default)]
    pub nets: Vec<Net>,
    /// All pins.
    #[serde(default)]
    pub pins: Vec<Pin>,
    /// Auxiliary index: instance name to ID (rebuilt on deserialization).
    #[serde(skip)]
    inst_by_name: HashMap<String, InstId>,
}

impl Design {
    /// Creates an empty design whose core equals its die.
    pub fn new(name: impl Into<String>, die: Rect) -> Self {
        Self::with_core(name, die, die)
    }

    /// Creates an empty design with a separate core area.
    pub fn with_core(name: impl Into<String>, die: Rect, core: Rect) -> Self {
        Self {
            name: name.into(),
            die,
            core,
            instances: Vec::new(),
            nets: Vec::new(),
            pins: Vec::new(),
            inst_by_name: HashMap::new(),
        }
    }

    /// Adds an instance and returns its ID.
    pub fn add_instance(&mut self, mut inst: Instance) -> InstId {
        let id = InstId::from_raw(self.instances.len() as u32);
        inst.id = id;
        self.inst_by_name.insert(inst.name.clone(), id);
        self.instances.push(inst);
        id
    }

    /// Adds a net and returns its ID.
    pub fn add_net(&mut self, mut net: Net) -> NetId {
        let id = NetId::from_raw(self.nets.len() as u32);
        net.id = id;
        net.pins.clear();
        self.nets.push(net);
        id
    }

    /// Connects `inst` to `net` through a pin at `offset` from the instance center.
    pub fn add_pin(&mut self, inst: InstId, net: NetId, offset: Point) -> PinId {
        let id = PinId::from_raw(self.pins.len() as u32);
        self.pins.push(Pin {
            id,
            inst,
            net,
            offset,
        });
        self.nets[net.as_raw() as usize].pins.push(id);
        id
    }

    /// Convenience: adds a net connecting the centers of `insts`.
    pub fn connect(&mut self, name: impl Into<String>, insts: &[InstId]) -> NetId {
        let net = self.add_net(Net::new(name));
        for &inst in insts {
            self.add_pin(inst, net, Point::default());
        }
        net
    }

    /// Returns the instance with the given ID.
    pub fn instance(&self, id: InstId) -> &Instance {
        &self.instances[id.as_raw() as usize]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.as_raw() as usize]
    }

    /// Looks up an instance by name.
    pub fn instance_by_name(&self, name: &str) -> Option<&Instance> {
        self.inst_by_name.get(name).map(|&id| self.instance(id))
    }

    /// Returns the number of instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Returns the number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Rebuilds auxiliary indices after deserialization.
    pub fn rebuild_indices(&mut self) {
        self.inst_by_name.clear();
        for (i, inst) in self.instances.iter().enumerate() {
            self.inst_by_name
                .insert(inst.name.clone(), InstId::from_raw(i as u32));
        }
    }

    /// Checks outlines and cross references.
    pub fn validate(&self) -> PlaceResult<()> {
        if !self.core.is_valid() {
            return Err(PlaceError::InvalidDesign(format!(
                "core area {:?} is empty",
                self.core
            )));
        }
        if !self.die.contains_rect(&self.core) {
            return Err(PlaceError::InvalidDesign(
                "core area is not contained in the die".to_string(),
            ));
        }
        for (i, inst) in self.instances.iter().enumerate() {
            if inst.id.as_raw() as usize != i {
                return Err(PlaceError::InvalidDesign(format!(
                    "instance '{}' has id {} at position {i}",
                    inst.name, inst.id
                )));
            }
            if !(inst.width >= 0.0 && inst.height >= 0.0) {
                return Err(PlaceError::InvalidDesign(format!(
                    "instance '{}' has a negative size",
                    inst.name
                )));
            }
        }
        for net in &self.nets {
            if !(net.weight > 0.0) {
                return Err(PlaceError::InvalidDesign(format!(
                    "net '{}' has non-positive weight {}",
                    net.name, net.weight
                )));
            }
            for pin in &net.pins {
                let pin = self.pins.get(pin.as_raw() as usize).ok_or_else(|| {
                    PlaceError::InvalidDesign(format!("net '{}' references missing pin {pin}", net.name))
                })?;
                if pin.inst.as_raw() as usize >= self.instances.len() {
                    return Err(PlaceError::InvalidDesign(format!(
                        "pin {} references missing instance {}",
                        pin.id, pin.inst
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total half-perimeter wirelength at the current locations.
    pub fn hpwl(&self) -> f64 {
        self.nets
            .iter()
            .filter_map(|net| {
                let mut bb = BoundingBox::empty();
                for &pin in &net.pins {
                    let pin = &self.pins[pin.as_raw() as usize];
                    bb.include(self.instance(pin.inst).center() + pin.offset);
                }
                bb.finish().map(|r| r.half_perimeter())
            })
            .sum()
    }
}

impl PlacementDb for Design {
    fn die_area(&self) -> Rect {
        self.die
    }

    fn core_area(&self) -> Rect {
        self.core
    }

    fn instances(&self) -> Vec<InstanceRecord> {
        self.instances
            .iter()
            .map(|inst| InstanceRecord {
                id: inst.id,
                name: inst.name.clone(),
                width: inst.width,
                height: inst.height,
                location: inst.location,
                is_fixed: inst.fixed,
                is_io: inst.io,
                density_weight: inst.density_weight,
            })
            .collect()
    }

    fn nets(&self) -> Vec<NetRecord> {
        self.nets
            .iter()
            .map(|net| NetRecord {
                id: net.id,
                name: net.name.clone(),
                weight: net.weight,
                pins: net
                    .pins
                    .iter()
                    .map(|&pin| {
                        let pin = &self.pins[pin.as_raw() as usize];
                        PinRecord {
                            id: pin.id,
                            inst: pin.inst,
                            offset: pin.offset,
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    fn set_instance_location(&mut self, id: InstId, location: Point) {
        self.instances[id.as_raw() as usize].location = location;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_design() -> Design {
        let mut d = Design::new("top", Rect::new(0.0, 0.0, 100.0, 100.0));
        let a = d.add_instance(Instance::new("a", 2.0, 2.0).at(0.0, 0.0));
        let b = d.add_instance(Instance::new("b", 2.0, 2.0).at(10.0, 20.0));
        let p = d.add_instance(Instance::new("pad", 1.0, 1.0).at(99.0, 0.0).fixed().io());
        d.connect("n0", &[a, b]);
        let n1 = d.add_net(Net::new("n1"));
        d.add_pin(b, n1, Point::new(1.0, 0.0));
        d.add_pin(p, n1, Point::default());
        d
    }

    #[test]
    fn add_and_lookup() {
        let d = make_design();
        assert_eq!(d.instance_count(), 3);
        assert_eq!(d.net_count(), 2);
        assert_eq!(d.pins.len(), 4);
        assert_eq!(d.instance_by_name("b").map(|i| i.id), Some(InstId::from_raw(1)));
        assert!(d.instance_by_name("missing").is_none());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn hpwl_uses_centers_and_offsets() {
        let d = make_design();
        // n0: centers (1,1) and (11,21) -> 10 + 20
        // n1: (12,21) and (99.5,0.5) -> 87.5 + 20.5
        assert!((d.hpwl() - 138.0).abs() < 1e-9);
    }

    #[test]
    fn db_records() {
        let mut d = make_design();
        let insts = PlacementDb::instances(&d);
        assert!(insts[2].is_fixed && insts[2].is_io);
        assert_eq!(insts[0].density_weight, 1.0);
        let nets = PlacementDb::nets(&d);
        assert_eq!(nets[1].pins[0].offset, Point::new(1.0, 0.0));

        d.set_instance_location(InstId::from_raw(0), Point::new(5.0, 6.0));
        assert_eq!(d.instance(InstId::from_raw(0)).location, Point::new(5.0, 6.0));
    }

    #[test]
    fn validate_rejects_core_outside_die() {
        let d = Design::with_core(
            "bad",
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(5.0, 5.0, 20.0, 20.0),
        );
        assert!(matches!(d.validate(), Err(PlaceError::InvalidDesign(_))));
    }

    #[test]
    fn json_roundtrip_rebuilds_index() {
        let d = make_design();
        let json = serde_json::to_string(&d).unwrap();
        let mut back: Design = serde_json::from_str(&json).unwrap();
        assert!(back.instance_by_name("a").is_none());
        back.rebuild_indices();
        assert!(back.instance_by_name("a").is_some());
        assert!((back.hpwl() - d.hpwl()).abs() < 1e-12);
    }
}
