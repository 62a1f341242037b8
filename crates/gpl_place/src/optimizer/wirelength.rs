//! Weighted-average (WA) wirelength model.
//!
//! The WA model approximates each net's bounding box extent by
//! exponentially weighted averages of its pin coordinates. Exponentials are
//! taken relative to the net's max (or min) coordinate so they never
//! overflow.

use crate::backend::Backend;
use crate::geom::Point;
use crate::model::Netlist;

/// WA smoothing coefficient for the current overflow.
///
/// `base` is the coefficient at overflow 0.1; the factor falls by a decade
/// for every 0.45 of overflow above that, saturating at 10x and 0.1x.
pub fn wirelength_coef(overflow: f64, base: f64) -> f64 {
    let factor = if overflow > 1.0 {
        0.1
    } else if overflow < 0.1 {
        10.0
    } else {
        1.0 / 10f64.powf((overflow - 0.1) * 20.0 / 9.0 - 1.0)
    };
    base * factor
}

/// Partial derivatives of one axis of the WA extent with respect to each pin.
fn axis_gradient(coords: &[f64], coef: f64, out: &mut [f64]) {
    let max = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = coords.iter().copied().fold(f64::INFINITY, f64::min);

    let mut sum_a = 0.0;
    let mut sum_xa = 0.0;
    let mut sum_b = 0.0;
    let mut sum_xb = 0.0;
    for &x in coords {
        let a = ((x - max) * coef).exp();
        let b = ((min - x) * coef).exp();
        sum_a += a;
        sum_xa += x * a;
        sum_b += b;
        sum_xb += x * b;
    }

    for (slot, &x) in out.iter_mut().zip(coords) {
        let a = ((x - max) * coef).exp();
        let b = ((min - x) * coef).exp();
        let d_max = a * (sum_a + coef * (x * sum_a - sum_xa)) / (sum_a * sum_a);
        let d_min = b * (sum_b - coef * (x * sum_b - sum_xb)) / (sum_b * sum_b);
        *slot = d_max - d_min;
    }
}

/// Weighted WA wirelength of the whole netlist.
pub fn wa_wirelength(netlist: &Netlist, centers: &[Point], weights: &[f64], coef: f64) -> f64 {
    let mut total = 0.0;
    for (n, net) in netlist.nets().iter().enumerate() {
        if net.pins.len() < 2 {
            continue;
        }
        let xs: Vec<f64> = net
            .pins
            .iter()
            .map(|&p| centers[netlist.pins()[p].inst].x + netlist.pins()[p].offset.x)
            .collect();
        let ys: Vec<f64> = net
            .pins
            .iter()
            .map(|&p| centers[netlist.pins()[p].inst].y + netlist.pins()[p].offset.y)
            .collect();
        total += weights[n] * (axis_extent(&xs, coef) + axis_extent(&ys, coef));
    }
    total
}

fn axis_extent(coords: &[f64], coef: f64) -> f64 {
    let max = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = coords.iter().copied().fold(f64::INFINITY, f64::min);
    let (mut sum_a, mut sum_xa, mut sum_b, mut sum_xb) = (0.0, 0.0, 0.0, 0.0);
    for &x in coords {
        let a = ((x - max) * coef).exp();
        let b = ((min - x) * coef).exp();
        sum_a += a;
        sum_xa += x * a;
        sum_b += b;
        sum_xb += x * b;
    }
    sum_xa / sum_a - sum_xb / sum_b
}

/// Per-instance gradient of the weighted WA wirelength.
///
/// Nets are evaluated independently on `backend`; pin contributions are then
/// gathered per instance in pin order, so the result does not depend on the
/// backend.
pub fn wa_gradient(
    netlist: &Netlist,
    centers: &[Point],
    weights: &[f64],
    coef: f64,
    backend: Backend,
) -> Vec<Point> {
    let pins = netlist.pins();
    let per_net = backend.map(netlist.nets().len(), |n| {
        let net = &netlist.nets()[n];
        if net.pins.len() < 2 {
            return Vec::new();
        }
        let xs: Vec<f64> = net
            .pins
            .iter()
            .map(|&p| centers[pins[p].inst].x + pins[p].offset.x)
            .collect();
        let ys: Vec<f64> = net
            .pins
            .iter()
            .map(|&p| centers[pins[p].inst].y + pins[p].offset.y)
            .collect();
        let mut gx = vec![0.0; xs.len()];
        let mut gy = vec![0.0; ys.len()];
        axis_gradient(&xs, coef, &mut gx);
        axis_gradient(&ys, coef, &mut gy);
        gx.into_iter()
            .zip(gy)
            .map(|(x, y)| Point::new(weights[n] * x, weights[n] * y))
            .collect()
    });

    let mut pin_grad = vec![Point::default(); pins.len()];
    for (net, grads) in netlist.nets().iter().zip(&per_net) {
        for (&p, &g) in net.pins.iter().zip(grads) {
            pin_grad[p] = g;
        }
    }

    backend.map(centers.len(), |i| {
        if netlist.instances()[i].fixed {
            return Point::default();
        }
        netlist
            .instance_pins(i)
            .iter()
            .fold(Point::default(), |acc, &p| acc + pin_grad[p])
    })
}

/// Sum of net weights over the pins of each instance.
pub fn weighted_pin_count(netlist: &Netlist, weights: &[f64]) -> Vec<f64> {
    (0..netlist.instances().len())
        .map(|i| {
            netlist
                .instance_pins(i)
                .iter()
                .map(|&p| weights[netlist.pins()[p].net])
                .sum()
        })
        .collect()
}
