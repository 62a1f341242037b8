//! `gpl generate`: write a random synthetic design.
//!
//! Cells are small rectangles scattered over a square core sized for about
//! 60% utilization. A random spanning tree keeps the netlist connected and a
//! handful of multi-pin nets adds global structure. Fixed macros hang off
//! random cells so they act as anchors during initial placement.

use std::error::Error;

use gpl_place::{Design, InstId, Instance, Rect};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

use crate::{GenerateArgs, GlobalArgs};

const UTILIZATION: f64 = 0.6;
const ROW_HEIGHT: f64 = 2.0;

/// Runs the `gpl generate` command.
pub fn run(args: &GenerateArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    if args.instances == 0 {
        return Err("--instances must be at least 1".into());
    }
    let design = synthesize(args.instances, args.fixed, args.seed);
    std::fs::write(&args.output, serde_json::to_string_pretty(&design)?)?;
    if !global.quiet {
        eprintln!(
            "   Generated {} ({} instances, {} nets) into {}",
            design.name,
            design.instance_count(),
            design.net_count(),
            args.output
        );
    }
    Ok(0)
}

/// Builds a random design with `instances` movable cells and `fixed` macros.
///
/// The same arguments always produce the same design.
pub fn synthesize(instances: usize, fixed: usize, seed: u64) -> Design {
    let mut rng = StdRng::seed_from_u64(seed);

    let widths: Vec<f64> = (0..instances)
        .map(|_| rng.gen_range(1..=4) as f64)
        .collect();
    let macros: Vec<(f64, f64)> = (0..fixed)
        .map(|_| (rng.gen_range(6..=12) as f64, rng.gen_range(6..=12) as f64))
        .collect();

    let area: f64 = widths.iter().map(|w| w * ROW_HEIGHT).sum::<f64>()
        + macros.iter().map(|(w, h)| w * h).sum::<f64>();
    let largest_macro = macros.iter().map(|(w, h)| w.max(*h)).fold(0.0, f64::max);
    let side = (area.max(1.0) / UTILIZATION)
        .sqrt()
        .ceil()
        .max(largest_macro)
        .max(4.0);

    let mut design = Design::new(format!("rand_{instances}_{seed}"), Rect::new(0.0, 0.0, side, side));

    let mut cells: Vec<InstId> = Vec::with_capacity(instances);
    for (i, w) in widths.iter().enumerate() {
        let x = rng.gen_range(0.0..=side - w);
        let y = rng.gen_range(0.0..=side - ROW_HEIGHT);
        cells.push(design.add_instance(Instance::new(format!("c{i}"), *w, ROW_HEIGHT).at(x, y)));
    }

    let mut anchors: Vec<InstId> = Vec::with_capacity(fixed);
    for (i, (w, h)) in macros.iter().enumerate() {
        let x = rng.gen_range(0.0..=side - w);
        let y = rng.gen_range(0.0..=side - h);
        anchors.push(design.add_instance(Instance::new(format!("m{i}"), *w, *h).at(x, y).fixed()));
    }

    for i in 1..cells.len() {
        let parent = rng.gen_range(0..i);
        design.connect(format!("t{i}"), &[cells[parent], cells[i]]);
    }

    if !cells.is_empty() {
        for (i, anchor) in anchors.iter().enumerate() {
            let cell = cells[rng.gen_range(0..cells.len())];
            design.connect(format!("a{i}"), &[*anchor, cell]);
        }
    }

    let all: Vec<InstId> = cells.iter().chain(&anchors).copied().collect();
    let global_nets = instances / 4;
    for i in 0..global_nets {
        let degree = rng.gen_range(3..=5).min(all.len());
        if degree < 2 {
            break;
        }
        let pins: Vec<InstId> = sample(&mut rng, all.len(), degree)
            .into_iter()
            .map(|k| all[k])
            .collect();
        design.connect(format!("g{i}"), &pins);
    }

    design
}
