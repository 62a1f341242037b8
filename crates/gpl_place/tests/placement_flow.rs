//! End-to-end tests of the placement flow on small synthetic designs.

mod common;

use common::{
    assert_legal_bounds, benchmark, benchmark_config, centers, real_overflow, Recorder,
};
use gpl_config::{ConfigError, PlacerConfig};
use gpl_diagnostics::DiagnosticSink;
use gpl_place::{
    BinGrid, Design, GlobalPlacer, InstId, Instance, NesterovStatus, PlaceError, Point, Rect,
};
use std::sync::Arc;

fn placer(design: Design) -> GlobalPlacer<Design> {
    GlobalPlacer::new(design, Arc::new(DiagnosticSink::new()))
}

#[test]
fn bins_tile_the_core() {
    let core = Rect::new(-13.5, 7.25, 1021.0, 333.3);
    let mut grids = vec![
        BinGrid::new(core, 1, 1),
        BinGrid::new(core, 3, 7),
        BinGrid::new(core, 16, 16),
        BinGrid::new(core, 1024, 5),
    ];
    grids.push(BinGrid::auto(core, 12.0, 0.7));
    for grid in grids {
        let mut total = 0.0;
        for iy in 0..grid.ny() {
            for ix in 0..grid.nx() {
                total += grid.bin_area(ix, iy);
            }
        }
        assert!(
            (total - core.area()).abs() <= 1e-9 * core.area(),
            "{}x{} grid covers {total}, core is {}",
            grid.nx(),
            grid.ny(),
            core.area()
        );
    }
}

#[test]
fn two_cells_collapse_onto_their_anchor() {
    let mut d = Design::new("anchor", Rect::new(0.0, 0.0, 100.0, 100.0));
    let f = d.add_instance(Instance::new("f", 2.0, 2.0).at(19.0, 29.0).fixed());
    let a = d.add_instance(Instance::new("a", 2.0, 2.0).at(80.0, 80.0));
    let b = d.add_instance(Instance::new("b", 2.0, 2.0).at(5.0, 90.0));
    d.connect("n", &[a, b, f]);

    let mut p = placer(d);
    let report = p.run_initial_placement().unwrap();
    assert!(report.converged);
    let d = p.into_db();
    for name in ["a", "b"] {
        let c = d.instance_by_name(name).unwrap().center();
        assert!((c.x - 20.0).abs() < 1e-3, "{name} at {c:?}");
        assert!((c.y - 30.0).abs() < 1e-3, "{name} at {c:?}");
    }
    assert!(d.hpwl() < 1e-2);
}

#[test]
fn benchmark_converges_below_target_overflow() {
    let mut p = placer(benchmark());
    p.configure(benchmark_config()).unwrap();
    let outcome = p.run().unwrap().nesterov;

    assert_eq!(outcome.status, NesterovStatus::Converged, "{outcome:?}");
    assert!(outcome.overflow <= 0.1 + 1e-9);
    assert!(outcome.hpwl.is_finite() && outcome.hpwl > 0.0);
    assert!(outcome.density_penalty.is_finite());
    assert!(outcome.iterations <= 600);
    assert!(p.sink().contains_code(3));
    assert!(!p.sink().contains_code(103));

    let d = p.into_db();
    assert_legal_bounds(&d);
    let measured = real_overflow(&d, 8, 8, 1.0);
    assert!(measured <= 0.1 + 1e-6, "true overflow {measured}");
    assert_eq!(d.instance_by_name("west").unwrap().location, Point::new(0.0, 0.0));
    assert_eq!(d.instance_by_name("east").unwrap().location, Point::new(10.0, 0.0));
}

#[test]
fn four_bin_grid_reports_a_well_formed_outcome() {
    let mut config = benchmark_config();
    config.nesterov.bin_grid_x = 2;
    config.nesterov.bin_grid_y = 2;
    config.nesterov.max_iter = 300;
    let mut p = placer(benchmark());
    p.configure(config).unwrap();
    let outcome = p.run().unwrap().nesterov;

    assert!(outcome.overflow.is_finite());
    assert!(outcome.density_penalty.is_finite());
    assert!(outcome.iterations <= 300);
    match outcome.status {
        NesterovStatus::Converged => assert!(outcome.overflow <= 0.1 + 1e-9),
        NesterovStatus::MaxIterations => assert_eq!(outcome.iterations, 300),
        NesterovStatus::Diverged => assert!(p.sink().contains_code(104)),
    }
    let d = p.into_db();
    assert_legal_bounds(&d);
    assert!((real_overflow(&d, 2, 2, 1.0) - outcome.overflow).abs() < 1e-6);
}

#[test]
fn spreads_a_collapsed_chain_with_the_automatic_grid() {
    let core = Rect::new(0.0, 0.0, 100.0, 100.0);
    let mut d = Design::new("chain100", core);
    let cells: Vec<InstId> = (0..100)
        .map(|i| d.add_instance(Instance::new(format!("u{i}"), 6.0, 6.0).at(47.0, 47.0)))
        .collect();
    for i in 0..99 {
        d.connect(format!("n{i}"), &[cells[i], cells[i + 1]]);
    }
    let mut config = PlacerConfig::default();
    config.nesterov.target_density = 0.7;
    config.nesterov.max_iter = 2000;
    let mut p = placer(d);
    p.configure(config).unwrap();
    let outcome = p.run().unwrap().nesterov;

    assert_eq!(outcome.status, NesterovStatus::Converged, "{outcome:?}");
    assert!(outcome.overflow <= 0.1 + 1e-9);
    assert!(outcome.density_penalty.is_finite());

    let placed = p.into_db();
    assert_legal_bounds(&placed);
    let grid = BinGrid::auto(core, 36.0, 0.7);
    assert_eq!((grid.nx(), grid.ny()), (8, 8));
    let measured = real_overflow(&placed, grid.nx(), grid.ny(), 0.7);
    assert!(measured <= 0.1 + 1e-6, "true overflow {measured}");
}

#[test]
fn reset_and_initial_placement_is_deterministic() {
    let mut p = placer(benchmark());
    p.run_initial_placement().unwrap();
    let first = centers(p.db());

    p.reset().unwrap();
    p.run_initial_placement().unwrap();
    assert_eq!(centers(p.db()), first);

    p.set_force_sequential(true);
    p.run_initial_placement().unwrap();
    assert_eq!(centers(p.db()), first);
}

#[test]
fn target_density_setter_validates() {
    let mut p = placer(benchmark());
    for bad in [0.0, 1.5, -0.2, f64::NAN] {
        let err = p.set_target_density(bad).unwrap_err();
        match err {
            PlaceError::Config(ConfigError::OutOfRange { field, .. }) => {
                assert_eq!(field, "nesterov.target_density")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
    p.set_uniform_target_density_mode(true);
    p.set_target_density(0.7).unwrap();
    assert_eq!(p.target_density(), 0.7);
    // 864 movable over 1600 - 8 free, rounded up to a hundredth.
    assert!((p.uniform_target_density().unwrap() - 0.55).abs() < 1e-12);

    // The configured target leaves the whitespace ratio alone.
    p.set_target_density(0.9).unwrap();
    assert_eq!(p.target_density(), 0.9);
    assert!((p.uniform_target_density().unwrap() - 0.55).abs() < 1e-12);
}

#[test]
fn incremental_run_skips_initial_placement() {
    let mut config = benchmark_config();
    config.nesterov.max_iter = 40;
    let mut p = placer(benchmark());
    p.configure(config).unwrap();
    p.run().unwrap();

    let optimized_hpwl = p.model().unwrap().hpwl();
    let initial_hpwl = {
        let mut fresh = placer(benchmark());
        fresh.run_initial_placement().unwrap().hpwl
    };
    assert!((optimized_hpwl - initial_hpwl).abs() > 1e-6);

    p.sink().take_all();
    let again = p.run_incremental().unwrap();
    assert!(!p.sink().contains_code(1), "initial placement must not rerun");
    assert_eq!(again.start_hpwl, optimized_hpwl);
    assert!(again.overflow.is_finite());
    assert!(p.sink().contains_code(3));
}

#[test]
fn incremental_run_starts_from_database_positions() {
    let mut p = placer(benchmark());
    p.configure(benchmark_config()).unwrap();
    let first = p.run().unwrap().nesterov;
    let placed = p.into_db();
    let placed_centers = centers(&placed);

    let mut q = placer(placed);
    let mut config = benchmark_config();
    config.nesterov.max_iter = 1;
    q.configure(config).unwrap();
    q.reset().unwrap();
    let model = q.model().unwrap();
    assert_eq!(model.centers(), placed_centers);

    let outcome = q.run_incremental().unwrap();
    assert!(!q.sink().contains_code(1));
    assert!(outcome.iterations <= 1);
    // One step from the optimized layout stays in its neighborhood.
    assert!(
        outcome.hpwl < 2.0 * first.hpwl,
        "{} vs {}",
        outcome.hpwl,
        first.hpwl
    );
}

#[test]
fn observer_sees_frames_without_changing_results() {
    let mut config = benchmark_config();
    config.force_sequential = true;
    config.nesterov.max_iter = 25;

    let mut plain = placer(benchmark());
    plain.configure(config.clone()).unwrap();
    plain.run().unwrap();

    config.debug.enabled = true;
    config.debug.initial = true;
    config.debug.update_iterations = 1;
    config.debug.pause_iterations = 5;
    let recorder = Recorder::default();
    let mut watched = placer(benchmark()).with_observer(Box::new(recorder.clone()));
    watched.configure(config).unwrap();
    watched.run().unwrap();

    assert_eq!(centers(plain.db()), centers(watched.db()));
    let frames = recorder.frames.lock().unwrap();
    assert!(frames.len() >= 5, "got {} frames", frames.len());
    assert!(frames.iter().all(|(_, hpwl)| hpwl.is_finite()));
    assert!(recorder.pauses.load(std::sync::atomic::Ordering::SeqCst) > 0);
}
