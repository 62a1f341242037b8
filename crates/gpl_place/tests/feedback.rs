//! Routability and timing feedback driven through the orchestrator.

mod common;

use common::{benchmark, benchmark_config, BrokenRouter, CountingRouter, FirstNetCritical};
use gpl_diagnostics::DiagnosticSink;
use gpl_place::{GlobalPlacer, NesterovStatus, Phase, PlaceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn router_is_consulted_below_check_overflow() {
    let (router, calls) = CountingRouter::new();
    let mut config = benchmark_config();
    config.nesterov.max_iter = 1000;
    config.routability.enabled = true;
    config.routability.check_overflow = 0.9;
    config.routability.max_inflation_iter = 1;
    config.routability.max_inflation_ratio = 1.2;

    let sink = Arc::new(DiagnosticSink::new());
    let mut p = GlobalPlacer::new(benchmark(), sink.clone()).with_router(Box::new(router));
    p.configure(config).unwrap();
    let outcome = p.run().unwrap().nesterov;

    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert!(sink.contains_code(201));
    // Inflated cells still fit, so spreading finishes after the feedback.
    assert_eq!(outcome.status, NesterovStatus::Converged, "{outcome:?}");
    assert!(outcome.overflow <= 0.1 + 1e-9);
    // Inflation never leaks into the database sizes.
    let d = p.into_db();
    assert!(d.instances.iter().skip(2).all(|i| i.width == 12.0 && i.height == 12.0));
}

#[test]
fn router_survives_reset() {
    let (router, calls) = CountingRouter::new();
    let mut config = benchmark_config();
    config.nesterov.max_iter = 30;
    config.routability.enabled = true;
    config.routability.check_overflow = 1.0;

    let mut p = GlobalPlacer::new(benchmark(), Arc::new(DiagnosticSink::new()))
        .with_router(Box::new(router));
    p.configure(config).unwrap();
    p.run().unwrap();
    let after_first = calls.load(Ordering::SeqCst);
    assert!(after_first >= 1);

    p.reset().unwrap();
    p.run().unwrap();
    assert!(calls.load(Ordering::SeqCst) > after_first);
}

#[test]
fn router_failure_aborts_with_phase() {
    let mut config = benchmark_config();
    config.routability.enabled = true;
    config.routability.check_overflow = 1.0;

    let sink = Arc::new(DiagnosticSink::new());
    let mut p = GlobalPlacer::new(benchmark(), sink.clone()).with_router(Box::new(BrokenRouter));
    p.configure(config).unwrap();
    p.run_initial_placement().unwrap();
    let err = p.run_optimization(0).unwrap_err();
    assert!(matches!(
        err,
        PlaceError::ExternalEngine {
            phase: Phase::Routability,
            ..
        }
    ));
    assert!(sink.has_errors());
    assert!(sink.contains_code(401));
}

#[test]
fn timing_checkpoint_raises_a_net_weight() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = FirstNetCritical {
        calls: Arc::clone(&calls),
    };
    let mut config = benchmark_config();
    config.nesterov.max_iter = 5;
    config.timing.enabled = true;
    config.timing.net_weight_overflows = vec![100];

    let sink = Arc::new(DiagnosticSink::new());
    let mut p =
        GlobalPlacer::new(benchmark(), sink.clone()).with_timing_engine(Box::new(engine));
    p.configure(config.clone()).unwrap();
    p.run_initial_placement().unwrap();
    p.run_optimization(0).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1, "one checkpoint fires once");
    assert!(sink.contains_code(301));
    let weights = p.model().unwrap().net_weights();
    assert!(weights[0] > 1.0);
    assert!(weights[0] <= config.timing.net_weight_max);
    assert!(weights[1..].iter().all(|&w| w == 1.0));
}

#[test]
fn timing_mode_without_engine_is_rejected() {
    let mut p = GlobalPlacer::new(benchmark(), Arc::new(DiagnosticSink::new()));
    p.set_timing_driven_mode(true);
    p.run_initial_placement().unwrap();
    let err = p.run_optimization(0).unwrap_err();
    assert!(matches!(
        err,
        PlaceError::MissingEngine {
            phase: Phase::Timing
        }
    ));
}
