//! `gpl place`: run the placement flow on a JSON design.
//!
//! 1. Load the design and rebuild its name index
//! 2. Load `gpl.toml` (explicit `--config`, else next to the design)
//! 3. Attach the RUDY estimator when routability mode is on
//! 4. Run initial placement and optimization (or an incremental re-run)
//! 5. Write the placed design and report

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gpl_config::PlacerConfig;
use gpl_diagnostics::DiagnosticSink;
use gpl_place::{Design, GlobalPlacer, RudyEstimator};

use crate::report::{render_diagnostics, status_name, PlaceReport};
use crate::{GlobalArgs, PlaceArgs, ReportFormat};

/// Runs the `gpl place` command.
///
/// Returns exit code 0 on success and 1 if any error diagnostic was emitted.
pub fn run(args: &PlaceArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let design_path = Path::new(&args.design);
    let design = load_design(design_path)?;
    let config = resolve_config(design_path, global)?;
    if config.timing.enabled {
        return Err("timing-driven mode needs a timing engine, which `gpl place` does not \
                    provide; set `timing.enabled = false`"
            .into());
    }
    if !(args.track_pitch > 0.0) {
        return Err(format!("track pitch must be positive, got {}", args.track_pitch).into());
    }

    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!(
            "    Placing {} ({} instances, {} nets)",
            design.name,
            design.instance_count(),
            design.net_count()
        );
    }

    let name = design.name.clone();
    let sink = Arc::new(DiagnosticSink::new());
    let mut placer = GlobalPlacer::new(design, Arc::clone(&sink));
    if config.routability.enabled {
        placer = placer.with_router(Box::new(RudyEstimator::new(
            args.track_pitch,
            args.track_pitch,
        )));
    }
    placer.configure(config)?;

    let result = if args.incremental {
        placer.run_incremental()
    } else if args.skip_initial {
        placer.run_optimization(0)
    } else {
        placer.run().map(|outcome| outcome.nesterov)
    };

    if args.format == ReportFormat::Text {
        render_diagnostics(&sink, global.color, global.quiet);
    }
    let outcome = result?;

    let output = args
        .output
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output(design_path));
    let placed = placer.into_db();
    std::fs::write(&output, serde_json::to_string_pretty(&placed)?)?;

    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                eprintln!(
                    "    Finished {}: {} after {} iterations, overflow {:.4}, HPWL {:.6e}",
                    name,
                    status_name(outcome.status),
                    outcome.iterations,
                    outcome.overflow,
                    outcome.hpwl
                );
                eprintln!("       Wrote {}", output.display());
            }
        }
        ReportFormat::Json => {
            let report = PlaceReport::new(&name, &output.to_string_lossy(), &outcome, &sink);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(if sink.has_errors() { 1 } else { 0 })
}

/// Reads a design from JSON and checks it.
pub fn load_design(path: &Path) -> Result<Design, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let mut design: Design = serde_json::from_str(&content)
        .map_err(|e| format!("cannot parse {}: {e}", path.display()))?;
    design.rebuild_indices();
    design.validate()?;
    Ok(design)
}

fn resolve_config(design_path: &Path, global: &GlobalArgs) -> Result<PlacerConfig, Box<dyn Error>> {
    let config = match &global.config {
        Some(path) => gpl_config::load_config_file(Path::new(path))?,
        None => {
            let dir = design_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            gpl_config::load_config(dir)?
        }
    };
    Ok(config)
}

fn default_output(design_path: &Path) -> PathBuf {
    let stem = design_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "design".to_string());
    design_path.with_file_name(format!("{stem}.placed.json"))
}
