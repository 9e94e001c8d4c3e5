use std::io;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use gridcap_algo::capacity::load_config;
use gridcap_algo::{CapacityAnalyser, NativeEngine, Violations};
use gridcap_cli::report;
use tracing::info;

pub fn handle(
    config_path: &Path,
    violations_as_warnings: bool,
    out_dir: Option<&Path>,
    no_print: bool,
) -> Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?;
    config.treat_violations_as_warnings |= violations_as_warnings;
    info!(
        "Analysing headroom of {} (load up to {} MW, generation up to {} MW)",
        config.case_name.display(),
        config.upper_load_limit_p_mw,
        config.upper_gen_limit_p_mw
    );

    let engine = NativeEngine::new(config.solver_opts);
    let mut analyser = CapacityAnalyser::new(engine, config)?;
    info!(
        "Solver method {}, contingency scenario of {}",
        analyser.method(),
        analyser.scenario()
    );
    let headroom = analyser.buses_headroom()?;
    info!(
        "Analysed {} buses with {} power flows in {:.2?}",
        headroom.len(),
        analyser.context().power_flows.count(),
        start.elapsed()
    );

    if !no_print {
        let ctx = analyser.context();
        let limits = &analyser.config().normal_limits;
        let stdout = io::stdout();
        if ctx.base_case_violations != Violations::NO_VIOLATIONS {
            println!("Base case violations: {}", ctx.base_case_violations);
            report::write_violation_stats(
                stdout.lock(),
                &ctx.base_case_stats,
                analyser.engine(),
                limits,
            )?;
            println!();
        }
        report::write_headroom_table(stdout.lock(), &headroom)?;
        if !ctx.violations_stats.is_empty() {
            println!();
            report::write_violation_stats(
                stdout.lock(),
                &ctx.violations_stats,
                analyser.engine(),
                limits,
            )?;
        }
        if !ctx.capacity_stats.is_empty() {
            println!();
            report::write_capacity_stats(stdout.lock(), &ctx.capacity_stats)?;
        }
    }

    let paths = report::write_reports(
        &analyser.config().case_name,
        out_dir,
        &headroom,
        analyser.context(),
    )?;
    for path in paths.all() {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
