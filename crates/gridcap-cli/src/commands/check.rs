use std::io;
use std::path::Path;

use anyhow::Result;
use gridcap_algo::violations::check_violations;
use gridcap_algo::{AnalysisContext, Violations, ViolationsLimits};
use gridcap_cli::report;

use crate::commands::util::{open_engine, read_limits, solver_method};

pub fn handle(case: &Path, limits: Option<&Path>, full_newton: bool) -> Result<()> {
    let limits = read_limits(limits, ViolationsLimits::normal)?;
    let mut engine = open_engine(case)?;
    let mut ctx = AnalysisContext::default();
    let v = check_violations(&mut engine, &mut ctx, &limits, solver_method(full_newton))?;

    println!("Violations: {v}");
    if v != Violations::NO_VIOLATIONS && v != Violations::NOT_CONVERGED {
        report::write_violation_stats(
            io::stdout().lock(),
            &ctx.violations_stats,
            &engine,
            &limits,
        )?;
    }
    Ok(())
}
