use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gridcap_algo::contingency::build_contingency_scenario;
use gridcap_algo::{AnalysisContext, ViolationsLimits};
use tracing::info;

use crate::commands::util::{open_engine, read_limits, solver_method};

pub fn handle(
    case: &Path,
    limits: Option<&Path>,
    full_newton: bool,
    out: Option<&Path>,
) -> Result<()> {
    let limits = read_limits(limits, ViolationsLimits::contingency)?;
    let method = solver_method(full_newton);
    let mut engine = open_engine(case)?;
    let mut ctx = AnalysisContext::default();
    info!("Building contingency scenario of {} with {}", case.display(), method);
    let scenario = build_contingency_scenario(&mut engine, &mut ctx, &limits, method)?;

    let json = serde_json::to_string_pretty(&scenario)?;
    match out {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("writing scenario '{}'", path.display()))?;
            println!("Wrote {} ({})", path.display(), scenario);
        }
        None => println!("{json}"),
    }
    Ok(())
}
