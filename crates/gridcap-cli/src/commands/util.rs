use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gridcap_algo::{GridEngine, NativeEngine, PowerFlowOptions, SolverMethod, ViolationsLimits};

pub fn solver_method(full_newton: bool) -> SolverMethod {
    if full_newton {
        SolverMethod::Fnsl
    } else {
        SolverMethod::Fdns
    }
}

/// Limits from a JSON file, or `default` when no file is given.
pub fn read_limits(
    path: Option<&Path>,
    default: fn() -> ViolationsLimits,
) -> Result<ViolationsLimits> {
    let Some(path) = path else {
        return Ok(default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading limits '{}'", path.display()))?;
    let limits: ViolationsLimits = serde_json::from_str(&text)
        .with_context(|| format!("parsing limits '{}'", path.display()))?;
    limits.validate(&path.display().to_string())?;
    Ok(limits)
}

pub fn open_engine(case: &Path) -> Result<NativeEngine> {
    let mut engine = NativeEngine::new(PowerFlowOptions::default());
    engine
        .open_case(case)
        .with_context(|| format!("opening case '{}'", case.display()))?;
    Ok(engine)
}
