use gridcap_core::GridCapResult;
use tracing::{debug, info};

use super::ContingencyScenario;
use crate::context::AnalysisContext;
use crate::engine::{DisabledBranch, DisabledTrafo, GridEngine};
use crate::power_flow::SolverMethod;
use crate::violations::{check_violations, Violations, ViolationsLimits};

/// Collect every in-service branch, then every 2-winding transformer, whose
/// single outage leaves the case free of violations under `limits`.
///
/// The engine state is restored element by element, but the caller should
/// reload the case before solving anything else.
pub fn build_contingency_scenario<E: GridEngine>(
    engine: &mut E,
    ctx: &mut AnalysisContext,
    limits: &ViolationsLimits,
    method: SolverMethod,
) -> GridCapResult<ContingencyScenario> {
    let mut scenario = ContingencyScenario::default();

    let branches: Vec<_> = engine
        .branches(limits.branch_rate)
        .into_iter()
        .filter(|b| b.enabled)
        .map(|b| b.key)
        .collect();
    for key in branches {
        let Some(mut guard) = DisabledBranch::new(engine, &key) else {
            continue;
        };
        let v = check_violations(&mut *guard, ctx, limits, method)?;
        if v == Violations::NO_VIOLATIONS {
            scenario.branches.push(key);
        } else {
            debug!(branch = %key, violations = %v, "outage is critical");
        }
    }

    let trafos: Vec<_> = engine
        .trafos(limits.trafo_rate)
        .into_iter()
        .filter(|t| t.enabled)
        .map(|t| t.key)
        .collect();
    for key in trafos {
        let Some(mut guard) = DisabledTrafo::new(engine, &key) else {
            continue;
        };
        let v = check_violations(&mut *guard, ctx, limits, method)?;
        if v == Violations::NO_VIOLATIONS {
            scenario.trafos.push(key);
        } else {
            debug!(trafo = %key, violations = %v, "outage is critical");
        }
    }

    info!("contingency scenario built: {scenario}");
    Ok(scenario)
}
