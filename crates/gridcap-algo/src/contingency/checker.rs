use gridcap_core::GridCapResult;
use tracing::debug;

use super::{ContingencyScenario, LimitingFactor, LimitingSubsystem};
use crate::context::AnalysisContext;
use crate::engine::{DisabledBranch, DisabledTrafo, GridEngine};
use crate::power_flow::SolverMethod;
use crate::violations::{check_violations, Violations, ViolationsLimits};

/// Replay the scenario's outages, branches first, and return the first one
/// that produces any violation.
///
/// Elements that are already out of service in the current state are skipped.
/// A clean pass yields `NO_VIOLATIONS` with no limiting element.
pub fn contingency_limiting_factor<E: GridEngine>(
    engine: &mut E,
    ctx: &mut AnalysisContext,
    scenario: &ContingencyScenario,
    limits: &ViolationsLimits,
    method: SolverMethod,
) -> GridCapResult<LimitingFactor> {
    for key in &scenario.branches {
        let Some(mut guard) = DisabledBranch::new(engine, key) else {
            continue;
        };
        let v = check_violations(&mut *guard, ctx, limits, method)?;
        if v != Violations::NO_VIOLATIONS {
            debug!(branch = %key, violations = %v, "contingency violated");
            return Ok(LimitingFactor::new(v, LimitingSubsystem::Branch(key.clone())));
        }
    }

    for key in &scenario.trafos {
        let Some(mut guard) = DisabledTrafo::new(engine, key) else {
            continue;
        };
        let v = check_violations(&mut *guard, ctx, limits, method)?;
        if v != Violations::NO_VIOLATIONS {
            debug!(trafo = %key, violations = %v, "contingency violated");
            return Ok(LimitingFactor::new(v, LimitingSubsystem::Trafo(key.clone())));
        }
    }

    Ok(LimitingFactor::normal(Violations::NO_VIOLATIONS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{ScriptedEngine, Solved};
    use gridcap_core::{BranchKey, BusId};

    fn key(from: usize, to: usize, circuit: &str) -> BranchKey {
        BranchKey::new(BusId::new(from), BusId::new(to), circuit)
    }

    fn full_scenario() -> ContingencyScenario {
        ContingencyScenario {
            branches: vec![key(1, 2, "1"), key(1, 4, "1"), key(1, 4, "2")],
            trafos: vec![key(2, 3, "1")],
        }
    }

    fn check(engine: &mut ScriptedEngine) -> LimitingFactor {
        let mut ctx = AnalysisContext::default();
        contingency_limiting_factor(
            engine,
            &mut ctx,
            &full_scenario(),
            &ViolationsLimits::contingency(),
            SolverMethod::Fdns,
        )
        .unwrap()
    }

    #[test]
    fn test_clean_pass() {
        let mut engine = ScriptedEngine::new();
        let lf = check(&mut engine);
        assert_eq!(lf, LimitingFactor::normal(Violations::NO_VIOLATIONS));
        assert_eq!(engine.solves.len(), 4);
    }

    #[test]
    fn test_first_failure_wins() {
        // either 1-4 circuit overloads the other when it trips
        let mut engine = ScriptedEngine::with_script(|s| {
            let mut solved = Solved::nominal(s);
            let circuits_1_4 = s
                .branches
                .iter()
                .filter(|(k, on)| *on && k.from_bus == BusId::new(1) && k.to_bus == BusId::new(4))
                .count();
            if circuits_1_4 < 2 {
                solved.branch_loading[1] = 125.0;
            }
            Some(solved)
        });
        let lf = check(&mut engine);
        assert_eq!(lf.v, Violations::BRANCH_LOADING);
        assert_eq!(lf.ss, LimitingSubsystem::Branch(key(1, 4, "1")));
        // 1-2 and the first 1-4 circuit were tried, nothing after
        assert_eq!(engine.solves.len(), 2);
        assert!(engine.branches(Default::default()).iter().all(|b| b.enabled));
    }

    #[test]
    fn test_trafo_outage_reported() {
        let mut engine = ScriptedEngine::with_script(|s| {
            if s.trafo_enabled(2, 3) {
                Some(Solved::nominal(s))
            } else {
                None
            }
        });
        let lf = check(&mut engine);
        assert_eq!(
            lf,
            LimitingFactor::new(
                Violations::NOT_CONVERGED,
                LimitingSubsystem::Trafo(key(2, 3, "1"))
            )
        );
    }

    #[test]
    fn test_disabled_elements_are_skipped() {
        let mut engine = ScriptedEngine::new();
        engine.set_branch_status(&key(1, 2, "1"), false).unwrap();
        let lf = check(&mut engine);
        assert!(lf.is_clean());
        assert_eq!(engine.solves.len(), 3);
        // left as found
        assert!(!engine.branches(Default::default())[0].enabled);
    }
}
