//! Infeasible probes met during the capacity search, by bus and by the
//! contingency that caused them.

use gridcap_core::BusId;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::contingency::{LimitingFactor, LimitingSubsystem};
use crate::violations::Violations;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnfeasibleCondition {
    pub power_mva: Complex64,
    pub lf: LimitingFactor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityStats {
    pub bus: BusId,
    pub unfeasible_conditions: Vec<UnfeasibleCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyCondition {
    pub power_mva: Complex64,
    pub v: Violations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusContingencyConditions {
    pub b: BusId,
    pub cc: Vec<ContingencyCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyStats {
    pub contingency: LimitingSubsystem,
    pub bus_contingency_conditions: Vec<BusContingencyConditions>,
}

impl ContingencyStats {
    /// Conditions over all buses
    pub fn total(&self) -> usize {
        self.bus_contingency_conditions
            .iter()
            .map(|b| b.cc.len())
            .sum()
    }
}

/// Both views keep first-seen order, so a report lists buses in the order
/// they were analysed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityAnalysisStats {
    pub feasibility_stats: Vec<FeasibilityStats>,
    pub contingency_stats: Vec<ContingencyStats>,
}

impl CapacityAnalysisStats {
    pub fn reset(&mut self) {
        self.feasibility_stats.clear();
        self.contingency_stats.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.feasibility_stats.is_empty() && self.contingency_stats.is_empty()
    }

    /// Record one infeasible probe. Generation probes arrive negated.
    pub fn update(&mut self, bus: BusId, power_mva: Complex64, lf: &LimitingFactor) {
        let position = self.feasibility_stats.iter().position(|f| f.bus == bus);
        let feasibility = match position {
            Some(i) => &mut self.feasibility_stats[i],
            None => {
                self.feasibility_stats.push(FeasibilityStats {
                    bus,
                    unfeasible_conditions: Vec::new(),
                });
                let last = self.feasibility_stats.len() - 1;
                &mut self.feasibility_stats[last]
            }
        };
        feasibility.unfeasible_conditions.push(UnfeasibleCondition {
            power_mva,
            lf: lf.clone(),
        });

        if lf.ss.is_none() {
            return;
        }
        let position = self
            .contingency_stats
            .iter()
            .position(|c| c.contingency == lf.ss);
        let contingency = match position {
            Some(i) => &mut self.contingency_stats[i],
            None => {
                self.contingency_stats.push(ContingencyStats {
                    contingency: lf.ss.clone(),
                    bus_contingency_conditions: Vec::new(),
                });
                let last = self.contingency_stats.len() - 1;
                &mut self.contingency_stats[last]
            }
        };
        let condition = ContingencyCondition { power_mva, v: lf.v };
        match contingency
            .bus_contingency_conditions
            .iter_mut()
            .find(|c| c.b == bus)
        {
            Some(conditions) => conditions.cc.push(condition),
            None => contingency
                .bus_contingency_conditions
                .push(BusContingencyConditions {
                    b: bus,
                    cc: vec![condition],
                }),
        }
    }

    pub fn bus_conditions(&self, bus: BusId) -> &[UnfeasibleCondition] {
        self.feasibility_stats
            .iter()
            .find(|f| f.bus == bus)
            .map_or(&[], |f| f.unfeasible_conditions.as_slice())
    }

    /// Contingencies with the most conditions first; ties keep first-seen order.
    pub fn contingencies_by_count(&self) -> Vec<&ContingencyStats> {
        let mut sorted: Vec<&ContingencyStats> = self.contingency_stats.iter().collect();
        sorted.sort_by_key(|c| std::cmp::Reverse(c.total()));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcap_core::BranchKey;

    fn trip(from: usize, to: usize) -> LimitingSubsystem {
        LimitingSubsystem::Branch(BranchKey::new(BusId::new(from), BusId::new(to), "1"))
    }

    #[test]
    fn test_update_groups_by_bus_and_contingency() {
        let mut stats = CapacityAnalysisStats::default();
        let b5 = BusId::new(5);
        let b2 = BusId::new(2);
        stats.update(
            b5,
            Complex64::new(100.0, 48.0),
            &LimitingFactor::normal(Violations::BUS_UNDERVOLTAGE),
        );
        stats.update(
            b5,
            Complex64::new(50.0, 24.0),
            &LimitingFactor::new(Violations::BRANCH_LOADING, trip(1, 2)),
        );
        stats.update(
            b2,
            Complex64::new(-80.0, -10.0),
            &LimitingFactor::new(Violations::BRANCH_LOADING, trip(1, 2)),
        );
        stats.update(
            b2,
            Complex64::new(-40.0, -5.0),
            &LimitingFactor::new(Violations::BUS_OVERVOLTAGE, trip(2, 3)),
        );

        assert_eq!(stats.feasibility_stats.len(), 2);
        assert_eq!(stats.feasibility_stats[0].bus, b5);
        assert_eq!(stats.bus_conditions(b5).len(), 2);
        assert_eq!(stats.bus_conditions(BusId::new(9)).len(), 0);

        assert_eq!(stats.contingency_stats.len(), 2);
        let first = &stats.contingency_stats[0];
        assert_eq!(first.contingency, trip(1, 2));
        assert_eq!(first.bus_contingency_conditions.len(), 2);
        assert_eq!(first.bus_contingency_conditions[1].cc[0].power_mva.re, -80.0);
        assert_eq!(stats.contingencies_by_count()[0].contingency, trip(1, 2));
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let mut stats = CapacityAnalysisStats::default();
        for p in [100.0, 50.0, 75.0] {
            stats.update(
                BusId::new(3),
                Complex64::new(p, p / 2.0),
                &LimitingFactor::new(Violations::TRAFO_LOADING, trip(3, 4)),
            );
        }
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(
            json["feasibility_stats"][0]["unfeasible_conditions"][0]["power_mva"],
            serde_json::json!([100.0, 50.0])
        );
        assert_eq!(
            json["contingency_stats"][0]["bus_contingency_conditions"][0]["cc"][2]["v"],
            "TRAFO_LOADING"
        );
        let back: CapacityAnalysisStats = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats);
    }
}
