//! Per-run analysis state shared by the classifier, the contingency checks
//! and the capacity search.

use std::fmt;

use crate::capacity::stats::CapacityAnalysisStats;
use crate::violations::{log_event, PowerFlows, Violations, ViolationsStats};

#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub violations_stats: ViolationsStats,
    pub capacity_stats: CapacityAnalysisStats,
    pub power_flows: PowerFlows,
    /// Flags found by the base-case check, `NO_VIOLATIONS` when clean
    pub base_case_violations: Violations,
    /// Violation values of the base-case check
    pub base_case_stats: ViolationsStats,
    /// Log violation events at WARN instead of INFO
    pub violations_as_warnings: bool,
}

impl AnalysisContext {
    pub fn new(violations_as_warnings: bool) -> Self {
        Self {
            violations_as_warnings,
            ..Self::default()
        }
    }

    /// Clear both stats collectors.
    pub fn reset(&mut self) {
        self.violations_stats.reset();
        self.capacity_stats.reset();
    }

    pub(crate) fn log_violation(&self, message: fmt::Arguments<'_>) {
        log_event(self.violations_as_warnings, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::LimitingFactor;
    use gridcap_core::BusId;
    use num_complex::Complex64;

    #[test]
    fn test_reset_clears_both_stats() {
        let mut ctx = AnalysisContext::new(true);
        ctx.violations_stats
            .append(Violations::BUS_OVERVOLTAGE, 1.1, &[(0, 1.2)]);
        ctx.capacity_stats.update(
            BusId::new(1),
            Complex64::new(10.0, 0.0),
            &LimitingFactor::normal(Violations::BUS_OVERVOLTAGE),
        );
        ctx.power_flows.increment();
        ctx.reset();
        assert!(ctx.violations_stats.is_empty());
        assert!(ctx.capacity_stats.is_empty());
        // the counter has its own reset point
        assert_eq!(ctx.power_flows.count(), 1);
        assert!(ctx.violations_as_warnings);
    }
}
