//! Violation classification of a solved network state.
//!
//! [`check_violations`] runs one solve and compares every bus, branch,
//! transformer and swing bus against a [`ViolationsLimits`] set. The result
//! is a [`Violations`] flag set; the offending elements and their values go
//! to the run's [`ViolationsStats`].

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

use gridcap_core::{GridCapError, GridCapResult, Rate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::context::AnalysisContext;
use crate::engine::GridEngine;
use crate::power_flow::SolverMethod;

/// Independent violation flags.
///
/// `NOT_CONVERGED` never appears together with another flag: without a
/// converged solve the other checks have nothing to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Violations(u8);

impl Violations {
    pub const NO_VIOLATIONS: Violations = Violations(0);
    pub const NOT_CONVERGED: Violations = Violations(1);
    pub const BUS_OVERVOLTAGE: Violations = Violations(1 << 1);
    pub const BUS_UNDERVOLTAGE: Violations = Violations(1 << 2);
    pub const BRANCH_LOADING: Violations = Violations(1 << 3);
    pub const TRAFO_LOADING: Violations = Violations(1 << 4);
    pub const TRAFO_3W_LOADING: Violations = Violations(1 << 5);
    pub const SWING_BUS_LOADING: Violations = Violations(1 << 6);

    /// Single flags in declaration order
    pub const ALL: [(Violations, &'static str); 7] = [
        (Violations::NOT_CONVERGED, "NOT_CONVERGED"),
        (Violations::BUS_OVERVOLTAGE, "BUS_OVERVOLTAGE"),
        (Violations::BUS_UNDERVOLTAGE, "BUS_UNDERVOLTAGE"),
        (Violations::BRANCH_LOADING, "BRANCH_LOADING"),
        (Violations::TRAFO_LOADING, "TRAFO_LOADING"),
        (Violations::TRAFO_3W_LOADING, "TRAFO_3W_LOADING"),
        (Violations::SWING_BUS_LOADING, "SWING_BUS_LOADING"),
    ];

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Violations) -> bool {
        self.0 & other.0 == other.0
    }

    /// The single flags set in `self`
    pub fn iter(self) -> impl Iterator<Item = Violations> {
        Self::ALL
            .into_iter()
            .map(|(flag, _)| flag)
            .filter(move |flag| self.contains(*flag))
    }
}

impl BitOr for Violations {
    type Output = Violations;

    fn bitor(self, rhs: Violations) -> Violations {
        Violations(self.0 | rhs.0)
    }
}

impl BitOrAssign for Violations {
    fn bitor_assign(&mut self, rhs: Violations) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Violations {
    type Output = Violations;

    fn bitand(self, rhs: Violations) -> Violations {
        Violations(self.0 & rhs.0)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NO_VIOLATIONS");
        }
        let names: Vec<&str> = Self::ALL
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

impl FromStr for Violations {
    type Err = GridCapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "NO_VIOLATIONS" {
            return Ok(Violations::NO_VIOLATIONS);
        }
        s.split('|').try_fold(Violations::NO_VIOLATIONS, |acc, name| {
            Self::ALL
                .iter()
                .find(|(_, n)| *n == name.trim())
                .map(|(flag, _)| acc | *flag)
                .ok_or_else(|| GridCapError::Parse(format!("unknown violation '{name}'")))
        })
    }
}

impl Serialize for Violations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Violations {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Thresholds one classification runs against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViolationsLimits {
    pub max_bus_voltage_pu: f64,
    pub min_bus_voltage_pu: f64,
    pub max_branch_loading_pct: f64,
    pub max_trafo_loading_pct: f64,
    pub max_swing_bus_power_p_mw: f64,
    pub branch_rate: Rate,
    pub trafo_rate: Rate,
}

impl ViolationsLimits {
    /// Limits for the intact network
    pub fn normal() -> Self {
        Self {
            max_bus_voltage_pu: 1.1,
            min_bus_voltage_pu: 0.9,
            max_branch_loading_pct: 100.0,
            max_trafo_loading_pct: 100.0,
            max_swing_bus_power_p_mw: 1000.0,
            branch_rate: Rate::Rate1,
            trafo_rate: Rate::Rate1,
        }
    }

    /// Looser limits that apply while one element is out
    pub fn contingency() -> Self {
        Self {
            max_bus_voltage_pu: 1.12,
            min_bus_voltage_pu: 0.88,
            max_branch_loading_pct: 120.0,
            max_trafo_loading_pct: 120.0,
            max_swing_bus_power_p_mw: 1000.0,
            branch_rate: Rate::Rate2,
            trafo_rate: Rate::Rate1,
        }
    }

    pub fn validate(&self, name: &str) -> GridCapResult<()> {
        let values = [
            ("max_bus_voltage_pu", self.max_bus_voltage_pu),
            ("min_bus_voltage_pu", self.min_bus_voltage_pu),
            ("max_branch_loading_pct", self.max_branch_loading_pct),
            ("max_trafo_loading_pct", self.max_trafo_loading_pct),
            ("max_swing_bus_power_p_mw", self.max_swing_bus_power_p_mw),
        ];
        for (field, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(GridCapError::Config(format!(
                    "{name}.{field} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.min_bus_voltage_pu > self.max_bus_voltage_pu {
            return Err(GridCapError::Config(format!(
                "{name}: min_bus_voltage_pu {} is above max_bus_voltage_pu {}",
                self.min_bus_voltage_pu, self.max_bus_voltage_pu
            )));
        }
        Ok(())
    }
}

/// Violation type → limit → element index → observed values.
///
/// Limits are keyed by their decimal form so the map stays a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViolationsStats {
    stats: BTreeMap<Violations, BTreeMap<String, BTreeMap<usize, Vec<f64>>>>,
}

/// One limit of one violation type, ready for printing
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationsSection {
    pub violation: Violations,
    pub limit: f64,
    /// (element index, values), worst element first, values worst first
    pub elements: Vec<(usize, Vec<f64>)>,
}

impl ViolationsStats {
    pub fn reset(&mut self) {
        self.stats.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn append(&mut self, violation: Violations, limit: f64, values: &[(usize, f64)]) {
        let by_element = self
            .stats
            .entry(violation)
            .or_default()
            .entry(limit.to_string())
            .or_default();
        for &(idx, value) in values {
            by_element.entry(idx).or_default().push(value);
        }
    }

    pub fn values(&self, violation: Violations, limit: f64, idx: usize) -> Option<&[f64]> {
        self.stats
            .get(&violation)?
            .get(&limit.to_string())?
            .get(&idx)
            .map(Vec::as_slice)
    }

    pub fn violations(&self) -> impl Iterator<Item = Violations> + '_ {
        self.stats.keys().copied()
    }

    /// Print order: limits and elements descending by their largest value,
    /// except undervoltage, which goes ascending by the smallest value.
    pub fn sorted_sections(&self) -> Vec<ViolationsSection> {
        let mut sections = Vec::new();
        for (&violation, by_limit) in &self.stats {
            let ascending = violation == Violations::BUS_UNDERVOLTAGE;
            let mut limits: Vec<(f64, &BTreeMap<usize, Vec<f64>>)> = by_limit
                .iter()
                .filter_map(|(limit, elements)| limit.parse().ok().map(|l| (l, elements)))
                .collect();
            limits.sort_by(|a, b| {
                let order = a.0.total_cmp(&b.0);
                if ascending { order } else { order.reverse() }
            });
            for (limit, by_element) in limits {
                let mut elements: Vec<(usize, Vec<f64>)> = by_element
                    .iter()
                    .map(|(&idx, values)| {
                        let mut values = values.clone();
                        values.sort_by(|a, b| {
                            if ascending { a.total_cmp(b) } else { b.total_cmp(a) }
                        });
                        (idx, values)
                    })
                    .collect();
                // values are sorted, so the first one is the worst
                elements.sort_by(|a, b| {
                    let (x, y) = (a.1.first(), b.1.first());
                    let order = x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
                    if ascending { order } else { order.reverse() }
                });
                sections.push(ViolationsSection {
                    violation,
                    limit,
                    elements,
                });
            }
        }
        sections
    }
}

/// Solves performed during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerFlows {
    count: usize,
}

impl PowerFlows {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn increment(&mut self) {
        self.count += 1;
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Run the solver once and count it.
pub fn run_solver<E: GridEngine>(
    engine: &mut E,
    ctx: &mut AnalysisContext,
    method: SolverMethod,
) -> GridCapResult<()> {
    engine.run_solver(method)?;
    ctx.power_flows.increment();
    Ok(())
}

/// Solve and classify the result against `limits`.
pub fn check_violations<E: GridEngine>(
    engine: &mut E,
    ctx: &mut AnalysisContext,
    limits: &ViolationsLimits,
    method: SolverMethod,
) -> GridCapResult<Violations> {
    run_solver(engine, ctx, method)?;
    if !engine.is_converged() {
        ctx.log_violation(format_args!("Case not solved!"));
        return Ok(Violations::NOT_CONVERGED);
    }
    debug!("checking violations");
    let mut v = Violations::NO_VIOLATIONS;

    let voltages: Vec<(usize, f64)> = engine
        .buses()
        .iter()
        .enumerate()
        .map(|(i, b)| (i, b.voltage_pu))
        .collect();
    let over: Vec<_> = voltages
        .iter()
        .copied()
        .filter(|&(_, u)| u > limits.max_bus_voltage_pu)
        .collect();
    v |= record(ctx, Violations::BUS_OVERVOLTAGE, limits.max_bus_voltage_pu, &over);
    let under: Vec<_> = voltages
        .iter()
        .copied()
        .filter(|&(_, u)| u < limits.min_bus_voltage_pu)
        .collect();
    v |= record(ctx, Violations::BUS_UNDERVOLTAGE, limits.min_bus_voltage_pu, &under);

    let branches = overloaded(
        engine.branches(limits.branch_rate).iter().map(|b| b.loading_pct),
        limits.max_branch_loading_pct,
    );
    v |= record(ctx, Violations::BRANCH_LOADING, limits.max_branch_loading_pct, &branches);

    let trafos = overloaded(
        engine.trafos(limits.trafo_rate).iter().map(|t| t.loading_pct),
        limits.max_trafo_loading_pct,
    );
    v |= record(ctx, Violations::TRAFO_LOADING, limits.max_trafo_loading_pct, &trafos);

    let trafos3w = overloaded(
        engine.trafos3w(limits.trafo_rate).iter().map(|t| t.loading_pct),
        limits.max_trafo_loading_pct,
    );
    v |= record(ctx, Violations::TRAFO_3W_LOADING, limits.max_trafo_loading_pct, &trafos3w);

    let swing = overloaded(
        engine.swing_buses().iter().map(|s| s.p_mw),
        limits.max_swing_bus_power_p_mw,
    );
    v |= record(ctx, Violations::SWING_BUS_LOADING, limits.max_swing_bus_power_p_mw, &swing);

    Ok(v)
}

/// Human-readable name of the element behind a stats index
pub fn element_label<E: GridEngine + ?Sized>(
    engine: &E,
    violation: Violations,
    idx: usize,
    limits: &ViolationsLimits,
) -> String {
    let label = match violation {
        Violations::BUS_OVERVOLTAGE | Violations::BUS_UNDERVOLTAGE => engine
            .buses()
            .get(idx)
            .map(|b| format!("bus {} {}", b.number, b.name)),
        Violations::BRANCH_LOADING => engine
            .branches(limits.branch_rate)
            .get(idx)
            .map(|b| format!("branch {}", b.key)),
        Violations::TRAFO_LOADING => engine
            .trafos(limits.trafo_rate)
            .get(idx)
            .map(|t| format!("trafo {}", t.key)),
        Violations::TRAFO_3W_LOADING => engine
            .trafos3w(limits.trafo_rate)
            .get(idx)
            .map(|t| format!("trafo3w {}", t.key)),
        Violations::SWING_BUS_LOADING => engine
            .swing_buses()
            .get(idx)
            .map(|s| format!("swing bus {}", s.number)),
        _ => None,
    };
    label.unwrap_or_else(|| format!("#{idx}"))
}

fn overloaded(values: impl Iterator<Item = f64>, limit: f64) -> Vec<(usize, f64)> {
    values.enumerate().filter(|&(_, value)| value > limit).collect()
}

fn record(
    ctx: &mut AnalysisContext,
    violation: Violations,
    limit: f64,
    values: &[(usize, f64)],
) -> Violations {
    if values.is_empty() {
        return Violations::NO_VIOLATIONS;
    }
    ctx.log_violation(format_args!("{violation} limit={limit} elements={values:?}"));
    ctx.violations_stats.append(violation, limit, values);
    violation
}

/// Emit a violation event at INFO, or WARN when configured so.
pub(crate) fn log_event(as_warning: bool, message: fmt::Arguments<'_>) {
    if as_warning {
        warn!("{message}");
    } else {
        info!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{ScriptedEngine, Solved};

    #[test]
    fn test_display_and_parse() {
        assert_eq!(Violations::NO_VIOLATIONS.to_string(), "NO_VIOLATIONS");
        let v = Violations::BRANCH_LOADING | Violations::BUS_OVERVOLTAGE;
        assert_eq!(v.to_string(), "BUS_OVERVOLTAGE|BRANCH_LOADING");
        assert_eq!("BUS_OVERVOLTAGE|BRANCH_LOADING".parse::<Violations>().unwrap(), v);
        assert!("BUS_MELTDOWN".parse::<Violations>().is_err());
        assert_eq!(
            serde_json::to_string(&Violations::NOT_CONVERGED).unwrap(),
            "\"NOT_CONVERGED\""
        );
    }

    #[test]
    fn test_flag_algebra() {
        let v = Violations::BUS_UNDERVOLTAGE | Violations::TRAFO_LOADING;
        assert!(v.contains(Violations::TRAFO_LOADING));
        assert!(!v.contains(Violations::NOT_CONVERGED));
        assert_eq!(v & Violations::TRAFO_LOADING, Violations::TRAFO_LOADING);
        assert_eq!(v.iter().count(), 2);
        assert!(Violations::NO_VIOLATIONS.is_empty());
    }

    #[test]
    fn test_limits_defaults() {
        let normal = ViolationsLimits::normal();
        assert_eq!(normal.max_bus_voltage_pu, 1.1);
        assert_eq!(normal.branch_rate, Rate::Rate1);
        let contingency = ViolationsLimits::contingency();
        assert_eq!(contingency.min_bus_voltage_pu, 0.88);
        assert_eq!(contingency.max_branch_loading_pct, 120.0);
        assert_eq!(contingency.branch_rate, Rate::Rate2);
        assert_eq!(contingency.trafo_rate, Rate::Rate1);
        assert!(normal.validate("normal_limits").is_ok());
        let broken = ViolationsLimits {
            min_bus_voltage_pu: 1.2,
            ..normal
        };
        assert!(broken.validate("normal_limits").is_err());
    }

    #[test]
    fn test_not_converged_is_returned_alone() {
        let mut engine = ScriptedEngine::with_script(|_| None);
        let mut ctx = AnalysisContext::default();
        let v = check_violations(
            &mut engine,
            &mut ctx,
            &ViolationsLimits::normal(),
            SolverMethod::Fdns,
        )
        .unwrap();
        assert_eq!(v, Violations::NOT_CONVERGED);
        assert!(ctx.violations_stats.is_empty());
        assert_eq!(ctx.power_flows.count(), 1);
    }

    #[test]
    fn test_all_checks_run_and_are_recorded() {
        let mut engine = ScriptedEngine::with_script(|s| {
            let mut solved = Solved::nominal(s);
            solved.voltages = vec![1.0, 1.15, 0.85, 1.0];
            solved.branch_loading[2] = 130.0;
            solved.trafo3w_loading[0] = 101.0;
            solved.swing_p_mw[0] = 1200.0;
            Some(solved)
        });
        let mut ctx = AnalysisContext::default();
        let v = check_violations(
            &mut engine,
            &mut ctx,
            &ViolationsLimits::normal(),
            SolverMethod::Fnsl,
        )
        .unwrap();
        assert_eq!(
            v,
            Violations::BUS_OVERVOLTAGE
                | Violations::BUS_UNDERVOLTAGE
                | Violations::BRANCH_LOADING
                | Violations::TRAFO_3W_LOADING
                | Violations::SWING_BUS_LOADING
        );
        let stats = &ctx.violations_stats;
        assert_eq!(stats.values(Violations::BUS_OVERVOLTAGE, 1.1, 1), Some(&[1.15][..]));
        assert_eq!(stats.values(Violations::BUS_UNDERVOLTAGE, 0.9, 2), Some(&[0.85][..]));
        assert_eq!(stats.values(Violations::BRANCH_LOADING, 100.0, 2), Some(&[130.0][..]));
        assert_eq!(stats.values(Violations::SWING_BUS_LOADING, 1000.0, 0), Some(&[1200.0][..]));
        assert_eq!(engine.solves, vec![SolverMethod::Fnsl]);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let mut engine = ScriptedEngine::with_script(|s| {
            let mut solved = Solved::nominal(s);
            solved.voltages = vec![1.1, 0.9, 1.0, 1.0];
            solved.branch_loading[0] = 100.0;
            solved.swing_p_mw[0] = 1000.0;
            Some(solved)
        });
        let mut ctx = AnalysisContext::default();
        let v = check_violations(
            &mut engine,
            &mut ctx,
            &ViolationsLimits::normal(),
            SolverMethod::Fdns,
        )
        .unwrap();
        assert_eq!(v, Violations::NO_VIOLATIONS);
    }

    #[test]
    fn test_swing_power_is_signed() {
        let mut engine = ScriptedEngine::with_script(|s| {
            let mut solved = Solved::nominal(s);
            solved.swing_p_mw[0] = -5000.0;
            Some(solved)
        });
        let mut ctx = AnalysisContext::default();
        let v = check_violations(
            &mut engine,
            &mut ctx,
            &ViolationsLimits::normal(),
            SolverMethod::Fdns,
        )
        .unwrap();
        assert_eq!(v, Violations::NO_VIOLATIONS);
    }

    #[test]
    fn test_element_labels() {
        let engine = ScriptedEngine::new();
        let limits = ViolationsLimits::normal();
        assert_eq!(
            element_label(&engine, Violations::BUS_UNDERVOLTAGE, 1, &limits),
            "bus 2 BUS2"
        );
        assert_eq!(
            element_label(&engine, Violations::BRANCH_LOADING, 2, &limits),
            "branch 1-4(2)"
        );
        assert_eq!(
            element_label(&engine, Violations::TRAFO_3W_LOADING, 0, &limits),
            "trafo3w 1-2-3(1)"
        );
        assert_eq!(
            element_label(&engine, Violations::SWING_BUS_LOADING, 0, &limits),
            "swing bus 1"
        );
        assert_eq!(element_label(&engine, Violations::TRAFO_LOADING, 9, &limits), "#9");
    }

    #[test]
    fn test_sorted_sections() {
        let mut stats = ViolationsStats::default();
        stats.append(Violations::BRANCH_LOADING, 100.0, &[(0, 110.0), (1, 150.0)]);
        stats.append(Violations::BRANCH_LOADING, 120.0, &[(0, 125.0)]);
        stats.append(Violations::BRANCH_LOADING, 100.0, &[(0, 160.0)]);
        stats.append(Violations::BUS_UNDERVOLTAGE, 0.9, &[(3, 0.85), (4, 0.7)]);
        stats.append(Violations::BUS_UNDERVOLTAGE, 0.88, &[(3, 0.8)]);

        let sections = stats.sorted_sections();
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0].violation, Violations::BUS_UNDERVOLTAGE);
        assert_eq!(sections[0].limit, 0.88);
        assert_eq!(sections[1].elements[0], (4, vec![0.7]));
        assert_eq!(sections[2].limit, 120.0);
        assert_eq!(sections[3].elements[0], (0, vec![160.0, 110.0]));
        assert_eq!(sections[3].elements[1], (1, vec![150.0]));
    }

    #[test]
    fn test_stats_json_keeps_insertion_order_of_values() {
        let mut stats = ViolationsStats::default();
        stats.append(Violations::TRAFO_LOADING, 100.0, &[(2, 120.5), (2, 101.0)]);
        stats.append(Violations::TRAFO_LOADING, 100.0, &[(2, 110.0)]);
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(json, r#"{"TRAFO_LOADING":{"100":{"2":[120.5,101.0,110.0]}}}"#);
        let back: ViolationsStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
