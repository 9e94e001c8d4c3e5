//! Per-bus hosting-capacity search.
//!
//! A [`CapacityAnalyser`] is built once per case. Construction picks the
//! solver method, rejects a base case that does not converge and fixes the
//! contingency scenario; [`CapacityAnalyser::buses_headroom`] then bisects,
//! bus by bus, for the largest extra load and generation that pass both the
//! intact-network check and the N-1 replay.

use std::collections::BTreeSet;

use gridcap_core::{BusId, GridCapError, GridCapResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::AnalysisContext;
use crate::contingency::{
    build_contingency_scenario, contingency_limiting_factor, ContingencyScenario,
};
use crate::engine::{
    bus_gen_mva, bus_load_mva, BusRecord, GridEngine, TemporaryGen, TemporaryLoad,
};
use crate::power_flow::SolverMethod;
use crate::violations::{self, check_violations, Violations};

pub mod config;
pub mod stats;

pub use crate::contingency::{LimitingFactor, LimitingSubsystem};
pub use config::{
    load_config, AnalysisConfig, BusConnection, ConnectionPower, ConnectionScenario,
};
pub use stats::CapacityAnalysisStats;

/// Element id of connection-scenario loads and machines
pub const CONNECTION_ID: &str = "CR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusHeadroom {
    pub bus: BusRecord,
    pub actual_load_mva: Complex64,
    pub actual_gen_mva: Complex64,
    pub load_avail_mva: Complex64,
    pub gen_avail_mva: Complex64,
    /// Last violation met by the load search; `None` if the last probe passed
    pub load_lf: Option<LimitingFactor>,
    pub gen_lf: Option<LimitingFactor>,
}

pub type Headroom = Vec<BusHeadroom>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Addition {
    Load,
    Gen,
}

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

pub struct CapacityAnalyser<E: GridEngine> {
    engine: E,
    config: AnalysisConfig,
    ctx: AnalysisContext,
    method: SolverMethod,
    scenario: ContingencyScenario,
}

impl<E: GridEngine> CapacityAnalyser<E> {
    /// Open the configured case and prepare the analysis.
    ///
    /// Fails with [`GridCapError::BaseCase`] when the base case does not
    /// converge with either solver method.
    pub fn new(mut engine: E, config: AnalysisConfig) -> GridCapResult<Self> {
        config.validate()?;
        engine.open_case(&config.case_name)?;
        let mut analyser = Self {
            engine,
            ctx: AnalysisContext::new(config.treat_violations_as_warnings),
            config,
            method: SolverMethod::Fdns,
            scenario: ContingencyScenario::default(),
        };
        if !analyser.fdns_is_applicable()? {
            analyser.method = SolverMethod::Fnsl;
        }
        analyser.check_base_case_violations()?;
        analyser.scenario = match analyser.config.contingency_scenario.clone() {
            Some(scenario) => scenario,
            None => {
                let scenario = build_contingency_scenario(
                    &mut analyser.engine,
                    &mut analyser.ctx,
                    &analyser.config.contingency_limits,
                    analyser.method,
                )?;
                // repeated outages can leave the solver state degraded
                analyser.reload_case()?;
                scenario
            }
        };
        Ok(analyser)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn context(&self) -> &AnalysisContext {
        &self.ctx
    }

    pub fn method(&self) -> SolverMethod {
        self.method
    }

    pub fn scenario(&self) -> &ContingencyScenario {
        &self.scenario
    }

    pub fn into_parts(self) -> (E, AnalysisContext) {
        (self.engine, self.ctx)
    }

    /// Headroom of every bus of interest, in engine bus order.
    pub fn buses_headroom(&mut self) -> GridCapResult<Headroom> {
        self.ctx.power_flows.reset();
        self.ctx.violations_stats.reset();
        let buses: Vec<BusRecord> = self
            .engine
            .buses()
            .into_iter()
            .filter(|b| self.config.is_selected(b.number))
            .collect();
        info!("analysing headroom of {} buses", buses.len());
        let mut headroom = Vec::with_capacity(buses.len());
        for bus in buses {
            headroom.push(self.bus_headroom(bus)?);
        }
        info!(power_flows = self.ctx.power_flows.count(), "headroom analysis done");
        Ok(headroom)
    }

    fn bus_headroom(&mut self, bus: BusRecord) -> GridCapResult<BusHeadroom> {
        let actual_load_mva = bus_load_mva(&self.engine, bus.number);
        let actual_gen_mva = bus_gen_mva(&self.engine, bus.number);

        let upper = self.config.upper_load_limit_mva();
        let (load_avail_mva, load_lf) =
            self.max_power_available(bus.number, Addition::Load, upper)?;
        self.reload_if_collapsed(load_avail_mva, load_lf.as_ref())?;

        let (mut gen_avail_mva, mut gen_lf) = (ZERO, None);
        if actual_gen_mva != ZERO && load_avail_mva != ZERO {
            let upper = self.config.upper_gen_limit_mva();
            (gen_avail_mva, gen_lf) =
                self.max_power_available(bus.number, Addition::Gen, upper)?;
            self.reload_if_collapsed(gen_avail_mva, gen_lf.as_ref())?;
        }

        info!(
            bus = %bus.number,
            load_avail_mw = load_avail_mva.re,
            gen_avail_mw = gen_avail_mva.re,
            power_flows = self.ctx.power_flows.count(),
            "bus headroom"
        );
        Ok(BusHeadroom {
            bus,
            actual_load_mva,
            actual_gen_mva,
            load_avail_mva,
            gen_avail_mva,
            load_lf,
            gen_lf,
        })
    }

    fn reload_if_collapsed(
        &mut self,
        available: Complex64,
        lf: Option<&LimitingFactor>,
    ) -> GridCapResult<()> {
        if available == ZERO && lf.is_some_and(|lf| lf.v == Violations::NOT_CONVERGED) {
            self.reload_case()?;
        }
        Ok(())
    }

    /// Bisect `[0, upper]` for the largest feasible addition.
    ///
    /// The first round tests `upper` itself; at most `max_iterations` rounds
    /// run in total. The interval is closed on the real part only.
    fn max_power_available(
        &mut self,
        bus: BusId,
        addition: Addition,
        upper_limit: Complex64,
    ) -> GridCapResult<(Complex64, Option<LimitingFactor>)> {
        let mut lower = ZERO;
        let mut upper = upper_limit;
        let mut limiting_factor = self.probe(bus, addition, upper)?;
        if limiting_factor.is_none() {
            return Ok((upper, None));
        }
        self.record(bus, addition, upper, limiting_factor.as_ref());
        self.reload_case()?;

        for _ in 1..self.config.max_iterations {
            let middle = (lower + upper) / 2.0;
            limiting_factor = self.probe(bus, addition, middle)?;
            if limiting_factor.is_none() {
                lower = middle;
            } else {
                upper = middle;
                self.record(bus, addition, middle, limiting_factor.as_ref());
                self.reload_case()?;
            }
            if upper.re - lower.re < self.config.headroom_tolerance_p_mw {
                break;
            }
        }
        Ok((lower, limiting_factor))
    }

    /// Apply `power` at the bus for one feasibility check; `None` means feasible.
    fn probe(
        &mut self,
        bus: BusId,
        addition: Addition,
        power: Complex64,
    ) -> GridCapResult<Option<LimitingFactor>> {
        debug!(%bus, ?addition, p_mw = power.re, q_mvar = power.im, "probe");
        let Self {
            engine,
            config,
            ctx,
            method,
            scenario,
        } = self;
        match addition {
            Addition::Load => {
                let mut guard = TemporaryLoad::new(engine, bus, power)?;
                feasibility_check(&mut *guard, ctx, config, scenario, *method)
            }
            Addition::Gen => {
                let mut guard = TemporaryGen::new(engine, bus, power)?;
                feasibility_check(&mut *guard, ctx, config, scenario, *method)
            }
        }
    }

    fn record(
        &mut self,
        bus: BusId,
        addition: Addition,
        power: Complex64,
        lf: Option<&LimitingFactor>,
    ) {
        let Some(lf) = lf else { return };
        let power = match addition {
            Addition::Load => power,
            Addition::Gen => -power,
        };
        self.ctx.capacity_stats.update(bus, power, lf);
    }

    /// Try the decoupled method on the fresh case. If it fails, solve once
    /// with full Newton-Raphson and keep that method for the run.
    fn fdns_is_applicable(&mut self) -> GridCapResult<bool> {
        self.reload_case()?;
        violations::run_solver(&mut self.engine, &mut self.ctx, SolverMethod::Fdns)?;
        let applicable = self.engine.is_converged();
        if !applicable {
            warn!("FDNS did not converge, falling back to FNSL");
            self.reload_case()?;
            violations::run_solver(&mut self.engine, &mut self.ctx, SolverMethod::Fnsl)?;
        }
        info!("Case solved");
        Ok(applicable)
    }

    fn check_base_case_violations(&mut self) -> GridCapResult<()> {
        self.ctx.reset();
        let v = check_violations(
            &mut self.engine,
            &mut self.ctx,
            &self.config.normal_limits,
            self.method,
        )?;
        if v.contains(Violations::NOT_CONVERGED) {
            return Err(GridCapError::BaseCase(v.to_string()));
        }
        if !v.is_empty() {
            warn!("the base case has {v}");
        }
        self.ctx.base_case_violations = v;
        self.ctx.base_case_stats = self.ctx.violations_stats.clone();
        Ok(())
    }

    /// Reload the case and re-apply the connection scenario.
    fn reload_case(&mut self) -> GridCapResult<()> {
        self.engine.reload_case()?;
        self.apply_connection_scenario()
    }

    fn apply_connection_scenario(&mut self) -> GridCapResult<()> {
        let Some(connections) = &self.config.connection_scenario else {
            return Ok(());
        };
        let present: BTreeSet<BusId> = self.engine.buses().iter().map(|b| b.number).collect();
        for (bus, connection) in connections {
            if !present.contains(bus) {
                debug!(%bus, "connection bus not in case");
                continue;
            }
            if let Some(load) = connection.load {
                self.engine.add_load(*bus, CONNECTION_ID, load.mva())?;
            }
            if let Some(gen) = connection.gen {
                self.engine.add_machine(*bus, CONNECTION_ID, gen.mva())?;
            }
        }
        Ok(())
    }
}

/// Intact-network check first, then the N-1 replay.
fn feasibility_check<E: GridEngine>(
    engine: &mut E,
    ctx: &mut AnalysisContext,
    config: &AnalysisConfig,
    scenario: &ContingencyScenario,
    method: SolverMethod,
) -> GridCapResult<Option<LimitingFactor>> {
    let v = check_violations(engine, ctx, &config.normal_limits, method)?;
    if v != Violations::NO_VIOLATIONS {
        return Ok(Some(LimitingFactor::normal(v)));
    }
    let lf =
        contingency_limiting_factor(engine, ctx, scenario, &config.contingency_limits, method)?;
    if lf.is_clean() {
        Ok(None)
    } else {
        Ok(Some(lf))
    }
}

/// Open the configured case on `engine` and run the whole analysis.
pub fn buses_headroom<E: GridEngine>(
    engine: E,
    config: AnalysisConfig,
) -> GridCapResult<(Headroom, AnalysisContext)> {
    let mut analyser = CapacityAnalyser::new(engine, config)?;
    let headroom = analyser.buses_headroom()?;
    let (_, ctx) = analyser.into_parts();
    Ok((headroom, ctx))
}
