//! [`GridEngine`] backed by the in-crate AC power-flow solvers.

use std::path::{Path, PathBuf};

use gridcap_core::{
    BranchKey, BusId, BusKind, Gen, GridCapError, GridCapResult, Load, Network, Rate, Ratings,
};
use gridcap_io::load_network;
use num_complex::Complex64;
use tracing::{debug, info};

use super::{BranchRecord, BusRecord, GridEngine, PowerRecord, SwingBusRecord, Trafo3wRecord};
use crate::power_flow::{
    solve, PowerFlowModel, PowerFlowOptions, PowerFlowSolution, SolverMethod, TwoPortSource,
};

#[derive(Debug, Clone)]
enum CaseSource {
    File(PathBuf),
    Memory(Network),
}

#[derive(Debug, Clone)]
struct Solved {
    model: PowerFlowModel,
    solution: PowerFlowSolution,
    voltages: Vec<Complex64>,
    injections: Vec<Complex64>,
}

#[derive(Debug, Clone)]
pub struct NativeEngine {
    source: Option<CaseSource>,
    network: Network,
    options: PowerFlowOptions,
    solved: Option<Solved>,
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new(PowerFlowOptions::default())
    }
}

impl NativeEngine {
    pub fn new(options: PowerFlowOptions) -> Self {
        Self {
            source: None,
            network: Network::new(),
            options,
            solved: None,
        }
    }

    /// Engine over an in-memory case; reloading restores this network.
    pub fn from_network(network: Network, options: PowerFlowOptions) -> Self {
        Self {
            source: Some(CaseSource::Memory(network.clone())),
            network,
            options,
            solved: None,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn options(&self) -> &PowerFlowOptions {
        &self.options
    }

    /// The last solve, converged or not
    pub fn solution(&self) -> Option<&PowerFlowSolution> {
        self.solved.as_ref().map(|s| &s.solution)
    }

    fn converged(&self) -> Option<&Solved> {
        self.solved.as_ref().filter(|s| s.solution.converged)
    }

    fn invalidate(&mut self) {
        self.solved = None;
    }

    /// Loading of one two-port source against its rating, in percent
    fn loading_pct(&self, source: &TwoPortSource, rate: Rate) -> f64 {
        let Some(solved) = self.converged() else {
            return 0.0;
        };
        solved
            .model
            .two_ports
            .iter()
            .filter(|p| &p.source == source)
            .map(|p| {
                let (s_from, s_to) = p.flows(&solved.voltages);
                let flow_mva = s_from.norm().max(s_to.norm()) * solved.model.base_mva;
                percent_of_rating(flow_mva, &p.ratings, rate)
            })
            .fold(0.0, f64::max)
    }
}

fn percent_of_rating(flow_mva: f64, ratings: &Ratings, rate: Rate) -> f64 {
    match ratings.get(rate) {
        Some(rating) => flow_mva / rating.value() * 100.0,
        None => 0.0,
    }
}

fn power_record(bus: BusId, id: &str, mva: Complex64) -> PowerRecord {
    PowerRecord {
        bus,
        id: id.to_string(),
        mva,
    }
}

impl GridEngine for NativeEngine {
    fn open_case(&mut self, path: &Path) -> GridCapResult<()> {
        self.network = load_network(path)?;
        self.source = Some(CaseSource::File(path.to_path_buf()));
        self.invalidate();
        info!(case = %path.display(), "{}", self.network.stats());
        Ok(())
    }

    fn reload_case(&mut self) -> GridCapResult<()> {
        self.network = match &self.source {
            Some(CaseSource::File(path)) => load_network(path)?,
            Some(CaseSource::Memory(network)) => network.clone(),
            None => return Err(GridCapError::Config("no case has been opened".into())),
        };
        self.invalidate();
        debug!("case reloaded");
        Ok(())
    }

    fn run_solver(&mut self, method: SolverMethod) -> GridCapResult<()> {
        if self.network.buses().is_empty() {
            return Err(GridCapError::Solver("case has no buses".into()));
        }
        let model = PowerFlowModel::from_network(&self.network);
        let solution = solve(&model, method, &self.options);
        debug!(
            %method,
            converged = solution.converged,
            iterations = solution.iterations,
            mismatch = solution.max_mismatch,
            "power flow"
        );
        let voltages = solution.voltages();
        let injections = model.injections(&voltages);
        self.solved = Some(Solved {
            model,
            solution,
            voltages,
            injections,
        });
        Ok(())
    }

    fn is_converged(&self) -> bool {
        self.converged().is_some()
    }

    fn buses(&self) -> Vec<BusRecord> {
        let solved = self.converged();
        self.network
            .buses()
            .into_iter()
            .map(|bus| {
                let voltage_pu = solved
                    .and_then(|s| s.model.bus_position(bus.id).map(|i| s.solution.v_mag[i]))
                    .unwrap_or(bus.voltage_pu.value());
                BusRecord {
                    number: bus.id,
                    name: bus.name.clone(),
                    kind: bus.kind.code(),
                    voltage_pu,
                }
            })
            .collect()
    }

    fn branches(&self, rate: Rate) -> Vec<BranchRecord> {
        self.network
            .branches()
            .into_iter()
            .map(|branch| {
                let key = branch.key();
                let loading_pct = if branch.status {
                    self.loading_pct(&TwoPortSource::Branch(key.clone()), rate)
                } else {
                    0.0
                };
                BranchRecord {
                    key,
                    enabled: branch.status,
                    loading_pct,
                }
            })
            .collect()
    }

    fn trafos(&self, rate: Rate) -> Vec<BranchRecord> {
        self.network
            .transformers()
            .into_iter()
            .map(|trafo| {
                let key = trafo.key();
                let loading_pct = if trafo.status {
                    self.loading_pct(&TwoPortSource::Transformer(key.clone()), rate)
                } else {
                    0.0
                };
                BranchRecord {
                    key,
                    enabled: trafo.status,
                    loading_pct,
                }
            })
            .collect()
    }

    fn trafos3w(&self, rate: Rate) -> Vec<Trafo3wRecord> {
        self.network
            .transformers3w()
            .into_iter()
            .map(|trafo| {
                let key = trafo.key();
                let loading_pct = (0..trafo.windings.len())
                    .map(|w| self.loading_pct(&TwoPortSource::Winding(key.clone(), w), rate))
                    .fold(0.0, f64::max);
                Trafo3wRecord {
                    key,
                    enabled: trafo.status,
                    loading_pct,
                }
            })
            .collect()
    }

    fn swing_buses(&self) -> Vec<SwingBusRecord> {
        let solved = self.converged();
        self.network
            .buses()
            .into_iter()
            .filter(|bus| bus.kind == BusKind::Swing)
            .map(|bus| {
                let load = self.network.load_mva_at_bus(bus.id).re;
                let p_mw = match solved.and_then(|s| s.model.bus_position(bus.id).map(|i| (s, i))) {
                    Some((s, i)) => s.injections[i].re * s.model.base_mva + load,
                    None => self.network.gen_mva_at_bus(bus.id).re,
                };
                SwingBusRecord {
                    number: bus.id,
                    p_mw,
                }
            })
            .collect()
    }

    fn loads(&self) -> Vec<PowerRecord> {
        self.network
            .loads()
            .into_iter()
            .map(|l| power_record(l.bus, &l.id, l.power_mva()))
            .collect()
    }

    fn machines(&self) -> Vec<PowerRecord> {
        self.network
            .generators()
            .into_iter()
            .map(|g| power_record(g.bus, &g.id, g.power_mva()))
            .collect()
    }

    fn add_load(&mut self, bus: BusId, id: &str, mva: Complex64) -> GridCapResult<bool> {
        if self.network.bus(bus).is_none() {
            return Ok(false);
        }
        self.network.add_load(Load::from_mva(bus, id, mva))?;
        self.invalidate();
        Ok(true)
    }

    fn remove_load(&mut self, bus: BusId, id: &str) -> GridCapResult<bool> {
        let removed = self.network.remove_load(bus, id).is_some();
        if removed {
            self.invalidate();
        }
        Ok(removed)
    }

    fn add_machine(&mut self, bus: BusId, id: &str, mva: Complex64) -> GridCapResult<bool> {
        if self.network.bus(bus).is_none() {
            return Ok(false);
        }
        self.network.add_gen(Gen::from_mva(bus, id, mva))?;
        self.invalidate();
        Ok(true)
    }

    fn remove_machine(&mut self, bus: BusId, id: &str) -> GridCapResult<bool> {
        let removed = self.network.remove_gen(bus, id).is_some();
        if removed {
            self.invalidate();
        }
        Ok(removed)
    }

    fn set_branch_status(&mut self, key: &BranchKey, enabled: bool) -> GridCapResult<bool> {
        let branch = self
            .network
            .branch_mut(key)
            .ok_or_else(|| GridCapError::Network(format!("unknown branch {key}")))?;
        if branch.status == enabled {
            return Ok(false);
        }
        branch.status = enabled;
        self.invalidate();
        Ok(true)
    }

    fn set_trafo_status(&mut self, key: &BranchKey, enabled: bool) -> GridCapResult<bool> {
        let trafo = self
            .network
            .transformer_mut(key)
            .ok_or_else(|| GridCapError::Network(format!("unknown transformer {key}")))?;
        if trafo.status == enabled {
            return Ok(false);
        }
        trafo.status = enabled;
        self.invalidate();
        Ok(true)
    }
}
