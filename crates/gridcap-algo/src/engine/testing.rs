//! Scripted engine double for unit tests.
//!
//! The element tables are plain vectors and a solve is a closure from the
//! current state to the electrical results, so tests can state directly
//! "bus 2 undervolts once more than 60 MW is added" without a real case.

use std::io;
use std::path::Path;

use gridcap_core::{BranchKey, BusId, GridCapError, GridCapResult, Rate, Trafo3wKey};
use num_complex::Complex64;

use super::{
    BranchRecord, BusRecord, GridEngine, PowerRecord, SwingBusRecord, Trafo3wRecord, TEMPORARY_ID,
};
use crate::power_flow::SolverMethod;

#[derive(Debug, Clone)]
pub(crate) struct GridState {
    /// (number, type code)
    pub buses: Vec<(BusId, i32)>,
    pub branches: Vec<(BranchKey, bool)>,
    pub trafos: Vec<(BranchKey, bool)>,
    pub trafos3w: Vec<(Trafo3wKey, bool)>,
    pub loads: Vec<PowerRecord>,
    pub machines: Vec<PowerRecord>,
}

impl GridState {
    /// Real part of the temporary load at a bus
    pub fn extra_load(&self, bus: usize) -> f64 {
        self.loads
            .iter()
            .filter(|l| l.bus == BusId::new(bus) && l.id == TEMPORARY_ID)
            .map(|l| l.mva.re)
            .sum()
    }

    /// Real part of the temporary generation at a bus
    pub fn extra_gen(&self, bus: usize) -> f64 {
        self.machines
            .iter()
            .filter(|m| m.bus == BusId::new(bus) && m.id == TEMPORARY_ID)
            .map(|m| m.mva.re)
            .sum()
    }

    pub fn branch_enabled(&self, from: usize, to: usize) -> bool {
        self.branches
            .iter()
            .any(|(k, on)| *on && k.from_bus == BusId::new(from) && k.to_bus == BusId::new(to))
    }

    pub fn trafo_enabled(&self, from: usize, to: usize) -> bool {
        self.trafos
            .iter()
            .any(|(k, on)| *on && k.from_bus == BusId::new(from) && k.to_bus == BusId::new(to))
    }
}

/// Electrical results of one scripted solve, in element order
#[derive(Debug, Clone)]
pub(crate) struct Solved {
    pub voltages: Vec<f64>,
    pub branch_loading: Vec<f64>,
    pub trafo_loading: Vec<f64>,
    pub trafo3w_loading: Vec<f64>,
    pub swing_p_mw: Vec<f64>,
}

impl Solved {
    pub fn nominal(state: &GridState) -> Self {
        Self {
            voltages: vec![1.0; state.buses.len()],
            branch_loading: vec![50.0; state.branches.len()],
            trafo_loading: vec![50.0; state.trafos.len()],
            trafo3w_loading: vec![50.0; state.trafos3w.len()],
            swing_p_mw: vec![100.0],
        }
    }
}

type Script = Box<dyn Fn(&GridState) -> Option<Solved>>;

pub(crate) struct ScriptedEngine {
    pub state: GridState,
    initial: GridState,
    script: Script,
    solution: Option<Solved>,
    pub solves: Vec<SolverMethod>,
    pub reloads: usize,
    /// The decoupled method never converges
    pub fdns_diverges: bool,
}

fn key(from: usize, to: usize, circuit: &str) -> BranchKey {
    BranchKey::new(BusId::new(from), BusId::new(to), circuit)
}

impl ScriptedEngine {
    /// Four buses (swing 1), lines 1-2 and 1-4 (two circuits), transformer
    /// 2-3, a 3-winding transformer 1-2-3, load at 2 and machines at 1 and 4.
    pub fn new() -> Self {
        let state = GridState {
            buses: vec![
                (BusId::new(1), 3),
                (BusId::new(2), 1),
                (BusId::new(3), 1),
                (BusId::new(4), 2),
            ],
            branches: vec![
                (key(1, 2, "1"), true),
                (key(1, 4, "1"), true),
                (key(1, 4, "2"), true),
            ],
            trafos: vec![(key(2, 3, "1"), true)],
            trafos3w: vec![(
                Trafo3wKey {
                    buses: [BusId::new(1), BusId::new(2), BusId::new(3)],
                    circuit: "1".to_string(),
                },
                true,
            )],
            loads: vec![PowerRecord {
                bus: BusId::new(2),
                id: "1".to_string(),
                mva: Complex64::new(50.0, 10.0),
            }],
            machines: vec![
                PowerRecord {
                    bus: BusId::new(1),
                    id: "1".to_string(),
                    mva: Complex64::new(30.0, 5.0),
                },
                PowerRecord {
                    bus: BusId::new(4),
                    id: "1".to_string(),
                    mva: Complex64::new(20.0, 0.0),
                },
            ],
        };
        Self {
            initial: state.clone(),
            state,
            script: Box::new(|s| Some(Solved::nominal(s))),
            solution: None,
            solves: Vec::new(),
            reloads: 0,
            fdns_diverges: false,
        }
    }

    pub fn with_script(script: impl Fn(&GridState) -> Option<Solved> + 'static) -> Self {
        let mut engine = Self::new();
        engine.script = Box::new(script);
        engine
    }

    fn solved(&self) -> Option<&Solved> {
        self.solution.as_ref()
    }
}

impl GridEngine for ScriptedEngine {
    fn open_case(&mut self, path: &Path) -> GridCapResult<()> {
        if !path.exists() {
            return Err(GridCapError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("case file '{}' not found", path.display()),
            )));
        }
        self.reload_case()
    }

    fn reload_case(&mut self) -> GridCapResult<()> {
        self.state = self.initial.clone();
        self.solution = None;
        self.reloads += 1;
        Ok(())
    }

    fn run_solver(&mut self, method: SolverMethod) -> GridCapResult<()> {
        self.solves.push(method);
        self.solution = if self.fdns_diverges && method == SolverMethod::Fdns {
            None
        } else {
            (self.script)(&self.state)
        };
        Ok(())
    }

    fn is_converged(&self) -> bool {
        self.solution.is_some()
    }

    fn buses(&self) -> Vec<BusRecord> {
        self.state
            .buses
            .iter()
            .enumerate()
            .map(|(i, &(number, kind))| BusRecord {
                number,
                name: format!("BUS{number}"),
                kind,
                voltage_pu: self.solved().map_or(1.0, |s| s.voltages[i]),
            })
            .collect()
    }

    fn branches(&self, _rate: Rate) -> Vec<BranchRecord> {
        self.state
            .branches
            .iter()
            .enumerate()
            .map(|(i, (key, enabled))| BranchRecord {
                key: key.clone(),
                enabled: *enabled,
                loading_pct: self.solved().map_or(0.0, |s| s.branch_loading[i]),
            })
            .collect()
    }

    fn trafos(&self, _rate: Rate) -> Vec<BranchRecord> {
        self.state
            .trafos
            .iter()
            .enumerate()
            .map(|(i, (key, enabled))| BranchRecord {
                key: key.clone(),
                enabled: *enabled,
                loading_pct: self.solved().map_or(0.0, |s| s.trafo_loading[i]),
            })
            .collect()
    }

    fn trafos3w(&self, _rate: Rate) -> Vec<Trafo3wRecord> {
        self.state
            .trafos3w
            .iter()
            .enumerate()
            .map(|(i, (key, enabled))| Trafo3wRecord {
                key: key.clone(),
                enabled: *enabled,
                loading_pct: self.solved().map_or(0.0, |s| s.trafo3w_loading[i]),
            })
            .collect()
    }

    fn swing_buses(&self) -> Vec<SwingBusRecord> {
        self.state
            .buses
            .iter()
            .filter(|(_, kind)| *kind == 3)
            .enumerate()
            .map(|(i, &(number, _))| SwingBusRecord {
                number,
                p_mw: self.solved().map_or(0.0, |s| s.swing_p_mw[i]),
            })
            .collect()
    }

    fn loads(&self) -> Vec<PowerRecord> {
        self.state.loads.clone()
    }

    fn machines(&self) -> Vec<PowerRecord> {
        self.state.machines.clone()
    }

    fn add_load(&mut self, bus: BusId, id: &str, mva: Complex64) -> GridCapResult<bool> {
        if !self.state.buses.iter().any(|(b, _)| *b == bus) {
            return Ok(false);
        }
        self.state.loads.push(PowerRecord {
            bus,
            id: id.to_string(),
            mva,
        });
        Ok(true)
    }

    fn remove_load(&mut self, bus: BusId, id: &str) -> GridCapResult<bool> {
        let before = self.state.loads.len();
        self.state.loads.retain(|l| !(l.bus == bus && l.id == id));
        Ok(self.state.loads.len() != before)
    }

    fn add_machine(&mut self, bus: BusId, id: &str, mva: Complex64) -> GridCapResult<bool> {
        if !self.state.buses.iter().any(|(b, _)| *b == bus) {
            return Ok(false);
        }
        self.state.machines.push(PowerRecord {
            bus,
            id: id.to_string(),
            mva,
        });
        Ok(true)
    }

    fn remove_machine(&mut self, bus: BusId, id: &str) -> GridCapResult<bool> {
        let before = self.state.machines.len();
        self.state.machines.retain(|m| !(m.bus == bus && m.id == id));
        Ok(self.state.machines.len() != before)
    }

    fn set_branch_status(&mut self, key: &BranchKey, enabled: bool) -> GridCapResult<bool> {
        let (_, status) = self
            .state
            .branches
            .iter_mut()
            .find(|(k, _)| k == key)
            .ok_or_else(|| GridCapError::Network(format!("unknown branch {key}")))?;
        let changed = *status != enabled;
        *status = enabled;
        Ok(changed)
    }

    fn set_trafo_status(&mut self, key: &BranchKey, enabled: bool) -> GridCapResult<bool> {
        let (_, status) = self
            .state
            .trafos
            .iter_mut()
            .find(|(k, _)| k == key)
            .ok_or_else(|| GridCapError::Network(format!("unknown transformer {key}")))?;
        let changed = *status != enabled;
        *status = enabled;
        Ok(changed)
    }
}
