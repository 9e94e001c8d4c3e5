//! # gridcap-core: network model for hosting-capacity studies
//!
//! The network is an undirected multigraph:
//! - **Nodes**: buses, loads, machines and 3-winding transformers
//! - **Edges**: branches (lines) and 2-winding transformers
//!
//! Parallel circuits between the same pair of buses are separate edges told
//! apart by their circuit id, so every switchable element has a stable
//! [`BranchKey`] made of its bus numbers and circuit id.
//!
//! ```rust
//! use gridcap_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus { id: BusId::new(1), kind: BusKind::Swing, ..Bus::default() });
//! network.add_bus(Bus { id: BusId::new(2), ..Bus::default() });
//! network
//!     .add_branch(Branch {
//!         from_bus: BusId::new(1),
//!         to_bus: BusId::new(2),
//!         reactance: 0.1,
//!         ..Branch::default()
//!     })
//!     .unwrap();
//! network
//!     .add_load(Load::new(BusId::new(2), "1", Megawatts(50.0), Megavars(10.0)))
//!     .unwrap();
//!
//! assert_eq!(network.stats().num_buses, 2);
//! assert_eq!(network.load_mva_at_bus(BusId::new(2)).re, 50.0);
//! ```

use num_complex::Complex64;
use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod units;

pub use error::{GridCapError, GridCapResult};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use units::{p_to_mva, Kilovolts, Megavars, MegavoltAmperes, Megawatts, PerUnit, Radians};

/// Circuit id assigned when a case does not name one
pub const DEFAULT_CIRCUIT: &str = "1";

/// Bus number, as used by loads, machines and branch endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }

    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bus type code (1 = PQ, 2 = PV, 3 = swing, 4 = isolated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum BusKind {
    #[default]
    Pq,
    Pv,
    Swing,
    Isolated,
}

impl BusKind {
    pub fn code(self) -> i32 {
        match self {
            BusKind::Pq => 1,
            BusKind::Pv => 2,
            BusKind::Swing => 3,
            BusKind::Isolated => 4,
        }
    }
}

impl TryFrom<i32> for BusKind {
    type Error = GridCapError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(BusKind::Pq),
            2 => Ok(BusKind::Pv),
            3 => Ok(BusKind::Swing),
            4 => Ok(BusKind::Isolated),
            other => Err(GridCapError::Validation(format!(
                "unknown bus type code {other}"
            ))),
        }
    }
}

impl From<BusKind> for i32 {
    fn from(kind: BusKind) -> Self {
        kind.code()
    }
}

/// Which thermal rating set a loading percentage refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rate {
    /// Rating A (normal)
    #[default]
    Rate1,
    /// Rating B (emergency)
    Rate2,
    /// Rating C (short term)
    Rate3,
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rate::Rate1 => "Rate1",
            Rate::Rate2 => "Rate2",
            Rate::Rate3 => "Rate3",
        };
        f.write_str(name)
    }
}

/// Thermal ratings A/B/C of a branch or transformer winding
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ratings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_a: Option<MegavoltAmperes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_b: Option<MegavoltAmperes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_c: Option<MegavoltAmperes>,
}

impl Ratings {
    pub fn uniform(mva: f64) -> Self {
        let rating = Some(MegavoltAmperes(mva));
        Self {
            rating_a: rating,
            rating_b: rating,
            rating_c: rating,
        }
    }

    /// Rating for the chosen set; zero ratings count as missing.
    pub fn get(&self, rate: Rate) -> Option<MegavoltAmperes> {
        let rating = match rate {
            Rate::Rate1 => self.rating_a,
            Rate::Rate2 => self.rating_b,
            Rate::Rate3 => self.rating_c,
        };
        rating.filter(|r| r.value() > 0.0)
    }
}

/// Identity of a branch or 2-winding transformer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchKey {
    pub from_bus: BusId,
    pub to_bus: BusId,
    #[serde(default = "default_circuit")]
    pub circuit: String,
}

impl BranchKey {
    pub fn new(from_bus: BusId, to_bus: BusId, circuit: impl Into<String>) -> Self {
        Self {
            from_bus,
            to_bus,
            circuit: circuit.into(),
        }
    }
}

impl fmt::Display for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}({})", self.from_bus, self.to_bus, self.circuit)
    }
}

/// Identity of a 3-winding transformer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trafo3wKey {
    pub buses: [BusId; 3],
    #[serde(default = "default_circuit")]
    pub circuit: String,
}

impl fmt::Display for Trafo3wKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [w1, w2, w3] = self.buses;
        write!(f, "{w1}-{w2}-{w3}({})", self.circuit)
    }
}

fn default_circuit() -> String {
    DEFAULT_CIRCUIT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: BusKind,
    #[serde(default)]
    pub base_kv: Kilovolts,
    /// Voltage magnitude; the set point for swing and PV buses
    #[serde(default = "unit_voltage")]
    pub voltage_pu: PerUnit,
    #[serde(default)]
    pub angle_rad: Radians,
    /// Shunt conductance, MW consumed at 1.0 p.u.
    #[serde(default)]
    pub shunt_g_mw: f64,
    /// Shunt susceptance, Mvar injected at 1.0 p.u.
    #[serde(default)]
    pub shunt_b_mvar: f64,
}

fn unit_voltage() -> PerUnit {
    PerUnit::ONE
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            kind: BusKind::Pq,
            base_kv: Kilovolts(0.0),
            voltage_pu: PerUnit::ONE,
            angle_rad: Radians(0.0),
            shunt_g_mw: 0.0,
            shunt_b_mvar: 0.0,
        }
    }
}

/// Transmission line, pi model in per-unit on the system base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub from_bus: BusId,
    pub to_bus: BusId,
    #[serde(default = "default_circuit")]
    pub circuit: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resistance: f64,
    pub reactance: f64,
    /// Total line charging susceptance, split half/half
    #[serde(default)]
    pub charging_b: f64,
    #[serde(default, flatten)]
    pub ratings: Ratings,
    #[serde(default = "in_service")]
    pub status: bool,
}

fn in_service() -> bool {
    true
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            from_bus: BusId(0),
            to_bus: BusId(0),
            circuit: default_circuit(),
            name: String::new(),
            resistance: 0.0,
            reactance: 0.0,
            charging_b: 0.0,
            ratings: Ratings::default(),
            status: true,
        }
    }
}

impl Branch {
    pub fn key(&self) -> BranchKey {
        BranchKey::new(self.from_bus, self.to_bus, self.circuit.clone())
    }
}

/// Two-winding transformer with an off-nominal tap on the from side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    pub from_bus: BusId,
    pub to_bus: BusId,
    #[serde(default = "default_circuit")]
    pub circuit: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resistance: f64,
    pub reactance: f64,
    /// Magnetizing susceptance, placed on the from side
    #[serde(default)]
    pub magnetizing_b: f64,
    #[serde(default = "unit_ratio")]
    pub tap_ratio: f64,
    #[serde(default)]
    pub phase_shift: Radians,
    #[serde(default, flatten)]
    pub ratings: Ratings,
    #[serde(default = "in_service")]
    pub status: bool,
}

fn unit_ratio() -> f64 {
    1.0
}

impl Default for Transformer {
    fn default() -> Self {
        Self {
            from_bus: BusId(0),
            to_bus: BusId(0),
            circuit: default_circuit(),
            name: String::new(),
            resistance: 0.0,
            reactance: 0.0,
            magnetizing_b: 0.0,
            tap_ratio: 1.0,
            phase_shift: Radians(0.0),
            ratings: Ratings::default(),
            status: true,
        }
    }
}

impl Transformer {
    pub fn key(&self) -> BranchKey {
        BranchKey::new(self.from_bus, self.to_bus, self.circuit.clone())
    }
}

/// One winding of a 3-winding transformer, from its bus to the star point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winding {
    pub bus: BusId,
    #[serde(default)]
    pub resistance: f64,
    pub reactance: f64,
    #[serde(default = "unit_ratio")]
    pub tap_ratio: f64,
    #[serde(default, flatten)]
    pub ratings: Ratings,
}

/// Three-winding transformer in star equivalent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformer3w {
    #[serde(default = "default_circuit")]
    pub circuit: String,
    #[serde(default)]
    pub name: String,
    pub windings: [Winding; 3],
    #[serde(default = "in_service")]
    pub status: bool,
}

impl Transformer3w {
    pub fn key(&self) -> Trafo3wKey {
        Trafo3wKey {
            buses: [
                self.windings[0].bus,
                self.windings[1].bus,
                self.windings[2].bus,
            ],
            circuit: self.circuit.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub bus: BusId,
    #[serde(default = "default_circuit")]
    pub id: String,
    pub active_power: Megawatts,
    #[serde(default)]
    pub reactive_power: Megavars,
    #[serde(default = "in_service")]
    pub status: bool,
}

impl Load {
    pub fn new(bus: BusId, id: &str, p: Megawatts, q: Megavars) -> Self {
        Self {
            bus,
            id: id.to_string(),
            active_power: p,
            reactive_power: q,
            status: true,
        }
    }

    pub fn from_mva(bus: BusId, id: &str, mva: Complex64) -> Self {
        Self::new(bus, id, Megawatts(mva.re), Megavars(mva.im))
    }

    /// Complex demand, zero when out of service
    pub fn power_mva(&self) -> Complex64 {
        if self.status {
            Complex64::new(self.active_power.value(), self.reactive_power.value())
        } else {
            Complex64::new(0.0, 0.0)
        }
    }
}

/// Generating unit ("machine")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gen {
    pub bus: BusId,
    #[serde(default = "default_circuit")]
    pub id: String,
    pub active_power: Megawatts,
    #[serde(default)]
    pub reactive_power: Megavars,
    #[serde(default = "in_service")]
    pub status: bool,
}

impl Gen {
    pub fn new(bus: BusId, id: &str, p: Megawatts, q: Megavars) -> Self {
        Self {
            bus,
            id: id.to_string(),
            active_power: p,
            reactive_power: q,
            status: true,
        }
    }

    pub fn from_mva(bus: BusId, id: &str, mva: Complex64) -> Self {
        Self::new(bus, id, Megawatts(mva.re), Megavars(mva.im))
    }

    /// Complex output, zero when out of service
    pub fn power_mva(&self) -> Complex64 {
        if self.status {
            Complex64::new(self.active_power.value(), self.reactive_power.value())
        } else {
            Complex64::new(0.0, 0.0)
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Gen(Gen),
    Load(Load),
    /// Star point of a 3-winding transformer
    Transformer3w(Transformer3w),
}

#[derive(Debug, Clone)]
pub enum Edge {
    Branch(Branch),
    Transformer(Transformer),
}

/// The network graph plus the system MVA base.
///
/// Enumeration order is stable: buses come back sorted by number, every
/// other element in insertion order. Removing a load or machine only keeps
/// that order when it was the most recently added node, which is how the
/// temporary-mutation guards use it.
#[derive(Debug, Clone)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
    pub base_mva: f64,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            base_mva: 100.0,
        }
    }

    pub fn bus_index(&self, id: BusId) -> Option<NodeIndex> {
        self.graph.node_indices().find(
            |&idx| matches!(&self.graph[idx], Node::Bus(bus) if bus.id == id),
        )
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.bus_index(id).and_then(|idx| match &self.graph[idx] {
            Node::Bus(bus) => Some(bus),
            _ => None,
        })
    }

    fn require_bus(&self, id: BusId, what: &str) -> GridCapResult<NodeIndex> {
        self.bus_index(id)
            .ok_or_else(|| GridCapError::Network(format!("{what} refers to unknown bus {id}")))
    }

    pub fn add_bus(&mut self, bus: Bus) -> NodeIndex {
        self.graph.add_node(Node::Bus(bus))
    }

    pub fn add_branch(&mut self, branch: Branch) -> GridCapResult<EdgeIndex> {
        let label = format!("branch {}", branch.key());
        let from = self.require_bus(branch.from_bus, &label)?;
        let to = self.require_bus(branch.to_bus, &label)?;
        Ok(self.graph.add_edge(from, to, Edge::Branch(branch)))
    }

    pub fn add_transformer(&mut self, trafo: Transformer) -> GridCapResult<EdgeIndex> {
        let label = format!("transformer {}", trafo.key());
        let from = self.require_bus(trafo.from_bus, &label)?;
        let to = self.require_bus(trafo.to_bus, &label)?;
        Ok(self.graph.add_edge(from, to, Edge::Transformer(trafo)))
    }

    pub fn add_transformer3w(&mut self, trafo: Transformer3w) -> GridCapResult<NodeIndex> {
        let label = format!("3-winding transformer {}", trafo.key());
        for winding in &trafo.windings {
            self.require_bus(winding.bus, &label)?;
        }
        Ok(self.graph.add_node(Node::Transformer3w(trafo)))
    }

    pub fn add_load(&mut self, load: Load) -> GridCapResult<NodeIndex> {
        self.require_bus(load.bus, &format!("load {}", load.id))?;
        Ok(self.graph.add_node(Node::Load(load)))
    }

    pub fn add_gen(&mut self, gen: Gen) -> GridCapResult<NodeIndex> {
        self.require_bus(gen.bus, &format!("machine {}", gen.id))?;
        Ok(self.graph.add_node(Node::Gen(gen)))
    }

    /// Remove the load with this bus and id; returns it if present.
    pub fn remove_load(&mut self, bus: BusId, id: &str) -> Option<Load> {
        let idx = self.graph.node_indices().rev().find(
            |&idx| matches!(&self.graph[idx], Node::Load(l) if l.bus == bus && l.id == id),
        )?;
        match self.graph.remove_node(idx) {
            Some(Node::Load(load)) => Some(load),
            _ => None,
        }
    }

    /// Remove the machine with this bus and id; returns it if present.
    pub fn remove_gen(&mut self, bus: BusId, id: &str) -> Option<Gen> {
        let idx = self.graph.node_indices().rev().find(
            |&idx| matches!(&self.graph[idx], Node::Gen(g) if g.bus == bus && g.id == id),
        )?;
        match self.graph.remove_node(idx) {
            Some(Node::Gen(gen)) => Some(gen),
            _ => None,
        }
    }

    /// All buses, sorted by number
    pub fn buses(&self) -> Vec<&Bus> {
        let mut buses: Vec<&Bus> = self
            .graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect();
        buses.sort_by_key(|b| b.id);
        buses
    }

    pub fn branches(&self) -> Vec<&Branch> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Branch(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn transformers(&self) -> Vec<&Transformer> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Transformer(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn transformers3w(&self) -> Vec<&Transformer3w> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Transformer3w(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn generators(&self) -> Vec<&Gen> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Gen(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn loads_at_bus(&self, bus_id: BusId) -> Vec<&Load> {
        self.loads()
            .into_iter()
            .filter(|l| l.bus == bus_id)
            .collect()
    }

    pub fn generators_at_bus(&self, bus_id: BusId) -> Vec<&Gen> {
        self.generators()
            .into_iter()
            .filter(|g| g.bus == bus_id)
            .collect()
    }

    /// Sum of in-service load at a bus
    pub fn load_mva_at_bus(&self, bus_id: BusId) -> Complex64 {
        self.loads_at_bus(bus_id)
            .iter()
            .map(|l| l.power_mva())
            .sum()
    }

    /// Sum of in-service generation at a bus
    pub fn gen_mva_at_bus(&self, bus_id: BusId) -> Complex64 {
        self.generators_at_bus(bus_id)
            .iter()
            .map(|g| g.power_mva())
            .sum()
    }

    pub fn branch_mut(&mut self, key: &BranchKey) -> Option<&mut Branch> {
        self.graph.edge_weights_mut().find_map(|e| match e {
            Edge::Branch(b) if b.from_bus == key.from_bus
                && b.to_bus == key.to_bus
                && b.circuit == key.circuit =>
            {
                Some(b)
            }
            _ => None,
        })
    }

    pub fn transformer_mut(&mut self, key: &BranchKey) -> Option<&mut Transformer> {
        self.graph.edge_weights_mut().find_map(|e| match e {
            Edge::Transformer(t) if t.from_bus == key.from_bus
                && t.to_bus == key.to_bus
                && t.circuit == key.circuit =>
            {
                Some(t)
            }
            _ => None,
        })
    }

    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();
        for node in self.graph.node_weights() {
            match node {
                Node::Bus(b) => {
                    stats.num_buses += 1;
                    if b.kind == BusKind::Swing {
                        stats.num_swing_buses += 1;
                    }
                }
                Node::Gen(g) => {
                    stats.num_gens += 1;
                    stats.total_gen_mw += g.power_mva().re;
                }
                Node::Load(l) => {
                    stats.num_loads += 1;
                    stats.total_load_mw += l.power_mva().re;
                }
                Node::Transformer3w(_) => stats.num_transformers3w += 1,
            }
        }
        for edge in self.graph.edge_weights() {
            match edge {
                Edge::Branch(_) => stats.num_branches += 1,
                Edge::Transformer(_) => stats.num_transformers += 1,
            }
        }
        stats
    }

    /// Structural checks a case must pass before it can be solved.
    pub fn validate(&self) -> GridCapResult<()> {
        let stats = self.stats();
        if stats.num_buses == 0 {
            return Err(GridCapError::Validation("network has no buses".into()));
        }
        if stats.num_swing_buses == 0 {
            return Err(GridCapError::Validation(
                "network has no swing bus (type 3)".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for bus in self.buses() {
            if !seen.insert(bus.id) {
                return Err(GridCapError::Validation(format!(
                    "duplicate bus number {}",
                    bus.id
                )));
            }
        }
        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            return Err(GridCapError::Validation(format!(
                "base MVA must be positive, got {}",
                self.base_mva
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_swing_buses: usize,
    pub num_gens: usize,
    pub num_loads: usize,
    pub num_branches: usize,
    pub num_transformers: usize,
    pub num_transformers3w: usize,
    pub total_load_mw: f64,
    pub total_gen_mw: f64,
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buses, {} branches, {} transformers ({} 3-winding), {} machines ({:.0} MW), {} loads ({:.0} MW)",
            self.num_buses,
            self.num_branches,
            self.num_transformers,
            self.num_transformers3w,
            self.num_gens,
            self.total_gen_mw,
            self.num_loads,
            self.total_load_mw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus {
            id: BusId(2),
            name: "LOAD".to_string(),
            ..Bus::default()
        });
        network.add_bus(Bus {
            id: BusId(1),
            name: "SLACK".to_string(),
            kind: BusKind::Swing,
            ..Bus::default()
        });
        network
            .add_branch(Branch {
                from_bus: BusId(1),
                to_bus: BusId(2),
                reactance: 0.1,
                ratings: Ratings::uniform(100.0),
                ..Branch::default()
            })
            .unwrap();
        network
            .add_load(Load::new(BusId(2), "1", Megawatts(50.0), Megavars(10.0)))
            .unwrap();
        network
    }

    #[test]
    fn test_buses_sorted_by_number() {
        let network = two_bus_network();
        let numbers: Vec<usize> = network.buses().iter().map(|b| b.id.value()).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_unknown_bus_is_rejected() {
        let mut network = two_bus_network();
        let err = network
            .add_load(Load::new(BusId(9), "1", Megawatts(1.0), Megavars(0.0)))
            .unwrap_err();
        assert!(matches!(err, GridCapError::Network(_)));
        assert!(err.to_string().contains("unknown bus 9"));
    }

    #[test]
    fn test_remove_most_recent_load_restores_state() {
        let mut network = two_bus_network();
        let before: Vec<Load> = network.loads().into_iter().cloned().collect();
        network
            .add_load(Load::from_mva(BusId(2), "TMP", Complex64::new(5.0, 1.0)))
            .unwrap();
        assert_eq!(network.load_mva_at_bus(BusId(2)), Complex64::new(55.0, 11.0));
        let removed = network.remove_load(BusId(2), "TMP").unwrap();
        assert_eq!(removed.active_power, Megawatts(5.0));
        let after: Vec<Load> = network.loads().into_iter().cloned().collect();
        assert_eq!(before, after);
        assert!(network.remove_load(BusId(2), "TMP").is_none());
    }

    #[test]
    fn test_out_of_service_elements_contribute_nothing() {
        let mut network = two_bus_network();
        let mut gen = Gen::new(BusId(1), "1", Megawatts(80.0), Megavars(5.0));
        gen.status = false;
        network.add_gen(gen).unwrap();
        assert_eq!(network.gen_mva_at_bus(BusId(1)), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_branch_lookup_by_key() {
        let mut network = two_bus_network();
        let key = BranchKey::new(BusId(1), BusId(2), "1");
        network.branch_mut(&key).unwrap().status = false;
        assert!(!network.branches()[0].status);
        assert!(network
            .branch_mut(&BranchKey::new(BusId(1), BusId(2), "2"))
            .is_none());
        assert_eq!(key.to_string(), "1-2(1)");
    }

    #[test]
    fn test_ratings_ignore_zero() {
        let ratings = Ratings {
            rating_a: Some(MegavoltAmperes(0.0)),
            rating_b: Some(MegavoltAmperes(120.0)),
            rating_c: None,
        };
        assert!(ratings.get(Rate::Rate1).is_none());
        assert_eq!(ratings.get(Rate::Rate2), Some(MegavoltAmperes(120.0)));
        assert!(ratings.get(Rate::Rate3).is_none());
    }

    #[test]
    fn test_bus_kind_codes() {
        for code in 1..=4 {
            let kind = BusKind::try_from(code).unwrap();
            assert_eq!(i32::from(kind), code);
        }
        assert!(BusKind::try_from(7).is_err());
    }

    #[test]
    fn test_validate_requires_swing_bus() {
        let mut network = Network::new();
        network.add_bus(Bus {
            id: BusId(1),
            ..Bus::default()
        });
        let err = network.validate().unwrap_err();
        assert!(err.to_string().contains("swing"));
        assert!(two_bus_network().validate().is_ok());
    }

    #[test]
    fn test_network_stats() {
        let stats = two_bus_network().stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_swing_buses, 1);
        assert_eq!(stats.num_branches, 1);
        assert_eq!(stats.num_loads, 1);
        assert!((stats.total_load_mw - 50.0).abs() < 1e-9);
        assert!(stats.to_string().starts_with("2 buses, 1 branches"));
    }

    #[test]
    fn test_branch_serde_defaults() {
        let branch: Branch =
            serde_json::from_str(r#"{"from_bus": 1, "to_bus": 2, "reactance": 0.2, "rating_a": 90.0}"#)
                .unwrap();
        assert_eq!(branch.circuit, "1");
        assert!(branch.status);
        assert_eq!(branch.ratings.get(Rate::Rate1), Some(MegavoltAmperes(90.0)));
    }
}
