//! Per-unit power-flow model assembled from a [`Network`].
//!
//! Every in-service two-port element (line, 2-winding transformer, winding
//! of a 3-winding transformer) is reduced to its admittance quadruple
//! `[y_ff y_ft; y_tf y_tt]`, stamped into a dense Y-bus. 3-winding
//! transformers add one internal star bus each, placed after the case buses.

use std::collections::HashMap;

use gridcap_core::{BranchKey, BusId, BusKind, Edge, Network, Ratings, Trafo3wKey};
use num_complex::Complex64;

use super::BusType;

/// Which element a [`TwoPort`] was built from
#[derive(Debug, Clone, PartialEq)]
pub enum TwoPortSource {
    Branch(BranchKey),
    Transformer(BranchKey),
    Winding(Trafo3wKey, usize),
}

/// Admittance model of one series element between two model buses
#[derive(Debug, Clone)]
pub struct TwoPort {
    pub source: TwoPortSource,
    pub from: usize,
    pub to: usize,
    pub y_ff: Complex64,
    pub y_ft: Complex64,
    pub y_tf: Complex64,
    pub y_tt: Complex64,
    /// Series reactance, used for the decoupled B' matrix
    pub reactance: f64,
    pub ratings: Ratings,
}

impl TwoPort {
    /// Complex power entering the element at its from and to ends (p.u.)
    pub fn flows(&self, v: &[Complex64]) -> (Complex64, Complex64) {
        let (vf, vt) = (v[self.from], v[self.to]);
        let i_from = self.y_ff * vf + self.y_ft * vt;
        let i_to = self.y_tf * vf + self.y_tt * vt;
        (vf * i_from.conj(), vt * i_to.conj())
    }
}

#[derive(Debug, Clone)]
pub struct PowerFlowModel {
    /// Case buses taking part in the solve, sorted by number
    pub buses: Vec<BusId>,
    /// Bus count including star points
    pub size: usize,
    pub bus_types: Vec<BusType>,
    pub y_bus: Vec<Vec<Complex64>>,
    /// Specified net injection, generation minus load (p.u.)
    pub p_spec: Vec<f64>,
    pub q_spec: Vec<f64>,
    /// Voltage magnitude set point, or the case value for PQ buses
    pub v_set: Vec<f64>,
    pub v_case_angle: Vec<f64>,
    pub two_ports: Vec<TwoPort>,
    pub base_mva: f64,
    index: HashMap<BusId, usize>,
}

impl PowerFlowModel {
    pub fn from_network(network: &Network) -> Self {
        let active: Vec<_> = network
            .buses()
            .into_iter()
            .filter(|b| b.kind != BusKind::Isolated)
            .collect();
        let buses: Vec<BusId> = active.iter().map(|b| b.id).collect();
        let index: HashMap<BusId, usize> =
            buses.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let trafos3w: Vec<_> = network
            .transformers3w()
            .into_iter()
            .filter(|t| t.status && t.windings.iter().all(|w| index.contains_key(&w.bus)))
            .collect();
        let size = buses.len() + trafos3w.len();
        let base_mva = network.base_mva;

        let mut bus_types = vec![BusType::PQ; size];
        let mut v_set = vec![1.0; size];
        let mut v_case_angle = vec![0.0; size];
        let mut p_spec = vec![0.0; size];
        let mut q_spec = vec![0.0; size];
        let mut y_bus = vec![vec![Complex64::new(0.0, 0.0); size]; size];

        for (i, bus) in active.iter().enumerate() {
            v_set[i] = bus.voltage_pu.value();
            v_case_angle[i] = bus.angle_rad.value();
            bus_types[i] = match bus.kind {
                BusKind::Swing => BusType::Slack,
                BusKind::Pv if network.generators_at_bus(bus.id).iter().any(|g| g.status) => {
                    BusType::PV
                }
                _ => BusType::PQ,
            };
            y_bus[i][i] += Complex64::new(bus.shunt_g_mw, bus.shunt_b_mvar) / base_mva;
        }

        for gen in network.generators() {
            if let Some(&i) = index.get(&gen.bus) {
                let s = gen.power_mva() / base_mva;
                p_spec[i] += s.re;
                q_spec[i] += s.im;
            }
        }
        for load in network.loads() {
            if let Some(&i) = index.get(&load.bus) {
                let s = load.power_mva() / base_mva;
                p_spec[i] -= s.re;
                q_spec[i] -= s.im;
            }
        }

        let mut two_ports = Vec::new();
        for edge in network.graph.edge_weights() {
            let port = match edge {
                Edge::Branch(b) if b.status => line_two_port(b, &index),
                Edge::Transformer(t) if t.status => transformer_two_port(t, &index),
                _ => None,
            };
            two_ports.extend(port);
        }
        for (k, trafo) in trafos3w.iter().enumerate() {
            let star = buses.len() + k;
            for (w, winding) in trafo.windings.iter().enumerate() {
                let Some(&bus) = index.get(&winding.bus) else {
                    continue;
                };
                let Some(y) = series_admittance(winding.resistance, winding.reactance) else {
                    continue;
                };
                let tap = if winding.tap_ratio > 0.0 { winding.tap_ratio } else { 1.0 };
                two_ports.push(TwoPort {
                    source: TwoPortSource::Winding(trafo.key(), w),
                    from: bus,
                    to: star,
                    y_ff: y / (tap * tap),
                    y_ft: -y / tap,
                    y_tf: -y / tap,
                    y_tt: y,
                    reactance: winding.reactance,
                    ratings: winding.ratings,
                });
            }
        }

        for port in &two_ports {
            y_bus[port.from][port.from] += port.y_ff;
            y_bus[port.from][port.to] += port.y_ft;
            y_bus[port.to][port.from] += port.y_tf;
            y_bus[port.to][port.to] += port.y_tt;
        }

        Self {
            buses,
            size,
            bus_types,
            y_bus,
            p_spec,
            q_spec,
            v_set,
            v_case_angle,
            two_ports,
            base_mva,
            index,
        }
    }

    pub fn bus_position(&self, id: BusId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Power injected into the network at each bus (p.u.)
    pub fn injections(&self, v: &[Complex64]) -> Vec<Complex64> {
        (0..self.size)
            .map(|i| {
                let current: Complex64 = (0..self.size).map(|j| self.y_bus[i][j] * v[j]).sum();
                v[i] * current.conj()
            })
            .collect()
    }
}

fn series_admittance(r: f64, x: f64) -> Option<Complex64> {
    let z = Complex64::new(r, x);
    // zero-impedance ties are not modelled
    (z.norm_sqr() >= 1e-12).then(|| z.inv())
}

fn line_two_port(
    branch: &gridcap_core::Branch,
    index: &HashMap<BusId, usize>,
) -> Option<TwoPort> {
    let from = *index.get(&branch.from_bus)?;
    let to = *index.get(&branch.to_bus)?;
    let y = series_admittance(branch.resistance, branch.reactance)?;
    let half_b = Complex64::new(0.0, branch.charging_b / 2.0);
    Some(TwoPort {
        source: TwoPortSource::Branch(branch.key()),
        from,
        to,
        y_ff: y + half_b,
        y_ft: -y,
        y_tf: -y,
        y_tt: y + half_b,
        reactance: branch.reactance,
        ratings: branch.ratings,
    })
}

fn transformer_two_port(
    trafo: &gridcap_core::Transformer,
    index: &HashMap<BusId, usize>,
) -> Option<TwoPort> {
    let from = *index.get(&trafo.from_bus)?;
    let to = *index.get(&trafo.to_bus)?;
    let y = series_admittance(trafo.resistance, trafo.reactance)?;
    let tap_mag = if trafo.tap_ratio > 0.0 { trafo.tap_ratio } else { 1.0 };
    let tap = Complex64::from_polar(tap_mag, trafo.phase_shift.value());
    Some(TwoPort {
        source: TwoPortSource::Transformer(trafo.key()),
        from,
        to,
        y_ff: y / (tap_mag * tap_mag) + Complex64::new(0.0, trafo.magnetizing_b),
        y_ft: -y / tap.conj(),
        y_tf: -y / tap,
        y_tt: y,
        reactance: trafo.reactance,
        ratings: trafo.ratings,
    })
}
