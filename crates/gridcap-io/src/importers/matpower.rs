use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use gridcap_core::{
    Branch, Bus, BusId, BusKind, Gen, Kilovolts, Load, Megavars, MegavoltAmperes, Megawatts,
    Network, PerUnit, Radians, Ratings, Transformer,
};

use super::matpower_parser::{parse_matpower_file, MatpowerBranch, MatpowerCase};

/// Load a MATPOWER `.m` case into a [`Network`].
pub fn load_matpower_network(path: &Path) -> Result<Network> {
    let case = parse_matpower_file(path)?;
    build_network_from_matpower_case(&case)
        .with_context(|| format!("building network from '{}'", path.display()))
}

/// Map MATPOWER rows onto the network model.
///
/// - bus `Pd/Qd` becomes a load with id `"1"` (skipped when both are zero)
/// - bus `Gs/Bs` stays on the bus as a shunt
/// - branches with a tap or phase shift become transformers
/// - parallel elements between the same ordered bus pair get circuit ids
///   `"1"`, `"2"`, ... in file order
pub fn build_network_from_matpower_case(case: &MatpowerCase) -> Result<Network> {
    let mut network = Network::new();
    network.base_mva = case.base_mva;

    for (idx, row) in case.bus.iter().enumerate() {
        let kind = BusKind::try_from(row.bus_type)
            .with_context(|| format!("bus {} has an invalid type", row.bus_i))?;
        let name = case
            .bus_name
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("BUS{}", row.bus_i));
        network.add_bus(Bus {
            id: BusId::new(row.bus_i),
            name,
            kind,
            base_kv: Kilovolts(row.base_kv),
            voltage_pu: PerUnit(if row.vm > 0.0 { row.vm } else { 1.0 }),
            angle_rad: Radians::from_degrees(row.va),
            shunt_g_mw: row.gs,
            shunt_b_mvar: row.bs,
        });
    }

    for row in &case.bus {
        if row.pd != 0.0 || row.qd != 0.0 {
            network.add_load(Load::new(
                BusId::new(row.bus_i),
                "1",
                Megawatts(row.pd),
                Megavars(row.qd),
            ))?;
        }
    }

    let mut machine_ids: HashMap<usize, usize> = HashMap::new();
    for row in &case.gen {
        let count = machine_ids.entry(row.gen_bus).or_insert(0);
        *count += 1;
        let mut gen = Gen::new(
            BusId::new(row.gen_bus),
            &count.to_string(),
            Megawatts(row.pg),
            Megavars(row.qg),
        );
        gen.status = row.gen_status > 0;
        network.add_gen(gen)?;
    }

    let mut circuits: HashMap<(usize, usize), usize> = HashMap::new();
    for row in &case.branch {
        let count = circuits.entry((row.f_bus, row.t_bus)).or_insert(0);
        *count += 1;
        let circuit = count.to_string();
        if row.is_transformer() {
            network.add_transformer(transformer_from_row(row, circuit))?;
        } else {
            network.add_branch(branch_from_row(row, circuit))?;
        }
    }

    network.validate()?;
    Ok(network)
}

fn ratings_from_row(row: &MatpowerBranch) -> Ratings {
    let rating = |value: f64| (value > 0.0).then_some(MegavoltAmperes(value));
    Ratings {
        rating_a: rating(row.rate_a),
        rating_b: rating(row.rate_b),
        rating_c: rating(row.rate_c),
    }
}

fn branch_from_row(row: &MatpowerBranch, circuit: String) -> Branch {
    Branch {
        from_bus: BusId::new(row.f_bus),
        to_bus: BusId::new(row.t_bus),
        circuit,
        name: String::new(),
        resistance: row.br_r,
        reactance: row.br_x,
        charging_b: row.br_b,
        ratings: ratings_from_row(row),
        status: row.br_status > 0,
    }
}

fn transformer_from_row(row: &MatpowerBranch, circuit: String) -> Transformer {
    Transformer {
        from_bus: BusId::new(row.f_bus),
        to_bus: BusId::new(row.t_bus),
        circuit,
        name: String::new(),
        resistance: row.br_r,
        reactance: row.br_x,
        // MATPOWER puts branch charging on transformers too; keep it as magnetizing B
        magnetizing_b: row.br_b,
        tap_ratio: if row.tap == 0.0 { 1.0 } else { row.tap },
        phase_shift: Radians::from_degrees(row.shift),
        ratings: ratings_from_row(row),
        status: row.br_status > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::super::matpower_parser::parse_matpower_string;
    use super::*;
    use gridcap_core::Rate;

    const CASE: &str = r#"
mpc.baseMVA = 100;
mpc.bus = [
    1   3   0     0     0   0    1   1.02  0   230   1   1.1   0.9;
    2   1   90    30    0   0    1   1.0   0   230   1   1.1   0.9;
    3   2   0     0     0   5    1   1.01  0   230   1   1.1   0.9;
];
mpc.gen = [
    1   0     0   300  -300  1.02  100  1   250  0;
    3   60    0   300  -300  1.01  100  1   250  0;
    3   10    0   300  -300  1.01  100  0   250  0;
];
mpc.branch = [
    1   2   0.01  0.1   0.02   150  180  0    0     0   1   -360  360;
    1   2   0.01  0.1   0.02   150  180  0    0     0   1   -360  360;
    1   3   0.0   0.08  0.0    100  100  100  1.05  0   1   -360  360;
    2   3   0.01  0.1   0.02   150  180  200  0     0   0   -360  360;
];
"#;

    fn network() -> Network {
        let case = parse_matpower_string(CASE).unwrap();
        build_network_from_matpower_case(&case).unwrap()
    }

    #[test]
    fn test_elements_are_mapped() {
        let network = network();
        let stats = network.stats();
        assert_eq!(stats.num_buses, 3);
        assert_eq!(stats.num_loads, 1);
        assert_eq!(stats.num_gens, 3);
        assert_eq!(stats.num_branches, 3);
        assert_eq!(stats.num_transformers, 1);
        assert_eq!(network.buses()[0].kind, BusKind::Swing);
        assert_eq!(network.buses()[2].shunt_b_mvar, 5.0);
    }

    #[test]
    fn test_parallel_circuits_get_distinct_ids() {
        let network = network();
        let circuits: Vec<String> = network
            .branches()
            .iter()
            .filter(|b| b.from_bus == BusId::new(1) && b.to_bus == BusId::new(2))
            .map(|b| b.circuit.clone())
            .collect();
        assert_eq!(circuits, vec!["1", "2"]);
    }

    #[test]
    fn test_status_and_ratings() {
        let network = network();
        let out_of_service = network
            .branches()
            .into_iter()
            .find(|b| b.from_bus == BusId::new(2))
            .unwrap();
        assert!(!out_of_service.status);
        assert!(network.branches()[0].ratings.get(Rate::Rate3).is_none());
        let trafo = &network.transformers()[0];
        assert_eq!(trafo.tap_ratio, 1.05);
        assert_eq!(trafo.ratings.get(Rate::Rate1), Some(MegavoltAmperes(100.0)));
        let machines = network.generators_at_bus(BusId::new(3));
        assert_eq!(machines.len(), 2);
        assert_eq!(machines[1].id, "2");
        assert!(!machines[1].status);
    }

    #[test]
    fn test_unknown_branch_bus_fails() {
        let content = r#"
mpc.bus = [
    1   3   0   0   0   0   1   1   0   230   1   1.1   0.9;
];
mpc.branch = [
    1   7   0.01  0.1   0.02   150  180  0    0     0   1   -360  360;
];
"#;
        let case = parse_matpower_string(content).unwrap();
        let err = build_network_from_matpower_case(&case).unwrap_err();
        assert!(format!("{err:#}").contains("unknown bus 7"));
    }
}
