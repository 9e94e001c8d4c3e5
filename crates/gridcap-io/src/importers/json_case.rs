//! Native JSON case format.
//!
//! Unlike MATPOWER it can carry element names, load and machine ids and
//! 3-winding transformers:
//!
//! ```json
//! {
//!   "base_mva": 100.0,
//!   "buses": [{"id": 1, "name": "NORTH", "kind": 3, "voltage_pu": 1.02}],
//!   "branches": [],
//!   "transformers": [],
//!   "transformers3w": [],
//!   "loads": [],
//!   "machines": []
//! }
//! ```

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use gridcap_core::{Branch, Bus, Gen, Load, Network, Transformer, Transformer3w};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonCase {
    #[serde(default = "default_base_mva")]
    pub base_mva: f64,
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub transformers: Vec<Transformer>,
    #[serde(default)]
    pub transformers3w: Vec<Transformer3w>,
    #[serde(default)]
    pub loads: Vec<Load>,
    #[serde(default)]
    pub machines: Vec<Gen>,
}

fn default_base_mva() -> f64 {
    100.0
}

impl JsonCase {
    pub fn from_network(network: &Network) -> Self {
        Self {
            base_mva: network.base_mva,
            buses: network.buses().into_iter().cloned().collect(),
            branches: network.branches().into_iter().cloned().collect(),
            transformers: network.transformers().into_iter().cloned().collect(),
            transformers3w: network.transformers3w().into_iter().cloned().collect(),
            loads: network.loads().into_iter().cloned().collect(),
            machines: network.generators().into_iter().cloned().collect(),
        }
    }

    pub fn into_network(self) -> Result<Network> {
        let mut network = Network::new();
        network.base_mva = self.base_mva;
        for bus in self.buses {
            network.add_bus(bus);
        }
        for branch in self.branches {
            network.add_branch(branch)?;
        }
        for trafo in self.transformers {
            network.add_transformer(trafo)?;
        }
        for trafo in self.transformers3w {
            network.add_transformer3w(trafo)?;
        }
        for load in self.loads {
            network.add_load(load)?;
        }
        for machine in self.machines {
            network.add_gen(machine)?;
        }
        network.validate()?;
        Ok(network)
    }
}

pub fn load_json_network(path: &Path) -> Result<Network> {
    let file = File::open(path)
        .with_context(|| format!("opening JSON case '{}'", path.display()))?;
    let case: JsonCase = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing JSON case '{}'", path.display()))?;
    case.into_network()
        .with_context(|| format!("building network from '{}'", path.display()))
}

pub fn write_json_network(network: &Network, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&JsonCase::from_network(network))
        .context("serializing network to JSON")?;
    fs::write(path, json).with_context(|| format!("writing JSON case '{}'", path.display()))
}
