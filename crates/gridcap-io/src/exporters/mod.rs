//! Element tables of a case, written as `<stem>_exported_data.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use gridcap_core::{Network, Rate};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBus {
    pub number: usize,
    pub ex_name: String,
    #[serde(rename = "type")]
    pub kind: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBranch {
    pub from_number: usize,
    pub to_number: usize,
    pub branch_id: String,
    pub status: bool,
    pub rate1: Option<f64>,
    pub rate2: Option<f64>,
    pub rate3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTrafo3w {
    pub wind1_number: usize,
    pub wind2_number: usize,
    pub wind3_number: usize,
    pub trafo_id: String,
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPower {
    pub number: usize,
    pub id: String,
    pub status: bool,
    pub mva: Complex64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedData {
    pub buses: Vec<ExportBus>,
    pub branches: Vec<ExportBranch>,
    pub trafos: Vec<ExportBranch>,
    pub trafos3w: Vec<ExportTrafo3w>,
    pub loads: Vec<ExportPower>,
    pub gens: Vec<ExportPower>,
}

fn rating(ratings: &gridcap_core::Ratings, rate: Rate) -> Option<f64> {
    ratings.get(rate).map(|r| r.value())
}

impl ExportedData {
    pub fn from_network(network: &Network) -> Self {
        let buses = network
            .buses()
            .into_iter()
            .map(|b| ExportBus {
                number: b.id.value(),
                ex_name: b.name.clone(),
                kind: b.kind.code(),
            })
            .collect();
        let branches = network
            .branches()
            .into_iter()
            .map(|b| ExportBranch {
                from_number: b.from_bus.value(),
                to_number: b.to_bus.value(),
                branch_id: b.circuit.clone(),
                status: b.status,
                rate1: rating(&b.ratings, Rate::Rate1),
                rate2: rating(&b.ratings, Rate::Rate2),
                rate3: rating(&b.ratings, Rate::Rate3),
            })
            .collect();
        let trafos = network
            .transformers()
            .into_iter()
            .map(|t| ExportBranch {
                from_number: t.from_bus.value(),
                to_number: t.to_bus.value(),
                branch_id: t.circuit.clone(),
                status: t.status,
                rate1: rating(&t.ratings, Rate::Rate1),
                rate2: rating(&t.ratings, Rate::Rate2),
                rate3: rating(&t.ratings, Rate::Rate3),
            })
            .collect();
        let trafos3w = network
            .transformers3w()
            .into_iter()
            .map(|t| {
                let [w1, w2, w3] = t.key().buses;
                ExportTrafo3w {
                    wind1_number: w1.value(),
                    wind2_number: w2.value(),
                    wind3_number: w3.value(),
                    trafo_id: t.circuit.clone(),
                    status: t.status,
                }
            })
            .collect();
        let loads = network
            .loads()
            .into_iter()
            .map(|l| ExportPower {
                number: l.bus.value(),
                id: l.id.clone(),
                status: l.status,
                mva: Complex64::new(l.active_power.value(), l.reactive_power.value()),
            })
            .collect();
        let gens = network
            .generators()
            .into_iter()
            .map(|g| ExportPower {
                number: g.bus.value(),
                id: g.id.clone(),
                status: g.status,
                mva: Complex64::new(g.active_power.value(), g.reactive_power.value()),
            })
            .collect();
        Self {
            buses,
            branches,
            trafos,
            trafos3w,
            loads,
            gens,
        }
    }
}

/// Write the export next to the case (or into `out_dir`); returns the path.
pub fn write_exported_data(
    network: &Network,
    case_path: &Path,
    out_dir: Option<&Path>,
) -> Result<PathBuf> {
    let stem = case_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("case path '{}' has no file name", case_path.display()))?;
    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => case_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating output directory '{}'", dir.display()))?;
    let path = dir.join(format!("{stem}_exported_data.json"));
    let json = serde_json::to_string_pretty(&ExportedData::from_network(network))
        .context("serializing exported data")?;
    fs::write(&path, json).with_context(|| format!("writing '{}'", path.display()))?;
    Ok(path)
}
