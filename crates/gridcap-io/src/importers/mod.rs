//! Case importers.
//!
//! - **MATPOWER** (`.m`): buses, machines, branches and 2-winding transformers
//! - **JSON** (`.json`): the native format, including 3-winding transformers
//!
//! [`load_network`] picks the importer from the file extension.

use std::path::Path;

use anyhow::{anyhow, Result};
use gridcap_core::Network;

pub mod json_case;
pub mod matpower;
pub mod matpower_parser;

pub use json_case::{load_json_network, write_json_network, JsonCase};
pub use matpower::{build_network_from_matpower_case, load_matpower_network};
pub use matpower_parser::{parse_matpower_file, parse_matpower_string, MatpowerCase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFormat {
    Matpower,
    Json,
}

impl CaseFormat {
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "m" => Some(CaseFormat::Matpower),
            "json" => Some(CaseFormat::Json),
            _ => None,
        }
    }
}

/// Load a case file, choosing the importer by extension.
///
/// A path that does not exist fails with an `std::io::Error` of kind
/// `NotFound` at the root of the error chain.
pub fn load_network(path: &Path) -> Result<Network> {
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("case file '{}' not found", path.display()),
        )
        .into());
    }
    match CaseFormat::detect(path) {
        Some(CaseFormat::Matpower) => load_matpower_network(path),
        Some(CaseFormat::Json) => load_json_network(path),
        None => Err(anyhow!(
            "unsupported case format '{}'; expected .m or .json",
            path.display()
        )),
    }
}
