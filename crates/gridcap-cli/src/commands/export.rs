use std::path::Path;

use anyhow::Result;
use gridcap_io::{load_network, write_exported_data};
use tracing::info;

pub fn handle(case: &Path, out_dir: Option<&Path>) -> Result<()> {
    let network = load_network(case)?;
    info!("Exporting {}: {}", case.display(), network.stats());
    let path = write_exported_data(&network, case, out_dir)?;
    println!("Wrote {}", path.display());
    Ok(())
}
