//! # gridcap-io: case loading and data export
//!
//! ```rust,no_run
//! use gridcap_io::importers::load_network;
//!
//! fn main() -> anyhow::Result<()> {
//!     let network = load_network(std::path::Path::new("case9.m"))?;
//!     println!("{}", network.stats());
//!     Ok(())
//! }
//! ```

pub mod exporters;
pub mod helpers;
pub mod importers;

pub use exporters::{write_exported_data, ExportedData};
pub use importers::{load_network, CaseFormat};
