//! Report files and console tables of a headroom run.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gridcap_algo::capacity::stats::{ContingencyStats, FeasibilityStats};
use gridcap_algo::violations::element_label;
use gridcap_algo::{
    AnalysisContext, BusHeadroom, CapacityAnalysisStats, GridEngine, LimitingFactor,
    ViolationsLimits, ViolationsStats,
};
use serde::Serialize;
use tabwriter::TabWriter;

/// Files written for one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub headroom: PathBuf,
    pub violation_stats: PathBuf,
    pub contingency_stats: PathBuf,
    pub feasibility_stats: PathBuf,
}

impl ReportPaths {
    /// `<stem>_headroom.json` and friends, next to the case unless `out_dir` is given.
    pub fn new(case: &Path, out_dir: Option<&Path>) -> Self {
        let dir = out_dir
            .map(Path::to_path_buf)
            .or_else(|| case.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let stem = case
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "case".to_string());
        let file = |suffix: &str| dir.join(format!("{stem}_{suffix}.json"));
        Self {
            headroom: file("headroom"),
            violation_stats: file("violation_stats"),
            contingency_stats: file("contingency_stats"),
            feasibility_stats: file("feasibility_stats"),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [
            &self.headroom,
            &self.violation_stats,
            &self.contingency_stats,
            &self.feasibility_stats,
        ]
    }
}

#[derive(Serialize)]
struct HeadroomReport<'a> {
    headroom: &'a [BusHeadroom],
}

#[derive(Serialize)]
struct ContingencyReport<'a> {
    contingency_stats: &'a [ContingencyStats],
}

#[derive(Serialize)]
struct FeasibilityReport<'a> {
    feasibility_stats: &'a [FeasibilityStats],
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating report '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("writing report '{}'", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Write the four JSON reports of a run.
pub fn write_reports(
    case: &Path,
    out_dir: Option<&Path>,
    headroom: &[BusHeadroom],
    ctx: &AnalysisContext,
) -> Result<ReportPaths> {
    let paths = ReportPaths::new(case, out_dir);
    if let Some(dir) = paths.headroom.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating output directory '{}'", dir.display()))?;
        }
    }
    write_json(&paths.headroom, &HeadroomReport { headroom })?;
    write_json(&paths.violation_stats, &ctx.violations_stats)?;
    write_json(
        &paths.contingency_stats,
        &ContingencyReport {
            contingency_stats: &ctx.capacity_stats.contingency_stats,
        },
    )?;
    write_json(
        &paths.feasibility_stats,
        &FeasibilityReport {
            feasibility_stats: &ctx.capacity_stats.feasibility_stats,
        },
    )?;
    Ok(paths)
}

fn limiting(lf: Option<&LimitingFactor>) -> String {
    lf.map_or_else(|| "-".to_string(), ToString::to_string)
}

pub fn write_headroom_table<W: Write>(writer: W, headroom: &[BusHeadroom]) -> Result<()> {
    let mut tw = TabWriter::new(writer);
    writeln!(
        tw,
        "BUS\tNAME\tLOAD MW\tLOAD AVAIL MW\tLOAD LIMIT\tGEN MW\tGEN AVAIL MW\tGEN LIMIT"
    )?;
    for h in headroom {
        writeln!(
            tw,
            "{}\t{}\t{:.1}\t{:.1}\t{}\t{:.1}\t{:.1}\t{}",
            h.bus.number,
            h.bus.name,
            h.actual_load_mva.re,
            h.load_avail_mva.re,
            limiting(h.load_lf.as_ref()),
            h.actual_gen_mva.re,
            h.gen_avail_mva.re,
            limiting(h.gen_lf.as_ref()),
        )?;
    }
    tw.flush()?;
    Ok(())
}

/// Worst offenders first, one line per element.
pub fn write_violation_stats<W: Write, E: GridEngine + ?Sized>(
    writer: W,
    stats: &ViolationsStats,
    engine: &E,
    limits: &ViolationsLimits,
) -> Result<()> {
    let mut tw = TabWriter::new(writer);
    writeln!(tw, "VIOLATION\tLIMIT\tELEMENT\tCOUNT\tWORST")?;
    for section in stats.sorted_sections() {
        for (idx, values) in &section.elements {
            let worst = values.first().copied().unwrap_or(f64::NAN);
            writeln!(
                tw,
                "{}\t{}\t{}\t{}\t{:.3}",
                section.violation,
                section.limit,
                element_label(engine, section.violation, *idx, limits),
                values.len(),
                worst,
            )?;
        }
    }
    tw.flush()?;
    Ok(())
}

/// Infeasible probes per bus, then contingencies by how often they limited.
pub fn write_capacity_stats<W: Write>(writer: W, stats: &CapacityAnalysisStats) -> Result<()> {
    let mut tw = TabWriter::new(writer);
    writeln!(tw, "BUS\tUNFEASIBLE\tFIRST LIMIT")?;
    for feasibility in &stats.feasibility_stats {
        let first = feasibility.unfeasible_conditions.first().map(|c| &c.lf);
        writeln!(
            tw,
            "{}\t{}\t{}",
            feasibility.bus,
            feasibility.unfeasible_conditions.len(),
            limiting(first),
        )?;
    }
    writeln!(tw)?;
    writeln!(tw, "CONTINGENCY\tCONDITIONS\tBUSES")?;
    for contingency in stats.contingencies_by_count() {
        let buses: Vec<String> = contingency
            .bus_contingency_conditions
            .iter()
            .map(|b| b.b.to_string())
            .collect();
        writeln!(
            tw,
            "{}\t{}\t{}",
            contingency.contingency,
            contingency.total(),
            buses.join(","),
        )?;
    }
    tw.flush()?;
    Ok(())
}
