//! MATPOWER .m file parser
//!
//! Reads `mpc.baseMVA`, `mpc.bus`, `mpc.gen`, `mpc.branch` and the optional
//! `mpc.bus_name` cell array. Other fields (gencost, areas, ...) are skipped.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

use crate::helpers::{integral_f64_to_i32, integral_f64_to_usize};

/// Parsed MATPOWER case data
#[derive(Debug, Default)]
pub struct MatpowerCase {
    pub version: String,
    pub base_mva: f64,
    pub bus: Vec<MatpowerBus>,
    pub gen: Vec<MatpowerGen>,
    pub branch: Vec<MatpowerBranch>,
    pub bus_name: Vec<String>,
}

/// Row of `mpc.bus`
#[derive(Debug, Clone)]
pub struct MatpowerBus {
    pub bus_i: usize,
    pub bus_type: i32,
    pub pd: f64,
    pub qd: f64,
    pub gs: f64,
    pub bs: f64,
    pub vm: f64,
    pub va: f64,
    pub base_kv: f64,
}

/// Row of `mpc.gen`
#[derive(Debug, Clone)]
pub struct MatpowerGen {
    pub gen_bus: usize,
    pub pg: f64,
    pub qg: f64,
    pub vg: f64,
    pub gen_status: i32,
}

/// Row of `mpc.branch`
#[derive(Debug, Clone)]
pub struct MatpowerBranch {
    pub f_bus: usize,
    pub t_bus: usize,
    pub br_r: f64,
    pub br_x: f64,
    pub br_b: f64,
    pub rate_a: f64,
    pub rate_b: f64,
    pub rate_c: f64,
    pub tap: f64,
    pub shift: f64,
    pub br_status: i32,
}

impl MatpowerBranch {
    /// MATPOWER marks transformers with a non-zero tap or phase shift.
    pub fn is_transformer(&self) -> bool {
        self.tap != 0.0 || self.shift != 0.0
    }
}

pub fn parse_matpower_file(path: &Path) -> Result<MatpowerCase> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading MATPOWER file: {}", path.display()))?;
    parse_matpower_string(&content)
        .with_context(|| format!("parsing MATPOWER file: {}", path.display()))
}

/// Parse MATPOWER content from a string in a single pass over its lines.
pub fn parse_matpower_string(content: &str) -> Result<MatpowerCase> {
    let mut case = MatpowerCase {
        base_mva: 100.0,
        ..MatpowerCase::default()
    };

    let mut lines = content.lines();
    while let Some(line) = lines.next() {
        let trimmed = strip_comment(line).trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with("mpc.version") && trimmed.contains('=') {
            case.version = inline_value(trimmed)
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string();
        } else if trimmed.starts_with("mpc.baseMVA") && trimmed.contains('=') {
            case.base_mva = inline_value(trimmed)
                .parse()
                .with_context(|| format!("invalid baseMVA in '{trimmed}'"))?;
        } else if trimmed.starts_with("mpc.bus_name") && trimmed.contains('{') {
            case.bus_name = collect_names(trimmed, &mut lines);
        } else if let Some(section) = matrix_section(trimmed) {
            let rows = collect_rows(trimmed, &mut lines);
            match section {
                "bus" => case.bus = parse_rows(&rows, 13, "bus", parse_bus_row)?,
                "gen" => case.gen = parse_rows(&rows, 8, "gen", parse_gen_row)?,
                "branch" => case.branch = parse_rows(&rows, 11, "branch", parse_branch_row)?,
                _ => {}
            }
        }
    }

    if case.bus.is_empty() {
        return Err(anyhow!("mpc.bus matrix not found"));
    }
    Ok(case)
}

fn strip_comment(line: &str) -> &str {
    line.split('%').next().unwrap_or("")
}

/// Right-hand side of `name = value;`
fn inline_value(line: &str) -> &str {
    line.split_once('=')
        .map(|(_, v)| v.trim().trim_end_matches(';').trim())
        .unwrap_or("")
}

/// `mpc.<name> = [` opens a numeric matrix; returns `<name>`.
fn matrix_section(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("mpc.")?;
    let (name, value) = rest.split_once('=')?;
    if value.trim_start().starts_with('[') {
        Some(name.trim())
    } else {
        None
    }
}

/// Gather the numeric rows of a matrix whose header line is `header`.
fn collect_rows<'a>(header: &str, lines: &mut impl Iterator<Item = &'a str>) -> Vec<Vec<f64>> {
    let mut rows = Vec::new();
    let mut push_rows = |text: &str| {
        for row in text.split(';') {
            let values = parse_row(row);
            if !values.is_empty() {
                rows.push(values);
            }
        }
    };

    let after_bracket = header.split_once('[').map(|(_, rest)| rest).unwrap_or("");
    if let Some((data, _)) = after_bracket.split_once(']') {
        push_rows(data);
        return rows;
    }
    push_rows(after_bracket);

    for line in lines {
        let trimmed = strip_comment(line).trim();
        if let Some((data, _)) = trimmed.split_once(']') {
            push_rows(data);
            break;
        }
        push_rows(trimmed);
    }
    rows
}

/// Gather the quoted names of a `{ 'a'; 'b'; }` cell array.
fn collect_names<'a>(header: &str, lines: &mut impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names = Vec::new();
    let mut take = |text: &str| {
        names.extend(
            text.split(';')
                .map(|s| s.trim().trim_matches(|c| c == '\'' || c == '"').trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    };

    let after_brace = header.split_once('{').map(|(_, rest)| rest).unwrap_or("");
    if let Some((data, _)) = after_brace.split_once('}') {
        take(data);
        return names;
    }
    take(after_brace);
    for line in lines {
        let trimmed = strip_comment(line).trim();
        if let Some((data, _)) = trimmed.split_once('}') {
            take(data);
            break;
        }
        take(trimmed);
    }
    names
}

fn parse_row(line: &str) -> Vec<f64> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f64>().ok())
        .collect()
}

fn parse_rows<T>(
    rows: &[Vec<f64>],
    min_columns: usize,
    section: &str,
    parse: fn(&[f64], usize) -> Result<T>,
) -> Result<Vec<T>> {
    rows.iter()
        .enumerate()
        .map(|(row_idx, values)| {
            if values.len() < min_columns {
                return Err(anyhow!(
                    "mpc.{section} row {row_idx} has {} columns, expected at least {min_columns}",
                    values.len()
                ));
            }
            parse(values, row_idx)
        })
        .collect()
}

fn parse_bus_row(values: &[f64], row_idx: usize) -> Result<MatpowerBus> {
    Ok(MatpowerBus {
        bus_i: integral_f64_to_usize(values[0])
            .with_context(|| format!("invalid bus_i at row {row_idx}"))?,
        bus_type: integral_f64_to_i32(values[1])
            .with_context(|| format!("invalid bus_type at row {row_idx}"))?,
        pd: values[2],
        qd: values[3],
        gs: values[4],
        bs: values[5],
        vm: values[7],
        va: values[8],
        base_kv: values[9],
    })
}

fn parse_gen_row(values: &[f64], row_idx: usize) -> Result<MatpowerGen> {
    Ok(MatpowerGen {
        gen_bus: integral_f64_to_usize(values[0])
            .with_context(|| format!("invalid gen_bus at row {row_idx}"))?,
        pg: values[1],
        qg: values[2],
        vg: values[5],
        gen_status: integral_f64_to_i32(values[7])
            .with_context(|| format!("invalid gen_status at row {row_idx}"))?,
    })
}

fn parse_branch_row(values: &[f64], row_idx: usize) -> Result<MatpowerBranch> {
    Ok(MatpowerBranch {
        f_bus: integral_f64_to_usize(values[0])
            .with_context(|| format!("invalid f_bus at row {row_idx}"))?,
        t_bus: integral_f64_to_usize(values[1])
            .with_context(|| format!("invalid t_bus at row {row_idx}"))?,
        br_r: values[2],
        br_x: values[3],
        br_b: values[4],
        rate_a: values[5],
        rate_b: values[6],
        rate_c: values[7],
        tap: values[8],
        shift: values[9],
        br_status: integral_f64_to_i32(values[10])
            .with_context(|| format!("invalid br_status at row {row_idx}"))?,
    })
}
