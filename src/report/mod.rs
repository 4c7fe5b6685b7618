pub mod json;
pub mod text;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::model::labeled::{Label, Reduction};
use crate::model::score::{AGGREGATION, CENTER, ERROR_HIGH, ERROR_LOW, Score, SkipStats};
use crate::pipeline::stage5_extrapolate::{BOOTSTRAP_DIM, PARAM_DIM, PARAM_TAU0, PARAM_V0};
use crate::report::json::render_summary_json;
use crate::report::text::render_report_text;

#[derive(Debug, Clone, Serialize)]
pub struct UnitRow {
    pub unit: String,
    pub center: f64,
    pub error_low: f64,
    pub error_high: f64,
    pub endpoint_x: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CeilingSummary {
    pub tool_name: String,
    pub tool_version: String,
    pub identifier: String,
    pub center: f64,
    pub error_low: f64,
    pub error_high: f64,
    pub endpoint_x: Option<f64>,
    pub v0_median: Option<f64>,
    pub tau0_median: Option<f64>,
    pub num_bootstraps: usize,
    pub n_units: usize,
    pub skips: SkipStats,
    pub units: Vec<UnitRow>,
}

pub fn format_f64_6(v: f64) -> String {
    if v.is_finite() {
        format!("{:.6}", v)
    } else {
        "NA".to_string()
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn nan_percentile(values: &[f64], q: f64) -> f64 {
    let kept = values.iter().copied().filter(|v| !v.is_nan()).collect::<Vec<_>>();
    percentile(&kept, q)
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

pub fn nan_median(values: &[f64]) -> f64 {
    nan_percentile(values, 50.0)
}

pub fn build_summary(
    identifier: &str,
    ceiling: &Score,
    unit_dim: &str,
    num_bootstraps: usize,
) -> Result<CeilingSummary> {
    let center = ceiling.center()?;
    let error_low = ceiling.aggregation(ERROR_LOW)?.item()?;
    let error_high = ceiling.aggregation(ERROR_HIGH)?.item()?;

    let endpoint_x = match &ceiling.provenance.endpoint_x {
        Some(t) => Some(t.item()?),
        None => None,
    };

    let (v0_median, tau0_median) = match &ceiling.provenance.bootstrapped_params {
        Some(params) => {
            let per_param = params.reduce(BOOTSTRAP_DIM, Reduction::NanMedian)?;
            (
                Some(per_param.sel(PARAM_DIM, &Label::from(PARAM_V0))?.item()?),
                Some(per_param.sel(PARAM_DIM, &Label::from(PARAM_TAU0))?.item()?),
            )
        }
        None => (None, None),
    };

    let units = match ceiling.raw() {
        Some(per_unit) if per_unit.values.has_dim(unit_dim) => unit_rows(per_unit, unit_dim)?,
        _ => Vec::new(),
    };

    Ok(CeilingSummary {
        tool_name: "kira-ceiling".to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        identifier: identifier.to_string(),
        center,
        error_low,
        error_high,
        endpoint_x,
        v0_median,
        tau0_median,
        num_bootstraps,
        n_units: units.len(),
        skips: ceiling.skips(),
        units,
    })
}

fn unit_rows(per_unit: &Score, unit_dim: &str) -> Result<Vec<UnitRow>> {
    let n_units = per_unit.values.len_of(unit_dim)?;
    let unit_coords = per_unit
        .values
        .dims()
        .iter()
        .find(|d| d.name == unit_dim)
        .map(|d| d.coords.clone())
        .unwrap_or_default();
    let endpoints = per_unit.provenance.endpoint_x.as_ref();

    let mut rows = Vec::with_capacity(n_units);
    for i in 0..n_units {
        let unit = per_unit.values.index_axis(unit_dim, i)?;
        let pick = |which: &str| -> Result<f64> { unit.sel(AGGREGATION, &Label::from(which))?.item() };
        let endpoint_x = match endpoints {
            Some(t) => t.index_axis(unit_dim, i)?.item()?,
            None => f64::NAN,
        };
        let name = unit_coords
            .iter()
            .map(|c| format!("{}={}", c.name, c.values[i]))
            .collect::<Vec<_>>()
            .join(";");
        rows.push(UnitRow {
            unit: if name.is_empty() { i.to_string() } else { name },
            center: pick(CENTER)?,
            error_low: pick(ERROR_LOW)?,
            error_high: pick(ERROR_HIGH)?,
            endpoint_x,
        });
    }
    Ok(rows)
}

pub fn write_reports(summary: &CeilingSummary, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)?;

    let json = render_summary_json(summary)?;
    write_text(&out_dir.join("ceiling.json"), &json)?;

    let report = render_report_text(summary);
    write_text(&out_dir.join("ceiling.txt"), &report)?;

    write_units_tsv(summary, &out_dir.join("units.tsv"))?;
    Ok(())
}

fn write_units_tsv(summary: &CeilingSummary, path: &Path) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "unit\tcenter\terror_low\terror_high\tendpoint_x")?;
    for row in &summary.units {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            row.unit,
            format_f64_6(row.center),
            format_f64_6(row.error_low),
            format_f64_6(row.error_high),
            format_f64_6(row.endpoint_x)
        )?;
    }
    w.flush()?;
    Ok(())
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(contents.as_bytes())?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
