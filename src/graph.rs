use std::{
    collections::{btree_map::Entry, BTreeMap},
    path::{Path, PathBuf},
};

use anyhow::{bail, Result};
use itertools::Itertools;
use log::{error, info};
use plotters::prelude::*;
use thiserror::Error;

use crate::{
    experiments::{ResultRow, System},
    results::read_results,
};

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Figure size in inches, and the resolution it is rendered at.
const FIGURE_INCHES: (f64, f64) = (3.5, 3.0);
const DPI: f64 = 300.0;

pub fn figure_pixels() -> (u32, u32) {
    (
        (FIGURE_INCHES.0 * DPI).round() as u32,
        (FIGURE_INCHES.1 * DPI).round() as u32,
    )
}

/// Throughput per thread count.
pub type Series = BTreeMap<usize, f64>;

/// Two rows with the same label and thread count reached the pivot.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("duplicate entry for system {system} at {threads} threads")]
pub struct PivotCollision {
    pub system: System,
    pub threads: usize,
}

/// Keep only the first row for every (system, threads) pair.
pub fn dedup_by_threads(rows: &[ResultRow]) -> Vec<ResultRow> {
    rows.iter()
        .unique_by(|r| (r.system, r.threads))
        .cloned()
        .collect()
}

/// Index throughput by thread count, one series per system.
pub fn pivot(rows: &[ResultRow]) -> Result<BTreeMap<System, Series>, PivotCollision> {
    let mut table: BTreeMap<System, Series> = BTreeMap::new();
    for row in rows {
        match table.entry(row.system).or_default().entry(row.threads) {
            Entry::Vacant(e) => {
                e.insert(row.throughput);
            }
            Entry::Occupied(_) => {
                return Err(PivotCollision {
                    system: row.system,
                    threads: row.threads,
                })
            }
        }
    }
    Ok(table)
}

/// Load the results table and plot throughput against thread count.
pub fn graph(config: &GraphConfig) -> Result<()> {
    let rows = read_results(&config.input)?;
    info!("Read {} rows from {}", rows.len(), config.input.display());

    let table = match pivot(&dedup_by_threads(&rows)) {
        Ok(table) => table,
        Err(e) => {
            error!("Cannot pivot {}: {e}", config.input.display());
            return Err(e.into());
        }
    };
    plot(&table, &config.output)?;
    info!("Wrote {}", config.output.display());
    Ok(())
}

/// Draw one line per system into an SVG file.
pub fn plot(table: &BTreeMap<System, Series>, output: &Path) -> Result<()> {
    let points = table.values().flat_map(|s| s.iter()).collect_vec();
    if points.is_empty() {
        bail!("nothing to plot");
    }
    let (min_x, max_x) = points
        .iter()
        .map(|&(&t, _)| t as f64)
        .minmax()
        .into_option()
        .unwrap_or((0.0, 1.0));
    let x_range = if min_x < max_x {
        min_x..max_x
    } else {
        (min_x - 1.0).max(0.0)..max_x + 1.0
    };
    let max_y = points.iter().map(|&(_, &y)| y).fold(0.0, f64::max);
    let y_range = 0.0..if max_y > 0.0 { max_y * 1.1 } else { 1.0 };

    let root = SVGBackend::new(output, figure_pixels()).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(120)
        .build_cartesian_2d(x_range, y_range)?;
    chart
        .configure_mesh()
        .x_desc("Threads")
        .y_desc("Throughput (ops/s)")
        .draw()?;

    for (idx, (system, series)) in table.iter().enumerate() {
        let style = Palette99::pick(idx).to_rgba().stroke_width(3);
        chart
            .draw_series(LineSeries::new(
                series.iter().map(|(&t, &y)| (t as f64, y)),
                style,
            ))?
            .label(system.name())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
