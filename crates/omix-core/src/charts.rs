//! Chart data helpers for the correlation panel.

use crate::analysis::CorrelationGraphData;
use crate::models::ExperimentType;

/// How the correlation panel draws a gene/GEM pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Scatter plot with the regression line.
    Scatter,
    /// One box per distinct GEM value.
    BoxPlot,
}

impl ChartKind {
    /// Ordinal (CNA) experiments with few distinct GEM levels are drawn as
    /// box plots; everything else as a scatter chart.
    pub fn select(
        experiment_type: ExperimentType,
        distinct_gem_values: usize,
        max_distinct_for_boxplot: usize,
    ) -> ChartKind {
        if experiment_type.is_ordinal() && distinct_gem_values <= max_distinct_for_boxplot {
            ChartKind::BoxPlot
        } else {
            ChartKind::Scatter
        }
    }

    pub fn for_data(
        experiment_type: ExperimentType,
        data: &CorrelationGraphData,
        max_distinct_for_boxplot: usize,
    ) -> ChartKind {
        Self::select(
            experiment_type,
            distinct_count(&data.gem_values),
            max_distinct_for_boxplot,
        )
    }
}

/// Number of distinct finite values, compared exactly.
pub fn distinct_count(values: &[f64]) -> usize {
    let mut seen: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    seen.sort_by(f64::total_cmp);
    seen.dedup();
    seen.len()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionLine {
    pub slope: f64,
    pub intercept: f64,
    /// Endpoints across the observed x range.
    pub start: (f64, f64),
    pub end: (f64, f64),
}

/// Ordinary least-squares fit of `y` on `x`.
///
/// Pairs with a non-finite coordinate are skipped. Returns `None` with fewer
/// than two usable points or no variance in `x`.
pub fn regression_line(x: &[f64], y: &[f64]) -> Option<RegressionLine> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .map(|(a, b)| (*a, *b))
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect();
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    Some(RegressionLine {
        slope,
        intercept,
        start: (min_x, slope * min_x + intercept),
        end: (max_x, slope * max_x + intercept),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxSummary {
    /// GEM level this box groups by.
    pub level: f64,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Groups gene values by GEM level and summarizes each group, levels
/// ascending.
pub fn box_plot_summaries(gene_values: &[f64], gem_values: &[f64]) -> Vec<BoxSummary> {
    let mut groups: Vec<(f64, Vec<f64>)> = vec![];
    for (gene, gem) in gene_values.iter().zip(gem_values) {
        if !gene.is_finite() || !gem.is_finite() {
            continue;
        }
        match groups.iter_mut().find(|(level, _)| *level == *gem) {
            Some((_, values)) => values.push(*gene),
            None => groups.push((*gem, vec![*gene])),
        }
    }
    groups.sort_by(|a, b| a.0.total_cmp(&b.0));

    groups
        .into_iter()
        .map(|(level, mut values)| {
            values.sort_by(f64::total_cmp);
            BoxSummary {
                level,
                count: values.len(),
                min: values[0],
                q1: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q3: quantile(&values, 0.75),
                max: values[values.len() - 1],
            }
        })
        .collect()
}

/// Linear-interpolation quantile over sorted, non-empty `values`.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
