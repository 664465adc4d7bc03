// Local profiling of uploaded clinical trial CSV data

use super::round_to;
use crate::types::{AppError, AppResult};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Correlations weaker than this are not turned into recommendations.
const NOTABLE_CORRELATION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStat {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialDataProfile {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub descriptive_stats: Vec<DescriptiveStat>,
    /// Pearson r keyed `<column>_<column>`, numeric column pairs only.
    pub correlations: BTreeMap<String, f64>,
}

impl TrialDataProfile {
    pub fn summary(&self) -> String {
        let numeric: Vec<&str> = self.descriptive_stats.iter().map(|s| s.column.as_str()).collect();
        let mut summary = format!(
            "{} rows across {} columns ({} numeric: {}).",
            self.row_count,
            self.columns.len(),
            numeric.len(),
            if numeric.is_empty() { "none".to_string() } else { numeric.join(", ") }
        );
        if let Some((pair, r)) = self.strongest_correlation() {
            summary.push_str(&format!(" Strongest correlation: {} (r = {:.2}).", pair, r));
        }
        summary
    }

    pub fn recommendations(&self) -> Vec<String> {
        let mut recommendations: Vec<String> = self
            .correlations
            .iter()
            .filter(|(_, r)| r.abs() >= NOTABLE_CORRELATION)
            .map(|(pair, r)| format!("Investigate the {} relationship (r = {:.2})", pair, r))
            .collect();

        if self.columns.iter().any(|c| c.eq_ignore_ascii_case("age")) {
            recommendations.push("Consider age stratification".to_string());
        }
        if self.row_count < 30 {
            recommendations.push("Collect more observations before drawing conclusions".to_string());
        }
        recommendations.push("Monitor treatment response".to_string());
        recommendations
    }

    fn strongest_correlation(&self) -> Option<(&str, f64)> {
        self.correlations
            .iter()
            .map(|(pair, r)| (pair.as_str(), *r))
            .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap_or(std::cmp::Ordering::Equal))
    }
}

/// Profiles CSV text with a header row. A column is numeric when every
/// non-empty cell parses as a number.
pub fn profile_csv(data: &[u8]) -> AppResult<TrialDataProfile> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(data);

    let invalid = |e: csv::Error| AppError::InvalidRequest(format!("Invalid CSV: {}", e));

    let headers: Vec<String> = rdr.headers().map_err(invalid)?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::InvalidRequest("CSV file has no header row".to_string()));
    }

    // One entry per row; `None` for empty or non-numeric cells.
    let mut cells: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];
    let mut numeric = vec![true; headers.len()];
    let mut row_count = 0;

    for record in rdr.records() {
        let record = record.map_err(invalid)?;
        row_count += 1;
        for (idx, field) in record.iter().enumerate() {
            if idx >= headers.len() {
                break;
            }
            if field.is_empty() {
                cells[idx].push(None);
                continue;
            }
            match field.parse::<f64>() {
                Ok(value) if value.is_finite() => cells[idx].push(Some(value)),
                _ => {
                    numeric[idx] = false;
                    cells[idx].push(None);
                }
            }
        }
    }

    if row_count == 0 {
        return Err(AppError::InvalidRequest("CSV file has no data rows".to_string()));
    }

    let numeric_columns: Vec<usize> = (0..headers.len())
        .filter(|&idx| numeric[idx] && cells[idx].iter().any(Option::is_some))
        .collect();

    let descriptive_stats = numeric_columns
        .iter()
        .filter_map(|&idx| describe(&headers[idx], &cells[idx]))
        .collect();

    let mut correlations = BTreeMap::new();
    for (pos, &a) in numeric_columns.iter().enumerate() {
        for &b in &numeric_columns[pos + 1..] {
            if let Some(r) = pearson(&cells[a], &cells[b]) {
                correlations.insert(format!("{}_{}", headers[a], headers[b]), round_to(r, 3));
            }
        }
    }

    Ok(TrialDataProfile {
        row_count,
        columns: headers,
        descriptive_stats,
        correlations,
    })
}

fn describe(column: &str, cells: &[Option<f64>]) -> Option<DescriptiveStat> {
    let mut col: Vec<f64> = cells.iter().flatten().copied().collect();
    if col.is_empty() {
        return None;
    }
    col.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = col.len();
    let mean = col.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (col[count / 2 - 1] + col[count / 2]) / 2.0
    } else {
        col[count / 2]
    };
    Some(DescriptiveStat {
        column: column.to_string(),
        count,
        mean: round_to(mean, 3),
        std_dev: round_to(std_dev(&col, mean), 3),
        min: col[0],
        median,
        max: col[count - 1],
    })
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}

/// Over rows where both cells are present; `None` below three pairs or
/// when either side is constant.
fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 3 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
