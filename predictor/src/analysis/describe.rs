//! Per-drug summary of the patients' clinical labels for the results table.

use std::collections::HashMap;

use ndarray::{Array1, ArrayView1, Axis};
use ndarray_stats::{interpolate::Linear, QuantileExt};
use noisy_float::types::n64;

use crate::data_handling::clinical_response::ResponseLabel;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelSummary {
    /// Non-empty category cells.
    pub count: usize,
    pub unique: usize,
    /// Most frequent category; ties go to the first one seen.
    pub top: Option<String>,
    pub freq: usize,
    // over the 0/1 labels
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut arr = Array1::from(values.to_vec());
    arr.quantile_axis_skipnan_mut(Axis(0), n64(q), &Linear)
        .map(|a| a[()])
        .unwrap_or(f64::NAN)
}

impl LabelSummary {
    pub fn from_labels(
        categories: ArrayView1<'_, Option<String>>,
        labels: ArrayView1<'_, ResponseLabel>,
    ) -> Self {
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for cell in categories.iter().flatten() {
            let entry = counts.entry(cell.as_str()).or_insert(0);
            if *entry == 0 {
                order.push(cell.as_str());
            }
            *entry += 1;
        }
        let count = counts.values().sum();
        let (top, freq) = order
            .iter()
            .fold((None, 0), |(top, freq), &c| match counts[c] {
                n if n > freq => (Some(c.to_string()), n),
                _ => (top, freq),
            });

        let binary: Vec<f64> = labels
            .iter()
            .filter_map(|l| l.as_binary().map(f64::from))
            .collect();
        let n = binary.len() as f64;
        let (mean, std) = match binary.len() {
            0 => (f64::NAN, f64::NAN),
            len => {
                let mean = binary.iter().sum::<f64>() / n;
                let std = if len > 1 {
                    (binary.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
                } else {
                    f64::NAN
                };
                (mean, std)
            }
        };

        Self {
            count,
            unique: order.len(),
            top,
            freq,
            mean,
            std,
            min: quantile(&binary, 0.0),
            q25: quantile(&binary, 0.25),
            median: quantile(&binary, 0.5),
            q75: quantile(&binary, 0.75),
            max: quantile(&binary, 1.0),
        }
    }
}
