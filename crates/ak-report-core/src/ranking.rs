//! Ranking-quality metrics over search results.
//!
//! The inputs are plain relevance arrays in the rank order a search
//! returned them. Every metric is computed on its own prefix slice for
//! each cutoff `n = 1..=N`, so any point of a curve can be checked in
//! isolation.
//!
//! ```text
//! DCG(v)         = Σ v[i-1] / log2(i + 1)      for i = 1..=len(v)
//! NDCG(v, ideal) = DCG(v) / DCG(ideal)
//! Precision@n    = |{ i ≤ n : rel[i] > 0 }| / n
//! ```
//!
//! An ideal ranking with zero gain makes NDCG undefined. That case is
//! reported as [`AnalysisError::UndefinedMetric`] and resolved by the
//! caller's [`UndefinedNdcg`] policy; it never turns into NaN.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Number of thread results requested per query by default.
pub const DEFAULT_THREAD_RESULTS: usize = 75;

/// Number of email results requested per query by default.
pub const DEFAULT_EMAIL_RESULTS: usize = 500;

/// What to do when the ideal ranking for some cutoff has zero gain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UndefinedNdcg {
    /// Report `0.0` for that cutoff and remember where it happened.
    #[default]
    Zero,
    /// Fail the whole analysis.
    Error,
}

/// Discounted cumulative gain of `values` in the given order.
pub fn dcg(values: &[f64]) -> f64 {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| v / ((i + 2) as f64).log2())
        .sum()
}

/// `values` sorted descending.
pub fn ideal_ordering(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
}

/// Normalized DCG of `values` against `ideal`.
///
/// `n` only labels the error.
pub fn ndcg(values: &[f64], ideal: &[f64], n: usize) -> Result<f64, AnalysisError> {
    let ideal_dcg = dcg(ideal);
    if ideal_dcg <= 0.0 {
        return Err(AnalysisError::UndefinedMetric { metric: "NDCG", n });
    }
    Ok(dcg(values) / ideal_dcg)
}

/// Fraction of `values` greater than zero; `0.0` for an empty slice.
pub fn precision(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| **v > 0.0).count() as f64 / values.len() as f64
}

/// Precision over the first `n` values.
pub fn precision_at(values: &[f64], n: usize) -> f64 {
    precision(&values[..n.min(values.len())])
}

/// Reject negative and NaN relevances.
pub fn validate_relevances(values: &[f64]) -> Result<(), AnalysisError> {
    for (i, v) in values.iter().enumerate() {
        if v.is_nan() || *v < 0.0 {
            return Err(AnalysisError::InvalidRelevance {
                value: *v,
                rank: i + 1,
            });
        }
    }
    Ok(())
}

/// NDCG and precision curves for one ranked result list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingQuality {
    /// `ndcg[n - 1]` is NDCG at cutoff `n`.
    pub ndcg: Vec<f64>,
    /// `precision[n - 1]` is precision at cutoff `n`.
    pub precision: Vec<f64>,
    /// Cutoffs whose NDCG was undefined and reported as zero.
    pub undefined_ndcg_at: Vec<usize>,
}

impl RankingQuality {
    /// Compute both curves for `n = 1..=relevances.len()`.
    ///
    /// Without `ideal_pool`, the ideal at cutoff `n` is the top of
    /// `relevances[..n]` itself. With a pool (for example every thread in
    /// the dataset), the ideal at cutoff `n` is the `n` best values of the
    /// pool.
    pub fn analyze(
        relevances: &[f64],
        ideal_pool: Option<&[f64]>,
        policy: UndefinedNdcg,
    ) -> Result<Self, AnalysisError> {
        validate_relevances(relevances)?;
        let pool = match ideal_pool {
            Some(pool) => {
                validate_relevances(pool)?;
                Some(ideal_ordering(pool))
            }
            None => None,
        };

        let mut quality = RankingQuality::default();
        for n in 1..=relevances.len() {
            let slice = &relevances[..n];
            let ideal = match &pool {
                Some(pool) => pool[..n.min(pool.len())].to_vec(),
                None => ideal_ordering(slice),
            };
            let value = match ndcg(slice, &ideal, n) {
                Ok(v) => v,
                Err(e) => match policy {
                    UndefinedNdcg::Error => return Err(e),
                    UndefinedNdcg::Zero => {
                        quality.undefined_ndcg_at.push(n);
                        0.0
                    }
                },
            };
            quality.ndcg.push(value);
            quality.precision.push(precision(slice));
        }
        Ok(quality)
    }

    pub fn len(&self) -> usize {
        self.ndcg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ndcg.is_empty()
    }

    /// `(n, ndcg, precision)` rows, one per cutoff.
    pub fn rows(&self) -> impl Iterator<Item = (usize, f64, f64)> + '_ {
        self.ndcg
            .iter()
            .zip(&self.precision)
            .enumerate()
            .map(|(i, (ndcg, precision))| (i + 1, *ndcg, *precision))
    }
}
