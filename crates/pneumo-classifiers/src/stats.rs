use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{Result, TrainingError};

/// Result of a dependent-samples t-test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairedTTest {
    /// t-statistic of the mean difference `a - b`
    pub statistic: f64,
    /// Two-sided p-value
    pub pvalue: f64,
    /// Degrees of freedom (`n - 1`)
    pub df: f64,
}

/// Paired two-sided t-test of `a` against `b`.
///
/// The differences `d_i = a_i - b_i` are tested against a zero mean:
///
/// t = mean(d) / (sd(d) / sqrt(n))
///
/// with `n - 1` degrees of freedom. When every difference is zero the series
/// are identical and the test reports `t = 0`, `p = 1`; constant non-zero
/// differences give an infinite statistic and `p = 0`.
///
/// # Arguments
///
/// * `a` - Per-trial values for the first model.
/// * `b` - Per-trial values for the second model, aligned with `a`.
///
/// # Returns
///
/// A `PairedTTest`, or `InsufficientTrials` for fewer than two pairs and
/// `DataShapeMismatch` for series of different length.
pub fn paired_ttest(a: &[f64], b: &[f64]) -> Result<PairedTTest> {
    if a.len() != b.len() {
        return Err(TrainingError::shape(format!(
            "paired series must have equal lengths, got {} and {}",
            a.len(),
            b.len()
        )));
    }
    let n = a.len();
    if n < 2 {
        return Err(TrainingError::InsufficientTrials { available: n });
    }

    let diffs: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| x - y).collect();
    let nf = n as f64;
    let mean = diffs.iter().sum::<f64>() / nf;
    let var = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (nf - 1.0);
    let sd = var.sqrt();
    let df = nf - 1.0;

    if sd == 0.0 {
        if mean == 0.0 {
            return Ok(PairedTTest {
                statistic: 0.0,
                pvalue: 1.0,
                df,
            });
        }
        return Ok(PairedTTest {
            statistic: if mean > 0.0 { f64::INFINITY } else { f64::NEG_INFINITY },
            pvalue: 0.0,
            df,
        });
    }

    let statistic = mean / (sd / nf.sqrt());
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| TrainingError::model(crate::error::Stage::Evaluation, e.to_string()))?;
    let pvalue = (2.0 * (1.0 - dist.cdf(statistic.abs()))).clamp(0.0, 1.0);

    Ok(PairedTTest {
        statistic,
        pvalue,
        df,
    })
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
