use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use crate::config::DegenerateTestPolicy;
use crate::data_handling::clinical_response::ResponseLabel;
use crate::error::{PipelineError, PipelineResult};

/// Holds the outcome of a two-sample t-test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TTestResult {
    pub statistic: f64,
    pub p_value: f64,
}

impl TTestResult {
    pub fn undefined() -> Self {
        Self { statistic: f64::NAN, p_value: f64::NAN }
    }

    pub fn is_defined(&self) -> bool {
        !self.statistic.is_nan()
    }
}

/// Splits predictions by the patient's binary label: (non-responders, responders).
/// Predictions whose label is missing or unmapped land in neither group.
pub fn group_by_label(
    actual: &[ResponseLabel],
    predicted: &[f64],
) -> PipelineResult<(Vec<f64>, Vec<f64>)> {
    if actual.len() != predicted.len() {
        return Err(PipelineError::shape_mismatch(
            "labels vs predictions",
            actual.len(),
            predicted.len(),
        ));
    }

    let mut group0 = Vec::new();
    let mut group1 = Vec::new();
    for (label, &value) in actual.iter().zip(predicted) {
        match label.as_binary() {
            Some(0) => group0.push(value),
            Some(1) => group1.push(value),
            _ => {}
        }
    }
    Ok((group0, group1))
}

fn mean_and_ss(sample: &[f64]) -> (f64, f64) {
    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    let ss = sample.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    (mean, ss)
}

/// Student's two-sample t-test with pooled variance, two-sided.
///
/// Returns NaN for both fields when either sample has fewer than two values,
/// or when both samples are constant at the same mean.
pub fn student_t_test(a: &[f64], b: &[f64]) -> TTestResult {
    if a.len() < 2 || b.len() < 2 {
        return TTestResult::undefined();
    }
    let (mean_a, ss_a) = mean_and_ss(a);
    let (mean_b, ss_b) = mean_and_ss(b);
    let dof = (a.len() + b.len() - 2) as f64;
    let pooled = (ss_a + ss_b) / dof;
    let se = (pooled * (1.0 / a.len() as f64 + 1.0 / b.len() as f64)).sqrt();
    let diff = mean_a - mean_b;

    if se == 0.0 {
        return if diff == 0.0 {
            TTestResult::undefined()
        } else {
            TTestResult { statistic: diff.signum() * f64::INFINITY, p_value: 0.0 }
        };
    }
    let statistic = diff / se;
    if !statistic.is_finite() {
        return TTestResult::undefined();
    }

    let p_value = match StudentsT::new(0.0, 1.0, dof) {
        Ok(dist) => (2.0 * dist.sf(statistic.abs())).min(1.0),
        Err(_) => f64::NAN,
    };
    TTestResult { statistic, p_value }
}

/// Groups one drug's predictions by clinical outcome and t-tests
/// non-responders against responders.
pub fn evaluate(
    drug: &str,
    actual: &[ResponseLabel],
    predicted: &[f64],
    policy: DegenerateTestPolicy,
) -> PipelineResult<TTestResult> {
    let (group0, group1) = group_by_label(actual, predicted)?;
    debug!(
        "{}: {} non-responders, {} responders",
        drug,
        group0.len(),
        group1.len()
    );

    let result = student_t_test(&group0, &group1);
    if !result.is_defined() && policy == DegenerateTestPolicy::Error {
        return Err(PipelineError::Evaluation {
            drug: drug.to_string(),
            reason: format!(
                "groups of size {} and {} (each needs two values with some spread)",
                group0.len(),
                group1.len()
            ),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResponseLabel::*;

    #[test]
    fn groups_follow_labels() {
        let actual = [NonResponder, NonResponder, Responder, Responder];
        let (g0, g1) = group_by_label(&actual, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(g0, vec![1.0, 2.0]);
        assert_eq!(g1, vec![3.0, 4.0]);
    }

    #[test]
    fn every_prediction_lands_in_at_most_one_group() {
        let actual = [
            Responder,
            Missing,
            NonResponder,
            Unmapped("Not Evaluable".into()),
            Responder,
            NonResponder,
        ];
        let predicted = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let (g0, g1) = group_by_label(&actual, &predicted).unwrap();
        assert_eq!(g0, vec![0.3, 0.6]);
        assert_eq!(g1, vec![0.1, 0.5]);
        assert_eq!(g0.len() + g1.len(), 4);
    }

    #[test]
    fn length_mismatch_fails_fast() {
        let err = group_by_label(&[Responder, NonResponder], &[1.0]).unwrap_err();
        assert!(matches!(err, PipelineError::InputShapeMismatch { .. }));
    }

    #[test]
    fn matches_reference_values() {
        // scipy.stats.ttest_ind([1, 2, 3, 4, 5], [2, 4, 6, 8, 10])
        let r = student_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 6.0, 8.0, 10.0]);
        assert!((r.statistic + 1.897_366_596_101_027_5).abs() < 1e-9);
        assert!((r.p_value - 0.094_349_772_842_437_56).abs() < 1e-6);
    }

    #[test]
    fn identical_groups_give_p_of_one() {
        let r = student_t_test(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert_eq!(r.statistic, 0.0);
        assert!((r.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_groups() {
        assert!(!student_t_test(&[], &[1.0, 2.0]).is_defined());
        assert!(!student_t_test(&[1.0], &[1.0, 2.0]).is_defined());
        assert!(!student_t_test(&[2.0, 2.0], &[2.0, 2.0]).is_defined());

        let r = student_t_test(&[1.0, 1.0], &[3.0, 3.0]);
        assert_eq!(r.statistic, f64::NEG_INFINITY);
        assert_eq!(r.p_value, 0.0);
    }

    #[test]
    fn degenerate_policy_decides_nan_or_error() {
        let actual = [Responder, Responder, NonResponder];
        let predicted = [1.0, 2.0, 3.0];

        let r = evaluate("d", &actual, &predicted, DegenerateTestPolicy::Nan).unwrap();
        assert!(r.statistic.is_nan() && r.p_value.is_nan());

        let err = evaluate("d", &actual, &predicted, DegenerateTestPolicy::Error).unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation { .. }));
    }
}
