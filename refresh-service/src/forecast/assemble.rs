use eia_client::domain::{FuelCategory, ForecastRecord};

use super::CategoryOutcome;
use crate::pipeline::PipelineError;

/// What a category's model-fit failure means for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Omit failed categories; fail only when none succeed.
    #[default]
    Degrade,
    /// Any failed category fails the run.
    Strict,
}

impl FailurePolicy {
    pub fn from_flag(fail_on_model_error: bool) -> Self {
        if fail_on_model_error {
            Self::Strict
        } else {
            Self::Degrade
        }
    }
}

#[derive(Debug, Default)]
pub struct AssembledForecast {
    /// Ordered by category, then period.
    pub records: Vec<ForecastRecord>,
    pub failed: Vec<(FuelCategory, String)>,
}

impl AssembledForecast {
    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Concatenate per-category forecasts into one series.
///
/// No reconciliation across categories is attempted.
pub fn assemble(
    mut outcomes: Vec<CategoryOutcome>,
    policy: FailurePolicy,
) -> Result<AssembledForecast, PipelineError> {
    outcomes.sort_by_key(|o| o.category);

    let total = outcomes.len();
    let mut assembled = AssembledForecast::default();
    let mut first_error = None;

    for outcome in outcomes {
        match outcome.result {
            Ok(mut records) => {
                records.sort_by_key(|r| r.period);
                assembled.records.extend(records);
            }
            Err(e) => {
                if policy == FailurePolicy::Strict {
                    return Err(e);
                }
                assembled.failed.push((outcome.category, e.to_string()));
                first_error.get_or_insert(e);
            }
        }
    }

    if total > 0 && assembled.failed.len() == total {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eia_client::domain::Period;

    fn ok(category: FuelCategory) -> CategoryOutcome {
        let start = Period::new(2025, 7).unwrap();
        CategoryOutcome {
            category,
            result: Ok((0..12)
                .rev()
                .map(|h| ForecastRecord {
                    period: start.plus_months(h),
                    fuel_category: category,
                    generation: 1.0 + h as f64,
                })
                .collect()),
        }
    }

    fn failed(category: FuelCategory) -> CategoryOutcome {
        CategoryOutcome {
            category,
            result: Err(PipelineError::ModelFit {
                category,
                reason: "optimizer did not converge within 200 iterations".to_string(),
            }),
        }
    }

    #[test]
    fn concatenates_in_category_then_period_order() {
        let out = assemble(vec![ok(FuelCategory::Wind), ok(FuelCategory::Coal)], FailurePolicy::Degrade).unwrap();

        assert_eq!(out.records.len(), 24);
        assert!(out.records[..12].iter().all(|r| r.fuel_category == FuelCategory::Coal));
        assert!(out.records[12..].iter().all(|r| r.fuel_category == FuelCategory::Wind));
        assert_eq!(out.records[0].period, Period::new(2025, 7).unwrap());
        assert!(!out.is_degraded());
    }

    #[test]
    fn degrade_policy_omits_failed_category() {
        let out = assemble(vec![ok(FuelCategory::Coal), failed(FuelCategory::Solar)], FailurePolicy::Degrade).unwrap();

        assert_eq!(out.records.len(), 12);
        assert!(out.is_degraded());
        assert_eq!(out.failed[0].0, FuelCategory::Solar);
    }

    #[test]
    fn strict_policy_fails_on_any_category() {
        let res = assemble(vec![ok(FuelCategory::Coal), failed(FuelCategory::Solar)], FailurePolicy::Strict);
        assert!(matches!(res, Err(PipelineError::ModelFit { category: FuelCategory::Solar, .. })));
    }

    #[test]
    fn all_failed_fails_even_when_degrading() {
        let res = assemble(vec![failed(FuelCategory::Nuclear), failed(FuelCategory::Wind)], FailurePolicy::Degrade);
        assert!(matches!(res, Err(PipelineError::ModelFit { category: FuelCategory::Nuclear, .. })));
    }
}
