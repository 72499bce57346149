use std::time::Instant;

use eia_client::domain::{FuelCategory, ForecastRecord, ObservationRecord, Period};

use crate::pipeline::PipelineError;

pub mod assemble;
pub mod optimize;
pub mod polynomial;
pub mod sarimax;

pub use assemble::{assemble, AssembledForecast, FailurePolicy};
pub use sarimax::{FitError, FittedSarimax, SarimaxOrder, SarimaxSpec};

/// Result of forecasting a single category.
#[derive(Debug)]
pub struct CategoryOutcome {
    pub category: FuelCategory,
    pub result: Result<Vec<ForecastRecord>, PipelineError>,
}

#[derive(Debug, Clone, Copy)]
pub struct ForecastEngine {
    spec: SarimaxSpec,
    horizon: u32,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(SarimaxSpec::default(), 12)
    }
}

/// `[year, month]` regressors for a period.
fn calendar_row(period: &Period) -> Vec<f64> {
    vec![period.year() as f64, period.month() as f64]
}

impl ForecastEngine {
    pub fn new(spec: SarimaxSpec, horizon: u32) -> Self {
        Self { spec, horizon }
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    /// Categories that get a forecast: those present in `records`, minus `ALL`.
    pub fn forecast_categories(records: &[ObservationRecord]) -> Vec<FuelCategory> {
        FuelCategory::ALL_CATEGORIES
            .into_iter()
            .filter(|c| !c.is_aggregate())
            .filter(|c| records.iter().any(|r| r.fuel_category == *c))
            .collect()
    }

    /// Fit and forecast one category from its monthly history.
    ///
    /// The series must be gap-free and fully repaired; nothing is interpolated
    /// here.
    pub fn forecast_category(
        &self,
        category: FuelCategory,
        records: &[ObservationRecord],
    ) -> Result<Vec<ForecastRecord>, PipelineError> {
        let fit_error = |reason: String| PipelineError::ModelFit { category, reason };

        let mut series: Vec<&ObservationRecord> =
            records.iter().filter(|r| r.fuel_category == category).collect();
        series.sort_by_key(|r| r.period);

        let Some(last) = series.last().map(|r| r.period) else {
            return Err(fit_error("no history".to_string()));
        };
        for pair in series.windows(2) {
            if pair[0].period.months_until(&pair[1].period) != 1 {
                return Err(fit_error(format!(
                    "series is not monthly between {} and {}",
                    pair[0].period, pair[1].period
                )));
            }
        }

        let y = series
            .iter()
            .map(|r| {
                r.generation
                    .ok_or_else(|| fit_error(format!("unrepaired gap at {}", r.period)))
            })
            .collect::<Result<Vec<f64>, _>>()?;
        let exog: Vec<Vec<f64>> = series.iter().map(|r| calendar_row(&r.period)).collect();

        let started = Instant::now();
        let fitted = FittedSarimax::fit(self.spec, &y, &exog).map_err(|e| fit_error(e.to_string()))?;
        metrics::histogram!("forecast_fit_seconds").record(started.elapsed().as_secs_f64());

        let future: Vec<Period> = (1..=self.horizon).map(|h| last.plus_months(h)).collect();
        let future_exog: Vec<Vec<f64>> = future.iter().map(calendar_row).collect();
        let predicted = fitted.forecast(&future_exog).map_err(|e| fit_error(e.to_string()))?;

        tracing::info!(
            category = %category,
            observations = y.len(),
            iterations = fitted.iterations(),
            sigma2 = fitted.sigma2(),
            "category model fitted"
        );

        Ok(future
            .into_iter()
            .zip(predicted)
            .map(|(period, generation)| ForecastRecord {
                period,
                fuel_category: category,
                generation,
            })
            .collect())
    }

    /// Fan out one blocking fit per category and join the results.
    ///
    /// Each task owns its category's slice; a failure is captured in that
    /// category's outcome and never cancels the others.
    pub async fn forecast_all(&self, records: &[ObservationRecord]) -> Vec<CategoryOutcome> {
        let mut joins = Vec::new();
        for category in Self::forecast_categories(records) {
            let slice: Vec<ObservationRecord> = records
                .iter()
                .filter(|r| r.fuel_category == category)
                .cloned()
                .collect();
            let engine = *self;
            joins.push((
                category,
                tokio::task::spawn_blocking(move || engine.forecast_category(category, &slice)),
            ));
        }

        let mut outcomes = Vec::with_capacity(joins.len());
        for (category, join) in joins {
            let result = match join.await {
                Ok(result) => result,
                Err(e) => Err(PipelineError::ModelFit {
                    category,
                    reason: format!("fit task failed: {e}"),
                }),
            };
            if let Err(e) = &result {
                metrics::counter!("forecast_fit_failures_total").increment(1);
                tracing::warn!(category = %category, error = %e, "category forecast failed");
            }
            outcomes.push(CategoryOutcome { category, result });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::tests::obs;

    const SEASON: [f64; 12] = [40.0, 35.5, 33.0, 30.25, 32.0, 38.5, 44.0, 45.75, 40.0, 34.5, 31.0, 36.0];

    fn history(category: FuelCategory, years: i32, last_month: u8) -> Vec<ObservationRecord> {
        let mut out = Vec::new();
        let mut t = 0;
        for year in 2015..2015 + years {
            for month in 1..=12 {
                if year == 2015 + years - 1 && month > last_month {
                    break;
                }
                let value = 500.0 + 0.25 * t as f64 + SEASON[(month - 1) as usize];
                out.push(obs(category, year, month, Some(value)));
                t += 1;
            }
        }
        out
    }

    #[test]
    fn forecast_covers_next_twelve_months() {
        let records = history(FuelCategory::Nuclear, 8, 6);
        let engine = ForecastEngine::default();

        let forecast = engine.forecast_category(FuelCategory::Nuclear, &records).unwrap();
        assert_eq!(forecast.len(), 12);
        assert_eq!(forecast[0].period, Period::new(2022, 7).unwrap());
        assert_eq!(forecast[11].period, Period::new(2023, 6).unwrap());
        assert!(forecast.iter().all(|f| f.fuel_category == FuelCategory::Nuclear));
        for pair in forecast.windows(2) {
            assert_eq!(pair[0].period.months_until(&pair[1].period), 1);
        }
    }

    #[test]
    fn short_history_is_a_model_fit_error() {
        let records = history(FuelCategory::Solar, 1, 11);
        let err = ForecastEngine::default()
            .forecast_category(FuelCategory::Solar, &records)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ModelFit { category: FuelCategory::Solar, .. }));
    }

    #[test]
    fn unrepaired_gap_fails_instead_of_interpolating() {
        let mut records = history(FuelCategory::Wind, 6, 12);
        records[30].generation = None;

        let err = ForecastEngine::default()
            .forecast_category(FuelCategory::Wind, &records)
            .unwrap_err();
        assert!(err.to_string().contains("unrepaired gap"));
    }

    #[test]
    fn all_total_is_not_forecast() {
        let mut records = history(FuelCategory::All, 6, 12);
        records.extend(history(FuelCategory::Coal, 6, 12));
        assert_eq!(ForecastEngine::forecast_categories(&records), vec![FuelCategory::Coal]);
    }

    #[tokio::test]
    async fn one_failing_category_does_not_stop_the_others() {
        let mut records = history(FuelCategory::Coal, 7, 12);
        records.extend(history(FuelCategory::Solar, 2, 3));
        records.extend(history(FuelCategory::NaturalGas, 7, 12));

        let outcomes = ForecastEngine::default().forecast_all(&records).await;
        let categories: Vec<_> = outcomes.iter().map(|o| o.category).collect();
        assert_eq!(
            categories,
            vec![FuelCategory::Coal, FuelCategory::NaturalGas, FuelCategory::Solar]
        );
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_ok());
        assert!(matches!(outcomes[2].result, Err(PipelineError::ModelFit { .. })));
    }
}
