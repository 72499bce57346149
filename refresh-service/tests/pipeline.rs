use std::{path::Path, pin::Pin};

use eia_client::{
    api::operational_data::parse_response,
    domain::{ForecastRecord, FuelCategory, Period, YearlyAggregate},
    RawOperationalRow,
};
use futures::Stream;
use refresh_service::{
    forecast::{FailurePolicy, ForecastEngine},
    pipeline::{Envelope, OutputPaths, PipelineError, RefreshPipeline, Source},
    sinks::{read_rows, HistoricalRow},
    sources::RawRowsFileSource,
};
use serde_json::{json, Value};

const SEASON: [f64; 12] = [40.0, 35.5, 33.0, 30.25, 32.0, 38.5, 44.0, 45.75, 40.0, 34.5, 31.0, 36.0];
const FIRST_YEAR: i32 = 2015;
const LAST_YEAR: i32 = 2022;
const LAST_MONTH: u8 = 6;

fn months() -> Vec<(i32, u8)> {
    let mut out = Vec::new();
    for year in FIRST_YEAR..=LAST_YEAR {
        for month in 1..=12u8 {
            if year == LAST_YEAR && month > LAST_MONTH {
                break;
            }
            out.push((year, month));
        }
    }
    out
}

/// Seasonal series with a linear trend, in quarter-unit steps so every
/// difference is exact.
fn level(category: FuelCategory, t: usize, month: u8) -> f64 {
    let base = 1000.0 * (FuelCategory::ALL_CATEGORIES.iter().position(|c| *c == category).unwrap_or(0) + 1) as f64;
    base + 0.25 * t as f64 + SEASON[(month - 1) as usize]
}

/// Upstream-shaped rows, newest first, with generation alternating between
/// numbers and strings. `gaps` nulls out the listed (category, index) cells.
fn response_body(gaps: &[(FuelCategory, usize)]) -> String {
    let months = months();
    let mut data = Vec::new();
    for (t, (year, month)) in months.iter().enumerate().rev() {
        for category in FuelCategory::ALL_CATEGORIES {
            let value = level(category, t, *month);
            let generation = if gaps.contains(&(category, t)) {
                Value::Null
            } else if t % 2 == 0 {
                json!(value)
            } else {
                json!(value.to_string())
            };
            data.push(json!({
                "period": format!("{year:04}-{month:02}"),
                "location": "US",
                "stateDescription": "U.S. Total",
                "sectorid": "99",
                "sectorDescription": "All Sectors",
                "fueltypeid": category.code(),
                "fuelTypeDescription": category.label(),
                "generation": generation,
                "generation-units": "thousand megawatthours",
            }));
        }
    }
    json!({ "response": { "total": data.len(), "data": data } }).to_string()
}

/// Rows held in memory, replayed on every call.
struct VecSource(Vec<RawOperationalRow>);

#[async_trait::async_trait]
impl Source<RawOperationalRow> for VecSource {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<RawOperationalRow>, PipelineError>> + Send>> {
        let rows: Vec<_> = self.0.iter().cloned().map(|r| Ok(Envelope::new(r))).collect();
        Box::pin(futures::stream::iter(rows))
    }
}

fn output_paths(dir: &Path) -> OutputPaths {
    OutputPaths {
        historical: dir.join("electricity.csv"),
        yearly: dir.join("yearly_data.csv"),
        forecast: dir.join("monthly_forecast.csv"),
    }
}

fn in_memory(dir: &Path, body: &str) -> RefreshPipeline<VecSource> {
    RefreshPipeline {
        source: VecSource(parse_response(body).unwrap()),
        engine: ForecastEngine::default(),
        policy: FailurePolicy::Degrade,
        paths: output_paths(dir),
    }
}

fn replayed(dir: &Path, body: &str) -> RefreshPipeline<RawRowsFileSource> {
    let saved = dir.join("response.json");
    std::fs::write(&saved, body).unwrap();
    RefreshPipeline {
        source: RawRowsFileSource::new(saved),
        engine: ForecastEngine::default(),
        policy: FailurePolicy::Degrade,
        paths: output_paths(dir),
    }
}

#[tokio::test]
async fn full_refresh_publishes_all_three_datasets() {
    let dir = tempfile::tempdir().unwrap();
    let months = months().len();
    let body = response_body(&[(FuelCategory::All, 20), (FuelCategory::All, 21)]);

    let report = in_memory(dir.path(), &body).run().await.unwrap();
    assert!(!report.is_degraded());
    assert_eq!(report.etl.repaired_values, 2);

    let historical: Vec<HistoricalRow> = read_rows(&dir.path().join("electricity.csv")).unwrap();
    assert_eq!(historical.len(), months * FuelCategory::ALL_CATEGORIES.len());
    assert!(historical.iter().all(|r| r.year == r.period.year() && r.month == r.period.month()));

    // Both gaps take the value observed at index 22.
    let repaired: Vec<f64> = historical
        .iter()
        .filter(|r| r.fuel_category == FuelCategory::All)
        .map(|r| r.generation)
        .collect();
    assert_eq!(repaired[20], repaired[22]);
    assert_eq!(repaired[21], repaired[22]);

    let yearly: Vec<YearlyAggregate> = read_rows(&dir.path().join("yearly_data.csv")).unwrap();
    let years: Vec<i32> = yearly.iter().map(|r| r.year).collect();
    assert_eq!(years.first(), Some(&FIRST_YEAR));
    assert_eq!(years.last(), Some(&(LAST_YEAR - 1)));
    assert_eq!(yearly.len(), (LAST_YEAR - FIRST_YEAR) as usize * FuelCategory::ALL_CATEGORIES.len());

    let forecast: Vec<ForecastRecord> = read_rows(&dir.path().join("monthly_forecast.csv")).unwrap();
    assert_eq!(report.forecast.forecast.rows, forecast.len());
    assert!(forecast.iter().all(|r| r.fuel_category != FuelCategory::All));
    for category in FuelCategory::ALL_CATEGORIES.into_iter().filter(|c| !c.is_aggregate()) {
        let periods: Vec<Period> = forecast
            .iter()
            .filter(|r| r.fuel_category == category)
            .map(|r| r.period)
            .collect();
        assert_eq!(periods.len(), 12, "{category}");
        assert_eq!(periods[0], Period::new(LAST_YEAR, LAST_MONTH + 1).unwrap());
        assert!(periods.windows(2).all(|p| p[0].months_until(&p[1]) == 1));
    }
}

#[tokio::test]
async fn rerun_on_same_input_is_byte_identical() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let body = response_body(&[(FuelCategory::Solar, 40)]);

    let a = replayed(first.path(), &body).run().await.unwrap();
    let b = replayed(second.path(), &body).run().await.unwrap();

    assert_eq!(a.etl.historical.digest, b.etl.historical.digest);
    assert_eq!(a.etl.yearly.digest, b.etl.yearly.digest);
    assert_eq!(a.forecast.forecast.digest, b.forecast.forecast.digest);

    for name in ["electricity.csv", "yearly_data.csv", "monthly_forecast.csv"] {
        let left = std::fs::read(first.path().join(name)).unwrap();
        let right = std::fs::read(second.path().join(name)).unwrap();
        assert_eq!(left, right, "{name}");
    }
}

#[tokio::test]
async fn trailing_gap_aborts_before_anything_is_published() {
    let dir = tempfile::tempdir().unwrap();
    let last = months().len() - 1;
    let body = response_body(&[(FuelCategory::Wind, last)]);

    let err = in_memory(dir.path(), &body).run().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DataQuality {
            category: FuelCategory::Wind,
            ..
        }
    ));
    assert!(!dir.path().join("electricity.csv").exists());
    assert!(!dir.path().join("yearly_data.csv").exists());
    assert!(!dir.path().join("monthly_forecast.csv").exists());
}

#[tokio::test]
async fn missing_category_is_an_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let body = response_body(&[]);
    let mut doc: Value = serde_json::from_str(&body).unwrap();
    doc["response"]["data"]
        .as_array_mut()
        .unwrap()
        .retain(|row| row["fueltypeid"] != "NUC");

    let err = replayed(dir.path(), &doc.to_string()).run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Integrity(_)));
    assert!(!dir.path().join("electricity.csv").exists());
}
