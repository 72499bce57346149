use std::collections::{BTreeMap, BTreeSet};

use eia_client::{
    domain::{FuelCategory, ObservationRecord, Period},
    RawOperationalRow,
};
use serde_json::Value;

use crate::pipeline::{Envelope, PipelineError, Transform};

pub mod repair;
pub mod yearly;

pub use repair::{ensure_complete, repair_backward};
pub use yearly::{aggregate_yearly, per_source, year_until};

/// Coerce an upstream `generation` cell.
///
/// Null and blank strings are absent values; anything else must be a finite,
/// non-negative number.
fn coerce_generation(raw: Option<&Value>) -> Result<Option<f64>, String> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| format!("generation '{n}' is not representable"))?,
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("generation '{s}' is not numeric: {e}"))?,
        Some(other) => return Err(format!("generation has unexpected type: {other}")),
    };

    if !value.is_finite() {
        return Err(format!("generation '{value}' is not finite"));
    }
    if value < 0.0 {
        return Err(format!("generation {value} is negative"));
    }
    Ok(Some(value))
}

/// Map one raw upstream row onto the canonical observation schema.
///
/// Descriptive columns (location, sector, descriptions, units) are dropped.
pub fn normalize_row(
    env: Envelope<RawOperationalRow>,
) -> Result<Envelope<ObservationRecord>, PipelineError> {
    let raw = &env.payload;

    let fuel_category: FuelCategory = raw
        .fueltypeid
        .parse()
        .map_err(|e| PipelineError::Integrity(format!("{e}")))?;
    let period: Period = raw
        .period
        .parse()
        .map_err(|e| PipelineError::Integrity(format!("{fuel_category}: {e}")))?;
    let generation = coerce_generation(raw.generation.as_ref())
        .map_err(|e| PipelineError::Integrity(format!("{fuel_category} {period}: {e}")))?;

    Ok(Envelope {
        payload: ObservationRecord {
            period,
            fuel_category,
            generation,
        },
        received_at: env.received_at,
    })
}

#[derive(Clone, Default)]
pub struct Normalization;

#[async_trait::async_trait]
impl Transform<RawOperationalRow, ObservationRecord> for Normalization {
    async fn apply(
        &self,
        input: Envelope<RawOperationalRow>,
    ) -> Result<Envelope<ObservationRecord>, PipelineError> {
        match normalize_row(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("normalization_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}

/// Batch-level schema checks on a full normalized payload.
///
/// Rules:
/// - every enumerated category is present.
/// - (category, period) pairs are unique.
/// - each category's periods form an unbroken monthly sequence.
pub fn check_integrity(records: &[ObservationRecord]) -> Result<(), PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::Integrity("payload contained no rows".to_string()));
    }

    let mut by_category: BTreeMap<FuelCategory, Vec<Period>> = BTreeMap::new();
    for r in records {
        by_category.entry(r.fuel_category).or_default().push(r.period);
    }

    let present: BTreeSet<FuelCategory> = by_category.keys().copied().collect();
    let missing: Vec<&str> = FuelCategory::ALL_CATEGORIES
        .iter()
        .filter(|c| !present.contains(*c))
        .map(FuelCategory::code)
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Integrity(format!(
            "payload is missing categories: {}",
            missing.join(", ")
        )));
    }

    for (category, periods) in by_category.iter_mut() {
        periods.sort();
        for pair in periods.windows(2) {
            match pair[0].months_until(&pair[1]) {
                0 => {
                    return Err(PipelineError::Integrity(format!(
                        "{category}: duplicate period {}",
                        pair[0]
                    )))
                }
                1 => {}
                gap => {
                    return Err(PipelineError::Integrity(format!(
                        "{category}: {} months missing between {} and {}",
                        gap - 1,
                        pair[0],
                        pair[1]
                    )))
                }
            }
        }
    }

    Ok(())
}
