use std::collections::BTreeMap;

use eia_client::domain::{FuelCategory, ObservationRecord};

use crate::pipeline::PipelineError;

/// Fill absent generation values from the next later reading of the same
/// category.
///
/// Output is grouped by category (enumeration order) with periods ascending.
/// A trailing gap has no later reading and stays absent; see [`ensure_complete`].
/// Returns the repaired records and the number of values filled.
pub fn repair_backward(records: Vec<ObservationRecord>) -> (Vec<ObservationRecord>, usize) {
    let mut by_category: BTreeMap<FuelCategory, Vec<ObservationRecord>> = BTreeMap::new();
    for r in records {
        by_category.entry(r.fuel_category).or_default().push(r);
    }

    let mut filled = 0;
    let mut out = Vec::new();
    for (_, mut series) in by_category {
        series.sort_by_key(|r| r.period);

        let mut next_known: Option<f64> = None;
        for r in series.iter_mut().rev() {
            match r.generation {
                Some(v) => next_known = Some(v),
                None => {
                    if let Some(v) = next_known {
                        r.generation = Some(v);
                        filled += 1;
                    }
                }
            }
        }
        out.extend(series);
    }

    (out, filled)
}

/// Reject any value still absent after repair.
pub fn ensure_complete(records: &[ObservationRecord]) -> Result<(), PipelineError> {
    let mut unresolved: BTreeMap<FuelCategory, Vec<String>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.generation.is_none()) {
        unresolved.entry(r.fuel_category).or_default().push(r.period.to_string());
    }

    match unresolved.into_iter().next() {
        None => Ok(()),
        Some((category, periods)) => Err(PipelineError::DataQuality {
            category,
            reason: format!(
                "generation still missing after repair for {} (no later reading to backfill from)",
                periods.join(", ")
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::tests::obs;

    fn values(records: &[ObservationRecord], category: FuelCategory) -> Vec<Option<f64>> {
        records
            .iter()
            .filter(|r| r.fuel_category == category)
            .map(|r| r.generation)
            .collect()
    }

    #[test]
    fn fills_from_next_later_value_only() {
        let c = FuelCategory::Coal;
        let records = vec![
            obs(c, 2024, 4, Some(7.0)),
            obs(c, 2024, 2, Some(5.0)),
            obs(c, 2024, 3, None),
            obs(c, 2024, 1, None),
        ];

        let (repaired, filled) = repair_backward(records);
        assert_eq!(values(&repaired, c), vec![Some(5.0), Some(5.0), Some(7.0), Some(7.0)]);
        assert_eq!(filled, 2);
    }

    #[test]
    fn categories_are_repaired_independently() {
        let records = vec![
            obs(FuelCategory::Solar, 2024, 1, None),
            obs(FuelCategory::Wind, 2024, 2, Some(9.0)),
            obs(FuelCategory::Solar, 2024, 2, Some(2.0)),
            obs(FuelCategory::Wind, 2024, 1, None),
        ];

        let (repaired, _) = repair_backward(records);
        assert_eq!(values(&repaired, FuelCategory::Solar), vec![Some(2.0), Some(2.0)]);
        assert_eq!(values(&repaired, FuelCategory::Wind), vec![Some(9.0), Some(9.0)]);
    }

    #[test]
    fn repair_is_idempotent() {
        let c = FuelCategory::Nuclear;
        let records = vec![
            obs(c, 2024, 1, None),
            obs(c, 2024, 2, Some(5.0)),
            obs(c, 2024, 3, None),
            obs(c, 2024, 4, Some(7.0)),
        ];

        let (once, _) = repair_backward(records);
        let (twice, filled) = repair_backward(once.clone());
        assert_eq!(once, twice);
        assert_eq!(filled, 0);
    }

    #[test]
    fn trailing_gap_is_left_and_reported() {
        let c = FuelCategory::ConventionalHydro;
        let records = vec![obs(c, 2024, 1, Some(3.0)), obs(c, 2024, 2, None)];

        let (repaired, filled) = repair_backward(records);
        assert_eq!(filled, 0);
        assert_eq!(values(&repaired, c), vec![Some(3.0), None]);

        match ensure_complete(&repaired) {
            Err(PipelineError::DataQuality { category, reason }) => {
                assert_eq!(category, c);
                assert!(reason.contains("2024-02-01"));
            }
            other => panic!("expected data quality error, got {other:?}"),
        }
    }
}
