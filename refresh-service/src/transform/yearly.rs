use std::collections::BTreeMap;

use eia_client::domain::{FuelCategory, ObservationRecord, Period, YearlyAggregate};

/// Last year eligible for a rollup given the latest observed period.
///
/// A year counts only once December has been observed.
pub fn year_until(latest: Period) -> i32 {
    if latest.month() == 12 {
        latest.year()
    } else {
        latest.year() - 1
    }
}

/// Annual generation sums per (year, category), complete years only.
///
/// Rows are ordered by year, then category. Absent values contribute nothing;
/// callers are expected to have repaired the series first.
pub fn aggregate_yearly(records: &[ObservationRecord]) -> Vec<YearlyAggregate> {
    let Some(latest) = records.iter().map(|r| r.period).max() else {
        return Vec::new();
    };
    let cutoff = year_until(latest);

    let mut sums: BTreeMap<(i32, FuelCategory), f64> = BTreeMap::new();
    for r in records.iter().filter(|r| r.year() <= cutoff) {
        *sums.entry((r.year(), r.fuel_category)).or_insert(0.0) += r.generation.unwrap_or(0.0);
    }

    sums.into_iter()
        .map(|((year, fuel_category), generation_sum)| YearlyAggregate {
            year,
            fuel_category,
            generation_sum,
        })
        .collect()
}

/// Rollups for individual sources, without the `ALL` total.
pub fn per_source(aggregates: &[YearlyAggregate]) -> Vec<YearlyAggregate> {
    aggregates
        .iter()
        .filter(|a| !a.fuel_category.is_aggregate())
        .cloned()
        .collect()
}
