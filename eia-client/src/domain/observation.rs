use serde::{Deserialize, Serialize};

use super::{FuelCategory, Period};

/// One monthly generation reading for a fuel category.
///
/// `generation` is thousand MWh; `None` until missing values are repaired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub period: Period,
    pub fuel_category: FuelCategory,
    pub generation: Option<f64>,
}

impl ObservationRecord {
    pub fn year(&self) -> i32 {
        self.period.year()
    }

    pub fn month(&self) -> u8 {
        self.period.month()
    }
}
