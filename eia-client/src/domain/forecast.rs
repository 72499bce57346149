use serde::{Deserialize, Serialize};

use super::{FuelCategory, Period};

/// Point forecast for one future month of a fuel category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub period: Period,
    pub fuel_category: FuelCategory,
    pub generation: f64,
}
