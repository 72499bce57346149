use serde::{Deserialize, Serialize};

use super::FuelCategory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyAggregate {
    pub year: i32,
    pub fuel_category: FuelCategory,
    pub generation_sum: f64,
}
