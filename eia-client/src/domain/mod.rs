pub mod forecast;
pub mod fuel_category;
pub mod observation;
pub mod period;
pub mod yearly;

pub use forecast::ForecastRecord;
pub use fuel_category::{FuelCategory, UnknownFuelCategory};
pub use observation::ObservationRecord;
pub use period::{Period, PeriodParseError};
pub use yearly::YearlyAggregate;
