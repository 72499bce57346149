use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// EIA `fueltypeid` codes tracked by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FuelCategory {
    /// Synthetic total across all sources.
    All,
    Coal,
    ConventionalHydro,
    NaturalGas,
    Nuclear,
    Solar,
    Wind,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown fuel category code '{0}'")]
pub struct UnknownFuelCategory(pub String);

impl FuelCategory {
    pub const ALL_CATEGORIES: [FuelCategory; 7] = [
        FuelCategory::All,
        FuelCategory::Coal,
        FuelCategory::ConventionalHydro,
        FuelCategory::NaturalGas,
        FuelCategory::Nuclear,
        FuelCategory::Solar,
        FuelCategory::Wind,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            FuelCategory::All => "ALL",
            FuelCategory::Coal => "COL",
            FuelCategory::ConventionalHydro => "HYC",
            FuelCategory::NaturalGas => "NG",
            FuelCategory::Nuclear => "NUC",
            FuelCategory::Solar => "SUN",
            FuelCategory::Wind => "WND",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FuelCategory::All => "All Fuels",
            FuelCategory::Coal => "Coal",
            FuelCategory::ConventionalHydro => "Conventional Hydroelectric",
            FuelCategory::NaturalGas => "Natural Gas",
            FuelCategory::Nuclear => "Nuclear",
            FuelCategory::Solar => "Solar",
            FuelCategory::Wind => "Wind",
        }
    }

    /// True for the `ALL` total, which is never forecast.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, FuelCategory::All)
    }
}

impl fmt::Display for FuelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FuelCategory {
    type Err = UnknownFuelCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        FuelCategory::ALL_CATEGORIES
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| UnknownFuelCategory(code.to_string()))
    }
}

impl Serialize for FuelCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for FuelCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_from_str() {
        for c in FuelCategory::ALL_CATEGORIES {
            assert_eq!(c.code().parse::<FuelCategory>().unwrap(), c);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = "PET".parse::<FuelCategory>().unwrap_err();
        assert_eq!(err, UnknownFuelCategory("PET".to_string()));
    }

    #[test]
    fn only_all_is_aggregate() {
        let aggregates: Vec<_> = FuelCategory::ALL_CATEGORIES
            .into_iter()
            .filter(FuelCategory::is_aggregate)
            .collect();
        assert_eq!(aggregates, vec![FuelCategory::All]);
    }
}
