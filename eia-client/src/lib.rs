pub mod api;
pub mod domain;

pub use api::{ClientError, EiaClient, OperationalDataQuery, RawOperationalRow};
