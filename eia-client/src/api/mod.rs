pub mod operational_data;

pub use operational_data::{EiaClient, OperationalDataQuery, RawOperationalRow};

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected payload shape: {0}")]
    Payload(String),
    #[error("invalid request: {0}")]
    Request(String),
}
