pub mod eia_api;
pub mod historical_csv_file;
pub mod raw_rows_file;

pub use eia_api::EiaApiSource;
pub use historical_csv_file::HistoricalCsvFileSource;
pub use raw_rows_file::RawRowsFileSource;
