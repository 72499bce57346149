pub mod csv_file;

pub use csv_file::{publish_rows, read_rows, CsvFileSink, DatasetRow, HistoricalRow, PublishedFile};
