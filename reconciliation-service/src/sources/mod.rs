pub mod csv_file;
pub mod http_json;
pub mod ndjson_file;

pub use csv_file::CsvFileSource;
pub use http_json::HttpJsonSource;
pub use ndjson_file::NdjsonFileSource;
