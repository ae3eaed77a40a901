pub mod csv_reader;
pub mod csv_writer;
pub mod error;

// Re-export commonly used types
pub use csv_reader::{CsvFormat, CsvRecordReader, record_to_row};
pub use csv_writer::CsvRowWriter;
pub use error::IoError;
