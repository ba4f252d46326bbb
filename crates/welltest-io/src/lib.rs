//! File I/O, validation and serialization around the welltest engine.

mod config_reader;
mod domain;
mod error;
mod reader;
mod writer;

pub use config_reader::{ConfigReader, parse_test_configuration};
pub use domain::{ColumnNames, ExperimentName};
pub use error::IoError;
pub use reader::SampleReader;
pub use writer::ResultWriter;
