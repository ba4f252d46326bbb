//! CSV well-test sample reader with full input validation.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use welltest_series::Sample;

use crate::IoError;
use crate::domain::ColumnNames;

/// Reads `(time, pressure, rate)` samples from a column-mapped CSV file.
///
/// Expected CSV format:
/// - Header row required; columns are located by name, so extra columns and
///   any column order are accepted
/// - One sample per row: time in hours, pressure in psi, rate in STB/D
///   (Mscf/D for gas), positive for production
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingColumn`] | A mapped column is not in the header |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
pub struct SampleReader {
    path: PathBuf,
    columns: ColumnNames,
}

impl SampleReader {
    /// Create a new reader for the given CSV file path with the default
    /// `time,pressure,rate` column names.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            columns: ColumnNames::new(),
        }
    }

    /// Override the column names.
    #[must_use]
    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }

    /// Read and validate the CSV file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Vec<Sample>, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let locate = |name: &str| {
            header
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| IoError::MissingColumn {
                    path: self.path.clone(),
                    column: name.to_string(),
                })
        };
        let columns = [
            (locate(self.columns.time())?, self.columns.time()),
            (locate(self.columns.pressure())?, self.columns.pressure()),
            (locate(self.columns.rate())?, self.columns.rate()),
        ];
        debug!(?columns, "located CSV columns");

        let mut samples = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            let mut values = [0.0; 3];
            for (value, &(col_index, name)) in values.iter_mut().zip(&columns) {
                let raw = record.get(col_index).unwrap_or("");
                *value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| IoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        column: name.to_string(),
                        raw: raw.to_string(),
                    })?;
            }
            samples.push(Sample::new(values[0], values[1], values[2]));
        }

        if samples.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(n_samples = samples.len(), "samples loaded");
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_valid_samples() {
        let csv = "time,pressure,rate\n0.1,4990.5,500\n0.2,4985.25,500\n0.4,4980.0,500\n";
        let f = write_csv(csv);
        let samples = SampleReader::new(f.path()).read().unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1], Sample::new(0.2, 4985.25, 500.0));
    }

    #[test]
    fn columns_found_by_name_in_any_order_and_case() {
        let csv = "Rate,well,PRESSURE,Time\n500,A,4990.0,0.1\n0,A,4995.0,0.3\n";
        let f = write_csv(csv);
        let samples = SampleReader::new(f.path()).read().unwrap();
        assert_eq!(samples[0], Sample::new(0.1, 4990.0, 500.0));
        assert_eq!(samples[1], Sample::new(0.3, 4995.0, 0.0));
    }

    #[test]
    fn column_names_can_be_overridden() {
        let csv = "hours,bhp,q\n1.0,4000.0,250\n";
        let f = write_csv(csv);
        let cols = ColumnNames::new()
            .with_time("hours")
            .with_pressure("bhp")
            .with_rate("q");
        let samples = SampleReader::new(f.path()).with_columns(cols).read().unwrap();
        assert_eq!(samples, vec![Sample::new(1.0, 4000.0, 250.0)]);
    }

    #[test]
    fn error_file_not_found() {
        let result = SampleReader::new(Path::new("/nonexistent/file.csv")).read();
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }

    #[test]
    fn error_missing_column() {
        let f = write_csv("time,pressure\n0.1,4990.0\n");
        let result = SampleReader::new(f.path()).read();
        assert!(matches!(
            result,
            Err(IoError::MissingColumn { ref column, .. }) if column == "rate"
        ));
    }

    #[test]
    fn error_empty_dataset() {
        let f = write_csv("time,pressure,rate\n");
        let result = SampleReader::new(f.path()).read();
        assert!(matches!(result, Err(IoError::EmptyDataset { .. })));
    }

    #[test]
    fn error_names_row_and_column() {
        let f = write_csv("time,pressure,rate\n0.1,4990.0,500\n0.2,NaN,500\n");
        let result = SampleReader::new(f.path()).read();
        match result {
            Err(IoError::NonFiniteValue {
                row_index,
                column,
                raw,
                ..
            }) => {
                assert_eq!(row_index, 1);
                assert_eq!(column, "pressure");
                assert_eq!(raw, "NaN");
            }
            other => panic!("expected NonFiniteValue, got {other:?}"),
        }
    }

    #[test]
    fn error_unparseable_value() {
        let f = write_csv("time,pressure,rate\n0.1,4990.0,abc\n");
        let result = SampleReader::new(f.path()).read();
        assert!(matches!(result, Err(IoError::NonFiniteValue { .. })));
    }
}
