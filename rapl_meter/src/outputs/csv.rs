use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use super::{format_timestamp, BufferedOutput, Output};
use crate::error::{IoContext, RaplError, Result};
use crate::result::{MeasurementResult, ResultRow};

const COLUMNS: [&str; 6] = ["label", "timestamp", "duration", "pkg", "dram", "socket"];

/// Writes the results to a CSV file, one line per socket.
///
/// The results are buffered by [`Output::add`] and written by [`BufferedOutput::save`].
pub struct CsvOutput {
    path: PathBuf,
    delimiter: u8,
    buffer: Vec<ResultRow>,
}

impl CsvOutput {
    /// Appends to `path` with the `,` separator. The header is written if the file is new.
    pub fn new(path: impl AsRef<Path>) -> Result<CsvOutput> {
        CsvOutput::with_options(path, ',', true)
    }

    /// Opens the CSV output.
    ///
    /// If `append` is `false`, the file is truncated. The header is written immediately,
    /// unless the results are appended to a non-empty file.
    /// The separator must be an ASCII character.
    pub fn with_options(path: impl AsRef<Path>, separator: char, append: bool) -> Result<CsvOutput> {
        let path = path.as_ref().to_path_buf();
        let delimiter = u8::try_from(separator)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| RaplError::InvalidArgument(format!("invalid csv separator '{separator}'")))?;

        let has_content = match fs::metadata(&path) {
            Ok(metadata) => metadata.len() > 0,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(source) => return Err(RaplError::Io { path, source }),
        };

        let output = CsvOutput {
            path,
            delimiter,
            buffer: Vec::new(),
        };
        if !append || !has_content {
            let file = File::create(&output.path).at(&output.path)?;
            let mut writer = output.writer(file);
            writer.write_record(COLUMNS).at(&output.path)?;
            writer.flush().at(&output.path)?;
        }
        Ok(output)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer<W: Write>(&self, inner: W) -> csv::Writer<W> {
        csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(inner)
    }

    fn record(row: &ResultRow) -> [String; 6] {
        let value = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        [
            row.label.clone(),
            format_timestamp(row.timestamp),
            row.duration.as_secs_f64().to_string(),
            value(row.pkg),
            value(row.dram),
            row.socket.to_string(),
        ]
    }
}

impl Output for CsvOutput {
    fn add(&mut self, result: &MeasurementResult) -> Result<()> {
        self.buffer.extend(result.rows());
        Ok(())
    }
}

impl BufferedOutput for CsvOutput {
    fn buffer(&self) -> &[ResultRow] {
        &self.buffer
    }

    fn save(&mut self) -> Result<()> {
        let file = OpenOptions::new().append(true).create(true).open(&self.path).at(&self.path)?;
        let mut writer = self.writer(file);
        for row in &self.buffer {
            writer.write_record(CsvOutput::record(row)).at(&self.path)?;
        }
        writer.flush().at(&self.path)?;
        log::debug!("{} rows saved to {}", self.buffer.len(), self.path.to_string_lossy());
        self.buffer.clear();
        Ok(())
    }
}
