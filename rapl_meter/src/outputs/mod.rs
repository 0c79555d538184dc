//! Destinations of the measurement results.

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::Result;
use crate::result::{MeasurementResult, ResultRow};

mod csv;
mod print;
mod table;

pub use csv::CsvOutput;
pub use print::PrintOutput;
pub use table::TableOutput;

/// Receives measurement results.
pub trait Output {
    fn add(&mut self, result: &MeasurementResult) -> Result<()>;
}

/// An output that accumulates results in a buffer, and writes them on [`BufferedOutput::save`].
pub trait BufferedOutput: Output {
    /// The rows added since the last save.
    fn buffer(&self) -> &[ResultRow];

    /// Writes the buffer, then clears it.
    fn save(&mut self) -> Result<()>;
}

// Lending an output to a measurement keeps it usable afterwards.
impl<O: Output + ?Sized> Output for &mut O {
    fn add(&mut self, result: &MeasurementResult) -> Result<()> {
        (**self).add(result)
    }
}

impl<O: Output + ?Sized> Output for Box<O> {
    fn add(&mut self, result: &MeasurementResult) -> Result<()> {
        (**self).add(result)
    }
}

/// Formats a timestamp in RFC 3339, UTC.
pub(crate) fn format_timestamp(timestamp: std::time::SystemTime) -> String {
    let datetime: OffsetDateTime = timestamp.into();
    // formatting a valid UTC datetime in RFC 3339 only fails for years outside 0..=9999
    datetime.format(&Rfc3339).unwrap_or_else(|_| format!("{timestamp:?}"))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::format_timestamp;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(SystemTime::UNIX_EPOCH), "1970-01-01T00:00:00Z");
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(format_timestamp(t), "2023-11-14T22:13:20Z");
    }
}
