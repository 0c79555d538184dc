use super::Output;
use crate::error::Result;
use crate::result::{MeasurementResult, ResultRow};

/// Keeps the results in memory, as a table with one row per socket.
#[derive(Debug, Default, Clone)]
pub struct TableOutput {
    rows: Vec<ResultRow>,
}

impl TableOutput {
    pub fn new() -> TableOutput {
        TableOutput::default()
    }

    pub fn data(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Rows of the results with the given label.
    pub fn rows_of<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a ResultRow> + 'a {
        self.rows.iter().filter(move |r| r.label == label)
    }
}

impl Output for TableOutput {
    fn add(&mut self, result: &MeasurementResult) -> Result<()> {
        self.rows.extend(result.rows());
        Ok(())
    }
}
