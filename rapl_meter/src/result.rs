use std::{
    ops::Div,
    time::{Duration, SystemTime},
};

use crate::sensor::EnergyDelta;
use crate::EnergyDomain;

/// The energy consumed during a measurement.
///
/// Energy values are in microjoules, indexed by socket id.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementResult {
    label: String,
    timestamp: SystemTime,
    duration: Duration,
    pkg: Option<Vec<Option<f64>>>,
    dram: Option<Vec<Option<f64>>>,
}

/// One line of a tabular output: the result of one socket.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub label: String,
    pub timestamp: SystemTime,
    pub duration: Duration,
    pub pkg: Option<f64>,
    pub dram: Option<f64>,
    pub socket: u32,
}

impl MeasurementResult {
    pub fn new(
        label: impl Into<String>,
        timestamp: SystemTime,
        duration: Duration,
        pkg: Option<Vec<Option<f64>>>,
        dram: Option<Vec<Option<f64>>>,
    ) -> MeasurementResult {
        MeasurementResult {
            label: label.into(),
            timestamp,
            duration,
            pkg,
            dram,
        }
    }

    /// Builds a result from the difference between two sensor readings.
    ///
    /// A domain without any reading on any socket is `None`.
    pub(crate) fn from_delta(
        label: String,
        timestamp: SystemTime,
        duration: Duration,
        delta: &EnergyDelta,
    ) -> MeasurementResult {
        let collapse = |values: Vec<Option<f64>>| values.iter().any(Option::is_some).then_some(values);
        MeasurementResult {
            label,
            timestamp,
            duration,
            pkg: collapse(delta.per_socket(EnergyDomain::Package)),
            dram: collapse(delta.per_socket(EnergyDomain::Dram)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// When the measurement began.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Package energy per socket, `None` if the package domain was not recorded.
    pub fn pkg(&self) -> Option<&[Option<f64>]> {
        self.pkg.as_deref()
    }

    /// DRAM energy per socket, `None` if the dram domain was not recorded.
    pub fn dram(&self) -> Option<&[Option<f64>]> {
        self.dram.as_deref()
    }

    /// Divides the duration and every energy value by `n`.
    /// Missing values stay missing.
    pub fn averaged(self, n: u32) -> MeasurementResult {
        let divide = |values: Option<Vec<Option<f64>>>| {
            values.map(|v| v.into_iter().map(|e| e.map(|x| x / n as f64)).collect())
        };
        MeasurementResult {
            duration: self.duration / n,
            pkg: divide(self.pkg),
            dram: divide(self.dram),
            ..self
        }
    }

    /// Flattens the result: one row per socket that has at least one energy value.
    pub fn rows(&self) -> Vec<ResultRow> {
        let len = |values: &Option<Vec<Option<f64>>>| values.as_ref().map(Vec::len).unwrap_or(0);
        let socket_count = len(&self.pkg).max(len(&self.dram));
        let value_at = |values: &Option<Vec<Option<f64>>>, i: usize| values.as_ref().and_then(|v| v.get(i).copied().flatten());

        (0..socket_count)
            .filter_map(|i| {
                let pkg = value_at(&self.pkg, i);
                let dram = value_at(&self.dram, i);
                if pkg.is_none() && dram.is_none() {
                    return None;
                }
                Some(ResultRow {
                    label: self.label.clone(),
                    timestamp: self.timestamp,
                    duration: self.duration,
                    pkg,
                    dram,
                    socket: i as u32,
                })
            })
            .collect()
    }
}

impl Div<u32> for MeasurementResult {
    type Output = MeasurementResult;

    fn div(self, n: u32) -> MeasurementResult {
        self.averaged(n)
    }
}
