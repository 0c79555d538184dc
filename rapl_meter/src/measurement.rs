use std::time::{Instant, SystemTime};

use crate::error::{RaplError, Result};
use crate::outputs::{Output, PrintOutput};
use crate::result::MeasurementResult;
use crate::sensor::{EnergyVector, Sensor};

/// Records the energy consumed between [`Measurement::begin`] and [`Measurement::end`].
///
/// A measurement goes through `Idle -> Started -> Ended` and cannot be restarted:
/// create a new one to measure again.
pub struct Measurement<'a> {
    label: String,
    sensor: &'a Sensor,
    output: Box<dyn Output + 'a>,
    state: State,
}

enum State {
    Idle,
    Started {
        timestamp: SystemTime,
        start: Instant,
        energy: EnergyVector,
    },
    Ended(MeasurementResult),
}

impl<'a> Measurement<'a> {
    /// Creates a measurement that reads `sensor` and exports to the console by default.
    pub fn new(label: impl Into<String>, sensor: &'a Sensor) -> Measurement<'a> {
        Measurement::to_output(label, sensor, PrintOutput::new())
    }

    /// Creates a measurement that reads `sensor` and exports to `output` by default.
    pub fn to_output(label: impl Into<String>, sensor: &'a Sensor, output: impl Output + 'a) -> Measurement<'a> {
        Measurement {
            label: label.into(),
            sensor,
            output: Box::new(output),
            state: State::Idle,
        }
    }

    /// Sets the default output of [`Measurement::export`] and [`Measurement::scoped`].
    pub fn with_output<'b>(self, output: impl Output + 'b) -> Measurement<'b>
    where
        'a: 'b,
    {
        Measurement {
            label: self.label,
            sensor: self.sensor,
            output: Box::new(output),
            state: self.state,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Starts recording.
    ///
    /// Calling `begin` again before `end` restarts the recording.
    pub fn begin(&mut self) -> Result<()> {
        if let State::Ended(_) = self.state {
            return Err(RaplError::MeasurementEnded);
        }
        let timestamp = SystemTime::now();
        let start = Instant::now();
        let energy = self.sensor.energy()?;
        self.state = State::Started {
            timestamp,
            start,
            energy,
        };
        Ok(())
    }

    /// Stops recording and computes the result.
    pub fn end(&mut self) -> Result<&MeasurementResult> {
        let State::Started {
            timestamp,
            start,
            energy: begin,
        } = &self.state
        else {
            return Err(RaplError::NoEnergyConsumptionRecordStarted);
        };
        let end = self.sensor.energy()?;
        let duration = start.elapsed();

        let delta = end.delta(begin)?;
        let result = MeasurementResult::from_delta(self.label.clone(), *timestamp, duration, &delta);
        log::debug!("measurement {} ended: {result:?}", self.label);
        self.state = State::Ended(result);
        self.result()
    }

    /// The result of the measurement, available once it has ended.
    pub fn result(&self) -> Result<&MeasurementResult> {
        match &self.state {
            State::Ended(result) => Ok(result),
            _ => Err(RaplError::NoEnergyConsumptionRecorded),
        }
    }

    /// Divides the result by `n`, for a measurement that covers `n` runs of the same code.
    pub(crate) fn average_over(&mut self, n: u32) -> Result<()> {
        let State::Ended(result) = std::mem::replace(&mut self.state, State::Idle) else {
            return Err(RaplError::NoEnergyConsumptionRecorded);
        };
        self.state = State::Ended(result / n);
        Ok(())
    }

    /// Sends the result to `output`, or to the default output of the measurement if `None`.
    ///
    /// The result can be exported several times.
    pub fn export(&mut self, output: Option<&mut dyn Output>) -> Result<()> {
        let State::Ended(result) = &self.state else {
            return Err(RaplError::NoEnergyConsumptionRecorded);
        };
        match output {
            Some(output) => output.add(result),
            None => self.output.add(result),
        }
    }

    /// Measures `f`, then exports the result to the default output.
    ///
    /// If `f` fails, its error is returned and nothing is exported.
    pub fn scoped<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<RaplError>,
    {
        self.begin()?;
        let value = f()?;
        self.end()?;
        self.export(None)?;
        Ok(value)
    }
}

impl Measurement<'static> {
    /// Creates a measurement that reads the default sensor, see [`crate::setup`].
    pub fn with_default_sensor(label: impl Into<String>) -> Result<Measurement<'static>> {
        Ok(Measurement::new(label, crate::default_sensor()?))
    }
}
