//! Measures the energy consumed by a piece of code, with the RAPL counters
//! exposed by the powercap framework of the Linux kernel.
//!
//! ## Units
//!
//! Energy values are raw powercap values, in **microjoules** (`f64`), from the
//! counters up to [`MeasurementResult`]. Durations are [`std::time::Duration`]s.
//! Use [`uj_to_joules`] to convert.
//!
//! ## Usage
//!
//! ```no_run
//! use rapl_meter::{Measurement, Sensor};
//!
//! // monitor every available domain on every socket
//! let sensor = Sensor::new(None, None)?;
//!
//! let mut measurement = Measurement::new("work", &sensor);
//! measurement.begin()?;
//! // ... code to measure ...
//! measurement.end()?;
//! println!("{:?}", measurement.result()?.pkg());
//! # Ok::<(), rapl_meter::RaplError>(())
//! ```

use std::{fmt, str::FromStr, sync::OnceLock};

use clap::ValueEnum;
use enum_map::Enum;

pub mod decorator;
pub mod device;
pub mod error;
pub mod measurement;
pub mod outputs;
pub mod powercap;
pub mod result;
pub mod sensor;
pub mod topology;

pub use decorator::{measureit, MeasureIt};
pub use error::{RaplError, Result};
pub use measurement::Measurement;
pub use result::{MeasurementResult, ResultRow};
pub use sensor::{subtract_energy, EnergyDelta, EnergyVector, Sensor, SensorConfig};
pub use topology::Sysfs;

use powercap::ZoneLayout;

const MICROJOULES_PER_JOULE: f64 = 1_000_000.0;

/// A hardware energy domain.
#[derive(Enum, Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum EnergyDomain {
    /// entire socket
    #[value(alias = "pkg")]
    Package,
    /// DRAM attached to the socket
    #[value(alias = "ram")]
    Dram,
    /// integrated gpu, never available
    Gpu,
}

impl EnergyDomain {
    /// The domains monitored when no domain is explicitly requested.
    pub const DEFAULT: [EnergyDomain; 2] = [EnergyDomain::Package, EnergyDomain::Dram];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyDomain::Package => "package",
            EnergyDomain::Dram => "dram",
            EnergyDomain::Gpu => "gpu",
        }
    }

    /// Offset of the domain in the per-socket slots of an [`EnergyVector`].
    pub fn slot(&self) -> Option<usize> {
        match self {
            EnergyDomain::Package => Some(0),
            EnergyDomain::Dram => Some(1),
            EnergyDomain::Gpu => None,
        }
    }

    pub(crate) fn zone_layout(&self) -> ZoneLayout {
        match self {
            EnergyDomain::Package => ZoneLayout::Package,
            EnergyDomain::Dram => ZoneLayout::SubZone("dram"),
            EnergyDomain::Gpu => ZoneLayout::Unsupported,
        }
    }
}

impl fmt::Display for EnergyDomain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnergyDomain {
    type Err = RaplError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "package" | "pkg" => Ok(EnergyDomain::Package),
            "dram" | "ram" => Ok(EnergyDomain::Dram),
            "gpu" => Ok(EnergyDomain::Gpu),
            _ => Err(RaplError::InvalidArgument(format!("unknown energy domain '{s}'"))),
        }
    }
}

/// Converts a powercap value to Joules.
pub fn uj_to_joules(microjoules: f64) -> f64 {
    microjoules / MICROJOULES_PER_JOULE
}

static DEFAULT_SENSOR: OnceLock<Sensor> = OnceLock::new();

/// Creates the process-wide default sensor, used by [`Measurement::with_default_sensor`]
/// and [`MeasureIt::with_default_sensor`].
///
/// The default sensor can only be set up once: the next calls return [`RaplError::AlreadySetUp`].
pub fn setup(config: SensorConfig) -> Result<&'static Sensor> {
    if DEFAULT_SENSOR.get().is_some() {
        return Err(RaplError::AlreadySetUp);
    }
    let sensor = Sensor::from_config(&config)?;
    DEFAULT_SENSOR.set(sensor).map_err(|_| RaplError::AlreadySetUp)?;
    default_sensor()
}

/// Returns the process-wide default sensor, see [`setup`].
pub fn default_sensor() -> Result<&'static Sensor> {
    DEFAULT_SENSOR.get().ok_or(RaplError::NotSetUp)
}
