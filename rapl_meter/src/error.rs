use std::{io, path::PathBuf};

use thiserror::Error;

use crate::EnergyDomain;

/// Errors raised while discovering, reading or measuring RAPL energy counters.
#[derive(Debug, Error)]
pub enum RaplError {
    /// The socket is absent from the cpu topology of the machine.
    #[error("socket {0} does not exist on this machine")]
    BadSocketId(u32),

    /// The powercap tree of a domain is missing, or incomplete for the requested sockets.
    #[error("cannot initialize the {domain} device api: {reason}")]
    CantInitDeviceApi { domain: EnergyDomain, reason: String },

    /// No counter can be read for the given domain (`None` means: for any domain).
    #[error("cannot record the energy consumption of {}", .0.map(|d| d.to_string()).unwrap_or_else(|| "any device".to_owned()))]
    CantRecordEnergyConsumption(Option<EnergyDomain>),

    #[error("end() called before begin(): no energy consumption record was started")]
    NoEnergyConsumptionRecordStarted,

    #[error("no energy consumption was recorded yet")]
    NoEnergyConsumptionRecorded,

    /// The measurement already produced its result and cannot be started again.
    #[error("the measurement has already ended, create a new one")]
    MeasurementEnded,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("the default sensor has already been set up")]
    AlreadySetUp,

    #[error("the default sensor has not been set up, call rapl_meter::setup first")]
    NotSetUp,

    /// A sysfs file does not contain what we expect.
    #[error("failed to parse {path:?}: '{content}'")]
    InvalidCounter { path: PathBuf, content: String },

    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write csv to {path:?}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// I/O failure of an output sink.
    #[error(transparent)]
    Output(#[from] io::Error),
}

pub type Result<T, E = RaplError> = std::result::Result<T, E>;

/// Attaches the path of the file to an I/O or csv error.
pub(crate) trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| RaplError::Io {
            path: path.into(),
            source,
        })
    }
}

impl<T> IoContext<T> for csv::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| RaplError::Csv {
            path: path.into(),
            source,
        })
    }
}
