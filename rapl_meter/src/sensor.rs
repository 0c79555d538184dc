use std::collections::BTreeSet;

use enum_map::EnumMap;

use crate::device::DeviceReader;
use crate::error::{RaplError, Result};
use crate::powercap;
use crate::topology::{self, Sysfs};
use crate::EnergyDomain;

/// Number of domains stored for each socket in an [`EnergyVector`].
pub const DOMAIN_SLOTS: usize = 2;

/// Configuration of a [`Sensor`].
#[derive(Debug, Clone, Default)]
pub struct SensorConfig {
    /// Where to find the cpu topology and the powercap tree.
    pub sysfs: Sysfs,
    /// The domains to monitor. `None` means "all the available domains".
    pub domains: Option<Vec<EnergyDomain>>,
    /// The sockets to monitor. `None` means "all the sockets".
    pub sockets: Option<Vec<u32>>,
}

/// Reads the energy counters of several domains, on several sockets.
///
/// The sensor is immutable once built and can be shared between measurements.
#[derive(Debug)]
pub struct Sensor {
    readers: EnumMap<EnergyDomain, Option<DeviceReader>>,
    sockets: Vec<u32>,
}

impl Sensor {
    /// Creates a sensor that reads the default sysfs (`/sys`).
    pub fn new(domains: Option<Vec<EnergyDomain>>, sockets: Option<Vec<u32>>) -> Result<Sensor> {
        Sensor::from_config(&SensorConfig {
            sysfs: Sysfs::default(),
            domains,
            sockets,
        })
    }

    /// Creates a sensor.
    ///
    /// Every domain must cover exactly the monitored sockets: the requested ones, or all
    /// the sockets of the cpu topology. A domain that misses a socket is not available.
    ///
    /// ## Errors
    /// - [`RaplError::BadSocketId`] if a requested socket does not exist.
    /// - [`RaplError::CantRecordEnergyConsumption`] with `Some(domain)` if an explicitly
    ///   requested domain is not available, with `None` if no domain is available at all.
    pub fn from_config(config: &SensorConfig) -> Result<Sensor> {
        let sockets: BTreeSet<u32> = match &config.sockets {
            Some(s) if s.is_empty() => return Err(RaplError::InvalidArgument("the list of sockets is empty".to_owned())),
            Some(s) => s.iter().copied().collect(),
            None => topology::socket_ids(&config.sysfs)?.into_iter().collect(),
        };
        let explicit_domains = config.domains.is_some();
        let domains = config.domains.as_deref().unwrap_or(&EnergyDomain::DEFAULT);

        let mut readers: EnumMap<EnergyDomain, Option<DeviceReader>> = EnumMap::default();
        for &domain in domains {
            if readers[domain].is_some() {
                continue;
            }
            // discovery fails unless there is exactly one zone per socket
            let opened = powercap::discover(&config.sysfs, domain, Some(&sockets)).and_then(|dirs| DeviceReader::open(&dirs));
            match opened {
                Ok(reader) => readers[domain] = Some(reader),
                Err(e @ RaplError::BadSocketId(_)) => return Err(e),
                Err(e) if explicit_domains => {
                    log::debug!("{e}");
                    return Err(RaplError::CantRecordEnergyConsumption(Some(domain)));
                }
                Err(e) => log::info!("{domain} energy will not be recorded: {e}"),
            }
        }

        if readers.values().all(Option::is_none) {
            return Err(RaplError::CantRecordEnergyConsumption(None));
        }
        let sockets: Vec<u32> = sockets.into_iter().collect();
        let available: Vec<String> = readers
            .iter()
            .filter(|(_, r)| r.is_some())
            .map(|(d, _)| d.to_string())
            .collect();
        log::debug!("sensor ready: domains [{}] on sockets {sockets:?}", available.join(", "));
        Ok(Sensor { readers, sockets })
    }

    /// The monitored sockets, sorted.
    pub fn sockets(&self) -> &[u32] {
        &self.sockets
    }

    /// The domains that this sensor reads.
    pub fn available_domains(&self) -> Vec<EnergyDomain> {
        self.readers
            .iter()
            .filter_map(|(domain, reader)| reader.as_ref().map(|_| domain))
            .collect()
    }

    /// Reads all the counters, in microjoules.
    ///
    /// The vector holds [`DOMAIN_SLOTS`] values per socket, from socket 0 to the highest
    /// monitored socket: `(pkg socket 0, dram socket 0, ..., pkg socket N, dram socket N)`.
    /// Slots without a reading are set to [`EnergyVector::NO_DATA`].
    pub fn energy(&self) -> Result<EnergyVector> {
        let max_socket = self.sockets.last().copied().unwrap_or_default() as usize;
        let mut result = EnergyVector::no_data(DOMAIN_SLOTS * (max_socket + 1));

        for (domain, reader) in &self.readers {
            let (Some(reader), Some(offset)) = (reader, domain.slot()) else {
                continue;
            };
            let energy = reader.energy()?;
            for (socket, value) in reader.sockets().into_iter().zip(energy) {
                result.values[socket as usize * DOMAIN_SLOTS + offset] = value;
            }
        }
        Ok(result)
    }
}

/// Energy values of several domains on several sockets, in a flat layout.
///
/// The value of `domain` on `socket` is at `socket * DOMAIN_SLOTS + domain offset`
/// (package offset 0, dram offset 1).
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyVector {
    values: Vec<f64>,
}

impl EnergyVector {
    /// Marks a slot without data.
    pub const NO_DATA: f64 = -1.0;

    pub fn no_data(len: usize) -> EnergyVector {
        EnergyVector {
            values: vec![Self::NO_DATA; len],
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of sockets covered by the vector, including the unmonitored ones.
    pub fn socket_count(&self) -> usize {
        self.values.len() / DOMAIN_SLOTS
    }

    pub fn get(&self, socket: u32, domain: EnergyDomain) -> Option<f64> {
        let offset = domain.slot()?;
        let value = *self.values.get(socket as usize * DOMAIN_SLOTS + offset)?;
        (value != Self::NO_DATA).then_some(value)
    }

    /// The values of one domain, indexed by socket id.
    pub fn per_socket(&self, domain: EnergyDomain) -> Vec<Option<f64>> {
        (0..self.socket_count() as u32).map(|s| self.get(s, domain)).collect()
    }

    /// Computes `self - begin` slot by slot.
    ///
    /// A slot has a value if both readings are valid, even when the difference is negative
    /// (after a counter reset, for instance).
    pub fn delta(&self, begin: &EnergyVector) -> Result<EnergyDelta> {
        check_same_len(&self.values, &begin.values)?;
        let values = self
            .values
            .iter()
            .zip(&begin.values)
            .map(|(&b, &a)| (a >= 0.0 && b >= 0.0).then(|| b - a))
            .collect();
        Ok(EnergyDelta { values })
    }
}

/// The difference between two [`EnergyVector`]s, with the same layout.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyDelta {
    values: Vec<Option<f64>>,
}

impl EnergyDelta {
    pub fn socket_count(&self) -> usize {
        self.values.len() / DOMAIN_SLOTS
    }

    pub fn get(&self, socket: u32, domain: EnergyDomain) -> Option<f64> {
        let offset = domain.slot()?;
        self.values.get(socket as usize * DOMAIN_SLOTS + offset).copied().flatten()
    }

    /// The differences of one domain, indexed by socket id.
    pub fn per_socket(&self, domain: EnergyDomain) -> Vec<Option<f64>> {
        (0..self.socket_count() as u32).map(|s| self.get(s, domain)).collect()
    }
}

impl From<Vec<Option<f64>>> for EnergyDelta {
    fn from(values: Vec<Option<f64>>) -> Self {
        EnergyDelta { values }
    }
}

impl From<Vec<f64>> for EnergyVector {
    fn from(values: Vec<f64>) -> Self {
        EnergyVector { values }
    }
}

/// Subtracts two raw energy vectors element-wise: `end[i] - begin[i]`.
///
/// A slot is [`EnergyVector::NO_DATA`] in the result if it is negative in either operand.
/// The difference is not clamped.
pub fn subtract_energy(end: &[f64], begin: &[f64]) -> Result<Vec<f64>> {
    check_same_len(end, begin)?;
    let diff = end
        .iter()
        .zip(begin)
        .map(|(&b, &a)| {
            if a >= 0.0 && b >= 0.0 {
                b - a
            } else {
                EnergyVector::NO_DATA
            }
        })
        .collect();
    Ok(diff)
}

fn check_same_len(end: &[f64], begin: &[f64]) -> Result<()> {
    if end.len() != begin.len() {
        return Err(RaplError::InvalidArgument(format!(
            "cannot subtract energy vectors of different lengths ({} and {})",
            end.len(),
            begin.len()
        )));
    }
    Ok(())
}
