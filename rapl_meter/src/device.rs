use std::{
    fs::File,
    io::{Read, Seek},
    path::PathBuf,
};

use crate::error::{IoContext, RaplError, Result};
use crate::powercap::DomainDir;

/// Reads the energy counters of one domain, on every discovered socket.
///
/// The counter files are opened once, in [`DeviceReader::open`], and kept open
/// for the lifetime of the reader.
#[derive(Debug)]
pub struct DeviceReader {
    counters: Vec<OpenedCounter>,
}

#[derive(Debug)]
struct OpenedCounter {
    file: File,
    path: PathBuf,
    socket: u32,
}

impl DeviceReader {
    /// Opens the `energy_uj` file of every directory, keeping the order of `directories`
    /// (which is socket-ascending when it comes from [`crate::powercap::discover`]).
    pub fn open(directories: &[DomainDir]) -> Result<DeviceReader> {
        let counters = directories
            .iter()
            .map(|dir| {
                let path = dir.energy_path();
                let file = File::open(&path).at(&path)?;
                Ok(OpenedCounter {
                    file,
                    path,
                    socket: dir.socket,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DeviceReader { counters })
    }

    /// The sockets monitored by this reader, in the order of [`DeviceReader::energy`].
    pub fn sockets(&self) -> Vec<u32> {
        self.counters.iter().map(|c| c.socket).collect()
    }

    /// Reads the current value of every counter, in microjoules, one per socket.
    ///
    /// Every call reads the files again; nothing is cached.
    pub fn energy(&self) -> Result<Vec<f64>> {
        // reuse the same buffer for all the counters
        // the content of `energy_uj` is a single, short line
        let mut buf = Vec::with_capacity(32);
        let mut values = Vec::with_capacity(self.counters.len());

        for counter in &self.counters {
            // read the file from the beginning
            let mut file = &counter.file;
            file.rewind().at(&counter.path)?;
            file.read_to_end(&mut buf).at(&counter.path)?;

            let invalid = || RaplError::InvalidCounter {
                path: counter.path.clone(),
                content: String::from_utf8_lossy(&buf).into_owned(),
            };
            let content = std::str::from_utf8(&buf).map_err(|_| invalid())?;
            let first_line = content.lines().next().unwrap_or_default();
            let counter_value: u64 = first_line.trim_end().parse().map_err(|_| invalid())?;

            log::debug!("socket {} counter {}: {counter_value} uJ", counter.socket, counter.path.to_string_lossy());
            values.push(counter_value as f64);

            // clear the buffer, so that we can fill it again
            buf.clear();
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::DeviceReader;
    use crate::error::RaplError;
    use crate::powercap::DomainDir;

    #[test]
    fn test_reads_fresh_values() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let zones: Vec<DomainDir> = (0..2)
            .map(|socket| {
                let path = dir.path().join(format!("intel-rapl:{socket}"));
                fs::create_dir(&path).unwrap();
                fs::write(path.join("energy_uj"), format!("{}\n", 100 * (socket + 1))).unwrap();
                DomainDir { path, socket }
            })
            .collect();

        let reader = DeviceReader::open(&zones)?;
        assert_eq!(reader.sockets(), vec![0, 1]);
        assert_eq!(reader.energy()?, vec![100.0, 200.0]);

        // the same handles see the new content
        fs::write(zones[1].energy_path(), "123456789\n")?;
        assert_eq!(reader.energy()?, vec![100.0, 123456789.0]);
        Ok(())
    }

    #[test]
    fn test_invalid_counter() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("energy_uj"), "not a number\n")?;
        let reader = DeviceReader::open(&[DomainDir {
            path: dir.path().to_path_buf(),
            socket: 0,
        }])?;
        assert!(matches!(reader.energy(), Err(RaplError::InvalidCounter { .. })));
        Ok(())
    }

    #[test]
    fn test_missing_counter() {
        let dir = tempfile::tempdir().unwrap();
        let res = DeviceReader::open(&[DomainDir {
            path: dir.path().join("intel-rapl:0"),
            socket: 0,
        }]);
        assert!(matches!(res, Err(RaplError::Io { .. })));
    }
}
