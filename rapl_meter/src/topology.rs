use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{IoContext, RaplError, Result};

const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// Location of the sysfs tree that exposes the cpu topology and the powercap counters.
///
/// The default is `/sys`. Another root can be used to read a copy of the tree,
/// or a fake one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Sysfs::new(DEFAULT_SYSFS_ROOT)
    }
}

impl Sysfs {
    pub fn new(root: impl Into<PathBuf>) -> Sysfs {
        Sysfs { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The list of present cpus, for instance `0-7` or `0,2-3`.
    pub fn cpu_present_path(&self) -> PathBuf {
        self.root.join("devices/system/cpu/present")
    }

    pub fn physical_package_id_path(&self, cpu: u32) -> PathBuf {
        self.root
            .join(format!("devices/system/cpu/cpu{cpu}/topology/physical_package_id"))
    }

    /// The RAPL "control type" of the powercap framework.
    pub fn powercap_rapl_path(&self) -> PathBuf {
        self.root.join("class/powercap/intel-rapl")
    }
}

/// Returns the ids of the present cpus, in the order of the kernel list.
pub fn cpu_ids(sysfs: &Sysfs) -> Result<Vec<u32>> {
    let path = sysfs.cpu_present_path();
    let list = fs::read_to_string(&path).at(&path)?;
    parse_cpu_list(&list).ok_or_else(|| RaplError::InvalidCounter { path, content: list })
}

/// Returns the ids of the physical packages (sockets) of the machine, sorted and deduplicated.
pub fn socket_ids(sysfs: &Sysfs) -> Result<Vec<u32>> {
    let mut sockets = Vec::new();
    for cpu in cpu_ids(sysfs)? {
        let path = sysfs.physical_package_id_path(cpu);
        let content = fs::read_to_string(&path).at(&path)?;
        let socket = content
            .trim_end()
            .parse()
            .map_err(|_| RaplError::InvalidCounter { path, content: content.clone() })?;
        sockets.push(socket);
    }
    sockets.sort_unstable();
    sockets.dedup();
    log::debug!("sockets found in the cpu topology: {sockets:?}");
    Ok(sockets)
}

/// Parses a kernel cpu list. Returns `None` if the list is malformed.
pub(crate) fn parse_cpu_list(cpulist: &str) -> Option<Vec<u32>> {
    // handles "n" or "start-end"
    fn parse_cpulist_item(item: &str) -> Option<Vec<u32>> {
        let bounds: Vec<u32> = item
            .trim()
            .split('-')
            .map(|n| n.parse().ok())
            .collect::<Option<Vec<u32>>>()?;

        match *bounds.as_slice() {
            [start, end] if start <= end => Some((start..=end).collect()),
            [n] => Some(vec![n]),
            _ => None,
        }
    }

    // this can be "0,64" or "0-1" or maybe "2,3-6,11,1"
    let cpus: Vec<u32> = cpulist
        .trim_end()
        .split(',')
        .map(parse_cpulist_item)
        .collect::<Option<Vec<Vec<u32>>>>()?
        .into_iter() // not the same as iter() !
        .flatten()
        .collect();

    Some(cpus)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{cpu_ids, parse_cpu_list, socket_ids, Sysfs};

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(parse_cpu_list("0"), Some(vec![0]));
        assert_eq!(parse_cpu_list("1-3\n"), Some(vec![1, 2, 3]));
        assert_eq!(parse_cpu_list("1,3"), Some(vec![1, 3]));
        assert_eq!(parse_cpu_list("1,3-5"), Some(vec![1, 3, 4, 5]));
        // the order of the kernel list is kept
        assert_eq!(parse_cpu_list("2,3-6,11,1"), Some(vec![2, 3, 4, 5, 6, 11, 1]));

        assert_eq!(parse_cpu_list("abc"), None);
        assert_eq!(parse_cpu_list("1-2-3"), None);
        assert_eq!(parse_cpu_list("5-2"), None);
    }

    #[test]
    fn test_socket_ids() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let sysfs = Sysfs::new(dir.path());
        let cpu = dir.path().join("devices/system/cpu");
        fs::create_dir_all(&cpu)?;
        fs::write(cpu.join("present"), "0-2\n")?;
        for (id, socket) in [(0, 1), (1, 0), (2, 1)] {
            let topology = cpu.join(format!("cpu{id}/topology"));
            fs::create_dir_all(&topology)?;
            fs::write(topology.join("physical_package_id"), format!("{socket}\n"))?;
        }

        assert_eq!(cpu_ids(&sysfs)?, vec![0, 1, 2]);
        assert_eq!(socket_ids(&sysfs)?, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn test_missing_topology() {
        let dir = tempfile::tempdir().unwrap();
        let sysfs = Sysfs::new(dir.path());
        assert!(socket_ids(&sysfs).is_err());
    }
}
