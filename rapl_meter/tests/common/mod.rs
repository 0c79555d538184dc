//! A fake sysfs tree, with the cpu topology and the RAPL powercap zones.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use rapl_meter::{EnergyDomain, SensorConfig, Sysfs};
use tempfile::TempDir;

pub const PKG_0_VALUE: u64 = 12345;
pub const PKG_1_VALUE: u64 = 54321;
pub const DRAM_0_VALUE: u64 = 6789;
pub const DRAM_1_VALUE: u64 = 9876;

const RAPL: &str = "class/powercap/intel-rapl";

pub struct FakeSysfs {
    dir: TempDir,
}

impl FakeSysfs {
    /// Topology with the given `(cpu, socket)` pairs, without any powercap zone.
    pub fn with_cpus(cpus: &[(u32, u32)]) -> FakeSysfs {
        let fake = FakeSysfs {
            dir: tempfile::tempdir().expect("failed to create temporary directory"),
        };
        let present: Vec<String> = cpus.iter().map(|(cpu, _)| cpu.to_string()).collect();
        fake.write("devices/system/cpu/present", &format!("{}\n", present.join(",")));
        for (cpu, socket) in cpus {
            fake.write(
                &format!("devices/system/cpu/cpu{cpu}/topology/physical_package_id"),
                &format!("{socket}\n"),
            );
        }
        fake
    }

    /// One socket, no powercap zone.
    pub fn empty() -> FakeSysfs {
        FakeSysfs::with_cpus(&[(0, 0)])
    }

    /// One socket, with package and dram counters.
    pub fn one_socket() -> FakeSysfs {
        let fake = FakeSysfs::empty();
        fake.zone("intel-rapl:0", "package-0", Some(PKG_0_VALUE));
        fake.zone("intel-rapl:0/intel-rapl:0:0", "dram", Some(DRAM_0_VALUE));
        fake
    }

    /// Two sockets, with package and dram counters.
    pub fn two_sockets() -> FakeSysfs {
        let fake = FakeSysfs::with_cpus(&[(0, 0), (1, 1)]);
        fake.zone("intel-rapl:0", "package-0", Some(PKG_0_VALUE));
        fake.zone("intel-rapl:0/intel-rapl:0:0", "dram", Some(DRAM_0_VALUE));
        fake.zone("intel-rapl:1", "package-1", Some(PKG_1_VALUE));
        fake.zone("intel-rapl:1/intel-rapl:1:0", "dram", Some(DRAM_1_VALUE));
        fake
    }

    /// One socket with a package counter, and gpu and sys sub-zones but no dram.
    pub fn one_socket_no_dram() -> FakeSysfs {
        let fake = FakeSysfs::empty();
        fake.zone("intel-rapl:0", "package-0", Some(PKG_0_VALUE));
        fake.zone("intel-rapl:0/intel-rapl:0:0", "gpu", None);
        fake.zone("intel-rapl:0/intel-rapl:0:1", "sys", None);
        fake
    }

    pub fn sysfs(&self) -> Sysfs {
        Sysfs::new(self.dir.path())
    }

    pub fn config(&self, domains: Option<Vec<EnergyDomain>>, sockets: Option<Vec<u32>>) -> SensorConfig {
        SensorConfig {
            sysfs: self.sysfs(),
            domains,
            sockets,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Path of a zone, relative to the powercap rapl directory.
    pub fn zone_path(&self, zone: &str) -> PathBuf {
        self.dir.path().join(RAPL).join(zone)
    }

    /// Creates a power zone, with a counter if `energy` is set.
    pub fn zone(&self, zone: &str, name: &str, energy: Option<u64>) {
        let rel = format!("{RAPL}/{zone}");
        self.write(&format!("{rel}/name"), &format!("{name}\n"));
        if let Some(value) = energy {
            self.write(&format!("{rel}/energy_uj"), &format!("{value}\n"));
        }
    }

    /// Sets the value of a counter, like the hardware would do.
    pub fn write_energy(&self, domain: EnergyDomain, socket: u32, value: u64) {
        let zone = match domain {
            EnergyDomain::Package => format!("intel-rapl:{socket}"),
            EnergyDomain::Dram => format!("intel-rapl:{socket}/intel-rapl:{socket}:0"),
            EnergyDomain::Gpu => panic!("no gpu counter"),
        };
        let path = self.zone_path(&zone).join("energy_uj");
        if path.exists() {
            fs::write(path, format!("{value}\n")).expect("failed to write counter");
        }
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap_or(Path::new("/"))).expect("failed to create directory");
        fs::write(&path, content).expect("failed to write file");
    }
}
