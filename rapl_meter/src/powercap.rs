// See https://www.kernel.org/doc/html/latest/power/powercap/powercap.html
// for an explanation of the Power Capping framework.

use std::{
    collections::BTreeSet,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

use crate::error::{IoContext, RaplError, Result};
use crate::topology::{self, Sysfs};
use crate::EnergyDomain;

const POWER_ZONE_PREFIX: &str = "intel-rapl";
const PACKAGE_ZONE_PREFIX: &str = "package-";

/// How the zones of an energy domain are laid out in the powercap tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ZoneLayout {
    /// Top-level zone named `package-<socket>`.
    Package,
    /// Zone nested one level under a package zone, with the given name.
    SubZone(&'static str),
    /// Not exposed by powercap.
    Unsupported,
}

/// A power zone directory that holds the counter of one energy domain, for one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDir {
    /// The path of the zone in sysfs, for instance
    /// `/sys/class/powercap/intel-rapl/intel-rapl:0/intel-rapl:0:0`.
    ///
    /// Note that in the above path, `intel-rapl` is the "control type"
    /// and "intel-rapl:0" is the power zone.
    pub path: PathBuf,

    /// The id of the socket that "contains" this zone.
    pub socket: u32,
}

impl DomainDir {
    pub fn energy_path(&self) -> PathBuf {
        self.path.join("energy_uj")
    }
}

impl Display for DomainDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "socket {}: {}", self.socket, self.path.to_string_lossy())
    }
}

/// Finds the power zones of `domain`, one per socket, sorted by socket id.
///
/// If `requested_sockets` is `None`, every socket of the cpu topology is requested.
///
/// ## Errors
/// - [`RaplError::BadSocketId`] if a requested socket does not exist in the cpu topology.
/// - [`RaplError::CantInitDeviceApi`] if the powercap tree is missing,
///   or if some requested socket has no zone, or several zones, for this domain.
pub fn discover(
    sysfs: &Sysfs,
    domain: EnergyDomain,
    requested_sockets: Option<&BTreeSet<u32>>,
) -> Result<Vec<DomainDir>> {
    let all_sockets = topology::socket_ids(sysfs)?;
    let sockets: BTreeSet<u32> = match requested_sockets {
        Some(requested) => {
            if let Some(bad) = requested.iter().find(|s| !all_sockets.contains(s)) {
                return Err(RaplError::BadSocketId(*bad));
            }
            requested.clone()
        }
        None => all_sockets.into_iter().collect(),
    };

    let cant_init = |reason: String| RaplError::CantInitDeviceApi { domain, reason };

    let root = sysfs.powercap_rapl_path();
    if !root.is_dir() {
        return Err(cant_init(format!("{} does not exist", root.to_string_lossy())));
    }

    let mut found = match domain.zone_layout() {
        ZoneLayout::Package => package_zones(&root, &sockets)?,
        ZoneLayout::SubZone(name) => {
            let mut sub_zones = Vec::new();
            for package in package_zones(&root, &sockets)? {
                if let Some(path) = find_sub_zone(&package.path, name)? {
                    sub_zones.push(DomainDir {
                        path,
                        socket: package.socket,
                    });
                }
            }
            sub_zones
        }
        ZoneLayout::Unsupported => return Err(cant_init("not supported by powercap".to_owned())),
    };

    if found.is_empty() {
        return Err(cant_init("no power zone found".to_owned()));
    }

    found.sort_by_key(|d| d.socket);
    let found_sockets: Vec<u32> = found.iter().map(|d| d.socket).collect();
    if let Some(w) = found_sockets.windows(2).find(|w| w[0] == w[1]) {
        return Err(cant_init(format!("several power zones found for socket {}", w[0])));
    }
    if !found_sockets.iter().eq(sockets.iter()) {
        return Err(cant_init(format!(
            "power zones found for sockets {found_sockets:?}, but sockets {sockets:?} are requested"
        )));
    }
    for dir in &found {
        log::debug!("{domain} zone found on {dir}");
    }
    Ok(found)
}

/// Path of the n-th child zone of `parent`, for instance `intel-rapl:0:1` in `intel-rapl:0`.
fn child_zone_path(parent: &Path, index: u32) -> PathBuf {
    let parent_name = parent.file_name().map(|n| n.to_string_lossy().into_owned());
    match parent_name {
        Some(name) if name.starts_with(&format!("{POWER_ZONE_PREFIX}:")) => parent.join(format!("{name}:{index}")),
        _ => parent.join(format!("{POWER_ZONE_PREFIX}:{index}")),
    }
}

/// Iterates over the numbered children of a zone, stopping at the first missing index.
fn child_zones(parent: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    (0..)
        .map(move |i| child_zone_path(parent, i))
        .take_while(|path| path.is_dir())
}

fn read_zone_name(zone: &Path) -> Result<String> {
    let path = zone.join("name");
    let name = fs::read_to_string(&path).at(&path)?;
    Ok(name.trim_end().to_owned())
}

/// Finds the `package-<socket>` zones of the requested sockets. Other zones (psys, ...) are skipped.
fn package_zones(root: &Path, sockets: &BTreeSet<u32>) -> Result<Vec<DomainDir>> {
    let mut zones = Vec::new();
    for path in child_zones(root) {
        let name = read_zone_name(&path)?;
        let Some(id_str) = name.strip_prefix(PACKAGE_ZONE_PREFIX) else {
            log::debug!("skipping power zone {name} at {}", path.to_string_lossy());
            continue;
        };
        match id_str.parse::<u32>() {
            Ok(socket) if sockets.contains(&socket) => zones.push(DomainDir { path, socket }),
            Ok(_) => (),
            Err(_) => log::warn!("Failed to extract package id from '{name}', skipping the zone"),
        }
    }
    Ok(zones)
}

/// Finds the sub-zone with the given name, one level under a package zone.
fn find_sub_zone(package: &Path, name: &str) -> Result<Option<PathBuf>> {
    for path in child_zones(package) {
        if read_zone_name(&path)? == name {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
