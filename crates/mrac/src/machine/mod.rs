//! Machine inventory records.
//!
//! A machine record is the compiler's view of one MAME set: its name, its
//! clone relation, the ordered list of ROM entries and the device names the
//! header rules may reference. Inventories are TOML documents with one
//! `[[machine]]` table per set.

use std::path::Path;

use serde::Deserialize;

use crate::common::BuildResult;

/// One ROM entry of a machine: a file inside the set's zip archive and
/// where it loads within its region.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MachineRom {
    pub name: String,
    pub crc: Option<String>,
    pub size: usize,
    /// Load address within the region, as MAME declares it.
    pub offset: usize,
    pub region: String,
    /// MAME dump status; `"nodump"` marks a ROM with no known dump.
    pub status: String,
}

impl MachineRom {
    pub fn is_nodump(&self) -> bool {
        self.status == "nodump"
    }
}

/// One machine (set) of the inventory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MachineRecord {
    pub name: String,
    pub description: String,
    pub cloneof: String,
    #[serde(rename = "rom")]
    pub roms: Vec<MachineRom>,
    pub devices: Vec<String>,
}

/// True when `name` scopes to `machine`: either the set itself or the
/// parent its `cloneof` points at.
pub fn is_family(name: &str, machine: &MachineRecord) -> bool {
    !name.is_empty() && (name == machine.name || name == machine.cloneof)
}

/// The full machine inventory for a core.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MachineSet {
    #[serde(rename = "machine")]
    pub machines: Vec<MachineRecord>,
}

impl MachineSet {
    pub fn from_path(path: &Path) -> BuildResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
