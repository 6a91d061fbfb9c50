//! Region configuration resolution and ROM extraction.

use crate::config::{GlobalConfig, RegionConfig};
use crate::machine::{is_family, MachineRecord, MachineRom};

/// Match specificity: lower is better.
fn match_class(cfg: &RegionConfig, machine: &MachineRecord) -> Option<u8> {
    if !cfg.setname.is_empty() && cfg.setname == machine.name {
        Some(0)
    } else if is_family(&cfg.machine, machine) {
        Some(1)
    } else if cfg.setname.is_empty() && cfg.machine.is_empty() {
        Some(2)
    } else {
        None
    }
}

/// Pick the region record that applies to `regname` on this machine:
/// exact setname beats family scope beats the unscoped default, and the
/// first record encountered wins within each class. When nothing matches,
/// a default record carrying only the region name is returned.
pub fn find_region_cfg(
    machine: &MachineRecord,
    regname: &str,
    cfg: &GlobalConfig,
) -> RegionConfig {
    let mut best: Option<(u8, &RegionConfig)> = None;
    for candidate in cfg.rom.regions.iter().filter(|r| r.name == regname) {
        if let Some(class) = match_class(candidate, machine) {
            match best {
                Some((held, _)) if held <= class => {}
                _ => best = Some((class, candidate)),
            }
        }
    }
    match best {
        Some((_, found)) => found.clone(),
        None => RegionConfig {
            name: regname.to_string(),
            ..Default::default()
        },
    }
}

/// The machine's ROM entries for this region, in MAME order, minus the
/// globally removed names. A non-empty `files` list replaces the
/// machine's own entries outright.
pub fn extract_region(
    reg_cfg: &RegionConfig,
    roms: &[MachineRom],
    remove: &[String],
) -> Vec<MachineRom> {
    if !reg_cfg.files.is_empty() {
        return reg_cfg
            .files
            .iter()
            .cloned()
            .map(|mut f| {
                f.region = reg_cfg.name.clone();
                f
            })
            .collect();
    }
    roms.iter()
        .filter(|r| r.region == reg_cfg.name && !remove.contains(&r.name))
        .cloned()
        .collect()
}

/// Per-name reverse override; falls back to the region-level flag.
pub fn get_reverse(reg_cfg: &RegionConfig, name: &str) -> bool {
    for overrule in &reg_cfg.overrules {
        if overrule.names.iter().any(|n| n == name) {
            return overrule.reverse;
        }
    }
    reg_cfg.reverse
}
