//! Singleton regions: one narrow ROM replicated across the lanes of a
//! wide bus. Each source file is interleaved with itself, every lane
//! reading an equal slice of it.

use super::{add_rom, LayoutState};
use crate::common::{BuildError, BuildResult};
use crate::config::RegionConfig;
use crate::machine::MachineRom;
use crate::recipe::Element;

pub fn parse_singleton(
    reg_roms: &[MachineRom],
    reg_cfg: &RegionConfig,
    p: &mut Element,
    state: &mut LayoutState,
) -> BuildResult<()> {
    if reg_cfg.width != 16 && reg_cfg.width != 32 {
        return Err(BuildError::config(format!(
            "region {}: singleton only supported for width 16 and 32",
            reg_cfg.name
        )));
    }
    p.add_comment("Singleton region. The files are merged with themselves.");
    let divider = reg_cfg.width >> 3;
    let msb = divider - 1;
    for r in reg_roms {
        let n = p.add_element("interleave");
        n.add_attr("output", reg_cfg.width.to_string());
        let mut lane_bit: usize = if reg_cfg.reverse { 1 << msb } else { 1 };
        for k in 0..divider {
            let m = add_rom(n, r);
            m.add_attr("offset", format!("0x{:04x}", r.size / divider * k));
            m.add_attr("map", format!("{:0width$b}", lane_bit, width = divider));
            m.add_attr("length", format!("0x{:04X}", r.size / divider));
            if reg_cfg.reverse {
                lane_bit >>= 1;
            } else {
                lane_bit <<= 1;
            }
        }
        state.pos += r.size;
    }
    Ok(())
}
