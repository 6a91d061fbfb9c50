//! Fractional bit-plane regions.
//!
//! A fractional region packs `frac.parts` physical ROMs into one logical
//! word, each ROM contributing `frac.bytes` lanes. When the set does not
//! carry a full complement (3bpp graphics on a 4-lane bus), ROMs are
//! duplicated to round the group up.

use super::{fill_upto, LayoutState};
use crate::common::{BuildError, BuildResult};
use crate::config::RegionConfig;
use crate::machine::MachineRom;
use crate::recipe::{Element, RecipeNode};

/// Round the ROM list up to a multiple of `parts` by re-inserting a copy
/// of the last ROM of every `step`-sized run.
fn round_up(roms: Vec<MachineRom>, parts: usize) -> Vec<MachineRom> {
    if roms.len() % parts == 0 {
        return roms;
    }
    let missing = parts - roms.len() % parts;
    let step = roms.len() / missing;
    let mut filled = Vec::with_capacity(roms.len() + missing);
    for k in 0..missing {
        filled.extend_from_slice(&roms[k * step..(k + 1) * step]);
        if let Some(last) = filled.last().cloned() {
            filled.push(last);
        }
    }
    filled
}

/// Emit a fractional region; advances the cursor past everything dumped.
pub fn make_frac(
    parent: &mut Element,
    reg_cfg: &RegionConfig,
    reg_roms: Vec<MachineRom>,
    state: &mut LayoutState,
) -> BuildResult<()> {
    let parts = reg_cfg.frac.parts;
    let bytes = reg_cfg.frac.bytes.max(1);
    let reg_roms = round_up(reg_roms, parts);

    let output_bytes = parts / bytes;
    if output_bytes % 2 != 0 {
        return Err(BuildError::layout(
            &reg_cfg.name,
            format!("frac output_bytes ({output_bytes}) is not a multiple of 2"),
        ));
    }

    let mut dumped = 0usize;
    let frac_groups = reg_roms.len() / parts;
    let mut ilv = 0usize;
    for (k, r) in reg_roms.iter().enumerate() {
        let cnt = k / parts;
        let lane = k % parts;
        if lane == 0 {
            if k != 0 && (reg_cfg.rom_len != 0 || reg_cfg.len != 0) {
                let mut exp_size = reg_cfg.rom_len * parts;
                if reg_cfg.len / frac_groups > exp_size {
                    exp_size = reg_cfg.len / frac_groups;
                }
                fill_upto(&mut dumped, (exp_size * cnt) as i64, parent);
            }
            let n = parent.add_element("interleave");
            n.add_attr("output", (output_bytes * 8).to_string());
            ilv = parent.child_count() - 1;
        }
        let mut part = Element::new("part");
        part.add_attr("name", r.name.clone());
        if let Some(crc) = &r.crc {
            if !crc.is_empty() {
                part.add_attr("crc", crc.clone());
            }
        }
        part.add_attr("map", make_frac_map(reg_cfg.reverse, bytes, output_bytes, lane));
        if let Some(n) = parent.child_element_mut(ilv) {
            n.push_node(RecipeNode::Element(part));
        }
        dumped += r.size;
    }
    state.pos += dumped;
    Ok(())
}

/// The map string for ROM `step` of a group: `bytes` ascending lane
/// digits starting at lane `step * bytes`, mirrored unless `reverse`.
fn make_frac_map(reverse: bool, bytes: usize, total: usize, step: usize) -> String {
    let mut map = vec![b'0'; total];
    let mut digit = b'1';
    let (mut j, js): (i64, i64) = if reverse {
        ((step * bytes) as i64, 1)
    } else {
        ((total - step * bytes - 1) as i64, -1)
    };
    for _ in 0..bytes {
        if j < 0 || j as usize >= total {
            break;
        }
        map[j as usize] = digit;
        digit += 1;
        j += js;
    }
    String::from_utf8(map).unwrap_or_default()
}
