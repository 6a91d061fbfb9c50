//! Interleave planning for 16- and 32-bit regions.
//!
//! ROMs that load at neighbouring MAME offsets are merged into one
//! logical word per interleave node. The word length of each source is
//! derived from the offset parities within its group; the `map` strings
//! rotate the active lanes across the group's parts.

use super::{fill_upto, is_blank, resolve::get_reverse, LayoutState};
use crate::common::{BuildError, BuildResult};
use crate::config::{GlobalConfig, RegionConfig, SplitConfig};
use crate::machine::{MachineRecord, MachineRom};
use crate::recipe::{Element, RecipeNode};

/// A run of adjacent ROM entries forming one interleave candidate.
/// `count == 1` marks an isolated entry that is emitted as a plain part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterleaveGroup {
    /// Index of the first entry in the sorted region list.
    pub start: usize,
    pub count: usize,
    /// Bytes each entry contributes per word.
    pub wlen: usize,
}

/// Group adjacent entries whose offsets share the same high bits
/// (`offset & !0xF`) and derive the word length from the offset parities
/// inside each group.
pub fn group_by_offset(roms: &[MachineRom]) -> Vec<InterleaveGroup> {
    let mut groups = Vec::new();
    let mut k = 0;
    while k < roms.len() {
        let kmin = k;
        let mut kmax = kmin;
        let mut wlen = 8usize;
        for j in kmin..roms.len() {
            if (roms[kmin].offset & !0xf) != (roms[j].offset & !0xf) {
                break;
            }
            if roms[j].offset & 1 != 0 {
                wlen = 1;
            }
            if wlen > 1 && roms[j].offset & 2 != 0 {
                wlen = 2;
            }
            if wlen > 2 && roms[j].offset & 4 != 0 {
                wlen = 4;
            }
            kmax = j;
        }
        groups.push(InterleaveGroup {
            start: kmin,
            count: kmax - kmin + 1,
            wlen,
        });
        k = kmax + 1;
    }
    groups
}

/// The initial map string for a group: digits `wlen..1` right-aligned in
/// a field of `width_bytes` zeros. Rotating the first `wlen` characters
/// to the end advances the active lanes for the next part.
fn initial_map(wlen: usize, width_bytes: usize) -> String {
    let mut map = String::new();
    for j in (1..=wlen).rev() {
        map.push_str(&j.to_string());
    }
    while map.len() < width_bytes {
        map.insert(0, '0');
    }
    map
}

fn rotate_map(map: &str, wlen: usize) -> String {
    format!("{}{}", &map[wlen..], &map[..wlen])
}

/// Emit a width-16/32 region with more than one ROM.
#[allow(clippy::too_many_arguments)]
pub fn parse_regular_interleave(
    split: Option<&SplitConfig>,
    reg: &str,
    reg_roms: &[MachineRom],
    reg_cfg: &RegionConfig,
    p: &mut Element,
    machine: &MachineRecord,
    cfg: &GlobalConfig,
    state: &mut LayoutState,
) -> BuildResult<()> {
    let start_pos = state.pos;
    let width_bytes = reg_cfg.width / 8;
    log::debug!("regular interleave for {} ({})", reg_cfg.name, machine.name);

    // Word length per entry; `None` marks isolated entries.
    let mut wlens: Vec<Option<usize>> = vec![None; reg_roms.len()];
    if !reg_cfg.no_offset {
        for group in group_by_offset(reg_roms) {
            if group.count == 1 {
                continue;
            }
            if group.count * group.wlen != width_bytes {
                let names: Vec<&str> = reg_roms[group.start..group.start + group.count]
                    .iter()
                    .map(|r| r.name.as_str())
                    .collect();
                return Err(BuildError::layout(
                    &reg_cfg.name,
                    format!(
                        "the number of ROMs for the {}-bit region is not even in {}; using ROMs: {}",
                        reg_cfg.width,
                        machine.name,
                        names.join(", ")
                    ),
                ));
            }
            for slot in wlens.iter_mut().skip(group.start).take(group.count) {
                *slot = Some(group.wlen);
            }
        }
    } else {
        // Without offsets the whole list is one byte-wide stream.
        if reg_roms.len() % width_bytes != 0 {
            return Err(BuildError::layout(
                &reg_cfg.name,
                format!(
                    "the number of ROMs for the {}-bit region is not even in {}",
                    reg_cfg.width, machine.name
                ),
            ));
        }
        for slot in wlens.iter_mut() {
            *slot = Some(1);
        }
    }

    let phases = if split.is_some() { 2 } else { 1 };
    let mut deficit = 0usize;
    for phase in 0..phases {
        if phase == 1 {
            p.add_comment(format!(
                "ROM split at {:X} ({:X})",
                state.pos,
                state.pos - start_pos
            ));
        }
        let chunk0 = state.pos;
        let mut k = 0;
        while k < reg_roms.len() {
            let rom_cnt = match wlens[k] {
                Some(wlen) => {
                    // A ROM shorter than rom_len leaves a deficit that is
                    // filled right before the next interleave.
                    if deficit > 0 {
                        let target = (state.pos + deficit) as i64;
                        fill_upto(&mut state.pos, target, p);
                    }
                    let reg_pos = state.pos - start_pos;
                    let offset = if reg_cfg.no_offset {
                        0
                    } else {
                        reg_roms[k].offset
                    };
                    let target = state.pos as i64 + (offset & !1usize) as i64 - reg_pos as i64;
                    fill_upto(&mut state.pos, target, p);
                    deficit = 0;

                    let ilv = {
                        let n = p.add_element("interleave");
                        n.add_attr("output", reg_cfg.width.to_string());
                        p.child_count() - 1
                    };
                    let rom_cnt = width_bytes / wlen;
                    let mut map = initial_map(wlen, width_bytes);
                    let order: Vec<usize> = if reg_cfg.reverse {
                        (k..k + rom_cnt).rev().collect()
                    } else {
                        (k..k + rom_cnt).collect()
                    };
                    for j in order {
                        let r = &reg_roms[j];
                        log::debug!("parsing {} ({}-byte words, map {})", r.name, wlen, map);
                        let mut part = Element::new("part");
                        part.add_attr("name", r.name.clone());
                        if let Some(crc) = &r.crc {
                            if !crc.is_empty() {
                                part.add_attr("crc", crc.clone());
                            }
                        }
                        part.add_attr("map", map.clone());
                        map = rotate_map(&map, wlen);
                        advance(&mut part, r, split, phase, reg_cfg, state, &mut deficit);
                        if let Some(n) = p.child_element_mut(ilv) {
                            n.push_node(RecipeNode::Element(part));
                        }
                        check_blank(reg, start_pos, machine, cfg, state, p);
                    }
                    rom_cnt
                }
                None => {
                    // Isolated entry: plain part, no map, no padding.
                    let r = &reg_roms[k];
                    let wrap = reg_cfg.reverse && get_reverse(reg_cfg, &r.name);
                    let target = if wrap {
                        let n = p.add_element("interleave");
                        n.add_attr("output", "16");
                        Some(p.child_count() - 1)
                    } else {
                        None
                    };
                    let mut part = Element::new("part");
                    part.add_attr("name", r.name.clone());
                    if let Some(crc) = &r.crc {
                        if !crc.is_empty() {
                            part.add_attr("crc", crc.clone());
                        }
                    }
                    if wrap {
                        part.add_attr("map", "12");
                    }
                    advance(&mut part, r, split, phase, reg_cfg, state, &mut deficit);
                    match target {
                        Some(idx) => {
                            if let Some(n) = p.child_element_mut(idx) {
                                n.push_node(RecipeNode::Element(part));
                            }
                        }
                        None => p.push_node(RecipeNode::Element(part)),
                    }
                    check_blank(reg, start_pos, machine, cfg, state, p);
                    1
                }
            };
            k += rom_cnt;
        }
        if let Some(s) = split {
            if state.pos - chunk0 < s.min_len {
                fill_upto(&mut state.pos, (chunk0 + s.min_len) as i64, p);
            }
        }
    }
    Ok(())
}

/// Advance the cursor past one part, adding split length/offset
/// attributes or accumulating the rom_len deficit.
fn advance(
    part: &mut Element,
    r: &MachineRom,
    split: Option<&SplitConfig>,
    phase: usize,
    reg_cfg: &RegionConfig,
    state: &mut LayoutState,
    deficit: &mut usize,
) {
    if split.is_some() {
        part.add_hex_attr("length", r.size / 2);
        if phase == 1 {
            part.add_hex_attr("offset", r.size / 2);
        }
        state.pos += r.size / 2;
    } else {
        state.pos += r.size;
        if reg_cfg.rom_len > r.size {
            *deficit += reg_cfg.rom_len - r.size;
        }
    }
}

fn check_blank(
    reg: &str,
    start_pos: usize,
    machine: &MachineRecord,
    cfg: &GlobalConfig,
    state: &mut LayoutState,
    p: &mut Element,
) {
    let reg_pos = state.pos - start_pos;
    let blank_len = is_blank(reg_pos, reg, machine, cfg);
    if blank_len > 0 {
        let target = (state.pos + blank_len) as i64;
        fill_upto(&mut state.pos, target, p);
        p.add_comment(format!("Blank ends at 0x{:X}", state.pos));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom(name: &str, size: usize, offset: usize) -> MachineRom {
        MachineRom {
            name: name.into(),
            crc: Some(format!("{:08x}", size ^ offset)),
            size,
            offset,
            region: "maincpu".into(),
            ..Default::default()
        }
    }

    #[test]
    fn group_detects_byte_pairs() {
        let roms = vec![rom("hi", 0x1000, 0), rom("lo", 0x1000, 1)];
        let groups = group_by_offset(&roms);
        assert_eq!(
            groups,
            vec![InterleaveGroup {
                start: 0,
                count: 2,
                wlen: 1
            }]
        );
    }

    #[test]
    fn group_detects_word_pairs() {
        // offsets 0 and 2: each ROM holds a 16-bit word of a 32-bit bus
        let roms = vec![rom("a", 0x1000, 0), rom("b", 0x1000, 2)];
        let groups = group_by_offset(&roms);
        assert_eq!(groups[0].wlen, 2);
        assert_eq!(groups[0].count, 2);
    }

    #[test]
    fn group_splits_on_high_bits() {
        let roms = vec![
            rom("a", 0x1000, 0x00),
            rom("b", 0x1000, 0x01),
            rom("c", 0x1000, 0x10000),
            rom("d", 0x1000, 0x10001),
        ];
        let groups = group_by_offset(&roms);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], InterleaveGroup { start: 0, count: 2, wlen: 1 });
        assert_eq!(groups[1], InterleaveGroup { start: 2, count: 2, wlen: 1 });
    }

    #[test]
    fn group_isolated_entry_stands_alone() {
        let roms = vec![rom("solo", 0x1000, 0x20)];
        let groups = group_by_offset(&roms);
        assert_eq!(groups[0].count, 1);
        assert_eq!(groups[0].wlen, 8);
    }

    #[test]
    fn initial_map_pads_with_zeros() {
        assert_eq!(initial_map(1, 2), "01");
        assert_eq!(initial_map(2, 4), "0021");
        assert_eq!(initial_map(1, 4), "0001");
    }

    #[test]
    fn rotate_map_moves_active_lanes() {
        assert_eq!(rotate_map("01", 1), "10");
        assert_eq!(rotate_map("0021", 2), "2100");
    }

    fn run(
        roms: &[MachineRom],
        reg_cfg: &RegionConfig,
        machine: &MachineRecord,
        cfg: &GlobalConfig,
    ) -> (Element, LayoutState) {
        let mut p = Element::new("rom");
        let mut state = LayoutState::new();
        parse_regular_interleave(None, "maincpu", roms, reg_cfg, &mut p, machine, cfg, &mut state)
            .expect("interleave");
        (p, state)
    }

    #[test]
    fn sixteen_bit_reverse_pair() {
        // two byte-planes of a 16-bit bus, low byte listed second
        let roms = vec![rom("hi.bin", 0x10000, 0), rom("lo.bin", 0x10000, 1)];
        let reg_cfg = RegionConfig {
            name: "maincpu".into(),
            width: 16,
            reverse: true,
            ..Default::default()
        };
        let machine = MachineRecord::default();
        let cfg = GlobalConfig::default();
        let (p, state) = run(&roms, &reg_cfg, &machine, &cfg);

        assert_eq!(state.pos, 0x20000);
        let ilv = p.elements().next().expect("interleave node");
        assert_eq!(ilv.name(), "interleave");
        assert_eq!(ilv.attr("output"), Some("16"));
        let parts: Vec<(&str, &str)> = ilv
            .elements()
            .map(|e| (e.attr("name").unwrap_or(""), e.attr("map").unwrap_or("")))
            .collect();
        assert_eq!(parts, vec![("lo.bin", "01"), ("hi.bin", "10")]);
    }

    #[test]
    fn forward_pair_keeps_list_order() {
        let roms = vec![rom("even.bin", 0x8000, 0), rom("odd.bin", 0x8000, 1)];
        let reg_cfg = RegionConfig {
            name: "maincpu".into(),
            width: 16,
            ..Default::default()
        };
        let machine = MachineRecord::default();
        let cfg = GlobalConfig::default();
        let (p, state) = run(&roms, &reg_cfg, &machine, &cfg);

        assert_eq!(state.pos, 0x10000);
        let ilv = p.elements().next().expect("interleave node");
        let parts: Vec<(&str, &str)> = ilv
            .elements()
            .map(|e| (e.attr("name").unwrap_or(""), e.attr("map").unwrap_or("")))
            .collect();
        assert_eq!(parts, vec![("even.bin", "01"), ("odd.bin", "10")]);
    }

    #[test]
    fn group_size_mismatch_is_fatal() {
        // three ROMs inside one 16-byte offset window cannot fill 16 bits
        let roms = vec![
            rom("a", 0x1000, 0),
            rom("b", 0x1000, 1),
            rom("c", 0x1000, 3),
        ];
        let reg_cfg = RegionConfig {
            name: "maincpu".into(),
            width: 16,
            ..Default::default()
        };
        let machine = MachineRecord::default();
        let cfg = GlobalConfig::default();
        let mut p = Element::new("rom");
        let mut state = LayoutState::new();
        let err = parse_regular_interleave(
            None, "maincpu", &roms, &reg_cfg, &mut p, &machine, &cfg, &mut state,
        );
        assert!(err.is_err());
    }

    #[test]
    fn no_offset_requires_divisible_count() {
        let roms = vec![
            rom("a", 0x1000, 0),
            rom("b", 0x1000, 0),
            rom("c", 0x1000, 0),
        ];
        let reg_cfg = RegionConfig {
            name: "maincpu".into(),
            width: 16,
            no_offset: true,
            ..Default::default()
        };
        let machine = MachineRecord::default();
        let cfg = GlobalConfig::default();
        let mut p = Element::new("rom");
        let mut state = LayoutState::new();
        let err = parse_regular_interleave(
            None, "maincpu", &roms, &reg_cfg, &mut p, &machine, &cfg, &mut state,
        );
        assert!(err.is_err());
    }

    #[test]
    fn no_offset_chunks_into_word_groups() {
        let roms = vec![
            rom("a", 0x1000, 0),
            rom("b", 0x1000, 0),
            rom("c", 0x1000, 0),
            rom("d", 0x1000, 0),
        ];
        let reg_cfg = RegionConfig {
            name: "maincpu".into(),
            width: 16,
            no_offset: true,
            ..Default::default()
        };
        let machine = MachineRecord::default();
        let cfg = GlobalConfig::default();
        let (p, state) = run(&roms, &reg_cfg, &machine, &cfg);

        assert_eq!(state.pos, 0x4000);
        let interleaves: Vec<&Element> = p.elements().collect();
        assert_eq!(interleaves.len(), 2);
        assert_eq!(interleaves[0].elements().count(), 2);
        assert_eq!(interleaves[1].elements().count(), 2);
    }

    #[test]
    fn deficit_is_filled_before_next_group() {
        // first pair is shorter than rom_len, so a fill lands before the
        // second interleave
        let roms = vec![
            rom("a", 0x800, 0x00),
            rom("b", 0x800, 0x01),
            rom("c", 0x1000, 0x2000),
            rom("d", 0x1000, 0x2001),
        ];
        let reg_cfg = RegionConfig {
            name: "maincpu".into(),
            width: 16,
            rom_len: 0x1000,
            no_offset: false,
            ..Default::default()
        };
        let machine = MachineRecord::default();
        let cfg = GlobalConfig::default();

        let mut p = Element::new("rom");
        let mut state = LayoutState::new();
        parse_regular_interleave(
            None, "maincpu", &roms, &reg_cfg, &mut p, &machine, &cfg, &mut state,
        )
        .expect("interleave");

        // children: interleave, fill part, interleave
        let kinds: Vec<&str> = p
            .children()
            .iter()
            .filter_map(|c| match c {
                RecipeNode::Element(e) => Some(e.name()),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec!["interleave", "part", "interleave"]);
        assert_eq!(state.pos, 0x800 * 2 + 0x1000 + 0x1000 * 2);
    }

    #[test]
    fn split_runs_two_phases() {
        let roms = vec![rom("hi.bin", 0x10000, 0), rom("lo.bin", 0x10000, 1)];
        let reg_cfg = RegionConfig {
            name: "maincpu".into(),
            width: 16,
            ..Default::default()
        };
        let split = SplitConfig {
            region: "maincpu".into(),
            offset: 0x10000,
            min_len: 0x10000,
            ..Default::default()
        };
        let machine = MachineRecord::default();
        let cfg = GlobalConfig::default();
        let mut p = Element::new("rom");
        let mut state = LayoutState::new();
        parse_regular_interleave(
            Some(&split), "maincpu", &roms, &reg_cfg, &mut p, &machine, &cfg, &mut state,
        )
        .expect("interleave");

        assert_eq!(state.pos, 0x20000);
        let interleaves: Vec<&Element> = p.elements().collect();
        assert_eq!(interleaves.len(), 2);
        // first phase: halves without offset
        let first = interleaves[0].elements().next().expect("part");
        assert_eq!(first.attr("length"), Some("0x8000"));
        assert_eq!(first.attr("offset"), None);
        // second phase: halves at offset size/2
        let second = interleaves[1].elements().next().expect("part");
        assert_eq!(second.attr("length"), Some("0x8000"));
        assert_eq!(second.attr("offset"), Some("0x8000"));
        // the phase boundary is annotated
        assert!(p.children().iter().any(|c| matches!(
            c,
            RecipeNode::Comment(t) if t.starts_with("ROM split at")
        )));
    }
}
