//! The ROM layout engine.
//!
//! A machine's ROM is laid out in a single pass over its regions, in the
//! configured order. The engine maintains the byte cursor, emits recipe
//! nodes under the `rom index="0"` element and delegates each region to
//! exactly one emitter: singleton, interleave, fractional or straight.
//! Header synthesis and patches run once every region has been placed.

pub mod firmware;
pub mod frac;
pub mod header;
pub mod interleave;
pub mod resolve;
pub mod singleton;
pub mod sort;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use crate::common::{parse_int, BuildResult};
use crate::config::{GlobalConfig, RegionConfig, SplitConfig};
use crate::machine::{is_family, MachineRecord, MachineRom};
use crate::recipe::Element;

use firmware::FirmwareAssembler;
use sort::SortStrategy;

/// Engine inputs that do not come from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct LayoutArgs {
    /// Directory holding custom firmware sources (`<setname>.s`).
    pub firmware_dir: PathBuf,
    /// Core macros consulted for bank-boundary comments. Keys ending in
    /// `_START` whose value equals the cursor emit a comment.
    pub macros: BTreeMap<String, String>,
}

#[derive(Debug)]
struct RegionMark {
    child: usize,
    pos: usize,
}

/// Mutable state threaded by `&mut` through every emitter.
#[derive(Debug, Default)]
pub struct LayoutState {
    /// Virtual offset of the next byte of the assembled ROM. Never
    /// decreases.
    pub pos: usize,
    /// Start offset of every dumped region, for header back-patching.
    pub reg_offsets: HashMap<String, usize>,
    /// Recoverable diagnostics, in emission order.
    pub warnings: Vec<String>,
    last_region: Option<RegionMark>,
}

impl LayoutState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(message);
    }

    /// Append the emitted length to the open region comment.
    fn close_region(&mut self, rom: &mut Element) {
        if let Some(mark) = self.last_region.take() {
            let len = self.pos - mark.pos;
            if len > 0 {
                if let Some(text) = rom.comment_at_mut(mark.child) {
                    text.push_str(&format!(" - length 0x{len:X}"));
                }
            }
        }
    }
}

/// Extension point for device ROMs appended after the machine regions.
pub trait DevRomHook {
    /// Emit extra part nodes under `rom` and advance the cursor.
    fn emit(
        &self,
        rom: &mut Element,
        machine: &MachineRecord,
        cfg: &GlobalConfig,
        state: &mut LayoutState,
    );
}

/// Default hook: no device ROMs.
pub struct NoDevRom;

impl DevRomHook for NoDevRom {
    fn emit(&self, _: &mut Element, _: &MachineRecord, _: &GlobalConfig, _: &mut LayoutState) {}
}

/// A finished rom subtree plus the state that produced it.
#[derive(Debug)]
pub struct RomLayout {
    pub node: Element,
    pub state: LayoutState,
}

/// The central driver: iterates regions in configured order and emits
/// recipe nodes while maintaining the byte cursor.
pub struct LayoutEngine<'a> {
    machine: &'a MachineRecord,
    cfg: &'a GlobalConfig,
    args: &'a LayoutArgs,
    firmware: &'a dyn FirmwareAssembler,
    devrom: &'a dyn DevRomHook,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(
        machine: &'a MachineRecord,
        cfg: &'a GlobalConfig,
        args: &'a LayoutArgs,
        firmware: &'a dyn FirmwareAssembler,
        devrom: &'a dyn DevRomHook,
    ) -> Self {
        Self {
            machine,
            cfg,
            args,
            firmware,
            devrom,
        }
    }

    /// Lay out the machine's ROM. Returns `None` when the machine has no
    /// ROM entries at all.
    pub fn build(&self) -> BuildResult<Option<RomLayout>> {
        let machine = self.machine;
        let cfg = self.cfg;
        if machine.roms.is_empty() {
            return Ok(None);
        }
        log::debug!("laying out {}", machine.name);

        let mut rom = Element::new("rom");
        rom.add_attr("index", "0");
        let mut zipname = format!("{}.zip", machine.name);
        if !machine.cloneof.is_empty() {
            zipname.push('|');
            zipname.push_str(&machine.cloneof);
            zipname.push_str(".zip");
        }
        if !cfg.global.zip.alt.is_empty() {
            zipname.push('|');
            zipname.push_str(&cfg.global.zip.alt);
        }
        rom.add_attr("zip", zipname);
        rom.add_attr("md5", "None");
        if cfg.rom.ddr_load {
            rom.add_attr("address", "0x30000000");
        }

        // Configured order first, then regions the machine carries that
        // the configuration does not list, in first-seen order.
        let listed: HashSet<&str> = cfg.rom.order.iter().map(String::as_str).collect();
        let mut regions = cfg.rom.order.clone();
        let mut current = "";
        for r in &machine.roms {
            if current != r.region {
                current = &r.region;
                if !listed.contains(current) && !regions.iter().any(|x| x == current) {
                    regions.push(r.region.clone());
                }
            }
        }

        let header_slot = if cfg.header.len > 0 {
            rom.add_element("part").set_indented_text("");
            Some(rom.child_count() - 1)
        } else {
            None
        };

        let mut state = LayoutState::new();

        for reg in &regions {
            let reg_cfg = resolve::find_region_cfg(machine, reg, cfg);
            if reg_cfg.skip {
                continue;
            }
            if !listed.contains(reg.as_str()) {
                state.warn(format!(
                    "unlisted region for sorting {} in {}",
                    reg, machine.name
                ));
            }
            let reg_roms = resolve::extract_region(&reg_cfg, &machine.roms, &cfg.rom.remove);
            // Empty regions are not skipped: they may carry a minimum length.
            let nodump = reg_roms.iter().any(MachineRom::is_nodump);

            let delta = fill_upto(&mut state.pos, reg_cfg.start as i64, &mut rom);
            if delta < 0 {
                state.warn(format!(
                    "start offset overcome by 0x{:X} while parsing region {} in {}",
                    -delta, reg, machine.name
                ));
            }
            sdram_bank_comment(&mut rom, state.pos, &self.args.macros);
            state.close_region(&mut rom);
            let mark = rom.add_comment(format!("{} - starts at 0x{:X}", reg, state.pos));
            state.last_region = Some(RegionMark {
                child: mark,
                pos: state.pos,
            });
            let start_pos = state.pos;

            if nodump {
                if firmware::parse_custom(
                    &reg_cfg,
                    &mut rom,
                    machine,
                    &mut state,
                    self.args,
                    self.firmware,
                )? {
                    fill_upto(&mut state.pos, (start_pos + reg_cfg.len) as i64, &mut rom);
                } else {
                    rom.add_comment(format!(
                        "Skipping region {} because there is no dump known",
                        reg_cfg.name
                    ));
                }
                continue;
            }

            state.reg_offsets.insert(reg.clone(), state.pos);
            let strategy = SortStrategy::from_region(&reg_cfg)?;
            let reg_roms = strategy.apply(reg_roms, reg, &machine.name, &mut state);

            if reg_cfg.singleton {
                singleton::parse_singleton(&reg_roms, &reg_cfg, &mut rom, &mut state)?;
            } else {
                let split = split_for(reg, machine, cfg);
                if reg_cfg.width > 8 && reg_roms.len() > 1 {
                    interleave::parse_regular_interleave(
                        split.as_ref(),
                        reg,
                        &reg_roms,
                        &reg_cfg,
                        &mut rom,
                        machine,
                        cfg,
                        &mut state,
                    )?;
                } else if reg_cfg.frac.parts != 0 {
                    frac::make_frac(&mut rom, &reg_cfg, reg_roms, &mut state)?;
                } else {
                    parse_straight_dump(
                        split.as_ref(),
                        reg,
                        &reg_roms,
                        &reg_cfg,
                        &mut rom,
                        machine,
                        cfg,
                        &mut state,
                    );
                }
            }
            fill_upto(&mut state.pos, (start_pos + reg_cfg.len) as i64, &mut rom);
        }
        state.close_region(&mut rom);
        self.devrom.emit(&mut rom, machine, cfg, &mut state);
        rom.add_comment(format!(
            "Total 0x{:X} bytes - {} kBytes",
            state.pos,
            state.pos >> 10
        ));
        make_patches(&mut rom, machine, cfg);
        if let Some(slot) = header_slot {
            header::make_header(&mut rom, slot, &mut state, &cfg.header, machine)?;
        }
        Ok(Some(RomLayout { node: rom, state }))
    }
}

/// Pad the cursor up to `fillto` with a default-fill part node. Returns
/// the signed distance to the target; a negative result means the cursor
/// had already passed it (nothing is emitted; the cursor never rewinds).
pub(crate) fn fill_upto(pos: &mut usize, fillto: i64, parent: &mut Element) -> i64 {
    if fillto == 0 {
        return 0;
    }
    let delta = fillto - *pos as i64;
    if delta <= 0 {
        return delta;
    }
    let part = parent.add_element("part");
    part.set_text(" FF");
    part.add_attr("repeat", format!("0x{delta:X}"));
    *pos += delta as usize;
    delta
}

/// Append a `part` node carrying the ROM's name and CRC.
pub(crate) fn add_rom<'a>(parent: &'a mut Element, rom: &MachineRom) -> &'a mut Element {
    let n = parent.add_element("part");
    n.add_attr("name", rom.name.clone());
    if let Some(crc) = &rom.crc {
        if !crc.is_empty() {
            n.add_attr("crc", crc.clone());
        }
    }
    n
}

fn add_rom_straight<'a>(p: &'a mut Element, r: &MachineRom, reverse: bool) -> &'a mut Element {
    if reverse {
        let wrap = p.add_element("interleave");
        wrap.add_attr("output", "16");
        let m = add_rom(wrap, r);
        m.add_attr("map", "12");
        m
    } else {
        add_rom(p, r)
    }
}

/// Emit a width-8 region, or a wide region holding a single ROM.
#[allow(clippy::too_many_arguments)]
fn parse_straight_dump(
    split: Option<&SplitConfig>,
    reg: &str,
    reg_roms: &[MachineRom],
    reg_cfg: &RegionConfig,
    p: &mut Element,
    machine: &MachineRecord,
    cfg: &GlobalConfig,
    state: &mut LayoutState,
) {
    let mut reg_pos = 0usize;
    let start_pos = state.pos;
    for r in reg_roms {
        if !reg_cfg.no_offset {
            let offset = r.offset & !1usize;
            let target = state.pos as i64 + offset as i64 - reg_pos as i64;
            let delta = fill_upto(&mut state.pos, target, p);
            if delta < 0 {
                state.warn(format!(
                    "ROM start overcome at 0x{:X} (expected 0x{:X}) while parsing region {} ({})",
                    state.pos, target, reg_cfg.name, machine.name
                ));
            }
        }
        let rom_pos = state.pos;
        let half = r.size >> 1;
        let rel = state.pos - start_pos;
        let straddles = matches!(
            split,
            Some(s) if rel <= s.offset && rel + r.size > s.offset && s.min_len > half
        );
        let m = add_rom_straight(p, r, reg_cfg.reverse);
        if straddles {
            m.add_hex_attr("length", half);
        } else if reg_cfg.rom_len != 0 {
            m.add_hex_attr("length", reg_cfg.rom_len);
        }
        if let Some(s) = split.filter(|_| straddles) {
            log::info!("split on single ROM file at 0x{:X}", s.offset);
            state.pos += half;
            let target = (state.pos + s.min_len - half) as i64;
            fill_upto(&mut state.pos, target, p);
            let m2 = add_rom_straight(p, r, reg_cfg.reverse);
            m2.add_hex_attr("length", half);
            m2.add_hex_attr("offset", half);
            state.pos += half;
        } else {
            state.pos += r.size;
        }
        if reg_cfg.rom_len > r.size {
            fill_upto(&mut state.pos, (reg_cfg.rom_len + rom_pos) as i64, p);
        }
        reg_pos = state.pos - start_pos;
        let blank_len = is_blank(reg_pos, reg, machine, cfg);
        if blank_len > 0 {
            let target = (state.pos + blank_len) as i64;
            fill_upto(&mut state.pos, target, p);
            p.add_comment(format!("Blank ends at 0x{:X}", state.pos));
        }
        reg_pos = state.pos - start_pos;
    }
}

/// Length of the blank scheduled at this region-relative position, if any.
pub(crate) fn is_blank(
    curpos: usize,
    reg: &str,
    machine: &MachineRecord,
    cfg: &GlobalConfig,
) -> usize {
    let mut blank_len = 0;
    let mut offset = 0;
    for blank in &cfg.rom.blanks {
        if !blank.region.is_empty() && blank.region != reg {
            continue;
        }
        if (blank.machine.is_empty() && blank.setname.is_empty())
            || is_family(&blank.machine, machine)
            || blank.setname == machine.name
        {
            offset = blank.offset;
            blank_len = blank.len;
        }
    }
    if offset != 0 && offset == curpos {
        blank_len
    } else {
        0
    }
}

/// The split point configured for this region on this machine, if any.
fn split_for(reg: &str, machine: &MachineRecord, cfg: &GlobalConfig) -> Option<SplitConfig> {
    cfg.rom
        .splits
        .iter()
        .find(|s| {
            s.region == reg
                && s.offset != 0
                && ((s.machine.is_empty() && s.setname.is_empty())
                    || is_family(&s.machine, machine)
                    || s.setname == machine.name)
        })
        .cloned()
}

/// Append `patch` nodes scoped to this machine.
fn make_patches(root: &mut Element, machine: &MachineRecord, cfg: &GlobalConfig) {
    for patch in &cfg.rom.patches {
        if is_family(&patch.machine, machine)
            || patch.setname == machine.name
            || (patch.machine.is_empty() && patch.setname.is_empty())
        {
            let node = root.add_element("patch");
            node.set_text(patch.data.clone());
            node.add_hex_attr("offset", patch.offset);
        }
    }
}

/// Annotate bank boundaries: any macro named `*_START` whose value equals
/// the (non-zero) cursor gets a comment. Macros iterate in key order so
/// the output is deterministic.
fn sdram_bank_comment(root: &mut Element, pos: usize, macros: &BTreeMap<String, String>) {
    for (key, value) in macros {
        if !key.ends_with("_START") {
            continue;
        }
        if pos > 0 && parse_int(value) == pos {
            root.add_comment(key.clone());
        }
    }
}
