//! Per-core build orchestration.
//!
//! For every machine in the inventory the driver runs the layout engine,
//! wraps the rom subtree in the outer MRA document, writes the `.mra`
//! file and, when requested, executes the recipe into a `.rom` binary.

use std::path::PathBuf;

use crate::assemble::RomAssembler;
use crate::common::BuildResult;
use crate::config::GlobalConfig;
use crate::layout::{
    firmware::As31Assembler, DevRomHook, LayoutArgs, LayoutEngine, NoDevRom, RomLayout,
};
use crate::machine::{MachineRecord, MachineSet};
use crate::recipe::{writer, Element, RecipeNode};

pub struct BuildOptions {
    /// Output directory for `.mra` files.
    pub mra_dir: PathBuf,
    /// When set, the recipe is also executed into `<rom_dir>/<set>.rom`.
    pub rom_dir: Option<PathBuf>,
    /// Directory searched for MAME zip archives.
    pub zip_dir: PathBuf,
    /// Core (RBF) name recorded in the MRA.
    pub rbf: String,
    pub layout: LayoutArgs,
}

/// Build every machine of the inventory against one core configuration.
pub fn run_core(cfg: &GlobalConfig, machines: &MachineSet, opts: &BuildOptions) -> BuildResult<()> {
    std::fs::create_dir_all(&opts.mra_dir)?;
    if let Some(rom_dir) = &opts.rom_dir {
        std::fs::create_dir_all(rom_dir)?;
    }
    let assembler = As31Assembler;
    let hook = NoDevRom;
    for machine in &machines.machines {
        let engine = LayoutEngine::new(machine, cfg, &opts.layout, &assembler, &hook);
        let Some(layout) = engine.build()? else {
            log::warn!("{} has no ROM entries, skipping", machine.name);
            continue;
        };
        write_outputs(machine, layout, opts)?;
    }
    Ok(())
}

/// Single-machine variant used by callers that manage their own hooks.
pub fn run_machine(
    cfg: &GlobalConfig,
    machine: &MachineRecord,
    opts: &BuildOptions,
    devrom: &dyn DevRomHook,
) -> BuildResult<bool> {
    let assembler = As31Assembler;
    let engine = LayoutEngine::new(machine, cfg, &opts.layout, &assembler, devrom);
    match engine.build()? {
        Some(layout) => {
            write_outputs(machine, layout, opts)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn write_outputs(
    machine: &MachineRecord,
    layout: RomLayout,
    opts: &BuildOptions,
) -> BuildResult<()> {
    if let Some(rom_dir) = &opts.rom_dir {
        let candidates: Vec<PathBuf> = layout
            .node
            .attr("zip")
            .unwrap_or("")
            .split('|')
            .filter(|z| !z.is_empty())
            .map(|z| opts.zip_dir.join(z))
            .collect();
        let mut assembler = RomAssembler::open(&candidates);
        let out_path = rom_dir.join(format!("{}.rom", machine.name));
        let written = assembler.write_rom(&layout.node, &out_path)?;
        if written != layout.state.pos {
            log::warn!(
                "{}: assembled 0x{:X} bytes, layout expected 0x{:X}",
                machine.name,
                written,
                layout.state.pos
            );
        } else {
            log::info!("wrote {}", out_path.display());
        }
    }
    let doc = make_document(machine, &opts.rbf, layout.node);
    let mra_path = opts.mra_dir.join(format!("{}.mra", machine.name));
    std::fs::write(&mra_path, writer::write_document(&doc))?;
    log::info!("wrote {}", mra_path.display());
    Ok(())
}

/// The outer MRA document around the rom subtree.
fn make_document(machine: &MachineRecord, rbf: &str, rom: Element) -> Element {
    let mut doc = Element::new("misterromdescription");
    let display_name = if machine.description.is_empty() {
        &machine.name
    } else {
        &machine.description
    };
    doc.add_element("name").set_text(display_name.clone());
    doc.add_element("setname").set_text(machine.name.clone());
    doc.add_element("rbf").set_text(rbf.to_string());
    doc.push_node(RecipeNode::Element(rom));
    doc
}
