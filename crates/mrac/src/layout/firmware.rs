//! Custom firmware synthesis for undumped MCUs.
//!
//! Regions whose ROMs are all `nodump` can substitute a firmware binary
//! built from source. The external assembler is the only hard ABI, so it
//! sits behind the [`FirmwareAssembler`] trait and tests mock it.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{LayoutArgs, LayoutState};
use crate::common::{hexdump, BuildError, BuildResult};
use crate::config::RegionConfig;
use crate::machine::MachineRecord;
use crate::recipe::Element;

/// Assembles MCU firmware source into a raw binary.
pub trait FirmwareAssembler {
    fn assemble(&self, source: &Path) -> BuildResult<Vec<u8>>;
}

/// The `as31` 8051 assembler, invoked as a child process. The output
/// binary lands in a temporary directory consumed within this call.
pub struct As31Assembler;

impl FirmwareAssembler for As31Assembler {
    fn assemble(&self, source: &Path) -> BuildResult<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let bin = dir.path().join("firmware.bin");
        let status = Command::new("as31")
            .arg("-Fbin")
            .arg(format!("-O{}", bin.display()))
            .arg(source)
            .status()?;
        if !status.success() {
            return Err(BuildError::firmware(format!(
                "as31 exited with {status} for {}",
                source.display()
            )));
        }
        Ok(std::fs::read(&bin)?)
    }
}

/// Handle a `nodump` region with a `custom.dev` selector. Returns `Ok(true)`
/// when firmware was emitted; resource failures warn and return `Ok(false)`
/// so the region falls back to a skip comment. Unknown devices are fatal.
pub fn parse_custom(
    reg_cfg: &RegionConfig,
    p: &mut Element,
    machine: &MachineRecord,
    state: &mut LayoutState,
    args: &LayoutArgs,
    assembler: &dyn FirmwareAssembler,
) -> BuildResult<bool> {
    if reg_cfg.custom.dev.is_empty() {
        return Ok(false);
    }
    match reg_cfg.custom.dev.as_str() {
        "i8751" => Ok(parse_i8751(p, machine, state, args, assembler)),
        dev => Err(BuildError::config(format!("unsupported custom.dev={dev}"))),
    }
}

/// Locate `<firmware_dir>/<setname>.s` (falling back to the parent set),
/// assemble it and embed the binary as an indented hex dump.
fn parse_i8751(
    p: &mut Element,
    machine: &MachineRecord,
    state: &mut LayoutState,
    args: &LayoutArgs,
    assembler: &dyn FirmwareAssembler,
) -> bool {
    let Some(path) = find_source(&args.firmware_dir, machine) else {
        state.warn(format!("cannot find custom firmware for {}", machine.name));
        return false;
    };
    let bin = match assembler.assemble(&path) {
        Ok(bin) => bin,
        Err(e) => {
            state.warn(format!("problem assembling {}: {e}", path.display()));
            return false;
        }
    };
    state.pos += bin.len();
    p.add_comment("Using custom firmware (no known dump)");
    p.add_element("part").set_indented_text(hexdump(&bin, 16));
    true
}

fn find_source(firmware_dir: &Path, machine: &MachineRecord) -> Option<PathBuf> {
    let own = firmware_dir.join(format!("{}.s", machine.name));
    if own.is_file() {
        return Some(own);
    }
    if machine.cloneof.is_empty() {
        return None;
    }
    let parent = firmware_dir.join(format!("{}.s", machine.cloneof));
    parent.is_file().then_some(parent)
}
