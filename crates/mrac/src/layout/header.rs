//! Header synthesis with back-patched region offsets.
//!
//! The header is a fixed-length buffer pre-filled with a default byte,
//! overlaid in order by the encoded region start offsets, the manual byte
//! spans, and the device-conditional bytes, then hex-dumped into the part
//! node reserved at the top of the rom.

use super::LayoutState;
use crate::common::{hexdump, parse_hex_stream, BuildError, BuildResult};
use crate::config::HeaderConfig;
use crate::machine::{is_family, MachineRecord};
use crate::recipe::Element;

/// Encode `offset >> bits` as a 16-bit big-endian value at `pos`,
/// byte-swapped when `reverse`.
fn set_header_offset(headbytes: &mut [u8], pos: usize, reverse: bool, bits: u32, offset: usize) {
    if pos + 1 >= headbytes.len() {
        return;
    }
    let offset = offset >> bits;
    headbytes[pos] = ((offset >> 8) & 0xff) as u8;
    headbytes[pos + 1] = (offset & 0xff) as u8;
    if reverse {
        headbytes.swap(pos, pos + 1);
    }
}

/// Fill the header part reserved at child `slot` of `rom`.
pub fn make_header(
    rom: &mut Element,
    slot: usize,
    state: &mut LayoutState,
    hcfg: &HeaderConfig,
    machine: &MachineRecord,
) -> BuildResult<()> {
    let mut headbytes = vec![hcfg.fill; hcfg.len];

    // Region start offsets, two bytes each
    let mut unknown = Vec::new();
    if !hcfg.offset.regions.is_empty() {
        let mut pos = hcfg.offset.start;
        for region in &hcfg.offset.regions {
            let offset = match state.reg_offsets.get(region) {
                Some(o) => *o,
                None => {
                    unknown.push(region.clone());
                    0
                }
            };
            set_header_offset(
                &mut headbytes,
                pos,
                hcfg.offset.reverse,
                hcfg.offset.bits,
                offset,
            );
            pos += 2;
        }
    }
    if !unknown.is_empty() {
        state.warn(format!(
            "missing region(s) {}. Offset set to zero in the header ({})",
            unknown.join(" "),
            machine.name
        ));
    }

    // Manual byte spans. Spans running past the buffer are truncated.
    for entry in &hcfg.data {
        if (!entry.machine.is_empty() && !is_family(&entry.machine, machine))
            || (!entry.setname.is_empty() && entry.setname != machine.name)
        {
            continue;
        }
        let raw = parse_hex_stream(&entry.data);
        if entry.pointer < headbytes.len() {
            let end = (entry.pointer + raw.len()).min(headbytes.len());
            headbytes[entry.pointer..end].copy_from_slice(&raw[..end - entry.pointer]);
        }
    }

    // Device-conditional bytes
    for dev in &hcfg.dev {
        if machine.devices.iter().any(|name| name == &dev.dev) {
            if dev.byte >= headbytes.len() {
                return Err(BuildError::config(
                    "header device-byte falls outside the header",
                ));
            }
            headbytes[dev.byte] = dev.value;
        }
    }

    if let Some(part) = rom.child_element_mut(slot) {
        part.set_indented_text(hexdump(&headbytes, 8));
    }
    Ok(())
}
