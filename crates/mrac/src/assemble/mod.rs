//! Recipe execution: producing the flat ROM binary.
//!
//! The executor walks the direct `part` children of a finished rom node.
//! Named parts are located inside the candidate zip archives by CRC-32
//! and sliced by `offset`/`length`; nameless parts carry a hex byte
//! stream repeated `repeat` times. Missing files warn and are skipped.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::common::{parse_hex_stream, parse_int, BuildResult};
use crate::recipe::{Element, RecipeNode};

pub struct RomAssembler {
    zips: Vec<ZipArchive<File>>,
}

impl RomAssembler {
    /// Open whichever of the candidate archives exist. Absent candidates
    /// are normal (clone parents, alternates) and only logged.
    pub fn open(candidates: &[PathBuf]) -> Self {
        let mut zips = Vec::new();
        for path in candidates {
            if !path.is_file() {
                log::debug!("zip candidate {} not present", path.display());
                continue;
            }
            let archive = File::open(path)
                .map_err(zip::result::ZipError::from)
                .and_then(ZipArchive::new);
            match archive {
                Ok(z) => zips.push(z),
                Err(e) => log::warn!("cannot open zip {}: {e}", path.display()),
            }
        }
        Self { zips }
    }

    /// Execute the recipe and return the flat byte stream.
    pub fn run(&mut self, rom: &Element) -> Vec<u8> {
        let mut out = Vec::new();
        for child in rom.children() {
            let RecipeNode::Element(part) = child else {
                continue;
            };
            if part.name() != "part" {
                continue;
            }
            match part.attr("name") {
                None => {
                    let data = parse_hex_stream(part.text().unwrap_or(""));
                    let repeat = part.attr("repeat").map_or(1, parse_int).max(1);
                    for _ in 0..repeat {
                        out.extend_from_slice(&data);
                    }
                }
                Some(name) => match self.read_rom(part) {
                    Some(bytes) => out.extend_from_slice(&bytes),
                    None => log::warn!(
                        "cannot find file {} ({}) in zip",
                        name,
                        part.attr("crc").unwrap_or("")
                    ),
                },
            }
        }
        out
    }

    /// Execute the recipe and write the binary to `out_path`. Returns the
    /// byte count written.
    pub fn write_rom(&mut self, rom: &Element, out_path: &Path) -> BuildResult<usize> {
        let bytes = self.run(rom);
        std::fs::write(out_path, &bytes)?;
        Ok(bytes.len())
    }

    fn read_rom(&mut self, part: &Element) -> Option<Vec<u8>> {
        let crc = part.attr("crc")?.to_lowercase();
        for archive in &mut self.zips {
            for index in 0..archive.len() {
                let Ok(mut file) = archive.by_index(index) else {
                    continue;
                };
                if format!("{:08x}", file.crc32()) != crc {
                    continue;
                }
                let mut data = Vec::with_capacity(file.size() as usize);
                if file.read_to_end(&mut data).is_err() {
                    return None;
                }
                let offset = part.attr("offset").map_or(0, parse_int);
                let length = part.attr("length").map_or(0, parse_int);
                let end = if length == 0 {
                    data.len()
                } else {
                    (offset + length).min(data.len())
                };
                let start = offset.min(end);
                return Some(data[start..end].to_vec());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    /// Write a stored (uncompressed) zip holding the given files.
    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).expect("create zip");
        let mut writer = zip::ZipWriter::new(file);
        let options =
            FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in files {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(data).expect("write data");
        }
        writer.finish().expect("finish zip");
    }

    /// CRC strings as the archive stores them, keyed by entry name.
    fn zip_crcs(path: &Path) -> Vec<(String, String)> {
        let mut archive = ZipArchive::new(File::open(path).expect("open")).expect("archive");
        (0..archive.len())
            .map(|i| {
                let f = archive.by_index(i).expect("entry");
                (f.name().to_string(), format!("{:08x}", f.crc32()))
            })
            .collect()
    }

    #[test]
    fn named_parts_resolve_by_crc() {
        let dir = tempfile::tempdir().expect("tempdir");
        let zip_path = dir.path().join("game.zip");
        write_zip(&zip_path, &[("a.bin", b"123456789"), ("b.bin", &[0xAB; 4])]);
        let crcs = zip_crcs(&zip_path);

        let mut rom = Element::new("rom");
        // emit b.bin before a.bin to prove lookup is by CRC, not order
        for want in ["b.bin", "a.bin"] {
            let crc = &crcs.iter().find(|(n, _)| n == want).expect("crc").1;
            let part = rom.add_element("part");
            part.add_attr("name", want).add_attr("crc", crc.clone());
        }

        let mut assembler = RomAssembler::open(&[zip_path]);
        let out = assembler.run(&rom);
        let mut expected = vec![0xAB; 4];
        expected.extend_from_slice(b"123456789");
        assert_eq!(out, expected);
    }

    #[test]
    fn well_known_crc_is_stored() {
        // CRC32("123456789") = cbf43926; pins the zip layer's CRC flavor
        let dir = tempfile::tempdir().expect("tempdir");
        let zip_path = dir.path().join("game.zip");
        write_zip(&zip_path, &[("a.bin", b"123456789")]);
        assert_eq!(zip_crcs(&zip_path)[0].1, "cbf43926");
    }

    #[test]
    fn offset_and_length_slice_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let zip_path = dir.path().join("game.zip");
        let data: Vec<u8> = (0..16).collect();
        write_zip(&zip_path, &[("a.bin", &data)]);
        let crc = zip_crcs(&zip_path)[0].1.clone();

        let mut rom = Element::new("rom");
        {
            let part = rom.add_element("part");
            part.add_attr("name", "a.bin")
                .add_attr("crc", crc.clone())
                .add_attr("offset", "0x4")
                .add_attr("length", "0x8");
        }
        {
            // length 0 reads to the end
            let part = rom.add_element("part");
            part.add_attr("name", "a.bin")
                .add_attr("crc", crc)
                .add_attr("offset", "0xC");
        }
        let mut assembler = RomAssembler::open(&[zip_path]);
        let out = assembler.run(&rom);
        assert_eq!(out, vec![4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn fill_parts_repeat_their_bytes() {
        let mut rom = Element::new("rom");
        {
            let part = rom.add_element("part");
            part.set_text(" FF");
            part.add_attr("repeat", "0x4");
        }
        {
            // no repeat attribute means once
            let part = rom.add_element("part");
            part.set_text("01 02");
        }
        let mut assembler = RomAssembler::open(&[]);
        let out = assembler.run(&rom);
        assert_eq!(out, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x02]);
    }

    #[test]
    fn missing_crc_warns_and_skips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let zip_path = dir.path().join("game.zip");
        write_zip(&zip_path, &[("a.bin", b"123456789")]);

        let mut rom = Element::new("rom");
        {
            let part = rom.add_element("part");
            part.add_attr("name", "ghost.bin").add_attr("crc", "deadbeef");
        }
        {
            let part = rom.add_element("part");
            part.set_text(" FF");
            part.add_attr("repeat", "0x2");
        }
        let mut assembler = RomAssembler::open(&[zip_path]);
        // the missing entry contributes nothing; the fill still lands
        assert_eq!(assembler.run(&rom), vec![0xFF, 0xFF]);
    }

    #[test]
    fn interleave_children_are_not_executed() {
        let mut rom = Element::new("rom");
        {
            let ilv = rom.add_element("interleave");
            ilv.add_attr("output", "16");
            let part = ilv.add_element("part");
            part.add_attr("name", "x.bin").add_attr("crc", "00000000");
        }
        {
            let part = rom.add_element("part");
            part.set_text("AA");
        }
        let mut assembler = RomAssembler::open(&[]);
        assert_eq!(assembler.run(&rom), vec![0xAA]);
    }

    #[test]
    fn second_zip_is_searched_too() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("clone.zip");
        let second = dir.path().join("parent.zip");
        write_zip(&first, &[("only.bin", &[0x11])]);
        write_zip(&second, &[("shared.bin", &[0x22, 0x33])]);
        let crc = zip_crcs(&second)[0].1.clone();

        let mut rom = Element::new("rom");
        let part = rom.add_element("part");
        part.add_attr("name", "shared.bin").add_attr("crc", crc);

        let missing = dir.path().join("absent.zip");
        let mut assembler = RomAssembler::open(&[first, missing, second]);
        assert_eq!(assembler.run(&rom), vec![0x22, 0x33]);
    }

    #[test]
    fn write_rom_reports_byte_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut rom = Element::new("rom");
        let part = rom.add_element("part");
        part.set_text("01 02 03");
        let out_path = dir.path().join("game.rom");
        let mut assembler = RomAssembler::open(&[]);
        let n = assembler.write_rom(&rom, &out_path).expect("write");
        assert_eq!(n, 3);
        assert_eq!(std::fs::read(&out_path).expect("read"), vec![1, 2, 3]);
    }

    /// End-to-end: a layout produced by the engine executes into exactly
    /// the bytes the cursor accounted for.
    #[test]
    fn round_trip_matches_cursor() {
        use crate::config::GlobalConfig;
        use crate::layout::{firmware::FirmwareAssembler, LayoutArgs, LayoutEngine, NoDevRom};
        use crate::machine::{MachineRecord, MachineRom};

        struct NoFirmware;
        impl FirmwareAssembler for NoFirmware {
            fn assemble(&self, _: &Path) -> crate::common::BuildResult<Vec<u8>> {
                Ok(Vec::new())
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let zip_path = dir.path().join("game.zip");
        let a: Vec<u8> = (0..=255).collect();
        let b = vec![0x5A; 0x80];
        write_zip(&zip_path, &[("a.bin", &a), ("b.bin", &b)]);
        let crcs = zip_crcs(&zip_path);
        let crc_of = |name: &str| crcs.iter().find(|(n, _)| n == name).expect("crc").1.clone();

        let machine = MachineRecord {
            name: "game".into(),
            roms: vec![
                MachineRom {
                    name: "a.bin".into(),
                    crc: Some(crc_of("a.bin")),
                    size: a.len(),
                    offset: 0,
                    region: "maincpu".into(),
                    ..Default::default()
                },
                MachineRom {
                    name: "b.bin".into(),
                    crc: Some(crc_of("b.bin")),
                    size: b.len(),
                    offset: 0x100,
                    region: "maincpu".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let mut cfg = GlobalConfig::default();
        cfg.rom.order = vec!["maincpu".into()];
        cfg.rom.regions = vec![crate::config::RegionConfig {
            name: "maincpu".into(),
            len: 0x200,
            ..Default::default()
        }];

        let args = LayoutArgs::default();
        let layout = LayoutEngine::new(&machine, &cfg, &args, &NoFirmware, &NoDevRom)
            .build()
            .expect("layout")
            .expect("has ROMs");

        let mut assembler = RomAssembler::open(&[zip_path]);
        let out = assembler.run(&layout.node);
        assert_eq!(out.len(), layout.state.pos);

        let mut expected = a.clone();
        expected.extend_from_slice(&b);
        expected.extend(std::iter::repeat(0xFF).take(0x200 - a.len() - b.len()));
        assert_eq!(out, expected);
    }
}
