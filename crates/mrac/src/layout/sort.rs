//! Region ROM sorting strategies.
//!
//! The sort flags of a region record are mutually exclusive; the strategy
//! is derived once from the record and applied to the extracted ROM list
//! before emission. All sorts are stable: ties preserve input order.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

use super::LayoutState;
use crate::common::{BuildError, BuildResult};
use crate::config::RegionConfig;
use crate::machine::MachineRom;

#[derive(Debug, Clone)]
pub enum SortStrategy {
    /// Explicit index list; out-of-range entries fall back to index 0.
    Sequence(Vec<usize>),
    /// First ROM matching each extension, in list order.
    ExtList(Vec<String>),
    /// First ROM matching each exact name, in list order.
    NameList(Vec<String>),
    /// First ROM matching each pattern, in list order.
    RegexList(Vec<Regex>),
    /// Even-indexed entries first, odd-indexed appended.
    EvenOdd,
    /// Sort by extension, or by name when all extensions are equal.
    ByExt { alpha: bool, reverse: bool },
    /// Sort by full name.
    FullName { alpha: bool },
    Unsorted,
}

impl SortStrategy {
    /// Derive the strategy from a region record. The first flag set, in
    /// priority order, wins; the rest are ignored.
    pub fn from_region(cfg: &RegionConfig) -> BuildResult<Self> {
        if !cfg.sequence.is_empty() {
            return Ok(Self::Sequence(cfg.sequence.clone()));
        }
        if !cfg.ext_sort.is_empty() {
            return Ok(Self::ExtList(cfg.ext_sort.clone()));
        }
        if !cfg.name_sort.is_empty() {
            return Ok(Self::NameList(cfg.name_sort.clone()));
        }
        if !cfg.regex_sort.is_empty() {
            let mut patterns = Vec::with_capacity(cfg.regex_sort.len());
            for p in &cfg.regex_sort {
                patterns.push(Regex::new(p).map_err(|e| {
                    BuildError::config(format!("region {}: bad regex_sort {p:?}: {e}", cfg.name))
                })?);
            }
            return Ok(Self::RegexList(patterns));
        }
        if cfg.sort_even {
            if cfg.sort_reverse {
                return Err(BuildError::config(format!(
                    "region {}: sort_even cannot be combined with sort_reverse",
                    cfg.name
                )));
            }
            return Ok(Self::EvenOdd);
        }
        if cfg.sort_byext {
            return Ok(Self::ByExt {
                alpha: cfg.sort_alpha,
                reverse: cfg.sort_reverse,
            });
        }
        if cfg.sort_alpha || cfg.sort {
            return Ok(Self::FullName {
                alpha: cfg.sort_alpha,
            });
        }
        Ok(Self::Unsorted)
    }

    /// Apply the strategy. `region` and `setname` only feed warnings.
    pub fn apply(
        &self,
        mut roms: Vec<MachineRom>,
        region: &str,
        setname: &str,
        state: &mut LayoutState,
    ) -> Vec<MachineRom> {
        match self {
            Self::Sequence(seq) => {
                if roms.is_empty() {
                    state.warn(format!("attempting to sort empty region {region}"));
                    return roms;
                }
                seq.iter()
                    .map(|&k| roms.get(k).unwrap_or(&roms[0]).clone())
                    .collect()
            }
            Self::ExtList(exts) => {
                pick_list(&mut roms, exts, |r, ext| r.name.ends_with(ext.as_str()));
                roms
            }
            Self::NameList(names) => {
                pick_list(&mut roms, names, |r, name| &r.name == name);
                roms
            }
            Self::RegexList(patterns) => {
                pick_list(&mut roms, patterns, |r, re| re.is_match(&r.name));
                roms
            }
            Self::EvenOdd => {
                sort_even_odd(&mut roms);
                roms
            }
            Self::ByExt { alpha, reverse } => {
                sort_byext(&mut roms, *alpha, region, setname, state);
                if *reverse {
                    roms.reverse();
                }
                roms
            }
            Self::FullName { alpha } => {
                let alpha = *alpha;
                roms.sort_by(|a, b| {
                    if alpha {
                        a.name.cmp(&b.name)
                    } else {
                        cmp_count(&a.name, &b.name, true)
                    }
                });
                roms
            }
            Self::Unsorted => roms,
        }
    }
}

/// Overwrite the head of `roms` with the first entry matching each key,
/// in key order. Entries past the matched count keep their original
/// positions.
fn pick_list<K>(roms: &mut [MachineRom], keys: &[K], matches: impl Fn(&MachineRom, &K) -> bool) {
    let base = roms.to_vec();
    let mut k = 0;
    for key in keys {
        if let Some(r) = base.iter().find(|r| matches(r, key)) {
            if k < roms.len() {
                roms[k] = r.clone();
                k += 1;
            }
        }
    }
}

/// Stable reorder: even-indexed entries first, then odd-indexed.
fn sort_even_odd(roms: &mut [MachineRom]) {
    let base = roms.to_vec();
    let half = base.len() >> 1;
    for i in (0..base.len()).step_by(2) {
        roms[i >> 1] = base[i].clone();
    }
    for i in (1..base.len()).step_by(2) {
        roms[(i >> 1) + half] = base[i].clone();
    }
}

fn sort_byext(
    roms: &mut [MachineRom],
    alpha: bool,
    region: &str,
    setname: &str,
    state: &mut LayoutState,
) {
    // When every entry carries the same extension the extension cannot
    // discriminate, so sort by full name instead.
    let mut allequal = true;
    let mut ext = String::new();
    for (k, r) in roms.iter().enumerate() {
        match r.name.rfind('.') {
            None => {
                if !ext.is_empty() {
                    allequal = false;
                    break;
                }
            }
            Some(da) => {
                if k == 0 {
                    ext = r.name[da..].to_string();
                } else if ext != r.name[da..] {
                    allequal = false;
                    break;
                }
            }
        }
    }
    if !allequal {
        roms.sort_by(|a, b| match (a.name.rfind('.'), b.name.rfind('.')) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(da), Some(db)) => {
                let (ea, eb) = (&a.name[da..], &b.name[db..]);
                if alpha {
                    ea.cmp(eb)
                } else {
                    cmp_count(ea, eb, false)
                }
            }
        });
    } else {
        state.warn(format!(
            "sorting {region} by name as all extensions were equal ({setname})"
        ));
        roms.sort_by(|a, b| {
            if alpha {
                a.name.cmp(&b.name)
            } else {
                cmp_count(&a.name, &b.name, true)
            }
        });
    }
}

fn digit_runs(s: &str) -> Vec<u64> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new("[0-9]+").expect("digit pattern"));
    re.find_iter(s)
        .map(|m| m.as_str().parse().unwrap_or(0))
        .collect()
}

/// Compare two names by their embedded decimal runs, left to right. The
/// first differing run decides; when the shared prefix of runs is equal,
/// the name with fewer runs sorts first. With `rmext` the extension is
/// stripped first, which helps names like `abc123.bin`.
pub fn cmp_count(a: &str, b: &str, rmext: bool) -> Ordering {
    let strip = |s: &str| -> String {
        if rmext {
            match s.rfind('.') {
                Some(k) => s[..k].to_string(),
                None => s.to_string(),
            }
        } else {
            s.to_string()
        }
    };
    let runs_a = digit_runs(&strip(a));
    let runs_b = digit_runs(&strip(b));
    for (x, y) in runs_a.iter().zip(runs_b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    runs_a.len().cmp(&runs_b.len())
}
