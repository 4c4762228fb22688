use anyhow::{anyhow, Context, Result};
use goblin::mach::{Mach, MachO};
use goblin::Hint;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// Library metadata read from a Mach-O file's load commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachOInfo {
    /// `LC_ID_DYLIB`, if present.
    pub install_name: Option<String>,
    /// `LC_LOAD_DYLIB` and friends, in load command order.
    pub dependencies: Vec<String>,
    /// `LC_RPATH` entries, in load command order.
    pub rpaths: Vec<String>,
}

/// Check the magic bytes of `path`. Anything unreadable is not Mach-O.
pub fn is_macho_file(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut bytes = [0u8; 16];
    if file.read_exact(&mut bytes).is_err() {
        return false;
    }
    matches!(
        goblin::mach::peek_bytes(&bytes),
        Ok(Hint::Mach(_) | Hint::MachFat(_))
    )
}

pub fn parse_macho(path: &Path) -> Result<MachOInfo> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    parse_macho_bytes(&data).with_context(|| format!("parsing Mach-O {}", path.display()))
}

/// Parse a thin or universal binary. Slices of a universal binary are merged,
/// keeping the first install name and the first occurrence of each entry.
pub fn parse_macho_bytes(data: &[u8]) -> Result<MachOInfo> {
    match Mach::parse(data).map_err(|err| anyhow!("{err}"))? {
        Mach::Binary(macho) => Ok(read_single(&macho)),
        Mach::Fat(fat) => {
            let mut merged = MachOInfo::default();
            for arch in fat.iter_arches() {
                let arch = arch.map_err(|err| anyhow!("{err}"))?;
                let start = arch.offset as usize;
                let end = start + arch.size as usize;
                let slice = data
                    .get(start..end)
                    .with_context(|| format!("architecture slice {start}..{end} out of bounds"))?;
                let macho = MachO::parse(slice, 0).map_err(|err| anyhow!("{err}"))?;
                merged.merge(read_single(&macho));
            }
            Ok(merged)
        }
    }
}

impl MachOInfo {
    fn merge(&mut self, other: MachOInfo) {
        if self.install_name.is_none() {
            self.install_name = other.install_name;
        }
        push_unique(&mut self.dependencies, other.dependencies);
        push_unique(&mut self.rpaths, other.rpaths);
    }
}

fn push_unique(into: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

fn read_single(macho: &MachO) -> MachOInfo {
    MachOInfo {
        install_name: macho.name.map(ToString::to_string),
        // goblin reserves libs[0] for the binary itself: "self", or the
        // LC_ID_DYLIB name when there is one.
        dependencies: macho
            .libs
            .iter()
            .skip(1)
            .map(|lib| (*lib).to_string())
            .collect(),
        rpaths: macho.rpaths.iter().map(|s| (*s).to_string()).collect(),
    }
}
