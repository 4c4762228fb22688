pub mod inspect;

use anyhow::Result;
use std::path::Path;

use crate::patch;

/// The binary-metadata capabilities the fixer needs.
///
/// Read methods may fail; callers treat a failed read as "no data". Mutating
/// methods must fail loudly when the file cannot be changed.
pub trait BinaryTool {
    fn is_binary_file(&self, path: &Path) -> bool;

    fn self_identifier(&self, path: &Path) -> Result<Option<String>>;

    fn dependencies(&self, path: &Path) -> Result<Vec<String>>;

    fn search_paths(&self, path: &Path) -> Result<Vec<String>>;

    fn delete_search_path(&self, path: &Path, entry: &str) -> Result<()>;

    fn set_self_identifier(&self, path: &Path, value: &str) -> Result<()>;

    fn change_dependency(&self, path: &Path, old: &str, new: &str) -> Result<()>;
}

/// Reads load commands with goblin and patches them with `install_name_tool`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeTool;

impl BinaryTool for NativeTool {
    fn is_binary_file(&self, path: &Path) -> bool {
        inspect::is_macho_file(path)
    }

    fn self_identifier(&self, path: &Path) -> Result<Option<String>> {
        Ok(inspect::parse_macho(path)?.install_name)
    }

    fn dependencies(&self, path: &Path) -> Result<Vec<String>> {
        Ok(inspect::parse_macho(path)?.dependencies)
    }

    fn search_paths(&self, path: &Path) -> Result<Vec<String>> {
        Ok(inspect::parse_macho(path)?.rpaths)
    }

    fn delete_search_path(&self, path: &Path, entry: &str) -> Result<()> {
        patch::delete_rpath(path, entry)
    }

    fn set_self_identifier(&self, path: &Path, value: &str) -> Result<()> {
        patch::change_install_id(path, value)
    }

    fn change_dependency(&self, path: &Path, old: &str, new: &str) -> Result<()> {
        patch::change_install_name(path, old, new)
    }
}

/// Treat a failed metadata read as "no data".
pub(crate) fn or_no_data<T: Default>(result: Result<T>, what: &str, path: &Path) -> T {
    result.unwrap_or_else(|err| {
        log::debug!("could not read {} of {}: {:#}", what, path.display(), err);
        T::default()
    })
}
