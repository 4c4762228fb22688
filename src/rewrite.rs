use crate::classify::is_external;
use crate::macho::{or_no_data, BinaryTool};
use crate::resolve::LocalCopyResolver;
use anyhow::{Context, Result};
use std::path::Path;

pub const LOADER_PATH: &str = "@loader_path";

/// Rewrites one binary so that everything it loads resolves inside the bundle.
pub struct BinaryRewriter<'a, T: BinaryTool + ?Sized> {
    tool: &'a T,
    stale_rpath_prefixes: &'a [String],
}

impl<'a, T: BinaryTool + ?Sized> BinaryRewriter<'a, T> {
    pub fn new(tool: &'a T, stale_rpath_prefixes: &'a [String]) -> Self {
        Self {
            tool,
            stale_rpath_prefixes,
        }
    }

    /// Apply every pending rewrite to `binary`, returning whether anything
    /// changed. Unresolvable dependencies are left as they are.
    pub fn process(&self, binary: &Path, resolver: &mut LocalCopyResolver<'_>) -> Result<bool> {
        let mut changed = false;

        let rpaths = or_no_data(self.tool.search_paths(binary), "rpaths", binary);
        for rpath in rpaths.iter().filter(|rpath| self.is_stale(rpath)) {
            log::info!("{}: deleting rpath {}", binary.display(), rpath);
            self.tool.delete_search_path(binary, rpath)?;
            changed = true;
        }

        let old_id = or_no_data(self.tool.self_identifier(binary), "install id", binary);
        let mut new_id = old_id.clone();
        if let Some(id) = old_id.as_deref().filter(|id| is_external(id)) {
            let reference = self_reference(binary)?;
            log::info!("{}: install id {} -> {}", binary.display(), id, reference);
            self.tool.set_self_identifier(binary, &reference)?;
            new_id = Some(reference);
            changed = true;
        }

        let dependencies = or_no_data(self.tool.dependencies(binary), "dependencies", binary);
        for dep in dependencies {
            if !is_external(&dep) || is_own_id(&dep, &old_id, &new_id) {
                continue;
            }
            let Some(target) = resolver.resolve(&dep)? else {
                continue;
            };
            let reference = loader_relative(binary, &target)?;
            log::info!("{}: {} -> {}", binary.display(), dep, reference);
            self.tool.change_dependency(binary, &dep, &reference)?;
            changed = true;
        }

        Ok(changed)
    }

    fn is_stale(&self, rpath: &str) -> bool {
        self.stale_rpath_prefixes
            .iter()
            .any(|prefix| rpath.starts_with(prefix.as_str()))
    }
}

fn is_own_id(dep: &str, old_id: &Option<String>, new_id: &Option<String>) -> bool {
    old_id.as_deref() == Some(dep) || new_id.as_deref() == Some(dep)
}

/// `@loader_path/<file name>` for a binary that is its own install name.
pub fn self_reference(binary: &Path) -> Result<String> {
    let name = binary
        .file_name()
        .with_context(|| format!("{} has no file name", binary.display()))?;
    Ok(format!("{}/{}", LOADER_PATH, name.to_string_lossy()))
}

/// Express `target` relative to the directory containing `binary`.
pub fn loader_relative(binary: &Path, target: &Path) -> Result<String> {
    let base = binary
        .parent()
        .with_context(|| format!("{} has no parent directory", binary.display()))?;
    let rel = pathdiff::diff_paths(target, base).with_context(|| {
        format!(
            "cannot express {} relative to {}",
            target.display(),
            base.display()
        )
    })?;
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Ok(format!("{LOADER_PATH}/{rel}"))
}
